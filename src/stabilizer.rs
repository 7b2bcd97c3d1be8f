//! Waits for a tag's release assets to be published and stop changing.
//!
//! A release is stable once every expected pattern is satisfied by a
//! complete asset and the full asset listing (names, sizes, states and
//! digests) has been identical for `stable_polls` consecutive polls.
//! A placeholder that is later overwritten therefore resets the count.

use crate::domain::AssetMatcher;
use crate::error::{ReleaseError, Result};
use crate::release::{AssetState, ReleaseInfo, ReleaseQueryService};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Longest uninterrupted sleep; cancellation is checked in between
const SLEEP_SLICE: Duration = Duration::from_millis(200);

/// Monotonic time source
pub trait Clock: Send + Sync {
    /// Time elapsed since an arbitrary fixed origin
    fn now(&self) -> Duration;

    fn sleep(&self, duration: Duration);
}

/// Wall clock backed by `Instant` and `thread::sleep`
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        SystemClock {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Virtual clock for tests: sleeping advances time instantly
#[derive(Default)]
pub struct ManualClock {
    now: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, duration: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *now += duration;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

/// Shared flag that aborts a wait in progress
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Polling knobs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StabilizerConfig {
    pub poll_interval: Duration,
    /// Per-repo budget, measured from the first poll
    pub max_wait: Duration,
    /// Consecutive identical complete observations required
    pub stable_polls: u32,
}

impl Default for StabilizerConfig {
    fn default() -> Self {
        StabilizerConfig {
            poll_interval: Duration::from_secs(10),
            max_wait: Duration::from_secs(45 * 60),
            stable_polls: 2,
        }
    }
}

type Snapshot = BTreeMap<String, (u64, Option<AssetState>, Option<String>)>;

fn snapshot(release: &ReleaseInfo) -> Snapshot {
    release
        .assets
        .iter()
        .map(|asset| {
            (
                asset.name.clone(),
                (asset.size, asset.state.clone(), asset.digest.clone()),
            )
        })
        .collect()
}

/// Polling accumulator for one repo
#[derive(Debug, Default)]
pub struct StabilizationState {
    last: Option<Snapshot>,
    consecutive: u32,
    polls: u32,
    release_seen: bool,
    missing: Vec<String>,
    elapsed: Duration,
}

impl StabilizationState {
    /// Fold one poll result into the state
    pub fn observe(&mut self, release: Option<&ReleaseInfo>, matchers: &[AssetMatcher]) {
        self.polls += 1;

        // Drafts are not published yet
        let Some(release) = release.filter(|r| !r.draft) else {
            self.last = None;
            self.consecutive = 0;
            self.missing = matchers.iter().map(|m| m.rendered().to_string()).collect();
            return;
        };
        self.release_seen = true;

        self.missing = matchers
            .iter()
            .filter(|matcher| {
                !release
                    .assets
                    .iter()
                    .any(|asset| asset.is_complete() && matcher.is_match(&asset.name))
            })
            .map(|matcher| matcher.rendered().to_string())
            .collect();

        if !self.missing.is_empty() {
            self.last = None;
            self.consecutive = 0;
            return;
        }

        let current = snapshot(release);
        if self.last.as_ref() == Some(&current) {
            self.consecutive += 1;
        } else {
            self.last = Some(current);
            self.consecutive = 1;
        }
    }

    /// Record a poll that produced no observation (transient outage)
    pub fn observe_outage(&mut self) {
        self.polls += 1;
    }

    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }

    pub fn polls(&self) -> u32 {
        self.polls
    }

    pub fn missing(&self) -> &[String] {
        &self.missing
    }

    pub fn is_stable(&self, threshold: u32) -> bool {
        self.consecutive >= threshold.max(1)
    }
}

/// How a wait ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StabilizeOutcome {
    Stable {
        assets: Vec<String>,
        polls: u32,
        waited: Duration,
    },
    TimedOut {
        missing: Vec<String>,
        waited: Duration,
    },
    ReleaseNotFound {
        waited: Duration,
    },
}

pub struct AssetStabilizer<'a> {
    releases: &'a dyn ReleaseQueryService,
    clock: &'a dyn Clock,
    config: &'a StabilizerConfig,
    cancel: &'a CancelToken,
}

impl<'a> AssetStabilizer<'a> {
    pub fn new(
        releases: &'a dyn ReleaseQueryService,
        clock: &'a dyn Clock,
        config: &'a StabilizerConfig,
        cancel: &'a CancelToken,
    ) -> Self {
        AssetStabilizer {
            releases,
            clock,
            config,
            cancel,
        }
    }

    /// Poll until `tag`'s release in `repo` is stable or `max_wait` elapses
    ///
    /// A missing release and transient API outages are "not ready yet".
    /// Fatal API errors and cancellation are returned as `Err`.
    pub fn wait(&self, repo: &str, tag: &str, matchers: &[AssetMatcher]) -> Result<StabilizeOutcome> {
        let start = self.clock.now();
        let mut state = StabilizationState::default();

        loop {
            self.check_cancelled(repo)?;

            match self.releases.get_release(repo, tag) {
                Ok(release) => state.observe(release.as_ref(), matchers),
                Err(e) if e.is_transient() => {
                    warn!(repo, tag, error = %e, "release query unavailable; will retry");
                    state.observe_outage();
                }
                Err(e) => {
                    return Err(ReleaseError::ReleaseQuery {
                        repo: repo.to_string(),
                        source: Box::new(e),
                    })
                }
            }

            state.elapsed = self.clock.now().saturating_sub(start);
            debug!(
                repo,
                tag,
                poll = state.polls,
                consecutive = state.consecutive,
                missing = state.missing.len(),
                elapsed_secs = state.elapsed.as_secs(),
                "polled release assets"
            );

            if state.is_stable(self.config.stable_polls) {
                let assets = state
                    .last
                    .as_ref()
                    .map(|snapshot| snapshot.keys().cloned().collect())
                    .unwrap_or_default();
                info!(repo, tag, polls = state.polls, "release assets stable");
                return Ok(StabilizeOutcome::Stable {
                    assets,
                    polls: state.polls,
                    waited: state.elapsed,
                });
            }

            if state.elapsed >= self.config.max_wait {
                return Ok(if state.release_seen {
                    StabilizeOutcome::TimedOut {
                        missing: state.missing,
                        waited: state.elapsed,
                    }
                } else {
                    StabilizeOutcome::ReleaseNotFound {
                        waited: state.elapsed,
                    }
                });
            }

            // A zero interval still waits one slice so the clock advances
            let remaining = self.config.max_wait - state.elapsed;
            let interval = self.config.poll_interval.max(SLEEP_SLICE);
            self.sleep(interval.min(remaining), repo)?;
        }
    }

    fn sleep(&self, duration: Duration, repo: &str) -> Result<()> {
        let mut remaining = duration;
        while !remaining.is_zero() {
            self.check_cancelled(repo)?;
            let slice = remaining.min(SLEEP_SLICE);
            self.clock.sleep(slice);
            remaining -= slice;
        }
        Ok(())
    }

    fn check_cancelled(&self, repo: &str) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(ReleaseError::Cancelled {
                repo: repo.to_string(),
            });
        }
        Ok(())
    }
}
