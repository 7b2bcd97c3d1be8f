//! Release train state machine
//!
//! Repos are visited strictly in order. Each repo moves through
//! [RepoState] until it is `Done` or `Aborted`; an abort halts the whole
//! run and leaves every later repo untouched. Nothing is rolled back:
//! tags pushed for earlier repos stay, and the operator re-runs with
//! `--resume`.
//!
//! ```text
//! Pending ──pass──────────────▶ Tagging ──▶ WaitingAssets ──stable──▶ Done
//!    │ ──remote tag + resume──▶ SkipTag ──▶      │
//!    └──any other failure──▶ Aborted ◀──timeout/not found/error──┘
//! ```

use crate::domain::{AssetMatcher, RepoDescriptor, VersionSpec};
use crate::error::{ReleaseError, Result, VcsOp};
use crate::git::VcsGateway;
use crate::preflight::{PreflightChecker, PreflightFailure, PreflightResult};
use crate::release::ReleaseQueryService;
use crate::stabilizer::{
    AssetStabilizer, CancelToken, Clock, StabilizeOutcome, StabilizerConfig, SystemClock,
};
use crate::warning::RunWarning;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// What preflight means for one repo, given the resume flag
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagDecision {
    CreateAndPush,
    SkipAlreadyTagged,
    Abort(PreflightFailure),
}

impl TagDecision {
    /// Only a remote tag under resume is downgraded to a skip
    pub fn from_preflight(result: PreflightResult, resume: bool) -> Self {
        match result {
            PreflightResult::Pass => TagDecision::CreateAndPush,
            PreflightResult::Fail(PreflightFailure::TagExistsRemote { .. }) if resume => {
                TagDecision::SkipAlreadyTagged
            }
            PreflightResult::Fail(failure) => TagDecision::Abort(failure),
        }
    }
}

/// How the repo's tag came to be on the remote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagAction {
    Created,
    Skipped,
}

/// Asset side of a finished repo
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetReport {
    Stable {
        assets: Vec<String>,
        polls: u32,
        waited: Duration,
    },
    /// Empty manifest; nothing was polled
    NotExpected,
    /// Dry run; the rendered patterns that would have been waited for
    Planned(Vec<String>),
}

/// Result of one repo that reached `Done`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoReport {
    pub repo: String,
    pub tag: String,
    pub action: TagAction,
    pub assets: AssetReport,
}

impl RepoReport {
    pub fn is_dry_run(&self) -> bool {
        matches!(self.assets, AssetReport::Planned(_))
    }
}

/// Per-repo state
#[derive(Debug)]
pub enum RepoState {
    Pending,
    Tagging,
    SkipTag,
    WaitingAssets(TagAction),
    Done(RepoReport),
    Aborted(ReleaseError),
}

impl RepoState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RepoState::Done(_) | RepoState::Aborted(_))
    }

    /// Transition out of `Pending`
    pub fn from_decision(repo: &str, decision: TagDecision) -> Self {
        match decision {
            TagDecision::CreateAndPush => RepoState::Tagging,
            TagDecision::SkipAlreadyTagged => RepoState::SkipTag,
            TagDecision::Abort(failure) => RepoState::Aborted(ReleaseError::Preflight {
                repo: repo.to_string(),
                failure,
            }),
        }
    }

    /// Transition out of `WaitingAssets`
    pub fn from_outcome(repo: &str, tag: &str, action: TagAction, outcome: StabilizeOutcome) -> Self {
        match outcome {
            StabilizeOutcome::Stable {
                assets,
                polls,
                waited,
            } => RepoState::Done(RepoReport {
                repo: repo.to_string(),
                tag: tag.to_string(),
                action,
                assets: AssetReport::Stable {
                    assets,
                    polls,
                    waited,
                },
            }),
            StabilizeOutcome::TimedOut { missing, waited } => {
                RepoState::Aborted(ReleaseError::TimedOut {
                    repo: repo.to_string(),
                    tag: tag.to_string(),
                    waited,
                    missing,
                })
            }
            StabilizeOutcome::ReleaseNotFound { waited } => {
                RepoState::Aborted(ReleaseError::ReleaseNotFound {
                    repo: repo.to_string(),
                    tag: tag.to_string(),
                    waited,
                })
            }
        }
    }
}

/// A repo paired with the gateway to its clone
#[derive(Clone)]
pub struct ReleaseTarget {
    pub descriptor: RepoDescriptor,
    pub vcs: Arc<dyn VcsGateway>,
}

impl ReleaseTarget {
    pub fn new(descriptor: RepoDescriptor, vcs: Arc<dyn VcsGateway>) -> Self {
        ReleaseTarget { descriptor, vcs }
    }
}

struct ResolvedTarget {
    target: ReleaseTarget,
    matchers: Vec<AssetMatcher>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    pub resume: bool,
    pub dry_run: bool,
}

/// One release session: version, ordered repos and progress so far
///
/// Nothing here is persisted; a resumed run rebuilds its progress by
/// re-inspecting repositories and releases.
pub struct OrchestratorRun {
    version: VersionSpec,
    targets: Vec<ResolvedTarget>,
    options: RunOptions,
    cursor: usize,
    reports: Vec<RepoReport>,
    warnings: Vec<RunWarning>,
}

impl OrchestratorRun {
    /// Resolve every repo's asset manifest against `version` up front
    pub fn new(version: VersionSpec, targets: Vec<ReleaseTarget>, options: RunOptions) -> Result<Self> {
        if targets.is_empty() {
            return Err(ReleaseError::config("No repositories to release"));
        }

        let targets = targets
            .into_iter()
            .map(|target| {
                let matchers = target
                    .descriptor
                    .assets
                    .iter()
                    .map(|pattern| pattern.resolve(&version))
                    .collect::<Result<Vec<_>>>()?;
                Ok(ResolvedTarget { target, matchers })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(OrchestratorRun {
            version,
            targets,
            options,
            cursor: 0,
            reports: Vec::new(),
            warnings: Vec::new(),
        })
    }

    pub fn version(&self) -> &VersionSpec {
        &self.version
    }

    pub fn options(&self) -> RunOptions {
        self.options
    }

    /// Index of the repo being processed (equals the repo count when done)
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn repo_names(&self) -> Vec<&str> {
        self.targets
            .iter()
            .map(|t| t.target.descriptor.name.as_str())
            .collect()
    }

    pub fn reports(&self) -> &[RepoReport] {
        &self.reports
    }

    pub fn warnings(&self) -> &[RunWarning] {
        &self.warnings
    }

    pub fn add_warning(&mut self, warning: RunWarning) {
        self.warnings.push(warning);
    }

    pub fn is_complete(&self) -> bool {
        self.cursor == self.targets.len()
    }
}

pub struct ReleaseOrchestrator {
    releases: Arc<dyn ReleaseQueryService>,
    clock: Arc<dyn Clock>,
    config: StabilizerConfig,
    cancel: CancelToken,
}

impl ReleaseOrchestrator {
    pub fn new(releases: Arc<dyn ReleaseQueryService>, config: StabilizerConfig) -> Self {
        ReleaseOrchestrator {
            releases,
            clock: Arc::new(SystemClock::new()),
            config,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that aborts the asset wait in progress
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Drive every remaining repo in `run` to `Done`, or stop at the first abort
    pub fn run(&self, run: &mut OrchestratorRun) -> Result<()> {
        info!(
            tag = run.version.tag(),
            repos = run.targets.len(),
            resume = run.options.resume,
            dry_run = run.options.dry_run,
            "starting release train"
        );

        while !run.is_complete() {
            let mut state = RepoState::Pending;
            let report = loop {
                state = match self.advance(run, state) {
                    RepoState::Done(report) => break report,
                    RepoState::Aborted(err) => {
                        error!(
                            repo = run.targets[run.cursor].target.descriptor.name.as_str(),
                            error = %err,
                            "release train aborted"
                        );
                        return Err(err);
                    }
                    next => next,
                };
            };
            run.reports.push(report);
            run.cursor += 1;
        }

        info!(tag = run.version.tag(), "release train complete");
        Ok(())
    }

    /// Perform one transition for the repo under the cursor
    fn advance(&self, run: &mut OrchestratorRun, state: RepoState) -> RepoState {
        let tag = run.version.tag().to_string();
        let resolved = &run.targets[run.cursor];
        let repo = resolved.target.descriptor.name.as_str();
        let vcs = resolved.target.vcs.as_ref();

        match state {
            RepoState::Pending => {
                info!(repo, tag = tag.as_str(), "running preflight");
                if let Err(e) = vcs.fetch() {
                    return RepoState::Aborted(ReleaseError::vcs(repo, VcsOp::Fetch, e));
                }
                let result = match PreflightChecker::new(run.options.resume).check(
                    &resolved.target.descriptor,
                    vcs,
                    &tag,
                ) {
                    Ok(result) => result,
                    Err(e) => return RepoState::Aborted(ReleaseError::vcs(repo, VcsOp::Inspect, e)),
                };

                let decision = TagDecision::from_preflight(result, run.options.resume);
                if decision == TagDecision::SkipAlreadyTagged {
                    run.warnings.push(RunWarning::TagAlreadyPublished {
                        repo: repo.to_string(),
                        tag: tag.clone(),
                    });
                }

                if run.options.dry_run {
                    return plan(repo, &tag, &resolved.matchers, decision);
                }
                RepoState::from_decision(repo, decision)
            }

            RepoState::Tagging => {
                let commit = match vcs.head_commit() {
                    Ok(commit) => commit,
                    Err(e) => return RepoState::Aborted(ReleaseError::vcs(repo, VcsOp::Inspect, e)),
                };
                let message = format!("Release {}", tag);
                if let Err(e) = vcs.create_tag(&tag, commit, &message) {
                    return RepoState::Aborted(ReleaseError::vcs(repo, VcsOp::CreateTag, e));
                }
                info!(repo, tag = tag.as_str(), commit = %commit, "created tag");

                // A failed push leaves the local tag in place
                if let Err(e) = vcs.push_tag(&tag) {
                    return RepoState::Aborted(ReleaseError::vcs(repo, VcsOp::PushTag, e));
                }
                info!(repo, tag = tag.as_str(), "pushed tag");
                RepoState::WaitingAssets(TagAction::Created)
            }

            RepoState::SkipTag => {
                info!(repo, tag = tag.as_str(), "tag already on remote; skipping");
                RepoState::WaitingAssets(TagAction::Skipped)
            }

            RepoState::WaitingAssets(action) => {
                if resolved.matchers.is_empty() {
                    let report = RepoReport {
                        repo: repo.to_string(),
                        tag: tag.clone(),
                        action,
                        assets: AssetReport::NotExpected,
                    };
                    run.warnings.push(RunWarning::NoExpectedAssets {
                        repo: report.repo.clone(),
                    });
                    return RepoState::Done(report);
                }

                info!(
                    repo,
                    tag = tag.as_str(),
                    patterns = resolved.matchers.len(),
                    "waiting for release assets"
                );
                let stabilizer = AssetStabilizer::new(
                    self.releases.as_ref(),
                    self.clock.as_ref(),
                    &self.config,
                    &self.cancel,
                );
                match stabilizer.wait(repo, &tag, &resolved.matchers) {
                    Ok(outcome) => RepoState::from_outcome(repo, &tag, action, outcome),
                    Err(e) => RepoState::Aborted(e),
                }
            }

            terminal @ (RepoState::Done(_) | RepoState::Aborted(_)) => terminal,
        }
    }
}

/// Dry-run resolution of a decision: report it without acting on it
fn plan(repo: &str, tag: &str, matchers: &[AssetMatcher], decision: TagDecision) -> RepoState {
    let action = match decision {
        TagDecision::CreateAndPush => TagAction::Created,
        TagDecision::SkipAlreadyTagged => TagAction::Skipped,
        abort @ TagDecision::Abort(_) => return RepoState::from_decision(repo, abort),
    };
    let patterns = matchers.iter().map(|m| m.rendered().to_string()).collect();
    RepoState::Done(RepoReport {
        repo: repo.to_string(),
        tag: tag.to_string(),
        action,
        assets: AssetReport::Planned(patterns),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::MockGateway;
    use crate::release::mock::Observation;
    use crate::release::MockReleaseService;
    use crate::stabilizer::ManualClock;

    const TAG: &str = "v1.0.0";

    fn remote_tag() -> PreflightFailure {
        PreflightFailure::TagExistsRemote {
            tag: TAG.to_string(),
        }
    }

    #[test]
    fn test_decision_from_preflight() {
        assert_eq!(
            TagDecision::from_preflight(PreflightResult::Pass, false),
            TagDecision::CreateAndPush
        );
        assert_eq!(
            TagDecision::from_preflight(PreflightResult::Fail(remote_tag()), true),
            TagDecision::SkipAlreadyTagged
        );
        assert_eq!(
            TagDecision::from_preflight(PreflightResult::Fail(remote_tag()), false),
            TagDecision::Abort(remote_tag())
        );
        assert_eq!(
            TagDecision::from_preflight(PreflightResult::Fail(PreflightFailure::DirtyTree), true),
            TagDecision::Abort(PreflightFailure::DirtyTree)
        );
    }

    #[test]
    fn test_transitions_from_decision() {
        assert!(matches!(
            RepoState::from_decision("a", TagDecision::CreateAndPush),
            RepoState::Tagging
        ));
        assert!(matches!(
            RepoState::from_decision("a", TagDecision::SkipAlreadyTagged),
            RepoState::SkipTag
        ));
        match RepoState::from_decision("a", TagDecision::Abort(remote_tag())) {
            RepoState::Aborted(ReleaseError::Preflight { repo, failure }) => {
                assert_eq!(repo, "a");
                assert_eq!(failure, remote_tag());
            }
            other => panic!("unexpected state: {:?}", other),
        }
    }

    #[test]
    fn test_transitions_from_outcome() {
        let done = RepoState::from_outcome(
            "a",
            TAG,
            TagAction::Skipped,
            StabilizeOutcome::Stable {
                assets: vec!["x.iso".to_string()],
                polls: 2,
                waited: Duration::from_secs(10),
            },
        );
        assert!(done.is_terminal());
        assert!(matches!(
            done,
            RepoState::Done(RepoReport {
                action: TagAction::Skipped,
                ..
            })
        ));

        let timed_out = RepoState::from_outcome(
            "a",
            TAG,
            TagAction::Created,
            StabilizeOutcome::TimedOut {
                missing: vec!["x.iso".to_string()],
                waited: Duration::from_secs(60),
            },
        );
        assert!(matches!(
            timed_out,
            RepoState::Aborted(ReleaseError::TimedOut { .. })
        ));

        let missing = RepoState::from_outcome(
            "a",
            TAG,
            TagAction::Created,
            StabilizeOutcome::ReleaseNotFound {
                waited: Duration::from_secs(60),
            },
        );
        assert!(matches!(
            missing,
            RepoState::Aborted(ReleaseError::ReleaseNotFound { .. })
        ));
    }

    #[test]
    fn test_intermediate_states_are_not_terminal() {
        assert!(!RepoState::Pending.is_terminal());
        assert!(!RepoState::Tagging.is_terminal());
        assert!(!RepoState::SkipTag.is_terminal());
        assert!(!RepoState::WaitingAssets(TagAction::Created).is_terminal());
    }

    #[test]
    fn test_run_rejects_empty_repo_list() {
        let version = VersionSpec::parse("1.0.0").unwrap();
        assert!(matches!(
            OrchestratorRun::new(version, Vec::new(), RunOptions::default()),
            Err(ReleaseError::Config(_))
        ));
    }

    #[test]
    fn test_run_rejects_bad_manifest() {
        let version = VersionSpec::parse("1.0.0").unwrap();
        let descriptor = RepoDescriptor::new("a", "a").with_assets([""]);
        let target = ReleaseTarget::new(descriptor, Arc::new(MockGateway::new("a")));
        assert!(OrchestratorRun::new(version, vec![target], RunOptions::default()).is_err());
    }

    #[test]
    fn test_empty_manifest_skips_waiting() {
        let vcs = Arc::new(MockGateway::new("a"));
        let releases = Arc::new(MockReleaseService::new());
        let target = ReleaseTarget::new(RepoDescriptor::new("a", "a"), vcs.clone());
        let mut run = OrchestratorRun::new(
            VersionSpec::parse("1.0.0").unwrap(),
            vec![target],
            RunOptions::default(),
        )
        .unwrap();

        ReleaseOrchestrator::new(releases.clone(), StabilizerConfig::default())
            .with_clock(Arc::new(ManualClock::new()))
            .run(&mut run)
            .unwrap();

        assert!(vcs.has_remote_tag(TAG));
        assert_eq!(releases.poll_count("a"), 0);
        assert_eq!(run.reports()[0].assets, AssetReport::NotExpected);
        assert_eq!(
            run.warnings(),
            &[RunWarning::NoExpectedAssets {
                repo: "a".to_string()
            }]
        );
    }

    #[test]
    fn test_cancelled_run_keeps_pushed_tag() {
        let vcs = Arc::new(MockGateway::new("a"));
        let releases = Arc::new(MockReleaseService::new());
        releases.push("a", Observation::NotFound);
        let descriptor = RepoDescriptor::new("a", "a").with_assets(["x.iso"]);
        let mut run = OrchestratorRun::new(
            VersionSpec::parse("1.0.0").unwrap(),
            vec![ReleaseTarget::new(descriptor, vcs.clone())],
            RunOptions::default(),
        )
        .unwrap();

        let orchestrator = ReleaseOrchestrator::new(releases.clone(), StabilizerConfig::default())
            .with_clock(Arc::new(ManualClock::new()));
        orchestrator.cancel_token().cancel();

        let err = orchestrator.run(&mut run).unwrap_err();
        assert!(matches!(err, ReleaseError::Cancelled { .. }));
        assert!(vcs.has_remote_tag(TAG));
        assert_eq!(run.cursor(), 0);
        assert!(!run.is_complete());
    }
}
