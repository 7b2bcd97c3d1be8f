use crate::error::{ReleaseError, Result};
use crate::git::mock::{new_journal, CallJournal};
use crate::release::{ReleaseAsset, ReleaseInfo, ReleaseQueryService};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

/// What one poll of a mocked release returns
#[derive(Debug, Clone)]
pub enum Observation {
    NotFound,
    Found(ReleaseInfo),
    /// Transient outage (e.g., HTTP 502)
    Unavailable,
    /// Non-transient API failure
    Fail(String),
}

/// Scripted release host for testing without network access
///
/// Each repo has a queue of observations consumed one per poll. The last
/// observation repeats forever; a repo with no script is `NotFound`.
pub struct MockReleaseService {
    scripts: Mutex<HashMap<String, VecDeque<Observation>>>,
    journal: CallJournal,
}

impl MockReleaseService {
    pub fn new() -> Self {
        Self::with_journal(new_journal())
    }

    pub fn with_journal(journal: CallJournal) -> Self {
        MockReleaseService {
            scripts: Mutex::new(HashMap::new()),
            journal,
        }
    }

    /// Append one observation to a repo's script
    pub fn push(&self, repo: impl Into<String>, observation: Observation) {
        self.scripts()
            .entry(repo.into())
            .or_default()
            .push_back(observation);
    }

    /// Append a published release with the given `(name, size)` assets
    pub fn push_assets(&self, repo: impl Into<String>, tag: &str, assets: &[(&str, u64)]) {
        let assets = assets
            .iter()
            .map(|(name, size)| ReleaseAsset::new(*name, *size))
            .collect();
        self.push(repo, Observation::Found(ReleaseInfo::new(tag, assets)));
    }

    /// Number of polls recorded for `repo`
    pub fn poll_count(&self, repo: &str) -> usize {
        let prefix = format!("{}:get_release:", repo);
        self.journal
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .filter(|entry| entry.starts_with(&prefix))
            .count()
    }

    fn scripts(&self) -> MutexGuard<'_, HashMap<String, VecDeque<Observation>>> {
        self.scripts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn next_observation(&self, repo: &str) -> Observation {
        let mut scripts = self.scripts();
        match scripts.get_mut(repo) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or(Observation::NotFound),
            Some(queue) => queue.front().cloned().unwrap_or(Observation::NotFound),
            None => Observation::NotFound,
        }
    }
}

impl Default for MockReleaseService {
    fn default() -> Self {
        Self::new()
    }
}

impl ReleaseQueryService for MockReleaseService {
    fn get_release(&self, repo: &str, tag: &str) -> Result<Option<ReleaseInfo>> {
        self.journal
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(format!("{}:get_release:{}", repo, tag));

        match self.next_observation(repo) {
            Observation::NotFound => Ok(None),
            Observation::Found(release) => Ok(Some(release)),
            Observation::Unavailable => Err(ReleaseError::ApiUnavailable(format!(
                "mock outage for {}",
                repo
            ))),
            Observation::Fail(message) => Err(ReleaseError::api(message)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unscripted_repo_is_not_found() {
        let service = MockReleaseService::new();
        assert_eq!(service.get_release("a", "v1.0.0").unwrap(), None);
        assert_eq!(service.poll_count("a"), 1);
    }

    #[test]
    fn test_script_is_consumed_and_last_repeats() {
        let service = MockReleaseService::new();
        service.push("a", Observation::NotFound);
        service.push_assets("a", "v1.0.0", &[("x.iso", 5)]);

        assert!(service.get_release("a", "v1.0.0").unwrap().is_none());
        for _ in 0..3 {
            let release = service.get_release("a", "v1.0.0").unwrap().unwrap();
            assert_eq!(release.assets[0].name, "x.iso");
        }
        assert_eq!(service.poll_count("a"), 4);
        assert_eq!(service.poll_count("b"), 0);
    }

    #[test]
    fn test_errors() {
        let service = MockReleaseService::new();
        service.push("a", Observation::Unavailable);
        service.push("a", Observation::Fail("401".to_string()));

        assert!(service.get_release("a", "t").unwrap_err().is_transient());
        assert!(!service.get_release("a", "t").unwrap_err().is_transient());
    }
}
