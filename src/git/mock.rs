use crate::error::{ReleaseError, Result};
use crate::git::{CommitId, HeadState, VcsGateway};
use git2::Oid;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

/// Ordered record of calls shared between test doubles
///
/// Entries look like `"{repo}:{operation}"`, e.g. `"A:push_tag:v1.0.0"`.
pub type CallJournal = Arc<Mutex<Vec<String>>>;

pub fn new_journal() -> CallJournal {
    Arc::new(Mutex::new(Vec::new()))
}

struct MockState {
    clean: bool,
    head: HeadState,
    head_commit: CommitId,
    upstream: Option<CommitId>,
    remote_url: Option<String>,
    local_tags: BTreeMap<String, CommitId>,
    remote_tags: BTreeSet<String>,
    fail_create: bool,
    fail_push: bool,
}

/// In-memory repository for testing without actual git operations
///
/// Starts clean, on `main`, in sync with its upstream and without tags.
/// Pushing a tag publishes it to the simulated remote, so a second run
/// against the same mock observes the first run's effects.
pub struct MockGateway {
    name: String,
    state: Mutex<MockState>,
    journal: CallJournal,
}

impl MockGateway {
    /// Create a new mock repository with its own journal
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_journal(name, new_journal())
    }

    /// Create a new mock repository recording into a shared journal
    pub fn with_journal(name: impl Into<String>, journal: CallJournal) -> Self {
        let head_commit = commit_id(1);
        MockGateway {
            name: name.into(),
            state: Mutex::new(MockState {
                clean: true,
                head: HeadState::Branch("main".to_string()),
                head_commit,
                upstream: Some(head_commit),
                remote_url: None,
                local_tags: BTreeMap::new(),
                remote_tags: BTreeSet::new(),
                fail_create: false,
                fail_push: false,
            }),
            journal,
        }
    }

    pub fn set_clean(&self, clean: bool) {
        self.state().clean = clean;
    }

    /// Detach HEAD at the current commit
    pub fn detach_head(&self) {
        let mut state = self.state();
        state.head = HeadState::Detached(state.head_commit);
    }

    /// Move HEAD (and the current branch) to another commit
    pub fn set_head_commit(&self, oid: CommitId) {
        self.state().head_commit = oid;
    }

    /// Set the upstream head; `None` means no upstream is configured
    pub fn set_upstream(&self, oid: Option<CommitId>) {
        self.state().upstream = oid;
    }

    pub fn set_remote_url(&self, url: impl Into<String>) {
        self.state().remote_url = Some(url.into());
    }

    /// Add a local tag pointing to an OID
    pub fn add_local_tag(&self, name: impl Into<String>, oid: CommitId) {
        self.state().local_tags.insert(name.into(), oid);
    }

    /// Add a tag that only exists on the simulated remote
    pub fn add_remote_tag(&self, name: impl Into<String>) {
        self.state().remote_tags.insert(name.into());
    }

    pub fn fail_create(&self, fail: bool) {
        self.state().fail_create = fail;
    }

    pub fn fail_push(&self, fail: bool) {
        self.state().fail_push = fail;
    }

    pub fn local_tag(&self, name: &str) -> Option<CommitId> {
        self.state().local_tags.get(name).copied()
    }

    pub fn has_remote_tag(&self, name: &str) -> bool {
        self.state().remote_tags.contains(name)
    }

    /// Calls recorded for this repo, without the repo prefix
    pub fn calls(&self) -> Vec<String> {
        let prefix = format!("{}:", self.name);
        self.journal
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .filter_map(|entry| entry.strip_prefix(&prefix).map(str::to_string))
            .collect()
    }

    /// Number of tag creations and pushes recorded for this repo
    pub fn mutation_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.starts_with("create_tag") || call.starts_with("push_tag"))
            .count()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, call: impl AsRef<str>) {
        self.journal
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(format!("{}:{}", self.name, call.as_ref()));
    }
}

/// Deterministic commit id for tests
pub fn commit_id(seed: u8) -> CommitId {
    // 20 bytes is always a valid SHA-1 length
    Oid::from_bytes(&[seed; 20]).unwrap_or_else(|_| Oid::zero())
}

impl VcsGateway for MockGateway {
    fn fetch(&self) -> Result<()> {
        self.record("fetch");
        Ok(())
    }

    fn remote_url(&self) -> Result<Option<String>> {
        self.record("remote_url");
        Ok(self.state().remote_url.clone())
    }

    fn is_clean(&self) -> Result<bool> {
        self.record("is_clean");
        Ok(self.state().clean)
    }

    fn current_branch(&self) -> Result<HeadState> {
        self.record("current_branch");
        Ok(self.state().head.clone())
    }

    fn head_commit(&self) -> Result<CommitId> {
        self.record("head_commit");
        Ok(self.state().head_commit)
    }

    fn remote_tracking_head(&self, branch: &str) -> Result<Option<CommitId>> {
        self.record(format!("remote_tracking_head:{}", branch));
        Ok(self.state().upstream)
    }

    fn tag_exists_local(&self, tag: &str) -> Result<bool> {
        self.record(format!("tag_exists_local:{}", tag));
        Ok(self.state().local_tags.contains_key(tag))
    }

    fn tag_exists_remote(&self, tag: &str) -> Result<bool> {
        self.record(format!("tag_exists_remote:{}", tag));
        Ok(self.state().remote_tags.contains(tag))
    }

    fn create_tag(&self, tag: &str, commit: CommitId, _message: &str) -> Result<()> {
        self.record(format!("create_tag:{}", tag));
        let mut state = self.state();
        if state.fail_create {
            return Err(ReleaseError::tag(format!("Cannot create tag '{}'", tag)));
        }
        if state.local_tags.contains_key(tag) {
            return Err(ReleaseError::tag(format!("Tag '{}' already exists", tag)));
        }
        state.local_tags.insert(tag.to_string(), commit);
        Ok(())
    }

    fn push_tag(&self, tag: &str) -> Result<()> {
        self.record(format!("push_tag:{}", tag));
        let mut state = self.state();
        if state.fail_push {
            return Err(ReleaseError::remote(format!("Push failed for refs/tags/{}", tag)));
        }
        if !state.local_tags.contains_key(tag) {
            return Err(ReleaseError::remote(format!("No local tag '{}' to push", tag)));
        }
        state.remote_tags.insert(tag.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_gateway_defaults() {
        let repo = MockGateway::new("a");
        assert!(repo.is_clean().unwrap());
        assert_eq!(
            repo.current_branch().unwrap(),
            HeadState::Branch("main".to_string())
        );
        assert_eq!(
            repo.remote_tracking_head("main").unwrap(),
            Some(repo.head_commit().unwrap())
        );
        assert!(!repo.tag_exists_local("v1.0.0").unwrap());
        assert!(!repo.tag_exists_remote("v1.0.0").unwrap());
    }

    #[test]
    fn test_create_then_push_publishes_tag() {
        let repo = MockGateway::new("a");
        let head = repo.head_commit().unwrap();

        repo.create_tag("v1.0.0", head, "Release v1.0.0").unwrap();
        assert_eq!(repo.local_tag("v1.0.0"), Some(head));
        assert!(!repo.has_remote_tag("v1.0.0"));

        repo.push_tag("v1.0.0").unwrap();
        assert!(repo.has_remote_tag("v1.0.0"));
        assert_eq!(repo.mutation_count(), 2);
    }

    #[test]
    fn test_create_existing_tag_fails() {
        let repo = MockGateway::new("a");
        repo.add_local_tag("v1.0.0", commit_id(9));
        assert!(repo.create_tag("v1.0.0", commit_id(1), "x").is_err());
    }

    #[test]
    fn test_push_failure_keeps_local_tag() {
        let repo = MockGateway::new("a");
        repo.fail_push(true);
        repo.create_tag("v1.0.0", commit_id(1), "x").unwrap();

        assert!(repo.push_tag("v1.0.0").is_err());
        assert!(repo.local_tag("v1.0.0").is_some());
        assert!(!repo.has_remote_tag("v1.0.0"));
    }

    #[test]
    fn test_detach_head() {
        let repo = MockGateway::new("a");
        repo.set_head_commit(commit_id(7));
        repo.detach_head();
        assert_eq!(
            repo.current_branch().unwrap(),
            HeadState::Detached(commit_id(7))
        );
    }

    #[test]
    fn test_shared_journal_keeps_order_across_repos() {
        let journal = new_journal();
        let a = MockGateway::with_journal("A", journal.clone());
        let b = MockGateway::with_journal("B", journal.clone());

        a.fetch().unwrap();
        b.fetch().unwrap();
        a.is_clean().unwrap();

        let entries = journal.lock().unwrap().clone();
        assert_eq!(entries, vec!["A:fetch", "B:fetch", "A:is_clean"]);
        assert_eq!(a.calls(), vec!["fetch", "is_clean"]);
        assert_eq!(b.calls(), vec!["fetch"]);
    }
}
