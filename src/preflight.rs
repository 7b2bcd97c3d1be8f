//! Per-repo safety checks run before any tag is created.
//!
//! Checks run in a fixed order and stop at the first failure:
//!
//! 0. remote URL matches `{owner}/{name}` (only when configured)
//! 1. working tree is clean
//! 2. HEAD is on a named branch
//! 3. local branch head equals its upstream head
//! 4. the tag does not exist locally
//! 5. the tag does not exist on the remote
//!
//! The checker only reads repository state. Whether a remote tag means
//! "abort" or "skip" is decided by the orchestrator.

use crate::domain::RepoDescriptor;
use crate::error::Result;
use crate::git::{CommitId, HeadState, VcsGateway};
use std::fmt;

/// Why a repo is not safe to tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreflightFailure {
    RemoteMismatch {
        expected: String,
        actual: Option<String>,
    },
    DirtyTree,
    Detached {
        commit: CommitId,
    },
    Diverged {
        branch: String,
        local: CommitId,
        /// `None` when the branch has no upstream
        remote: Option<CommitId>,
    },
    TagExistsLocally {
        tag: String,
    },
    TagExistsRemote {
        tag: String,
    },
}

impl fmt::Display for PreflightFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreflightFailure::RemoteMismatch { expected, actual } => match actual {
                Some(url) => write!(
                    f,
                    "remote does not look like {} (got: {}); refusing to push tags",
                    expected, url
                ),
                None => write!(f, "no remote configured; expected {}", expected),
            },
            PreflightFailure::DirtyTree => write!(
                f,
                "working tree has uncommitted or untracked changes; commit or stash them"
            ),
            PreflightFailure::Detached { commit } => write!(
                f,
                "HEAD is detached at {}; check out a branch first",
                short(commit)
            ),
            PreflightFailure::Diverged {
                branch,
                local,
                remote,
            } => match remote {
                Some(remote) => write!(
                    f,
                    "branch '{}' is not in sync with its upstream (local {}, remote {}); pull or push first",
                    branch,
                    short(local),
                    short(remote)
                ),
                None => write!(f, "branch '{}' has no upstream configured", branch),
            },
            PreflightFailure::TagExistsLocally { tag } => write!(
                f,
                "tag {} already exists locally; delete it or choose another version",
                tag
            ),
            PreflightFailure::TagExistsRemote { tag } => write!(
                f,
                "tag {} already exists on the remote; re-run with --resume to continue",
                tag
            ),
        }
    }
}

fn short(commit: &CommitId) -> String {
    let full = commit.to_string();
    full.chars().take(7).collect()
}

/// Verdict of one preflight run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreflightResult {
    Pass,
    Fail(PreflightFailure),
}

impl PreflightResult {
    pub fn is_pass(&self) -> bool {
        matches!(self, PreflightResult::Pass)
    }

    pub fn failure(&self) -> Option<&PreflightFailure> {
        match self {
            PreflightResult::Pass => None,
            PreflightResult::Fail(failure) => Some(failure),
        }
    }
}

pub struct PreflightChecker {
    resume: bool,
}

impl PreflightChecker {
    /// Under `resume`, a local tag is tolerated when the remote already has it
    pub fn new(resume: bool) -> Self {
        PreflightChecker { resume }
    }

    /// Inspect `vcs` for tagging `repo` with `tag`
    ///
    /// Errors are backend failures; a failed check is `Ok(Fail(..))`.
    pub fn check(
        &self,
        repo: &RepoDescriptor,
        vcs: &dyn VcsGateway,
        tag: &str,
    ) -> Result<PreflightResult> {
        if let Some(expected) = &repo.expected_remote {
            let actual = vcs.remote_url()?;
            let matches = actual
                .as_deref()
                .is_some_and(|url| url.to_lowercase().contains(&expected.to_lowercase()));
            if !matches {
                return Ok(fail(PreflightFailure::RemoteMismatch {
                    expected: expected.clone(),
                    actual,
                }));
            }
        }

        if !vcs.is_clean()? {
            return Ok(fail(PreflightFailure::DirtyTree));
        }

        let branch = match vcs.current_branch()? {
            HeadState::Branch(name) => name,
            HeadState::Detached(commit) => {
                return Ok(fail(PreflightFailure::Detached { commit }));
            }
        };

        let local = vcs.head_commit()?;
        let remote = vcs.remote_tracking_head(&branch)?;
        if remote != Some(local) {
            return Ok(fail(PreflightFailure::Diverged {
                branch,
                local,
                remote,
            }));
        }

        let mut remote_tagged = None;
        if vcs.tag_exists_local(tag)? {
            if !self.resume {
                return Ok(fail(PreflightFailure::TagExistsLocally {
                    tag: tag.to_string(),
                }));
            }
            // Resumed: a local tag is fine if an earlier run already pushed it
            let on_remote = vcs.tag_exists_remote(tag)?;
            if !on_remote {
                return Ok(fail(PreflightFailure::TagExistsLocally {
                    tag: tag.to_string(),
                }));
            }
            remote_tagged = Some(on_remote);
        }

        let on_remote = match remote_tagged {
            Some(known) => known,
            None => vcs.tag_exists_remote(tag)?,
        };
        if on_remote {
            return Ok(fail(PreflightFailure::TagExistsRemote {
                tag: tag.to_string(),
            }));
        }

        Ok(PreflightResult::Pass)
    }
}

fn fail(failure: PreflightFailure) -> PreflightResult {
    PreflightResult::Fail(failure)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::mock::{commit_id, MockGateway};

    const TAG: &str = "v1.0.0";

    fn descriptor() -> RepoDescriptor {
        RepoDescriptor::new("a", "a")
    }

    fn check(repo: &MockGateway, resume: bool) -> PreflightResult {
        PreflightChecker::new(resume)
            .check(&descriptor(), repo, TAG)
            .unwrap()
    }

    #[test]
    fn test_clean_synced_untagged_passes() {
        let repo = MockGateway::new("a");
        assert_eq!(check(&repo, false), PreflightResult::Pass);
        assert_eq!(repo.mutation_count(), 0);
    }

    #[test]
    fn test_dirty_wins_over_detached() {
        let repo = MockGateway::new("a");
        repo.set_clean(false);
        repo.detach_head();

        assert_eq!(
            check(&repo, false),
            PreflightResult::Fail(PreflightFailure::DirtyTree)
        );
        // Short-circuits before the branch is inspected
        assert!(!repo.calls().contains(&"current_branch".to_string()));
    }

    #[test]
    fn test_detached() {
        let repo = MockGateway::new("a");
        repo.detach_head();
        assert!(matches!(
            check(&repo, false),
            PreflightResult::Fail(PreflightFailure::Detached { .. })
        ));
    }

    #[test]
    fn test_diverged_from_upstream() {
        let repo = MockGateway::new("a");
        repo.set_head_commit(commit_id(2));

        let result = check(&repo, false);
        assert_eq!(
            result,
            PreflightResult::Fail(PreflightFailure::Diverged {
                branch: "main".to_string(),
                local: commit_id(2),
                remote: Some(commit_id(1)),
            })
        );
    }

    #[test]
    fn test_missing_upstream_counts_as_diverged() {
        let repo = MockGateway::new("a");
        repo.set_upstream(None);

        let failure = check(&repo, true).failure().cloned().unwrap();
        assert!(matches!(
            failure,
            PreflightFailure::Diverged { remote: None, .. }
        ));
        assert!(failure.to_string().contains("no upstream"));
    }

    #[test]
    fn test_local_tag() {
        let repo = MockGateway::new("a");
        repo.add_local_tag(TAG, commit_id(1));
        assert_eq!(
            check(&repo, false),
            PreflightResult::Fail(PreflightFailure::TagExistsLocally {
                tag: TAG.to_string()
            })
        );
    }

    #[test]
    fn test_local_only_tag_fails_even_under_resume() {
        let repo = MockGateway::new("a");
        repo.add_local_tag(TAG, commit_id(1));
        assert!(matches!(
            check(&repo, true),
            PreflightResult::Fail(PreflightFailure::TagExistsLocally { .. })
        ));
    }

    #[test]
    fn test_remote_tag_reported_with_and_without_resume() {
        let repo = MockGateway::new("a");
        repo.add_remote_tag(TAG);

        let expected = PreflightResult::Fail(PreflightFailure::TagExistsRemote {
            tag: TAG.to_string(),
        });
        assert_eq!(check(&repo, false), expected);
        assert_eq!(check(&repo, true), expected);
    }

    #[test]
    fn test_pushed_tag_under_resume_is_reported_as_remote() {
        let repo = MockGateway::new("a");
        repo.add_local_tag(TAG, commit_id(1));
        repo.add_remote_tag(TAG);

        assert!(matches!(
            check(&repo, true),
            PreflightResult::Fail(PreflightFailure::TagExistsRemote { .. })
        ));
        let remote_queries = repo
            .calls()
            .iter()
            .filter(|c| c.starts_with("tag_exists_remote"))
            .count();
        assert_eq!(remote_queries, 1);
    }

    #[test]
    fn test_resume_does_not_relax_cleanliness() {
        let repo = MockGateway::new("a");
        repo.add_remote_tag(TAG);
        repo.set_clean(false);
        assert_eq!(
            check(&repo, true),
            PreflightResult::Fail(PreflightFailure::DirtyTree)
        );
    }

    #[test]
    fn test_remote_mismatch_checked_first() {
        let repo = MockGateway::new("a");
        repo.set_remote_url("git@github.com:someone-else/a.git");
        repo.set_clean(false);

        let descriptor = descriptor().with_expected_remote("Truthdb/a");
        let result = PreflightChecker::new(false)
            .check(&descriptor, &repo, TAG)
            .unwrap();
        assert!(matches!(
            result,
            PreflightResult::Fail(PreflightFailure::RemoteMismatch { .. })
        ));
    }

    #[test]
    fn test_remote_match_is_case_insensitive() {
        let repo = MockGateway::new("a");
        repo.set_remote_url("https://github.com/truthdb/A.git");

        let descriptor = descriptor().with_expected_remote("Truthdb/a");
        let result = PreflightChecker::new(false)
            .check(&descriptor, &repo, TAG)
            .unwrap();
        assert!(result.is_pass());
    }

    #[test]
    fn test_failure_messages_guide_the_operator() {
        let msg = PreflightFailure::TagExistsRemote {
            tag: TAG.to_string(),
        }
        .to_string();
        assert!(msg.contains("--resume"));

        let msg = PreflightFailure::Detached {
            commit: commit_id(0xab),
        }
        .to_string();
        assert!(msg.contains("abababa"));
    }
}
