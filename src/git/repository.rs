use crate::error::{ReleaseError, Result};
use crate::git::{CommitId, HeadState, VcsGateway};
use git2::{
    AutotagOption, BranchType, Cred, CredentialType, Direction, ErrorCode, FetchOptions,
    PushOptions, RemoteCallbacks, Repository, Signature, StatusOptions,
};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Wrapper around git2::Repository implementing [VcsGateway]
///
/// `git2::Repository` is `Send` but not `Sync`, so access is serialized.
pub struct Git2Gateway {
    repo: Mutex<Repository>,
    remote: String,
}

impl Git2Gateway {
    /// Open the clone at `path`, pushing tags to `remote`
    ///
    /// Unlike discovery, this never walks up into a parent repository.
    pub fn open<P: AsRef<Path>>(path: P, remote: impl Into<String>) -> Result<Self> {
        let repo = Repository::open(path)?;

        Ok(Git2Gateway {
            repo: Mutex::new(repo),
            remote: remote.into(),
        })
    }

    /// Create from existing git2::Repository
    pub fn from_git2(repo: Repository, remote: impl Into<String>) -> Self {
        Git2Gateway {
            repo: Mutex::new(repo),
            remote: remote.into(),
        }
    }

    fn repo(&self) -> MutexGuard<'_, Repository> {
        self.repo.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl VcsGateway for Git2Gateway {
    fn fetch(&self) -> Result<()> {
        let repo = self.repo();
        let mut remote = repo.find_remote(&self.remote).map_err(|e| {
            ReleaseError::remote(format!("Cannot find remote '{}': {}", self.remote, e))
        })?;

        let mut fetch_options = FetchOptions::new();
        fetch_options.remote_callbacks(remote_callbacks(repo.config().ok()));
        // Tags stay remote-only; tag_exists_remote asks the remote directly
        fetch_options.download_tags(AutotagOption::None);

        let refspec_heads = format!("+refs/heads/*:refs/remotes/{}/*", self.remote);
        remote
            .fetch(&[refspec_heads.as_str()], Some(&mut fetch_options), None)
            .map_err(|e| {
                ReleaseError::remote(format!(
                    "Failed to fetch from remote '{}': {}",
                    self.remote, e
                ))
            })?;

        Ok(())
    }

    fn remote_url(&self) -> Result<Option<String>> {
        let repo = self.repo();
        let url = match repo.find_remote(&self.remote) {
            Ok(remote) => Ok(remote.url().map(str::to_string)),
            Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        };
        url
    }

    fn is_clean(&self) -> Result<bool> {
        let repo = self.repo();
        let mut options = StatusOptions::new();
        options
            .include_untracked(true)
            .recurse_untracked_dirs(true)
            .include_ignored(false);

        let statuses = repo.statuses(Some(&mut options))?;
        Ok(statuses.is_empty())
    }

    fn current_branch(&self) -> Result<HeadState> {
        let repo = self.repo();

        if repo.head_detached()? {
            let oid = repo.head()?.peel_to_commit()?.id();
            return Ok(HeadState::Detached(oid));
        }

        let head = repo.head()?;
        let name = head
            .shorthand()
            .ok_or_else(|| git2::Error::from_str("HEAD branch name is not valid UTF-8"))?;

        Ok(HeadState::Branch(name.to_string()))
    }

    fn head_commit(&self) -> Result<CommitId> {
        let repo = self.repo();
        let commit = repo.head()?.peel_to_commit()?;
        Ok(commit.id())
    }

    fn remote_tracking_head(&self, branch: &str) -> Result<Option<CommitId>> {
        let repo = self.repo();
        let local = repo.find_branch(branch, BranchType::Local).map_err(|e| {
            ReleaseError::remote(format!("Cannot find branch '{}': {}", branch, e))
        })?;

        let head = match local.upstream() {
            Ok(upstream) => {
                let commit = upstream.into_reference().peel_to_commit()?;
                Ok(Some(commit.id()))
            }
            Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        };
        head
    }

    fn tag_exists_local(&self, tag: &str) -> Result<bool> {
        let repo = self.repo();
        let reference_name = format!("refs/tags/{}", tag);

        let exists = match repo.find_reference(&reference_name) {
            Ok(_) => Ok(true),
            Err(e) if e.code() == ErrorCode::NotFound => Ok(false),
            Err(e) => Err(ReleaseError::tag(format!(
                "Cannot look up tag '{}': {}",
                tag, e
            ))),
        };
        exists
    }

    fn tag_exists_remote(&self, tag: &str) -> Result<bool> {
        let repo = self.repo();
        let mut remote = repo.find_remote(&self.remote).map_err(|e| {
            ReleaseError::remote(format!("Cannot find remote '{}': {}", self.remote, e))
        })?;

        let connection = remote
            .connect_auth(
                Direction::Fetch,
                Some(remote_callbacks(repo.config().ok())),
                None,
            )
            .map_err(|e| {
                ReleaseError::remote(format!(
                    "Cannot query tags on remote '{}': {}",
                    self.remote, e
                ))
            })?;

        let reference_name = format!("refs/tags/{}", tag);
        let found = connection
            .list()?
            .iter()
            .any(|head| head.name() == reference_name);

        Ok(found)
    }

    fn create_tag(&self, tag: &str, commit: CommitId, message: &str) -> Result<()> {
        let repo = self.repo();
        let object = repo
            .find_object(commit, None)
            .map_err(|e| ReleaseError::tag(format!("Cannot find commit {}: {}", commit, e)))?;

        let signature = repo
            .signature()
            .or_else(|_| Signature::now("release-orchestrator", "release-orchestrator@localhost"))?;

        repo.tag(tag, &object, &signature, message, false)
            .map_err(|e| ReleaseError::tag(format!("Cannot create tag '{}': {}", tag, e)))?;

        Ok(())
    }

    fn push_tag(&self, tag: &str) -> Result<()> {
        let repo = self.repo();
        let mut remote = repo.find_remote(&self.remote).map_err(|e| {
            ReleaseError::remote(format!("No remote named '{}' found: {}", self.remote, e))
        })?;

        let mut callbacks = remote_callbacks(repo.config().ok());

        // A rejected ref does not fail `push` itself; surface it here
        callbacks.push_update_reference(|refname, status| match status {
            Some(status) => Err(git2::Error::from_str(&format!(
                "remote rejected {}: {}",
                refname, status
            ))),
            None => Ok(()),
        });

        let mut push_options = PushOptions::new();
        push_options.remote_callbacks(callbacks);

        let refspec = format!("refs/tags/{0}:refs/tags/{0}", tag);
        match remote.push(&[refspec.as_str()], Some(&mut push_options)) {
            Ok(()) => Ok(()),
            Err(e) if e.class() == git2::ErrorClass::Net => Err(ReleaseError::remote(format!(
                "Network error during push of '{}': {}",
                tag, e
            ))),
            Err(e) => Err(ReleaseError::remote(format!(
                "Failed to push tag '{}': {}",
                tag, e
            ))),
        }
    }
}

/// Credential callbacks for fetch, ls-remote and push.
///
/// SSH: keys from ~/.ssh in order of preference, then the SSH agent.
/// HTTPS: git credential helpers. Each candidate is offered once.
fn remote_callbacks<'a>(config: Option<git2::Config>) -> RemoteCallbacks<'a> {
    let mut callbacks = RemoteCallbacks::new();
    let mut attempt = 0usize;

    callbacks.credentials(move |url, username_from_url, allowed_types| {
        attempt += 1;
        let username = username_from_url.unwrap_or("git");

        if allowed_types.contains(CredentialType::SSH_KEY) {
            let keys = ssh_key_candidates();
            if attempt <= keys.len() {
                return Cred::ssh_key(username, None, &keys[attempt - 1], None);
            }
            if attempt == keys.len() + 1 {
                return Cred::ssh_key_from_agent(username);
            }
        }

        if allowed_types.contains(CredentialType::USER_PASS_PLAINTEXT) && attempt == 1 {
            if let Some(config) = &config {
                if let Ok(cred) = Cred::credential_helper(config, url, username_from_url) {
                    return Ok(cred);
                }
            }
        }

        if allowed_types.contains(CredentialType::DEFAULT) && attempt == 1 {
            return Cred::default();
        }

        Err(git2::Error::from_str(&format!(
            "no usable credentials for {}",
            url
        )))
    });

    callbacks
}

fn ssh_key_candidates() -> Vec<PathBuf> {
    let Some(home) = dirs::home_dir() else {
        return Vec::new();
    };

    ["id_ed25519", "id_rsa", "id_ecdsa"]
        .iter()
        .map(|name| home.join(".ssh").join(name))
        .filter(|path| path.exists())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_rejects_plain_directory() {
        let dir = tempfile::tempdir().unwrap();
        let result = Git2Gateway::open(dir.path(), "origin");
        assert!(matches!(result, Err(ReleaseError::Git(_))));
    }

    #[test]
    fn test_missing_remote_has_no_url() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let gateway = Git2Gateway::from_git2(repo, "origin");
        assert_eq!(gateway.remote_url().unwrap(), None);
    }

    #[test]
    fn test_empty_repo_is_clean() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let gateway = Git2Gateway::from_git2(repo, "origin");
        assert!(gateway.is_clean().unwrap());

        std::fs::write(dir.path().join("untracked.txt"), "x").unwrap();
        assert!(!gateway.is_clean().unwrap());
    }
}
