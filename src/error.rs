use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::preflight::PreflightFailure;

/// VCS operation that failed while a repo was being processed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VcsOp {
    Fetch,
    Inspect,
    CreateTag,
    PushTag,
}

impl fmt::Display for VcsOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VcsOp::Fetch => "fetch",
            VcsOp::Inspect => "repository inspection",
            VcsOp::CreateTag => "tag creation",
            VcsOp::PushTag => "tag push",
        };
        f.write_str(name)
    }
}

/// Unified error type for release orchestration
#[derive(Error, Debug)]
pub enum ReleaseError {
    #[error("Invalid version '{input}': {reason}")]
    InvalidVersion { input: String, reason: String },

    #[error("Preflight failed for {repo}: {failure}")]
    Preflight {
        repo: String,
        failure: PreflightFailure,
    },

    #[error("{op} failed for {repo}: {source}")]
    VcsOperation {
        repo: String,
        op: VcsOp,
        source: Box<ReleaseError>,
    },

    #[error("Release query failed for {repo}: {source}")]
    ReleaseQuery {
        repo: String,
        source: Box<ReleaseError>,
    },

    #[error("Release {tag} for {repo} did not appear within {}s", .waited.as_secs())]
    ReleaseNotFound {
        repo: String,
        tag: String,
        waited: Duration,
    },

    #[error(
        "Timed out after {}s waiting for {repo} {tag} assets to stabilize (unsatisfied: {missing:?})",
        .waited.as_secs()
    )]
    TimedOut {
        repo: String,
        tag: String,
        waited: Duration,
        missing: Vec<String>,
    },

    #[error("Cancelled while waiting for {repo}")]
    Cancelled { repo: String },

    #[error("Git operation failed: {0}")]
    Git(#[from] git2::Error),

    #[error("Tag error: {0}")]
    Tag(String),

    #[error("Remote operation failed: {0}")]
    Remote(String),

    #[error("Release API error: {0}")]
    Api(String),

    #[error("Release API unavailable: {0}")]
    ApiUnavailable(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for Results in release-orchestrator
pub type Result<T> = std::result::Result<T, ReleaseError>;

impl ReleaseError {
    /// Create a configuration error with context
    pub fn config(msg: impl Into<String>) -> Self {
        ReleaseError::Config(msg.into())
    }

    /// Create a tag error with context
    pub fn tag(msg: impl Into<String>) -> Self {
        ReleaseError::Tag(msg.into())
    }

    /// Create a remote error with context
    pub fn remote(msg: impl Into<String>) -> Self {
        ReleaseError::Remote(msg.into())
    }

    /// Create a release API error with context
    pub fn api(msg: impl Into<String>) -> Self {
        ReleaseError::Api(msg.into())
    }

    /// Wrap a backend error as a failed VCS operation on `repo`
    pub fn vcs(repo: impl Into<String>, op: VcsOp, source: ReleaseError) -> Self {
        ReleaseError::VcsOperation {
            repo: repo.into(),
            op,
            source: Box::new(source),
        }
    }

    /// Whether a poll loop may treat this error as "not ready yet"
    pub fn is_transient(&self) -> bool {
        match self {
            ReleaseError::ApiUnavailable(_) => true,
            ReleaseError::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// Name of the repo the run aborted at, if the error carries one
    pub fn repo(&self) -> Option<&str> {
        match self {
            ReleaseError::Preflight { repo, .. }
            | ReleaseError::VcsOperation { repo, .. }
            | ReleaseError::ReleaseQuery { repo, .. }
            | ReleaseError::ReleaseNotFound { repo, .. }
            | ReleaseError::TimedOut { repo, .. }
            | ReleaseError::Cancelled { repo } => Some(repo),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ReleaseError::config("test config issue");
        assert_eq!(err.to_string(), "Configuration error: test config issue");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ReleaseError = io_err.into();
        assert!(err.to_string().contains("I/O error"));
    }

    #[test]
    fn test_preflight_error_names_repo_and_reason() {
        let err = ReleaseError::Preflight {
            repo: "installer".to_string(),
            failure: PreflightFailure::DirtyTree,
        };
        let msg = err.to_string();
        assert!(msg.contains("installer"));
        assert!(msg.contains("uncommitted"));
        assert_eq!(err.repo(), Some("installer"));
    }

    #[test]
    fn test_vcs_operation_wraps_source() {
        let err = ReleaseError::vcs(
            "truthdb",
            VcsOp::PushTag,
            ReleaseError::remote("Push failed: denied"),
        );
        assert_eq!(
            err.to_string(),
            "tag push failed for truthdb: Remote operation failed: Push failed: denied"
        );
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_timeout_lists_missing_patterns() {
        let err = ReleaseError::TimedOut {
            repo: "installer-iso".to_string(),
            tag: "v1.0.0".to_string(),
            waited: Duration::from_secs(90),
            missing: vec!["truthdb-installer-v1.0.0.iso".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("90s"));
        assert!(msg.contains("truthdb-installer-v1.0.0.iso"));
    }

    #[test]
    fn test_transient_classification() {
        assert!(ReleaseError::ApiUnavailable("502".to_string()).is_transient());
        assert!(!ReleaseError::api("401").is_transient());
        assert!(!ReleaseError::config("x").is_transient());
    }

    #[test]
    fn test_low_level_errors_have_no_repo() {
        assert_eq!(ReleaseError::tag("x").repo(), None);
        assert_eq!(
            ReleaseError::Cancelled {
                repo: "a".to_string()
            }
            .repo(),
            Some("a")
        );
    }
}
