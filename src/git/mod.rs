//! VCS gateway abstraction layer
//!
//! This module provides a trait-based abstraction over the repository
//! operations the release train needs, allowing the orchestrator to run
//! against real clones or against in-memory fakes.
//!
//! # Overview
//!
//! The primary abstraction is the [VcsGateway] trait. The concrete
//! implementations are:
//!
//! - [repository::Git2Gateway]: A real implementation using the `git2` crate
//! - [mock::MockGateway]: An in-memory implementation for testing
//!
//! # Usage
//!
//! Code should depend on the [VcsGateway] trait rather than concrete
//! implementations.
//!
//! ```rust
//! # use release_orchestrator::git::{HeadState, VcsGateway};
//! # fn example(repo: &dyn VcsGateway) -> release_orchestrator::Result<()> {
//! if let HeadState::Branch(branch) = repo.current_branch()? {
//!     let upstream = repo.remote_tracking_head(&branch)?;
//!     println!("{} tracks {:?}", branch, upstream);
//! }
//! # Ok(())
//! # }
//! ```

pub mod mock;
pub mod repository;

pub use mock::MockGateway;
pub use repository::Git2Gateway;

use crate::error::Result;

/// Commit identifier
pub type CommitId = git2::Oid;

/// What HEAD currently points at
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeadState {
    /// HEAD is a named local branch
    Branch(String),
    /// HEAD points directly at a commit
    Detached(CommitId),
}

/// Repository capability used by preflight and tagging
///
/// All implementors must be `Send + Sync`. Every method except [fetch],
/// [create_tag] and [push_tag] is purely observational.
///
/// Implementations map backend failures (like `git2::Error`) onto
/// [crate::error::ReleaseError] variants.
///
/// [fetch]: VcsGateway::fetch
/// [create_tag]: VcsGateway::create_tag
/// [push_tag]: VcsGateway::push_tag
pub trait VcsGateway: Send + Sync {
    /// Refresh remote-tracking branches and tags from the remote
    fn fetch(&self) -> Result<()>;

    /// URL of the remote tags are pushed to, if the remote exists
    fn remote_url(&self) -> Result<Option<String>>;

    /// Whether the working tree has no staged, unstaged or untracked changes
    fn is_clean(&self) -> Result<bool>;

    /// The branch HEAD is on, or the commit it is detached at
    fn current_branch(&self) -> Result<HeadState>;

    /// Commit at HEAD
    fn head_commit(&self) -> Result<CommitId>;

    /// Commit at the configured upstream of `branch`
    ///
    /// # Returns
    /// * `Ok(Some(oid))` - The remote-tracking branch head
    /// * `Ok(None)` - The branch has no upstream configured
    fn remote_tracking_head(&self, branch: &str) -> Result<Option<CommitId>>;

    /// Whether `refs/tags/{tag}` exists locally
    fn tag_exists_local(&self, tag: &str) -> Result<bool>;

    /// Whether `refs/tags/{tag}` exists on the remote
    ///
    /// Queries the remote directly instead of trusting fetched refs.
    fn tag_exists_remote(&self, tag: &str) -> Result<bool>;

    /// Create an annotated tag at `commit`
    ///
    /// # Returns
    /// * `Ok(())` - Success
    /// * `Err` - If the tag already exists or the commit cannot be found
    fn create_tag(&self, tag: &str, commit: CommitId, message: &str) -> Result<()>;

    /// Push a single tag to the remote
    fn push_tag(&self, tag: &str) -> Result<()>;
}
