//! Domain logic - pure release values independent of git and release hosting

pub mod pattern;
pub mod repo;
pub mod version;

pub use pattern::{AssetMatcher, AssetPattern};
pub use repo::RepoDescriptor;
pub use version::VersionSpec;
