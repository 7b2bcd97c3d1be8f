//! Release query abstraction
//!
//! The orchestrator never creates releases; it only observes what CI
//! publishes for a tag. [ReleaseQueryService] is the read-only seam:
//!
//! - [github::GitHubReleases]: GitHub Releases REST API over `reqwest`
//! - [mock::MockReleaseService]: scripted observations for tests

pub mod github;
pub mod mock;

pub use github::GitHubReleases;
pub use mock::MockReleaseService;

use crate::error::Result;
use serde::Deserialize;

/// Upload state reported for a release asset
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetState {
    /// Fully uploaded
    Uploaded,
    /// Upload started but not finished
    Open,
    #[serde(other)]
    Unknown,
}

/// One asset attached to a release
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReleaseAsset {
    pub name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub state: Option<AssetState>,
    /// Content digest (e.g., "sha256:..."), when the host reports one
    #[serde(default)]
    pub digest: Option<String>,
}

impl ReleaseAsset {
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        ReleaseAsset {
            name: name.into(),
            size,
            state: Some(AssetState::Uploaded),
            digest: None,
        }
    }

    /// Whether the asset can be considered published
    ///
    /// An unreported state counts as uploaded; a zero size never does.
    pub fn is_complete(&self) -> bool {
        let uploaded = matches!(self.state, None | Some(AssetState::Uploaded));
        uploaded && self.size > 0
    }
}

/// A release as returned by the release host
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReleaseInfo {
    #[serde(default)]
    pub tag_name: String,
    /// Drafts are invisible to the public and never count as published
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

impl ReleaseInfo {
    pub fn new(tag_name: impl Into<String>, assets: Vec<ReleaseAsset>) -> Self {
        ReleaseInfo {
            tag_name: tag_name.into(),
            draft: false,
            assets,
        }
    }
}

/// Read-only access to hosted releases
pub trait ReleaseQueryService: Send + Sync {
    /// Fetch the release for `tag` in repository `repo`
    ///
    /// # Returns
    /// * `Ok(Some(release))` - The release exists
    /// * `Ok(None)` - No release has been published for the tag yet
    /// * `Err` - Authentication, transport or decoding failure
    fn get_release(&self, repo: &str, tag: &str) -> Result<Option<ReleaseInfo>>;
}
