use crate::domain::AssetPattern;
use std::path::PathBuf;

/// A repository taking part in the release train
///
/// Descriptors are built once from configuration and kept in release order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoDescriptor {
    /// Repository name on the release host (e.g., "installer-kernel")
    pub name: String,
    /// Local clone
    pub path: PathBuf,
    /// Assets the repo's release must publish before the train moves on
    pub assets: Vec<AssetPattern>,
    /// Expected `{owner}/{name}` fragment of the remote URL, if it is checked
    pub expected_remote: Option<String>,
}

impl RepoDescriptor {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        RepoDescriptor {
            name: name.into(),
            path: path.into(),
            assets: Vec::new(),
            expected_remote: None,
        }
    }

    pub fn with_assets<I, S>(mut self, assets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.assets = assets.into_iter().map(AssetPattern::new).collect();
        self
    }

    pub fn with_expected_remote(mut self, fragment: impl Into<String>) -> Self {
        self.expected_remote = Some(fragment.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let repo = RepoDescriptor::new("installer", "/src/installer")
            .with_assets(["a.tar.gz", "a.sha256"])
            .with_expected_remote("Truthdb/installer");

        assert_eq!(repo.name, "installer");
        assert_eq!(repo.assets.len(), 2);
        assert_eq!(repo.assets[1].template, "a.sha256");
        assert_eq!(repo.expected_remote.as_deref(), Some("Truthdb/installer"));
    }

    #[test]
    fn test_defaults() {
        let repo = RepoDescriptor::new("truthdb", "truthdb");
        assert!(repo.assets.is_empty());
        assert!(repo.expected_remote.is_none());
    }
}
