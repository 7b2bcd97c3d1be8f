use crate::domain::RepoDescriptor;
use crate::error::{ReleaseError, Result};
use crate::release::github::DEFAULT_API_URL;
use crate::stabilizer::StabilizerConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Represents the complete configuration for a release train.
///
/// Contains the release host owner, the git remote to tag, polling knobs and
/// the ordered list of participating repositories.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    #[serde(default = "default_owner")]
    pub owner: String,

    #[serde(default = "default_remote")]
    pub remote: String,

    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default)]
    pub polling: PollingConfig,

    /// Release order; earlier repos are fully released before later ones start
    #[serde(default = "default_repos")]
    pub repos: Vec<RepoConfig>,
}

fn default_owner() -> String {
    "Truthdb".to_string()
}

fn default_remote() -> String {
    "origin".to_string()
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_true() -> bool {
    true
}

/// Returns the default release train: kernel, installer, server, then the ISO.
fn default_repos() -> Vec<RepoConfig> {
    vec![
        RepoConfig::new("installer-kernel", &["BOOTX64.EFI"]),
        RepoConfig::new(
            "installer",
            &[
                "truthdb-installer-v{version}-x86_64-linux-musl.tar.gz",
                "truthdb-installer-v{version}-x86_64-linux-musl.sha256",
            ],
        ),
        RepoConfig::new(
            "truthdb",
            &[
                "truthdb-v{version}-x86_64-linux-gnu.tar.gz",
                "truthdb-v{version}-x86_64-linux-gnu.sha256",
            ],
        ),
        RepoConfig::new(
            "installer-iso",
            &[
                "truthdb-installer-v{version}.iso",
                "truthdb-installer-v{version}.iso.sha256",
            ],
        ),
    ]
}

/// Polling behaviour of the asset wait.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct PollingConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Per-repo wait budget
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Consecutive identical observations required before assets count as stable
    #[serde(default = "default_stable_polls")]
    pub stable_polls: u32,
}

fn default_interval_secs() -> u64 {
    10
}

fn default_timeout_secs() -> u64 {
    45 * 60
}

fn default_stable_polls() -> u32 {
    2
}

impl Default for PollingConfig {
    fn default() -> Self {
        PollingConfig {
            interval_secs: default_interval_secs(),
            timeout_secs: default_timeout_secs(),
            stable_polls: default_stable_polls(),
        }
    }
}

impl PollingConfig {
    pub fn stabilizer_config(&self) -> StabilizerConfig {
        StabilizerConfig {
            poll_interval: Duration::from_secs(self.interval_secs),
            max_wait: Duration::from_secs(self.timeout_secs),
            stable_polls: self.stable_polls,
        }
    }
}

/// One repository of the release train.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct RepoConfig {
    /// Repository name on the release host
    pub name: String,

    /// Clone directory relative to the repos root; defaults to `name`
    #[serde(default)]
    pub path: Option<String>,

    #[serde(default)]
    pub assets: Vec<String>,

    /// Require the remote URL to contain `{owner}/{name}`
    #[serde(default = "default_true")]
    pub verify_remote: bool,
}

impl RepoConfig {
    fn new(name: &str, assets: &[&str]) -> Self {
        RepoConfig {
            name: name.to_string(),
            path: None,
            assets: assets.iter().map(|a| a.to_string()).collect(),
            verify_remote: true,
        }
    }

    pub fn dir_name(&self) -> &str {
        self.path.as_deref().unwrap_or(&self.name)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            owner: default_owner(),
            remote: default_remote(),
            api_url: default_api_url(),
            polling: PollingConfig::default(),
            repos: default_repos(),
        }
    }
}

impl Config {
    /// Reject configurations the release train cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.owner.trim().is_empty() {
            return Err(ReleaseError::config("owner must not be empty"));
        }
        if self.repos.is_empty() {
            return Err(ReleaseError::config("at least one [[repos]] entry is required"));
        }

        let mut seen = HashSet::new();
        for repo in &self.repos {
            if repo.name.trim().is_empty() {
                return Err(ReleaseError::config("repo name must not be empty"));
            }
            if !seen.insert(repo.name.as_str()) {
                return Err(ReleaseError::config(format!(
                    "repo '{}' is listed more than once",
                    repo.name
                )));
            }
            if repo.assets.iter().any(|a| a.trim().is_empty()) {
                return Err(ReleaseError::config(format!(
                    "repo '{}' has an empty asset pattern",
                    repo.name
                )));
            }
        }

        if self.polling.interval_secs == 0 {
            return Err(ReleaseError::config("polling.interval_secs must be greater than 0"));
        }
        if self.polling.stable_polls == 0 {
            return Err(ReleaseError::config("polling.stable_polls must be at least 1"));
        }
        Ok(())
    }

    /// Build ordered descriptors for clones under `root`
    pub fn descriptors(&self, root: &Path) -> Vec<RepoDescriptor> {
        self.repos
            .iter()
            .map(|repo| {
                let descriptor = RepoDescriptor::new(&repo.name, root.join(repo.dir_name()))
                    .with_assets(repo.assets.iter().cloned());
                if repo.verify_remote {
                    descriptor.with_expected_remote(format!("{}/{}", self.owner, repo.name))
                } else {
                    descriptor
                }
            })
            .collect()
    }
}

/// Loads configuration from file or returns defaults.
///
/// Attempts to load configuration in the following order:
/// 1. Custom path provided as parameter
/// 2. `orchestrator.toml` in current directory
/// 3. `release-orchestrator.toml` in user config directory
/// 4. Default configuration if no file found
///
/// # Returns
/// * `Ok(Config)` - Loaded or default configuration
/// * `Err` - If file exists but cannot be read or parsed
pub fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let config_str = if let Some(path) = config_path {
        fs::read_to_string(path)?
    } else if Path::new("./orchestrator.toml").exists() {
        fs::read_to_string("./orchestrator.toml")?
    } else if let Some(config_dir) = dirs::config_dir() {
        let config_path = config_dir.join("release-orchestrator.toml");
        if config_path.exists() {
            fs::read_to_string(config_path)?
        } else {
            return Ok(Config::default());
        }
    } else {
        return Ok(Config::default());
    };

    let config: Config = toml::from_str(&config_str)?;
    Ok(config)
}

/// Find the directory holding every configured clone
///
/// An explicit root must contain them all. Otherwise `cwd` is tried, then
/// its parent, so the tool works from the workspace or from inside a repo.
pub fn resolve_repos_root(explicit: Option<&Path>, cwd: &Path, repos: &[RepoConfig]) -> Result<PathBuf> {
    let contains_all = |root: &Path| repos.iter().all(|r| root.join(r.dir_name()).is_dir());
    let expected = || {
        repos
            .iter()
            .map(RepoConfig::dir_name)
            .collect::<Vec<_>>()
            .join(", ")
    };

    if let Some(root) = explicit {
        if contains_all(root) {
            return Ok(root.to_path_buf());
        }
        return Err(ReleaseError::config(format!(
            "{} does not contain all of: {}",
            root.display(),
            expected()
        )));
    }

    if contains_all(cwd) {
        return Ok(cwd.to_path_buf());
    }
    if let Some(parent) = cwd.parent() {
        if contains_all(parent) {
            return Ok(parent.to_path_buf());
        }
    }

    Err(ReleaseError::config(format!(
        "could not find repo directories ({}) in {} or its parent; pass --repos-root",
        expected(),
        cwd.display()
    )))
}
