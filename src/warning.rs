use std::fmt;

/// Non-fatal conditions noticed during a run.
/// These are reported to the operator but never stop the release train.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunWarning {
    /// Tag was already on the remote; tagging was skipped under `--resume`
    TagAlreadyPublished { repo: String, tag: String },
    /// Repo has no asset manifest, so its release was not waited for
    NoExpectedAssets { repo: String },
    /// No API token in the environment (only tolerated for dry runs)
    MissingToken,
}

impl fmt::Display for RunWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunWarning::TagAlreadyPublished { repo, tag } => write!(
                f,
                "{}: tag {} already on the remote; skipping tag creation",
                repo, tag
            ),
            RunWarning::NoExpectedAssets { repo } => write!(
                f,
                "{}: no expected assets configured; not waiting for a release",
                repo
            ),
            RunWarning::MissingToken => {
                write!(f, "GITHUB_TOKEN / GH_TOKEN not set; release API calls would fail")
            }
        }
    }
}
