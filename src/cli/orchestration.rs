//! Release workflow wiring
//!
//! Builds the real gateways from configuration and hands them to the
//! orchestrator. Kept free of `clap` so it can be driven programmatically.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{load_config, resolve_repos_root, Config};
use crate::domain::VersionSpec;
use crate::git::Git2Gateway;
use crate::orchestrator::{OrchestratorRun, ReleaseOrchestrator, ReleaseTarget, RunOptions};
use crate::release::github::{token_from_env, TOKEN_ENV_VARS};
use crate::release::GitHubReleases;
use crate::ui;
use crate::warning::RunWarning;

/// Arguments for the release workflow
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReleaseWorkflowArgs {
    pub version: String,
    pub resume: bool,
    pub dry_run: bool,
    pub repos_root: Option<PathBuf>,
    pub owner: Option<String>,
    pub config_path: Option<PathBuf>,
    pub poll_interval_secs: Option<u64>,
    pub timeout_secs: Option<u64>,
    pub stable_polls: Option<u32>,
}

/// Apply command-line overrides on top of the loaded configuration
pub fn apply_overrides(config: &mut Config, args: &ReleaseWorkflowArgs) {
    if let Some(owner) = &args.owner {
        config.owner = owner.clone();
    }
    if let Some(secs) = args.poll_interval_secs {
        config.polling.interval_secs = secs;
    }
    if let Some(secs) = args.timeout_secs {
        config.polling.timeout_secs = secs;
    }
    if let Some(n) = args.stable_polls {
        config.polling.stable_polls = n;
    }
}

/// Main release workflow
///
/// 1. Parse the version (before anything else is touched)
/// 2. Load, override and validate configuration
/// 3. Resolve the API token and the repos root
/// 4. Open every clone and run the release train
///
/// Prints warnings and a summary whether or not the run succeeds.
pub fn run_release_workflow(args: &ReleaseWorkflowArgs) -> Result<()> {
    let version = VersionSpec::parse(&args.version)?;

    let mut config = load_config(args.config_path.as_deref()).context("Failed to load configuration")?;
    apply_overrides(&mut config, args);
    config.validate()?;

    let mut warnings = Vec::new();
    let token = match token_from_env() {
        Some(token) => token,
        None if args.dry_run => {
            warnings.push(RunWarning::MissingToken);
            String::new()
        }
        None => bail!(
            "No release API token found; set {} (or {})",
            TOKEN_ENV_VARS[0],
            TOKEN_ENV_VARS[1]
        ),
    };

    let cwd = std::env::current_dir().context("Cannot determine current directory")?;
    let root = resolve_repos_root(args.repos_root.as_deref(), &cwd, &config.repos)?;
    ui::display_status(&format!("Using repos under {}", root.display()));

    let targets = open_targets(&config, &root)?;
    let releases = GitHubReleases::new(&config.owner, token)?.with_api_url(&config.api_url)?;
    let orchestrator = ReleaseOrchestrator::new(Arc::new(releases), config.polling.stabilizer_config());

    let options = RunOptions {
        resume: args.resume,
        dry_run: args.dry_run,
    };
    let mut run = OrchestratorRun::new(version, targets, options)?;
    for warning in warnings {
        run.add_warning(warning);
    }

    ui::display_run_header(run.version().tag(), &run.repo_names(), args.dry_run);
    let result = orchestrator.run(&mut run);

    for warning in run.warnings() {
        ui::display_warning(warning);
    }
    ui::display_summary(run.version().tag(), run.reports(), run.repo_names().len());

    result?;
    Ok(())
}

fn open_targets(config: &Config, root: &Path) -> Result<Vec<ReleaseTarget>> {
    config
        .descriptors(root)
        .into_iter()
        .map(|descriptor| {
            let vcs = Git2Gateway::open(&descriptor.path, &config.remote).with_context(|| {
                format!(
                    "Cannot open repository {} at {}",
                    descriptor.name,
                    descriptor.path.display()
                )
            })?;
            Ok(ReleaseTarget::new(descriptor, Arc::new(vcs)))
        })
        .collect()
}
