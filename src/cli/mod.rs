//! Command-line surface
//!
//! `clap` parsing lives here; [orchestration] turns parsed arguments into a
//! configured run without depending on `clap`.

pub mod orchestration;

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

pub use orchestration::{run_release_workflow, ReleaseWorkflowArgs};

#[derive(Parser, Debug)]
#[command(
    name = "release-orchestrator",
    version,
    about = "Tag a multi-repo release train in order and wait for each release's assets"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, action = ArgAction::Count, global = true, help = "More diagnostic output (-v debug, -vv trace)")]
    pub verbose: u8,

    #[arg(long, global = true, help = "Emit diagnostic logs as JSON lines")]
    pub log_json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Tag every repo of the ISO release train and wait for its assets
    #[command(disable_version_flag = true)]
    ReleaseIso(ReleaseIsoArgs),
}

#[derive(clap::Args, Debug)]
pub struct ReleaseIsoArgs {
    #[arg(long, help = "Version to release, with or without a leading 'v'")]
    pub version: String,

    #[arg(long, help = "Skip repos whose tag is already on the remote")]
    pub resume: bool,

    #[arg(long, help = "Run preflight only; create, push and wait for nothing")]
    pub dry_run: bool,

    #[arg(long, value_name = "DIR", help = "Directory containing the repo clones")]
    pub repos_root: Option<PathBuf>,

    #[arg(long, value_name = "ORG", help = "Release host owner/organization")]
    pub owner: Option<String>,

    #[arg(short, long, value_name = "FILE", help = "Custom configuration file path")]
    pub config: Option<PathBuf>,

    #[arg(long, value_name = "SECS", help = "Seconds between release polls")]
    pub poll_interval_secs: Option<u64>,

    #[arg(long, value_name = "SECS", help = "Per-repo asset wait budget")]
    pub timeout_secs: Option<u64>,

    #[arg(long, value_name = "N", help = "Identical observations required before assets count as stable")]
    pub stable_polls: Option<u32>,
}

impl From<ReleaseIsoArgs> for ReleaseWorkflowArgs {
    fn from(args: ReleaseIsoArgs) -> Self {
        ReleaseWorkflowArgs {
            version: args.version,
            resume: args.resume,
            dry_run: args.dry_run,
            repos_root: args.repos_root,
            owner: args.owner,
            config_path: args.config,
            poll_interval_secs: args.poll_interval_secs,
            timeout_secs: args.timeout_secs,
            stable_polls: args.stable_polls,
        }
    }
}
