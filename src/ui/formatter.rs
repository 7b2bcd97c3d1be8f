//! Formatting functions for operator output.
//!
//! `format_*` functions are pure and testable; `display_*` functions print.

use crate::orchestrator::{AssetReport, RepoReport, TagAction};
use crate::warning::RunWarning;
use console::style;
use std::time::Duration;

/// Format and print an error message in red.
pub fn display_error(message: &str) {
    eprintln!("{} {}", style("ERROR:").red().bold(), message);
}

/// Format and print a status message with yellow arrow.
pub fn display_status(message: &str) {
    println!("{} {}", style("→").yellow(), message);
}

/// Display a run warning to the user.
pub fn display_warning(warning: &RunWarning) {
    eprintln!("{} {}", style("⚠ WARNING:").yellow(), warning);
}

/// Display what is about to be released, in order.
pub fn display_run_header(tag: &str, repos: &[&str], dry_run: bool) {
    let mode = if dry_run { " (dry run)" } else { "" };
    println!("\n{}{}", style(format!("Releasing {}", tag)).bold(), mode);
    for (i, repo) in repos.iter().enumerate() {
        println!("  {}. {}", i + 1, repo);
    }
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 60 {
        format!("{}m{:02}s", secs / 60, secs % 60)
    } else {
        format!("{}s", secs)
    }
}

/// One summary line for a finished repo (without styling)
pub fn format_repo_report(report: &RepoReport) -> String {
    let tag_part = match (&report.assets, report.action) {
        (AssetReport::Planned(_), TagAction::Created) => format!("would create and push {}", report.tag),
        (AssetReport::Planned(_), TagAction::Skipped) => format!("would skip {} (already on remote)", report.tag),
        (_, TagAction::Created) => format!("tagged {}", report.tag),
        (_, TagAction::Skipped) => format!("{} already tagged", report.tag),
    };

    let asset_part = match &report.assets {
        AssetReport::Stable {
            assets,
            polls,
            waited,
        } => format!(
            "{} asset(s) stable after {} poll(s) in {}",
            assets.len(),
            polls,
            format_duration(*waited)
        ),
        AssetReport::NotExpected => "no assets expected".to_string(),
        AssetReport::Planned(patterns) if patterns.is_empty() => "no assets expected".to_string(),
        AssetReport::Planned(patterns) => format!("would wait for {}", patterns.join(", ")),
    };

    format!("{}: {}; {}", report.repo, tag_part, asset_part)
}

/// Display the end-of-run summary.
///
/// # Arguments
/// * `tag` - The canonical tag of the run
/// * `reports` - Finished repos, in release order
/// * `total` - Number of repos in the train
pub fn display_summary(tag: &str, reports: &[RepoReport], total: usize) {
    println!("\n{}", style("Summary:").bold().underlined());
    for report in reports {
        println!("  {}", format_repo_report(report));
    }
    if reports.len() == total {
        println!("\n{} {} released to all {} repos", style("✓").green(), style(tag).cyan(), total);
    } else {
        println!(
            "\n{} {} of {} repos done; fix the problem above and re-run with {}",
            style("✗").red(),
            reports.len(),
            total,
            style("--resume").cyan()
        );
    }
}
