//! Operator-facing output.
//!
//! Diagnostics go through `tracing` (see [crate::telemetry]); this module
//! prints the status lines, warnings and final summary a person reads.

pub mod formatter;

pub use formatter::{
    display_error, display_run_header, display_status, display_summary,
    display_warning, format_repo_report,
};
