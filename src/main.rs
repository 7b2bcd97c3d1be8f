use clap::Parser;

use release_orchestrator::cli::{self, Cli, Command};
use release_orchestrator::{telemetry, ui};

fn main() {
    let args = Cli::parse();
    telemetry::init_tracing(args.log_json, telemetry::level_for_verbosity(args.verbose));

    let result = match args.command {
        Command::ReleaseIso(release) => cli::run_release_workflow(&release.into()),
    };

    if let Err(e) = result {
        ui::display_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}
