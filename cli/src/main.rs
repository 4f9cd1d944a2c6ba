//! `omr` binary: inspect, validate and update model registry data.
//!
//! Subcommands: `data`, `models`, `providers`, `update`, `cache`. See `omr --help`.

mod logging;

use std::process::ExitCode;

use clap::Parser;
use cli::{exit, Cli};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = config::load_and_apply(config::APP_NAME, None) {
        eprintln!("omr: {}", e);
        return ExitCode::from(exit::GENERIC_ERROR);
    }
    if let Err(e) = logging::init(cli.log_level()) {
        eprintln!("omr: logging: {}", e);
    }

    match cli::run(&cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::debug!(error = ?e, "command failed");
            eprintln!("omr: {}", e);
            ExitCode::from(e.exit_code())
        }
    }
}
