//! `omr` library: argument parsing, command dispatch and output formatting for the model
//! registry CLI.
//!
//! The binary loads file-based settings through the `config` crate, initializes logging, then
//! calls [`run`]. Commands read `OMR_*` through
//! [`RegistryConfig::from_env`](model_registry::RegistryConfig::from_env).

pub mod args;
pub mod commands;
mod context;
mod error;
pub mod output;

pub use args::{Cli, Command, Format};
pub use context::{Context, ProviderSource};
pub use error::{exit, CliError};

/// Runs the parsed command line; `Ok` carries the exit code (0, or 10 for an available update).
pub async fn run(cli: &Cli) -> Result<u8, CliError> {
    let ctx = Context::from_cli(cli)?;
    commands::dispatch(&ctx, &cli.command).await
}
