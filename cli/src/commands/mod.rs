//! One module per top-level subcommand. Each command loads what it needs, builds a
//! [`Report`](crate::output::Report) and emits it in the selected format.

pub mod cache;
pub mod data;
pub mod models;
pub mod providers;
pub mod update;

use model_registry::RefreshOptions;

use crate::args::{CacheCommand, Command, DataCommand, ModelsCommand, ProvidersCommand, UpdateCommand};
use crate::context::Context;
use crate::error::{exit, CliError};

/// Runs `command` and returns the process exit code.
pub async fn dispatch(ctx: &Context, command: &Command) -> Result<u8, CliError> {
    match command {
        Command::Data(DataCommand::Paths) => data::paths(ctx)?,
        Command::Data(DataCommand::Env) => data::env(ctx)?,
        Command::Data(DataCommand::Dump(args)) => data::dump(ctx, args)?,
        Command::Models(ModelsCommand::List { filter }) => models::list(ctx, filter.as_deref())?,
        Command::Models(ModelsCommand::Get(args)) => models::get(ctx, args)?,
        Command::Providers(ProvidersCommand::List) => providers::list(ctx)?,
        Command::Providers(ProvidersCommand::Current) => providers::current(ctx)?,
        Command::Update(UpdateCommand::Check) => return update::check(ctx).await,
        Command::Update(UpdateCommand::Apply { force }) => {
            let options = RefreshOptions {
                force: *force,
                validate_only: false,
            };
            return update::refresh(ctx, options).await;
        }
        Command::Update(UpdateCommand::Refresh { validate_only, force }) => {
            let options = RefreshOptions {
                force: *force,
                validate_only: *validate_only,
            };
            return update::refresh(ctx, options).await;
        }
        Command::Update(UpdateCommand::ShowConfig) => update::show_config(ctx)?,
        Command::Cache(CacheCommand::Info) => cache::info(ctx)?,
        Command::Cache(CacheCommand::Clear { yes }) => cache::clear(ctx, *yes)?,
    }
    Ok(exit::SUCCESS)
}
