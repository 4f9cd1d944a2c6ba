//! `omr data`: where data comes from, which variables are set, and the loaded documents.

use std::collections::BTreeMap;

use model_registry::config::ENV_VARS;
use model_registry::DataSource;
use serde_json::{json, Value};

use crate::args::{DumpArgs, ViewArgs};
use crate::context::Context;
use crate::error::CliError;
use crate::output::{cell, emit, Report, Table};

fn source_kind(source: &DataSource) -> &'static str {
    match source {
        DataSource::ExplicitPath(_) => "explicit_path",
        DataSource::UserDir(_) => "user_dir",
        DataSource::Bundled => "bundled",
    }
}

fn source_path(source: &DataSource) -> Option<String> {
    match source {
        DataSource::ExplicitPath(p) | DataSource::UserDir(p) => Some(p.display().to_string()),
        DataSource::Bundled => None,
    }
}

pub fn paths(ctx: &Context) -> Result<(), CliError> {
    let registry = ctx.registry()?;
    let active = registry.active_source();
    let data_version = registry.data_version().map(|v| v.to_string());
    let config_file = config::config_path(config::APP_NAME).ok();
    let dotenv_file = config::dotenv_path(None);
    let rejected = registry.rejected_sources();

    let candidates: Vec<Value> = ctx
        .config
        .sources
        .iter()
        .map(|s| {
            json!({
                "kind": source_kind(s),
                "path": source_path(s),
                "active": *s == active,
            })
        })
        .collect();
    let data = json!({
        "active_source": {"kind": source_kind(&active), "path": source_path(&active)},
        "data_version": data_version,
        "candidates": candidates,
        "user_data_dir": ctx.config.user_data_dir.as_ref().map(|p| p.display().to_string()),
        "config_file": config_file.as_ref().map(|p| p.display().to_string()),
        "config_file_exists": config_file.as_ref().map(|p| p.is_file()).unwrap_or(false),
        "dotenv_file": dotenv_file.as_ref().map(|p| p.display().to_string()),
        "rejected": rejected
            .iter()
            .map(|r| json!({"source": r.source.to_string(), "error": r.error}))
            .collect::<Vec<_>>(),
    });

    let mut pairs = vec![
        ("active source", active.to_string()),
        ("data version", cell(data_version.as_ref())),
    ];
    for (i, source) in ctx.config.sources.iter().enumerate() {
        let marker = if *source == active { " (active)" } else { "" };
        pairs.push(("candidate", format!("{}. {}{}", i + 1, source, marker)));
    }
    pairs.push((
        "user data dir",
        cell(ctx.config.user_data_dir.as_ref().map(|p| p.display())),
    ));
    pairs.push(("config file", cell(config_file.as_ref().map(|p| p.display()))));
    pairs.push((".env file", cell(dotenv_file.as_ref().map(|p| p.display()))));
    for r in &rejected {
        pairs.push(("rejected", format!("{}: {}", r.source, r.error)));
    }

    emit(&Report::with_table(data, Table::key_value(pairs)), ctx.format, None)
}

/// Every variable the registry reads, plus any other `OMR_*` variable that is set.
pub fn env(ctx: &Context) -> Result<(), CliError> {
    let mut vars: BTreeMap<String, Option<String>> = ENV_VARS
        .iter()
        .map(|k| (k.to_string(), std::env::var(k).ok()))
        .collect();
    for (key, value) in std::env::vars() {
        if key.starts_with("OMR_") {
            vars.insert(key, Some(value));
        }
    }

    let mut table = Table::new(["VARIABLE", "VALUE"]);
    for (key, value) in &vars {
        table.push(vec![key.clone(), cell(value.as_ref())]);
    }
    let data = serde_json::to_value(&vars).map_err(|e| CliError::Render {
        format: ctx.format.name(),
        message: e.to_string(),
    })?;
    emit(&Report::with_table(data, table), ctx.format, None)
}

pub fn dump(ctx: &Context, args: &DumpArgs) -> Result<(), CliError> {
    let registry = ctx.registry()?;
    let data = match args.view {
        ViewArgs { raw: true, .. } => registry.dump_raw()?,
        _ => registry.dump_effective(ctx.provider())?,
    };
    emit(&Report::document(data), ctx.format, args.output.as_deref())
}
