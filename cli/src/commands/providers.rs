use serde_json::json;

use crate::context::Context;
use crate::error::CliError;
use crate::output::{emit, Report, Table};

pub fn list(ctx: &Context) -> Result<(), CliError> {
    let registry = ctx.registry()?;
    let providers = registry.list_providers();
    let current = ctx.provider();

    let mut table = Table::new(["PROVIDER", "CURRENT"]);
    for p in &providers {
        let marker = if p == current { "*" } else { "" };
        table.push(vec![p.clone(), marker.to_string()]);
    }
    let data = json!({"providers": providers, "current": current});
    emit(&Report::with_table(data, table), ctx.format, None)
}

pub fn current(ctx: &Context) -> Result<(), CliError> {
    let provider = ctx.provider();
    let source = ctx.provider_source.name();
    let mut table = Table::new(["PROVIDER", "SOURCE"]);
    table.push(vec![provider.to_string(), source.to_string()]);
    let data = json!({"provider": provider, "source": source});
    emit(&Report::with_table(data, table), ctx.format, None)
}
