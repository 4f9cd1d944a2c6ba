//! `omr cache`: data installed by updates in the user data directory.

use std::io::{BufRead, IsTerminal, Write};
use std::path::PathBuf;

use model_registry::loader::read_version_info;
use model_registry::{clear_data_files, data_files_info, RegistryError, DATA_FILES};
use serde_json::json;

use crate::context::Context;
use crate::error::CliError;
use crate::output::{cell, emit, Report, Table};

fn data_dir(ctx: &Context) -> Result<PathBuf, CliError> {
    ctx.config.user_data_dir.clone().ok_or_else(|| {
        CliError::Registry(RegistryError::InvalidConfig(
            "no user data directory (set OMR_DATA_DIR)".to_string(),
        ))
    })
}

pub fn info(ctx: &Context) -> Result<(), CliError> {
    let dir = data_dir(ctx)?;
    let files = data_files_info(&dir);
    let version = read_version_info(&dir);
    let total: u64 = files.iter().map(|f| f.size).sum();

    let mut table = Table::new(["FILE", "EXISTS", "SIZE", "PATH"]);
    for f in &files {
        table.push(vec![
            f.name.clone(),
            if f.exists { "yes" } else { "no" }.to_string(),
            f.size.to_string(),
            f.path.display().to_string(),
        ]);
    }
    let data = json!({
        "directory": dir.display().to_string(),
        "installed_version": version.as_ref().map(|v| v.version.clone()),
        "installed_at": version.as_ref().map(|v| v.installed_at.to_rfc3339()),
        "total_size": total,
        "files": files,
    });
    emit(&Report::with_table(data, table), ctx.format, None)
}

/// Deletes installed data files. Without `--yes`, asks on a terminal and refuses otherwise.
pub fn clear(ctx: &Context, yes: bool) -> Result<(), CliError> {
    let dir = data_dir(ctx)?;
    let present: Vec<String> = data_files_info(&dir)
        .into_iter()
        .filter(|f| f.exists)
        .map(|f| f.name)
        .collect();

    if !present.is_empty() && !yes {
        if !std::io::stdin().is_terminal() {
            return Err(CliError::Usage(
                "refusing to delete data files without --yes when stdin is not a terminal".to_string(),
            ));
        }
        if !confirm(&format!(
            "Delete {} ({}) from {}? [y/N] ",
            present.len(),
            present.join(", "),
            dir.display()
        ))? {
            eprintln!("cancelled");
            return Ok(());
        }
    }

    let removed = clear_data_files(&dir, &DATA_FILES)?;
    let removed_names: Vec<String> = removed
        .iter()
        .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .collect();
    tracing::info!(dir = %dir.display(), count = removed_names.len(), "data files cleared");

    let mut table = Table::new(["REMOVED"]);
    for name in &removed_names {
        table.push(vec![name.clone()]);
    }
    if table.is_empty() {
        table.push(vec![cell(None::<&str>)]);
    }
    let data = json!({
        "directory": dir.display().to_string(),
        "removed": removed_names,
    });
    emit(&Report::with_table(data, table), ctx.format, None)
}

fn confirm(prompt: &str) -> Result<bool, CliError> {
    let mut stderr = std::io::stderr();
    stderr.write_all(prompt.as_bytes())?;
    stderr.flush()?;
    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}
