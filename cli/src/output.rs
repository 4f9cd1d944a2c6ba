//! Rendering command results as table, json, yaml or csv.
//!
//! Every command builds a [`Report`]: the structured data (what json and yaml print) plus an
//! optional [`Table`] view. Reports without a table are nested documents; on `table` they
//! fall back to yaml and `csv` refuses them.

use std::io::Write;
use std::path::Path;

use serde_json::Value;

use crate::args::Format;
use crate::error::CliError;

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Two-column FIELD/VALUE table.
    pub fn key_value<K: Into<String>>(pairs: impl IntoIterator<Item = (K, String)>) -> Self {
        let mut table = Table::new(["FIELD", "VALUE"]);
        for (k, v) in pairs {
            table.push(vec![k.into(), v]);
        }
        table
    }

    pub fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Space-aligned columns; the last column is not padded.
    pub fn to_aligned(&self) -> String {
        let columns = self.headers.len();
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.chars().count()).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate().take(columns) {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }
        let mut out = String::new();
        for row in std::iter::once(&self.headers).chain(self.rows.iter()) {
            let mut line = String::new();
            for (i, cell) in row.iter().enumerate().take(columns) {
                if i + 1 == columns {
                    line.push_str(cell);
                } else {
                    line.push_str(&format!("{:<width$}  ", cell, width = widths[i]));
                }
            }
            out.push_str(line.trim_end());
            out.push('\n');
        }
        out
    }

    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        for row in std::iter::once(&self.headers).chain(self.rows.iter()) {
            let cells: Vec<String> = row.iter().map(|c| csv_field(c)).collect();
            out.push_str(&cells.join(","));
            out.push('\n');
        }
        out
    }
}

fn csv_field(cell: &str) -> String {
    if cell.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}

#[derive(Debug, Clone)]
pub struct Report {
    data: Value,
    table: Option<Table>,
}

impl Report {
    /// Nested data with no tabular view.
    pub fn document(data: Value) -> Self {
        Self { data, table: None }
    }

    pub fn with_table(data: Value, table: Table) -> Self {
        Self {
            data,
            table: Some(table),
        }
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn render(&self, format: Format) -> Result<String, CliError> {
        match (format, &self.table) {
            (Format::Json, _) => serde_json::to_string_pretty(&self.data)
                .map(|s| s + "\n")
                .map_err(|e| render_error(format, e)),
            (Format::Yaml, _) | (Format::Table, None) => {
                serde_yaml::to_string(&self.data).map_err(|e| render_error(format, e))
            }
            (Format::Table, Some(table)) => Ok(table.to_aligned()),
            (Format::Csv, Some(table)) => Ok(table.to_csv()),
            (Format::Csv, None) => Err(CliError::Usage(
                "this output is nested; use --format json or --format yaml".to_string(),
            )),
        }
    }
}

fn render_error(format: Format, e: impl std::fmt::Display) -> CliError {
    CliError::Render {
        format: format.name(),
        message: e.to_string(),
    }
}

/// Renders `report` and writes it to `output`, or to stdout when `None`.
pub fn emit(report: &Report, format: Format, output: Option<&Path>) -> Result<(), CliError> {
    let text = report.render(format)?;
    match output {
        Some(path) => {
            std::fs::write(path, text.as_bytes()).map_err(|source| CliError::Write {
                path: path.to_path_buf(),
                source,
            })?;
            tracing::info!(path = %path.display(), format = format.name(), "output written");
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(text.as_bytes())?;
            stdout.flush()?;
        }
    }
    Ok(())
}

/// `-` for absent values in table cells.
pub fn cell<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}
