//! `omr update`: check, apply and refresh data releases, and show the update policy.

use model_registry::{RefreshOptions, RefreshOutcome, ReleaseDescriptor, UpdateState};
use serde::Serialize;
use serde_json::json;

use crate::context::Context;
use crate::error::{exit, CliError};
use crate::output::{cell, emit, Report, Table};

/// One flat record per update outcome; absent fields are null in json.
#[derive(Debug, Default, Serialize)]
struct UpdateReport {
    status: &'static str,
    current_version: Option<String>,
    latest_version: Option<String>,
    tag: Option<String>,
    published_at: Option<String>,
    size: Option<u64>,
    html_url: Option<String>,
    notes: Option<String>,
    model_count: Option<usize>,
    generation: Option<u64>,
    reason: Option<String>,
}

impl UpdateReport {
    fn with_release(mut self, release: &ReleaseDescriptor) -> Self {
        self.latest_version = Some(release.version.to_string());
        self.tag = Some(release.tag.clone());
        self.published_at = release.published_at.clone();
        self.size = Some(release.size);
        self.html_url = release.html_url.clone();
        self.notes = release.notes.clone();
        self
    }

    fn from_state(state: &UpdateState, local_version: Option<String>) -> Self {
        let base = UpdateReport {
            status: state.name(),
            current_version: local_version,
            ..Default::default()
        };
        match state {
            UpdateState::AlreadyCurrent { current, latest } => UpdateReport {
                current_version: Some(current.to_string()),
                ..base
            }
            .with_release(latest),
            UpdateState::UpdateAvailable { current, latest } => UpdateReport {
                current_version: current.as_ref().map(|v| v.to_string()),
                ..base
            }
            .with_release(latest),
            UpdateState::Validated(validated) => UpdateReport {
                model_count: Some(validated.model_count()),
                ..base
            }
            .with_release(&validated.release),
            UpdateState::Disabled { reason } | UpdateState::FetchFailed { reason } => UpdateReport {
                reason: Some(reason.clone()),
                ..base
            },
        }
    }

    fn into_report(self, ctx: &Context) -> Result<Report, CliError> {
        let mut pairs = vec![("status", self.status.to_string())];
        let optional = [
            ("current version", self.current_version.clone()),
            ("latest version", self.latest_version.clone()),
            ("tag", self.tag.clone()),
            ("published", self.published_at.clone()),
            ("size", self.size.map(|s| format!("{} bytes", s))),
            ("url", self.html_url.clone()),
            ("models", self.model_count.map(|n| n.to_string())),
            ("generation", self.generation.map(|g| g.to_string())),
            ("reason", self.reason.clone()),
            ("notes", self.notes.as_ref().and_then(|n| n.lines().next()).map(str::to_string)),
        ];
        pairs.extend(optional.into_iter().filter_map(|(k, v)| v.map(|v| (k, v))));
        let data = serde_json::to_value(&self).map_err(|e| CliError::Render {
            format: ctx.format.name(),
            message: e.to_string(),
        })?;
        Ok(Report::with_table(data, Table::key_value(pairs)))
    }
}

fn state_exit_code(state: &UpdateState) -> u8 {
    match state {
        UpdateState::FetchFailed { .. } => exit::DATA_SOURCE_ERROR,
        _ => exit::SUCCESS,
    }
}

/// Exits with [`exit::UPDATE_AVAILABLE`] when a newer release exists.
pub async fn check(ctx: &Context) -> Result<u8, CliError> {
    let registry = ctx.registry()?;
    let source = ctx.release_source();
    let state = registry.check_for_updates(&source).await;
    let local = registry.data_version().map(|v| v.to_string());
    emit(&UpdateReport::from_state(&state, local).into_report(ctx)?, ctx.format, None)?;
    Ok(match state {
        UpdateState::UpdateAvailable { .. } => exit::UPDATE_AVAILABLE,
        other => state_exit_code(&other),
    })
}

/// Shared by `apply` and `refresh`.
pub async fn refresh(ctx: &Context, options: RefreshOptions) -> Result<u8, CliError> {
    let registry = ctx.registry()?;
    let source = ctx.release_source();
    let before = registry.data_version().map(|v| v.to_string());
    let (report, code) = match registry.refresh(&source, options).await? {
        RefreshOutcome::Updated { version, generation } => {
            tracing::info!(version = %version, generation, "data update installed");
            let report = UpdateReport {
                status: "updated",
                current_version: before,
                latest_version: Some(version.to_string()),
                generation: Some(generation),
                ..Default::default()
            };
            (report, exit::SUCCESS)
        }
        RefreshOutcome::NotApplied(state) => {
            (UpdateReport::from_state(&state, before), state_exit_code(&state))
        }
    };
    emit(&report.into_report(ctx)?, ctx.format, None)?;
    Ok(code)
}

/// The update policy as configured; no data is loaded.
pub fn show_config(ctx: &Context) -> Result<(), CliError> {
    let policy = &ctx.config.update;
    let reason = policy.disabled_reason();
    let user_dir = ctx.config.user_data_dir.as_ref().map(|p| p.display().to_string());
    let data = json!({
        "enabled": reason.is_none(),
        "disabled_reason": reason,
        "version_pin": policy.version_pin,
        "timeout_secs": policy.timeout.as_secs(),
        "release_repo": policy.release_repo,
        "user_data_dir": user_dir,
    });
    let table = Table::key_value([
        ("enabled", (reason.is_none()).to_string()),
        ("disabled reason", cell(reason.as_ref())),
        ("version pin", cell(policy.version_pin.as_ref())),
        ("timeout", format!("{}s", policy.timeout.as_secs())),
        ("release repo", policy.release_repo.clone()),
        ("user data dir", cell(user_dir.as_ref())),
    ]);
    emit(&Report::with_table(data, table), ctx.format, None)
}
