//! Logging initialization for `omr`: stderr by default, so stdout stays machine-readable.
//!
//! Reads `RUST_LOG` (filter) and `LOG_FILE` (path) from env (e.g. via .env or config.toml).
//! When `LOG_FILE` is set, logs are appended to that file instead.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// - **RUST_LOG**: filter, e.g. `model_registry=debug`. When unset, `default_level` from
///   `-v`/`-q`/`--debug` applies.
/// - **LOG_FILE**: when set, logs are appended there as plain text (no ANSI).
pub fn init(default_level: &str) -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},hyper_util=off", default_level)));

    if let Ok(path) = std::env::var("LOG_FILE") {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .with_filter(filter);
        tracing_subscriber::registry().with(file_layer).try_init()?;
        tracing::info!(path = %path, "omr logging to file");
    } else {
        let stderr_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_filter(filter);
        tracing_subscriber::registry().with(stderr_layer).try_init()?;
    }
    Ok(())
}
