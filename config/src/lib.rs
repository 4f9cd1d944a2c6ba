//! Load configuration from XDG `config.toml` and project `.env`, then apply to the process
//! environment with priority: **existing env > .env > XDG**.
//!
//! The registry itself only reads `OMR_*` variables; this crate is how a CLI or service gets
//! file-based settings into them.

mod dotenv;
mod xdg_toml;

use std::path::{Path, PathBuf};
use thiserror::Error;

pub use dotenv::dotenv_path;
pub use xdg_toml::{config_path, RegistrySection};

/// Application name used for `~/.config/<app>/config.toml`.
pub const APP_NAME: &str = "model-registry";

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("xdg config path: {0}")]
    XdgPath(String),
    #[error("read xdg config: {0}")]
    XdgRead(std::io::Error),
    #[error("parse xdg toml: {0}")]
    XdgParse(#[from] toml::de::Error),
    #[error("read .env {}: {message}", .path.display())]
    Dotenv { path: PathBuf, message: String },
}

/// Loads config from XDG `config.toml` and optional project `.env`, then sets environment
/// variables only for keys that are **not** already set (so existing env has highest priority).
///
/// Order of precedence when a key is missing in the process environment:
/// 1. Value from project `.env` (current directory or `override_dir` if given)
/// 2. Value from `$XDG_CONFIG_HOME/<app_name>/config.toml` (`[registry]` over `[env]`)
///
/// Returns the keys that were set.
pub fn load_and_apply(app_name: &str, override_dir: Option<&Path>) -> Result<Vec<String>, LoadError> {
    let xdg_map = xdg_toml::load_env_map(app_name)?;
    let dotenv_map = dotenv::load_env_map(override_dir)?;

    let mut keys: std::collections::BTreeSet<String> = xdg_map.keys().cloned().collect();
    keys.extend(dotenv_map.keys().cloned());

    let mut applied = Vec::new();
    for key in keys {
        if std::env::var_os(&key).is_some() {
            continue; // existing env wins
        }
        let value = dotenv_map.get(&key).or_else(|| xdg_map.get(&key));
        if let Some(v) = value {
            std::env::set_var(&key, v);
            applied.push(key);
        }
    }

    Ok(applied)
}

/// Serializes tests that mutate process environment variables.
#[cfg(test)]
pub(crate) static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn lock() -> std::sync::MutexGuard<'static, ()> {
        ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn restore_var(key: &str, prev: Option<String>) {
        match prev {
            Some(v) => env::set_var(key, v),
            None => env::remove_var(key),
        }
    }

    #[test]
    fn existing_env_wins() {
        let _guard = lock();
        env::set_var("CONFIG_TEST_EXISTING", "from_env");
        let dotenv_dir = tempfile::tempdir().unwrap();
        std::fs::write(dotenv_dir.path().join(".env"), "CONFIG_TEST_EXISTING=from_dotenv\n").unwrap();
        let applied = load_and_apply("config-crate-nonexistent-app-xyz", Some(dotenv_dir.path())).unwrap();
        assert_eq!(env::var("CONFIG_TEST_EXISTING").as_deref(), Ok("from_env"));
        assert!(!applied.contains(&"CONFIG_TEST_EXISTING".to_string()));
        env::remove_var("CONFIG_TEST_EXISTING");
    }

    #[test]
    fn dotenv_overrides_xdg() {
        let _guard = lock();
        let xdg_dir = tempfile::tempdir().unwrap();
        let app_dir = xdg_dir.path().join("prio-app");
        std::fs::create_dir_all(&app_dir).unwrap();
        std::fs::write(
            app_dir.join("config.toml"),
            "[env]\nCONFIG_TEST_PRIORITY = \"from_xdg\"\nCONFIG_TEST_XDG_ONLY = \"from_xdg\"\n",
        )
        .unwrap();

        let dotenv_dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dotenv_dir.path().join(".env"),
            "CONFIG_TEST_PRIORITY=from_dotenv\n",
        )
        .unwrap();

        let prev_xdg = env::var("XDG_CONFIG_HOME").ok();
        env::set_var("XDG_CONFIG_HOME", xdg_dir.path());
        env::remove_var("CONFIG_TEST_PRIORITY");
        env::remove_var("CONFIG_TEST_XDG_ONLY");

        let result = load_and_apply("prio-app", Some(dotenv_dir.path()));
        let prio = env::var("CONFIG_TEST_PRIORITY").ok();
        let xdg_only = env::var("CONFIG_TEST_XDG_ONLY").ok();
        env::remove_var("CONFIG_TEST_PRIORITY");
        env::remove_var("CONFIG_TEST_XDG_ONLY");
        restore_var("XDG_CONFIG_HOME", prev_xdg);

        assert!(result.is_ok());
        assert_eq!(prio.as_deref(), Some("from_dotenv"));
        assert_eq!(xdg_only.as_deref(), Some("from_xdg"));
    }

    #[test]
    fn invalid_xdg_toml_fails_with_xdg_parse_error() {
        let _guard = lock();
        let xdg_dir = tempfile::tempdir().unwrap();
        let app_dir = xdg_dir.path().join("broken-app");
        std::fs::create_dir_all(&app_dir).unwrap();
        std::fs::write(app_dir.join("config.toml"), "invalid [[[\n").unwrap();

        let prev_xdg = env::var("XDG_CONFIG_HOME").ok();
        env::set_var("XDG_CONFIG_HOME", xdg_dir.path());
        let result = load_and_apply("broken-app", None::<&Path>);
        restore_var("XDG_CONFIG_HOME", prev_xdg);

        assert!(matches!(result, Err(LoadError::XdgParse(_))));
    }
}
