//! Registry configuration as an explicit value, with an adapter over `OMR_*` variables.

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{RegistryError, Result};
use crate::loader::DataSource;
use crate::update::UpdatePolicy;

pub const ENV_REGISTRY_PATH: &str = "OMR_MODEL_REGISTRY_PATH";
pub const ENV_DATA_DIR: &str = "OMR_DATA_DIR";
pub const ENV_PROVIDER: &str = "OMR_PROVIDER";
pub const ENV_DISABLE_UPDATES: &str = "OMR_DISABLE_DATA_UPDATES";
pub const ENV_VERSION_PIN: &str = "OMR_DATA_VERSION_PIN";
pub const ENV_UPDATE_TIMEOUT: &str = "OMR_UPDATE_TIMEOUT_SECS";
pub const ENV_CACHE_SIZE: &str = "OMR_CACHE_SIZE";
pub const ENV_RELEASE_REPO: &str = "OMR_RELEASE_REPO";

/// Every variable [`RegistryConfig::from_env`] reads.
pub const ENV_VARS: [&str; 8] = [
    ENV_REGISTRY_PATH,
    ENV_DATA_DIR,
    ENV_PROVIDER,
    ENV_DISABLE_UPDATES,
    ENV_VERSION_PIN,
    ENV_UPDATE_TIMEOUT,
    ENV_CACHE_SIZE,
    ENV_RELEASE_REPO,
];

pub const DEFAULT_PROVIDER: &str = "openai";
pub const DEFAULT_CACHE_SIZE: usize = 100;
pub const MAX_CACHE_SIZE: usize = 10_000;

/// Name of the per-user data directory under the platform data dir.
pub const DATA_DIR_NAME: &str = "model-registry";

#[derive(Debug, Clone, PartialEq)]
pub struct RegistryConfig {
    /// Candidates tried in order; the first viable one wins.
    pub sources: Vec<DataSource>,
    pub provider: String,
    pub cache_size: NonZeroUsize,
    /// Where updates are installed. `None` disables installing.
    pub user_data_dir: Option<PathBuf>,
    pub update: UpdatePolicy,
}

impl Default for RegistryConfig {
    /// Bundled data only, no user directory.
    fn default() -> Self {
        Self {
            sources: vec![DataSource::Bundled],
            provider: DEFAULT_PROVIDER.to_string(),
            cache_size: NonZeroUsize::new(DEFAULT_CACHE_SIZE).unwrap_or(NonZeroUsize::MIN),
            user_data_dir: None,
            update: UpdatePolicy::default(),
        }
    }
}

impl RegistryConfig {
    /// Reads `OMR_*` variables from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let user_data_dir = get(ENV_DATA_DIR)
            .map(PathBuf::from)
            .or_else(default_data_dir);
        let mut sources = Vec::new();
        if let Some(path) = get(ENV_REGISTRY_PATH) {
            sources.push(DataSource::ExplicitPath(PathBuf::from(path)));
        }
        if let Some(dir) = &user_data_dir {
            sources.push(DataSource::UserDir(dir.clone()));
        }
        sources.push(DataSource::Bundled);

        let mut update = UpdatePolicy::default();
        if let Some(v) = get(ENV_DISABLE_UPDATES) {
            update.disabled = parse_flag(&v);
        }
        update.version_pin = get(ENV_VERSION_PIN);
        if let Some(v) = get(ENV_UPDATE_TIMEOUT) {
            let secs: u64 = v
                .parse()
                .ok()
                .filter(|s| *s > 0)
                .ok_or_else(|| invalid(ENV_UPDATE_TIMEOUT, &v, "expected a positive number of seconds"))?;
            update.timeout = Duration::from_secs(secs);
        }
        if let Some(repo) = get(ENV_RELEASE_REPO) {
            if repo.split('/').filter(|p| !p.is_empty()).count() != 2 {
                return Err(invalid(ENV_RELEASE_REPO, &repo, "expected owner/name"));
            }
            update.release_repo = repo;
        }

        let cache_size = match get(ENV_CACHE_SIZE) {
            Some(v) => parse_cache_size(&v)?,
            None => RegistryConfig::default().cache_size,
        };

        Ok(Self {
            sources,
            provider: get(ENV_PROVIDER)
                .map(|p| p.to_lowercase())
                .unwrap_or_else(|| DEFAULT_PROVIDER.to_string()),
            cache_size,
            user_data_dir,
            update,
        })
    }

    pub fn with_sources(mut self, sources: Vec<DataSource>) -> Self {
        self.sources = sources;
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into().to_lowercase();
        self
    }

    pub fn with_cache_size(mut self, cache_size: NonZeroUsize) -> Self {
        self.cache_size = cache_size;
        self
    }

    pub fn with_user_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.user_data_dir = Some(dir.into());
        self
    }

    pub fn with_update_policy(mut self, update: UpdatePolicy) -> Self {
        self.update = update;
        self
    }
}

fn default_data_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join(DATA_DIR_NAME))
}

fn parse_flag(v: &str) -> bool {
    matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}

/// Accepts `1..=10000`.
pub fn parse_cache_size(v: &str) -> Result<NonZeroUsize> {
    v.parse::<usize>()
        .ok()
        .filter(|n| *n <= MAX_CACHE_SIZE)
        .and_then(NonZeroUsize::new)
        .ok_or_else(|| invalid(ENV_CACHE_SIZE, v, &format!("expected 1..={}", MAX_CACHE_SIZE)))
}

fn invalid(key: &str, value: &str, expected: &str) -> RegistryError {
    RegistryError::InvalidConfig(format!("{}='{}': {}", key, value, expected))
}
