use model_registry::config::ENV_PROVIDER;
use model_registry::{GithubReleaseSource, ModelRegistry, RegistryConfig};

use crate::args::{Cli, Format};
use crate::error::CliError;

/// Where the active provider name came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderSource {
    Flag,
    Env,
    Default,
}

impl ProviderSource {
    pub fn name(self) -> &'static str {
        match self {
            ProviderSource::Flag => "flag",
            ProviderSource::Env => "env",
            ProviderSource::Default => "default",
        }
    }
}

/// Settings shared by every command: the registry configuration (with `--provider`
/// applied) and the resolved output format.
#[derive(Debug, Clone)]
pub struct Context {
    pub config: RegistryConfig,
    pub provider_source: ProviderSource,
    pub format: Format,
}

impl Context {
    /// Reads `OMR_*` from the environment, then applies the global flags.
    /// Provider precedence: `--provider`, then `OMR_PROVIDER`, then `openai`.
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        let mut config = RegistryConfig::from_env()?;
        let provider_source = match &cli.provider {
            Some(provider) => {
                config = config.with_provider(provider.as_str());
                ProviderSource::Flag
            }
            None if std::env::var(ENV_PROVIDER).map(|v| !v.trim().is_empty()).unwrap_or(false) => {
                ProviderSource::Env
            }
            None => ProviderSource::Default,
        };
        Ok(Self {
            config,
            provider_source,
            format: cli.format.unwrap_or_else(Format::detect),
        })
    }

    pub fn provider(&self) -> &str {
        &self.config.provider
    }

    /// Loads the registry from the configured candidates.
    pub fn registry(&self) -> Result<ModelRegistry, CliError> {
        ModelRegistry::new(self.config.clone()).map_err(CliError::Load)
    }

    pub fn release_source(&self) -> GithubReleaseSource {
        GithubReleaseSource::new(self.config.update.release_repo.clone())
    }
}
