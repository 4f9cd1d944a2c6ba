//! [`ModelRegistry`]: the active dataset generation, the capability cache and the update flow.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::{Arc, RwLock};

use semver::Version;
use serde_json::{Map, Value};

use crate::capability::EffectiveCapability;
use crate::config::RegistryConfig;
use crate::dataset::{DataQualityWarning, DeprecationInfo, ModelDefinition};
use crate::deprecation::{self, GateOutcome};
use crate::error::{RegistryError, Result};
use crate::loader::{self, DataSource, LoadedData, RejectedSource};
use crate::resolver::{self, CapabilityCache, Generation};
use crate::update::{
    self, RefreshOptions, RefreshOutcome, UpdateCoordinator, UpdateSource, UpdateState,
    ValidatedUpdate,
};

/// Thread-safe model registry.
///
/// Readers clone the active [`Generation`] (an `Arc`) and resolve against it, so a reload
/// never changes data under a request in flight.
pub struct ModelRegistry {
    config: RegistryConfig,
    active: RwLock<Arc<Generation>>,
    cache: CapabilityCache,
    coordinator: UpdateCoordinator,
}

impl ModelRegistry {
    /// Loads the first viable source named by `config`.
    pub fn new(config: RegistryConfig) -> Result<Self> {
        let data = loader::load(&config.sources)?;
        Ok(Self::from_loaded(config, data))
    }

    /// Wraps already-loaded data.
    pub fn from_loaded(config: RegistryConfig, data: LoadedData) -> Self {
        let cache = CapabilityCache::new(config.cache_size);
        let coordinator = UpdateCoordinator::new(config.update.clone());
        Self {
            config,
            active: RwLock::new(Arc::new(Generation { id: 1, data })),
            cache,
            coordinator,
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Snapshot of the active generation.
    pub fn generation(&self) -> Arc<Generation> {
        self.active
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn generation_id(&self) -> u64 {
        self.generation().id
    }

    pub fn active_source(&self) -> DataSource {
        self.generation().data.source.clone()
    }

    pub fn data_version(&self) -> Option<Version> {
        self.generation().data.data_version.clone()
    }

    pub fn load_warnings(&self) -> Vec<DataQualityWarning> {
        self.generation().data.warnings.clone()
    }

    pub fn rejected_sources(&self) -> Vec<RejectedSource> {
        self.generation().data.rejected.clone()
    }

    /// The configured default provider.
    pub fn provider(&self) -> &str {
        &self.config.provider
    }

    /// Providers with overrides plus the configured provider, sorted.
    pub fn list_providers(&self) -> Vec<String> {
        let generation = self.generation();
        let mut names: BTreeSet<String> = generation
            .data
            .overrides
            .providers()
            .map(str::to_string)
            .collect();
        names.insert(self.config.provider.clone());
        names.into_iter().collect()
    }

    fn check_provider(&self, provider: &str) -> Result<String> {
        let provider = provider.to_lowercase();
        let known = self.list_providers();
        if known.contains(&provider) {
            Ok(provider)
        } else {
            Err(RegistryError::UnknownProvider { provider, known })
        }
    }

    /// Capabilities of `model` under the configured provider.
    pub fn get_capabilities(&self, model: &str) -> Result<Arc<EffectiveCapability>> {
        self.get_capabilities_for(model, &self.config.provider)
    }

    pub fn get_capabilities_for(&self, model: &str, provider: &str) -> Result<Arc<EffectiveCapability>> {
        let provider = self.check_provider(provider)?;
        let generation = self.generation();
        if let Some(hit) = self.cache.get(&provider, model, generation.id) {
            tracing::debug!(model, provider = %provider, "capability cache hit");
            return Ok(hit);
        }
        tracing::debug!(model, provider = %provider, generation = generation.id, "capability cache miss");
        let capability = Arc::new(resolver::resolve(&generation, model, &provider)?);
        self.cache.insert(capability.clone());
        Ok(capability)
    }

    /// Validates `params` for `model` under the configured provider.
    pub fn validate_parameters(&self, model: &str, params: &Map<String, Value>) -> Result<()> {
        self.get_capabilities(model)?.validate_parameters(params)
    }

    pub fn validate_parameter(&self, model: &str, name: &str, value: &Value) -> Result<()> {
        self.get_capabilities(model)?.validate_parameter(name, value)
    }

    /// Fails with `ModelSunset` for sunset models; deprecated models pass with a warning.
    pub fn assert_model_active(&self, model: &str) -> Result<GateOutcome> {
        let capability = self.get_capabilities(model)?;
        deprecation::assert_active(&capability)
    }

    pub fn sunset_headers(&self, model: &str) -> Result<Vec<(&'static str, String)>> {
        let capability = self.get_capabilities(model)?;
        Ok(deprecation::sunset_headers(capability.deprecation()))
    }

    pub fn deprecation_info(&self, model: &str) -> Result<DeprecationInfo> {
        Ok(self.get_capabilities(model)?.deprecation().clone())
    }

    /// Dataset keys, sorted.
    pub fn list_models(&self) -> Vec<String> {
        self.generation().data.dataset.models.keys().cloned().collect()
    }

    /// Every alias and the concrete model it currently designates.
    pub fn list_aliases(&self) -> BTreeMap<String, String> {
        let generation = self.generation();
        let ds = &generation.data.dataset;
        ds.alias_names()
            .into_iter()
            .filter_map(|alias| ds.resolve_alias(&alias).map(|target| (alias, target)))
            .filter(|(alias, target)| alias != target)
            .collect()
    }

    /// The base definition of `model`, before any provider override.
    pub fn raw_model(&self, model: &str) -> Result<ModelDefinition> {
        let generation = self.generation();
        let ds = &generation.data.dataset;
        let id = resolver::resolve_model_id(ds, model)?;
        ds.models
            .get(&id)
            .cloned()
            .ok_or_else(|| RegistryError::ModelNotSupported {
                model: model.to_string(),
                known: ds.known_identifiers(),
            })
    }

    /// Every model as `provider` sees it, overrides applied.
    pub fn dump_effective(&self, provider: &str) -> Result<Value> {
        let provider = self.check_provider(provider)?;
        let generation = self.generation();
        let data = &generation.data;
        let mut models = BTreeMap::new();
        for (id, base) in &data.dataset.models {
            models.insert(id.clone(), data.overrides.merge(&provider, id, base)?);
        }
        let mut out = Map::new();
        out.insert("provider".into(), Value::String(provider));
        out.insert(
            "data_version".into(),
            data.data_version
                .as_ref()
                .map(|v| Value::String(v.to_string()))
                .unwrap_or(Value::Null),
        );
        out.insert("models".into(), to_value(&models)?);
        Ok(Value::Object(out))
    }

    /// The loaded documents as parsed: dataset plus overrides.
    pub fn dump_raw(&self) -> Result<Value> {
        let generation = self.generation();
        let mut out = Map::new();
        out.insert("dataset".into(), to_value(&generation.data.dataset)?);
        out.insert("overrides".into(), to_value(&generation.data.overrides)?);
        Ok(Value::Object(out))
    }

    /// Reloads from the configured sources and swaps the generation.
    pub fn reload(&self) -> Result<u64> {
        let data = loader::load(&self.config.sources)?;
        Ok(self.install_generation(data))
    }

    fn install_generation(&self, data: LoadedData) -> u64 {
        let mut active = self.active.write().unwrap_or_else(|e| e.into_inner());
        // Allocated under the write lock so ids are installed in the order they are issued.
        let id = active.id + 1;
        tracing::info!(generation = id, source = %data.source, "dataset generation installed");
        *active = Arc::new(Generation { id, data });
        self.cache.clear();
        id
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Asks `source` whether a newer data release exists.
    pub async fn check_for_updates(&self, source: &dyn UpdateSource) -> UpdateState {
        let current = self.data_version();
        self.coordinator.check(source, current.as_ref()).await
    }

    /// Check, fetch, validate and (unless `validate_only`) apply.
    ///
    /// Remote failures come back as `NotApplied(FetchFailed)`; only local install errors
    /// are returned as `Err`.
    pub async fn refresh(&self, source: &dyn UpdateSource, options: RefreshOptions) -> Result<RefreshOutcome> {
        let latest = match self.check_for_updates(source).await {
            UpdateState::UpdateAvailable { latest, .. } => latest,
            UpdateState::AlreadyCurrent { latest, .. } if options.force => latest,
            other => return Ok(RefreshOutcome::NotApplied(other)),
        };
        let validated = match self.coordinator.fetch_and_validate(source, &latest).await {
            UpdateState::Validated(v) => v,
            other => return Ok(RefreshOutcome::NotApplied(other)),
        };
        if options.validate_only {
            return Ok(RefreshOutcome::NotApplied(UpdateState::Validated(validated)));
        }
        let dir = self.config.user_data_dir.clone().ok_or_else(|| {
            RegistryError::InvalidConfig("no user data directory configured for updates".into())
        })?;
        let generation = self.apply_update(&validated, &dir)?;
        Ok(RefreshOutcome::Updated {
            version: validated.release.version.clone(),
            generation,
        })
    }

    /// Installs `update` into `data_dir`, then swaps the in-memory generation.
    ///
    /// When an explicit dataset path is active, files are written but the active data is
    /// kept; the returned id is then the unchanged current generation.
    pub fn apply_update(&self, update: &ValidatedUpdate, data_dir: &Path) -> Result<u64> {
        update::install(update, data_dir)?;
        if let DataSource::ExplicitPath(path) = self.active_source() {
            tracing::warn!(
                path = %path.display(),
                version = %update.release.version,
                "update installed but explicit dataset path stays active"
            );
            return Ok(self.generation_id());
        }
        let mut data = update.data.clone();
        data.source = DataSource::UserDir(data_dir.to_path_buf());
        Ok(self.install_generation(data))
    }
}

fn to_value<T: serde::Serialize>(v: &T) -> Result<Value> {
    serde_json::to_value(v).map_err(|e| RegistryError::InvalidConfig(format!("serialize: {}", e)))
}
