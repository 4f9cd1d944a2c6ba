//! Process-wide registry built lazily from the environment.

use std::sync::{Arc, Mutex};

use once_cell::sync::Lazy;

use crate::config::RegistryConfig;
use crate::error::Result;
use crate::registry::ModelRegistry;

static DEFAULT_REGISTRY: Lazy<Mutex<Option<Arc<ModelRegistry>>>> = Lazy::new(|| Mutex::new(None));

/// The shared registry, built from [`RegistryConfig::from_env`] on first use.
///
/// A failed build is not cached; the next call tries again.
pub fn default_registry() -> Result<Arc<ModelRegistry>> {
    shared_or_build(RegistryConfig::from_env)
}

fn shared_or_build(config: impl FnOnce() -> Result<RegistryConfig>) -> Result<Arc<ModelRegistry>> {
    let mut slot = DEFAULT_REGISTRY.lock().unwrap_or_else(|e| e.into_inner());
    if let Some(registry) = slot.as_ref() {
        return Ok(registry.clone());
    }
    let registry = Arc::new(ModelRegistry::new(config()?)?);
    *slot = Some(registry.clone());
    Ok(registry)
}

/// Drops the shared registry so the next [`default_registry`] call rebuilds it.
pub fn reset_default_registry() {
    *DEFAULT_REGISTRY.lock().unwrap_or_else(|e| e.into_inner()) = None;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ENV_DATA_DIR, ENV_DISABLE_UPDATES};
    use crate::loader::DataSource;

    static SERIAL: Mutex<()> = Mutex::new(());

    fn isolated(dir: &std::path::Path) -> impl Fn() -> Result<RegistryConfig> + '_ {
        move || {
            RegistryConfig::from_lookup(|key| match key {
                k if k == ENV_DATA_DIR => Some(dir.display().to_string()),
                k if k == ENV_DISABLE_UPDATES => Some("1".to_string()),
                _ => None,
            })
        }
    }

    #[test]
    fn shared_until_reset() {
        let _guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
        let dir = tempfile::tempdir().unwrap();
        reset_default_registry();
        let a = shared_or_build(isolated(dir.path())).unwrap();
        let b = shared_or_build(isolated(dir.path())).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.active_source(), DataSource::Bundled);
        assert_eq!(a.config().user_data_dir.as_deref(), Some(dir.path()));

        reset_default_registry();
        let c = shared_or_build(isolated(dir.path())).unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
        reset_default_registry();
    }

    #[test]
    fn failed_build_is_not_cached() {
        let _guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
        let dir = tempfile::tempdir().unwrap();
        reset_default_registry();
        let broken = shared_or_build(|| {
            RegistryConfig::from_lookup(|key| (key == "OMR_CACHE_SIZE").then(|| "0".to_string()))
        });
        assert!(broken.is_err());
        assert!(shared_or_build(isolated(dir.path())).is_ok());
        reset_default_registry();
    }
}
