//! Capability resolution over one dataset generation, plus the bounded result cache.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use lru::LruCache;

use crate::capability::EffectiveCapability;
use crate::dataset::Dataset;
use crate::error::{RegistryError, Result};
use crate::loader::LoadedData;
use crate::version::{check_min_version, has_date_suffix, parse_dated_identifier};

/// One immutable load of base data plus overrides. Replaced wholesale on reload.
#[derive(Debug)]
pub struct Generation {
    pub id: u64,
    pub data: LoadedData,
}

/// Resolves `requested` (alias or dated id) for `provider` against `generation`.
///
/// 1. An exact dataset key is used as-is (dated ids still pass the `min_version` gate).
/// 2. A dated id that is not in the dataset fails; if its family is known and the date
///    predates the family's `min_version`, the failure is `VersionTooOld`.
/// 3. A date-shaped suffix that is not a real calendar day is `InvalidDate`.
/// 4. Anything else is an alias.
pub fn resolve(generation: &Generation, requested: &str, provider: &str) -> Result<EffectiveCapability> {
    let ds = &generation.data.dataset;
    let model_id = resolve_model_id(ds, requested)?;

    let base = ds
        .models
        .get(&model_id)
        .ok_or_else(|| not_supported(ds, requested))?;
    if let Some(dated) = parse_dated_identifier(&model_id) {
        let alias = ds.resolve_alias(&dated.base).map(|_| dated.base.as_str());
        check_min_version(&model_id, dated.date, base.min_version, alias)?;
    }

    let definition = generation.data.overrides.merge(provider, &model_id, base)?;
    let parameters = definition.materialize_parameters(&ds.constraints)?;

    Ok(EffectiveCapability {
        requested_name: requested.to_string(),
        model_id,
        provider: provider.to_string(),
        generation: generation.id,
        definition,
        parameters,
    })
}

/// Concrete dataset key for `requested`, without overrides or the gate on the key itself.
pub fn resolve_model_id(ds: &Dataset, requested: &str) -> Result<String> {
    if let Some(dated) = parse_dated_identifier(requested) {
        if ds.models.contains_key(requested) {
            return Ok(requested.to_string());
        }
        if let Some(target) = ds.resolve_alias(&dated.base) {
            let family_min = ds.models.get(&target).and_then(|m| m.min_version);
            check_min_version(requested, dated.date, family_min, Some(&dated.base))?;
        }
        return Err(not_supported(ds, requested));
    }
    if ds.models.contains_key(requested) {
        return Ok(requested.to_string());
    }
    if has_date_suffix(requested) {
        let suffix = &requested[requested.len() - 10..];
        return Err(suffix
            .parse::<crate::version::CalendarDate>()
            .err()
            .unwrap_or_else(|| not_supported(ds, requested)));
    }
    ds.resolve_alias(requested)
        .ok_or_else(|| not_supported(ds, requested))
}

fn not_supported(ds: &Dataset, requested: &str) -> RegistryError {
    RegistryError::ModelNotSupported {
        model: requested.to_string(),
        known: ds.known_identifiers(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    provider: String,
    requested: String,
    generation: u64,
}

/// Bounded LRU of resolved capabilities keyed by (provider, requested name, generation).
pub struct CapabilityCache {
    entries: Mutex<LruCache<CacheKey, Arc<EffectiveCapability>>>,
}

impl CapabilityCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<CacheKey, Arc<EffectiveCapability>>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get(&self, provider: &str, requested: &str, generation: u64) -> Option<Arc<EffectiveCapability>> {
        let key = CacheKey {
            provider: provider.to_string(),
            requested: requested.to_string(),
            generation,
        };
        self.lock().get(&key).cloned()
    }

    pub fn insert(&self, capability: Arc<EffectiveCapability>) {
        let key = CacheKey {
            provider: capability.provider.clone(),
            requested: capability.requested_name.clone(),
            generation: capability.generation,
        };
        self.lock().put(key, capability);
    }

    /// Drops every entry.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Drops entries built from any generation other than `current`.
    pub fn retain_generation(&self, current: u64) {
        let mut cache = self.lock();
        let stale: Vec<CacheKey> = cache
            .iter()
            .filter(|(k, _)| k.generation != current)
            .map(|(k, _)| k.clone())
            .collect();
        for key in stale {
            cache.pop(&key);
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.lock().cap().get()
    }
}
