//! Provider overrides: partial model definitions merged onto the base dataset.
//!
//! Merge rules per field:
//! - `pricing`, `capabilities`, `parameters`: shallow key-wise merge. Values one level down
//!   are replaced wholesale.
//! - everything else: the override value replaces the base value when present.
//!
//! An override may name a concrete model id or an alias; alias keys are bound to the
//! concrete id at load time. Overrides for models that are not in the base dataset are
//! ignored. An override can modify a model but never introduce one.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::dataset::{
    check_model_dates, BillingInfo, CapabilityFlags, Dataset, DeprecationInfo, Modality, ModelDefinition,
    ParameterSpec, PricingInfo, PricingScheme, PricingUnit,
};
use crate::error::{RegistryError, Result};
use crate::version::CalendarDate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CapabilityPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supports_streaming: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supports_structured_output: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supports_web_search: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supports_vision: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supports_function_calling: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supports_json_mode: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supports_audio: Option<bool>,
}

impl CapabilityPatch {
    fn apply(&self, base: CapabilityFlags) -> CapabilityFlags {
        CapabilityFlags {
            supports_streaming: self.supports_streaming.unwrap_or(base.supports_streaming),
            supports_structured_output: self
                .supports_structured_output
                .unwrap_or(base.supports_structured_output),
            supports_web_search: self.supports_web_search.unwrap_or(base.supports_web_search),
            supports_vision: self.supports_vision.unwrap_or(base.supports_vision),
            supports_function_calling: self
                .supports_function_calling
                .unwrap_or(base.supports_function_calling),
            supports_json_mode: self.supports_json_mode.unwrap_or(base.supports_json_mode),
            supports_audio: self.supports_audio.unwrap_or(base.supports_audio),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PricingPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheme: Option<PricingScheme>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<PricingUnit>,
    #[serde(alias = "input_cost_per_million_tokens", skip_serializing_if = "Option::is_none")]
    pub input_cost_per_unit: Option<f64>,
    #[serde(alias = "output_cost_per_million_tokens", skip_serializing_if = "Option::is_none")]
    pub output_cost_per_unit: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tiers: Option<Vec<serde_json::Value>>,
}

impl PricingPatch {
    fn apply(&self, base: Option<&PricingInfo>) -> std::result::Result<PricingInfo, String> {
        match base {
            Some(base) => Ok(PricingInfo {
                scheme: self.scheme.unwrap_or(base.scheme),
                unit: self.unit.unwrap_or(base.unit),
                input_cost_per_unit: self.input_cost_per_unit.unwrap_or(base.input_cost_per_unit),
                output_cost_per_unit: self
                    .output_cost_per_unit
                    .unwrap_or(base.output_cost_per_unit),
                currency: self.currency.clone().unwrap_or_else(|| base.currency.clone()),
                tiers: self.tiers.clone().or_else(|| base.tiers.clone()),
            }),
            None => {
                let (Some(input), Some(output)) = (self.input_cost_per_unit, self.output_cost_per_unit)
                else {
                    return Err(
                        "pricing override on a model without base pricing must set both costs"
                            .to_string(),
                    );
                };
                Ok(PricingInfo {
                    scheme: self.scheme.unwrap_or_default(),
                    unit: self.unit.unwrap_or_default(),
                    input_cost_per_unit: input,
                    output_cost_per_unit: output,
                    currency: self.currency.clone().unwrap_or_else(|| "USD".to_string()),
                    tiers: self.tiers.clone(),
                })
            }
        }
    }
}

/// The fields of a model a provider may override. Absent fields keep the base value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_window: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<CapabilityPatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_modalities: Option<BTreeSet<Modality>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_modalities: Option<BTreeSet<Modality>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<BTreeMap<String, ParameterSpec>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pricing: Option<PricingPatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing: Option<BillingInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deprecation: Option<DeprecationInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_version: Option<CalendarDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ModelPatch {
    /// Returns a new definition; `base` is left untouched.
    pub fn apply(&self, base: &ModelDefinition) -> std::result::Result<ModelDefinition, String> {
        let mut merged = base.clone();
        if let Some(v) = self.context_window {
            merged.context_window = v;
        }
        if let Some(v) = self.max_output_tokens {
            merged.max_output_tokens = v;
        }
        if let Some(caps) = &self.capabilities {
            merged.capabilities = caps.apply(base.capabilities);
        }
        if let Some(v) = &self.input_modalities {
            merged.input_modalities = v.clone();
        }
        if let Some(v) = &self.output_modalities {
            merged.output_modalities = v.clone();
        }
        if let Some(params) = &self.parameters {
            for (name, spec) in params {
                merged.parameters.insert(name.clone(), spec.clone());
            }
        }
        if let Some(pricing) = &self.pricing {
            merged.pricing = Some(pricing.apply(base.pricing.as_ref())?);
        }
        if let Some(v) = &self.billing {
            merged.billing = Some(v.clone());
        }
        if let Some(v) = &self.deprecation {
            merged.deprecation = v.clone();
        }
        if let Some(v) = self.min_version {
            merged.min_version = Some(v);
        }
        if let Some(v) = &self.description {
            merged.description = Some(v.clone());
        }
        if merged.context_window == 0 || merged.max_output_tokens == 0 {
            return Err("token limits must be positive".to_string());
        }
        Ok(merged)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProviderOverrides {
    #[serde(default)]
    pub models: BTreeMap<String, ModelPatch>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
struct OverridesDocument {
    #[serde(default)]
    overrides: BTreeMap<String, ProviderOverrides>,
}

/// Every provider's overrides, keyed by lower-cased provider name.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct ProviderOverrideSet {
    providers: BTreeMap<String, ProviderOverrides>,
}

impl ProviderOverrideSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn parse(source_name: &str, text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::empty());
        }
        let raw: serde_yaml::Value =
            serde_yaml::from_str(text).map_err(|e| RegistryError::parse(source_name, e))?;
        if let Some(providers) = raw.get("overrides").and_then(|v| v.as_mapping()) {
            for provider in providers.values() {
                if let Some(models) = provider.get("models").and_then(|v| v.as_mapping()) {
                    for patch in models.values() {
                        check_model_dates(patch)?;
                    }
                }
            }
        }
        let doc: OverridesDocument =
            serde_yaml::from_value(raw).map_err(|e| RegistryError::parse(source_name, e))?;
        Ok(Self::from_map(doc.overrides))
    }

    pub fn from_map(providers: BTreeMap<String, ProviderOverrides>) -> Self {
        Self {
            providers: providers
                .into_iter()
                .map(|(k, v)| (k.to_lowercase(), v))
                .collect(),
        }
    }

    pub fn providers(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }

    pub fn get(&self, provider: &str) -> Option<&ProviderOverrides> {
        self.providers.get(provider)
    }

    pub fn patch(&self, provider: &str, model: &str) -> Option<&ModelPatch> {
        self.providers.get(provider)?.models.get(model)
    }

    /// Effective definition of `model` under `provider`. A model without an override
    /// comes back as an unchanged copy of `base`.
    pub fn merge(&self, provider: &str, model: &str, base: &ModelDefinition) -> Result<ModelDefinition> {
        match self.patch(provider, model) {
            Some(patch) => patch.apply(base).map_err(|e| {
                RegistryError::parse(
                    format!("overrides.{}.models", provider),
                    format!("model '{}': {}", model, e),
                )
            }),
            None => Ok(base.clone()),
        }
    }

    /// Rekeys overrides written against an alias (`gpt-4o`) onto the concrete model id the
    /// alias resolves to in `dataset`. A concrete-id entry for the same model wins over the
    /// alias entry. Keys that resolve to nothing stay as they are and are ignored later.
    pub fn bind_to(self, dataset: &Dataset) -> Self {
        let providers = self
            .providers
            .into_iter()
            .map(|(provider, overrides)| {
                let mut models = BTreeMap::new();
                let mut via_alias = Vec::new();
                for (key, patch) in overrides.models {
                    if dataset.models.contains_key(&key) {
                        models.insert(key, patch);
                        continue;
                    }
                    match dataset.resolve_alias(&key) {
                        Some(target) => via_alias.push((key, target, patch)),
                        None => {
                            models.insert(key, patch);
                        }
                    }
                }
                for (alias, target, patch) in via_alias {
                    if models.contains_key(&target) {
                        tracing::warn!(
                            provider = %provider,
                            alias = %alias,
                            model = %target,
                            "alias override shadowed by an override for the concrete model"
                        );
                        continue;
                    }
                    tracing::debug!(provider = %provider, alias = %alias, model = %target, "alias override bound");
                    models.insert(target, patch);
                }
                (provider, ProviderOverrides { models })
            })
            .collect();
        Self { providers }
    }

    /// Merges every override onto `dataset` once, so a bad override fails the load
    /// rather than the first request that touches it.
    pub(crate) fn check_against(&self, dataset: &Dataset, source_name: &str) -> Result<()> {
        for (provider, overrides) in &self.providers {
            for model in overrides.models.keys() {
                let Some(base) = dataset.models.get(model) else {
                    tracing::debug!(provider = %provider, model = %model, "override for unknown model ignored");
                    continue;
                };
                let merged = self.merge(provider, model, base)?;
                let mut scratch = Vec::new();
                merged
                    .check(
                        &format!("{} (provider {})", model, provider),
                        &dataset.constraints,
                        source_name,
                        &mut scratch,
                    )?;
            }
        }
        Ok(())
    }

    /// Models of `dataset` this provider actually overrides.
    pub fn overridden_models<'a>(&'a self, provider: &str, dataset: &'a Dataset) -> Vec<&'a str> {
        match self.providers.get(provider) {
            Some(o) => o
                .models
                .keys()
                .filter(|m| dataset.models.contains_key(*m))
                .map(String::as_str)
                .collect(),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = r#"
version: "1.0.0"
models:
  gpt-4o-2024-08-06:
    context_window: 128000
    max_output_tokens: 16384
    capabilities: {supports_streaming: true, supports_web_search: false}
    parameters:
      temperature: {type: numeric, min: 0, max: 2}
      top_p: {type: numeric, min: 0, max: 1}
    pricing:
      scheme: per_token
      unit: million_tokens
      input_cost_per_unit: 2.5
      output_cost_per_unit: 10.0
"#;

    fn base() -> Dataset {
        Dataset::parse("base", BASE).unwrap().dataset
    }

    #[test]
    fn missing_provider_entry_returns_base_unchanged() {
        let ds = base();
        let set = ProviderOverrideSet::empty();
        let m = &ds.models["gpt-4o-2024-08-06"];
        assert_eq!(&set.merge("azure", "gpt-4o-2024-08-06", m).unwrap(), m);
    }

    #[test]
    fn pricing_merge_is_shallow() {
        let ds = base();
        let set = ProviderOverrideSet::parse(
            "overrides",
            r#"
overrides:
  Azure:
    models:
      gpt-4o-2024-08-06:
        pricing: {input_cost_per_unit: 5.0}
"#,
        )
        .unwrap();
        let m = &ds.models["gpt-4o-2024-08-06"];
        let merged = set.merge("azure", "gpt-4o-2024-08-06", m).unwrap();
        let p = merged.pricing.unwrap();
        assert_eq!(p.input_cost_per_unit, 5.0);
        assert_eq!(p.output_cost_per_unit, 10.0);
        assert_eq!(p.unit, PricingUnit::MillionTokens);
        assert_eq!(m.pricing.as_ref().unwrap().input_cost_per_unit, 2.5);
    }

    #[test]
    fn parameters_and_capabilities_merge_by_key_other_fields_replace() {
        let ds = base();
        let set = ProviderOverrideSet::parse(
            "overrides",
            r#"
overrides:
  azure:
    models:
      gpt-4o-2024-08-06:
        context_window: 64000
        capabilities: {supports_web_search: true}
        parameters:
          temperature: {type: numeric, min: 0, max: 1}
"#,
        )
        .unwrap();
        let m = &ds.models["gpt-4o-2024-08-06"];
        let merged = set.merge("azure", "gpt-4o-2024-08-06", m).unwrap();
        assert_eq!(merged.context_window, 64000);
        assert_eq!(merged.max_output_tokens, 16384);
        assert!(merged.capabilities.supports_web_search);
        assert!(merged.capabilities.supports_streaming);
        assert!(merged.parameters.contains_key("top_p"));
        assert_ne!(merged.parameters["temperature"], m.parameters["temperature"]);
    }

    #[test]
    fn unknown_models_are_ignored_by_check() {
        let ds = base();
        let set = ProviderOverrideSet::parse(
            "overrides",
            "overrides:\n  azure:\n    models:\n      brand-new: {context_window: 5}\n",
        )
        .unwrap();
        assert!(set.check_against(&ds, "overrides").is_ok());
        assert!(set.overridden_models("azure", &ds).is_empty());
    }

    #[test]
    fn alias_keyed_override_binds_to_concrete_model() {
        let ds = Dataset::parse("base", &format!("aliases:\n  gpt-4o: gpt-4o-2024-08-06\n{}", BASE))
            .unwrap()
            .dataset;
        let set = ProviderOverrideSet::parse(
            "overrides",
            "overrides:\n  azure:\n    models:\n      gpt-4o:\n        pricing: {input_cost_per_unit: 5.0}\n      brand-new: {context_window: 5}\n",
        )
        .unwrap()
        .bind_to(&ds);
        assert!(set.patch("azure", "gpt-4o").is_none());
        assert!(set.patch("azure", "brand-new").is_some());
        assert_eq!(set.overridden_models("azure", &ds), vec!["gpt-4o-2024-08-06"]);
        let merged = set
            .merge("azure", "gpt-4o-2024-08-06", &ds.models["gpt-4o-2024-08-06"])
            .unwrap();
        assert_eq!(merged.pricing.unwrap().input_cost_per_unit, 5.0);
    }

    #[test]
    fn concrete_override_wins_over_alias_override() {
        let ds = base();
        let set = ProviderOverrideSet::parse(
            "overrides",
            r#"
overrides:
  azure:
    models:
      gpt-4o:
        pricing: {input_cost_per_unit: 9.0}
      gpt-4o-2024-08-06:
        pricing: {input_cost_per_unit: 5.0}
"#,
        )
        .unwrap()
        .bind_to(&ds);
        let merged = set
            .merge("azure", "gpt-4o-2024-08-06", &ds.models["gpt-4o-2024-08-06"])
            .unwrap();
        assert_eq!(merged.pricing.unwrap().input_cost_per_unit, 5.0);
    }

    #[test]
    fn unknown_override_fields_fail_parse() {
        let err = ProviderOverrideSet::parse(
            "overrides",
            "overrides:\n  azure:\n    models:\n      m: {context_windw: 5}\n",
        )
        .unwrap_err();
        assert!(matches!(err, RegistryError::Parse { .. }));
    }

    #[test]
    fn invalid_override_date_is_invalid_date() {
        let err = ProviderOverrideSet::parse(
            "overrides",
            "overrides:\n  azure:\n    models:\n      m:\n        deprecation: {status: deprecated, sunsets_on: \"2025-02-29\"}\n",
        )
        .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidDate { .. }), "{:?}", err);
    }

    #[test]
    fn invalid_merged_result_fails_check() {
        let ds = base();
        let set = ProviderOverrideSet::parse(
            "overrides",
            "overrides:\n  azure:\n    models:\n      gpt-4o-2024-08-06:\n        pricing: {output_cost_per_unit: -1}\n",
        )
        .unwrap();
        assert!(set.check_against(&ds, "overrides").is_err());
    }
}
