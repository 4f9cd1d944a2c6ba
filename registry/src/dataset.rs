//! Typed dataset: model definitions, constraint catalog and aliases.
//!
//! Documents are parsed into these types once, at load time. Anything that fails here
//! fails the load; nothing downstream handles loosely typed maps.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use semver::Version;
use serde::{Deserialize, Serialize};

use crate::constraint::{EnumConstraint, NumericConstraint, ObjectConstraint, ParameterConstraint};
use crate::error::{RegistryError, Result};
use crate::schema;
use crate::version::{parse_dated_identifier, CalendarDate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    Text,
    Image,
    Audio,
    Video,
    File,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeprecationStatus {
    #[default]
    Active,
    Deprecated,
    Sunset,
}

impl fmt::Display for DeprecationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DeprecationStatus::Active => "active",
            DeprecationStatus::Deprecated => "deprecated",
            DeprecationStatus::Sunset => "sunset",
        })
    }
}

/// Lifecycle of a model. A null date means "not scheduled yet", never "far future".
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DeprecationInfo {
    #[serde(default)]
    pub status: DeprecationStatus,
    #[serde(default)]
    pub deprecates_on: Option<CalendarDate>,
    #[serde(default, alias = "sunset_date")]
    pub sunsets_on: Option<CalendarDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replacement: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migration_guide: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
}

impl DeprecationInfo {
    pub fn active() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.status == DeprecationStatus::Active
    }

    fn check(&self) -> std::result::Result<(), String> {
        if let (Some(dep), Some(sun)) = (self.deprecates_on, self.sunsets_on) {
            if dep > sun {
                return Err(format!(
                    "deprecates_on {} is after sunsets_on {}",
                    dep, sun
                ));
            }
        }
        Ok(())
    }
}

/// Boolean feature flags. Missing flags are false.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CapabilityFlags {
    pub supports_streaming: bool,
    pub supports_structured_output: bool,
    pub supports_web_search: bool,
    pub supports_vision: bool,
    pub supports_function_calling: bool,
    pub supports_json_mode: bool,
    pub supports_audio: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingScheme {
    #[default]
    PerToken,
    PerMinute,
    PerImage,
    PerRequest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingUnit {
    #[default]
    MillionTokens,
    Minute,
    Image,
    Request,
}

fn default_currency() -> String {
    "USD".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingInfo {
    #[serde(default)]
    pub scheme: PricingScheme,
    #[serde(default)]
    pub unit: PricingUnit,
    #[serde(alias = "input_cost_per_million_tokens")]
    pub input_cost_per_unit: f64,
    #[serde(alias = "output_cost_per_million_tokens")]
    pub output_cost_per_unit: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tiers: Option<Vec<serde_json::Value>>,
}

impl PricingInfo {
    fn check(&self) -> std::result::Result<(), String> {
        for (name, cost) in [
            ("input_cost_per_unit", self.input_cost_per_unit),
            ("output_cost_per_unit", self.output_cost_per_unit),
        ] {
            if !cost.is_finite() || cost < 0.0 {
                return Err(format!("pricing.{} must be a non-negative number", name));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentTokenPolicy {
    IncludedInCallFee,
    BilledAtModelRate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebSearchBilling {
    pub call_fee_per_1000: f64,
    pub content_token_policy: ContentTokenPolicy,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BillingInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_search: Option<WebSearchBilling>,
}

/// Reference into the dataset's constraint catalog, e.g. `numeric_constraints.temperature`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintRef {
    #[serde(rename = "ref")]
    pub reference: String,
    /// Replaces the referenced numeric constraint's upper bound for this model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<f64>,
}

/// A model parameter as written in the document: a catalog reference or an inline constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterSpec {
    Reference(ConstraintRef),
    Inline(ParameterConstraint),
}

/// Shared constraints referenced from model parameters.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConstraintCatalog {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub numeric_constraints: BTreeMap<String, NumericConstraint>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub enum_constraints: BTreeMap<String, EnumConstraint>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub object_constraints: BTreeMap<String, ObjectConstraint>,
}

impl ConstraintCatalog {
    pub fn is_empty(&self) -> bool {
        self.numeric_constraints.is_empty()
            && self.enum_constraints.is_empty()
            && self.object_constraints.is_empty()
    }

    /// Looks up `section.name`.
    pub fn get(&self, reference: &str) -> Option<ParameterConstraint> {
        let (section, name) = reference.split_once('.')?;
        match section {
            "numeric_constraints" => self
                .numeric_constraints
                .get(name)
                .cloned()
                .map(ParameterConstraint::Numeric),
            "enum_constraints" => self
                .enum_constraints
                .get(name)
                .cloned()
                .map(ParameterConstraint::Enum),
            "object_constraints" => self
                .object_constraints
                .get(name)
                .cloned()
                .map(ParameterConstraint::Object),
            _ => None,
        }
    }

    /// Turns a parameter spec into a concrete constraint.
    pub fn materialize(&self, spec: &ParameterSpec) -> Result<ParameterConstraint> {
        match spec {
            ParameterSpec::Inline(c) => Ok(c.clone()),
            ParameterSpec::Reference(r) => {
                let mut constraint =
                    self.get(&r.reference)
                        .ok_or_else(|| RegistryError::ConstraintNotFound {
                            reference: r.reference.clone(),
                        })?;
                if let (Some(max), ParameterConstraint::Numeric(n)) = (r.max_value, &mut constraint)
                {
                    n.max = Some(max);
                }
                Ok(constraint)
            }
        }
    }

    fn check(&self) -> std::result::Result<(), String> {
        for (name, c) in &self.numeric_constraints {
            ParameterConstraint::Numeric(c.clone())
                .check()
                .map_err(|e| format!("numeric_constraints.{}: {}", name, e))?;
        }
        for (name, c) in &self.enum_constraints {
            ParameterConstraint::Enum(c.clone())
                .check()
                .map_err(|e| format!("enum_constraints.{}: {}", name, e))?;
        }
        for (name, c) in &self.object_constraints {
            ParameterConstraint::Object(c.clone())
                .check()
                .map_err(|e| format!("object_constraints.{}: {}", name, e))?;
        }
        Ok(())
    }
}

/// `context_window` may be a plain integer or `{total, output}`.
#[derive(Deserialize)]
#[serde(untagged)]
#[doc(hidden)]
pub enum ContextWindowRepr {
    Total(u64),
    Split { total: u64, output: Option<u64> },
}

/// Wire form of [`ModelDefinition`], normalized by `TryFrom`.
#[derive(Deserialize)]
#[doc(hidden)]
pub struct ModelDocument {
    context_window: ContextWindowRepr,
    #[serde(default)]
    max_output_tokens: Option<u64>,
    #[serde(default)]
    capabilities: CapabilityFlags,
    #[serde(default)]
    input_modalities: BTreeSet<Modality>,
    #[serde(default)]
    output_modalities: BTreeSet<Modality>,
    #[serde(default)]
    parameters: BTreeMap<String, ParameterSpec>,
    #[serde(default)]
    pricing: Option<PricingInfo>,
    #[serde(default)]
    billing: Option<BillingInfo>,
    #[serde(default)]
    deprecation: Option<DeprecationInfo>,
    #[serde(default)]
    min_version: Option<CalendarDate>,
    #[serde(default)]
    description: Option<String>,
}

/// One model's metadata. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ModelDocument")]
pub struct ModelDefinition {
    pub context_window: u64,
    pub max_output_tokens: u64,
    pub capabilities: CapabilityFlags,
    pub input_modalities: BTreeSet<Modality>,
    pub output_modalities: BTreeSet<Modality>,
    pub parameters: BTreeMap<String, ParameterSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pricing: Option<PricingInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing: Option<BillingInfo>,
    pub deprecation: DeprecationInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_version: Option<CalendarDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl TryFrom<ModelDocument> for ModelDefinition {
    type Error = String;

    fn try_from(doc: ModelDocument) -> std::result::Result<Self, Self::Error> {
        let (context_window, split_output) = match doc.context_window {
            ContextWindowRepr::Total(total) => (total, None),
            ContextWindowRepr::Split { total, output } => (total, output),
        };
        let max_output_tokens = doc
            .max_output_tokens
            .or(split_output)
            .ok_or("max_output_tokens is required")?;
        if context_window == 0 {
            return Err("context_window must be positive".into());
        }
        if max_output_tokens == 0 {
            return Err("max_output_tokens must be positive".into());
        }
        Ok(ModelDefinition {
            context_window,
            max_output_tokens,
            capabilities: doc.capabilities,
            input_modalities: doc.input_modalities,
            output_modalities: doc.output_modalities,
            parameters: doc.parameters,
            pricing: doc.pricing,
            billing: doc.billing,
            deprecation: doc.deprecation.unwrap_or_default(),
            min_version: doc.min_version,
            description: doc.description,
        })
    }
}

/// A non-fatal oddity in the data, surfaced in the load report and logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataQualityWarning {
    pub model: String,
    pub message: String,
}

impl fmt::Display for DataQualityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.model, self.message)
    }
}

impl ModelDefinition {
    /// Checks the invariants a single definition must hold against `catalog`.
    ///
    /// Fatal problems are errors; suspicious but usable data is appended to `warnings`.
    pub(crate) fn check(
        &self,
        model: &str,
        catalog: &ConstraintCatalog,
        source_name: &str,
        warnings: &mut Vec<DataQualityWarning>,
    ) -> Result<()> {
        let fail = |message: String| RegistryError::parse(source_name, format!("model '{}': {}", model, message));

        for (name, spec) in &self.parameters {
            let constraint = catalog.materialize(spec)?;
            constraint
                .check()
                .map_err(|e| fail(format!("parameter '{}': {}", name, e)))?;
        }
        self.deprecation.check().map_err(fail)?;
        if let Some(pricing) = &self.pricing {
            pricing.check().map_err(fail)?;
        }
        if let Some(ws) = self.billing.as_ref().and_then(|b| b.web_search.as_ref()) {
            if !ws.call_fee_per_1000.is_finite() || ws.call_fee_per_1000 < 0.0 {
                return Err(fail("billing.web_search.call_fee_per_1000 must be non-negative".into()));
            }
        }

        let mut warn = |message: &str| {
            warnings.push(DataQualityWarning {
                model: model.to_string(),
                message: message.to_string(),
            })
        };
        if self.deprecation.deprecates_on.is_none() && self.deprecation.sunsets_on.is_some() {
            warn("sunsets_on is scheduled but deprecates_on is not");
        }
        if self.deprecation.status == DeprecationStatus::Sunset && self.deprecation.sunsets_on.is_none() {
            warn("status is sunset but sunsets_on is unknown");
        }
        if self.max_output_tokens > self.context_window {
            warn("max_output_tokens exceeds context_window");
        }
        Ok(())
    }

    /// Resolves every parameter spec against `catalog`.
    pub fn materialize_parameters(
        &self,
        catalog: &ConstraintCatalog,
    ) -> Result<BTreeMap<String, ParameterConstraint>> {
        self.parameters
            .iter()
            .map(|(name, spec)| catalog.materialize(spec).map(|c| (name.clone(), c)))
            .collect()
    }
}

/// The base dataset: every model, the shared constraint catalog and declared aliases.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dataset {
    #[serde(rename = "version", serialize_with = "serialize_version")]
    pub schema_version: Version,
    pub models: BTreeMap<String, ModelDefinition>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub aliases: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "ConstraintCatalog::is_empty")]
    pub constraints: ConstraintCatalog,
}

fn serialize_version<S: serde::Serializer>(
    v: &Version,
    s: S,
) -> std::result::Result<S::Ok, S::Error> {
    s.collect_str(v)
}

/// Validates the date fields of one raw model (or override) entry up front, so a
/// malformed calendar date surfaces as `InvalidDate` instead of a generic parse error.
pub(crate) fn check_model_dates(model: &serde_yaml::Value) -> Result<()> {
    if let Some(v) = model.get("min_version") {
        check_date_value(v)?;
    }
    if let Some(deprecation) = model.get("deprecation") {
        for field in ["deprecates_on", "sunsets_on"] {
            if let Some(v) = deprecation.get(field) {
                check_date_value(v)?;
            }
        }
    }
    Ok(())
}

fn check_date_value(value: &serde_yaml::Value) -> Result<()> {
    #[derive(Deserialize)]
    struct Parts {
        year: i32,
        month: u32,
        day: u32,
    }

    match value {
        serde_yaml::Value::String(s) => s.parse::<CalendarDate>().map(|_| ()),
        serde_yaml::Value::Mapping(_) => match serde_yaml::from_value::<Parts>(value.clone()) {
            Ok(p) => CalendarDate::from_ymd(p.year, p.month, p.day).map(|_| ()),
            // Not date-shaped: serde reports it with the model name.
            Err(_) => Ok(()),
        },
        _ => Ok(()),
    }
}

/// Result of parsing a dataset document.
#[derive(Debug, Clone)]
pub struct ParsedDataset {
    pub dataset: Dataset,
    pub warnings: Vec<DataQualityWarning>,
}

impl Dataset {
    /// Parses and validates a YAML (or JSON) dataset document.
    ///
    /// The schema version is checked before any model is parsed, so an incompatible
    /// document fails with `SchemaIncompatible` rather than a parse error.
    pub fn parse(source_name: &str, text: &str) -> Result<ParsedDataset> {
        let doc: serde_yaml::Value =
            serde_yaml::from_str(text).map_err(|e| RegistryError::parse(source_name, e))?;
        let root = doc
            .as_mapping()
            .ok_or_else(|| RegistryError::parse(source_name, "document root must be a mapping"))?;

        let raw_version = root
            .get("version")
            .or_else(|| root.get("schema_version"))
            .map(yaml_scalar_to_string)
            .transpose()
            .map_err(|e| RegistryError::parse(source_name, e))?
            .unwrap_or_else(|| schema::DEFAULT_SCHEMA_VERSION.to_string());
        let schema_version = schema::check_compatible(&raw_version)?;

        let models_value = root
            .get("models")
            .ok_or_else(|| RegistryError::parse(source_name, "missing 'models' section"))?;
        let models_map = models_value
            .as_mapping()
            .ok_or_else(|| RegistryError::parse(source_name, "'models' must be a mapping"))?;

        let mut models = BTreeMap::new();
        for (key, value) in models_map {
            let name = key
                .as_str()
                .ok_or_else(|| RegistryError::parse(source_name, "model identifiers must be strings"))?;
            check_model_dates(value)?;
            let def: ModelDefinition = serde_yaml::from_value(value.clone())
                .map_err(|e| RegistryError::parse(source_name, format!("model '{}': {}", name, e)))?;
            models.insert(name.to_string(), def);
        }

        let aliases: BTreeMap<String, String> = match root.get("aliases") {
            Some(v) => serde_yaml::from_value(v.clone())
                .map_err(|e| RegistryError::parse(source_name, format!("aliases: {}", e)))?,
            None => BTreeMap::new(),
        };
        let constraints: ConstraintCatalog = match root.get("constraints") {
            Some(v) => serde_yaml::from_value(v.clone())
                .map_err(|e| RegistryError::parse(source_name, format!("constraints: {}", e)))?,
            None => ConstraintCatalog::default(),
        };

        let dataset = Dataset {
            schema_version,
            models,
            aliases,
            constraints,
        };
        let warnings = dataset.check(source_name)?;
        Ok(ParsedDataset { dataset, warnings })
    }

    fn check(&self, source_name: &str) -> Result<Vec<DataQualityWarning>> {
        self.constraints
            .check()
            .map_err(|e| RegistryError::parse(source_name, format!("constraints: {}", e)))?;

        let mut warnings = Vec::new();
        for (name, def) in &self.models {
            def.check(name, &self.constraints, source_name, &mut warnings)?;
        }

        for (alias, target) in &self.aliases {
            if parse_dated_identifier(alias).is_some() {
                return Err(RegistryError::parse(
                    source_name,
                    format!("alias '{}' must not be a dated identifier", alias),
                ));
            }
            let def = self.models.get(target).ok_or_else(|| {
                RegistryError::parse(
                    source_name,
                    format!("alias '{}' points at unknown model '{}'", alias, target),
                )
            })?;
            if let (Some(dated), Some(min)) = (parse_dated_identifier(target), def.min_version) {
                if dated.date < min {
                    return Err(RegistryError::parse(
                        source_name,
                        format!(
                            "alias '{}' points at '{}', which is older than its min_version {}",
                            alias, target, min
                        ),
                    ));
                }
            }
        }
        Ok(warnings)
    }

    /// Concrete identifier an alias designates, if any.
    ///
    /// Explicit `aliases` entries win; then a non-dated model of that exact name; then the
    /// newest dated model of that family that satisfies its own `min_version`.
    pub fn resolve_alias(&self, alias: &str) -> Option<String> {
        if let Some(target) = self.aliases.get(alias) {
            return Some(target.clone());
        }
        if self.models.contains_key(alias) {
            return Some(alias.to_string());
        }
        self.models
            .iter()
            .filter_map(|(name, def)| {
                let dated = parse_dated_identifier(name)?;
                if dated.base != alias {
                    return None;
                }
                match def.min_version {
                    Some(min) if dated.date < min => None,
                    _ => Some((dated.date, name)),
                }
            })
            .max_by_key(|(date, _)| *date)
            .map(|(_, name)| name.clone())
    }

    /// Every name a caller can ask for: model keys, declared aliases and family names.
    pub fn known_identifiers(&self) -> Vec<String> {
        let mut names: BTreeSet<String> = self.models.keys().cloned().collect();
        names.extend(self.aliases.keys().cloned());
        names.extend(self.alias_names());
        names.into_iter().collect()
    }

    /// Non-dated names that resolve to a model: declared aliases, non-dated keys and families.
    pub fn alias_names(&self) -> Vec<String> {
        let mut names: BTreeSet<String> = self.aliases.keys().cloned().collect();
        for name in self.models.keys() {
            match parse_dated_identifier(name) {
                Some(dated) => {
                    names.insert(dated.base);
                }
                None => {
                    names.insert(name.clone());
                }
            }
        }
        names
            .into_iter()
            .filter(|n| self.resolve_alias(n).is_some())
            .collect()
    }
}

fn yaml_scalar_to_string(v: &serde_yaml::Value) -> std::result::Result<String, String> {
    match v {
        serde_yaml::Value::String(s) => Ok(s.clone()),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        other => Err(format!("version must be a string, got {:?}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
version: "1.0.0"
constraints:
  numeric_constraints:
    temperature:
      min_value: 0.0
      max_value: 2.0
      description: Sampling temperature
models:
  gpt-4o-2024-08-06:
    context_window: 128000
    max_output_tokens: 16384
    capabilities:
      supports_streaming: true
      supports_structured_output: true
    input_modalities: [text, image]
    output_modalities: [text]
    parameters:
      temperature:
        ref: numeric_constraints.temperature
      reasoning_effort:
        type: enum
        enum: [low, medium, high]
    pricing:
      scheme: per_token
      unit: million_tokens
      input_cost_per_unit: 2.5
      output_cost_per_unit: 10.0
    min_version: {year: 2024, month: 8, day: 6}
  gpt-4o-2024-05-13:
    context_window: {total: 128000, output: 4096}
    deprecation:
      status: deprecated
      deprecates_on: "2025-01-01"
      sunsets_on: "2025-06-01"
      replacement: gpt-4o-2024-08-06
"#;

    #[test]
    fn parses_typed_models() {
        let parsed = Dataset::parse("sample", SAMPLE).unwrap();
        let ds = parsed.dataset;
        assert_eq!(ds.schema_version, Version::new(1, 0, 0));
        let m = &ds.models["gpt-4o-2024-08-06"];
        assert!(m.capabilities.supports_streaming);
        assert!(!m.capabilities.supports_web_search);
        assert!(m.input_modalities.contains(&Modality::Image));
        assert_eq!(m.deprecation.status, DeprecationStatus::Active);
        let params = m.materialize_parameters(&ds.constraints).unwrap();
        assert_eq!(params["temperature"].kind(), "numeric");
        assert_eq!(params["reasoning_effort"].kind(), "enum");

        let old = &ds.models["gpt-4o-2024-05-13"];
        assert_eq!(old.max_output_tokens, 4096);
        assert_eq!(old.deprecation.status, DeprecationStatus::Deprecated);
    }

    #[test]
    fn alias_by_convention_skips_gated_versions() {
        let ds = Dataset::parse("sample", SAMPLE).unwrap().dataset;
        assert_eq!(ds.resolve_alias("gpt-4o").as_deref(), Some("gpt-4o-2024-08-06"));
        assert!(ds.resolve_alias("gpt-5").is_none());
        assert!(ds.alias_names().contains(&"gpt-4o".to_string()));
    }

    #[test]
    fn unknown_constraint_reference_fails_load() {
        let text = r#"
version: "1.0.0"
models:
  m:
    context_window: 10
    max_output_tokens: 5
    parameters:
      temperature: {ref: numeric_constraints.missing}
"#;
        let err = Dataset::parse("inline", text).unwrap_err();
        assert!(matches!(err, RegistryError::ConstraintNotFound { .. }), "{:?}", err);
    }

    #[test]
    fn deprecation_dates_out_of_order_fail_load() {
        let text = r#"
version: "1.0.0"
models:
  m:
    context_window: 10
    max_output_tokens: 5
    deprecation: {status: deprecated, deprecates_on: "2025-06-01", sunsets_on: "2025-01-01"}
"#;
        assert!(matches!(
            Dataset::parse("inline", text),
            Err(RegistryError::Parse { .. })
        ));
    }

    #[test]
    fn missing_deprecation_date_is_a_warning_not_an_error() {
        let text = r#"
version: "1.0.0"
models:
  m:
    context_window: 10
    max_output_tokens: 5
    deprecation: {status: deprecated, sunsets_on: "2025-01-01"}
"#;
        let parsed = Dataset::parse("inline", text).unwrap();
        assert_eq!(parsed.warnings.len(), 1);
        assert_eq!(parsed.warnings[0].model, "m");
    }

    #[test]
    fn invalid_deprecation_date_fails_load() {
        let text = r#"
version: "1.0.0"
models:
  m:
    context_window: 10
    max_output_tokens: 5
    deprecation: {status: deprecated, deprecates_on: "2025-02-30"}
"#;
        match Dataset::parse("inline", text).unwrap_err() {
            RegistryError::InvalidDate { value, reason } => {
                assert_eq!(value, "2025-02-30");
                assert_eq!(reason, "not a valid calendar day");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn invalid_min_version_and_sunset_dates_are_invalid_date() {
        for bad in [
            "min_version: \"2024-13-01\"",
            "min_version: {year: 2024, month: 2, day: 30}",
            "deprecation: {status: deprecated, deprecates_on: \"2025-01-01\", sunsets_on: \"2025-04-31\"}",
        ] {
            let text = format!(
                "version: \"1.0.0\"\nmodels:\n  m:\n    context_window: 10\n    max_output_tokens: 5\n    {}\n",
                bad
            );
            let err = Dataset::parse("inline", &text).unwrap_err();
            assert!(matches!(err, RegistryError::InvalidDate { .. }), "{}: {:?}", bad, err);
        }
    }

    #[test]
    fn schema_is_checked_before_models() {
        let text = "version: \"2.0.0\"\nmodels:\n  m: {nonsense: true}\n";
        let err = Dataset::parse("inline", text).unwrap_err();
        assert!(matches!(err, RegistryError::SchemaIncompatible { .. }));
    }

    #[test]
    fn alias_to_gated_version_fails_load() {
        let text = r#"
version: "1.0.0"
aliases:
  fam: fam-2024-01-01
models:
  fam-2024-01-01:
    context_window: 10
    max_output_tokens: 5
    min_version: "2024-06-01"
"#;
        assert!(matches!(
            Dataset::parse("inline", text),
            Err(RegistryError::Parse { .. })
        ));
    }

    #[test]
    fn legacy_pricing_keys_are_accepted() {
        let p: PricingInfo = serde_yaml::from_str(
            "input_cost_per_million_tokens: 1.5\noutput_cost_per_million_tokens: 6\n",
        )
        .unwrap();
        assert_eq!(p.scheme, PricingScheme::PerToken);
        assert_eq!(p.unit, PricingUnit::MillionTokens);
        assert_eq!(p.output_cost_per_unit, 6.0);
        assert_eq!(p.currency, "USD");
    }
}
