//! The resolved, read-only capability record handed to callers.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::constraint::ParameterConstraint;
use crate::dataset::{DeprecationInfo, DeprecationStatus, ModelDefinition};
use crate::error::{RegistryError, Result};

/// One model as seen by one provider: aliases resolved, overrides merged and every
/// parameter materialized into a concrete constraint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffectiveCapability {
    /// Name the caller asked for (alias or dated id).
    pub requested_name: String,
    /// Concrete dataset entry it resolved to.
    pub model_id: String,
    pub provider: String,
    /// Dataset generation this record was built from.
    pub generation: u64,
    pub definition: ModelDefinition,
    pub parameters: BTreeMap<String, ParameterConstraint>,
}

impl EffectiveCapability {
    pub fn deprecation(&self) -> &DeprecationInfo {
        &self.definition.deprecation
    }

    pub fn is_sunset(&self) -> bool {
        self.definition.deprecation.status == DeprecationStatus::Sunset
    }

    pub fn is_deprecated(&self) -> bool {
        matches!(
            self.definition.deprecation.status,
            DeprecationStatus::Deprecated | DeprecationStatus::Sunset
        )
    }

    pub fn context_window(&self) -> u64 {
        self.definition.context_window
    }

    pub fn max_output_tokens(&self) -> u64 {
        self.definition.max_output_tokens
    }

    pub fn supports_parameter(&self, name: &str) -> bool {
        self.parameters.contains_key(name)
    }

    pub fn constraint(&self, name: &str) -> Option<&ParameterConstraint> {
        self.parameters.get(name)
    }

    /// Validates one parameter. Parameters the model does not declare are unsupported.
    pub fn validate_parameter(&self, name: &str, value: &Value) -> Result<()> {
        let constraint =
            self.parameters
                .get(name)
                .ok_or_else(|| RegistryError::ParameterNotSupported {
                    parameter: name.to_string(),
                    model: self.model_id.clone(),
                    supported: self.parameters.keys().cloned().collect(),
                })?;
        constraint
            .validate(value)
            .map_err(|violation| RegistryError::ParameterValidation {
                parameter: name.to_string(),
                model: self.model_id.clone(),
                violation,
            })
    }

    /// Validates every entry of `params`, stopping at the first failure.
    pub fn validate_parameters(&self, params: &Map<String, Value>) -> Result<()> {
        for (name, value) in params {
            self.validate_parameter(name, value)?;
        }
        Ok(())
    }
}
