//! Lifecycle gate: sunset models are blocked, deprecated ones pass with a warning.

use crate::capability::EffectiveCapability;
use crate::dataset::{DeprecationInfo, DeprecationStatus};
use crate::error::{RegistryError, Result};

/// Outcome of a successful gate check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    Active,
    /// Usable, but the caller should surface `message`.
    Deprecated { message: String },
}

/// Fails with `ModelSunset` for sunset models. Deprecated models pass and are logged at `warn`.
pub fn assert_active(capability: &EffectiveCapability) -> Result<GateOutcome> {
    let info = capability.deprecation();
    match info.status {
        DeprecationStatus::Active => Ok(GateOutcome::Active),
        DeprecationStatus::Sunset => Err(RegistryError::ModelSunset {
            model: capability.model_id.clone(),
            sunset_date: info.sunsets_on,
            replacement: info.replacement.clone(),
        }),
        DeprecationStatus::Deprecated => {
            let mut message = format!(
                "{} is deprecated; will sunset {}",
                capability.model_id,
                info.sunsets_on
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "on an unknown date".to_string())
            );
            if let Some(replacement) = &info.replacement {
                message.push_str(&format!("; use {} instead", replacement));
            }
            tracing::warn!(model = %capability.model_id, "{}", message);
            Ok(GateOutcome::Deprecated { message })
        }
    }
}

/// HTTP-style announcement headers (`Deprecation`, `Sunset`, `Link`) for `info`.
///
/// Empty for an active model with nothing scheduled. Only dates that are known are emitted.
pub fn sunset_headers(info: &DeprecationInfo) -> Vec<(&'static str, String)> {
    let scheduled = info.deprecates_on.is_some() || info.sunsets_on.is_some();
    if info.status == DeprecationStatus::Active && !scheduled {
        return Vec::new();
    }
    let mut headers = Vec::new();
    match info.deprecates_on {
        Some(d) => headers.push(("Deprecation", d.to_string())),
        None if info.status != DeprecationStatus::Active => {
            headers.push(("Deprecation", "true".to_string()))
        }
        None => {}
    }
    if let Some(s) = info.sunsets_on {
        headers.push(("Sunset", s.to_string()));
    }
    if let Some(url) = &info.migration_guide {
        headers.push(("Link", format!("<{}>; rel=\"deprecation\"", url)));
    }
    headers
}
