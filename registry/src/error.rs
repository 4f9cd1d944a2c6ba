//! Error types for the model registry.

use std::path::PathBuf;

use thiserror::Error;

use crate::version::CalendarDate;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Why a numeric value fell outside a [`NumericConstraint`](crate::constraint::NumericConstraint).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeFailure {
    NotFinite,
    BelowMin,
    AboveMax,
    IntegerNotAllowed,
    FloatNotAllowed,
}

impl std::fmt::Display for RangeFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RangeFailure::NotFinite => "must be a finite number",
            RangeFailure::BelowMin => "is below the minimum",
            RangeFailure::AboveMax => "is above the maximum",
            RangeFailure::IntegerNotAllowed => "must be a float, not an integer",
            RangeFailure::FloatNotAllowed => "must be an integer",
        };
        f.write_str(s)
    }
}

/// A single value failing a single constraint. Carries no model or parameter context;
/// [`RegistryError::ParameterValidation`] adds that.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConstraintViolation {
    #[error("value {value} {reason} (allowed range: {}){}", fmt_range(.min, .max), fmt_description(.description))]
    OutOfRange {
        value: String,
        reason: RangeFailure,
        min: Option<f64>,
        max: Option<f64>,
        description: String,
    },
    #[error("invalid value '{value}'; allowed values: {}{}", .allowed.join(", "), fmt_description(.description))]
    NotAllowed {
        value: String,
        allowed: Vec<String>,
        description: String,
    },
    #[error("missing required key '{key}'{}", fmt_description(.description))]
    MissingRequiredKey { key: String, description: String },
    #[error("key '{key}' is not allowed; allowed keys: {}{}", .allowed.join(", "), fmt_description(.description))]
    DisallowedKey {
        key: String,
        allowed: Vec<String>,
        description: String,
    },
    #[error("expected {expected}, got {found}{}", fmt_description(.description))]
    TypeMismatch {
        expected: &'static str,
        found: String,
        description: String,
    },
}

fn fmt_range(min: &Option<f64>, max: &Option<f64>) -> String {
    match (min, max) {
        (Some(lo), Some(hi)) => format!("{} to {}", lo, hi),
        (Some(lo), None) => format!(">= {}", lo),
        (None, Some(hi)) => format!("<= {}", hi),
        (None, None) => "any finite number".to_string(),
    }
}

fn fmt_sunset(sunset_date: &Option<CalendarDate>, replacement: &Option<String>) -> String {
    let mut out = String::new();
    if let Some(d) = sunset_date {
        out.push_str(&format!(" since {}", d));
    }
    if let Some(r) = replacement {
        out.push_str(&format!("; use '{}' instead", r));
    }
    out
}

fn fmt_description(description: &str) -> String {
    if description.is_empty() {
        String::new()
    } else {
        format!(". Description: {}", description)
    }
}

/// Errors raised by loading, resolving, validating and updating model data.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("failed to parse {source_name}: {message}")]
    Parse {
        source_name: String,
        message: String,
    },
    #[error("schema version {found} is not supported (supported: {supported})")]
    SchemaIncompatible { found: String, supported: String },
    #[error("no viable data source (tried: {})", .tried.join(", "))]
    NoViableSource { tried: Vec<String> },
    #[error("model '{model}' is not supported; known models: {}", .known.join(", "))]
    ModelNotSupported { model: String, known: Vec<String> },
    #[error(
        "model '{model}' is older than the minimum supported version {min_version}{}",
        alias_hint(.alias)
    )]
    VersionTooOld {
        model: String,
        requested: CalendarDate,
        min_version: CalendarDate,
        /// Alias to use instead, when one resolves in the loaded data.
        alias: Option<String>,
    },
    #[error("invalid date '{value}': {reason}")]
    InvalidDate { value: String, reason: String },
    #[error("parameter '{parameter}' is not supported for model '{model}'")]
    ParameterNotSupported {
        parameter: String,
        model: String,
        supported: Vec<String>,
    },
    #[error("invalid value for parameter '{parameter}' on model '{model}': {violation}")]
    ParameterValidation {
        parameter: String,
        model: String,
        violation: ConstraintViolation,
    },
    #[error("constraint reference '{reference}' not found")]
    ConstraintNotFound { reference: String },
    #[error("unknown provider '{provider}'; known providers: {}", .known.join(", "))]
    UnknownProvider { provider: String, known: Vec<String> },
    #[error("model '{model}' is sunset{}", fmt_sunset(.sunset_date, .replacement))]
    ModelSunset {
        model: String,
        sunset_date: Option<CalendarDate>,
        replacement: Option<String>,
    },
    #[error("update fetch failed: {reason}")]
    FetchFailed { reason: String },
    #[error("integrity check failed for {file}: expected {expected}, got {actual}")]
    IntegrityCheckFailed {
        file: String,
        expected: String,
        actual: String,
    },
    #[error("io error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

fn alias_hint(alias: &Option<String>) -> String {
    match alias {
        Some(alias) => format!("; use the alias '{}' instead", alias),
        None => String::new(),
    }
}

impl RegistryError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RegistryError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn parse(source_name: impl Into<String>, message: impl ToString) -> Self {
        RegistryError::Parse {
            source_name: source_name.into(),
            message: message.to_string(),
        }
    }

    /// True for errors that describe the dataset files rather than a caller request.
    pub fn is_data_source_error(&self) -> bool {
        matches!(
            self,
            RegistryError::Parse { .. }
                | RegistryError::SchemaIncompatible { .. }
                | RegistryError::NoViableSource { .. }
                | RegistryError::ConstraintNotFound { .. }
                | RegistryError::IntegrityCheckFailed { .. }
                | RegistryError::Io { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_message_names_bounds_and_description() {
        let v = ConstraintViolation::OutOfRange {
            value: "3".to_string(),
            reason: RangeFailure::AboveMax,
            min: Some(0.0),
            max: Some(2.0),
            description: "Sampling temperature".to_string(),
        };
        let msg = v.to_string();
        assert!(msg.contains("0 to 2"), "{}", msg);
        assert!(msg.contains("Sampling temperature"), "{}", msg);
    }

    #[test]
    fn sunset_message_includes_replacement() {
        let err = RegistryError::ModelSunset {
            model: "old-model".to_string(),
            sunset_date: None,
            replacement: Some("new-model".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "model 'old-model' is sunset; use 'new-model' instead"
        );
    }

    #[test]
    fn schema_incompatible_names_both_versions() {
        let err = RegistryError::SchemaIncompatible {
            found: "2.0.0".to_string(),
            supported: "1.x (>=1.0.0, <2.0.0)".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("2.0.0"));
        assert!(msg.contains("1.x"));
    }
}
