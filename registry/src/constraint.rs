//! Parameter constraints: numeric ranges, enum membership and object key sets.
//!
//! Validation here knows nothing about models or parameter names. Callers attach that
//! context when turning a [`ConstraintViolation`] into a [`RegistryError`](crate::RegistryError).

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ConstraintViolation, RangeFailure};

fn default_true() -> bool {
    true
}

/// Inclusive numeric range. Either bound may be open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericConstraint {
    #[serde(default, alias = "min_value", skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, alias = "max_value", skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default = "default_true")]
    pub allow_int: bool,
    #[serde(default = "default_true")]
    pub allow_float: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl NumericConstraint {
    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        Self {
            min,
            max,
            allow_int: true,
            allow_float: true,
            description: String::new(),
        }
    }

    pub fn with_allow_int(mut self, allow: bool) -> Self {
        self.allow_int = allow;
        self
    }

    pub fn with_allow_float(mut self, allow: bool) -> Self {
        self.allow_float = allow;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Case-sensitive set of allowed strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumConstraint {
    #[serde(alias = "enum")]
    pub allowed_values: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

/// Required and (optionally) allowed keys of an object value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ObjectConstraint {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_keys: Vec<String>,
    /// `None` means any key is accepted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_keys: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParameterConstraint {
    Numeric(NumericConstraint),
    Enum(EnumConstraint),
    Object(ObjectConstraint),
}

impl ParameterConstraint {
    pub fn kind(&self) -> &'static str {
        match self {
            ParameterConstraint::Numeric(_) => "numeric",
            ParameterConstraint::Enum(_) => "enum",
            ParameterConstraint::Object(_) => "object",
        }
    }

    pub fn description(&self) -> &str {
        match self {
            ParameterConstraint::Numeric(c) => &c.description,
            ParameterConstraint::Enum(c) => &c.description,
            ParameterConstraint::Object(c) => &c.description,
        }
    }

    /// Structural invariants checked once when a dataset is loaded.
    pub fn check(&self) -> Result<(), String> {
        match self {
            ParameterConstraint::Numeric(c) => {
                for bound in [c.min, c.max].into_iter().flatten() {
                    if !bound.is_finite() {
                        return Err(format!("numeric bound {} is not finite", bound));
                    }
                }
                if let (Some(min), Some(max)) = (c.min, c.max) {
                    if min > max {
                        return Err(format!("min {} is greater than max {}", min, max));
                    }
                }
                if !c.allow_int && !c.allow_float {
                    return Err("numeric constraint allows neither integers nor floats".into());
                }
                Ok(())
            }
            ParameterConstraint::Enum(c) => {
                if c.allowed_values.is_empty() {
                    return Err("enum constraint has no allowed values".into());
                }
                Ok(())
            }
            ParameterConstraint::Object(c) => {
                if let Some(allowed) = &c.allowed_keys {
                    if let Some(missing) = c.required_keys.iter().find(|k| !allowed.contains(*k)) {
                        return Err(format!(
                            "required key '{}' is not in allowed_keys",
                            missing
                        ));
                    }
                }
                Ok(())
            }
        }
    }

    /// Validates a JSON value against whichever variant this is.
    pub fn validate(&self, value: &Value) -> Result<(), ConstraintViolation> {
        match self {
            ParameterConstraint::Numeric(c) => match NumericValue::from_json(value) {
                Some(n) => validate_numeric(n, c),
                None => Err(type_mismatch("number", value, &c.description)),
            },
            ParameterConstraint::Enum(c) => match value {
                Value::String(s) => validate_enum(s, c),
                other => Err(type_mismatch("string", other, &c.description)),
            },
            ParameterConstraint::Object(c) => match value {
                Value::Object(map) => validate_object(map, c),
                other => Err(type_mismatch("object", other, &c.description)),
            },
        }
    }
}

/// A caller-supplied number, keeping track of whether it was written as an integer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumericValue {
    Int(i64),
    Float(f64),
}

impl NumericValue {
    pub fn from_json(value: &Value) -> Option<Self> {
        let n = match value {
            Value::Number(n) => n,
            _ => return None,
        };
        if let Some(i) = n.as_i64() {
            Some(NumericValue::Int(i))
        } else {
            n.as_f64().map(NumericValue::Float)
        }
    }

    pub fn as_f64(&self) -> f64 {
        match *self {
            NumericValue::Int(i) => i as f64,
            NumericValue::Float(f) => f,
        }
    }
}

impl std::fmt::Display for NumericValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NumericValue::Int(i) => write!(f, "{}", i),
            NumericValue::Float(x) => write!(f, "{}", x),
        }
    }
}

impl From<f64> for NumericValue {
    fn from(v: f64) -> Self {
        NumericValue::Float(v)
    }
}

impl From<i64> for NumericValue {
    fn from(v: i64) -> Self {
        NumericValue::Int(v)
    }
}

/// Checks finiteness, integer/float admissibility and inclusive bounds, in that order.
pub fn validate_numeric(
    value: impl Into<NumericValue>,
    constraint: &NumericConstraint,
) -> Result<(), ConstraintViolation> {
    let value = value.into();
    let fail = |reason| ConstraintViolation::OutOfRange {
        value: value.to_string(),
        reason,
        min: constraint.min,
        max: constraint.max,
        description: constraint.description.clone(),
    };

    let x = value.as_f64();
    if !x.is_finite() {
        return Err(fail(RangeFailure::NotFinite));
    }
    match value {
        NumericValue::Int(_) if !constraint.allow_int => {
            return Err(fail(RangeFailure::IntegerNotAllowed))
        }
        NumericValue::Float(_) if !constraint.allow_float => {
            return Err(fail(RangeFailure::FloatNotAllowed))
        }
        _ => {}
    }
    if let Some(min) = constraint.min {
        if x < min {
            return Err(fail(RangeFailure::BelowMin));
        }
    }
    if let Some(max) = constraint.max {
        if x > max {
            return Err(fail(RangeFailure::AboveMax));
        }
    }
    Ok(())
}

pub fn validate_enum(value: &str, constraint: &EnumConstraint) -> Result<(), ConstraintViolation> {
    if constraint.allowed_values.iter().any(|v| v == value) {
        return Ok(());
    }
    let allowed: BTreeSet<&String> = constraint.allowed_values.iter().collect();
    Err(ConstraintViolation::NotAllowed {
        value: value.to_string(),
        allowed: allowed.into_iter().cloned().collect(),
        description: constraint.description.clone(),
    })
}

pub fn validate_object(
    value: &Map<String, Value>,
    constraint: &ObjectConstraint,
) -> Result<(), ConstraintViolation> {
    if let Some(key) = constraint
        .required_keys
        .iter()
        .find(|k| !value.contains_key(k.as_str()))
    {
        return Err(ConstraintViolation::MissingRequiredKey {
            key: key.clone(),
            description: constraint.description.clone(),
        });
    }
    if let Some(allowed) = &constraint.allowed_keys {
        if let Some(key) = value.keys().find(|k| !allowed.contains(*k)) {
            let mut allowed = allowed.clone();
            allowed.sort();
            return Err(ConstraintViolation::DisallowedKey {
                key: key.clone(),
                allowed,
                description: constraint.description.clone(),
            });
        }
    }
    Ok(())
}

fn type_mismatch(expected: &'static str, found: &Value, description: &str) -> ConstraintViolation {
    let found = match found {
        Value::Null => "null".to_string(),
        Value::Bool(b) => format!("boolean {}", b),
        Value::Number(n) => format!("number {}", n),
        Value::String(s) => format!("string '{}'", s),
        Value::Array(_) => "array".to_string(),
        Value::Object(_) => "object".to_string(),
    };
    ConstraintViolation::TypeMismatch {
        expected,
        found,
        description: description.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn zero_to_two() -> NumericConstraint {
        NumericConstraint::new(Some(0.0), Some(2.0)).with_description("Sampling temperature")
    }

    #[test]
    fn numeric_bounds_are_inclusive() {
        let c = zero_to_two();
        assert!(validate_numeric(0.7, &c).is_ok());
        assert!(validate_numeric(0.0, &c).is_ok());
        assert!(validate_numeric(2.0, &c).is_ok());
        assert!(validate_numeric(1i64, &c).is_ok());
        let err = validate_numeric(3.0, &c).unwrap_err();
        assert!(matches!(
            err,
            ConstraintViolation::OutOfRange {
                reason: RangeFailure::AboveMax,
                ..
            }
        ));
        let err = validate_numeric(-0.1, &c).unwrap_err();
        assert!(matches!(
            err,
            ConstraintViolation::OutOfRange {
                reason: RangeFailure::BelowMin,
                ..
            }
        ));
    }

    #[test]
    fn non_finite_values_always_fail() {
        let bounded = zero_to_two();
        let open = NumericConstraint::new(None, None);
        for c in [&bounded, &open] {
            for v in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
                let err = validate_numeric(v, c).unwrap_err();
                assert!(matches!(
                    err,
                    ConstraintViolation::OutOfRange {
                        reason: RangeFailure::NotFinite,
                        ..
                    }
                ));
            }
        }
    }

    #[test]
    fn integer_and_float_admissibility() {
        let floats_only = zero_to_two().with_allow_int(false);
        assert!(validate_numeric(1.0, &floats_only).is_ok());
        assert!(matches!(
            validate_numeric(1i64, &floats_only),
            Err(ConstraintViolation::OutOfRange {
                reason: RangeFailure::IntegerNotAllowed,
                ..
            })
        ));

        let ints_only = NumericConstraint::new(Some(1.0), None).with_allow_float(false);
        assert!(validate_numeric(4096i64, &ints_only).is_ok());
        assert!(matches!(
            validate_numeric(1.5, &ints_only),
            Err(ConstraintViolation::OutOfRange {
                reason: RangeFailure::FloatNotAllowed,
                ..
            })
        ));
    }

    #[test]
    fn enum_is_case_sensitive_and_lists_sorted_values() {
        let c = EnumConstraint {
            allowed_values: vec!["medium".into(), "low".into(), "high".into()],
            description: String::new(),
        };
        assert!(validate_enum("low", &c).is_ok());
        match validate_enum("LOW", &c).unwrap_err() {
            ConstraintViolation::NotAllowed { allowed, .. } => {
                assert_eq!(allowed, vec!["high", "low", "medium"])
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn object_required_and_allowed_keys() {
        let c = ObjectConstraint {
            required_keys: vec!["type".into()],
            allowed_keys: Some(vec!["type".into(), "json_schema".into()]),
            description: String::new(),
        };
        let ok = json!({"type": "json_schema", "json_schema": {}});
        assert!(validate_object(ok.as_object().unwrap(), &c).is_ok());

        let missing = json!({"json_schema": {}});
        assert!(matches!(
            validate_object(missing.as_object().unwrap(), &c),
            Err(ConstraintViolation::MissingRequiredKey { ref key, .. }) if key == "type"
        ));

        let extra = json!({"type": "text", "strict": true});
        assert!(matches!(
            validate_object(extra.as_object().unwrap(), &c),
            Err(ConstraintViolation::DisallowedKey { ref key, .. }) if key == "strict"
        ));

        let unrestricted = ObjectConstraint {
            required_keys: vec!["type".into()],
            ..Default::default()
        };
        assert!(validate_object(extra.as_object().unwrap(), &unrestricted).is_ok());
    }

    #[test]
    fn validate_dispatches_on_json_type() {
        let numeric = ParameterConstraint::Numeric(zero_to_two());
        assert!(numeric.validate(&json!(1)).is_ok());
        assert!(numeric.validate(&json!(0.5)).is_ok());
        assert!(matches!(
            numeric.validate(&json!("0.5")),
            Err(ConstraintViolation::TypeMismatch {
                expected: "number",
                ..
            })
        ));
        assert!(matches!(
            numeric.validate(&json!(true)),
            Err(ConstraintViolation::TypeMismatch { .. })
        ));
    }

    #[test]
    fn check_rejects_inverted_bounds_and_empty_enums() {
        let inverted = ParameterConstraint::Numeric(NumericConstraint::new(Some(2.0), Some(1.0)));
        assert!(inverted.check().is_err());
        let empty = ParameterConstraint::Enum(EnumConstraint {
            allowed_values: vec![],
            description: String::new(),
        });
        assert!(empty.check().is_err());
        let bad_object = ParameterConstraint::Object(ObjectConstraint {
            required_keys: vec!["a".into()],
            allowed_keys: Some(vec!["b".into()]),
            description: String::new(),
        });
        assert!(bad_object.check().is_err());
    }

    #[test]
    fn deserializes_tagged_yaml_with_legacy_field_names() {
        let yaml = r#"
type: numeric
min_value: 0
max_value: 2
allow_int: false
"#;
        let c: ParameterConstraint = serde_yaml::from_str(yaml).unwrap();
        match c {
            ParameterConstraint::Numeric(n) => {
                assert_eq!(n.min, Some(0.0));
                assert_eq!(n.max, Some(2.0));
                assert!(!n.allow_int);
                assert!(n.allow_float);
            }
            other => panic!("unexpected {:?}", other),
        }
        let e: ParameterConstraint =
            serde_yaml::from_str("type: enum\nenum: [low, high]\n").unwrap();
        assert_eq!(e.kind(), "enum");
    }
}
