//! Dataset schema version compatibility.

use semver::{Version, VersionReq};

use crate::error::{RegistryError, Result};

/// Label and requirement of the schema versions this crate can read.
pub const SUPPORTED_SCHEMA: (&str, &str) = ("1.x", ">=1.0.0, <2.0.0");

/// Schema version assumed for documents that do not declare one.
pub const DEFAULT_SCHEMA_VERSION: &str = "1.0.0";

/// Human-readable supported range, e.g. `1.x (>=1.0.0, <2.0.0)`.
pub fn supported_range() -> String {
    format!("{} ({})", SUPPORTED_SCHEMA.0, SUPPORTED_SCHEMA.1)
}

/// Parses a schema version, padding `"1"` and `"1.0"` out to three components.
pub fn parse_schema_version(raw: &str) -> Result<Version> {
    let trimmed = raw.trim();
    let (core, suffix) = match trimmed.find(|c| c == '-' || c == '+') {
        Some(i) => trimmed.split_at(i),
        None => (trimmed, ""),
    };
    let padded = match core.split('.').count() {
        1 => format!("{}.0.0{}", core, suffix),
        2 => format!("{}.0{}", core, suffix),
        _ => trimmed.to_string(),
    };
    Version::parse(&padded).map_err(|e| RegistryError::SchemaIncompatible {
        found: format!("{} ({})", raw, e),
        supported: supported_range(),
    })
}

/// Fails closed when `raw` is unparseable or outside the supported range.
///
/// Prerelease versions are compared as their release (`1.2.0-beta` counts as `1.2.0`).
pub fn check_compatible(raw: &str) -> Result<Version> {
    let version = parse_schema_version(raw)?;
    let base = Version::new(version.major, version.minor, version.patch);
    let req = VersionReq::parse(SUPPORTED_SCHEMA.1).map_err(|e| {
        RegistryError::InvalidConfig(format!("bad supported schema range: {}", e))
    })?;
    if req.matches(&base) {
        Ok(version)
    } else {
        Err(RegistryError::SchemaIncompatible {
            found: raw.to_string(),
            supported: supported_range(),
        })
    }
}
