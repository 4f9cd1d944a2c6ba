//! Picks the dataset to trust from an ordered list of candidate sources.
//!
//! A candidate that does not exist is skipped quietly. A candidate that exists but fails to
//! parse, validate or verify is rejected loudly (logged at `warn` and kept in
//! [`LoadedData::rejected`]); an explicit path is never skipped past, its error is returned.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dataset::{DataQualityWarning, Dataset};
use crate::error::{RegistryError, Result};
use crate::integrity;
use crate::overrides::ProviderOverrideSet;

pub const MODELS_FILE: &str = "models.yaml";
pub const OVERRIDES_FILE: &str = "overrides.yaml";
pub const CHECKSUMS_FILE: &str = "checksums.txt";
pub const VERSION_INFO_FILE: &str = "version_info.json";

/// Files the registry owns inside a user data directory.
pub const DATA_FILES: [&str; 4] = [MODELS_FILE, OVERRIDES_FILE, CHECKSUMS_FILE, VERSION_INFO_FILE];

/// Release version of the data compiled into this crate.
pub const BUNDLED_DATA_VERSION: &str = "1.0.0";

const BUNDLED_MODELS: &str = include_str!("../data/models.yaml");
const BUNDLED_OVERRIDES: &str = include_str!("../data/overrides.yaml");

/// One place a dataset may come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    /// A dataset file named by the caller; `overrides.yaml` next to it is used when present.
    ExplicitPath(PathBuf),
    /// A writable directory holding `models.yaml` and friends, e.g. installed by an update.
    UserDir(PathBuf),
    /// The dataset compiled into the crate.
    Bundled,
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::ExplicitPath(p) => write!(f, "explicit path {}", p.display()),
            DataSource::UserDir(p) => write!(f, "user data dir {}", p.display()),
            DataSource::Bundled => f.write_str("bundled data"),
        }
    }
}

/// `version_info.json`, written next to installed data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
    pub installed_at: DateTime<Utc>,
}

/// A candidate that existed but could not be used.
#[derive(Debug, Clone)]
pub struct RejectedSource {
    pub source: DataSource,
    pub error: String,
}

/// Everything one load produced: the dataset, its overrides and where they came from.
#[derive(Debug, Clone)]
pub struct LoadedData {
    pub dataset: Dataset,
    pub overrides: ProviderOverrideSet,
    pub source: DataSource,
    pub data_version: Option<semver::Version>,
    pub warnings: Vec<DataQualityWarning>,
    pub rejected: Vec<RejectedSource>,
}

impl LoadedData {
    /// Parses and cross-checks a models document and an optional overrides document.
    pub fn from_documents(
        source: DataSource,
        models_text: &str,
        overrides_text: Option<&str>,
    ) -> Result<Self> {
        let source_name = source.to_string();
        let parsed = Dataset::parse(&source_name, models_text)?;
        let overrides = match overrides_text {
            Some(text) => ProviderOverrideSet::parse(&format!("{} overrides", source_name), text)?,
            None => ProviderOverrideSet::empty(),
        }
        .bind_to(&parsed.dataset);
        overrides.check_against(&parsed.dataset, &source_name)?;
        Ok(LoadedData {
            dataset: parsed.dataset,
            overrides,
            source,
            data_version: None,
            warnings: parsed.warnings,
            rejected: Vec::new(),
        })
    }

    /// The dataset compiled into the crate.
    pub fn bundled() -> Result<Self> {
        let mut data = Self::from_documents(DataSource::Bundled, BUNDLED_MODELS, Some(BUNDLED_OVERRIDES))?;
        data.data_version = semver::Version::parse(BUNDLED_DATA_VERSION).ok();
        Ok(data)
    }
}

/// Loads the first viable candidate, in order.
pub fn load(candidates: &[DataSource]) -> Result<LoadedData> {
    let mut tried = Vec::new();
    let mut rejected: Vec<RejectedSource> = Vec::new();
    let mut first_error: Option<RegistryError> = None;

    for candidate in candidates {
        match try_load(candidate) {
            Ok(Some(mut data)) => {
                for w in &data.warnings {
                    tracing::warn!(source = %candidate, warning = %w, "data quality warning");
                }
                tracing::info!(source = %candidate, models = data.dataset.models.len(), "model dataset loaded");
                data.rejected = rejected;
                return Ok(data);
            }
            Ok(None) => {
                tracing::debug!(source = %candidate, "dataset candidate absent");
                tried.push(candidate.to_string());
            }
            Err(e) => {
                if matches!(candidate, DataSource::ExplicitPath(_)) {
                    tracing::error!(source = %candidate, error = %e, "explicit dataset failed to load");
                    return Err(e);
                }
                tracing::warn!(source = %candidate, error = %e, "dataset candidate rejected");
                tried.push(candidate.to_string());
                rejected.push(RejectedSource {
                    source: candidate.clone(),
                    error: e.to_string(),
                });
                first_error.get_or_insert(e);
            }
        }
    }

    Err(first_error.unwrap_or(RegistryError::NoViableSource { tried }))
}

/// `Ok(None)` when the candidate does not exist at all.
fn try_load(candidate: &DataSource) -> Result<Option<LoadedData>> {
    match candidate {
        DataSource::Bundled => LoadedData::bundled().map(Some),
        DataSource::ExplicitPath(path) => {
            let Some(models) = read_optional(path)? else {
                return Ok(None);
            };
            let overrides = match path.parent() {
                Some(dir) => read_optional(&dir.join(OVERRIDES_FILE))?,
                None => None,
            };
            LoadedData::from_documents(candidate.clone(), &models, overrides.as_deref()).map(Some)
        }
        DataSource::UserDir(dir) => {
            let Some(models) = read_optional(&dir.join(MODELS_FILE))? else {
                return Ok(None);
            };
            let overrides = read_optional(&dir.join(OVERRIDES_FILE))?;
            if let Some(sums) = read_optional(&dir.join(CHECKSUMS_FILE))? {
                let sums = integrity::parse_checksums(&sums)?;
                integrity::verify(MODELS_FILE, models.as_bytes(), &sums)?;
                if let Some(o) = &overrides {
                    if sums.contains_key(OVERRIDES_FILE) {
                        integrity::verify(OVERRIDES_FILE, o.as_bytes(), &sums)?;
                    }
                }
            }
            let mut data =
                LoadedData::from_documents(candidate.clone(), &models, overrides.as_deref())?;
            data.data_version = read_version_info(dir)
                .and_then(|info| semver::Version::parse(&info.version).ok());
            Ok(Some(data))
        }
    }
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(s) => Ok(Some(s)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(RegistryError::io(path, e)),
    }
}

/// Reads `version_info.json` from `dir`; missing or unreadable info is `None`.
pub fn read_version_info(dir: &Path) -> Option<VersionInfo> {
    let path = dir.join(VERSION_INFO_FILE);
    let text = std::fs::read_to_string(&path).ok()?;
    match serde_json::from_str(&text) {
        Ok(info) => Some(info),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable version info");
            None
        }
    }
}

/// Size and presence of one registry-owned file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataFileInfo {
    pub name: String,
    pub path: PathBuf,
    pub exists: bool,
    pub size: u64,
}

pub fn data_files_info(dir: &Path) -> Vec<DataFileInfo> {
    DATA_FILES
        .iter()
        .map(|name| {
            let path = dir.join(name);
            let meta = std::fs::metadata(&path).ok();
            DataFileInfo {
                name: name.to_string(),
                exists: meta.is_some(),
                size: meta.map(|m| m.len()).unwrap_or(0),
                path,
            }
        })
        .collect()
}

/// Deletes the named registry files from `dir`. Names outside [`DATA_FILES`] are refused.
/// Returns the paths actually removed.
pub fn clear_data_files(dir: &Path, files: &[&str]) -> Result<Vec<PathBuf>> {
    let mut removed = Vec::new();
    for name in files {
        if !DATA_FILES.contains(name) {
            return Err(RegistryError::InvalidConfig(format!(
                "refusing to delete '{}': not a registry data file",
                name
            )));
        }
        let path = dir.join(name);
        match std::fs::remove_file(&path) {
            Ok(()) => removed.push(path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(RegistryError::io(path, e)),
        }
    }
    Ok(removed)
}
