//! Data updates: decide whether a refresh is needed, fetch and verify it, install it.
//!
//! Nothing here touches the in-memory dataset. [`ModelRegistry`](crate::ModelRegistry) swaps
//! generations only after [`install`] has put every file in place.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use semver::Version;

use crate::error::{RegistryError, Result};
use crate::integrity;
use crate::loader::{
    DataSource, LoadedData, VersionInfo, CHECKSUMS_FILE, DATA_FILES, MODELS_FILE, OVERRIDES_FILE,
    VERSION_INFO_FILE,
};

/// Default bound on a single remote call.
pub const DEFAULT_UPDATE_TIMEOUT: Duration = Duration::from_secs(30);

/// Caller-controlled update switches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatePolicy {
    pub disabled: bool,
    /// A pinned data version; any pin disables updates.
    pub version_pin: Option<String>,
    pub timeout: Duration,
    /// `owner/name` of the repository publishing data releases.
    pub release_repo: String,
}

impl Default for UpdatePolicy {
    fn default() -> Self {
        Self {
            disabled: false,
            version_pin: None,
            timeout: DEFAULT_UPDATE_TIMEOUT,
            release_repo: crate::github::DEFAULT_RELEASE_REPO.to_string(),
        }
    }
}

impl UpdatePolicy {
    pub fn disabled_reason(&self) -> Option<String> {
        if let Some(pin) = &self.version_pin {
            return Some(format!("data version pinned to {}", pin));
        }
        if self.disabled {
            return Some("data updates are disabled".to_string());
        }
        None
    }
}

/// What a remote source says about its newest data release.
#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseDescriptor {
    pub version: Version,
    pub tag: String,
    pub published_at: Option<String>,
    pub notes: Option<String>,
    pub html_url: Option<String>,
    /// Combined size in bytes of the data files, when the source knows it.
    pub size: u64,
    /// Downloadable files by name.
    pub assets: BTreeMap<String, String>,
}

/// Downloaded release content, not yet verified.
#[derive(Debug, Clone)]
pub struct UpdatePackage {
    pub release: ReleaseDescriptor,
    pub models: String,
    pub overrides: Option<String>,
    pub checksums: BTreeMap<String, String>,
}

/// Anything that can report and deliver data releases.
#[async_trait]
pub trait UpdateSource: Send + Sync {
    async fn latest(&self) -> Result<ReleaseDescriptor>;

    async fn fetch(&self, release: &ReleaseDescriptor) -> Result<UpdatePackage>;
}

/// A package whose digests matched and whose documents parsed and validated.
#[derive(Debug, Clone)]
pub struct ValidatedUpdate {
    pub release: ReleaseDescriptor,
    pub(crate) package: UpdatePackage,
    pub(crate) data: LoadedData,
}

impl ValidatedUpdate {
    pub fn model_count(&self) -> usize {
        self.data.dataset.models.len()
    }
}

#[derive(Debug, Clone)]
pub enum UpdateState {
    AlreadyCurrent {
        current: Version,
        latest: ReleaseDescriptor,
    },
    UpdateAvailable {
        current: Option<Version>,
        latest: ReleaseDescriptor,
    },
    Validated(Box<ValidatedUpdate>),
    Disabled {
        reason: String,
    },
    /// Network, timeout or verification failure. Local data is untouched.
    FetchFailed {
        reason: String,
    },
}

impl UpdateState {
    pub fn name(&self) -> &'static str {
        match self {
            UpdateState::AlreadyCurrent { .. } => "already_current",
            UpdateState::UpdateAvailable { .. } => "update_available",
            UpdateState::Validated(_) => "validated",
            UpdateState::Disabled { .. } => "disabled",
            UpdateState::FetchFailed { .. } => "fetch_failed",
        }
    }
}

/// Switches for [`ModelRegistry::refresh`](crate::ModelRegistry::refresh).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshOptions {
    /// Download even when the local data is already current.
    pub force: bool,
    /// Stop after validation; nothing is written or swapped.
    pub validate_only: bool,
}

#[derive(Debug, Clone)]
pub enum RefreshOutcome {
    Updated { version: Version, generation: u64 },
    NotApplied(UpdateState),
}

pub struct UpdateCoordinator {
    policy: UpdatePolicy,
}

impl UpdateCoordinator {
    pub fn new(policy: UpdatePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &UpdatePolicy {
        &self.policy
    }

    /// Compares `current` with the source's newest release using semver ordering.
    /// `current == None` (unknown local version) always reports an available update.
    pub async fn check(&self, source: &dyn UpdateSource, current: Option<&Version>) -> UpdateState {
        if let Some(reason) = self.policy.disabled_reason() {
            return UpdateState::Disabled { reason };
        }
        let latest = match self.bounded(source.latest()).await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "update check failed");
                return UpdateState::FetchFailed {
                    reason: e.to_string(),
                };
            }
        };
        match current {
            Some(cur) if latest.version <= *cur => UpdateState::AlreadyCurrent {
                current: cur.clone(),
                latest,
            },
            _ => UpdateState::UpdateAvailable {
                current: current.cloned(),
                latest,
            },
        }
    }

    /// Downloads `release`, verifies its digests and validates its documents.
    pub async fn fetch_and_validate(
        &self,
        source: &dyn UpdateSource,
        release: &ReleaseDescriptor,
    ) -> UpdateState {
        if let Some(reason) = self.policy.disabled_reason() {
            return UpdateState::Disabled { reason };
        }
        let package = match self.bounded(source.fetch(release)).await {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(error = %e, version = %release.version, "update download failed");
                return UpdateState::FetchFailed {
                    reason: e.to_string(),
                };
            }
        };
        match validate(package) {
            Ok(v) => UpdateState::Validated(Box::new(v)),
            Err(e) => {
                tracing::warn!(error = %e, version = %release.version, "update rejected");
                UpdateState::FetchFailed {
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn bounded<T>(&self, fut: impl std::future::Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.policy.timeout, fut).await {
            Ok(r) => r,
            Err(_) => Err(RegistryError::FetchFailed {
                reason: format!("timed out after {}s", self.policy.timeout.as_secs_f64()),
            }),
        }
    }
}

/// Checks digests then parses; nothing is written.
pub fn validate(package: UpdatePackage) -> Result<ValidatedUpdate> {
    integrity::verify(MODELS_FILE, package.models.as_bytes(), &package.checksums)?;
    if let Some(overrides) = &package.overrides {
        integrity::verify(OVERRIDES_FILE, overrides.as_bytes(), &package.checksums)?;
    }
    let source = DataSource::UserDir(format!("release {}", package.release.tag).into());
    let mut data = LoadedData::from_documents(source, &package.models, package.overrides.as_deref())?;
    data.data_version = Some(package.release.version.clone());
    Ok(ValidatedUpdate {
        release: package.release.clone(),
        package,
        data,
    })
}

/// Writes a validated release into `dir`, all or nothing.
///
/// New files are staged inside `dir`, current files are moved aside, and staged files are
/// renamed into place. If any step fails the moved-aside files are restored.
pub fn install(update: &ValidatedUpdate, dir: &Path) -> Result<()> {
    install_with(update, dir, |from, to| std::fs::rename(from, to))
}

/// [`install`] with the final staged-to-target rename supplied by the caller.
fn install_with<F>(update: &ValidatedUpdate, dir: &Path, place: F) -> Result<()>
where
    F: Fn(&Path, &Path) -> std::io::Result<()>,
{
    std::fs::create_dir_all(dir).map_err(|e| RegistryError::io(dir, e))?;

    let staging = tempfile::Builder::new()
        .prefix(".staging-")
        .tempdir_in(dir)
        .map_err(|e| RegistryError::io(dir, e))?;
    let pkg = &update.package;
    let info = VersionInfo {
        version: update.release.version.to_string(),
        tag_name: Some(update.release.tag.clone()),
        published_at: update.release.published_at.clone(),
        installed_at: chrono::Utc::now(),
    };
    let info_json = serde_json::to_string_pretty(&info)
        .map_err(|e| RegistryError::InvalidConfig(format!("version info: {}", e)))?;

    let mut staged: Vec<(&str, String)> = vec![
        (MODELS_FILE, pkg.models.clone()),
        (CHECKSUMS_FILE, integrity::render_checksums(&pkg.checksums)),
        (VERSION_INFO_FILE, info_json),
    ];
    if let Some(o) = &pkg.overrides {
        staged.push((OVERRIDES_FILE, o.clone()));
    }
    for (name, content) in &staged {
        let path = staging.path().join(name);
        std::fs::write(&path, content).map_err(|e| RegistryError::io(&path, e))?;
    }

    let backup = tempfile::Builder::new()
        .prefix(".backup-")
        .tempdir_in(dir)
        .map_err(|e| RegistryError::io(dir, e))?;
    let mut moved_aside = Vec::new();
    for name in DATA_FILES {
        let current = dir.join(name);
        if current.exists() {
            if let Err(e) = std::fs::rename(&current, backup.path().join(name)) {
                return Err(roll_back(dir, backup, &moved_aside, &[], current, e));
            }
            moved_aside.push(name);
        }
    }

    let mut installed = Vec::new();
    for (name, _) in &staged {
        let target = dir.join(name);
        if let Err(e) = place(&staging.path().join(name), &target) {
            return Err(roll_back(dir, backup, &moved_aside, &installed, target, e));
        }
        installed.push(*name);
    }
    tracing::info!(dir = %dir.display(), version = %update.release.version, "data update installed");
    Ok(())
}

/// Puts the moved-aside files back and builds the error for the failed step. When a file
/// cannot be restored, the backup directory is kept on disk and named in the error.
fn roll_back(
    dir: &Path,
    backup: tempfile::TempDir,
    moved_aside: &[&str],
    installed: &[&str],
    failed: PathBuf,
    cause: std::io::Error,
) -> RegistryError {
    for name in installed {
        let _ = std::fs::remove_file(dir.join(name));
    }
    let mut stranded = Vec::new();
    for name in moved_aside {
        if let Err(e) = std::fs::rename(backup.path().join(name), dir.join(name)) {
            tracing::error!(file = %name, error = %e, "failed to restore data file after aborted update");
            stranded.push(*name);
        }
    }
    if stranded.is_empty() {
        return RegistryError::io(failed, cause);
    }
    let kept = backup.keep();
    tracing::error!(backup = %kept.display(), files = ?stranded, "previous data files left in backup directory");
    RegistryError::io(
        failed,
        std::io::Error::new(
            cause.kind(),
            format!(
                "{}; could not restore {} (previous copies kept in {})",
                cause,
                stranded.join(", "),
                kept.display()
            ),
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const MODELS: &str = "version: \"1.0.0\"\nmodels:\n  m:\n    context_window: 10\n    max_output_tokens: 5\n";

    fn release(version: &str) -> ReleaseDescriptor {
        ReleaseDescriptor {
            version: Version::parse(version).unwrap(),
            tag: format!("data-v{}", version),
            published_at: None,
            notes: None,
            html_url: None,
            size: 0,
            assets: BTreeMap::new(),
        }
    }

    fn package(version: &str, models: &str) -> UpdatePackage {
        let mut checksums = BTreeMap::new();
        checksums.insert(MODELS_FILE.to_string(), integrity::sha256_hex(models.as_bytes()));
        UpdatePackage {
            release: release(version),
            models: models.to_string(),
            overrides: None,
            checksums,
        }
    }

    struct MockSource {
        version: String,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl UpdateSource for MockSource {
        async fn latest(&self) -> Result<ReleaseDescriptor> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(release(&self.version))
        }

        async fn fetch(&self, release: &ReleaseDescriptor) -> Result<UpdatePackage> {
            Ok(package(&release.version.to_string(), MODELS))
        }
    }

    struct StalledSource;

    #[async_trait]
    impl UpdateSource for StalledSource {
        async fn latest(&self) -> Result<ReleaseDescriptor> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(release("9.9.9"))
        }

        async fn fetch(&self, _release: &ReleaseDescriptor) -> Result<UpdatePackage> {
            Err(RegistryError::FetchFailed {
                reason: "unreachable".into(),
            })
        }
    }

    #[tokio::test]
    async fn semver_ordering_not_lexical() {
        let source = MockSource {
            version: "1.10.0".into(),
            calls: AtomicUsize::new(0),
        };
        let coord = UpdateCoordinator::new(UpdatePolicy::default());
        let current = Version::parse("1.9.0").unwrap();
        assert!(matches!(
            coord.check(&source, Some(&current)).await,
            UpdateState::UpdateAvailable { .. }
        ));
        let current = Version::parse("1.10.0").unwrap();
        assert!(matches!(
            coord.check(&source, Some(&current)).await,
            UpdateState::AlreadyCurrent { .. }
        ));
        assert!(matches!(
            coord.check(&source, None).await,
            UpdateState::UpdateAvailable { current: None, .. }
        ));
    }

    #[tokio::test]
    async fn pin_short_circuits_to_disabled() {
        let source = Arc::new(MockSource {
            version: "99.0.0".into(),
            calls: AtomicUsize::new(0),
        });
        let coord = UpdateCoordinator::new(UpdatePolicy {
            version_pin: Some("1.0.0".into()),
            ..Default::default()
        });
        let current = Version::parse("1.0.0").unwrap();
        assert!(matches!(
            coord.check(source.as_ref(), Some(&current)).await,
            UpdateState::Disabled { .. }
        ));
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn timeout_is_fetch_failed() {
        let coord = UpdateCoordinator::new(UpdatePolicy {
            timeout: Duration::from_millis(20),
            ..Default::default()
        });
        match coord.check(&StalledSource, None).await {
            UpdateState::FetchFailed { reason } => assert!(reason.contains("timed out"), "{}", reason),
            other => panic!("unexpected {}", other.name()),
        }
    }

    #[test]
    fn validate_rejects_digest_mismatch_and_bad_documents() {
        let mut pkg = package("1.1.0", MODELS);
        pkg.models.push_str("# tampered\n");
        assert!(matches!(
            validate(pkg),
            Err(RegistryError::IntegrityCheckFailed { .. })
        ));

        let bad = "version: \"2.0.0\"\nmodels: {}\n";
        assert!(matches!(
            validate(package("1.1.0", bad)),
            Err(RegistryError::SchemaIncompatible { .. })
        ));
    }

    #[test]
    fn install_replaces_files_and_records_version() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(OVERRIDES_FILE), "overrides: {}\n").unwrap();
        let update = validate(package("1.2.0", MODELS)).unwrap();
        install(&update, dir.path()).unwrap();

        assert_eq!(std::fs::read_to_string(dir.path().join(MODELS_FILE)).unwrap(), MODELS);
        assert!(!dir.path().join(OVERRIDES_FILE).exists());
        let info = crate::loader::read_version_info(dir.path()).unwrap();
        assert_eq!(info.version, "1.2.0");

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with('.'))
            .collect();
        assert!(leftovers.is_empty());

        let loaded = crate::loader::load(&[DataSource::UserDir(dir.path().to_path_buf())]).unwrap();
        assert_eq!(loaded.data_version, Some(Version::new(1, 2, 0)));
    }

    fn snapshot(dir: &Path) -> Vec<(&'static str, Option<Vec<u8>>)> {
        DATA_FILES
            .iter()
            .map(|name| (*name, std::fs::read(dir.join(name)).ok()))
            .collect()
    }

    fn hidden_entries(dir: &Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|n| n.starts_with('.'))
            .collect()
    }

    /// **Scenario**: a rename into place fails halfway; every previous file comes back unchanged.
    #[test]
    fn failed_install_restores_previous_files() {
        let dir = tempfile::tempdir().unwrap();
        install(&validate(package("1.2.0", MODELS)).unwrap(), dir.path()).unwrap();
        let before = snapshot(dir.path());
        assert!(before
            .iter()
            .filter(|(n, _)| *n != OVERRIDES_FILE)
            .all(|(_, bytes)| bytes.is_some()));

        let newer = MODELS.replace("context_window: 10", "context_window: 20");
        let update = validate(package("1.3.0", &newer)).unwrap();
        let err = install_with(&update, dir.path(), |from, to| {
            if to.ends_with(VERSION_INFO_FILE) {
                return Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full"));
            }
            std::fs::rename(from, to)
        })
        .unwrap_err();

        assert!(matches!(err, RegistryError::Io { .. }));
        assert_eq!(snapshot(dir.path()), before);
        assert!(hidden_entries(dir.path()).is_empty());
        let info = crate::loader::read_version_info(dir.path()).unwrap();
        assert_eq!(info.version, "1.2.0");
    }

    /// **Scenario**: when a previous file cannot be put back, its backup stays on disk.
    #[test]
    fn unrestorable_file_keeps_backup_directory() {
        let dir = tempfile::tempdir().unwrap();
        install(&validate(package("1.2.0", MODELS)).unwrap(), dir.path()).unwrap();
        let old_info = std::fs::read(dir.path().join(VERSION_INFO_FILE)).unwrap();

        let update = validate(package("1.3.0", MODELS)).unwrap();
        let err = install_with(&update, dir.path(), |from, to| {
            if to.ends_with(CHECKSUMS_FILE) {
                let blocker = dir.path().join(VERSION_INFO_FILE);
                std::fs::create_dir(&blocker)?;
                std::fs::write(blocker.join("occupied"), "x")?;
                return Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full"));
            }
            std::fs::rename(from, to)
        })
        .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("could not restore version_info.json"), "{}", message);
        assert!(message.contains(".backup-"), "{}", message);
        let backups: Vec<String> = hidden_entries(dir.path())
            .into_iter()
            .filter(|n| n.starts_with(".backup-"))
            .collect();
        assert_eq!(backups.len(), 1);
        let kept = std::fs::read(dir.path().join(&backups[0]).join(VERSION_INFO_FILE)).unwrap();
        assert_eq!(kept, old_info);
        assert_eq!(std::fs::read_to_string(dir.path().join(MODELS_FILE)).unwrap(), MODELS);
    }
}
