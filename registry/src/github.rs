//! GitHub releases as an [`UpdateSource`]: tags `data-vX.Y.Z` carry `models.yaml`,
//! `checksums.txt` and optionally `overrides.yaml` as release assets.

use std::sync::Arc;

use async_trait::async_trait;
use semver::Version;
use serde::Deserialize;

use crate::error::{RegistryError, Result};
use crate::integrity;
use crate::loader::{CHECKSUMS_FILE, MODELS_FILE, OVERRIDES_FILE};
use crate::update::{ReleaseDescriptor, UpdatePackage, UpdateSource};

pub const DEFAULT_GITHUB_API: &str = "https://api.github.com";
pub const DEFAULT_RELEASE_REPO: &str = "model-registry/model-registry-data";

/// Tag prefix marking a data release.
pub const DATA_TAG_PREFIX: &str = "data-v";
const MAX_TAG_LEN: usize = 50;

/// Fetches a URL body. Abstraction for testing.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// GET the URL and return the response body as string.
    async fn get(&self, url: &str) -> std::result::Result<String, String>;
}

/// Reqwest-based HTTP client.
pub struct ReqwestHttpClient;

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn get(&self, url: &str) -> std::result::Result<String, String> {
        let client = reqwest::Client::new();
        let body = client
            .get(url)
            .header(reqwest::header::USER_AGENT, concat!("model-registry/", env!("CARGO_PKG_VERSION")))
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .send()
            .await
            .map_err(|e| e.to_string())?
            .error_for_status()
            .map_err(|e| e.to_string())?
            .text()
            .await
            .map_err(|e| e.to_string())?;
        Ok(body)
    }
}

#[derive(Debug, Deserialize)]
struct GithubRelease {
    tag_name: String,
    #[serde(default)]
    draft: bool,
    #[serde(default)]
    published_at: Option<String>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    html_url: Option<String>,
    #[serde(default)]
    assets: Vec<GithubAsset>,
}

#[derive(Debug, Deserialize)]
struct GithubAsset {
    name: String,
    #[serde(default)]
    size: u64,
    browser_download_url: String,
}

/// Returns the version of a `data-vX.Y.Z` tag. Pre-release, build metadata and overlong tags
/// are not data releases.
pub fn parse_data_tag(tag: &str) -> Option<Version> {
    if tag.len() > MAX_TAG_LEN {
        return None;
    }
    let raw = tag.strip_prefix(DATA_TAG_PREFIX)?;
    if raw.split('.').count() != 3 {
        return None;
    }
    let version = Version::parse(raw).ok()?;
    if !version.pre.is_empty() || !version.build.is_empty() {
        return None;
    }
    Some(version)
}

/// Release lookup against the GitHub REST API.
pub struct GithubReleaseSource {
    api_base: String,
    repo: String,
    http_client: Arc<dyn HttpClient>,
}

impl GithubReleaseSource {
    /// Create for `repo` (`owner/name`) with the public API and reqwest client.
    pub fn new(repo: impl Into<String>) -> Self {
        Self {
            api_base: DEFAULT_GITHUB_API.to_string(),
            repo: repo.into(),
            http_client: Arc::new(ReqwestHttpClient),
        }
    }

    /// Create with custom API base and HTTP client.
    pub fn with_client(api_base: String, repo: impl Into<String>, http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            api_base,
            repo: repo.into(),
            http_client,
        }
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    fn releases_url(&self) -> String {
        format!("{}/repos/{}/releases", self.api_base.trim_end_matches('/'), self.repo)
    }

    async fn get(&self, url: &str) -> Result<String> {
        self.http_client
            .get(url)
            .await
            .map_err(|reason| RegistryError::FetchFailed {
                reason: format!("GET {}: {}", url, reason),
            })
    }
}

fn newest_data_release(body: &str) -> Result<ReleaseDescriptor> {
    let releases: Vec<GithubRelease> =
        serde_json::from_str(body).map_err(|e| RegistryError::FetchFailed {
            reason: format!("malformed releases listing: {}", e),
        })?;

    releases
        .into_iter()
        .filter(|r| !r.draft)
        .filter_map(|r| parse_data_tag(&r.tag_name).map(|v| (v, r)))
        .max_by(|(a, _), (b, _)| a.cmp(b))
        .map(|(version, r)| {
            let size = r
                .assets
                .iter()
                .filter(|a| [MODELS_FILE, OVERRIDES_FILE].contains(&a.name.as_str()))
                .map(|a| a.size)
                .sum();
            ReleaseDescriptor {
                version,
                tag: r.tag_name,
                published_at: r.published_at,
                notes: r.body,
                html_url: r.html_url,
                size,
                assets: r
                    .assets
                    .into_iter()
                    .map(|a| (a.name, a.browser_download_url))
                    .collect(),
            }
        })
        .ok_or_else(|| RegistryError::FetchFailed {
            reason: format!("no '{}' release found", DATA_TAG_PREFIX),
        })
}

fn asset_url<'a>(release: &'a ReleaseDescriptor, name: &str) -> Result<&'a str> {
    release
        .assets
        .get(name)
        .map(String::as_str)
        .ok_or_else(|| RegistryError::FetchFailed {
            reason: format!("release {} has no {} asset", release.tag, name),
        })
}

#[async_trait]
impl UpdateSource for GithubReleaseSource {
    async fn latest(&self) -> Result<ReleaseDescriptor> {
        let body = self.get(&self.releases_url()).await?;
        let release = newest_data_release(&body)?;
        tracing::debug!(repo = %self.repo, tag = %release.tag, "latest data release");
        Ok(release)
    }

    async fn fetch(&self, release: &ReleaseDescriptor) -> Result<UpdatePackage> {
        let models = self.get(asset_url(release, MODELS_FILE)?).await?;
        let checksums = self.get(asset_url(release, CHECKSUMS_FILE)?).await?;
        let overrides = match release.assets.get(OVERRIDES_FILE) {
            Some(url) => Some(self.get(url).await?),
            None => None,
        };
        Ok(UpdatePackage {
            release: release.clone(),
            models,
            overrides,
            checksums: integrity::parse_checksums(&checksums)?,
        })
    }
}
