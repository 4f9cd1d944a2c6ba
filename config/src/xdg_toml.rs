//! Load `$XDG_CONFIG_HOME/<app>/config.toml`: a raw `[env]` table and a typed `[registry]` table.
//!
//! ```toml
//! [env]
//! RUST_LOG = "model_registry=debug"
//!
//! [registry]
//! provider = "azure"
//! cache_size = 500
//! disable_updates = true
//! ```

use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::LoadError;

/// `$XDG_CONFIG_HOME`, else `~/.config`.
fn xdg_config_home() -> Result<PathBuf, LoadError> {
    if let Some(dir) = std::env::var_os("XDG_CONFIG_HOME").map(PathBuf::from) {
        if dir.is_absolute() {
            return Ok(dir);
        }
    }
    dirs::home_dir()
        .map(|h| h.join(".config"))
        .ok_or_else(|| LoadError::XdgPath("cannot determine home directory".to_string()))
}

/// Where `config.toml` for `app_name` lives, whether or not it exists.
pub fn config_path(app_name: &str) -> Result<PathBuf, LoadError> {
    Ok(xdg_config_home()?.join(app_name).join("config.toml"))
}

/// Typed registry settings; each maps onto one `OMR_*` variable.
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RegistrySection {
    pub provider: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub registry_path: Option<PathBuf>,
    pub disable_updates: Option<bool>,
    pub version_pin: Option<String>,
    pub update_timeout_secs: Option<u64>,
    pub cache_size: Option<u64>,
    pub release_repo: Option<String>,
}

impl RegistrySection {
    pub fn to_env_map(&self) -> HashMap<String, String> {
        let mut out = HashMap::new();
        let mut put = |key: &str, value: Option<String>| {
            if let Some(v) = value {
                out.insert(key.to_string(), v);
            }
        };
        put("OMR_PROVIDER", self.provider.clone());
        put("OMR_DATA_DIR", self.data_dir.as_ref().map(|p| p.display().to_string()));
        put(
            "OMR_MODEL_REGISTRY_PATH",
            self.registry_path.as_ref().map(|p| p.display().to_string()),
        );
        put("OMR_DISABLE_DATA_UPDATES", self.disable_updates.map(|b| b.to_string()));
        put("OMR_DATA_VERSION_PIN", self.version_pin.clone());
        put("OMR_UPDATE_TIMEOUT_SECS", self.update_timeout_secs.map(|n| n.to_string()));
        put("OMR_CACHE_SIZE", self.cache_size.map(|n| n.to_string()));
        put("OMR_RELEASE_REPO", self.release_repo.clone());
        out
    }
}

#[derive(Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    env: HashMap<String, String>,
    #[serde(default)]
    registry: RegistrySection,
}

/// Env key-value pairs from `[env]` plus the translated `[registry]` table; `[registry]`
/// wins when both name the same variable. Missing file returns an empty map.
pub fn load_env_map(app_name: &str) -> Result<HashMap<String, String>, LoadError> {
    let path = config_path(app_name)?;
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let content = std::fs::read_to_string(&path).map_err(LoadError::XdgRead)?;
    let config: ConfigFile = toml::from_str(&content)?;
    let mut map = config.env;
    map.extend(config.registry.to_env_map());
    Ok(map)
}
