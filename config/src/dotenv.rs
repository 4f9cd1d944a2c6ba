//! Read a project `.env` into a key-value map. Nothing is applied to the environment here.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::LoadError;

/// `.env` in `override_dir` if given, else in the current directory.
pub fn dotenv_path(override_dir: Option<&Path>) -> Option<PathBuf> {
    let dir = override_dir
        .map(Path::to_path_buf)
        .or_else(|| std::env::current_dir().ok())?;
    let path = dir.join(".env");
    path.is_file().then_some(path)
}

/// Missing file returns an empty map.
pub fn load_env_map(override_dir: Option<&Path>) -> Result<HashMap<String, String>, LoadError> {
    let Some(path) = dotenv_path(override_dir) else {
        return Ok(HashMap::new());
    };
    let err = |e: dotenv::Error| LoadError::Dotenv {
        path: path.clone(),
        message: e.to_string(),
    };
    dotenv::from_path_iter(&path)
        .map_err(err)?
        .map(|item| item.map_err(err))
        .collect()
}
