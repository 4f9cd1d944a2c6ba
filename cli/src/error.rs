use std::path::PathBuf;

use model_registry::RegistryError;
use thiserror::Error;

/// Process exit codes.
pub mod exit {
    pub const SUCCESS: u8 = 0;
    pub const GENERIC_ERROR: u8 = 1;
    pub const INVALID_USAGE: u8 = 2;
    pub const MODEL_NOT_FOUND: u8 = 3;
    pub const DATA_SOURCE_ERROR: u8 = 4;
    /// `update check` found a newer release.
    pub const UPDATE_AVAILABLE: u8 = 10;
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// The registry could not be built from its data sources.
    #[error("loading model data: {0}")]
    Load(RegistryError),
    #[error("config: {0}")]
    Config(#[from] config::LoadError),
    #[error("{0}")]
    Usage(String),
    #[error("render {format}: {message}")]
    Render { format: &'static str, message: String },
    #[error("write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::Registry(e) => registry_exit_code(e),
            CliError::Load(RegistryError::InvalidConfig(_)) => exit::GENERIC_ERROR,
            CliError::Load(_) => exit::DATA_SOURCE_ERROR,
            CliError::Usage(_) => exit::INVALID_USAGE,
            CliError::Config(_) | CliError::Render { .. } | CliError::Write { .. } | CliError::Io(_) => {
                exit::GENERIC_ERROR
            }
        }
    }
}

fn registry_exit_code(e: &RegistryError) -> u8 {
    match e {
        RegistryError::ModelNotSupported { .. }
        | RegistryError::VersionTooOld { .. }
        | RegistryError::InvalidDate { .. } => exit::MODEL_NOT_FOUND,
        RegistryError::UnknownProvider { .. } => exit::INVALID_USAGE,
        RegistryError::FetchFailed { .. } => exit::DATA_SOURCE_ERROR,
        e if e.is_data_source_error() => exit::DATA_SOURCE_ERROR,
        _ => exit::GENERIC_ERROR,
    }
}
