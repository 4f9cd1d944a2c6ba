//! # model-registry
//!
//! Client-side registry of LLM model metadata: context windows, parameter constraints,
//! pricing and deprecation lifecycle. Used to validate request parameters before they are
//! sent to a provider.
//!
//! ## Main modules
//!
//! - [`constraint`]: numeric, enum and object value checks ([`ParameterConstraint`]).
//! - [`version`]: dated identifiers (`gpt-4o-2024-08-06`) and the `min_version` gate.
//! - [`loader`]: ordered candidate sources ([`DataSource`]) and the first-viable-wins load.
//! - [`overrides`]: provider-specific diffs merged onto base definitions.
//! - [`resolver`]: alias resolution, override merge and the bounded [`CapabilityCache`].
//! - [`deprecation`]: sunset blocking and announcement headers.
//! - [`update`]: [`UpdateSource`], [`UpdateCoordinator`] and all-or-nothing install;
//!   [`github`] provides a GitHub-releases source.
//!
//! # Example
//!
//! ```ignore
//! use model_registry::{ModelRegistry, RegistryConfig};
//! use serde_json::json;
//!
//! let registry = ModelRegistry::new(RegistryConfig::from_env()?)?;
//! let params = json!({"temperature": 0.7, "max_tokens": 1024});
//! registry.validate_parameters("gpt-4o", params.as_object().unwrap())?;
//! registry.assert_model_active("gpt-4o")?;
//! ```

pub mod capability;
pub mod config;
pub mod constraint;
pub mod dataset;
pub mod deprecation;
pub mod error;
pub mod github;
mod global;
pub mod integrity;
pub mod loader;
pub mod overrides;
mod refresher;
mod registry;
pub mod resolver;
pub mod schema;
pub mod update;
pub mod version;

pub use capability::EffectiveCapability;
pub use config::RegistryConfig;
pub use constraint::{EnumConstraint, NumericConstraint, NumericValue, ObjectConstraint, ParameterConstraint};
pub use dataset::{
    CapabilityFlags, DataQualityWarning, Dataset, DeprecationInfo, DeprecationStatus, Modality,
    ModelDefinition, PricingInfo,
};
pub use deprecation::GateOutcome;
pub use error::{ConstraintViolation, RegistryError, Result};
pub use github::{GithubReleaseSource, HttpClient, ReqwestHttpClient};
pub use global::{default_registry, reset_default_registry};
pub use loader::{
    clear_data_files, data_files_info, DataFileInfo, DataSource, LoadedData, BUNDLED_DATA_VERSION,
    DATA_FILES,
};
pub use overrides::ProviderOverrideSet;
pub use refresher::UpdateRefresher;
pub use registry::ModelRegistry;
pub use resolver::{CapabilityCache, Generation};
pub use update::{
    RefreshOptions, RefreshOutcome, ReleaseDescriptor, UpdateCoordinator, UpdatePackage,
    UpdatePolicy, UpdateSource, UpdateState, ValidatedUpdate,
};
pub use version::CalendarDate;
