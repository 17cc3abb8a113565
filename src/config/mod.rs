//! Async enablement configuration.
//!
//! The enabling metadata that turns on marker-driven dispatch. Loaded from
//! YAML files or environment variables; every field is optional and falls
//! back to a documented default.

use serde::Deserialize;

use crate::error::ConfigurationError;
use crate::marker::Marker;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "offload.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "OFFLOAD_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "OFFLOAD";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "OFFLOAD_LOG";

/// Enabling metadata for async dispatch.
///
/// | Field | Default |
/// |---|---|
/// | `marker` | [`Marker::ASYNC`] |
/// | `proxy_target_class` | `false` (interface-style wrapping) |
/// | `order` | unspecified, sorts last |
/// | `executor` | lookup chain ending in a default Tokio executor |
/// | `error_handler` | [`LoggingErrorHandler`](crate::handler::LoggingErrorHandler) |
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AsyncConfig {
    /// Custom marker; methods carrying it qualify in addition to the default.
    pub marker: Option<Marker>,
    /// Require wrappers that expose the concrete component type.
    pub proxy_target_class: bool,
    /// Position among composed wrapping steps.
    pub order: Option<i32>,
    /// Name of the executor registered in the context.
    pub executor: Option<String>,
    /// Name of the error handler registered in the context.
    pub error_handler: Option<String>,
}

impl AsyncConfig {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `offload.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `CONFIG_ENV_VAR` environment variable (if set)
    /// 4. Environment variables with `CONFIG_ENV_PREFIX` prefix
    pub fn load(path: Option<&str>) -> Result<Self, ConfigurationError> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ConfigurationError::Load(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| ConfigurationError::Load(e.to_string()))
    }

    /// Parse configuration from an inline YAML document.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigurationError> {
        serde_yaml::from_str(yaml).map_err(|e| ConfigurationError::Load(e.to_string()))
    }
}
