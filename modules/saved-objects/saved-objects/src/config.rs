//! Configuration for the saved objects repository.
//!
//! Two loading paths are supported:
//!
//! 1. **Figment**: the `saved_objects` section of a layered figment
//!    (defaults, then a YAML file, then `SAVED_OBJECTS__*` environment
//!    variables). A figment without the section yields defaults.
//! 2. **Module section**: a raw JSON value handed over by a host. A missing
//!    or non-object value yields defaults.

use std::path::Path;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use saved_objects_sdk::Refresh;
use serde::{Deserialize, Serialize};

/// Section name the repository reads its settings from.
pub const CONFIG_SECTION: &str = "saved_objects";

/// Prefix of environment variables overriding the section.
pub const ENV_PREFIX: &str = "SAVED_OBJECTS__";

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("invalid '{CONFIG_SECTION}' configuration: {0}")]
    Figment(#[from] Box<figment::Error>),

    #[error("invalid '{CONFIG_SECTION}' configuration: {0}")]
    Json(#[from] serde_json::Error),
}

/// Saved objects repository configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SavedObjectsConfig {
    /// Index alias every request targets.
    #[serde(default = "default_index")]
    pub index: String,

    /// Extra attempts `update` makes after a version conflict.
    #[serde(default = "default_retry_on_conflict")]
    pub retry_on_conflict: u32,

    /// Refresh policy used when a write does not specify one.
    #[serde(default)]
    pub refresh: Refresh,

    /// Hidden types this repository may still read and write.
    #[serde(default)]
    pub included_hidden_types: Vec<String>,
}

fn default_index() -> String {
    ".kibana".to_owned()
}

fn default_retry_on_conflict() -> u32 {
    3
}

impl Default for SavedObjectsConfig {
    fn default() -> Self {
        Self {
            index: default_index(),
            retry_on_conflict: default_retry_on_conflict(),
            refresh: Refresh::default(),
            included_hidden_types: Vec::new(),
        }
    }
}

impl SavedObjectsConfig {
    /// Reads the `saved_objects` section, falling back to defaults when the
    /// figment does not contain it.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Figment` if the section exists but is invalid.
    pub fn from_figment(figment: &Figment) -> Result<Self, ConfigError> {
        if !figment.contains(CONFIG_SECTION) {
            return Ok(Self::default());
        }
        figment
            .extract_inner(CONFIG_SECTION)
            .map_err(|e| ConfigError::Figment(Box::new(e)))
    }

    /// Layers defaults, an optional YAML file and environment overrides.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Figment` if a layer cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment =
            Figment::new().merge(Serialized::default(CONFIG_SECTION, Self::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        figment = figment.merge(
            Env::prefixed(ENV_PREFIX).map(|key| format!("{CONFIG_SECTION}.{key}").into()),
        );
        Self::from_figment(&figment)
    }

    /// Lenient loader for a raw JSON section.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Json` if the section is an object that does not
    /// deserialize.
    pub fn from_module_section(section: Option<&serde_json::Value>) -> Result<Self, ConfigError> {
        match section {
            Some(value) if value.is_object() => Ok(serde_json::from_value(value.clone())?),
            _ => Ok(Self::default()),
        }
    }
}
