//! Configuration for the archive loader
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (archive.toml)
//! - Environment variables (ARCHIVE__*)
//!
//! ## Example config file (archive.toml):
//! ```toml
//! [loader]
//! version_scan_window = 500
//!
//! [[loader.extra_versions]]
//! marker = "oal22.xsd"
//! version = "2.2.0"
//!
//! [extensions]
//! directory = "~/.local/share/observation-archive/extensions"
//! scan_embedded = true
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::version::{KnownVersions, SchemaVersion, DEFAULT_SCAN_WINDOW};

/// File name of the persisted schema-extension descriptor
pub const SCHEMA_EXTENSION_FILE: &str = "schema-extensions.json";

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Document loading
    #[serde(default)]
    pub loader: LoaderConfig,

    /// Extension discovery and installation
    #[serde(default)]
    pub extensions: ExtensionConfig,
}

/// Loader configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Leading characters searched for a version marker
    #[serde(default = "default_scan_window")]
    pub version_scan_window: usize,

    /// Versions accepted in addition to the built-in list
    #[serde(default)]
    pub extra_versions: Vec<SchemaVersion>,
}

/// Extension configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtensionConfig {
    /// Operator-configured bundle directory
    #[serde(default)]
    pub directory: Option<PathBuf>,

    /// Where the schema-extension descriptor is persisted
    #[serde(default)]
    pub schema_extension_file: Option<PathBuf>,

    /// Also scan extensions compiled into the host
    #[serde(default = "default_true")]
    pub scan_embedded: bool,
}

fn default_scan_window() -> usize {
    DEFAULT_SCAN_WINDOW
}

fn default_true() -> bool {
    true
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            version_scan_window: default_scan_window(),
            extra_versions: Vec::new(),
        }
    }
}

impl Default for ExtensionConfig {
    fn default() -> Self {
        Self {
            directory: None,
            schema_extension_file: None,
            scan_embedded: true,
        }
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("org", "observation", "archive")
}

impl ArchiveConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration from a specific file
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = ["archive.toml", ".archive.toml", "config/archive.toml"];
        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        if let Some(dirs) = project_dirs() {
            let xdg_config = dirs.config_dir().join("archive.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("ARCHIVE")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Built-in versions followed by the configured extras
    pub fn known_versions(&self) -> KnownVersions {
        let mut known = KnownVersions::standard();
        for extra in &self.loader.extra_versions {
            known.push(extra.clone());
        }
        known
    }

    /// The bundle directory, falling back to the platform data directory
    pub fn extension_dir(&self) -> Option<PathBuf> {
        self.extensions
            .directory
            .clone()
            .or_else(|| project_dirs().map(|d| d.data_dir().join("extensions")))
    }

    /// Location of the persisted schema-extension descriptor
    pub fn schema_extension_path(&self) -> Option<PathBuf> {
        self.extensions
            .schema_extension_file
            .clone()
            .or_else(|| self.extension_dir().map(|d| d.join(SCHEMA_EXTENSION_FILE)))
    }
}
