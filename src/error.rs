//! Error types for the archive loader

use std::path::PathBuf;

use thiserror::Error;

use crate::model::EntityKind;
use crate::registry::Role;

/// Result type for archive operations
pub type Result<T> = std::result::Result<T, ArchiveError>;

/// Archive loader errors
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Unknown document version: no known schema marker in the first {scanned} characters")]
    UnknownVersion { scanned: usize },

    #[error("Structural error in <{section}>: {message}")]
    Structural { section: String, message: String },

    #[error("Unknown {role} type: {tag}")]
    UnknownType { role: Role, tag: String },

    #[error("Dangling reference from {referrer}: no {kind} with id '{id}'")]
    DanglingReference {
        kind: EntityKind,
        id: String,
        referrer: String,
    },

    #[error("Cannot instantiate {role} type {tag}: {message}")]
    Instantiation {
        role: Role,
        tag: String,
        message: String,
    },

    #[error("Extension activation failed for {bundle}: {message}")]
    ExtensionActivation { bundle: String, message: String },

    #[error("Missing <{field}> in <{element}>")]
    MissingField { element: String, field: String },

    #[error("Invalid value '{value}' for <{field}> in <{element}>: {message}")]
    InvalidValue {
        element: String,
        field: String,
        value: String,
        message: String,
    },

    #[error("Invalid manifest {path}: {message}")]
    Manifest { path: PathBuf, message: String },

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config_crate::ConfigError),

    #[error("Semver error: {0}")]
    Semver(#[from] semver::Error),
}

impl ArchiveError {
    pub(crate) fn structural(section: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Structural {
            section: section.into(),
            message: message.into(),
        }
    }

    pub(crate) fn activation(bundle: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExtensionActivation {
            bundle: bundle.into(),
            message: message.into(),
        }
    }

    /// Whether this error may be contained to a single Observation node.
    ///
    /// Everything raised while building entity content qualifies; IO,
    /// parse and configuration failures never do.
    pub fn is_node_local(&self) -> bool {
        matches!(
            self,
            Self::Structural { .. }
                | Self::UnknownType { .. }
                | Self::DanglingReference { .. }
                | Self::Instantiation { .. }
                | Self::MissingField { .. }
                | Self::InvalidValue { .. }
        )
    }
}
