//! Document schema versions
//!
//! A document announces its version by naming its schema file (for
//! example in `xsi:schemaLocation`). The loader looks for the known
//! marker names, in order, within the head of the document.

use semver::Version;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ArchiveError, Result};
use crate::model::EntityKind;

/// How many leading characters of a document are searched for a marker
pub const DEFAULT_SCAN_WINDOW: usize = 500;

/// A known schema version
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaVersion {
    /// Schema file name that identifies the version (e.g. "oal21.xsd")
    pub marker: String,
    /// Semantic version of the schema
    pub version: Version,
}

impl SchemaVersion {
    pub fn new(marker: impl Into<String>, version: Version) -> Self {
        Self {
            marker: marker.into(),
            version,
        }
    }

    /// Create from a marker and a version string
    pub fn parse(marker: impl Into<String>, version_str: &str) -> Result<Self> {
        let version_str = version_str.strip_prefix('v').unwrap_or(version_str);
        Ok(Self::new(marker, Version::parse(version_str)?))
    }

    /// Get the version string (e.g., "2.1.0")
    pub fn version_string(&self) -> String {
        self.version.to_string()
    }

    /// Whether a section kind exists in documents of this version
    pub fn has_section(&self, kind: EntityKind) -> bool {
        introduced_in(kind) <= self.version
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{} ({})", self.version, self.marker)
    }
}

impl PartialEq for SchemaVersion {
    fn eq(&self, other: &Self) -> bool {
        self.version == other.version
    }
}

impl Eq for SchemaVersion {}

impl PartialOrd for SchemaVersion {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SchemaVersion {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.version.cmp(&other.version)
    }
}

/// Schema version that first defined a section kind
pub fn introduced_in(kind: EntityKind) -> Version {
    match kind {
        EntityKind::Filter | EntityKind::Lens => Version::new(1, 5, 0),
        EntityKind::Imager => Version::new(1, 7, 0),
        _ => Version::new(1, 4, 0),
    }
}

/// Ordered list of versions the loader accepts
#[derive(Debug, Clone)]
pub struct KnownVersions {
    versions: Vec<SchemaVersion>,
}

impl Default for KnownVersions {
    fn default() -> Self {
        Self::standard()
    }
}

impl KnownVersions {
    pub fn new(versions: Vec<SchemaVersion>) -> Self {
        Self { versions }
    }

    /// The versions shipped with the loader, oldest first
    pub fn standard() -> Self {
        Self::new(vec![
            SchemaVersion::new("comast14.xsd", Version::new(1, 4, 0)),
            SchemaVersion::new("oal20.xsd", Version::new(2, 0, 0)),
            SchemaVersion::new("oal21.xsd", Version::new(2, 1, 0)),
        ])
    }

    /// Append a version; it is tried after all existing ones
    pub fn push(&mut self, version: SchemaVersion) {
        self.versions.push(version);
    }

    pub fn iter(&self) -> impl Iterator<Item = &SchemaVersion> {
        self.versions.iter()
    }

    /// Oldest known version
    pub fn baseline(&self) -> Option<&SchemaVersion> {
        self.versions.iter().min()
    }

    /// Whether a missing container of this kind is acceptable: the kind
    /// postdates the oldest version this loader reads
    pub fn is_optional(&self, kind: EntityKind) -> bool {
        self.baseline()
            .map(|baseline| !baseline.has_section(kind))
            .unwrap_or(false)
    }

    /// Pick the first known version whose marker appears in the document head
    pub fn select(&self, text: &str, window: usize) -> Result<&SchemaVersion> {
        let end = text
            .char_indices()
            .nth(window)
            .map(|(i, _)| i)
            .unwrap_or(text.len());
        let head = &text[..end];

        self.versions
            .iter()
            .find(|v| head.contains(v.marker.as_str()))
            .ok_or(ArchiveError::UnknownVersion { scanned: window })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OAL21_HEAD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<oal:observations version="2.1" xmlns:oal="http://observation.sourceforge.net/openastronomylog"
    xsi:schemaLocation="http://observation.sourceforge.net/openastronomylog oal21.xsd">"#;

    #[test]
    fn test_select_version() {
        let known = KnownVersions::standard();
        let version = known.select(OAL21_HEAD, DEFAULT_SCAN_WINDOW).unwrap();
        assert_eq!(version.version_string(), "2.1.0");
        assert_eq!(version.marker, "oal21.xsd");
    }

    #[test]
    fn test_marker_outside_window() {
        let known = KnownVersions::standard();
        let padded = format!("<!--{}-->{}", " ".repeat(600), OAL21_HEAD);
        assert!(matches!(
            known.select(&padded, DEFAULT_SCAN_WINDOW),
            Err(ArchiveError::UnknownVersion { .. })
        ));
        assert!(known.select(&padded, 2000).is_ok());
    }

    #[test]
    fn test_first_listed_marker_wins() {
        let known = KnownVersions::standard();
        let text = "<observations> oal21.xsd comast14.xsd";
        assert_eq!(known.select(text, DEFAULT_SCAN_WINDOW).unwrap().marker, "comast14.xsd");
    }

    #[test]
    fn test_optional_sections() {
        let known = KnownVersions::standard();
        assert!(known.is_optional(EntityKind::Imager));
        assert!(known.is_optional(EntityKind::Lens));
        assert!(known.is_optional(EntityKind::Filter));
        assert!(!known.is_optional(EntityKind::Target));
        assert!(!known.is_optional(EntityKind::Eyepiece));
    }

    #[test]
    fn test_parse_with_v_prefix() {
        let v = SchemaVersion::parse("oal22.xsd", "v2.2.0").unwrap();
        assert_eq!(v.version_string(), "2.2.0");
        assert!(v.has_section(EntityKind::Imager));
    }
}
