//! Extension bundle manifests
//!
//! A bundle carries two properties files under `META-INF/`:
//!
//! ```text
//! # extension.properties
//! name=comets
//! version=1.2.0
//! entry-point=comets::CometExtension
//!
//! # types.properties
//! type.0.target.tag=custom:cometTarget
//! type.0.target.entry=comets::CometTarget
//! type.0.finding.tag=custom:cometFinding
//! type.0.finding.entry=comets::CometFinding
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use semver::Version;
use serde::{Deserialize, Serialize};

use crate::error::{ArchiveError, Result};

pub const EXTENSION_MANIFEST: &str = "META-INF/extension.properties";
pub const TYPES_MANIFEST: &str = "META-INF/types.properties";

/// Parse `key=value` / `key: value` lines; `#` and `!` start comments
pub fn parse_properties(text: &str) -> BTreeMap<String, String> {
    let mut properties = BTreeMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }
        let split = line.find(&['=', ':'][..]);
        let (key, value) = match split {
            Some(at) => (&line[..at], &line[at + 1..]),
            None => (line, ""),
        };
        properties.insert(key.trim().to_string(), value.trim().to_string());
    }
    properties
}

/// One supported type: a target tag, the finding tag it implies, and the
/// entry names that build each
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDeclaration {
    pub target_tag: String,
    pub target_entry: String,
    pub finding_tag: String,
    pub finding_entry: String,
}

/// Where a bundle was found
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BundleSource {
    /// Compiled into the host
    Embedded,
    Directory(PathBuf),
    Archive(PathBuf),
}

impl BundleSource {
    pub fn path(&self) -> Option<&Path> {
        match self {
            BundleSource::Embedded => None,
            BundleSource::Directory(path) | BundleSource::Archive(path) => Some(path),
        }
    }
}

impl fmt::Display for BundleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BundleSource::Embedded => f.write_str("<embedded>"),
            BundleSource::Directory(path) | BundleSource::Archive(path) => {
                write!(f, "{}", path.display())
            }
        }
    }
}

/// What a bundle declares about itself
#[derive(Debug, Clone)]
pub struct ExtensionDescriptor {
    pub name: String,
    pub version: Version,
    pub entry_point: String,
    pub types: Vec<TypeDeclaration>,
    pub source: BundleSource,
}

impl ExtensionDescriptor {
    /// Build a descriptor from the two manifest texts. `types` may be
    /// absent for an extension that only contributes imagers.
    pub fn from_manifests(source: BundleSource, extension: &str, types: Option<&str>) -> Result<Self> {
        let manifest_path = || match source.path() {
            Some(path) => path.join(EXTENSION_MANIFEST),
            None => PathBuf::from(EXTENSION_MANIFEST),
        };
        let properties = parse_properties(extension);
        let required = |key: &str| {
            properties
                .get(key)
                .filter(|v| !v.is_empty())
                .cloned()
                .ok_or_else(|| ArchiveError::Manifest {
                    path: manifest_path(),
                    message: format!("missing '{}'", key),
                })
        };

        let name = required("name")?;
        let entry_point = required("entry-point")?;
        let version_str = required("version")?;
        let version = Version::parse(&version_str).map_err(|e| ArchiveError::Manifest {
            path: manifest_path(),
            message: format!("invalid version '{}': {}", version_str, e),
        })?;

        let types = match types {
            Some(text) => {
                let types_path = match source.path() {
                    Some(path) => path.join(TYPES_MANIFEST),
                    None => PathBuf::from(TYPES_MANIFEST),
                };
                parse_type_groups(&parse_properties(text), &types_path)?
            }
            None => Vec::new(),
        };

        Ok(Self {
            name,
            version,
            entry_point,
            types,
            source,
        })
    }

    /// Every tag this bundle declares, target tags first
    pub fn declared_tags(&self) -> impl Iterator<Item = &str> {
        self.types
            .iter()
            .map(|t| t.target_tag.as_str())
            .chain(self.types.iter().map(|t| t.finding_tag.as_str()))
    }
}

const GROUP_FIELDS: [&str; 4] = ["target.tag", "target.entry", "finding.tag", "finding.entry"];

fn parse_type_groups(properties: &BTreeMap<String, String>, path: &Path) -> Result<Vec<TypeDeclaration>> {
    let mut groups: BTreeMap<(u32, String), BTreeMap<&str, &str>> = BTreeMap::new();

    for (key, value) in properties {
        let Some(rest) = key.strip_prefix("type.") else {
            continue;
        };
        let Some((group, field)) = rest.split_once('.') else {
            continue;
        };
        let Some(field) = GROUP_FIELDS.iter().find(|f| **f == field) else {
            tracing::debug!(%key, "ignoring unknown type manifest key");
            continue;
        };
        let order = group.parse::<u32>().unwrap_or(u32::MAX);
        groups
            .entry((order, group.to_string()))
            .or_default()
            .insert(*field, value.as_str());
    }

    groups
        .into_iter()
        .map(|((_, group), fields)| {
            let get = |field: &str| {
                fields
                    .get(field)
                    .filter(|v| !v.is_empty())
                    .map(|v| v.to_string())
                    .ok_or_else(|| ArchiveError::Manifest {
                        path: path.to_path_buf(),
                        message: format!("type group '{}' is missing '{}'", group, field),
                    })
            };
            Ok(TypeDeclaration {
                target_tag: get("target.tag")?,
                target_entry: get("target.entry")?,
                finding_tag: get("finding.tag")?,
                finding_entry: get("finding.entry")?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const EXTENSION: &str = "# comet support\nname = comets\nversion: 1.2.0\nentry-point=comets::CometExtension\n";
    const TYPES: &str = "\
! two types
type.1.target.tag=custom:asteroidTarget
type.1.target.entry=comets::Asteroid
type.1.finding.tag=oal:findingsType
type.1.finding.entry=comets::AsteroidFinding
type.0.target.tag=custom:cometTarget
type.0.target.entry=comets::CometTarget
type.0.finding.tag=custom:cometFinding
type.0.finding.entry=comets::CometFinding
";

    #[test]
    fn test_parse_properties() {
        let props = parse_properties(EXTENSION);
        assert_eq!(props.get("name").map(String::as_str), Some("comets"));
        assert_eq!(props.get("version").map(String::as_str), Some("1.2.0"));
        assert_eq!(props.len(), 3);
    }

    #[test]
    fn test_descriptor_groups_are_ordered() {
        let descriptor = ExtensionDescriptor::from_manifests(BundleSource::Embedded, EXTENSION, Some(TYPES)).unwrap();
        assert_eq!(descriptor.name, "comets");
        assert_eq!(descriptor.entry_point, "comets::CometExtension");
        assert_eq!(
            descriptor.types[0],
            TypeDeclaration {
                target_tag: "custom:cometTarget".into(),
                target_entry: "comets::CometTarget".into(),
                finding_tag: "custom:cometFinding".into(),
                finding_entry: "comets::CometFinding".into(),
            }
        );
        assert_eq!(descriptor.types[1].target_tag, "custom:asteroidTarget");
    }

    #[test]
    fn test_incomplete_group() {
        let types = "type.0.target.tag=custom:cometTarget\ntype.0.target.entry=comets::CometTarget\n";
        let err = ExtensionDescriptor::from_manifests(BundleSource::Embedded, EXTENSION, Some(types)).unwrap_err();
        assert!(matches!(err, ArchiveError::Manifest { .. }));
    }

    #[test]
    fn test_missing_entry_point() {
        let err = ExtensionDescriptor::from_manifests(BundleSource::Embedded, "name=x\nversion=1.0.0\n", None)
            .unwrap_err();
        assert!(err.to_string().contains("entry-point"));
    }
}
