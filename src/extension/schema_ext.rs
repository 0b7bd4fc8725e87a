//! Persisted schema extensions
//!
//! Installing a bundle appends its type declarations to
//! `schema-extensions.json` so later sessions recognize the tags even
//! before the bundle itself has been scanned.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use semver::Version;
use serde::{Deserialize, Serialize};

use super::manifest::{ExtensionDescriptor, TypeDeclaration};
use crate::checksum::Checksum;
use crate::error::Result;
use crate::registry::Role;

/// One installed bundle as recorded on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaExtension {
    pub name: String,
    pub version: Version,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<Checksum>,
    pub installed_at: DateTime<Utc>,
    #[serde(default)]
    pub types: Vec<TypeDeclaration>,
}

impl SchemaExtension {
    pub fn from_descriptor(descriptor: &ExtensionDescriptor, checksum: Option<Checksum>) -> Self {
        Self {
            name: descriptor.name.clone(),
            version: descriptor.version.clone(),
            checksum,
            installed_at: Utc::now(),
            types: descriptor.types.clone(),
        }
    }
}

/// Contents of the schema-extension descriptor file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaExtensionFile {
    #[serde(default)]
    pub extensions: Vec<SchemaExtension>,
}

impl SchemaExtensionFile {
    /// Read the file; a missing file is an empty descriptor
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Record an installed bundle, replacing an earlier entry of the same name
    pub fn append(&mut self, extension: SchemaExtension) {
        self.extensions.retain(|e| e.name != extension.name);
        self.extensions.push(extension);
    }

    /// Every declared (tag, role) pair
    pub fn declared_tags(&self) -> impl Iterator<Item = (&str, Role)> {
        self.extensions.iter().flat_map(|ext| {
            ext.types.iter().flat_map(|t| {
                [
                    (t.target_tag.as_str(), Role::Target),
                    (t.finding_tag.as_str(), Role::Finding),
                ]
            })
        })
    }

    /// Target tag to finding tag links
    pub fn declared_links(&self) -> impl Iterator<Item = (&str, &str)> {
        self.extensions
            .iter()
            .flat_map(|ext| ext.types.iter())
            .map(|t| (t.target_tag.as_str(), t.finding_tag.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extension::manifest::BundleSource;
    use pretty_assertions::assert_eq;

    fn descriptor(version: &str) -> ExtensionDescriptor {
        ExtensionDescriptor {
            name: "comets".into(),
            version: Version::parse(version).unwrap(),
            entry_point: "comets::CometExtension".into(),
            types: vec![TypeDeclaration {
                target_tag: "custom:cometTarget".into(),
                target_entry: "comets::CometTarget".into(),
                finding_tag: "custom:cometFinding".into(),
                finding_entry: "comets::CometFinding".into(),
            }],
            source: BundleSource::Embedded,
        }
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let file = SchemaExtensionFile::load(&dir.path().join("schema-extensions.json")).unwrap();
        assert!(file.extensions.is_empty());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/schema-extensions.json");

        let mut file = SchemaExtensionFile::default();
        file.append(SchemaExtension::from_descriptor(&descriptor("1.0.0"), Some(Checksum::from_bytes(b"x"))));
        file.append(SchemaExtension::from_descriptor(&descriptor("1.1.0"), None));
        file.save(&path).unwrap();

        let reloaded = SchemaExtensionFile::load(&path).unwrap();
        assert_eq!(reloaded, file);
        assert_eq!(reloaded.extensions.len(), 1);
        assert_eq!(reloaded.extensions[0].version, Version::new(1, 1, 0));

        let tags: Vec<_> = reloaded.declared_tags().collect();
        assert_eq!(
            tags,
            vec![("custom:cometTarget", Role::Target), ("custom:cometFinding", Role::Finding)]
        );
    }
}
