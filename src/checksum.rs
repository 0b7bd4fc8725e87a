//! Checksum utilities for extension bundle integrity

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// SHA256 checksum of a bundle
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Checksum(String);

impl Checksum {
    /// Compute checksum from raw bytes
    pub fn from_bytes(data: &[u8]) -> Self {
        let hash = Sha256::digest(data);
        Self(format!("{:x}", hash))
    }

    /// Checksum of a bundle on disk.
    ///
    /// An archive is hashed as-is. A directory is hashed over its files
    /// in path order, each contributing its relative path and contents.
    pub fn of_bundle(path: &Path) -> std::io::Result<Self> {
        if !path.is_dir() {
            return Ok(Self::from_bytes(&fs::read(path)?));
        }

        let mut hasher = Sha256::new();
        for entry in WalkDir::new(path).sort_by_file_name() {
            let entry = entry.map_err(std::io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry.path().strip_prefix(path).unwrap_or(entry.path());
            hasher.update(relative.to_string_lossy().as_bytes());
            hasher.update([0u8]);
            hasher.update(fs::read(entry.path())?);
        }
        Ok(Self(format!("{:x}", hasher.finalize())))
    }

    /// Get the hex string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Verify that a bundle still matches this checksum
    pub fn verify(&self, path: &Path) -> std::io::Result<bool> {
        Ok(Self::of_bundle(path)?.0 == self.0)
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Checksum {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_consistency() {
        let a = Checksum::from_bytes(b"name=comets");
        let b = Checksum::from_bytes(b"name=comets");
        assert_eq!(a, b);
        assert_ne!(a, Checksum::from_bytes(b"name=asteroids"));
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn test_directory_checksum() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("META-INF")).unwrap();
        fs::write(dir.path().join("META-INF/extension.properties"), "name=comets\n").unwrap();

        let checksum = Checksum::of_bundle(dir.path()).unwrap();
        assert!(checksum.verify(dir.path()).unwrap());

        fs::write(dir.path().join("META-INF/extension.properties"), "name=other\n").unwrap();
        assert!(!checksum.verify(dir.path()).unwrap());
    }
}
