//! Bundle storage
//!
//! Bundles are either unpacked directories or gzip-compressed tarballs.
//! Both expose the same two manifest files.

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tar::Archive;
use walkdir::WalkDir;

use super::manifest::{BundleSource, ExtensionDescriptor, EXTENSION_MANIFEST, TYPES_MANIFEST};
use crate::error::{ArchiveError, Result};

const ARCHIVE_SUFFIXES: [&str; 2] = [".tar.gz", ".tgz"];

fn archive_stem(path: &Path) -> Option<&str> {
    let name = path.file_name()?.to_str()?;
    ARCHIVE_SUFFIXES
        .iter()
        .find_map(|suffix| name.strip_suffix(suffix))
}

/// Whether `path` looks like a bundle
pub fn is_bundle(path: &Path) -> bool {
    if path.is_dir() {
        path.join(EXTENSION_MANIFEST).is_file()
    } else {
        path.is_file() && archive_stem(path).is_some()
    }
}

/// Bundles directly inside `dir`, in file-name order
pub fn scan_directory(dir: &Path) -> Vec<PathBuf> {
    if !dir.is_dir() {
        tracing::debug!(dir = %dir.display(), "extension directory does not exist");
        return Vec::new();
    }

    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry.into_path()),
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable extension directory entry");
                None
            }
        })
        .filter(|path| is_bundle(path))
        .collect()
}

/// Read the manifests of a bundle
pub fn read_descriptor(path: &Path) -> Result<ExtensionDescriptor> {
    if path.is_dir() {
        let extension = fs::read_to_string(path.join(EXTENSION_MANIFEST))?;
        let types_path = path.join(TYPES_MANIFEST);
        let types = if types_path.is_file() {
            Some(fs::read_to_string(types_path)?)
        } else {
            None
        };
        return ExtensionDescriptor::from_manifests(
            BundleSource::Directory(path.to_path_buf()),
            &extension,
            types.as_deref(),
        );
    }

    let mut extension = None;
    let mut types = None;
    let mut archive = Archive::new(GzDecoder::new(File::open(path)?));
    for entry in archive.entries()? {
        let mut entry = entry?;
        let entry_path = entry.path()?.into_owned();
        let slot = if entry_path.ends_with(EXTENSION_MANIFEST) {
            &mut extension
        } else if entry_path.ends_with(TYPES_MANIFEST) {
            &mut types
        } else {
            continue;
        };
        let mut text = String::new();
        entry.read_to_string(&mut text)?;
        *slot = Some(text);
    }

    let extension = extension.ok_or_else(|| ArchiveError::Manifest {
        path: path.to_path_buf(),
        message: format!("archive has no {}", EXTENSION_MANIFEST),
    })?;
    ExtensionDescriptor::from_manifests(
        BundleSource::Archive(path.to_path_buf()),
        &extension,
        types.as_deref(),
    )
}

/// Place a bundle under `extension_dir`, returning the installed path.
///
/// Archives are unpacked into a directory named after the archive;
/// directories are copied.
pub fn unpack(bundle: &Path, extension_dir: &Path) -> Result<PathBuf> {
    let name = match archive_stem(bundle) {
        Some(stem) => stem.to_string(),
        None if bundle.is_dir() => bundle
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| ArchiveError::activation(bundle.display().to_string(), "bundle path has no name"))?,
        None => {
            return Err(ArchiveError::activation(
                bundle.display().to_string(),
                "not a bundle directory or .tar.gz archive",
            ))
        }
    };

    let destination = extension_dir.join(name);
    if destination.exists() && fs::canonicalize(&destination)? == fs::canonicalize(bundle)? {
        return Ok(destination);
    }
    if destination.exists() {
        fs::remove_dir_all(&destination)?;
    }
    fs::create_dir_all(&destination)?;

    if bundle.is_dir() {
        copy_tree(bundle, &destination)?;
    } else {
        let mut archive = Archive::new(GzDecoder::new(File::open(bundle)?));
        archive.unpack(&destination)?;
    }

    tracing::info!(
        bundle = %bundle.display(),
        destination = %destination.display(),
        "unpacked extension bundle"
    );
    Ok(destination)
}

fn copy_tree(from: &Path, to: &Path) -> Result<()> {
    for entry in WalkDir::new(from).min_depth(1) {
        let entry = entry.map_err(std::io::Error::from)?;
        let relative = entry.path().strip_prefix(from).unwrap_or(entry.path());
        let target = to.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;

    pub(crate) const EXTENSION: &str = "name=comets\nversion=1.0.0\nentry-point=comets::CometExtension\n";
    pub(crate) const TYPES: &str = "\
type.0.target.tag=custom:cometTarget
type.0.target.entry=comets::CometTarget
type.0.finding.tag=custom:cometFinding
type.0.finding.entry=comets::CometFinding
";

    pub(crate) fn write_dir_bundle(root: &Path, name: &str) -> PathBuf {
        let bundle = root.join(name);
        fs::create_dir_all(bundle.join("META-INF")).unwrap();
        fs::write(bundle.join(EXTENSION_MANIFEST), EXTENSION).unwrap();
        fs::write(bundle.join(TYPES_MANIFEST), TYPES).unwrap();
        bundle
    }

    pub(crate) fn write_archive_bundle(root: &Path, name: &str) -> PathBuf {
        let path = root.join(format!("{}.tar.gz", name));
        let encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (entry, text) in [(EXTENSION_MANIFEST, EXTENSION), (TYPES_MANIFEST, TYPES)] {
            let mut header = tar::Header::new_gnu();
            header.set_size(text.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, entry, text.as_bytes()).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
        path
    }

    #[test]
    fn test_scan_finds_both_layouts() {
        let dir = tempfile::tempdir().unwrap();
        write_dir_bundle(dir.path(), "b-dir");
        write_archive_bundle(dir.path(), "a-archive");
        fs::write(dir.path().join("notes.txt"), "not a bundle").unwrap();
        fs::create_dir_all(dir.path().join("empty")).unwrap();

        let found = scan_directory(dir.path());
        assert_eq!(found.len(), 2);
        assert!(found[0].ends_with("a-archive.tar.gz"));
        assert!(found[1].ends_with("b-dir"));
    }

    #[test]
    fn test_read_archive_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        let archive = write_archive_bundle(dir.path(), "comets");

        let descriptor = read_descriptor(&archive).unwrap();
        assert_eq!(descriptor.name, "comets");
        assert_eq!(descriptor.types.len(), 1);
        assert_eq!(descriptor.source, BundleSource::Archive(archive));
    }

    #[test]
    fn test_unpack_archive_and_copy_directory() {
        let src = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();

        let installed = unpack(&write_archive_bundle(src.path(), "comets"), dest.path()).unwrap();
        assert_eq!(installed, dest.path().join("comets"));
        assert!(is_bundle(&installed));

        let copied = unpack(&write_dir_bundle(src.path(), "moons"), dest.path()).unwrap();
        assert!(copied.join(TYPES_MANIFEST).is_file());
    }

    #[test]
    fn test_unpack_rejects_plain_file() {
        let src = tempfile::tempdir().unwrap();
        let file = src.path().join("comets.zip");
        fs::write(&file, b"PK").unwrap();
        assert!(matches!(
            unpack(&file, src.path()),
            Err(ArchiveError::ExtensionActivation { .. })
        ));
    }
}
