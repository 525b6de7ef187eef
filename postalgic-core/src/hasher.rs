//! ContentHasher — SHA-256 over raw bytes of every generated output file.
//!
//! No normalisation is applied: a single differing byte (including line
//! endings) yields a different digest.

use std::fs::File;
use std::io;
use std::path::{Component, Path};

use sha2::{Digest, Sha256};
use walkdir::{DirEntry, WalkDir};

use crate::error::{io_err, ManifestError};
use crate::manifest::FileManifest;
use crate::record::CONTROL_DIR;

/// Hex-encoded SHA-256 of `bytes`.
pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Hex-encoded SHA-256 of the file at `path`, streamed.
pub fn hash_file(path: &Path) -> Result<String, ManifestError> {
    let mut file = File::open(path).map_err(|e| io_err(path, e))?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher).map_err(|e| io_err(path, e))?;
    Ok(hex::encode(hasher.finalize()))
}

/// Build a manifest of every regular file under `root`.
///
/// Hidden entries are skipped except top-level names listed in
/// `include_hidden`. The `.postalgic` control directory is always skipped.
pub fn hash_site(root: &Path, include_hidden: &[String]) -> Result<FileManifest, ManifestError> {
    if !root.is_dir() {
        return Err(ManifestError::MissingOutputDir(root.to_path_buf()));
    }

    let mut manifest = FileManifest::new();
    let walker = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_entry(|entry| is_published(entry, include_hidden));

    for entry in walker {
        let entry = entry.map_err(|source| ManifestError::Walk {
            root: root.to_path_buf(),
            source,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let key = relative_key(root, entry.path())?;
        manifest.insert(key, hash_file(entry.path())?);
    }
    Ok(manifest)
}

/// POSIX-style relative key for `path` under `root`.
pub fn relative_key(root: &Path, path: &Path) -> Result<String, ManifestError> {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let mut parts = Vec::new();
    for component in relative.components() {
        if let Component::Normal(part) = component {
            let part = part
                .to_str()
                .ok_or_else(|| ManifestError::NonUtf8Path(path.to_path_buf()))?;
            parts.push(part);
        }
    }
    Ok(parts.join("/"))
}

fn is_published(entry: &DirEntry, include_hidden: &[String]) -> bool {
    if entry.depth() == 0 {
        return true;
    }
    let name = entry.file_name().to_string_lossy();
    if !name.starts_with('.') {
        return true;
    }
    if name == CONTROL_DIR {
        return false;
    }
    entry.depth() == 1 && include_hidden.iter().any(|allowed| allowed.as_str() == name)
}
