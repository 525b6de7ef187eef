//! Local hash store — this client's copy of the last published record.
//!
//! Persists one [`RemoteHashRecord`] JSON document per site and target at
//! `<home>/.postalgic/hashes/<site>/<target>.json`. The remote control file
//! stays authoritative; this copy backs offline `status` / `diff`.
//! Writes use the same atomic `.tmp` + rename pattern as the registry.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Deserialize;

use postalgic_core::{
    registry, ClientId, FileManifest, ManifestError, RemoteHashRecord, SiteName, TargetName,
    RECORD_VERSION,
};

use crate::error::{io_err, SyncError};

/// Publisher recorded for entries migrated from the legacy flat format.
pub const UNKNOWN_PUBLISHER: &str = "unknown";

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum HashStoreCompat {
    Record(RemoteHashRecord),
    Legacy(FileManifest),
}

/// `~/.postalgic/hashes/<site>/<target>.json`
pub fn store_path_at(home: &Path, site: &SiteName, target: &TargetName) -> PathBuf {
    registry::postalgic_root(home)
        .join("hashes")
        .join(&site.0)
        .join(format!("{}.json", target.0))
}

/// Load the stored record for `site` / `target`.
///
/// Returns `None` if nothing has been published from this client yet.
pub fn load_at(
    home: &Path,
    site: &SiteName,
    target: &TargetName,
) -> Result<Option<RemoteHashRecord>, SyncError> {
    let path = store_path_at(home, site, target);
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read(&path).map_err(|e| io_err(&path, e))?;
    match serde_json::from_slice::<HashStoreCompat>(&contents)? {
        HashStoreCompat::Record(record) => {
            if record.version > RECORD_VERSION {
                return Err(ManifestError::UnsupportedVersion {
                    found: record.version,
                    supported: RECORD_VERSION,
                }
                .into());
            }
            Ok(Some(record))
        }
        HashStoreCompat::Legacy(file_hashes) => Ok(Some(RemoteHashRecord {
            version: RECORD_VERSION,
            last_published_date: Utc::now(),
            published_by: ClientId::from(UNKNOWN_PUBLISHER),
            file_hashes,
        })),
    }
}

/// Save `record` for `site` / `target` atomically.
///
/// Writes to `<path>.tmp` then renames to `<path>`.
pub fn save_at(
    home: &Path,
    site: &SiteName,
    target: &TargetName,
    record: &RemoteHashRecord,
) -> Result<(), SyncError> {
    let path = store_path_at(home, site, target);
    let Some(dir) = path.parent() else {
        return Err(io_err(
            path,
            std::io::Error::other("invalid hash store path"),
        ));
    };
    std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;

    let json = record.to_json_bytes()?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, &json).map_err(|e| io_err(&tmp, e))?;
    std::fs::rename(&tmp, &path).map_err(|e| io_err(&path, e))?;
    Ok(())
}

/// Forget the stored record, e.g. after a target is removed.
pub fn remove_at(home: &Path, site: &SiteName, target: &TargetName) -> Result<(), SyncError> {
    let path = store_path_at(home, site, target);
    match std::fs::remove_file(&path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(io_err(path, e)),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn names() -> (SiteName, TargetName) {
        (SiteName::from("blog"), TargetName::from("prod"))
    }

    #[test]
    fn none_when_file_missing() {
        let tmp = TempDir::new().unwrap();
        let (site, target) = names();
        assert!(load_at(tmp.path(), &site, &target).unwrap().is_none());
    }

    #[test]
    fn roundtrip_save_load() {
        let tmp = TempDir::new().unwrap();
        let (site, target) = names();
        let manifest: FileManifest = [("index.html", "deadbeef"), ("css/site.css", "cafebabe")]
            .into_iter()
            .collect();
        let record = RemoteHashRecord::new(manifest, ClientId::from("laptop"));

        save_at(tmp.path(), &site, &target, &record).unwrap();
        let loaded = load_at(tmp.path(), &site, &target).unwrap().unwrap();
        assert_eq!(loaded, record);
    }

    #[test]
    fn tmp_file_cleaned_up_after_save() {
        let tmp = TempDir::new().unwrap();
        let (site, target) = names();
        let record = RemoteHashRecord::new(FileManifest::new(), ClientId::from("laptop"));
        save_at(tmp.path(), &site, &target, &record).unwrap();
        let tmp_path = store_path_at(tmp.path(), &site, &target).with_extension("json.tmp");
        assert!(
            !tmp_path.exists(),
            "tmp file should be removed after atomic rename"
        );
    }

    #[test]
    fn load_legacy_flat_map_migrates_to_record() {
        let tmp = TempDir::new().unwrap();
        let (site, target) = names();
        let path = store_path_at(tmp.path(), &site, &target);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, r#"{"index.html":"deadbeef","rss.xml":"cafebabe"}"#).unwrap();

        let loaded = load_at(tmp.path(), &site, &target).unwrap().unwrap();
        assert_eq!(loaded.version, RECORD_VERSION);
        assert_eq!(loaded.published_by, ClientId::from(UNKNOWN_PUBLISHER));
        assert_eq!(loaded.file_hashes.get("index.html"), Some("deadbeef"));
        assert_eq!(loaded.file_hashes.len(), 2);
    }

    #[test]
    fn future_versions_are_rejected() {
        let tmp = TempDir::new().unwrap();
        let (site, target) = names();
        let path = store_path_at(tmp.path(), &site, &target);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            r#"{"version":9,"lastPublishedDate":"2024-01-01T00:00:00Z","publishedBy":"x","fileHashes":{}}"#,
        )
        .unwrap();

        let err = load_at(tmp.path(), &site, &target).unwrap_err();
        assert!(matches!(
            err,
            SyncError::Manifest(ManifestError::UnsupportedVersion { found: 9, .. })
        ));
    }

    #[test]
    fn remove_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let (site, target) = names();
        let record = RemoteHashRecord::new(FileManifest::new(), ClientId::from("laptop"));
        save_at(tmp.path(), &site, &target, &record).unwrap();
        remove_at(tmp.path(), &site, &target).unwrap();
        remove_at(tmp.path(), &site, &target).unwrap();
        assert!(load_at(tmp.path(), &site, &target).unwrap().is_none());
    }
}
