//! The control file — last-published hash state stored on the target itself.
//!
//! ```json
//! {"version": 1, "lastPublishedDate": "<ISO-8601>", "publishedBy": "<client>",
//!  "fileHashes": {"<path>": "<hash>"}}
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ManifestError;
use crate::manifest::FileManifest;
use crate::types::ClientId;

/// Hidden directory reserved for publish bookkeeping; never hashed.
pub const CONTROL_DIR: &str = ".postalgic";

/// Well-known location of the control file relative to the site root.
pub const CONTROL_FILE_PATH: &str = ".postalgic/hashes.json";

/// Newest control-file format this build reads and writes.
pub const RECORD_VERSION: u32 = 1;

/// Versioned envelope around the last published [`FileManifest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteHashRecord {
    pub version: u32,
    pub last_published_date: DateTime<Utc>,
    pub published_by: ClientId,
    pub file_hashes: FileManifest,
}

impl RemoteHashRecord {
    /// Stamp `manifest` as published now by `client`.
    pub fn new(file_hashes: FileManifest, published_by: ClientId) -> Self {
        Self {
            version: RECORD_VERSION,
            last_published_date: Utc::now(),
            published_by,
            file_hashes,
        }
    }

    pub fn to_json_bytes(&self) -> Result<Vec<u8>, ManifestError> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Decode a control file, rejecting formats newer than [`RECORD_VERSION`].
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, ManifestError> {
        let record: Self = serde_json::from_slice(bytes)?;
        if record.version > RECORD_VERSION {
            return Err(ManifestError::UnsupportedVersion {
                found: record.version,
                supported: RECORD_VERSION,
            });
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_format_uses_camel_case_keys() {
        let manifest: FileManifest = [("index.html", "abc")].into_iter().collect();
        let record = RemoteHashRecord::new(manifest, ClientId::from("ios-phone"));
        let value: serde_json::Value =
            serde_json::from_slice(&record.to_json_bytes().unwrap()).unwrap();
        assert_eq!(value["version"], 1);
        assert_eq!(value["publishedBy"], "ios-phone");
        assert_eq!(value["fileHashes"]["index.html"], "abc");
        assert!(value["lastPublishedDate"].is_string());
    }

    #[test]
    fn decodes_record_written_by_another_client() {
        let json = br#"{"version":1,"lastPublishedDate":"2025-03-01T10:00:00Z","publishedBy":"server","fileHashes":{"a.html":"h1"}}"#;
        let record = RemoteHashRecord::from_json_slice(json).unwrap();
        assert_eq!(record.published_by, ClientId::from("server"));
        assert_eq!(record.file_hashes.get("a.html"), Some("h1"));
    }

    #[test]
    fn rejects_future_versions() {
        let json = br#"{"version":7,"lastPublishedDate":"2025-03-01T10:00:00Z","publishedBy":"x","fileHashes":{}}"#;
        let err = RemoteHashRecord::from_json_slice(json).unwrap_err();
        assert!(matches!(err, ManifestError::UnsupportedVersion { found: 7, .. }));
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(RemoteHashRecord::from_json_slice(b"not json").is_err());
    }
}
