//! `FileManifest` — relative output path → content hash.

use std::collections::btree_map;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Mapping from forward-slash relative output path to hex SHA-256 digest.
///
/// Backed by a `BTreeMap` so serialized control files are byte-stable, but
/// callers must not rely on ordering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileManifest(BTreeMap<String, String>);

impl FileManifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, hash: impl Into<String>) -> Option<String> {
        self.0.insert(path.into(), hash.into())
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.0.get(path).map(String::as_str)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.0.contains_key(path)
    }

    pub fn remove(&mut self, path: &str) -> Option<String> {
        self.0.remove(path)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FileManifest {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl IntoIterator for FileManifest {
    type Item = (String, String);
    type IntoIter = btree_map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_flat_json_object() {
        let manifest: FileManifest = [("index.html", "aa"), ("css/site.css", "bb")]
            .into_iter()
            .collect();
        let json = serde_json::to_string(&manifest).unwrap();
        assert_eq!(json, r#"{"css/site.css":"bb","index.html":"aa"}"#);
    }

    #[test]
    fn insert_replaces_existing_hash() {
        let mut manifest = FileManifest::new();
        assert!(manifest.insert("a", "1").is_none());
        assert_eq!(manifest.insert("a", "2").as_deref(), Some("1"));
        assert_eq!(manifest.get("a"), Some("2"));
        assert_eq!(manifest.len(), 1);
    }
}
