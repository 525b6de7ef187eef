//! ChangeSetCalculator — classify the difference between two manifests.
//!
//! Pure: no I/O, never mutates its inputs.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::manifest::FileManifest;
use crate::types::PublishSettings;

/// Paths to upload (`modified`) and remove (`deleted`), each sorted.
///
/// A path is never in both lists. `suppressed` lists non-essential files
/// that changed but were dropped by the [`SuppressionRule`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeSet {
    pub modified: Vec<String>,
    pub deleted: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suppressed: Vec<String>,
}

impl ChangeSet {
    /// `true` when nothing needs to be transferred.
    pub fn is_empty(&self) -> bool {
        self.modified.is_empty() && self.deleted.is_empty()
    }

    /// Number of transfer operations (uploads + deletions).
    pub fn len(&self) -> usize {
        self.modified.len() + self.deleted.len()
    }

    /// Union of modified and deleted paths, sorted.
    pub fn touched_paths(&self) -> Vec<String> {
        let mut all: Vec<String> = self
            .modified
            .iter()
            .chain(self.deleted.iter())
            .cloned()
            .collect();
        all.sort();
        all
    }
}

/// Drops changes caused only by volatile generated files (feeds, sitemaps).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuppressionRule {
    files: BTreeSet<String>,
    max_changes: usize,
}

impl SuppressionRule {
    pub fn new<I, S>(files: I, max_changes: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            files: files.into_iter().map(Into::into).collect(),
            max_changes,
        }
    }

    /// A rule that never suppresses anything.
    pub fn disabled() -> Self {
        Self::new(Vec::<String>::new(), 0)
    }

    pub fn from_settings(settings: &PublishSettings) -> Self {
        Self::new(
            settings.non_essential_files.iter().cloned(),
            settings.suppression_max_changes,
        )
    }

    pub fn is_non_essential(&self, path: &str) -> bool {
        self.files.contains(path)
    }

    /// Applies only when the non-essential files are the *exclusive*
    /// explanation for every detected change.
    fn applies(&self, modified: &[String], deleted: &[String]) -> bool {
        deleted.is_empty()
            && !modified.is_empty()
            && modified.len() <= self.max_changes
            && modified.iter().all(|p| self.is_non_essential(p))
    }
}

impl Default for SuppressionRule {
    fn default() -> Self {
        Self::from_settings(&PublishSettings::default())
    }
}

/// Diff with the default `{rss.xml, sitemap.xml}` / 2-file suppression rule.
pub fn diff(previous: &FileManifest, current: &FileManifest) -> ChangeSet {
    diff_with(previous, current, &SuppressionRule::default())
}

/// Diff `previous` against `current` and apply `rule`.
pub fn diff_with(
    previous: &FileManifest,
    current: &FileManifest,
    rule: &SuppressionRule,
) -> ChangeSet {
    let mut modified: Vec<String> = current
        .iter()
        .filter(|(path, hash)| previous.get(path) != Some(*hash))
        .map(|(path, _)| path.to_string())
        .collect();
    let mut deleted: Vec<String> = previous
        .paths()
        .filter(|path| !current.contains(path))
        .map(str::to_string)
        .collect();
    modified.sort();
    deleted.sort();

    if rule.applies(&modified, &deleted) {
        return ChangeSet {
            modified: Vec::new(),
            deleted,
            suppressed: modified,
        };
    }

    ChangeSet {
        modified,
        deleted,
        suppressed: Vec::new(),
    }
}
