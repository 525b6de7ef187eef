//! Outcome counters of one publish.

use serde::Serialize;

/// What a publish did (or, inside a [`PublishFailure`](crate::PublishFailure),
/// what it managed before failing).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PublishResult {
    /// Files written to the target (the control file is not counted).
    pub uploaded: usize,
    pub deleted: usize,
    /// Files in the generated site.
    pub total: usize,
    /// `false` when the change set was empty and nothing was transferred.
    pub changed: bool,
    /// Transactional targets only: whether a commit was created.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub committed: Option<bool>,
    /// CDN paths invalidated, if the target has an edge cache.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub invalidated: Vec<String>,
    /// Local artifact produced (archive targets).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<std::path::PathBuf>,
}

impl PublishResult {
    /// The result of a publish that found nothing to transfer.
    pub fn no_op(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    /// Files left as they were on the target.
    pub fn untouched(&self) -> usize {
        self.total.saturating_sub(self.uploaded)
    }
}
