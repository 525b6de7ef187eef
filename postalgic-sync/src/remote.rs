//! Reading the control file from a target.

use postalgic_core::RemoteHashRecord;
use postalgic_publish::Publisher;

/// Fetch the target's control file.
///
/// Failures are logged and reported as absent: a missing baseline only
/// costs redundant uploads, while a wrong one would skip real changes.
pub async fn fetch_record<P: Publisher>(publisher: &mut P) -> Option<RemoteHashRecord> {
    if !publisher.capabilities().remote_hashes {
        return None;
    }
    match publisher.fetch_remote_hashes().await {
        Ok(record) => record,
        Err(e) => {
            tracing::warn!(
                target_name = %publisher.describe(),
                error = %e,
                "cannot read remote hash record, falling back to a full resync"
            );
            None
        }
    }
}
