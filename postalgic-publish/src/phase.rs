//! Per-invocation publish state machine.
//!
//! `Idle → Connecting → Diffing → Transferring → Finalizing → Done`, with
//! `Failed` reachable from every non-terminal state.

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishPhase {
    Idle,
    Connecting,
    Diffing,
    Transferring,
    /// Cache invalidation, control-file upload, commit + push.
    Finalizing,
    Done,
    Failed,
}

impl PublishPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, PublishPhase::Done | PublishPhase::Failed)
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_advance_to(self, next: PublishPhase) -> bool {
        use PublishPhase::*;
        match (self, next) {
            (from, Failed) => !from.is_terminal(),
            (Idle, Connecting)
            | (Connecting, Diffing)
            | (Diffing, Transferring)
            | (Diffing, Done)
            | (Transferring, Finalizing)
            | (Finalizing, Done) => true,
            _ => false,
        }
    }
}

impl fmt::Display for PublishPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PublishPhase::Idle => "idle",
            PublishPhase::Connecting => "connecting",
            PublishPhase::Diffing => "diffing",
            PublishPhase::Transferring => "transferring",
            PublishPhase::Finalizing => "finalizing",
            PublishPhase::Done => "done",
            PublishPhase::Failed => "failed",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::PublishPhase::*;

    #[test]
    fn happy_path_is_legal() {
        let path = [Idle, Connecting, Diffing, Transferring, Finalizing, Done];
        for pair in path.windows(2) {
            assert!(pair[0].can_advance_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn no_op_skips_transfer() {
        assert!(Diffing.can_advance_to(Done));
    }

    #[test]
    fn failed_only_from_non_terminal() {
        assert!(Transferring.can_advance_to(Failed));
        assert!(!Done.can_advance_to(Failed));
        assert!(!Failed.can_advance_to(Failed));
    }

    #[test]
    fn cannot_skip_backwards() {
        assert!(!Finalizing.can_advance_to(Transferring));
        assert!(!Idle.can_advance_to(Transferring));
    }
}
