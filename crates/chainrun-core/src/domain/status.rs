//! Run status shared by JobRuns and TaskRuns.

use serde::{Deserialize, Serialize};

/// Status of a JobRun or one of its TaskRuns.
///
/// State transitions:
/// - InProgress -> Completed | Errored (terminal)
/// - InProgress -> PendingSleep | PendingConnection | PendingConfirmations
/// - Pending* -> InProgress (on resume)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Being executed, or created and waiting for its first step.
    InProgress,

    /// Suspended until a wall-clock time.
    PendingSleep,

    /// Suspended until the node reconnects to the chain.
    PendingConnection,

    /// Suspended until enough block confirmations have been observed.
    PendingConfirmations,

    Completed,

    Errored,
}

impl RunStatus {
    /// Statuses that the head tracker can release.
    pub const AWAITING_CHAIN: [RunStatus; 2] =
        [RunStatus::PendingConnection, RunStatus::PendingConfirmations];

    /// Is this a terminal state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Errored)
    }

    /// Is this one of the suspended states?
    pub fn is_pending(self) -> bool {
        matches!(
            self,
            RunStatus::PendingSleep
                | RunStatus::PendingConnection
                | RunStatus::PendingConfirmations
        )
    }
}
