use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-account worker state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkerState {
    /// Admitted but not started
    Idle,
    /// Primary action (and polling for repeating workflows) in progress
    Running,
    /// Active-duration budget exhausted
    Expired,
    /// Consecutive failure cap reached
    RetryExhausted,
    /// One-shot action finished successfully
    Completed,
    /// One-shot action failed
    Failed,
    /// Worker done; no further activity for this account
    Terminated,
}

impl WorkerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerState::Idle => "IDLE",
            WorkerState::Running => "RUNNING",
            WorkerState::Expired => "EXPIRED",
            WorkerState::RetryExhausted => "RETRY_EXHAUSTED",
            WorkerState::Completed => "COMPLETED",
            WorkerState::Failed => "FAILED",
            WorkerState::Terminated => "TERMINATED",
        }
    }

    /// Check if this state can transition to another state
    pub fn can_transition_to(&self, target: WorkerState) -> bool {
        use WorkerState::*;

        match (self, target) {
            (Idle, Running) => true,

            // Exit reasons
            (Running, Expired) => true,
            (Running, RetryExhausted) => true,
            (Running, Completed) => true,
            (Running, Failed) => true,

            // Finalization
            (Expired, Terminated) => true,
            (RetryExhausted, Terminated) => true,
            (Completed, Terminated) => true,
            (Failed, Terminated) => true,

            // Nothing re-enters Running, nothing leaves Terminated
            _ => false,
        }
    }

    /// Get valid next states from current state
    pub fn valid_transitions(&self) -> Vec<WorkerState> {
        use WorkerState::*;

        match self {
            Idle => vec![Running],
            Running => vec![Expired, RetryExhausted, Completed, Failed],
            Expired | RetryExhausted | Completed | Failed => vec![Terminated],
            Terminated => vec![],
        }
    }

    /// States reached when the account's work has ended, successfully or not
    pub fn is_exit(&self) -> bool {
        matches!(
            self,
            WorkerState::Expired
                | WorkerState::RetryExhausted
                | WorkerState::Completed
                | WorkerState::Failed
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkerState::Terminated)
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
