use async_trait::async_trait;

use crate::domain::{Account, Workflow};
use crate::error::ExecutionError;

/// Result of one successful remote action
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ActionOutcome {
    /// Transaction signature, points summary or similar, for logging
    pub detail: String,
}

impl ActionOutcome {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

/// Capability that performs a named action for an account against the remote service.
///
/// Implementations must tolerate the same action being retried for the same
/// account, and report failures as values.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn execute(
        &self,
        account: &Account,
        action: Workflow,
    ) -> Result<ActionOutcome, ExecutionError>;
}
