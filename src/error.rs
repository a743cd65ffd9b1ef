use thiserror::Error;

/// Main error type for the account runner
#[derive(Error, Debug)]
pub enum TapfleetError {
    // Configuration errors (fatal to the whole run)
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Config load error: {0}")]
    ConfigLoad(#[from] config::ConfigError),

    // Per-account errors (the account is dropped or skipped, the batch continues)
    #[error("Account construction failed for {address}: {reason}")]
    AccountConstruction { address: String, reason: String },

    #[error("Admission timeout for {address} after {waited_ms}ms")]
    AdmissionTimeout { address: String, waited_ms: u64 },

    // State machine errors
    #[error("Invalid state transition: from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    // Remote action errors
    #[error("Action execution failed: {0}")]
    Execution(#[from] ExecutionError),

    // Storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Crypto/signing errors
    #[error("Keypair error: {0}")]
    Keypair(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl TapfleetError {
    /// Errors that must abort the whole run rather than a single account
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TapfleetError::Configuration(_) | TapfleetError::ConfigLoad(_) | TapfleetError::Storage(_)
        )
    }
}

/// Result type alias for TapfleetError
pub type Result<T> = std::result::Result<T, TapfleetError>;

/// Failure of a single remote action.
///
/// Kept `Clone` so test executors can replay the same failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Rejected by remote ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Unsupported action: {0}")]
    Unsupported(String),

    #[error("Session persistence failed: {0}")]
    Persistence(String),
}

impl From<reqwest::Error> for ExecutionError {
    fn from(err: reqwest::Error) -> Self {
        ExecutionError::Transport(err.to_string())
    }
}
