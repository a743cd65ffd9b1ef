//! Coordination layer for a run
//!
//! - Bounded admission gate sized to the concurrency ceiling
//! - Per-account worker state machine with its polling task
//! - Orchestrator that admits every account and waits for all of them

pub mod gate;
pub mod orchestrator;
pub mod worker;

pub use gate::{BoundedGate, GatePermit};
pub use orchestrator::{AccountOutcome, Orchestrator, RunSummary, ADMISSION_TIMEOUT};
pub use worker::{
    AccountWorker, WorkerReport, WorkerTiming, MAX_RETRIES, POLL_ACTION, POLL_INTERVAL,
    SETTLE_PAUSE,
};
