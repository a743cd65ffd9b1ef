pub mod accounts;
pub mod adapters;
pub mod cli;
pub mod config;
pub mod coordination;
pub mod domain;
pub mod error;
pub mod executor;
pub mod persistence;
pub mod signing;

pub use accounts::{build_accounts, AccountInputs};
pub use adapters::TapApiExecutor;
pub use config::AppConfig;
pub use coordination::{
    AccountWorker, BoundedGate, GatePermit, Orchestrator, RunSummary, WorkerReport, WorkerTiming,
};
pub use domain::{Account, WorkerState, Workflow};
pub use error::{ExecutionError, Result, TapfleetError};
pub use executor::{ActionExecutor, ActionOutcome};
pub use persistence::{CredentialEntry, CredentialStore, StatisticsLedger};
pub use signing::Keypair;
