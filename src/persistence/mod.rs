//! Persistence Layer for Per-Account State
//!
//! - Credential store: the single-writer JSON map of per-account secrets and session data
//! - Statistics ledger: per-address points snapshot written by the polling action

pub mod credential_store;
pub mod statistics;

pub use credential_store::{CredentialEntry, CredentialMap, CredentialStore};
pub use statistics::{StatisticsLedger, StatisticsRecord};
