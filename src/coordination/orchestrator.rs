//! Run-level orchestration
//!
//! Every account gets its own task. A task first waits (bounded) for an admission
//! slot, then drives the account's worker to termination. Failures stay inside the
//! task that produced them.

use super::gate::BoundedGate;
use super::worker::{AccountWorker, WorkerTiming};
use crate::domain::{Account, WorkerState, Workflow};
use crate::error::TapfleetError;
use crate::executor::ActionExecutor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Longest an account waits for an admission slot before it is skipped
pub const ADMISSION_TIMEOUT: Duration = Duration::from_secs(60);

/// Per-account result as seen by the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountOutcome {
    Completed,
    Failed,
    Skipped,
}

/// Counts reported once every account has terminated
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Highest number of workers observed running at once
    pub peak_running: usize,
}

impl RunSummary {
    pub fn total(&self) -> usize {
        self.completed + self.failed + self.skipped
    }

    fn record(&mut self, outcome: AccountOutcome) {
        match outcome {
            AccountOutcome::Completed => self.completed += 1,
            AccountOutcome::Failed => self.failed += 1,
            AccountOutcome::Skipped => self.skipped += 1,
        }
    }
}

/// Tracks how many workers are inside the gate
#[derive(Debug, Default)]
struct RunningCounter {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl RunningCounter {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct Orchestrator {
    executor: Arc<dyn ActionExecutor>,
    gate: BoundedGate,
    timing: WorkerTiming,
    admission_timeout: Duration,
}

impl Orchestrator {
    /// Orchestrator admitting at most `max_concurrent` accounts at once
    pub fn new(executor: Arc<dyn ActionExecutor>, max_concurrent: usize) -> Self {
        Self {
            executor,
            gate: BoundedGate::new(max_concurrent),
            timing: WorkerTiming::default(),
            admission_timeout: ADMISSION_TIMEOUT,
        }
    }

    pub fn with_timing(mut self, timing: WorkerTiming) -> Self {
        self.timing = timing;
        self
    }

    pub fn with_admission_timeout(mut self, timeout: Duration) -> Self {
        self.admission_timeout = timeout;
        self
    }

    pub fn gate(&self) -> &BoundedGate {
        &self.gate
    }

    /// Run `workflow` for every account and return once all of them have terminated
    pub async fn process_accounts(&self, accounts: Vec<Account>, workflow: Workflow) -> RunSummary {
        let running = Arc::new(RunningCounter::default());
        let mut tasks = JoinSet::new();

        info!(
            accounts = accounts.len(),
            max_concurrent = self.gate.capacity(),
            workflow = %workflow,
            "Processing accounts"
        );

        for account in accounts {
            let account = Arc::new(account);
            let gate = self.gate.clone();
            let executor = self.executor.clone();
            let running = running.clone();
            let timing = self.timing;
            let admission_timeout = self.admission_timeout;

            tasks.spawn(async move {
                let address = account.address().to_string();

                let Some(permit) = gate.acquire_timeout(admission_timeout).await else {
                    let err = TapfleetError::AdmissionTimeout {
                        address: address.clone(),
                        waited_ms: admission_timeout.as_millis() as u64,
                    };
                    warn!(address = %address, error = %err, "Account skipped");
                    return AccountOutcome::Skipped;
                };

                running.enter();
                let result = AccountWorker::new(account, executor, timing)
                    .run(workflow)
                    .await;
                running.leave();
                permit.release();

                match result {
                    Ok(report) => match report.exit {
                        WorkerState::Expired | WorkerState::Completed => {
                            info!(
                                address = %address,
                                exit = %report.exit,
                                succeeded = report.actions_succeeded,
                                failed = report.actions_failed,
                                polls = report.polls,
                                "Account finished"
                            );
                            AccountOutcome::Completed
                        }
                        exit => {
                            warn!(address = %address, exit = %exit, "Account stopped early");
                            AccountOutcome::Failed
                        }
                    },
                    Err(e) => {
                        error!(address = %address, error = %e, "Account failed");
                        AccountOutcome::Failed
                    }
                }
            });
        }

        let mut summary = RunSummary::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => summary.record(outcome),
                Err(e) => {
                    error!(error = %e, "Account task aborted");
                    summary.record(AccountOutcome::Failed);
                }
            }
        }
        summary.peak_running = running.peak.load(Ordering::SeqCst);

        info!(
            completed = summary.completed,
            failed = summary.failed,
            skipped = summary.skipped,
            peak_running = summary.peak_running,
            "All accounts processed"
        );
        summary
    }
}
