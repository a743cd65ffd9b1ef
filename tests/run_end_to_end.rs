//! Full runs through the orchestrator with in-process executors

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tapfleet::accounts::{build_accounts, AccountInputs};
use tapfleet::config::RunConfig;
use tapfleet::coordination::{Orchestrator, WorkerTiming};
use tapfleet::domain::{Account, Workflow};
use tapfleet::persistence::CredentialStore;
use tapfleet::signing::Keypair;
use tapfleet::{ActionExecutor, ActionOutcome, ExecutionError};

/// Records how many actions run at the same moment
#[derive(Default)]
struct ConcurrencyProbe {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

#[async_trait]
impl ActionExecutor for ConcurrencyProbe {
    async fn execute(
        &self,
        _account: &Account,
        _action: Workflow,
    ) -> Result<ActionOutcome, ExecutionError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(ActionOutcome::new("ok"))
    }
}

async fn build(n: usize, run: &RunConfig, workflow: Workflow) -> Vec<Account> {
    let primaries: Vec<Keypair> = (0..n).map(|_| Keypair::generate()).collect();
    let secondaries: Vec<Keypair> = (0..n).map(|_| Keypair::generate()).collect();
    let inputs = AccountInputs {
        primary_secrets: primaries.iter().map(Keypair::to_base58).collect(),
        secondary_secrets: secondaries.iter().map(|k| k.secret_bytes().to_vec()).collect(),
        proxies: vec!["http://127.0.0.1:3128".into()],
    };
    let path = std::env::temp_dir().join(format!(
        "tapfleet_e2e_{}_{}.json",
        std::process::id(),
        chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0)
    ));

    let accounts = build_accounts(&inputs, &CredentialStore::new(&path), run, workflow)
        .await
        .unwrap();
    let _ = tokio::fs::remove_file(&path).await;
    accounts
}

#[tokio::test(start_paused = true)]
async fn five_one_shot_accounts_with_ceiling_two() {
    let run = RunConfig {
        max_threads: 2,
        ..Default::default()
    };
    let accounts = build(5, &run, Workflow::Deposit).await;
    let probe = Arc::new(ConcurrencyProbe::default());

    let orchestrator = Orchestrator::new(probe.clone(), run.max_threads);
    let summary = orchestrator.process_accounts(accounts, Workflow::Deposit).await;

    assert_eq!(summary.completed, 5);
    assert_eq!(summary.failed + summary.skipped, 0);
    assert!(summary.peak_running <= 2, "peak {}", summary.peak_running);
    assert!(probe.peak.load(Ordering::SeqCst) <= 2);
    assert_eq!(probe.calls.load(Ordering::SeqCst), 5);
    assert_eq!(orchestrator.gate().available(), 2);
}

#[tokio::test(start_paused = true)]
async fn repeating_accounts_all_terminate() {
    let run = RunConfig {
        max_threads: 2,
        min_delay: 0.5,
        max_delay: 1.0,
        // 6 to 12 seconds of activity per account
        min_time_work: 0.1,
        max_time_work: 0.2,
        ..Default::default()
    };
    let accounts = build(5, &run, Workflow::Click).await;
    let probe = Arc::new(ConcurrencyProbe::default());

    let timing = WorkerTiming {
        poll_interval: Duration::from_secs(2),
        settle_pause: Duration::from_secs(1),
        ..Default::default()
    };
    let summary = Orchestrator::new(probe.clone(), run.max_threads)
        .with_timing(timing)
        .process_accounts(accounts, Workflow::Click)
        .await;

    assert_eq!(summary.completed, 5);
    assert_eq!(summary.skipped, 0);
    assert!(summary.peak_running <= 2);

    // Nothing keeps running after the orchestrator returns
    let calls = probe.calls.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(probe.calls.load(Ordering::SeqCst), calls);
}
