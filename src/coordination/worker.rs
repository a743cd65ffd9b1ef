//! Per-account action state machine
//!
//! `Idle -> Running -> (Expired | RetryExhausted | Completed | Failed) -> Terminated`
//!
//! One-shot workflows execute once. Repeating workflows run a primary loop with
//! jittered delays and periodic long pauses, next to a polling task that is
//! cancelled and awaited as soon as the primary loop exits.

use crate::domain::{short_address, Account, WorkerState, Workflow};
use crate::error::{Result, TapfleetError};
use crate::executor::ActionExecutor;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

/// Consecutive primary-action failures tolerated before the account stops
pub const MAX_RETRIES: u32 = 3;

/// Interval between polling actions
pub const POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Pause after budget expiry so in-flight remote effects can land
pub const SETTLE_PAUSE: Duration = Duration::from_secs(15);

/// Action run by the polling task
pub const POLL_ACTION: Workflow = Workflow::Points;

/// Fixed worker timings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerTiming {
    pub max_retries: u32,
    pub poll_interval: Duration,
    pub settle_pause: Duration,
}

impl Default for WorkerTiming {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            poll_interval: POLL_INTERVAL,
            settle_pause: SETTLE_PAUSE,
        }
    }
}

/// What happened to one account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerReport {
    pub address: String,
    /// Exit reason (the state entered right before `Terminated`)
    pub exit: WorkerState,
    pub actions_succeeded: u64,
    pub actions_failed: u64,
    pub polls: u64,
    pub elapsed: Duration,
}

/// Drives one account through its workflow
pub struct AccountWorker {
    account: Arc<Account>,
    executor: Arc<dyn ActionExecutor>,
    timing: WorkerTiming,
    state: WorkerState,
}

#[derive(Default)]
struct LoopStats {
    succeeded: u64,
    failed: u64,
}

impl AccountWorker {
    pub fn new(
        account: Arc<Account>,
        executor: Arc<dyn ActionExecutor>,
        timing: WorkerTiming,
    ) -> Self {
        Self {
            account,
            executor,
            timing,
            state: WorkerState::Idle,
        }
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    fn transition(&mut self, to: WorkerState) -> Result<()> {
        if !self.state.can_transition_to(to) {
            return Err(TapfleetError::InvalidStateTransition {
                from: self.state.to_string(),
                to: to.to_string(),
            });
        }
        if to.is_terminal() {
            debug!(exit = %self.state, "Worker terminated");
        } else if to.is_exit() {
            debug!(from = %self.state, exit = %to, "Worker work ended");
        } else {
            debug!(from = %self.state, to = %to, "Worker state change");
        }
        self.state = to;
        Ok(())
    }

    /// Run the workflow to completion.
    ///
    /// One-shot failures are returned as errors after the worker has terminated;
    /// repeating workflows always end with a report.
    pub async fn run(mut self, workflow: Workflow) -> Result<WorkerReport> {
        let span = info_span!(
            "account",
            address = %short_address(self.account.address()),
            workflow = %workflow
        );
        async move {
            self.transition(WorkerState::Running)?;
            if workflow.is_repeating() {
                self.run_repeating(workflow).await
            } else {
                self.run_once(workflow).await
            }
        }
        .instrument(span)
        .await
    }

    async fn run_once(&mut self, workflow: Workflow) -> Result<WorkerReport> {
        let started = Instant::now();
        let result = self.executor.execute(&self.account, workflow).await;

        match result {
            Ok(outcome) => {
                info!(detail = %outcome.detail, "Action completed");
                self.transition(WorkerState::Completed)?;
                self.transition(WorkerState::Terminated)?;
                Ok(WorkerReport {
                    address: self.account.address().to_string(),
                    exit: WorkerState::Completed,
                    actions_succeeded: 1,
                    actions_failed: 0,
                    polls: 0,
                    elapsed: started.elapsed(),
                })
            }
            Err(e) => {
                self.transition(WorkerState::Failed)?;
                self.transition(WorkerState::Terminated)?;
                Err(TapfleetError::Execution(e))
            }
        }
    }

    async fn run_repeating(&mut self, workflow: Workflow) -> Result<WorkerReport> {
        let started = Instant::now();
        let cancel = CancellationToken::new();
        // Cancels the poller even if this future is dropped mid-loop
        let _poll_guard = cancel.clone().drop_guard();

        let poller = tokio::spawn(
            poll_loop(
                self.account.clone(),
                self.executor.clone(),
                self.timing.poll_interval,
                cancel.clone(),
            )
            .in_current_span(),
        );

        let mut stats = LoopStats::default();
        let exit = self.primary_loop(workflow, &mut stats).await;

        cancel.cancel();
        let polls = match poller.await {
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "Polling task ended abnormally");
                0
            }
        };

        self.transition(exit)?;
        match exit {
            WorkerState::Expired => {
                info!(
                    settle_secs = self.timing.settle_pause.as_secs_f64(),
                    "Active time is over, settling before finishing"
                );
                tokio::time::sleep(self.timing.settle_pause).await;
            }
            _ => {
                warn!(
                    max_retries = self.timing.max_retries,
                    address = %self.account.address(),
                    "Too many consecutive failures, stopping this account"
                );
            }
        }
        self.transition(WorkerState::Terminated)?;

        Ok(WorkerReport {
            address: self.account.address().to_string(),
            exit,
            actions_succeeded: stats.succeeded,
            actions_failed: stats.failed,
            polls,
            elapsed: started.elapsed(),
        })
    }

    async fn primary_loop(&self, workflow: Workflow, stats: &mut LoopStats) -> WorkerState {
        let pacing = self.account.pacing;
        let start = Instant::now();
        let mut retries = 0u32;
        let mut next_pause = Instant::now() + pacing.draw_pause_interval();

        info!(
            budget_secs = pacing.active_duration.as_secs_f64(),
            "Starting action loop"
        );

        while start.elapsed() < pacing.active_duration && retries < self.timing.max_retries {
            match self.executor.execute(&self.account, workflow).await {
                Ok(outcome) => {
                    retries = 0;
                    stats.succeeded += 1;
                    let delay = pacing.draw_delay();
                    debug!(
                        detail = %outcome.detail,
                        delay_secs = delay.as_secs_f64(),
                        "Action done"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    retries += 1;
                    stats.failed += 1;
                    let delay = pacing.draw_delay();
                    warn!(
                        address = %self.account.address(),
                        error = %e,
                        attempt = retries,
                        max = self.timing.max_retries,
                        delay_secs = delay.as_secs_f64(),
                        "Action failed, pausing before retry"
                    );
                    tokio::time::sleep(delay).await;
                }
            }

            if Instant::now() >= next_pause {
                let pause = pacing.draw_pause_duration();
                info!(pause_secs = pause.as_secs_f64(), "Long pause");
                tokio::time::sleep(pause).await;
                next_pause = Instant::now() + pacing.draw_pause_interval();
            }
        }

        if start.elapsed() >= pacing.active_duration {
            WorkerState::Expired
        } else {
            WorkerState::RetryExhausted
        }
    }
}

/// Poll until cancelled. An in-flight poll finishes; no new one starts after cancellation.
async fn poll_loop(
    account: Arc<Account>,
    executor: Arc<dyn ActionExecutor>,
    interval: Duration,
    cancel: CancellationToken,
) -> u64 {
    let mut polls = 0u64;

    while !cancel.is_cancelled() {
        match executor.execute(&account, POLL_ACTION).await {
            Ok(outcome) => debug!(detail = %outcome.detail, "Poll done"),
            Err(e) => warn!(error = %e, "Poll failed"),
        }
        polls += 1;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }

    debug!(polls, "Polling stopped");
    polls
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{test_account, Pacing};
    use crate::error::ExecutionError;
    use crate::executor::{ActionOutcome, MockActionExecutor};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn pacing(budget: Duration, delay: (u64, u64)) -> Pacing {
        Pacing {
            active_duration: budget,
            delay: (Duration::from_secs(delay.0), Duration::from_secs(delay.1)),
            // Long pauses out of reach unless a test says otherwise
            pause_interval: (Duration::from_secs(86_400), Duration::from_secs(86_400)),
            pause_duration: (Duration::from_secs(1), Duration::from_secs(1)),
        }
    }

    /// Succeeds (or fails) instantly and counts calls per action
    #[derive(Default)]
    struct CountingExecutor {
        fail_primary: bool,
        primary: AtomicU64,
        polls: AtomicU64,
    }

    #[async_trait]
    impl ActionExecutor for CountingExecutor {
        async fn execute(
            &self,
            _account: &Account,
            action: Workflow,
        ) -> std::result::Result<ActionOutcome, ExecutionError> {
            if action == POLL_ACTION {
                self.polls.fetch_add(1, Ordering::SeqCst);
                return Ok(ActionOutcome::new("points"));
            }
            self.primary.fetch_add(1, Ordering::SeqCst);
            if self.fail_primary {
                Err(ExecutionError::Transport("connection reset".into()))
            } else {
                Ok(ActionOutcome::new("sig"))
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_failing_stops_after_exactly_max_retries() {
        let executor = Arc::new(CountingExecutor {
            fail_primary: true,
            ..Default::default()
        });
        let account = Arc::new(test_account(pacing(Duration::from_secs(3600 * 24), (1, 2))));

        let worker = AccountWorker::new(account, executor.clone(), WorkerTiming::default());
        let report = worker.run(Workflow::Click).await.unwrap();

        assert_eq!(report.exit, WorkerState::RetryExhausted);
        assert_eq!(report.actions_failed, 3);
        assert_eq!(executor.primary.load(Ordering::SeqCst), 3);
        assert!(report.elapsed < Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_retry_counter() {
        let mut mock = MockActionExecutor::new();
        let mut seq = 0u32;
        mock.expect_execute()
            .withf(|_, action| *action == Workflow::Click)
            .returning(move |_, _| {
                seq += 1;
                // fail, fail, ok, fail, fail, ok, ... never three in a row
                if seq % 3 == 0 {
                    Ok(ActionOutcome::new("sig"))
                } else {
                    Err(ExecutionError::Transport("flaky".into()))
                }
            });
        mock.expect_execute()
            .withf(|_, action| *action == POLL_ACTION)
            .returning(|_, _| Ok(ActionOutcome::default()));

        let executor: Arc<dyn ActionExecutor> = Arc::new(mock);
        let account = Arc::new(test_account(pacing(Duration::from_secs(60), (1, 1))));
        let report = AccountWorker::new(account, executor, WorkerTiming::default())
            .run(Workflow::Click)
            .await
            .unwrap();

        assert_eq!(report.exit, WorkerState::Expired);
        assert!(report.actions_succeeded > 0);
        assert!(report.actions_failed > 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_lands_within_budget_window() {
        let executor = Arc::new(CountingExecutor::default());
        let budget = Duration::from_secs(60);
        let account = Arc::new(test_account(pacing(budget, (1, 2))));
        let timing = WorkerTiming::default();

        let start = Instant::now();
        let report = AccountWorker::new(account, executor.clone(), timing)
            .run(Workflow::Click)
            .await
            .unwrap();
        let elapsed = start.elapsed();

        assert_eq!(report.exit, WorkerState::Expired);
        assert!(elapsed >= budget + timing.settle_pause, "{elapsed:?}");
        assert!(
            elapsed <= budget + Duration::from_secs(2) + timing.settle_pause,
            "{elapsed:?}"
        );
        assert!(executor.primary.load(Ordering::SeqCst) >= 30);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_stops_with_primary_loop() {
        let executor = Arc::new(CountingExecutor::default());
        let account = Arc::new(test_account(pacing(Duration::from_secs(45), (1, 1))));

        let report = AccountWorker::new(account, executor.clone(), WorkerTiming::default())
            .run(Workflow::Click)
            .await
            .unwrap();

        let polls_at_exit = executor.polls.load(Ordering::SeqCst);
        assert!(polls_at_exit >= 4, "polled {polls_at_exit} times");
        assert_eq!(report.polls, polls_at_exit);

        tokio::time::sleep(POLL_INTERVAL * 5).await;
        assert_eq!(executor.polls.load(Ordering::SeqCst), polls_at_exit);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_failures_do_not_count_against_retries() {
        let mut mock = MockActionExecutor::new();
        mock.expect_execute()
            .withf(|_, action| *action == POLL_ACTION)
            .returning(|_, _| Err(ExecutionError::Unauthorized("expired".into())));
        mock.expect_execute()
            .withf(|_, action| *action == Workflow::Click)
            .returning(|_, _| Ok(ActionOutcome::new("sig")));

        let executor: Arc<dyn ActionExecutor> = Arc::new(mock);
        let account = Arc::new(test_account(pacing(Duration::from_secs(120), (1, 3))));
        let report = AccountWorker::new(account, executor, WorkerTiming::default())
            .run(Workflow::Click)
            .await
            .unwrap();

        assert_eq!(report.exit, WorkerState::Expired);
        assert_eq!(report.actions_failed, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_long_pause_fires_when_deadline_passes() {
        let executor = Arc::new(CountingExecutor::default());
        let account = Arc::new(test_account(Pacing {
            active_duration: Duration::from_secs(100),
            delay: (Duration::from_secs(1), Duration::from_secs(1)),
            pause_interval: (Duration::from_secs(10), Duration::from_secs(10)),
            pause_duration: (Duration::from_secs(40), Duration::from_secs(40)),
        }));

        AccountWorker::new(account, executor.clone(), WorkerTiming::default())
            .run(Workflow::Click)
            .await
            .unwrap();

        // Two pauses of 40s eat most of the 100s budget: roughly 10 + 10 + ~10 actions
        let actions = executor.primary.load(Ordering::SeqCst);
        assert!((15..=40).contains(&actions), "{actions} actions");
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_shot_runs_exactly_once_without_polling() {
        let mut mock = MockActionExecutor::new();
        mock.expect_execute()
            .withf(|_, action| *action == Workflow::Deposit)
            .times(1)
            .returning(|_, _| Ok(ActionOutcome::new("tx")));

        let executor: Arc<dyn ActionExecutor> = Arc::new(mock);
        let account = Arc::new(test_account(pacing(Duration::from_secs(60), (1, 2))));
        let report = AccountWorker::new(account, executor, WorkerTiming::default())
            .run(Workflow::Deposit)
            .await
            .unwrap();

        assert_eq!(report.exit, WorkerState::Completed);
        assert_eq!(report.polls, 0);
    }

    #[tokio::test]
    async fn test_one_shot_failure_propagates_without_retry() {
        let mut mock = MockActionExecutor::new();
        mock.expect_execute()
            .times(1)
            .returning(|_, _| Err(ExecutionError::Rejected { status: 500, body: "boom".into() }));

        let executor: Arc<dyn ActionExecutor> = Arc::new(mock);
        let account = Arc::new(test_account(pacing(Duration::from_secs(60), (1, 2))));
        let err = AccountWorker::new(account, executor, WorkerTiming::default())
            .run(Workflow::Points)
            .await
            .unwrap_err();

        assert!(matches!(err, TapfleetError::Execution(ExecutionError::Rejected { .. })));
    }

    #[test]
    fn test_worker_rejects_invalid_transition() {
        let account = Arc::new(test_account(pacing(Duration::from_secs(1), (1, 1))));
        let executor: Arc<dyn ActionExecutor> = Arc::new(CountingExecutor::default());
        let mut worker = AccountWorker::new(account, executor, WorkerTiming::default());

        assert_eq!(worker.state(), WorkerState::Idle);
        assert!(worker.transition(WorkerState::Terminated).is_err());
        assert!(worker.transition(WorkerState::Running).is_ok());
        assert!(worker.transition(WorkerState::Idle).is_err());
    }

    #[test]
    fn test_worker_passes_through_exit_state_before_terminating() {
        let account = Arc::new(test_account(pacing(Duration::from_secs(1), (1, 1))));
        let executor: Arc<dyn ActionExecutor> = Arc::new(CountingExecutor::default());
        let mut worker = AccountWorker::new(account, executor, WorkerTiming::default());

        worker.transition(WorkerState::Running).unwrap();
        assert!(worker.transition(WorkerState::Terminated).is_err());
        worker.transition(WorkerState::Failed).unwrap();
        assert!(worker.state().is_exit());
        worker.transition(WorkerState::Terminated).unwrap();
        assert!(!worker.state().is_exit());
        assert!(worker.state().is_terminal());
    }
}
