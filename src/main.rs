use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tapfleet::accounts::{build_accounts, read_lines, read_optional_lines, read_secondary_secrets, AccountInputs};
use tapfleet::cli::{prompt_workflow, Cli, MenuChoice};
use tapfleet::config::{AppConfig, LoggingConfig};
use tapfleet::coordination::Orchestrator;
use tapfleet::domain::Workflow;
use tapfleet::error::TapfleetError;
use tapfleet::persistence::{CredentialStore, StatisticsLedger};
use tapfleet::TapApiExecutor;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Pause between account construction and processing
const STARTUP_PAUSE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load_from(&cli.config_dir, &cli.data_dir)
        .map_err(TapfleetError::from)
        .context("failed to load configuration")?;
    if cli.dry_run {
        config.dry_run.enabled = true;
    }
    if cli.json_logs {
        config.logging.json = true;
    }

    init_logging(&config.logging);

    if let Err(errors) = config.validate() {
        for e in &errors {
            error!("Config error: {}", e);
        }
        return Err(TapfleetError::from(errors).into());
    }

    let workflow = match cli.workflow {
        Some(workflow) => workflow,
        None => match prompt_workflow()? {
            MenuChoice::Run(workflow) => workflow,
            MenuChoice::Exit => {
                info!("Exiting");
                return Ok(());
            }
        },
    };

    tokio::select! {
        result = run(config, workflow) => result,
        _ = shutdown_signal() => {
            warn!("Interrupted, stopping without waiting for accounts");
            Ok(())
        }
    }
}

async fn run(config: AppConfig, workflow: Workflow) -> anyhow::Result<()> {
    let paths = &config.paths;
    info!(
        workflow = %workflow,
        data_dir = %paths.data_dir.display(),
        dry_run = config.dry_run.enabled,
        "Starting run"
    );

    let inputs = AccountInputs {
        primary_secrets: read_lines(&paths.primary_secrets()).await?,
        secondary_secrets: read_secondary_secrets(&paths.secondary_secrets()).await,
        proxies: read_optional_lines(&paths.proxies()).await?,
    };

    let store = Arc::new(CredentialStore::new(paths.credential_store()));
    let accounts = build_accounts(&inputs, &store, &config.run, workflow).await?;
    if accounts.is_empty() {
        warn!("No usable accounts, nothing to do");
        return Ok(());
    }

    info!(
        accounts = accounts.len(),
        pause_secs = STARTUP_PAUSE.as_secs(),
        "Accounts ready"
    );
    tokio::time::sleep(STARTUP_PAUSE).await;

    let ledger = Arc::new(StatisticsLedger::new(paths.statistics()));
    let executor = Arc::new(TapApiExecutor::new(
        config.api.clone(),
        config.dry_run.enabled,
        store,
        ledger,
    ));

    let summary = Orchestrator::new(executor, config.run.max_threads)
        .process_accounts(accounts, workflow)
        .await;

    info!(
        total = summary.total(),
        completed = summary.completed,
        failed = summary.failed,
        skipped = summary.skipped,
        "Run finished"
    );
    Ok(())
}

fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},tapfleet=debug", logging.level)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
