//! Account factory
//!
//! Builds the run's accounts from raw key material, proxy assignment, randomized
//! pacing and the persisted credential map, then writes back a credential map
//! scoped to the accounts that were built.

use crate::accounts::fingerprint::{complete_fingerprint, new_trace_context};
use crate::config::RunConfig;
use crate::domain::{uniform_duration, Account, Pacing, Workflow};
use crate::error::{Result, TapfleetError};
use crate::persistence::{CredentialMap, CredentialStore};
use crate::signing::Keypair;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{error, info, warn};

/// Raw inputs for one run; secondary secrets correlate with primary secrets by index
#[derive(Debug, Clone, Default)]
pub struct AccountInputs {
    pub primary_secrets: Vec<String>,
    pub secondary_secrets: Vec<Vec<u8>>,
    pub proxies: Vec<String>,
}

impl AccountInputs {
    /// Round-robin proxy for an index; empty when no proxies are configured
    pub fn proxy_for(&self, index: usize) -> &str {
        if self.proxies.is_empty() {
            ""
        } else {
            &self.proxies[index % self.proxies.len()]
        }
    }
}

/// Build the run's accounts.
///
/// Fatal (whole run): empty primary list, empty secondary list for a workflow that
/// requires it, unreadable credential store, failed write-back.
/// Per account (dropped and logged): undecodable primary secret, duplicate address,
/// failed reconciliation.
pub async fn build_accounts(
    inputs: &AccountInputs,
    store: &CredentialStore,
    run: &RunConfig,
    workflow: Workflow,
) -> Result<Vec<Account>> {
    if inputs.primary_secrets.is_empty() {
        return Err(TapfleetError::Configuration(
            "primary private key list is empty".to_string(),
        ));
    }

    let require_secondary = workflow.requires_secondary_secret();
    if require_secondary && inputs.secondary_secrets.is_empty() {
        return Err(TapfleetError::Configuration(format!(
            "secondary private key list is empty but {} requires it",
            workflow
        )));
    }

    let mut working = store.load().await?;
    let mut accounts = Vec::with_capacity(inputs.primary_secrets.len());
    let mut seen = HashSet::new();

    for (index, secret) in inputs.primary_secrets.iter().enumerate() {
        match build_one(index, secret, inputs, run, require_secondary, &seen, &mut working) {
            Ok(Some(account)) => {
                seen.insert(account.address().to_string());
                accounts.push(account);
            }
            Ok(None) => {}
            Err(e) => {
                error!(index, error = %e, "Failed to build account, dropping it");
            }
        }
    }

    let scoped: CredentialMap = accounts
        .iter()
        .filter_map(|acc| {
            working
                .remove(acc.address())
                .map(|entry| (acc.address().to_string(), entry))
        })
        .collect();
    store.persist(&scoped).await?;

    info!(
        built = accounts.len(),
        requested = inputs.primary_secrets.len(),
        workflow = %workflow,
        "Accounts initialized"
    );
    Ok(accounts)
}

fn build_one(
    index: usize,
    secret: &str,
    inputs: &AccountInputs,
    run: &RunConfig,
    require_secondary: bool,
    seen: &HashSet<String>,
    working: &mut CredentialMap,
) -> Result<Option<Account>> {
    let primary = Keypair::from_base58(secret).map_err(|e| TapfleetError::AccountConstruction {
        address: format!("#{}", index),
        reason: e.to_string(),
    })?;
    let address = primary.address().to_string();
    // A repeated key must not touch the entry of the account already built
    if seen.contains(&address) {
        warn!(index, address = %address, "Duplicate primary key, skipping");
        return Ok(None);
    }

    let supplied = inputs.secondary_secrets.get(index).map(Vec::as_slice);
    let (mut entry, secondary) = CredentialStore::reconcile(
        &primary,
        inputs.proxy_for(index),
        supplied,
        require_secondary,
        working.get(&address),
    )
    .map_err(|e| TapfleetError::AccountConstruction {
        address: address.clone(),
        reason: e.to_string(),
    })?;

    let fingerprint = complete_fingerprint(&entry.user_agent, &entry.secchua, &entry.platform);
    entry.user_agent = fingerprint.user_agent.clone();
    entry.secchua = fingerprint.sec_ch_ua.clone();
    entry.platform = fingerprint.platform.clone();

    let account = Account::new(
        primary,
        secondary,
        entry.proxy.clone(),
        fingerprint,
        new_trace_context(),
        draw_pacing(run),
        run.deposit_count,
        entry.session(),
    );

    working.insert(address, entry);
    Ok(Some(account))
}

fn draw_pacing(run: &RunConfig) -> Pacing {
    let secs = Duration::from_secs_f64;
    Pacing {
        active_duration: uniform_duration(
            secs(run.min_time_work * 60.0),
            secs(run.max_time_work * 60.0),
        ),
        delay: (secs(run.min_delay), secs(run.max_delay)),
        pause_interval: (secs(run.pause_range.0), secs(run.pause_range.1)),
        pause_duration: (secs(run.pause_time.0), secs(run.pause_time.1)),
    }
}
