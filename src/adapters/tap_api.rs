//! HTTP executor for the tap service
//!
//! `Points` talks to the remote API: lazy login, lazy handle lookup, session
//! persistence, points fetch and a statistics ledger update. On-chain workflows are
//! simulated in dry-run mode and reported as unsupported otherwise.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, COOKIE, ORIGIN, REFERER, USER_AGENT};
use reqwest::{Client, Proxy, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::accounts::{build_cookie, CookieStyle};
use crate::config::ApiConfig;
use crate::domain::{short_address, Account, Workflow};
use crate::error::ExecutionError;
use crate::executor::{ActionExecutor, ActionOutcome};
use crate::persistence::{CredentialStore, StatisticsLedger, StatisticsRecord};
use crate::signing::build_login_request;

type ExecResult<T> = std::result::Result<T, ExecutionError>;

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
}

#[derive(Debug, Deserialize)]
struct HandlesResponse {
    #[serde(default)]
    status: String,
    handle: Option<Handles>,
}

#[derive(Debug, Deserialize)]
struct Handles {
    #[serde(default)]
    x: Option<String>,
    #[serde(default)]
    discord: Value,
}

/// Points summary reported by the service
#[derive(Debug, Clone, PartialEq)]
pub struct PointsSummary {
    pub rank: u64,
    pub clicks: u64,
    pub points: f64,
}

pub struct TapApiExecutor {
    api: ApiConfig,
    dry_run: bool,
    store: Arc<CredentialStore>,
    ledger: Arc<StatisticsLedger>,
    /// One client per account, each bound to that account's proxy
    clients: Mutex<HashMap<String, Client>>,
}

impl TapApiExecutor {
    pub fn new(
        api: ApiConfig,
        dry_run: bool,
        store: Arc<CredentialStore>,
        ledger: Arc<StatisticsLedger>,
    ) -> Self {
        Self {
            api,
            dry_run,
            store,
            ledger,
            clients: Mutex::new(HashMap::new()),
        }
    }

    async fn client_for(&self, account: &Account) -> ExecResult<Client> {
        let mut clients = self.clients.lock().await;
        if let Some(client) = clients.get(account.address()) {
            return Ok(client.clone());
        }

        let mut builder = Client::builder()
            .timeout(Duration::from_millis(self.api.request_timeout_ms))
            .user_agent(account.fingerprint.user_agent.clone());
        if !account.proxy.is_empty() {
            let proxy = Proxy::all(normalize_proxy(&account.proxy))
                .map_err(|e| ExecutionError::Transport(format!("invalid proxy: {}", e)))?;
            builder = builder.proxy(proxy);
        }
        let client = builder
            .build()
            .map_err(|e| ExecutionError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        clients.insert(account.address().to_string(), client.clone());
        Ok(client)
    }

    /// Cookie for this account, generated on first use and kept for the run
    async fn cookie_for(&self, account: &Account) -> String {
        let session = account.session().await;
        if let Some(cookie) = session.cookie {
            return cookie;
        }

        let cookie = build_cookie(
            CookieStyle::random(),
            account.address(),
            session.auth_token.as_deref().unwrap_or_default(),
            session.twitter_handle.as_deref().unwrap_or_default(),
        );
        let stored = cookie.clone();
        account.update_session(move |s| s.cookie = Some(stored)).await;
        cookie
    }

    async fn default_headers(&self, account: &Account) -> ExecResult<HeaderMap> {
        let cookie = self.cookie_for(account).await;
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        insert_header(&mut headers, USER_AGENT, &account.fingerprint.user_agent)?;
        insert_header(
            &mut headers,
            HeaderName::from_static("sentry-trace"),
            &account.trace.sentry_trace,
        )?;
        insert_header(
            &mut headers,
            HeaderName::from_static("baggage"),
            &account.trace.baggage,
        )?;
        insert_header(&mut headers, REFERER, &self.api.url(&self.api.referer_path))?;
        insert_header(&mut headers, ORIGIN, &self.api.base_url)?;
        insert_header(&mut headers, COOKIE, &cookie)?;
        Ok(headers)
    }

    async fn post_json(
        &self,
        account: &Account,
        path: &str,
        body: Value,
        extra: Option<(HeaderName, String)>,
    ) -> ExecResult<Value> {
        let client = self.client_for(account).await?;
        let mut headers = self.default_headers(account).await?;
        if let Some((name, value)) = extra {
            insert_header(&mut headers, name, &value)?;
        }

        let url = self.api.url(path);
        let resp = client.post(&url).headers(headers).json(&body).send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ExecutionError::Unauthorized(format!(
                "{} returned {}",
                path, status
            )));
        }

        if !status.is_success() {
            return Err(ExecutionError::Rejected {
                status: status.as_u16(),
                body: truncate(&text, 256),
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&text)
            .map_err(|e| ExecutionError::InvalidResponse(format!("{}: {}", path, e)))
    }

    async fn ensure_logged_in(&self, account: &Account) -> ExecResult<String> {
        if let Some(token) = account.session().await.auth_token {
            return Ok(token);
        }

        let request = build_login_request(&account.primary, Utc::now());
        let body = serde_json::to_value(&request)
            .map_err(|e| ExecutionError::InvalidResponse(e.to_string()))?;
        let value = self
            .post_json(account, &self.api.login_path, body, None)
            .await?;
        let login: LoginResponse = serde_json::from_value(value)
            .map_err(|e| ExecutionError::InvalidResponse(format!("login: {}", e)))?;

        info!(address = %short_address(account.address()), "Logged in");
        let token = login.token.clone();
        account
            .update_session(move |s| s.auth_token = Some(login.token))
            .await;
        Ok(token)
    }

    async fn ensure_handles(&self, account: &Account) -> ExecResult<()> {
        if account.session().await.has_handles() {
            return Ok(());
        }

        let value = self
            .post_json(
                account,
                &self.api.handles_path,
                json!({ "pubkey": account.address() }),
                None,
            )
            .await?;
        let (twitter, discord) = parse_handles(value)?;

        debug!(twitter = %twitter, discord, "Handles resolved");
        account
            .update_session(move |s| {
                s.twitter_handle = Some(twitter);
                s.discord_id = Some(discord);
            })
            .await;
        Ok(())
    }

    async fn points(&self, account: &Account) -> ExecResult<ActionOutcome> {
        let token = self.ensure_logged_in(account).await?;
        self.ensure_handles(account).await?;

        self.store
            .save_account(account)
            .await
            .map_err(|e| ExecutionError::Persistence(e.to_string()))?;

        let result = self
            .post_json(
                account,
                &self.api.points_path,
                json!({}),
                Some((
                    HeaderName::from_static("eclipse-authorization"),
                    format!("Bearer {}", token),
                )),
            )
            .await;

        let value = match result {
            Ok(value) => value,
            Err(e @ ExecutionError::Unauthorized(_)) => {
                // Stale token: log in again on the next attempt
                account.update_session(|s| s.auth_token = None).await;
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        let summary = parse_points(&value)?;
        self.ledger
            .upsert(StatisticsRecord {
                address: account.address().to_string(),
                rank: summary.rank,
                clicks: summary.clicks,
                points: summary.points,
            })
            .await
            .map_err(|e| ExecutionError::Persistence(e.to_string()))?;

        Ok(ActionOutcome::new(format!(
            "rank {} clicks {} points {}",
            summary.rank, summary.clicks, summary.points
        )))
    }

    fn simulate(&self, account: &Account, action: Workflow) -> ActionOutcome {
        let payload = format!(
            "{}:{}:{}",
            action,
            account.deposit_count,
            Utc::now().timestamp_millis()
        );
        let signature = account.secondary.sign_base58(payload.as_bytes());
        info!(
            address = %short_address(account.address()),
            action = %action,
            signature = %signature,
            "Dry run: transaction not submitted"
        );
        ActionOutcome::new(signature)
    }
}

#[async_trait]
impl ActionExecutor for TapApiExecutor {
    async fn execute(&self, account: &Account, action: Workflow) -> ExecResult<ActionOutcome> {
        match action {
            Workflow::Points => self.points(account).await,
            other if self.dry_run => Ok(self.simulate(account, other)),
            other => {
                warn!(action = %other, "On-chain submission is not available");
                Err(ExecutionError::Unsupported(format!(
                    "{} requires on-chain submission; enable dry_run to simulate",
                    other
                )))
            }
        }
    }
}

fn insert_header(headers: &mut HeaderMap, name: HeaderName, value: &str) -> ExecResult<()> {
    let value = HeaderValue::from_str(value)
        .map_err(|e| ExecutionError::Transport(format!("invalid {} header: {}", name, e)))?;
    headers.insert(name, value);
    Ok(())
}

/// Proxies may be listed without a scheme; those are treated as HTTP
fn normalize_proxy(proxy: &str) -> String {
    if proxy.contains("://") {
        proxy.to_string()
    } else {
        format!("http://{}", proxy)
    }
}

fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

fn parse_handles(value: Value) -> ExecResult<(String, u64)> {
    let resp: HandlesResponse = serde_json::from_value(value)
        .map_err(|e| ExecutionError::InvalidResponse(format!("handles: {}", e)))?;

    let handle = match resp.handle {
        Some(handle) if resp.status == "success" => handle,
        _ => {
            return Err(ExecutionError::InvalidResponse(format!(
                "handles lookup returned status '{}'",
                resp.status
            )))
        }
    };

    let discord = match &handle.discord {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .ok_or_else(|| ExecutionError::InvalidResponse("handles: missing discord id".into()))?;

    let twitter = handle
        .x
        .filter(|x| !x.is_empty())
        .ok_or_else(|| ExecutionError::InvalidResponse("handles: missing twitter handle".into()))?;

    Ok((twitter, discord))
}

fn parse_points(value: &Value) -> ExecResult<PointsSummary> {
    let data = value
        .get("data")
        .filter(|d| !d.is_null())
        .ok_or_else(|| ExecutionError::InvalidResponse("points: missing data".into()))?;

    let clicks = match data.get("points_breakdown") {
        Some(breakdown) => breakdown.get("clicks").and_then(Value::as_u64).unwrap_or(0),
        None => {
            warn!("points_breakdown missing from points response");
            0
        }
    };

    Ok(PointsSummary {
        rank: data.get("rank").and_then(Value::as_u64).unwrap_or(0),
        clicks,
        points: data.get("points").and_then(Value::as_f64).unwrap_or(0.0),
    })
}
