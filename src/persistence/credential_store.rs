//! Persisted per-account credential map
//!
//! The map lives in a single JSON file keyed by primary address. Every write
//! replaces the whole file (temp file + rename), and every read-modify-write
//! runs under the store's mutex so concurrent workers never interleave updates.

use crate::domain::{Account, Session};
use crate::error::{Result, TapfleetError};
use crate::signing::{Keypair, SECRET_KEY_LEN};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Persisted map, ordered by address for stable file output
pub type CredentialMap = BTreeMap<String, CredentialEntry>;

/// Persisted record for one primary address
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialEntry {
    /// Base58 encoded 64 byte primary secret
    pub sol_private_key: String,
    pub sol_address: String,
    #[serde(default)]
    pub proxy: String,
    /// Secondary (tap) address
    #[serde(default)]
    pub tap_wallet: String,
    /// Secondary secret as a 64 element byte array
    #[serde(default)]
    pub tap_private_key: Vec<u8>,
    /// Discord id; 0 when unresolved. Older files stored it as a string.
    #[serde(default, deserialize_with = "deserialize_discord")]
    pub discord_name: u64,
    #[serde(default)]
    pub twitter_name: String,
    /// Bearer token; empty when not yet obtained
    #[serde(default)]
    pub jwt: String,
    #[serde(default)]
    pub platform: String,
    #[serde(default)]
    pub secchua: String,
    #[serde(default)]
    pub cookie: String,
    #[serde(default)]
    pub user_agent: String,
}

// Custom Debug to never leak secrets into logs or error messages.
impl std::fmt::Debug for CredentialEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialEntry")
            .field("sol_private_key", &"[REDACTED]")
            .field("sol_address", &self.sol_address)
            .field("proxy", &self.proxy)
            .field("tap_wallet", &self.tap_wallet)
            .field("tap_private_key", &"[REDACTED]")
            .field("discord_name", &self.discord_name)
            .field("twitter_name", &self.twitter_name)
            .field("jwt", &(!self.jwt.is_empty()).then_some("[REDACTED]"))
            .field("platform", &self.platform)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

fn deserialize_discord<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n.as_u64().unwrap_or(0),
        serde_json::Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    })
}

impl CredentialEntry {
    /// Session fields carried by this entry; empty values read as unset
    pub fn session(&self) -> Session {
        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());
        Session {
            auth_token: non_empty(&self.jwt),
            discord_id: (self.discord_name != 0).then_some(self.discord_name),
            twitter_handle: non_empty(&self.twitter_name),
            cookie: non_empty(&self.cookie),
        }
    }

    /// Copy auxiliary fields (handles, token, fingerprint, cookie) from a prior entry
    fn inherit_auxiliary(&mut self, prior: &CredentialEntry) {
        self.discord_name = prior.discord_name;
        self.twitter_name = prior.twitter_name.clone();
        self.jwt = prior.jwt.clone();
        self.platform = prior.platform.clone();
        self.secchua = prior.secchua.clone();
        self.cookie = prior.cookie.clone();
        self.user_agent = prior.user_agent.clone();
    }

    /// Entry mirroring an account's live state
    pub fn from_account(account: &Account, session: &Session) -> Self {
        Self {
            sol_private_key: account.primary.to_base58(),
            sol_address: account.address().to_string(),
            proxy: account.proxy.clone(),
            tap_wallet: account.secondary.address().to_string(),
            tap_private_key: account.secondary.secret_bytes().to_vec(),
            discord_name: session.discord_id.unwrap_or(0),
            twitter_name: session.twitter_handle.clone().unwrap_or_default(),
            jwt: session.auth_token.clone().unwrap_or_default(),
            platform: account.fingerprint.platform.clone(),
            secchua: account.fingerprint.sec_ch_ua.clone(),
            cookie: session.cookie.clone().unwrap_or_default(),
            user_agent: account.fingerprint.user_agent.clone(),
        }
    }
}

/// Sole writer of the persisted credential file
pub struct CredentialStore {
    path: PathBuf,
    /// Serializes every load-merge-persist against the file
    write_lock: Mutex<()>,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted map. A missing file is an empty map; a corrupt one is an error.
    pub async fn load(&self) -> Result<CredentialMap> {
        read_map(&self.path).await
    }

    /// Replace the persisted file with `map`
    pub async fn persist(&self, map: &CredentialMap) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        write_map(&self.path, map).await?;
        info!(
            path = %self.path.display(),
            entries = map.len(),
            "Credential store saved"
        );
        Ok(())
    }

    /// Re-read the file, replace this account's entry with its live state and write back
    pub async fn save_account(&self, account: &Account) -> Result<()> {
        let session = account.session().await;
        let entry = CredentialEntry::from_account(account, &session);

        let _guard = self.write_lock.lock().await;
        let mut map = read_map(&self.path).await?;
        map.insert(entry.sol_address.clone(), entry);
        write_map(&self.path, &map).await?;

        debug!(address = %account.address(), "Credential entry updated");
        Ok(())
    }

    /// Merge supplied key material with the persisted entry for one address.
    ///
    /// 1. A supplied 64 byte secondary secret is authoritative; auxiliary fields of
    ///    `existing` carry over.
    /// 2. Otherwise a workflow requiring the secondary secret fails for this address.
    /// 3. Otherwise the persisted secondary secret is reused if it is well formed.
    ///
    /// `proxy` is the proxy assigned this run; an empty assignment keeps the persisted one.
    pub fn reconcile(
        primary: &Keypair,
        proxy: &str,
        supplied_secondary: Option<&[u8]>,
        require_secondary: bool,
        existing: Option<&CredentialEntry>,
    ) -> Result<(CredentialEntry, Keypair)> {
        let address = primary.address();

        if let Some(secret) = supplied_secondary.filter(|s| s.len() == SECRET_KEY_LEN) {
            let secondary = Keypair::from_secret_bytes(secret).map_err(|e| {
                TapfleetError::Configuration(format!(
                    "secondary secret for {} is invalid: {}",
                    address, e
                ))
            })?;

            let mut entry = CredentialEntry {
                sol_private_key: primary.to_base58(),
                sol_address: address.to_string(),
                proxy: proxy.to_string(),
                tap_wallet: secondary.address().to_string(),
                tap_private_key: secret.to_vec(),
                ..Default::default()
            };
            if let Some(prior) = existing {
                entry.inherit_auxiliary(prior);
                if proxy.is_empty() {
                    entry.proxy = prior.proxy.clone();
                }
            }
            return Ok((entry, secondary));
        }

        if require_secondary {
            return Err(TapfleetError::Configuration(format!(
                "secondary private key required for account {} but not provided in input",
                address
            )));
        }

        let prior = existing
            .filter(|e| e.tap_private_key.len() == SECRET_KEY_LEN)
            .ok_or_else(|| {
                TapfleetError::Configuration(format!(
                    "secondary private key not provided for account {} and no valid persisted entry",
                    address
                ))
            })?;

        let secondary = Keypair::from_secret_bytes(&prior.tap_private_key).map_err(|e| {
            TapfleetError::Configuration(format!(
                "persisted secondary secret for {} is invalid: {}",
                address, e
            ))
        })?;

        let mut entry = prior.clone();
        entry.sol_private_key = primary.to_base58();
        entry.sol_address = address.to_string();
        entry.tap_wallet = secondary.address().to_string();
        if !proxy.is_empty() {
            entry.proxy = proxy.to_string();
        }
        Ok((entry, secondary))
    }
}

async fn read_map(path: &Path) -> Result<CredentialMap> {
    let s = match tokio::fs::read_to_string(path).await {
        Ok(v) => v,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(CredentialMap::new()),
        Err(e) => return Err(TapfleetError::Io(e)),
    };
    if s.trim().is_empty() {
        return Ok(CredentialMap::new());
    }
    serde_json::from_str(&s).map_err(|e| {
        TapfleetError::Storage(format!(
            "credential store {} is unreadable: {}",
            path.display(),
            e
        ))
    })
}

async fn write_map(path: &Path, map: &CredentialMap) -> Result<()> {
    let storage_err = |e: std::io::Error| {
        TapfleetError::Storage(format!("failed to write {}: {}", path.display(), e))
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(storage_err)?;
    }
    let tmp = path.with_extension("json.tmp");
    let body = serde_json::to_string_pretty(map)?;
    tokio::fs::write(&tmp, body).await.map_err(storage_err)?;
    tokio::fs::rename(&tmp, path).await.map_err(storage_err)?;
    Ok(())
}
