use crate::signing::Keypair;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// First line of the login challenge
pub const LOGIN_MESSAGE_PREFIX: &str = "Login to Eclipse";

/// Signed login payload posted to the login endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoginRequest {
    pub signed_message: String,
    pub original_message: String,
    pub public_key: String,
}

/// Build the plain-text login challenge for a moment in time
pub fn login_message(now: DateTime<Utc>) -> String {
    format!(
        "{}\nDate: {}\nTimestamp: {}",
        LOGIN_MESSAGE_PREFIX,
        now.format("%Y-%m-%d %H:%M:%S"),
        now.timestamp_millis()
    )
}

/// Sign the login challenge with the account's primary keypair
pub fn build_login_request(keypair: &Keypair, now: DateTime<Utc>) -> LoginRequest {
    let original_message = login_message(now);
    let signed_message = keypair.sign_base58(original_message.as_bytes());

    LoginRequest {
        signed_message,
        original_message,
        public_key: keypair.address().to_string(),
    }
}
