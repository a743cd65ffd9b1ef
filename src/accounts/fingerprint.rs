//! Browser fingerprint, tracing header and cookie generation

use crate::domain::{Fingerprint, TraceContext};
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::json;

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/129.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
];

/// (platform keyword in the user agent, sec-ch-ua value)
const CLIENT_HINTS: &[(&str, &str)] = &[
    (
        "Macintosh",
        "\"Google Chrome\";v=\"131\", \"Chromium\";v=\"131\", \"Not_A Brand\";v=\"24\"",
    ),
    (
        "Windows",
        "\"Google Chrome\";v=\"131\", \"Chromium\";v=\"131\", \"Not_A Brand\";v=\"24\"",
    ),
    (
        "Linux",
        "\"Chromium\";v=\"131\", \"Not_A Brand\";v=\"24\"",
    ),
];

pub const UNKNOWN_PLATFORM: &str = "Unknown";

const BAGGAGE_TEMPLATE: &str = "sentry-environment=production,sentry-release=b9fc0231392f5ac159ebaf76ff78f300da6710a8,sentry-public_key=68e4befd97ceedd9595fdc77e4e48267";

pub fn random_user_agent() -> String {
    USER_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(USER_AGENTS[0])
        .to_string()
}

/// Client hints matching the user agent's OS; a random set when no OS is recognized
pub fn client_hints_for(user_agent: &str) -> (String, String) {
    for (platform, hints) in CLIENT_HINTS {
        if user_agent.contains(platform) {
            return (hints.to_string(), platform.to_string());
        }
    }

    let (_, hints) = CLIENT_HINTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(CLIENT_HINTS[0]);
    (hints.to_string(), UNKNOWN_PLATFORM.to_string())
}

/// Keep persisted fingerprint fields, generating whatever is missing
pub fn complete_fingerprint(user_agent: &str, sec_ch_ua: &str, platform: &str) -> Fingerprint {
    let user_agent = if user_agent.is_empty() {
        random_user_agent()
    } else {
        user_agent.to_string()
    };

    let (sec_ch_ua, platform) = if sec_ch_ua.is_empty() || platform.is_empty() {
        client_hints_for(&user_agent)
    } else {
        (sec_ch_ua.to_string(), platform.to_string())
    };

    Fingerprint {
        user_agent,
        sec_ch_ua,
        platform,
    }
}

/// Fresh trace/span ids with matching `sentry-trace` and baggage values
pub fn new_trace_context() -> TraceContext {
    let mut rng = rand::thread_rng();
    let trace_id = hex::encode(rng.gen::<[u8; 16]>());
    let span_id = hex::encode(rng.gen::<[u8; 8]>());

    TraceContext {
        sentry_trace: format!("{}-{}-1", trace_id, span_id),
        baggage: format!(
            "{},sentry-trace_id={},sentry-sample_rate=1,sentry-sampled=true",
            BAGGAGE_TEMPLATE, trace_id
        ),
        trace_id,
        span_id,
    }
}

/// Cookie layouts a browser session may present
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CookieStyle {
    WalletTokensAndDomains,
    DomainsOnly,
    WalletTokensOnly,
}

impl CookieStyle {
    const ALL: [CookieStyle; 3] = [
        CookieStyle::WalletTokensAndDomains,
        CookieStyle::DomainsOnly,
        CookieStyle::WalletTokensOnly,
    ];

    pub fn random() -> Self {
        *Self::ALL
            .choose(&mut rand::thread_rng())
            .unwrap_or(&CookieStyle::WalletTokensOnly)
    }
}

/// Build a session cookie for an address in the given style
pub fn build_cookie(style: CookieStyle, address: &str, auth_token: &str, twitter: &str) -> String {
    let wallet_tokens = json!({ address: auth_token });
    let domains = json!({
        format!("{}:turbo", address): [{
            "nameAccount": address,
            "domain": format!("{}.turbo", twitter),
        }]
    });

    let wallet_cookie = format!(
        "wallet_tokens_eclipse={}; path=/; Secure; HttpOnly",
        urlencoding::encode(&wallet_tokens.to_string())
    );
    let domains_cookie = format!(
        "user_domains_cache={}; path=/; Secure; HttpOnly",
        urlencoding::encode(&domains.to_string())
    );

    match style {
        CookieStyle::WalletTokensAndDomains => format!("{}; {}", wallet_cookie, domains_cookie),
        CookieStyle::DomainsOnly => domains_cookie,
        CookieStyle::WalletTokensOnly => wallet_cookie,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_hints_follow_user_agent_os() {
        let (hints, platform) = client_hints_for(USER_AGENTS[2]);
        assert_eq!(platform, "Macintosh");
        assert!(hints.contains("Google Chrome"));

        let (_, platform) = client_hints_for("curl/8.0");
        assert_eq!(platform, UNKNOWN_PLATFORM);
    }

    #[test]
    fn test_complete_fingerprint_keeps_persisted_values() {
        let fp = complete_fingerprint("UA", "hints", "Linux");
        assert_eq!(fp.user_agent, "UA");
        assert_eq!(fp.sec_ch_ua, "hints");
        assert_eq!(fp.platform, "Linux");

        let fp = complete_fingerprint("", "", "");
        assert!(USER_AGENTS.contains(&fp.user_agent.as_str()));
        assert!(!fp.sec_ch_ua.is_empty());
        assert_ne!(fp.platform, UNKNOWN_PLATFORM);
    }

    #[test]
    fn test_trace_context_shape() {
        let a = new_trace_context();
        let b = new_trace_context();

        assert_eq!(a.trace_id.len(), 32);
        assert_eq!(a.span_id.len(), 16);
        assert_eq!(a.sentry_trace, format!("{}-{}-1", a.trace_id, a.span_id));
        assert!(a.baggage.contains(&format!("sentry-trace_id={}", a.trace_id)));
        assert_ne!(a.trace_id, b.trace_id);
    }

    #[test]
    fn test_cookie_styles() {
        let both = build_cookie(CookieStyle::WalletTokensAndDomains, "Addr", "jwt", "me");
        assert!(both.starts_with("wallet_tokens_eclipse="));
        assert!(both.contains("; user_domains_cache="));

        let domains = build_cookie(CookieStyle::DomainsOnly, "Addr", "jwt", "me");
        assert!(domains.starts_with("user_domains_cache="));
        assert!(domains.contains(&*urlencoding::encode("me.turbo")));

        let tokens = build_cookie(CookieStyle::WalletTokensOnly, "Addr", "jwt", "me");
        assert!(!tokens.contains("user_domains_cache"));
        assert!(tokens.contains(&*urlencoding::encode("{\"Addr\":\"jwt\"}")));
    }
}
