use crate::signing::Keypair;
use rand::Rng;
use std::time::Duration;
use tokio::sync::RwLock;

/// Browser fingerprint presented on every request; stable across runs once persisted
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Fingerprint {
    pub user_agent: String,
    pub sec_ch_ua: String,
    pub platform: String,
}

/// Distributed tracing headers, regenerated on every account construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceContext {
    pub trace_id: String,
    pub span_id: String,
    /// `sentry-trace` header value: `{trace_id}-{span_id}-1`
    pub sentry_trace: String,
    pub baggage: String,
}

/// Mutable authorization state, filled in lazily while the account runs
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Session {
    pub auth_token: Option<String>,
    pub discord_id: Option<u64>,
    pub twitter_handle: Option<String>,
    pub cookie: Option<String>,
}

impl Session {
    pub fn has_handles(&self) -> bool {
        self.discord_id.is_some() && self.twitter_handle.is_some()
    }
}

/// Randomized per-account pacing, drawn once at construction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pacing {
    /// Total time the repeating loop may run
    pub active_duration: Duration,
    /// Delay between primary actions, (min, max)
    pub delay: (Duration, Duration),
    /// Time between long pauses, (min, max)
    pub pause_interval: (Duration, Duration),
    /// Length of a long pause, (min, max)
    pub pause_duration: (Duration, Duration),
}

impl Pacing {
    pub fn draw_delay(&self) -> Duration {
        uniform_duration(self.delay.0, self.delay.1)
    }

    pub fn draw_pause_interval(&self) -> Duration {
        uniform_duration(self.pause_interval.0, self.pause_interval.1)
    }

    pub fn draw_pause_duration(&self) -> Duration {
        uniform_duration(self.pause_duration.0, self.pause_duration.1)
    }
}

/// Uniform draw in `[min, max]`; collapses to `min` for empty or inverted ranges
pub fn uniform_duration(min: Duration, max: Duration) -> Duration {
    if max <= min {
        return min;
    }
    let secs = rand::thread_rng().gen_range(min.as_secs_f64()..=max.as_secs_f64());
    Duration::from_secs_f64(secs)
}

/// One credential-bearing identity, owned by a single worker for a run
#[derive(Debug)]
pub struct Account {
    pub primary: Keypair,
    pub secondary: Keypair,
    pub proxy: String,
    pub fingerprint: Fingerprint,
    pub trace: TraceContext,
    pub pacing: Pacing,
    pub deposit_count: u64,
    session: RwLock<Session>,
}

impl Account {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        primary: Keypair,
        secondary: Keypair,
        proxy: String,
        fingerprint: Fingerprint,
        trace: TraceContext,
        pacing: Pacing,
        deposit_count: u64,
        session: Session,
    ) -> Self {
        Self {
            primary,
            secondary,
            proxy,
            fingerprint,
            trace,
            pacing,
            deposit_count,
            session: RwLock::new(session),
        }
    }

    /// Primary address; the join key with the persisted credential map
    pub fn address(&self) -> &str {
        self.primary.address()
    }

    /// Snapshot of the current session
    pub async fn session(&self) -> Session {
        self.session.read().await.clone()
    }

    /// Mutate the session in place
    pub async fn update_session<F>(&self, f: F)
    where
        F: FnOnce(&mut Session),
    {
        let mut session = self.session.write().await;
        f(&mut session);
    }
}

/// Short address form for log lines
pub fn short_address(address: &str) -> &str {
    address.get(..8).unwrap_or(address)
}

#[cfg(test)]
pub(crate) fn test_account(pacing: Pacing) -> Account {
    Account::new(
        Keypair::generate(),
        Keypair::generate(),
        String::new(),
        Fingerprint::default(),
        TraceContext {
            trace_id: "a".repeat(32),
            span_id: "b".repeat(16),
            sentry_trace: format!("{}-{}-1", "a".repeat(32), "b".repeat(16)),
            baggage: String::new(),
        },
        pacing,
        1,
        Session::default(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_account() -> Account {
        test_account(Pacing {
            active_duration: Duration::from_secs(60),
            delay: (Duration::from_secs(1), Duration::from_secs(2)),
            pause_interval: (Duration::from_secs(10), Duration::from_secs(20)),
            pause_duration: (Duration::from_secs(1), Duration::from_secs(2)),
        })
    }

    #[tokio::test]
    async fn test_session_updates_are_visible() {
        let acc = sample_account();
        assert!(acc.session().await.auth_token.is_none());

        acc.update_session(|s| {
            s.auth_token = Some("jwt".into());
            s.discord_id = Some(42);
        })
        .await;

        let session = acc.session().await;
        assert_eq!(session.auth_token.as_deref(), Some("jwt"));
        assert!(!session.has_handles());
    }

    #[test]
    fn test_uniform_duration_stays_in_range() {
        let lo = Duration::from_millis(200);
        let hi = Duration::from_millis(900);
        for _ in 0..200 {
            let d = uniform_duration(lo, hi);
            assert!(d >= lo && d <= hi, "{d:?}");
        }
        assert_eq!(uniform_duration(hi, lo), hi);
        assert_eq!(uniform_duration(lo, lo), lo);
    }

    #[test]
    fn test_short_address() {
        assert_eq!(short_address("ABCDEFGHIJK"), "ABCDEFGH");
        assert_eq!(short_address("ABC"), "ABC");
    }
}
