use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::TapfleetError;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub run: RunConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub dry_run: DryRunConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Pacing and concurrency parameters shared read-only by every worker
#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    /// Maximum accounts processed at the same time
    pub max_threads: usize,
    /// Minimum delay between primary actions (seconds)
    pub min_delay: f64,
    /// Maximum delay between primary actions (seconds)
    pub max_delay: f64,
    /// Minimum active duration per account (minutes)
    pub min_time_work: f64,
    /// Maximum active duration per account (minutes)
    pub max_time_work: f64,
    /// Interval between long pauses, (min, max) seconds
    pub pause_range: (f64, f64),
    /// Duration of a long pause, (min, max) seconds
    pub pause_time: (f64, f64),
    /// Multiplier for the deposit workflow
    #[serde(default = "default_deposit_count")]
    pub deposit_count: u64,
}

fn default_deposit_count() -> u64 {
    1
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_threads: 5,
            min_delay: 1.0,
            max_delay: 3.0,
            min_time_work: 30.0,
            max_time_work: 60.0,
            pause_range: (300.0, 600.0),
            pause_time: (30.0, 90.0),
            deposit_count: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PathsConfig {
    /// Directory holding key files, proxies and the persisted credential map
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl PathsConfig {
    pub fn primary_secrets(&self) -> PathBuf {
        self.data_dir.join("svmWallets.txt")
    }

    pub fn secondary_secrets(&self) -> PathBuf {
        self.data_dir.join("tap_wallets.json")
    }

    pub fn proxies(&self) -> PathBuf {
        self.data_dir.join("proxy.txt")
    }

    pub fn credential_store(&self) -> PathBuf {
        self.data_dir.join("walletConfig.json")
    }

    pub fn statistics(&self) -> PathBuf {
        self.data_dir.join("statistics.csv")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the remote tap service
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout in milliseconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_login_path")]
    pub login_path: String,
    #[serde(default = "default_handles_path")]
    pub handles_path: String,
    #[serde(default = "default_points_path")]
    pub points_path: String,
    /// Page sent as `Referer`
    #[serde(default = "default_referer_path")]
    pub referer_path: String,
}

fn default_base_url() -> String {
    "https://tap.eclipse.xyz".to_string()
}

fn default_request_timeout() -> u64 {
    15_000
}

fn default_login_path() -> String {
    "/api/eclipse/user/login".to_string()
}

fn default_handles_path() -> String {
    "/api/handles".to_string()
}

fn default_points_path() -> String {
    "/api/eclipse/user/points".to_string()
}

fn default_referer_path() -> String {
    "/onboarding/domain-setup".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_ms: default_request_timeout(),
            login_path: default_login_path(),
            handles_path: default_handles_path(),
            points_path: default_points_path(),
            referer_path: default_referer_path(),
        }
    }
}

impl ApiConfig {
    /// Absolute URL for an endpoint path
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct DryRunConfig {
    /// Simulate on-chain workflows instead of failing them
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from a config directory plus the data directory's user config.
    /// `data_dir` always ends up as `paths.data_dir`.
    pub fn load_from<P: AsRef<Path>, D: AsRef<Path>>(
        config_dir: P,
        data_dir: D,
    ) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();
        let data_dir = data_dir.as_ref();

        let defaults = RunConfig::default();
        let builder = Config::builder()
            .set_default("run.max_threads", defaults.max_threads as i64)?
            .set_default("run.min_delay", defaults.min_delay)?
            .set_default("run.max_delay", defaults.max_delay)?
            .set_default("run.min_time_work", defaults.min_time_work)?
            .set_default("run.max_time_work", defaults.max_time_work)?
            .set_default(
                "run.pause_range",
                vec![defaults.pause_range.0, defaults.pause_range.1],
            )?
            .set_default(
                "run.pause_time",
                vec![defaults.pause_time.0, defaults.pause_time.1],
            )?
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Historical location, kept next to the key files
            .add_source(File::from(data_dir.join("user_config.json")).required(false))
            // Override with environment variables (TAPFLEET__RUN__MAX_THREADS, etc.)
            .add_source(
                Environment::with_prefix("TAPFLEET")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override("paths.data_dir", data_dir.to_string_lossy().to_string())?;

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = self.run.validate().err().unwrap_or_default();

        if !self.api.base_url.starts_with("http") {
            errors.push(format!("api.base_url is not an http(s) URL: {}", self.api.base_url));
        }

        if self.api.request_timeout_ms == 0 {
            errors.push("api.request_timeout_ms must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl RunConfig {
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.max_threads == 0 {
            errors.push("max_threads must be at least 1".to_string());
        }

        check_range(&mut errors, "delay", self.min_delay, self.max_delay);
        check_range(&mut errors, "time_work", self.min_time_work, self.max_time_work);
        check_range(&mut errors, "pause_range", self.pause_range.0, self.pause_range.1);
        check_range(&mut errors, "pause_time", self.pause_time.0, self.pause_time.1);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn check_range(errors: &mut Vec<String>, name: &str, min: f64, max: f64) {
    if !min.is_finite() || !max.is_finite() || min < 0.0 {
        errors.push(format!("{name} bounds must be finite and non-negative"));
    } else if min > max {
        errors.push(format!("{name} minimum {min} exceeds maximum {max}"));
    }
}

impl From<Vec<String>> for TapfleetError {
    fn from(errors: Vec<String>) -> Self {
        TapfleetError::Configuration(errors.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_run_config_is_valid() {
        assert!(RunConfig::default().validate().is_ok());
    }

    #[test]
    fn test_inverted_ranges_are_reported() {
        let run = RunConfig {
            max_threads: 0,
            min_delay: 5.0,
            max_delay: 1.0,
            pause_time: (10.0, 2.0),
            ..Default::default()
        };

        let errors = run.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors[0].contains("max_threads"));
        assert!(errors.iter().any(|e| e.starts_with("delay")));
        assert!(errors.iter().any(|e| e.starts_with("pause_time")));
    }

    #[test]
    fn test_load_from_missing_dirs_uses_defaults() {
        let dir = std::env::temp_dir().join("tapfleet_config_test_missing");
        let cfg = AppConfig::load_from(dir.join("config"), dir.join("data")).unwrap();

        assert_eq!(cfg.run.max_threads, 5);
        assert_eq!(cfg.run.pause_range, (300.0, 600.0));
        assert_eq!(cfg.paths.data_dir, dir.join("data"));
        assert_eq!(cfg.logging.level, "info");
        assert!(!cfg.dry_run.enabled);
        assert_eq!(
            cfg.api.url(&cfg.api.points_path),
            "https://tap.eclipse.xyz/api/eclipse/user/points"
        );
    }

    #[test]
    fn test_load_from_toml_overrides() {
        let dir = std::env::temp_dir().join(format!(
            "tapfleet_config_test_{}",
            std::process::id()
        ));
        let config_dir = dir.join("config");
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::write(
            config_dir.join("default.toml"),
            "[run]\nmax_threads = 2\nmin_delay = 0.5\nmax_delay = 1.5\npause_range = [10, 20]\n\n[dry_run]\nenabled = true\n",
        )
        .unwrap();

        let cfg = AppConfig::load_from(&config_dir, dir.join("data")).unwrap();
        assert_eq!(cfg.run.max_threads, 2);
        assert_eq!(cfg.run.min_delay, 0.5);
        assert_eq!(cfg.run.pause_range, (10.0, 20.0));
        assert!(cfg.dry_run.enabled);
        assert!(cfg.validate().is_ok());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_data_dir_argument_beats_file_value() {
        let dir = std::env::temp_dir().join(format!(
            "tapfleet_config_data_dir_{}",
            std::process::id()
        ));
        let config_dir = dir.join("config");
        let data_dir = dir.join("accounts_b");
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::create_dir_all(&data_dir).unwrap();
        std::fs::write(config_dir.join("default.toml"), "[paths]\ndata_dir = \"data\"\n").unwrap();
        std::fs::write(data_dir.join("user_config.json"), r#"{"paths": {"data_dir": "elsewhere"}}"#)
            .unwrap();

        let cfg = AppConfig::load_from(&config_dir, &data_dir).unwrap();
        assert_eq!(cfg.paths.data_dir, data_dir);
        assert_eq!(cfg.paths.credential_store().parent(), Some(data_dir.as_path()));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
