//! Application configuration structs
//!
//! Loads configuration from environment variables (with a `.env` file
//! picked up when present). Every tunable has a default, so an empty
//! environment yields a working configuration.

use serde::Deserialize;
use std::env;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app: AppSettings,
    pub sync: SyncConfig,
    pub verification: VerificationConfig,
}

/// General application settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_env")]
    pub env: Environment,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }
}

/// Send pipeline and realtime sync tunables
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Window within which an identical (content, conversation) send is
    /// silently dropped as a duplicate
    #[serde(default = "default_dedup_window_ms")]
    pub dedup_window_ms: u64,
    /// Maximum retained recent-acceptance entries
    #[serde(default = "default_dedup_capacity")]
    pub dedup_capacity: usize,
    /// Trailing-edge debounce interval for the send trigger
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Upper bound for an optimistic entry to remain unreconciled
    #[serde(default = "default_watchdog_ms")]
    pub watchdog_ms: u64,
    /// First delay of the reconnect backoff (doubles up to the ceiling)
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    /// Backoff ceiling
    #[serde(default = "default_backoff_ceiling_ms")]
    pub backoff_ceiling_ms: u64,
}

impl SyncConfig {
    #[must_use]
    pub fn dedup_window(&self) -> Duration {
        Duration::from_millis(self.dedup_window_ms)
    }

    #[must_use]
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    #[must_use]
    pub fn watchdog(&self) -> Duration {
        Duration::from_millis(self.watchdog_ms)
    }

    #[must_use]
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    #[must_use]
    pub fn backoff_ceiling(&self) -> Duration {
        Duration::from_millis(self.backoff_ceiling_ms)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            dedup_window_ms: default_dedup_window_ms(),
            dedup_capacity: default_dedup_capacity(),
            debounce_ms: default_debounce_ms(),
            watchdog_ms: default_watchdog_ms(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_ceiling_ms: default_backoff_ceiling_ms(),
        }
    }
}

/// Verification challenge tunables
#[derive(Debug, Clone, Deserialize)]
pub struct VerificationConfig {
    #[serde(default = "default_code_len")]
    pub code_len: usize,
    /// Validity window of an issued code, in minutes
    #[serde(default = "default_validity_mins")]
    pub validity_mins: i64,
    /// Interval between completion polls
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Interval between expiry sweeps
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
    /// Absolute cap on polling past expiry
    #[serde(default = "default_poll_grace_ms")]
    pub poll_grace_ms: u64,
}

impl VerificationConfig {
    #[must_use]
    pub fn validity(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.validity_mins)
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    #[must_use]
    pub fn poll_grace(&self) -> Duration {
        Duration::from_millis(self.poll_grace_ms)
    }
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            code_len: default_code_len(),
            validity_mins: default_validity_mins(),
            poll_interval_ms: default_poll_interval_ms(),
            sweep_interval_ms: default_sweep_interval_ms(),
            poll_grace_ms: default_poll_grace_ms(),
        }
    }
}

fn default_app_name() -> String {
    "relay".to_string()
}

fn default_env() -> Environment {
    Environment::Development
}

fn default_dedup_window_ms() -> u64 {
    2000
}

fn default_dedup_capacity() -> usize {
    64
}

fn default_debounce_ms() -> u64 {
    500
}

fn default_watchdog_ms() -> u64 {
    15_000
}

fn default_backoff_base_ms() -> u64 {
    500
}

fn default_backoff_ceiling_ms() -> u64 {
    30_000
}

fn default_code_len() -> usize {
    6
}

fn default_validity_mins() -> i64 {
    30
}

fn default_poll_interval_ms() -> u64 {
    3000
}

fn default_sweep_interval_ms() -> u64 {
    30_000
}

fn default_poll_grace_ms() -> u64 {
    300_000
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    InvalidVar(&'static str),
}

fn env_parse<T: std::str::FromStr>(key: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidVar(key)),
        Err(_) => Ok(None),
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if a set variable holds an unparseable value
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Ok(Self {
            app: AppSettings {
                name: env::var("APP_NAME").unwrap_or_else(|_| default_app_name()),
                env: env::var("APP_ENV")
                    .ok()
                    .and_then(|s| match s.to_lowercase().as_str() {
                        "production" => Some(Environment::Production),
                        "staging" => Some(Environment::Staging),
                        "development" => Some(Environment::Development),
                        _ => None,
                    })
                    .unwrap_or_default(),
            },
            sync: SyncConfig {
                dedup_window_ms: env_parse("SYNC_DEDUP_WINDOW_MS")?
                    .unwrap_or_else(default_dedup_window_ms),
                dedup_capacity: env_parse("SYNC_DEDUP_CAPACITY")?
                    .unwrap_or_else(default_dedup_capacity),
                debounce_ms: env_parse("SYNC_DEBOUNCE_MS")?.unwrap_or_else(default_debounce_ms),
                watchdog_ms: env_parse("SYNC_WATCHDOG_MS")?.unwrap_or_else(default_watchdog_ms),
                backoff_base_ms: env_parse("SYNC_BACKOFF_BASE_MS")?
                    .unwrap_or_else(default_backoff_base_ms),
                backoff_ceiling_ms: env_parse("SYNC_BACKOFF_CEILING_MS")?
                    .unwrap_or_else(default_backoff_ceiling_ms),
            },
            verification: VerificationConfig {
                code_len: env_parse("VERIFICATION_CODE_LEN")?.unwrap_or_else(default_code_len),
                validity_mins: env_parse("VERIFICATION_VALIDITY_MINS")?
                    .unwrap_or_else(default_validity_mins),
                poll_interval_ms: env_parse("VERIFICATION_POLL_INTERVAL_MS")?
                    .unwrap_or_else(default_poll_interval_ms),
                sweep_interval_ms: env_parse("VERIFICATION_SWEEP_INTERVAL_MS")?
                    .unwrap_or_else(default_sweep_interval_ms),
                poll_grace_ms: env_parse("VERIFICATION_POLL_GRACE_MS")?
                    .unwrap_or_else(default_poll_grace_ms),
            },
        })
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app: AppSettings {
                name: default_app_name(),
                env: Environment::default(),
            },
            sync: SyncConfig::default(),
            verification: VerificationConfig::default(),
        }
    }
}
