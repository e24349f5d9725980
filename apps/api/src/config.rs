use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::autosave::AutoSaveConfig;
use crate::session::SessionConfig;
use crate::versions::VersionLedgerConfig;

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub resume_api_url: String,
    pub resume_api_token: Option<String>,
    pub port: u16,
    pub rust_log: String,
    pub history_max_entries: usize,
    pub history_debounce_ms: u64,
    pub autosave_enabled: bool,
    pub autosave_debounce_ms: u64,
    pub autosave_max_retries: u32,
    pub autosave_retry_delay_ms: u64,
    pub max_versions: usize,
    /// 0 disables periodic versions.
    pub version_autosave_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            resume_api_url: require_env("RESUME_API_URL")?,
            resume_api_token: std::env::var("RESUME_API_TOKEN").ok(),
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            history_max_entries: parse_env("HISTORY_MAX_ENTRIES", 30)?,
            history_debounce_ms: parse_env("HISTORY_DEBOUNCE_MS", 1500)?,
            autosave_enabled: parse_env("AUTOSAVE_ENABLED", true)?,
            autosave_debounce_ms: parse_env("AUTOSAVE_DEBOUNCE_MS", 2000)?,
            autosave_max_retries: parse_env("AUTOSAVE_MAX_RETRIES", 3)?,
            autosave_retry_delay_ms: parse_env("AUTOSAVE_RETRY_DELAY_MS", 1000)?,
            max_versions: parse_env("MAX_VERSIONS", 50)?,
            version_autosave_interval_secs: parse_env("VERSION_AUTOSAVE_INTERVAL_SECS", 300)?,
        })
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            history_max_entries: self.history_max_entries,
            history_debounce: Duration::from_millis(self.history_debounce_ms),
            autosave: AutoSaveConfig {
                enabled: self.autosave_enabled,
                debounce: Duration::from_millis(self.autosave_debounce_ms),
                max_retries: self.autosave_max_retries,
                retry_delay: Duration::from_millis(self.autosave_retry_delay_ms),
            },
            versions: VersionLedgerConfig {
                max_versions: self.max_versions,
                auto_save: self.version_autosave_interval_secs > 0,
                save_interval: Duration::from_secs(self.version_autosave_interval_secs),
            },
        }
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid value, got '{raw}'")),
        Err(_) => Ok(default),
    }
}
