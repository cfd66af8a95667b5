//! Configuration loaded from environment variables.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Push service configuration
    pub gcm: GcmConfig,

    /// Running application identity
    #[serde(default)]
    pub app: AppConfig,

    /// Registration storage configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Logging configuration
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GcmConfig {
    /// Push service base URL
    #[serde(default = "default_service_url")]
    pub service_url: String,

    /// Project number to register against
    pub sender_id: String,

    /// Server API key, only needed for sending
    #[serde(default)]
    pub api_key: Option<String>,

    /// Request timeout
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// Extra attempts for downstream sends when the service is unavailable
    #[serde(default = "default_send_retries")]
    pub send_retries: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Application identity the registration is keyed by
    #[serde(default = "default_app_id")]
    pub id: String,

    /// Version code of the running application
    #[serde(default = "default_app_version")]
    pub version: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Path to the registration file
    #[serde(default = "default_store_path")]
    pub path: PathBuf,

    /// Enable persistence (if false, registration is kept in memory only)
    #[serde(default = "default_true")]
    pub persist: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            id: default_app_id(),
            version: default_app_version(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            persist: true,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_service_url() -> String {
    "http://localhost:8080".into()
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_send_retries() -> u32 {
    1
}

fn default_app_id() -> String {
    "gcm-registration".into()
}

fn default_app_version() -> i32 {
    1
}

fn default_store_path() -> PathBuf {
    PathBuf::from("data/registration.json")
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".into()
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();
        Self::from_environment(config::Environment::default())
    }

    /// Load configuration from an explicit set of variables instead of the
    /// process environment.
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self> {
        Self::from_environment(config::Environment::default().source(Some(vars)))
    }

    fn from_environment(env: config::Environment) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(
                env.separator("__")
                    // Sender ids are long digit strings; keep them as strings.
                    .try_parsing(false),
            )
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}
