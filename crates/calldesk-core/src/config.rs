//! Application configuration
//!
//! Centralized configuration management using the `config` crate.
//! Configuration can be loaded from environment variables and config files.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub telephony: TelephonyConfig,
}

/// HTTP server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Number of worker threads
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_workers() -> usize {
    num_cpus::get()
}

/// Database configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Connection acquire timeout in seconds
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,

    /// Idle connection timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    10
}

fn default_acquire_timeout() -> u64 {
    30
}

fn default_idle_timeout() -> u64 {
    600
}

/// Telephony orchestration configuration
///
/// `base_url` is the publicly reachable address the provider calls back on;
/// every routing directive embeds a status-callback URL built from it.
/// The status-to-effect lists are policy, not law: which terminal statuses
/// raise an inbox notification and which statuses upgrade an activity to
/// "called" differ between deployments, so both are configurable.
#[derive(Debug, Deserialize, Clone)]
pub struct TelephonyConfig {
    /// Public base URL for provider status callbacks (no trailing slash)
    pub base_url: String,

    /// Provider REST request timeout in seconds
    #[serde(default = "default_provider_timeout")]
    pub provider_timeout_secs: u64,

    /// Terminal statuses that create an inbox notification
    #[serde(default = "default_notify_statuses")]
    pub notify_statuses: Vec<String>,

    /// Statuses that upgrade an "attempted/missed" activity to "called"
    #[serde(default = "default_upgrade_statuses")]
    pub upgrade_statuses: Vec<String>,
}

fn default_provider_timeout() -> u64 {
    10
}

fn default_notify_statuses() -> Vec<String> {
    vec!["busy".to_string(), "no-answer".to_string()]
}

fn default_upgrade_statuses() -> Vec<String> {
    vec!["in-progress".to_string(), "completed".to_string()]
}

impl AppConfig {
    /// Load configuration from environment and optional config file
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("server.workers", num_cpus::get() as i64)?
            .set_default("database.max_connections", 10)?
            .set_default("database.acquire_timeout_secs", 30)?
            .set_default("database.idle_timeout_secs", 600)?
            .set_default("telephony.provider_timeout_secs", 10)?
            .set_default(
                "telephony.notify_statuses",
                vec!["busy".to_string(), "no-answer".to_string()],
            )?
            .set_default(
                "telephony.upgrade_statuses",
                vec!["in-progress".to_string(), "completed".to_string()],
            )?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Load from environment variables with CALLDESK_ prefix
            .add_source(
                Environment::with_prefix("CALLDESK")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(Environment::with_prefix("CALLDESK").separator("__"))
            .build()?;

        config.try_deserialize()
    }

    /// Get the server bind address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl TelephonyConfig {
    /// Status-callback URL for a webhook route under this deployment
    pub fn callback_url(&self, route: &str) -> String {
        format!(
            "{}/webhooks/telephony/{}",
            self.base_url.trim_end_matches('/'),
            route.trim_start_matches('/')
        )
    }
}

impl Default for TelephonyConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            provider_timeout_secs: default_provider_timeout(),
            notify_statuses: default_notify_statuses(),
            upgrade_statuses: default_upgrade_statuses(),
        }
    }
}
