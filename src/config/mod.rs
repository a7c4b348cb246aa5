//! Configuration module for the GMR backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::AppError;

/// Default coordinating endpoint for global account lookups.
pub const DEFAULT_META_API_URL: &str = "https://meta.wikimedia.org/w/api.php";

/// Default outbound User-Agent.
pub const DEFAULT_USER_AGENT: &str = "GlobalMassRollback/1.1 (+https://meta.wikimedia.org)";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Pre-shared key gating the API (disabled when unset)
    pub api_psk: Option<String>,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// OAuth consumer key used to sign outbound calls
    pub consumer_key: Option<String>,
    /// OAuth consumer secret used to sign outbound calls
    pub consumer_secret: Option<String>,
    /// Endpoint that lists the wikis a global account is merged into
    pub meta_api_url: String,
    /// User-Agent sent with every outbound request
    pub user_agent: String,
    /// Maximum number of edits returned by one aggregation
    pub edit_limit: usize,
    /// Number of wikis queried concurrently
    pub max_workers: usize,
    /// Contributions requested per wiki per aggregation
    pub page_size: usize,
    /// Pause after every rollback item
    pub rollback_delay: Duration,
    /// Timeout applied to every outbound call
    pub request_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let api_psk = env::var("GMR_API_PSK").ok();

        let bind_addr = env::var("GMR_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
            .parse()
            .map_err(|_| AppError::Configuration("Invalid GMR_BIND_ADDR format".to_string()))?;

        let log_level = env::var("GMR_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let consumer_key = env::var("GMR_CONSUMER_KEY").ok().filter(|s| !s.is_empty());
        let consumer_secret = env::var("GMR_CONSUMER_SECRET")
            .ok()
            .filter(|s| !s.is_empty());

        let meta_api_url =
            env::var("GMR_META_API_URL").unwrap_or_else(|_| DEFAULT_META_API_URL.to_string());
        let user_agent =
            env::var("GMR_USER_AGENT").unwrap_or_else(|_| DEFAULT_USER_AGENT.to_string());

        let edit_limit = parse_var("GMR_EDIT_LIMIT", 50usize)?;
        let max_workers = parse_var("GMR_MAX_WORKERS", 4usize)?;
        let page_size = parse_var("GMR_PAGE_SIZE", 20usize)?;
        let rollback_delay = Duration::from_millis(parse_var("GMR_ROLLBACK_DELAY_MS", 500u64)?);
        let request_timeout =
            Duration::from_secs(parse_var("GMR_REQUEST_TIMEOUT_SECS", 10u64)?);

        if edit_limit == 0 || max_workers == 0 || page_size == 0 {
            return Err(AppError::Configuration(
                "GMR_EDIT_LIMIT, GMR_MAX_WORKERS and GMR_PAGE_SIZE must be positive".to_string(),
            ));
        }

        Ok(Self {
            api_psk,
            bind_addr,
            log_level,
            consumer_key,
            consumer_secret,
            meta_api_url,
            user_agent,
            edit_limit,
            max_workers,
            page_size,
            rollback_delay,
            request_timeout,
        })
    }
}

/// Read `key` and parse it, falling back to `default` when the variable is unset.
fn parse_var<T: FromStr>(key: &str, default: T) -> Result<T, AppError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Configuration(format!("Invalid {} value: {}", key, raw))),
        Err(_) => Ok(default),
    }
}
