//! Configuration module for the forum backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::forum::{rate_limit, ThreadPolicy, DEFAULT_EXCERPT_CHARS, DEFAULT_MAX_REPLY_DEPTH};

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Pre-shared key for API authentication (required in production)
    pub api_psk: Option<String>,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Emit logs as JSON lines
    pub log_json: bool,
    /// Deepest level members may still reply under
    pub max_reply_depth: usize,
    /// Attempts per window for topics, replies and reports
    pub rate_limit_max: u32,
    pub rate_limit_window: Duration,
    /// Quote excerpt length in characters
    pub quote_excerpt_chars: usize,
    /// Load the demo categories, members and topics at startup
    pub seed_demo: bool,
}

/// An environment variable held a value that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub key: &'static str,
    pub value: String,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Invalid {} value: {:?}", self.key, self.value)
    }
}

impl std::error::Error for ConfigError {}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_psk: None,
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            log_level: "info".to_string(),
            log_json: false,
            max_reply_depth: DEFAULT_MAX_REPLY_DEPTH,
            rate_limit_max: rate_limit::DEFAULT_LIMIT,
            rate_limit_window: rate_limit::DEFAULT_WINDOW,
            quote_excerpt_chars: DEFAULT_EXCERPT_CHARS,
            seed_demo: true,
        }
    }
}

impl Config {
    /// Load configuration from the process environment (and `.env`).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::parse_from(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn parse_from<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let text = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Ok(Self {
            api_psk: text("FORUM_API_PSK"),
            bind_addr: parse_or(&lookup, "FORUM_BIND_ADDR", defaults.bind_addr)?,
            log_level: text("FORUM_LOG_LEVEL").unwrap_or(defaults.log_level),
            log_json: parse_or(&lookup, "FORUM_LOG_JSON", defaults.log_json)?,
            max_reply_depth: parse_or(&lookup, "FORUM_MAX_REPLY_DEPTH", defaults.max_reply_depth)?,
            rate_limit_max: parse_or(&lookup, "FORUM_RATE_LIMIT_MAX", defaults.rate_limit_max)?,
            rate_limit_window: Duration::from_secs(positive_or(
                &lookup,
                "FORUM_RATE_LIMIT_WINDOW_SECS",
                defaults.rate_limit_window.as_secs(),
            )?),
            quote_excerpt_chars: parse_or(
                &lookup,
                "FORUM_QUOTE_EXCERPT_CHARS",
                defaults.quote_excerpt_chars,
            )?,
            seed_demo: parse_or(&lookup, "FORUM_SEED_DEMO", defaults.seed_demo)?,
        })
    }

    pub fn thread_policy(&self) -> ThreadPolicy {
        ThreadPolicy {
            max_reply_depth: self.max_reply_depth,
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key).map(|v| v.trim().to_string()) {
        None => Ok(default),
        Some(value) if value.is_empty() => Ok(default),
        Some(value) => value.parse().map_err(|_| ConfigError { key, value }),
    }
}

/// Like `parse_or`, but zero is rejected.
fn positive_or<F>(lookup: &F, key: &'static str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match parse_or(lookup, key, default)? {
        0 => Err(ConfigError {
            key,
            value: lookup(key).unwrap_or_default().trim().to_string(),
        }),
        value => Ok(value),
    }
}
