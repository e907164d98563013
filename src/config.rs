//! Server configuration from the environment

use crate::llm::LlmConfig;
use std::time::Duration;

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_SESSION_IDLE_TTL_SECS: u64 = 30 * 60;

/// Default `RUST_LOG` filter
pub const DEFAULT_LOG_FILTER: &str = "stroymaster_consultant=info,tower_http=debug";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    /// Sessions untouched and unwatched this long are discarded
    pub session_idle_ttl: Duration,
    pub llm: LlmConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let port = lookup("CONSULTANT_PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);
        let idle_secs = lookup("SESSION_IDLE_TTL_SECS")
            .and_then(|s| s.parse().ok())
            .filter(|&secs| secs > 0)
            .unwrap_or(DEFAULT_SESSION_IDLE_TTL_SECS);

        Self {
            port,
            session_idle_ttl: Duration::from_secs(idle_secs),
            llm: LlmConfig::from_env(),
        }
    }
}
