//! Completion service configuration

use super::{GeminiService, LlmService, LoggingService};
use std::sync::Arc;
use std::time::Duration;

/// Model used when `GEMINI_MODEL` is unset
pub const DEFAULT_MODEL: &str = "gemini-3-flash-preview";

const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Configuration for the completion provider
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub model: String,
    /// Base URL replacing the public Gemini host
    pub gateway: Option<String>,
    pub timeout: Duration,
    pub max_output_tokens: Option<u32>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            gateway: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_output_tokens: None,
        }
    }
}

impl LlmConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            api_key: lookup("GEMINI_API_KEY")
                .or_else(|| lookup("API_KEY"))
                .filter(|k| !k.is_empty()),
            model: lookup("GEMINI_MODEL")
                .filter(|m| !m.is_empty())
                .unwrap_or(defaults.model),
            gateway: lookup("LLM_GATEWAY").filter(|g| !g.is_empty()),
            timeout: lookup("LLM_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .map_or(defaults.timeout, Duration::from_secs),
            max_output_tokens: lookup("LLM_MAX_OUTPUT_TOKENS").and_then(|s| s.parse().ok()),
        }
    }

    /// A service can be built with a key or through a gateway
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some() || self.gateway.is_some()
    }
}

/// Build the logging-wrapped Gemini service, or `None` when unconfigured
pub fn create_service(config: &LlmConfig) -> Option<Arc<dyn LlmService>> {
    if !config.is_configured() {
        return None;
    }

    match GeminiService::new(
        config.api_key.clone(),
        &config.model,
        config.gateway.as_deref(),
        config.timeout,
    ) {
        Ok(service) => Some(Arc::new(LoggingService::new(Arc::new(service)))),
        Err(e) => {
            tracing::error!(error = %e, "Failed to create completion service");
            None
        }
    }
}
