//! Configuration schema for the kanban client

use crate::cache::CacheConfig;
use crate::models::DEFAULT_BOARD_ID;
use crate::retry::RetryConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use utils::ClientConfig;

/// Main kanban configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct KanbanConfig {
    /// Task service connection
    #[serde(default)]
    pub api: ApiConfig,

    /// Task cache tuning
    #[serde(default)]
    pub cache: CacheSettings,

    /// Board defaults
    #[serde(default)]
    pub board: BoardConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Task service connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Service base URL (supports `${VAR}`)
    pub base_url: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// User agent sent with each request
    pub user_agent: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5147".to_string(),
            timeout_secs: 30,
            user_agent: None,
        }
    }
}

/// Task cache tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Entries older than this are refreshed on next read
    pub stale_time_ms: u64,

    /// Polling period for `watch`
    pub refetch_interval_ms: u64,

    /// Retries for failed reads (mutations never retry)
    pub read_retries: usize,

    /// Delay before the first read retry
    pub retry_delay_ms: u64,

    /// Backoff multiplier between read retries
    pub retry_multiplier: f64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            stale_time_ms: 30_000,
            refetch_interval_ms: 15_000,
            read_retries: 2,
            retry_delay_ms: 500,
            retry_multiplier: 2.0,
        }
    }
}

/// Board defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    /// Board used when a command does not name one
    pub default_board_id: i64,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            default_board_id: DEFAULT_BOARD_ID,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

impl KanbanConfig {
    /// Resolve environment variables in configuration values
    ///
    /// `KANBAN_API_URL` replaces the base URL; otherwise `${VAR_NAME}` in
    /// string fields is expanded.
    pub fn resolve_env_vars(&mut self) {
        if let Some(url) = utils::get_env_opt("KANBAN_API_URL") {
            self.api.base_url = url;
        } else {
            self.api.base_url = utils::expand_env_var(&self.api.base_url);
        }
        if let Some(ref agent) = self.api.user_agent {
            self.api.user_agent = Some(utils::expand_env_var(agent));
        }
    }

    /// HTTP client settings for the task service.
    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new(self.api.base_url.clone())
            .with_timeout(Duration::from_secs(self.api.timeout_secs));
        if let Some(ref agent) = self.api.user_agent {
            config = config.with_user_agent(agent.clone());
        }
        config
    }

    /// Settings for the task cache.
    pub fn cache_config(&self) -> CacheConfig {
        let retry_delay = Duration::from_millis(self.cache.retry_delay_ms);
        CacheConfig {
            stale_time: Duration::from_millis(self.cache.stale_time_ms),
            refetch_interval: Duration::from_millis(self.cache.refetch_interval_ms),
            retry: RetryConfig::new(
                self.cache.read_retries,
                retry_delay,
                RetryConfig::default().max_delay.max(retry_delay),
                self.cache.retry_multiplier,
            ),
            ..CacheConfig::default()
        }
    }
}
