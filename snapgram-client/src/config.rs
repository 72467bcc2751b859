use serde::Deserialize;
use snapgram_remote::client::{DEFAULT_PAGE_SIZE, DEFAULT_RECENT_POSTS_LIMIT, PageLimits};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub const ENV_PREFIX: &str = "SNAPGRAM_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Error parsing .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("Error parsing environment: {0}")]
    Envy(#[from] envy::Error),
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Client settings, read from `SNAPGRAM_`-prefixed environment variables.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_search_debounce_ms")]
    pub search_debounce_ms: u64,
    /// Unset means cached entries stay fresh until invalidated.
    #[serde(default)]
    pub stale_time_secs: Option<u64>,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_recent_posts_limit")]
    pub recent_posts_limit: usize,
}

fn default_search_debounce_ms() -> u64 {
    500
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn default_recent_posts_limit() -> usize {
    DEFAULT_RECENT_POSTS_LIMIT
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            search_debounce_ms: default_search_debounce_ms(),
            stale_time_secs: None,
            page_size: default_page_size(),
            recent_posts_limit: default_recent_posts_limit(),
        }
    }
}

impl ClientConfig {
    /// Loads `.env` if present, then reads the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        if let Err(e) = dotenvy::dotenv() {
            if e.not_found() {
                debug!("No .env file found");
            } else {
                return Err(e.into());
            }
        }

        envy::prefixed(ENV_PREFIX).from_env::<Self>()?.validated()
    }

    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::prefixed(ENV_PREFIX)
            .from_iter::<_, Self>(vars)?
            .validated()
    }

    fn validated(self) -> Result<Self, ConfigError> {
        if self.page_size == 0 {
            return Err(ConfigError::Zero("SNAPGRAM_PAGE_SIZE"));
        }
        if self.recent_posts_limit == 0 {
            return Err(ConfigError::Zero("SNAPGRAM_RECENT_POSTS_LIMIT"));
        }
        Ok(self)
    }

    #[must_use]
    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }

    #[must_use]
    pub fn stale_time(&self) -> Option<Duration> {
        self.stale_time_secs.map(Duration::from_secs)
    }

    #[must_use]
    pub fn page_limits(&self) -> PageLimits {
        PageLimits {
            page_size: self.page_size,
            recent_posts: self.recent_posts_limit,
        }
    }
}
