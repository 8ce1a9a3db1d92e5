use serde::{Deserialize, Serialize};
use std::env;

pub const DEFAULT_HIGHSCORE_URL: &str = "http://lubelski-classic.com/?highscores";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceConfig {
    pub url: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_HIGHSCORE_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScrapingConfig {
    pub user_agent: String,
    pub request_timeout_secs: u64,
}

impl Default for ScrapingConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (compatible; HighscoreMonitor/1.0)".to_string(),
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScheduleConfig {
    pub poll_interval_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 5 * 60,
        }
    }
}

/// Backoff applied to transient failures (fetch and store) before they
/// become fatal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://database/database.db3".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MonitorConfig {
    pub source: SourceConfig,
    pub scraping: ScrapingConfig,
    pub schedule: ScheduleConfig,
    pub retry: RetryConfig,
    pub database: DatabaseConfig,
}

impl MonitorConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from defaults overridden by whatever `lookup` returns.
    /// Values that fail to parse are ignored.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("HIGHSCORE_URL") {
            config.source.url = url;
        }
        if let Some(user_agent) = lookup("SCRAPER_USER_AGENT") {
            config.scraping.user_agent = user_agent;
        }
        if let Some(timeout) = lookup("SCRAPER_TIMEOUT_SECS").and_then(|t| t.parse::<u64>().ok()) {
            config.scraping.request_timeout_secs = timeout;
        }
        if let Some(interval) = lookup("POLL_INTERVAL_SECS").and_then(|i| i.parse::<u64>().ok()) {
            config.schedule.poll_interval_secs = interval;
        }
        if let Some(attempts) = lookup("RETRY_MAX_ATTEMPTS").and_then(|a| a.parse::<u32>().ok()) {
            config.retry.max_attempts = attempts;
        }
        if let Some(delay) = lookup("RETRY_INITIAL_DELAY_MS").and_then(|d| d.parse::<u64>().ok()) {
            config.retry.initial_delay_ms = delay;
        }
        if let Some(database_url) = lookup("DATABASE_URL") {
            config.database.url = database_url;
        }

        config
    }
}
