use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use crate::{config::MonitorConfig, error::MonitorError};

/// Where the leaderboard HTML comes from.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch(&self) -> Result<String, MonitorError>;
}

pub struct HttpFetcher {
    client: reqwest::Client,
    url: String,
}

impl HttpFetcher {
    pub fn new(config: &MonitorConfig) -> Result<Self, MonitorError> {
        let url = config.source.url.clone();
        let client = reqwest::Client::builder()
            .user_agent(&config.scraping.user_agent)
            .timeout(Duration::from_secs(config.scraping.request_timeout_secs))
            .gzip(true)
            .build()
            .map_err(|source| MonitorError::Fetch {
                url: url.clone(),
                source,
            })?;

        Ok(Self { client, url })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl PageSource for HttpFetcher {
    async fn fetch(&self) -> Result<String, MonitorError> {
        let fetch_error = |source| MonitorError::Fetch {
            url: self.url.clone(),
            source,
        };

        let response = self.client.get(&self.url).send().await.map_err(fetch_error)?;
        if !response.status().is_success() {
            return Err(MonitorError::HttpStatus {
                url: self.url.clone(),
                status: response.status().as_u16(),
            });
        }

        let body = response.text().await.map_err(fetch_error)?;
        if body.trim().is_empty() {
            return Err(MonitorError::EmptyResponse {
                url: self.url.clone(),
            });
        }

        debug!("Fetched {} ({} bytes)", self.url, body.len());
        Ok(body)
    }
}
