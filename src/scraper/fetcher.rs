use crate::config::AppConfig;
use crate::model::ScraperError;
use crate::scraper::traits::{FetchedBytes, Scraper};

use rand::Rng;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};
use url::Url;

const BASE_BACKOFF_MS: u64 = 500;

pub struct ScraperImpl {
    client: Client,
    max_retries: u32,
}

impl ScraperImpl {
    pub fn new(config: &AppConfig) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self { client, max_retries: config.max_retries })
    }

    /// GET with retries on transport errors and 5xx. Other statuses fail at once.
    async fn get(&self, url: &str) -> Result<Response, ScraperError> {
        let url = Url::parse(url)?;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let err = match self.client.get(url.clone()).send().await {
                Ok(resp) if resp.status().is_success() => return Ok(resp),
                Ok(resp) => {
                    let err = ScraperError::InvalidResponse {
                        url: url.to_string(),
                        status: resp.status().as_u16(),
                    };
                    if !resp.status().is_server_error() {
                        return Err(err);
                    }
                    err
                }
                Err(e) => ScraperError::Http(e),
            };

            if attempt > self.max_retries {
                return Err(err);
            }
            let delay = backoff(attempt);
            warn!("Attempt {} for {} failed ({}), retrying in {:?}", attempt, url, err, delay);
            sleep(delay).await;
        }
    }
}

/// Exponential backoff with up to 50% random jitter.
fn backoff(attempt: u32) -> Duration {
    let base = BASE_BACKOFF_MS.saturating_mul(1 << attempt.saturating_sub(1).min(6));
    let jitter = rand::rng().random_range(0..=base / 2);
    Duration::from_millis(base + jitter)
}

#[async_trait::async_trait]
impl Scraper for ScraperImpl {
    async fn fetch_page(&self, url: &str) -> Result<String, ScraperError> {
        let body = self.get(url).await?.text().await?;
        if body.trim().is_empty() {
            return Err(ScraperError::EmptyBody(url.to_string()));
        }
        debug!("Fetched {} ({} bytes)", url, body.len());
        Ok(body)
    }

    async fn fetch_bytes(&self, url: &str) -> Result<FetchedBytes, ScraperError> {
        let resp = self.get(url).await?;
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = resp.bytes().await?;
        if bytes.is_empty() {
            return Err(ScraperError::EmptyBody(url.to_string()));
        }
        Ok((bytes.to_vec(), content_type))
    }
}
