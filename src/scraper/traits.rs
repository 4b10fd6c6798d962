use crate::model::ScraperError;

/// Downloaded image body plus the server-reported content type.
pub type FetchedBytes = (Vec<u8>, Option<String>);

#[async_trait::async_trait]
pub trait Scraper: Send + Sync {
    async fn fetch_page(&self, url: &str) -> Result<String, ScraperError>;

    async fn fetch_bytes(&self, url: &str) -> Result<FetchedBytes, ScraperError>;
}
