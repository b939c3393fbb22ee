use crate::models::Listing;
use crate::scrapers::types::Quiescence;
use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Common trait for listing scrapers
#[async_trait]
pub trait ScraperTrait: Send + Sync {
    /// Load the search page and return its listings
    async fn scrape(&self) -> Result<Vec<Listing>>;

    /// Get the name of the scraper source
    fn source_name(&self) -> &'static str;
}

/// A navigable browser page, as seen by the loader.
///
/// Headless Chrome implements this for real runs; tests script it.
pub trait PageDriver {
    /// Navigate and wait for the load to commit, bounded by `timeout`
    fn navigate(&self, url: &str, timeout: Duration) -> Result<()>;

    /// Wait for network activity to settle, giving up after `timeout`
    fn wait_for_quiescence(&self, timeout: Duration) -> Result<Quiescence>;

    fn scroll_to_bottom(&self) -> Result<()>;

    /// Current `document.body.scrollHeight`
    fn document_height(&self) -> Result<u64>;

    /// Serialized DOM of the page as currently rendered
    fn content(&self) -> Result<String>;
}
