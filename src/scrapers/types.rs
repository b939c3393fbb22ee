use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Search results page scraped when no URL is given
pub const DEFAULT_URL: &str = "https://www.olx.in/items/q-car-cover";

/// Default cap on the number of listings returned
pub const DEFAULT_MAX_ITEMS: usize = 200;

/// Parameters for a single scrape invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeParams {
    /// Search results URL to load
    pub url: String,
    /// Maximum number of listings kept after deduplication
    pub max_items: usize,
    /// Run Chrome without a visible window
    pub headless: bool,
}

impl Default for ScrapeParams {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            max_items: DEFAULT_MAX_ITEMS,
            headless: false,
        }
    }
}

/// Timing bounds used while materializing a lazily rendered page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Hard bound on the initial navigation; exceeding it is fatal
    pub navigation_timeout: Duration,
    /// Bound on the first network-idle wait after navigation
    pub initial_idle_timeout: Duration,
    /// Unconditional pause before the first height measurement
    pub settle_delay: Duration,
    /// Upper bound on scroll iterations
    pub max_scrolls: usize,
    /// Pause after each scroll before waiting for the network
    pub scroll_pause: Duration,
    /// Bound on the network-idle wait after each scroll
    pub scroll_idle_timeout: Duration,
    /// How long the network must stay silent to count as idle
    pub idle_window: Duration,
    pub poll_interval: Duration,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            navigation_timeout: Duration::from_secs(30),
            initial_idle_timeout: Duration::from_secs(15),
            settle_delay: Duration::from_secs(1),
            max_scrolls: 10,
            scroll_pause: Duration::from_secs(1),
            scroll_idle_timeout: Duration::from_secs(5),
            idle_window: Duration::from_millis(500),
            poll_interval: Duration::from_millis(100),
        }
    }
}

impl LoaderConfig {
    pub fn with_navigation_timeout(mut self, timeout: Duration) -> Self {
        self.navigation_timeout = timeout;
        self
    }

    /// Zero every pause, keeping the iteration ceiling. Used by tests.
    #[cfg(test)]
    pub fn instant() -> Self {
        Self {
            settle_delay: Duration::ZERO,
            scroll_pause: Duration::ZERO,
            idle_window: Duration::ZERO,
            poll_interval: Duration::ZERO,
            ..Self::default()
        }
    }
}

/// Outcome of a bounded wait for network quiescence.
///
/// Running out of time is an expected outcome: some pages hold connections
/// open forever and never go idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quiescence {
    Idle,
    TimedOut,
}
