use std::path::PathBuf;
use thiserror::Error;

/// Failures that abort a scrape.
///
/// Everything else (idle-wait timeouts, scroll hiccups, selector misses) is
/// absorbed where it happens and never reaches this type.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("Failed to launch browser: {0}")]
    Launch(#[source] anyhow::Error),

    #[error("Navigation to {url} failed: {source}")]
    Navigation {
        url: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Invalid extraction rules in {}: {reason}", path.display())]
    Rules { path: PathBuf, reason: String },

    #[error("Failed to write results to {}: {source}", path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("Scrape worker stopped unexpectedly: {0}")]
    Worker(String),
}
