pub mod browser;
pub mod error;
pub mod extractor;
pub mod loader;
pub mod rules;
pub mod traits;
pub mod types;

pub use browser::ClassifiedsBrowserScraper;
pub use error::ScrapeError;
pub use rules::ExtractionRules;
pub use traits::ScraperTrait;
pub use types::{LoaderConfig, ScrapeParams};
