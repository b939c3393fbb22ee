use crate::models::Listing;
use crate::scrapers::ScrapeError;
use anyhow::Result;
use std::path::Path;
use tracing::info;

const CSV_HEADERS: [&str; 4] = ["title", "price", "location", "href"];

/// Output format, chosen by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Csv,
}

impl OutputFormat {
    /// `.json` (any case) selects JSON; everything else is CSV
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Csv,
        }
    }
}

/// Write listings to `path` in the format its extension implies
pub async fn write_results(listings: &[Listing], path: &Path) -> Result<(), ScrapeError> {
    let format = OutputFormat::from_path(path);
    let bytes = match format {
        OutputFormat::Json => render_json(listings),
        OutputFormat::Csv => render_csv(listings),
    }
    .map_err(|source| ScrapeError::Output {
        path: path.to_path_buf(),
        source,
    })?;

    tokio::fs::write(path, bytes)
        .await
        .map_err(|e| ScrapeError::Output {
            path: path.to_path_buf(),
            source: e.into(),
        })?;

    info!("💾 Wrote {} items to {}", listings.len(), path.display());
    Ok(())
}

/// Pretty JSON array; absent fields become `null`, non-ASCII stays as-is
fn render_json(listings: &[Listing]) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(listings)?)
}

/// CSV with a header row; absent fields become empty cells
fn render_csv(listings: &[Listing]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADERS)?;
    for listing in listings {
        writer.write_record([
            listing.title.as_deref().unwrap_or(""),
            listing.price.as_deref().unwrap_or(""),
            listing.location.as_deref().unwrap_or(""),
            listing.href.as_str(),
        ])?;
    }
    Ok(writer.into_inner().map_err(|e| e.into_error())?)
}
