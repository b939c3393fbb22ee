//! Heuristic matching rules for listing extraction.
//!
//! Classifieds markup changes without notice, so the selectors live here as
//! data. A JSON file with the same shape can replace the defaults at runtime
//! without touching the extraction code.

use crate::scrapers::error::ScrapeError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One strategy for locating a field inside a scope element
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Matcher {
    /// First element matching a CSS selector
    Css { selector: String },
    /// First element matching `selector` whose rendered text contains `contains`
    Text { selector: String, contains: String },
}

impl Matcher {
    pub fn css(selector: &str) -> Self {
        Self::Css {
            selector: selector.to_string(),
        }
    }

    pub fn text(selector: &str, contains: &str) -> Self {
        Self::Text {
            selector: selector.to_string(),
            contains: contains.to_string(),
        }
    }

    pub fn selector(&self) -> &str {
        match self {
            Self::Css { selector } | Self::Text { selector, .. } => selector,
        }
    }
}

/// Full rule set used by the extractor
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExtractionRules {
    /// An anchor is a listing link when its href contains any of these
    pub link_patterns: Vec<String>,
    /// Price strategies, tried in order within the anchor
    pub price: Vec<Matcher>,
    /// Tag names that count as the enclosing block for location lookup
    pub location_scope: Vec<String>,
    /// Location strategies, tried in order within the enclosing block
    pub location: Vec<Matcher>,
}

impl Default for ExtractionRules {
    fn default() -> Self {
        Self {
            link_patterns: vec!["/item".into(), "/i/".into(), "/items/".into()],
            price: vec![
                Matcher::css(".price, ._89yzn, ._2xKfz"),
                Matcher::text("span", "₹"),
                Matcher::text("span", "INR"),
            ],
            location_scope: vec!["li".into(), "div".into()],
            location: vec![
                Matcher::css("._2FBdJ, .tjgMj, .-K-F"),
                Matcher::css("span[data-aut-id='itemLocation']"),
            ],
        }
    }
}

impl ExtractionRules {
    /// Load rules from a JSON file. Missing keys fall back to the defaults.
    pub fn from_file(path: &Path) -> Result<Self, ScrapeError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ScrapeError::Rules {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_json(&raw).map_err(|reason| ScrapeError::Rules {
            path: path.to_path_buf(),
            reason,
        })
    }

    pub fn from_json(raw: &str) -> Result<Self, String> {
        let rules: Self = serde_json::from_str(raw).map_err(|e| e.to_string())?;
        if rules.link_patterns.iter().all(|p| p.is_empty()) {
            return Err("at least one non-empty link pattern is required".to_string());
        }
        Ok(rules)
    }

    /// Whether an href looks like a listing detail page
    pub fn is_listing_link(&self, href: &str) -> bool {
        self.link_patterns
            .iter()
            .any(|pattern| !pattern.is_empty() && href.contains(pattern.as_str()))
    }
}
