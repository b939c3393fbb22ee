use serde::{Deserialize, Serialize};

/// A listing recovered from a search-results page.
///
/// `href` is the identity of a listing; every other field is best effort and
/// stays `None` when the page markup doesn't yield it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Listing {
    pub title: Option<String>,
    pub href: String,
    /// Raw price text, currency symbol and formatting untouched
    pub price: Option<String>,
    pub location: Option<String>,
}

impl Listing {
    pub fn new(href: impl Into<String>) -> Self {
        Self {
            title: None,
            href: href.into(),
            price: None,
            location: None,
        }
    }
}
