use crate::models::Listing;
use crate::scrapers::rules::{ExtractionRules, Matcher};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Elements that start a new line in rendered text
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "dd", "div", "dl", "dt", "figcaption",
    "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li",
    "main", "nav", "ol", "p", "pre", "section", "table", "tr", "ul",
];

/// Elements whose text never renders
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// A matcher with its selector parsed
struct CompiledMatcher {
    selector: Selector,
    contains: Option<String>,
}

impl CompiledMatcher {
    /// Compile a matcher, or `None` when its selector doesn't parse.
    /// A broken rule only disables itself.
    fn compile(matcher: &Matcher) -> Option<Self> {
        let selector = match Selector::parse(matcher.selector()) {
            Ok(selector) => selector,
            Err(e) => {
                warn!("Ignoring matcher with invalid selector '{}': {}", matcher.selector(), e);
                return None;
            }
        };
        let contains = match matcher {
            Matcher::Css { .. } => None,
            Matcher::Text { contains, .. } => Some(contains.to_lowercase()),
        };
        Some(Self { selector, contains })
    }

    /// Text of the first element under `scope` satisfying this matcher
    fn find(&self, scope: ElementRef<'_>) -> Option<String> {
        scope
            .select(&self.selector)
            .map(rendered_text)
            .find(|text| match &self.contains {
                Some(needle) => text.to_lowercase().contains(needle.as_str()),
                None => true,
            })
            .map(|text| normalize_lines(&text))
            .filter(|text| !text.is_empty())
    }
}

/// Recovers listings from a rendered search-results page
pub struct ListingExtractor {
    rules: ExtractionRules,
    price: Vec<CompiledMatcher>,
    location: Vec<CompiledMatcher>,
}

impl ListingExtractor {
    pub fn new(rules: &ExtractionRules) -> Self {
        Self {
            rules: rules.clone(),
            price: rules.price.iter().filter_map(CompiledMatcher::compile).collect(),
            location: rules
                .location
                .iter()
                .filter_map(CompiledMatcher::compile)
                .collect(),
        }
    }

    /// Extract, deduplicate and cap the listings found in `html`.
    ///
    /// Finding nothing is a valid outcome and yields an empty vector.
    pub fn extract(&self, html: &str, max_items: usize) -> Vec<Listing> {
        let document = Html::parse_document(html);
        let candidates = self.candidates(&document);
        let found = candidates.len();

        let mut listings = dedup_by_href(candidates);
        let unique = listings.len();
        listings.truncate(max_items);

        info!(
            "Extracted {} listings ({} candidates, {} unique, cap {})",
            listings.len(),
            found,
            unique,
            max_items
        );
        listings
    }

    /// Every qualifying anchor in document order, duplicates included
    pub fn candidates(&self, document: &Html) -> Vec<Listing> {
        let mut candidates = Vec::new();

        for anchor in document
            .root_element()
            .descendants()
            .filter_map(ElementRef::wrap)
            .filter(|el| el.value().name() == "a")
        {
            let href = anchor.value().attr("href").unwrap_or("").trim();
            if href.is_empty() || !self.rules.is_listing_link(href) {
                continue;
            }

            let listing = Listing {
                title: title_of(anchor),
                price: self.price_of(anchor),
                location: self.location_of(anchor),
                ..Listing::new(href)
            };
            debug!("Candidate: {:?}", listing);
            candidates.push(listing);
        }

        candidates
    }

    fn price_of(&self, anchor: ElementRef<'_>) -> Option<String> {
        first_match(&self.price, anchor)
    }

    fn location_of(&self, anchor: ElementRef<'_>) -> Option<String> {
        let block = anchor.ancestors().filter_map(ElementRef::wrap).find(|el| {
            let name = el.value().name();
            self.rules
                .location_scope
                .iter()
                .any(|tag| tag.eq_ignore_ascii_case(name))
        })?;
        first_match(&self.location, block)
    }
}

/// First non-empty line of the anchor's rendered text
fn title_of(anchor: ElementRef<'_>) -> Option<String> {
    rendered_text(anchor)
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

fn first_match(matchers: &[CompiledMatcher], scope: ElementRef<'_>) -> Option<String> {
    matchers.iter().find_map(|matcher| matcher.find(scope))
}

/// Keep the first listing for each href, preserving discovery order
pub fn dedup_by_href(listings: Vec<Listing>) -> Vec<Listing> {
    let mut seen = HashSet::new();
    listings
        .into_iter()
        .filter(|listing| seen.insert(listing.href.clone()))
        .collect()
}

/// One pending step of the rendered-text walk
enum TextStep<'a> {
    Element(ElementRef<'a>),
    Text(&'a str),
    LineBreak,
}

/// Approximate the browser's rendered text: whitespace collapses, block
/// elements and `<br>` break lines, script-like elements are skipped.
///
/// Walks with an explicit stack so nesting depth is bounded by the heap,
/// not the thread stack.
fn rendered_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    let mut stack = Vec::new();
    push_children(element, &mut stack);

    while let Some(step) = stack.pop() {
        match step {
            TextStep::Text(text) => push_collapsed(&mut out, text),
            TextStep::LineBreak => out.push('\n'),
            TextStep::Element(child) => {
                let name = child.value().name();
                if name == "br" {
                    out.push('\n');
                } else if HIDDEN_ELEMENTS.contains(&name) {
                    continue;
                } else if BLOCK_ELEMENTS.contains(&name) {
                    out.push('\n');
                    stack.push(TextStep::LineBreak);
                    push_children(child, &mut stack);
                } else {
                    push_children(child, &mut stack);
                }
            }
        }
    }
    out
}

/// Push `element`'s children so they pop in document order
fn push_children<'a>(element: ElementRef<'a>, stack: &mut Vec<TextStep<'a>>) {
    let start = stack.len();
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            stack.push(TextStep::Text(&**text));
        } else if let Some(child) = ElementRef::wrap(child) {
            stack.push(TextStep::Element(child));
        }
    }
    stack[start..].reverse();
}

/// Collapse runs of HTML whitespace. Non-breaking spaces are content.
fn push_collapsed(out: &mut String, text: &str) {
    for ch in text.chars() {
        if ch.is_ascii_whitespace() {
            if !out.is_empty() && !out.ends_with(' ') && !out.ends_with('\n') {
                out.push(' ');
            }
        } else {
            out.push(ch);
        }
    }
}

fn normalize_lines(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(html: &str, max_items: usize) -> Vec<Listing> {
        ListingExtractor::new(&ExtractionRules::default()).extract(html, max_items)
    }

    #[test]
    fn test_example_scenario() {
        let html = r#"
            <ul>
                <li>
                    <a href="/item/123"><div>Car Cover</div><span>₹500</span></a>
                </li>
                <li>
                    <a href="/item/123">Car Cover again</a>
                </li>
                <li>
                    <a href="/other/999">Waterproof cover
                        <br>Used twice</a>
                    <span data-aut-id="itemLocation">Pune, Maharashtra</span>
                </li>
            </ul>
        "#;
        let mut rules = ExtractionRules::default();
        rules.link_patterns = vec!["/item".to_string(), "/other".to_string()];
        let listings = ListingExtractor::new(&rules).extract(html, 200);

        assert_eq!(listings.len(), 2);
        assert_eq!(
            listings[0],
            Listing {
                title: Some("Car Cover".to_string()),
                href: "/item/123".to_string(),
                price: Some("₹500".to_string()),
                location: None,
            }
        );
        assert_eq!(listings[1].href, "/other/999");
        assert_eq!(listings[1].title.as_deref(), Some("Waterproof cover"));
        assert_eq!(listings[1].price, None);
        assert_eq!(listings[1].location.as_deref(), Some("Pune, Maharashtra"));
    }

    #[test]
    fn test_default_patterns_skip_unrelated_links() {
        let html = r#"
            <a href="/item/1">One</a>
            <a href="/help">Help</a>
            <a href="/other/999">Other</a>
            <a href="https://www.olx.in/items/q-car-cover">Search</a>
        "#;
        let hrefs: Vec<_> = extract(html, 200).into_iter().map(|l| l.href).collect();
        assert_eq!(hrefs, vec!["/item/1", "https://www.olx.in/items/q-car-cover"]);
    }

    #[test]
    fn test_dedup_keeps_first_occurrence_in_order() {
        let html = r#"
            <a href="/item/b">B first</a>
            <a href="/item/a">A</a>
            <a href="/item/b">B second</a>
            <a href="/item/c">C</a>
            <a href="/item/a">A again</a>
        "#;
        let listings = extract(html, 200);
        let hrefs: Vec<_> = listings.iter().map(|l| l.href.as_str()).collect();
        assert_eq!(hrefs, vec!["/item/b", "/item/a", "/item/c"]);
        assert_eq!(listings[0].title.as_deref(), Some("B first"));
    }

    #[test]
    fn test_dedup_by_href_is_idempotent() {
        let listings = vec![
            Listing::new("/item/1"),
            Listing::new("/item/2"),
            Listing::new("/item/1"),
        ];
        let once = dedup_by_href(listings);
        let twice = dedup_by_href(once.clone());
        assert_eq!(once, twice);
        assert_eq!(once.len(), 2);
    }

    #[test]
    fn test_cap_truncates_tail() {
        let html: String = (0..10)
            .map(|i| format!(r#"<a href="/item/{i}">Item {i}</a>"#))
            .collect();

        let capped = extract(&html, 3);
        let hrefs: Vec<_> = capped.iter().map(|l| l.href.as_str()).collect();
        assert_eq!(hrefs, vec!["/item/0", "/item/1", "/item/2"]);

        assert_eq!(extract(&html, 50).len(), 10);
        assert!(extract(&html, 0).is_empty());
    }

    #[test]
    fn test_cap_applies_after_dedup() {
        let html = r#"
            <a href="/item/1">1</a><a href="/item/1">1</a><a href="/item/1">1</a>
            <a href="/item/2">2</a><a href="/item/3">3</a>
        "#;
        let hrefs: Vec<_> = extract(html, 2).into_iter().map(|l| l.href).collect();
        assert_eq!(hrefs, vec!["/item/1", "/item/2"]);
    }

    #[test]
    fn test_empty_href_never_emitted() {
        let html = r#"
            <a href="">/item/ in text only <span class="price">₹1</span></a>
            <a href="   ">blank</a>
            <a>no href /item/</a>
        "#;
        assert!(extract(html, 200).is_empty());
    }

    #[test]
    fn test_partial_fields_are_kept() {
        let html = r#"<div><a href="/item/7"></a></div>"#;
        let listings = extract(html, 200);
        assert_eq!(listings, vec![Listing::new("/item/7")]);
    }

    #[test]
    fn test_no_matches_is_empty_not_error() {
        assert!(extract("<html><body><p>Nothing here</p></body></html>", 200).is_empty());
        assert!(extract("", 200).is_empty());
    }

    #[test]
    fn test_price_class_selector_wins_over_text_marker() {
        let html = r#"
            <a href="/item/1">
                <span>Was ₹900</span>
                <span class="_89yzn">₹ 750</span>
            </a>
        "#;
        let listings = extract(html, 200);
        assert_eq!(listings[0].price.as_deref(), Some("₹ 750"));
    }

    #[test]
    fn test_price_falls_back_to_currency_code() {
        let html = r#"<a href="/item/1"><span>Cover</span><span>inr 1,200</span></a>"#;
        let listings = extract(html, 200);
        assert_eq!(listings[0].price.as_deref(), Some("inr 1,200"));
    }

    #[test]
    fn test_price_outside_anchor_is_ignored() {
        let html = r#"<li><a href="/item/1">Cover</a><span>₹500</span></li>"#;
        let listings = extract(html, 200);
        assert_eq!(listings[0].price, None);
    }

    #[test]
    fn test_location_uses_nearest_block_ancestor() {
        let html = r#"
            <div class="grid">
                <span class="tjgMj">Wrong, outer block</span>
                <li>
                    <a href="/item/1">Cover</a>
                    <span class="_2FBdJ">Kochi, Kerala</span>
                </li>
                <li>
                    <a href="/item/2">Other cover</a>
                </li>
            </div>
        "#;
        let listings = extract(html, 200);
        assert_eq!(listings[0].location.as_deref(), Some("Kochi, Kerala"));
        assert_eq!(listings[1].location, None);
    }

    #[test]
    fn test_invalid_matcher_only_disables_itself() {
        let mut rules = ExtractionRules::default();
        rules.price.insert(0, Matcher::css("span[[["));
        let html = r#"<a href="/item/1">Cover <span class="price">₹10</span></a>"#;
        let listings = ListingExtractor::new(&rules).extract(html, 200);
        assert_eq!(listings[0].price.as_deref(), Some("₹10"));
    }

    #[test]
    fn test_empty_price_element_falls_through() {
        let html = r#"<a href="/item/1"><span class="price"> </span><span>₹42</span></a>"#;
        let listings = extract(html, 200);
        assert_eq!(listings[0].price.as_deref(), Some("₹42"));
    }

    #[test]
    fn test_title_ignores_scripts_and_collapses_whitespace() {
        let html = r#"
            <a href="/item/1"><script>var x = 1;</script>
                <h3>  Premium
                    car   cover </h3>
                <p>Second line</p>
            </a>
        "#;
        let listings = extract(html, 200);
        assert_eq!(listings[0].title.as_deref(), Some("Premium car cover"));
    }

    #[test]
    fn test_non_ascii_text_is_preserved() {
        let html = r#"<a href="/item/1"><div>कार कवर</div><span>₹ 1,499</span></a>"#;
        let listings = extract(html, 200);
        assert_eq!(listings[0].title.as_deref(), Some("कार कवर"));
        assert_eq!(listings[0].price.as_deref(), Some("₹ 1,499"));
    }

    #[test]
    fn test_non_breaking_space_is_kept_in_price() {
        let html = "<a href=\"/item/1\"><div>Cover</div><span>₹&nbsp;500</span></a>";
        let listings = extract(html, 200);
        assert_eq!(listings[0].price.as_deref(), Some("₹\u{a0}500"));
    }

    #[test]
    fn test_deeply_nested_anchor_text() {
        let depth = 50_000;
        let html = format!(
            r#"<a href="/item/1">{}Deep cover{}</a>"#,
            "<span>".repeat(depth),
            "</span>".repeat(depth)
        );
        let document = Html::parse_document(&html);
        let anchor = document
            .root_element()
            .descendants()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().name() == "a")
            .unwrap();

        assert_eq!(title_of(anchor).as_deref(), Some("Deep cover"));
    }

    #[test]
    fn test_block_line_breaks_keep_document_order() {
        let html = r#"<a href="/item/1">lead <p>first</p>tail<div><b>second</b></div></a>"#;
        let document = Html::parse_document(html);
        let anchor = document
            .root_element()
            .descendants()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().name() == "a")
            .unwrap();

        assert_eq!(
            normalize_lines(&rendered_text(anchor)),
            "lead\nfirst\ntail\nsecond"
        );
    }
}
