//! Store listing extraction
//!
//! Parses a store listing page into structured metadata. The embedded
//! schema.org `SoftwareApplication` JSON-LD block is the preferred source;
//! every field falls back to a DOM heuristic when the block is absent or
//! missing that field. Fallback order is part of the contract and must not
//! be reordered.

use crate::config::Config;
use crate::error::{PipelineError, Result};
use crate::fetcher::Fetcher;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use tracing::error;
use url::Url;

static DOWNLOADS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)([0-9][0-9.,]*\s*[kKmMbB]?\+?)\s*downloads").expect("valid downloads pattern")
});

/// Structured metadata scraped from one store listing page
///
/// Created once per resolution and never mutated afterwards; it lives only
/// as long as its cache entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListingMetadata {
    /// Display name of the app
    pub app_name: Option<String>,
    /// Developer / publisher name
    pub developer: Option<String>,
    /// Canonical package identifier
    pub package_id: String,
    /// Store category (only available from the structured block)
    pub category: Option<String>,
    /// Display string like "1.2M+ downloads"
    pub downloads: Option<String>,
    /// Aggregate rating value as displayed
    pub rating_value: Option<String>,
    /// Aggregate rating count (only available from the structured block)
    pub rating_count: Option<String>,
    /// Content rating (only available from the structured block)
    pub content_rating: Option<String>,
    /// App icon URL
    pub icon: Option<String>,
    /// Privacy policy link, preferring developer-owned over store-hosted
    pub privacy_policy_url: Option<String>,
    /// Developer website from the "visit website" link
    pub developer_website: Option<String>,
    /// Developer contact address from the first mailto link
    pub developer_email: Option<String>,
    /// The listing URL that was scraped
    pub store_url: String,
    /// Whitespace-collapsed visible page text, kept as a last-resort input
    /// for policy extraction; never serialized into responses
    #[serde(skip)]
    pub store_text: Option<String>,
}

/// Fetches and parses the listing page for a canonical identifier
///
/// Any fetch or parse failure is terminal for the request: it is logged and
/// surfaced as a listing error, which the HTTP layer maps to a 500.
pub async fn fetch_listing(
    fetcher: &Fetcher,
    config: &Config,
    app_id: &str,
) -> Result<ListingMetadata> {
    let url = format!(
        "{}/store/apps/details?id={}&hl=en&gl=US",
        config.store_base_url, app_id
    );

    let html = fetcher.get_html(&url).await.map_err(|e| {
        error!("scraping failed for {}: {}", app_id, e);
        PipelineError::Listing(e.to_string())
    })?;

    Ok(parse_listing(&html, app_id, &url, config))
}

/// Parses a listing page into metadata; pure over the HTML string
pub fn parse_listing(html: &str, app_id: &str, store_url: &str, config: &Config) -> ListingMetadata {
    let document = Html::parse_document(html);
    let structured = structured_block(&document);

    let app_name = json_str(&structured, &["name"])
        .or_else(|| first_text(&document, "h1 span"));
    let developer = json_str(&structured, &["author", "name"])
        .or_else(|| first_text(&document, "div.Vbfug.auoIOc span a, a.hrTbp"));
    let category = json_str(&structured, &["applicationCategory"]);
    let rating_value = json_str(&structured, &["aggregateRating", "ratingValue"])
        .or_else(|| first_text(&document, "div.TT9eCd"));
    let rating_count = json_str(&structured, &["aggregateRating", "ratingCount"]);
    let content_rating = json_str(&structured, &["contentRating"]);
    let icon = json_str(&structured, &["image"])
        .or_else(|| first_attr(&document, "img.T75of", "src"));

    let (developer_website, developer_email) = developer_contacts(&document);

    ListingMetadata {
        app_name,
        developer,
        package_id: app_id.to_string(),
        category,
        downloads: extract_downloads(&document),
        rating_value,
        rating_count,
        content_rating,
        icon,
        privacy_policy_url: extract_privacy_policy_url(&document, config),
        developer_website,
        developer_email,
        store_url: store_url.to_string(),
        store_text: body_text(&document),
    }
}

/// Finds the embedded JSON-LD block whose `@type` is `SoftwareApplication`
fn structured_block(document: &Html) -> Option<Value> {
    let selector = Selector::parse(r#"script[type="application/ld+json"]"#).ok()?;
    for element in document.select(&selector) {
        let raw: String = element.text().collect();
        if let Ok(json) = serde_json::from_str::<Value>(&raw) {
            if json.get("@type").and_then(Value::as_str) == Some("SoftwareApplication") {
                return Some(json);
            }
        }
    }
    None
}

/// Walks a path into a JSON value, rendering strings and numbers as text
fn json_str(root: &Option<Value>, path: &[&str]) -> Option<String> {
    let mut current = root.as_ref()?;
    for key in path {
        current = current.get(key)?;
    }
    match current {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn first_text(document: &Html, css: &str) -> Option<String> {
    let selector = Selector::parse(css).ok()?;
    let element = document.select(&selector).next()?;
    let text: String = element.text().collect::<String>().trim().to_string();
    (!text.is_empty()).then_some(text)
}

fn first_attr(document: &Html, css: &str, attr: &str) -> Option<String> {
    let selector = Selector::parse(css).ok()?;
    document
        .select(&selector)
        .next()?
        .value()
        .attr(attr)
        .map(str::to_string)
}

/// Scans all block/inline text for a `<number><suffix>? downloads` pattern
///
/// The first case-insensitively-unique match in document traversal order
/// wins; matches are positional, never ranked by magnitude.
fn extract_downloads(document: &Html) -> Option<String> {
    let selector = Selector::parse("div, span").ok()?;
    let mut seen = HashSet::new();

    for element in document.select(&selector) {
        let text: String = element.text().collect();
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        if let Some(captures) = DOWNLOADS_RE.captures(text) {
            let number: String = captures[1].split_whitespace().collect();
            let candidate = format!("{} downloads", number);
            if seen.insert(candidate.to_lowercase()) {
                return Some(candidate);
            }
        }
    }
    None
}

/// Collects privacy policy candidates in precedence order and picks one
///
/// Precedence: marker-class links in the "about this app" panel, then links
/// in that panel whose text mentions privacy, then any link whose href does.
/// Among resolved absolute candidates the first whose URL is not on the
/// store's own domain wins (developer-owned policy over store-hosted); else
/// the first candidate in extraction order.
fn extract_privacy_policy_url(document: &Html, config: &Config) -> Option<String> {
    let mut hrefs = collect_hrefs(document, "div.viuTPb a.GO2pB[href]", None);
    if hrefs.is_empty() {
        hrefs = collect_hrefs(document, "div.viuTPb a[href]", Some("privacy"));
    }
    if hrefs.is_empty() {
        hrefs = collect_hrefs(document, r#"a[href*="privacy"]"#, None);
    }

    let candidates: Vec<String> = hrefs
        .iter()
        .filter_map(|href| absolute_url(href, &config.store_base_url))
        .collect();

    let store_domain = config.store_domain.to_lowercase();
    candidates
        .iter()
        .find(|url| !url.to_lowercase().contains(&store_domain))
        .or_else(|| candidates.first())
        .cloned()
}

/// Gathers hrefs matching a selector, optionally filtered by visible text
fn collect_hrefs(document: &Html, css: &str, text_filter: Option<&str>) -> Vec<String> {
    let selector = match Selector::parse(css) {
        Ok(selector) => selector,
        Err(_) => return Vec::new(),
    };

    document
        .select(&selector)
        .filter(|element| match text_filter {
            Some(needle) => element
                .text()
                .collect::<String>()
                .to_lowercase()
                .contains(needle),
            None => true,
        })
        .filter_map(|element| element.value().attr("href"))
        .map(str::to_string)
        .collect()
}

/// Resolves an href to an absolute URL against the store base
///
/// Already-absolute http(s) hrefs pass through; anything unparseable is
/// dropped.
fn absolute_url(href: &str, base: &str) -> Option<String> {
    let lower = href.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return Some(href.to_string());
    }
    Url::parse(base).ok()?.join(href).ok().map(String::from)
}

/// Extracts the developer website and contact email links
fn developer_contacts(document: &Html) -> (Option<String>, Option<String>) {
    let website = website_link(document);

    let email = first_attr(document, r#"a[href^="mailto:"]"#, "href")
        .map(|href| href.trim_start_matches("mailto:").to_string())
        .filter(|address| !address.is_empty());

    (website, email)
}

fn website_link(document: &Html) -> Option<String> {
    let selector = Selector::parse(r#"a[href^="http"]"#).ok()?;
    document
        .select(&selector)
        .find(|element| {
            let text = element.text().collect::<String>().to_lowercase();
            text.contains("visit") && text.contains("website")
        })
        .and_then(|element: ElementRef| element.value().attr("href"))
        .map(str::to_string)
}

/// Whole-body visible text, whitespace-collapsed
fn body_text(document: &Html) -> Option<String> {
    let selector = Selector::parse("body").ok()?;
    let body = document.select(&selector).next()?;
    let text: String = body.text().collect::<Vec<_>>().join(" ");
    let collapsed: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    (!collapsed.is_empty()).then_some(collapsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(html: &str) -> ListingMetadata {
        parse_listing(
            html,
            "com.example.app",
            "https://play.google.com/store/apps/details?id=com.example.app&hl=en&gl=US",
            &Config::default(),
        )
    }

    const JSON_LD_PAGE: &str = r#"
        <html><body>
            <script type="application/ld+json">
            {
                "@type": "SoftwareApplication",
                "name": "Example App",
                "author": {"name": "Example Dev"},
                "applicationCategory": "SOCIAL",
                "contentRating": "Everyone",
                "image": "https://cdn.example.com/icon.png",
                "aggregateRating": {"ratingValue": 4.3, "ratingCount": 120345}
            }
            </script>
            <h1><span>Ignored Heading</span></h1>
        </body></html>
    "#;

    #[test]
    fn test_structured_block_is_preferred() {
        let listing = parse(JSON_LD_PAGE);
        assert_eq!(listing.app_name.as_deref(), Some("Example App"));
        assert_eq!(listing.developer.as_deref(), Some("Example Dev"));
        assert_eq!(listing.category.as_deref(), Some("SOCIAL"));
        assert_eq!(listing.rating_value.as_deref(), Some("4.3"));
        assert_eq!(listing.rating_count.as_deref(), Some("120345"));
        assert_eq!(listing.content_rating.as_deref(), Some("Everyone"));
        assert_eq!(listing.icon.as_deref(), Some("https://cdn.example.com/icon.png"));
    }

    #[test]
    fn test_dom_fallbacks_without_structured_block() {
        let html = r#"
            <html><body>
                <h1><span>Fallback App</span></h1>
                <a class="hrTbp" href="/dev">Fallback Dev</a>
                <div class="TT9eCd">4.7</div>
                <img class="T75of" src="https://cdn.example.com/fallback.png">
            </body></html>
        "#;
        let listing = parse(html);
        assert_eq!(listing.app_name.as_deref(), Some("Fallback App"));
        assert_eq!(listing.developer.as_deref(), Some("Fallback Dev"));
        assert_eq!(listing.rating_value.as_deref(), Some("4.7"));
        assert_eq!(listing.icon.as_deref(), Some("https://cdn.example.com/fallback.png"));
        // Category has no DOM fallback
        assert_eq!(listing.category, None);
    }

    #[test]
    fn test_malformed_json_ld_falls_back_to_dom() {
        let html = r#"
            <html><body>
                <script type="application/ld+json">{not json</script>
                <h1><span>Recovered App</span></h1>
            </body></html>
        "#;
        let listing = parse(html);
        assert_eq!(listing.app_name.as_deref(), Some("Recovered App"));
    }

    #[test]
    fn test_downloads_first_match_wins() {
        let html = r#"
            <html><body>
                <div>1.2M+ downloads</div>
                <span>500 downloads</span>
            </body></html>
        "#;
        let listing = parse(html);
        assert_eq!(listing.downloads.as_deref(), Some("1.2M+ downloads"));
    }

    #[test]
    fn test_downloads_inner_whitespace_collapsed() {
        let html = "<html><body><span>10 M+ Downloads</span></body></html>";
        let listing = parse(html);
        assert_eq!(listing.downloads.as_deref(), Some("10M+ downloads"));
    }

    #[test]
    fn test_privacy_url_prefers_non_store_domain() {
        let html = r#"
            <html><body><div class="viuTPb">
                <a class="GO2pB" href="https://play.google.com/about/privacy">Store policy</a>
                <a class="GO2pB" href="https://example.com/privacy">Developer policy</a>
                <a class="GO2pB" href="https://support.google.com/privacy">Another store link</a>
            </div></body></html>
        "#;
        let listing = parse(html);
        assert_eq!(
            listing.privacy_policy_url.as_deref(),
            Some("https://example.com/privacy")
        );
    }

    #[test]
    fn test_privacy_url_falls_back_to_first_candidate() {
        let html = r#"
            <html><body><div class="viuTPb">
                <a class="GO2pB" href="https://play.google.com/first">First</a>
                <a class="GO2pB" href="https://play.google.com/second">Second</a>
            </div></body></html>
        "#;
        let listing = parse(html);
        assert_eq!(
            listing.privacy_policy_url.as_deref(),
            Some("https://play.google.com/first")
        );
    }

    #[test]
    fn test_privacy_url_text_and_href_fallbacks() {
        // No marker-class links: panel links are filtered by visible text
        let panel = r#"
            <html><body><div class="viuTPb">
                <a href="/terms">Terms of service</a>
                <a href="/policy">Privacy policy</a>
            </div></body></html>
        "#;
        let listing = parse(panel);
        assert_eq!(
            listing.privacy_policy_url.as_deref(),
            Some("https://play.google.com/policy")
        );

        // No panel at all: any href containing "privacy" qualifies
        let page = r#"
            <html><body>
                <a href="https://example.com/privacy-notice">legal</a>
            </body></html>
        "#;
        let listing = parse(page);
        assert_eq!(
            listing.privacy_policy_url.as_deref(),
            Some("https://example.com/privacy-notice")
        );
    }

    #[test]
    fn test_relative_hrefs_resolve_against_store_base() {
        let html = r#"
            <html><body><div class="viuTPb">
                <a class="GO2pB" href="/intl/privacy">policy</a>
            </div></body></html>
        "#;
        let listing = parse(html);
        assert_eq!(
            listing.privacy_policy_url.as_deref(),
            Some("https://play.google.com/intl/privacy")
        );
    }

    #[test]
    fn test_developer_contacts() {
        let html = r#"
            <html><body>
                <a href="https://example.com">Visit website</a>
                <a href="mailto:dev@example.com">Support email</a>
            </body></html>
        "#;
        let listing = parse(html);
        assert_eq!(listing.developer_website.as_deref(), Some("https://example.com"));
        assert_eq!(listing.developer_email.as_deref(), Some("dev@example.com"));
    }

    #[test]
    fn test_store_text_is_collapsed() {
        let html = "<html><body><p>Some   app\n\n  description</p></body></html>";
        let listing = parse(html);
        assert_eq!(listing.store_text.as_deref(), Some("Some app description"));
    }

    #[test]
    fn test_store_text_not_serialized() {
        let listing = parse("<html><body>text</body></html>");
        let json = serde_json::to_value(&listing).unwrap();
        assert!(json.get("storeText").is_none());
        assert!(json.get("packageId").is_some());
    }
}
