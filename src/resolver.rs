use crate::config::Config;
use crate::fetcher::Fetcher;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, error};

static APP_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"id=([a-zA-Z0-9._]+)").expect("valid app id pattern"));

/// Resolves a free-text query or package identifier to a canonical app id
///
/// Identifiers are dotted (reverse-domain style), so any input containing a
/// `.` is accepted as-is. Anything else triggers a store search whose first
/// "app details" link provides the identifier. Returns `None` when the search
/// fails or yields no match; the caller treats that as a terminal
/// "app not found" with no retry.
pub async fn resolve_app_id(fetcher: &Fetcher, config: &Config, query: &str) -> Option<String> {
    let query = query.trim();
    if query.contains('.') {
        debug!("query {} looks like a package id, skipping search", query);
        return Some(query.to_string());
    }

    let encoded: String = url::form_urlencoded::byte_serialize(query.as_bytes()).collect();
    let search_url = format!(
        "{}/store/search?q={}&c=apps&hl=en&gl=US",
        config.store_base_url, encoded
    );

    let html = match fetcher.get_html(&search_url).await {
        Ok(html) => html,
        Err(e) => {
            error!("app search failed for {}: {}", query, e);
            return None;
        }
    };

    parse_search_result(&html)
}

/// Extracts the identifier from the first app-details link in a search page
pub fn parse_search_result(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(r#"a[href*="/store/apps/details?id="]"#).ok()?;
    let href = document.select(&selector).next()?.value().attr("href")?;
    APP_ID_RE
        .captures(href)
        .map(|captures| captures[1].to_string())
}
