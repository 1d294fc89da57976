//! Privacy policy extraction
//!
//! Derives collected-data categories, sharing indicators, and security
//! practice flags from a policy document. A keyword heuristic pass always
//! runs as the baseline; a configured LLM classifier may enrich or override
//! it. When the policy page cannot be fetched, an explicit fallback chain
//! tries the developer website and then the store listing text before
//! settling on annotated defaults. Extraction never fails: every path ends
//! in a fully populated structure.

use crate::cache::PipelineCache;
use crate::classifier::{PolicyClassifier, PolicyJudgment};
use crate::config::Config;
use crate::error::{PipelineError, Result};
use crate::fetcher::Fetcher;
use crate::listing::ListingMetadata;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// Data-type keywords checked against the lower-cased policy text
pub const DATA_TYPE_KEYWORDS: &[&str] = &[
    "location", "email", "phone", "contact", "photo", "camera", "microphone",
    "payment", "credit card", "bank", "address", "birthday", "age", "gender",
    "message", "sms", "call", "browser history", "search history", "device id",
];

const SHARING_KEYWORDS: &[&str] = &["share", "third party", "partner"];

const COLLECTION_PURPOSE: &str = "App functionality";
const SHARING_TYPE: &str = "User data";
const SHARING_PURPOSE: &str = "Third-party services / analytics";

/// Elements whose text is stripped before keyword matching
const STRIPPED_TAGS: &[&str] = &["script", "style", "nav", "footer", "header", "iframe"];

/// One collected or shared data category with its stated purpose
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DataUse {
    /// Data category, e.g. "Location" or "Credit card"
    #[serde(rename = "type")]
    pub data_type: String,
    /// Why the data is used, as far as the policy states
    pub purpose: String,
}

/// Security practice flags derived from the policy
///
/// The four booleans are always present, default `false`, even on total
/// failure. `llm_summary` and `error` are annotations, not signals.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SecurityPractices {
    /// Policy mentions encryption in transit
    pub encrypted_in_transit: bool,
    /// Policy mentions secure connections
    pub secure_connection: bool,
    /// Policy offers a user-initiated deletion request
    pub user_data_deletion_request: bool,
    /// Policy names a developer-side deletion mechanism
    pub developer_data_deletion_mechanism: bool,
    /// Exactly four classifier-written highlights, when available
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_summary: Option<Vec<String>>,
    /// Soft-failure annotation carrying the underlying fetch error
    #[serde(rename = "__error", skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Privacy signals extracted from one policy document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PolicySignals {
    /// Leading slice of the cleaned policy text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_text_excerpt: Option<String>,
    /// Data categories the policy says are collected
    pub data_collected: Vec<DataUse>,
    /// Data categories the policy says are shared
    pub data_shared: Vec<DataUse>,
    /// Security practice flags
    pub security_practices: SecurityPractices,
}

/// The fallback text sources tried, in order, when the policy fetch fails
#[derive(Debug, Clone, Copy, PartialEq)]
enum FallbackSource {
    /// The developer's own website, when the listing carries one
    DeveloperSite,
    /// The store listing's visible page text
    StoreText,
}

/// Extracts [`PolicySignals`] for a listing
///
/// Borrows the shared fetcher, cache, and optional classifier; one extractor
/// serves one pipeline run.
pub struct PolicyExtractor<'a> {
    fetcher: &'a Fetcher,
    config: &'a Config,
    cache: &'a PipelineCache,
    classifier: Option<&'a dyn PolicyClassifier>,
}

impl<'a> PolicyExtractor<'a> {
    /// Creates an extractor over the pipeline's shared services
    pub fn new(
        fetcher: &'a Fetcher,
        config: &'a Config,
        cache: &'a PipelineCache,
        classifier: Option<&'a dyn PolicyClassifier>,
    ) -> Self {
        Self {
            fetcher,
            config,
            cache,
            classifier,
        }
    }

    /// Derives signals for the listing; never returns an error
    ///
    /// A missing policy link yields plain defaults without an error flag:
    /// the absence itself is meaningful data for the scorer.
    pub async fn extract(&self, listing: &ListingMetadata) -> PolicySignals {
        let url = match usable_url(listing.privacy_policy_url.as_deref()) {
            Some(url) => url,
            None => return PolicySignals::default(),
        };

        match self.primary(url).await {
            Ok(signals) => signals,
            Err(e) => {
                let cause = PipelineError::Policy(e.to_string());
                self.fall_back(listing, cause).await
            }
        }
    }

    /// Primary path: fetch the policy, run heuristics, enrich via the LLM
    async fn primary(&self, url: &str) -> Result<PolicySignals> {
        let html = self.fetcher.get_html(url).await?;
        let text = clean_policy_text(&html);

        let mut signals = heuristic_signals(&text);
        signals.raw_text_excerpt = excerpt(&text, self.config.excerpt_limit);

        if let Some(classifier) = self.classifier {
            if let Some(judgment) = self.classify_cached(classifier, url, &text).await {
                apply_judgment(&mut signals, &judgment);
            }
        }

        Ok(signals)
    }

    /// Runs the classifier with a judgment-cache lookup keyed by URL
    async fn classify_cached(
        &self,
        classifier: &dyn PolicyClassifier,
        key: &str,
        text: &str,
    ) -> Option<PolicyJudgment> {
        if let Some(judgment) = self.cache.get_judgment(key).await {
            debug!("judgment cache hit for {}", key);
            return Some(judgment);
        }

        let capped = cap_chars(text, self.config.classifier_input_limit);
        let judgment = classifier.classify(&capped).await?;
        self.cache.put_judgment(key, judgment.clone()).await;
        Some(judgment)
    }

    /// Walks the fallback chain after a primary fetch failure
    ///
    /// Each source is attempted exactly once, in a fixed order, with no
    /// retries within a step. A step succeeds only when the classifier
    /// produced a judgment; signals then come from that judgment alone and
    /// carry no error flag.
    async fn fall_back(&self, listing: &ListingMetadata, cause: PipelineError) -> PolicySignals {
        warn!("privacy scraping failed: {}", cause);

        for source in [FallbackSource::DeveloperSite, FallbackSource::StoreText] {
            if let Some(signals) = self.attempt(source, listing).await {
                debug!("fallback source {:?} produced signals", source);
                return signals;
            }
        }

        let mut signals = PolicySignals::default();
        signals.security_practices.error = Some(cause.to_string());
        signals
    }

    /// One fallback attempt: gather substitute text and classify it
    async fn attempt(
        &self,
        source: FallbackSource,
        listing: &ListingMetadata,
    ) -> Option<PolicySignals> {
        let classifier = self.classifier?;

        let (key, text) = match source {
            FallbackSource::DeveloperSite => {
                let url = usable_url(listing.developer_website.as_deref())?;
                let html = self.fetcher.get_html(url).await.ok()?;
                (url.to_string(), clean_policy_text(&html))
            }
            FallbackSource::StoreText => {
                (listing.store_url.clone(), listing.store_text.clone()?)
            }
        };
        if text.is_empty() {
            return None;
        }

        let judgment = self.classify_cached(classifier, &key, &text).await?;

        let mut signals = PolicySignals::default();
        apply_judgment(&mut signals, &judgment);
        Some(signals)
    }
}

/// Runs the keyword heuristics over cleaned policy text
pub fn heuristic_signals(text: &str) -> PolicySignals {
    let lower = text.to_lowercase();
    let mut signals = PolicySignals::default();

    for keyword in DATA_TYPE_KEYWORDS {
        if lower.contains(keyword) {
            signals.data_collected.push(DataUse {
                data_type: title_case(keyword),
                purpose: COLLECTION_PURPOSE.to_string(),
            });
        }
    }

    if SHARING_KEYWORDS.iter().any(|keyword| lower.contains(keyword)) {
        signals.data_shared.push(DataUse {
            data_type: SHARING_TYPE.to_string(),
            purpose: SHARING_PURPOSE.to_string(),
        });
    }

    signals.security_practices = SecurityPractices {
        encrypted_in_transit: lower.contains("encrypt")
            || lower.contains("ssl")
            || lower.contains("tls"),
        secure_connection: lower.contains("secure connection") || lower.contains("https"),
        user_data_deletion_request: lower.contains("delete") || lower.contains("remove data"),
        developer_data_deletion_mechanism: lower.contains("contact") && lower.contains("privacy"),
        ..SecurityPractices::default()
    };

    signals
}

/// Overlays a classifier judgment onto heuristic signals
///
/// Non-empty judgment lists replace the heuristic lists outright, never
/// merge; security flags are overlaid key-by-key where the judgment provides
/// them; the summary is normalized into exactly four bullets.
pub fn apply_judgment(signals: &mut PolicySignals, judgment: &PolicyJudgment) {
    if !judgment.data_collected.is_empty() {
        signals.data_collected = judgment
            .data_collected
            .iter()
            .map(|data_type| DataUse {
                data_type: data_type.clone(),
                purpose: COLLECTION_PURPOSE.to_string(),
            })
            .collect();
    }

    if !judgment.data_shared.is_empty() {
        signals.data_shared = judgment
            .data_shared
            .iter()
            .map(|data_type| DataUse {
                data_type: data_type.clone(),
                purpose: SHARING_PURPOSE.to_string(),
            })
            .collect();
    }

    if let Some(practices) = &judgment.security_practices {
        let flags = &mut signals.security_practices;
        if let Some(value) = practices.encrypted_in_transit {
            flags.encrypted_in_transit = value;
        }
        if let Some(value) = practices.secure_connection {
            flags.secure_connection = value;
        }
        if let Some(value) = practices.user_data_deletion_request {
            flags.user_data_deletion_request = value;
        }
        if let Some(value) = practices.developer_data_deletion_mechanism {
            flags.developer_data_deletion_mechanism = value;
        }
    }

    if let Some(summary) = &judgment.summary {
        if let Some(bullets) = normalize_summary(summary) {
            signals.security_practices.llm_summary = Some(bullets);
        }
    }
}

/// Normalizes a judgment summary into exactly four trimmed non-empty strings
///
/// Array input is truncated or padded by repeating the last entry. String
/// input is parsed as a JSON array when possible, else split by lines, else
/// split at sentence boundaries and distributed round-robin into four
/// buckets.
pub fn normalize_summary(value: &Value) -> Option<Vec<String>> {
    let mut items = match value {
        Value::Array(entries) => string_items(entries),
        Value::String(text) => summary_items_from_text(text),
        _ => return None,
    };

    if items.is_empty() {
        return None;
    }
    items.truncate(4);
    while items.len() < 4 {
        let last = items.last().cloned()?;
        items.push(last);
    }
    Some(items)
}

fn string_items(entries: &[Value]) -> Vec<String> {
    entries
        .iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect()
}

fn summary_items_from_text(text: &str) -> Vec<String> {
    if let Ok(Value::Array(entries)) = serde_json::from_str::<Value>(text) {
        return string_items(&entries);
    }

    let lines: Vec<String> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect();
    if lines.len() > 1 {
        return lines;
    }

    // Single line: distribute sentences round-robin into four buckets
    let mut buckets: Vec<Vec<&str>> = vec![Vec::new(); 4];
    for (index, sentence) in text
        .split_inclusive(['.', '!', '?'])
        .map(str::trim)
        .filter(|sentence| !sentence.is_empty())
        .enumerate()
    {
        buckets[index % 4].push(sentence);
    }

    buckets
        .into_iter()
        .map(|bucket| bucket.join(" "))
        .filter(|bucket| !bucket.is_empty())
        .collect()
}

/// Strips boilerplate elements and collapses the remaining visible text
pub fn clean_policy_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let selector = match Selector::parse("body") {
        Ok(selector) => selector,
        Err(_) => return String::new(),
    };

    let mut out = String::new();
    if let Some(body) = document.select(&selector).next() {
        collect_visible_text(body, &mut out);
    }

    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn collect_visible_text(element: ElementRef, out: &mut String) {
    if STRIPPED_TAGS.contains(&element.value().name()) {
        return;
    }
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
            out.push(' ');
        } else if let Some(child_element) = ElementRef::wrap(child) {
            collect_visible_text(child_element, out);
        }
    }
}

/// Accepts only absolute http(s) URLs as policy sources
fn usable_url(url: Option<&str>) -> Option<&str> {
    let url = url?;
    let lower = url.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        Some(url)
    } else {
        None
    }
}

fn excerpt(text: &str, limit: usize) -> Option<String> {
    if text.is_empty() {
        return None;
    }
    Some(cap_chars(text, limit))
}

fn cap_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

fn title_case(keyword: &str) -> String {
    let mut chars = keyword.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_heuristic_data_types() {
        let signals =
            heuristic_signals("We collect your email and location. Payment via credit card.");
        let types: Vec<&str> = signals
            .data_collected
            .iter()
            .map(|use_| use_.data_type.as_str())
            .collect();
        assert_eq!(types, vec!["Location", "Email", "Payment", "Credit card"]);
        assert!(signals
            .data_collected
            .iter()
            .all(|use_| use_.purpose == "App functionality"));
    }

    #[test]
    fn test_heuristic_sharing_indicator() {
        let shared = heuristic_signals("We share information with partners.");
        assert_eq!(shared.data_shared.len(), 1);
        assert_eq!(shared.data_shared[0].data_type, "User data");
        assert_eq!(shared.data_shared[0].purpose, "Third-party services / analytics");

        let unshared = heuristic_signals("We keep everything to ourselves.");
        assert!(unshared.data_shared.is_empty());
    }

    #[test]
    fn test_heuristic_security_flags() {
        let signals = heuristic_signals(
            "Data is encrypted over a secure connection. Contact us about privacy. \
             You may delete your account.",
        );
        let practices = &signals.security_practices;
        assert!(practices.encrypted_in_transit);
        assert!(practices.secure_connection);
        assert!(practices.user_data_deletion_request);
        assert!(practices.developer_data_deletion_mechanism);
    }

    #[test]
    fn test_deletion_mechanism_needs_both_keywords() {
        let signals = heuristic_signals("contact us any time");
        assert!(!signals.security_practices.developer_data_deletion_mechanism);

        let signals = heuristic_signals("our privacy commitments");
        assert!(!signals.security_practices.developer_data_deletion_mechanism);
    }

    #[test]
    fn test_defaults_have_all_four_flags() {
        let signals = PolicySignals::default();
        let json = serde_json::to_value(&signals.security_practices).unwrap();
        for key in [
            "encryptedInTransit",
            "secureConnection",
            "userDataDeletionRequest",
            "developerDataDeletionMechanism",
        ] {
            assert_eq!(json.get(key), Some(&Value::Bool(false)), "missing {}", key);
        }
        assert!(json.get("llmSummary").is_none());
        assert!(json.get("__error").is_none());
    }

    #[test]
    fn test_judgment_lists_replace_not_merge() {
        let mut signals = heuristic_signals("we collect your email");
        assert_eq!(signals.data_collected[0].data_type, "Email");

        let judgment = PolicyJudgment {
            data_collected: vec!["Location".into(), "Phone".into()],
            ..PolicyJudgment::default()
        };
        apply_judgment(&mut signals, &judgment);

        let types: Vec<&str> = signals
            .data_collected
            .iter()
            .map(|use_| use_.data_type.as_str())
            .collect();
        assert_eq!(types, vec!["Location", "Phone"]);
    }

    #[test]
    fn test_empty_judgment_lists_keep_heuristics() {
        let mut signals = heuristic_signals("we collect your email and share it");
        let judgment = PolicyJudgment::default();
        apply_judgment(&mut signals, &judgment);
        assert_eq!(signals.data_collected[0].data_type, "Email");
        assert_eq!(signals.data_shared.len(), 1);
    }

    #[test]
    fn test_security_flags_overlay_per_key() {
        let mut signals = heuristic_signals("encrypted over https");
        assert!(signals.security_practices.encrypted_in_transit);
        assert!(signals.security_practices.secure_connection);

        let judgment = crate::classifier::parse_judgment(
            r#"{"securityPractices":{"encryptedInTransit":false,"userDataDeletionRequest":true}}"#,
        )
        .unwrap();
        apply_judgment(&mut signals, &judgment);

        let practices = &signals.security_practices;
        // Provided keys win, absent keys keep the heuristic verdict
        assert!(!practices.encrypted_in_transit);
        assert!(practices.secure_connection);
        assert!(practices.user_data_deletion_request);
    }

    #[test]
    fn test_normalize_summary_array_truncates_and_pads() {
        let five = serde_json::json!(["a", "b", "c", "d", "e"]);
        assert_eq!(normalize_summary(&five).unwrap(), vec!["a", "b", "c", "d"]);

        let two = serde_json::json!([" a ", "b"]);
        assert_eq!(normalize_summary(&two).unwrap(), vec!["a", "b", "b", "b"]);
    }

    #[test]
    fn test_normalize_summary_string_forms() {
        let embedded = Value::String(r#"["one","two","three","four"]"#.to_string());
        assert_eq!(
            normalize_summary(&embedded).unwrap(),
            vec!["one", "two", "three", "four"]
        );

        let lines = Value::String("first\nsecond\nthird\nfourth\nfifth".to_string());
        assert_eq!(
            normalize_summary(&lines).unwrap(),
            vec!["first", "second", "third", "fourth"]
        );

        let prose = Value::String(
            "One. Two. Three. Four. Five. Six.".to_string(),
        );
        let bullets = normalize_summary(&prose).unwrap();
        assert_eq!(bullets.len(), 4);
        // Sentences are distributed round-robin, so the fifth lands in bucket one
        assert_eq!(bullets[0], "One. Five.");
        assert_eq!(bullets[1], "Two. Six.");
    }

    #[test]
    fn test_normalize_summary_rejects_empty_and_non_text() {
        assert_eq!(normalize_summary(&serde_json::json!([])), None);
        assert_eq!(normalize_summary(&serde_json::json!(42)), None);
        assert_eq!(normalize_summary(&Value::String("   ".into())), None);
    }

    #[test]
    fn test_clean_policy_text_strips_boilerplate() {
        let html = r#"
            <html><body>
                <nav>Navigation junk</nav>
                <script>var tracking = true;</script>
                <style>.hidden {}</style>
                <p>We   collect  location data.</p>
                <footer>Footer junk</footer>
            </body></html>
        "#;
        let text = clean_policy_text(html);
        assert_eq!(text, "We collect location data.");
    }

    #[test]
    fn test_usable_url() {
        assert_eq!(usable_url(Some("https://example.com/p")), Some("https://example.com/p"));
        assert_eq!(usable_url(Some("HTTP://example.com")), Some("HTTP://example.com"));
        assert_eq!(usable_url(Some("ftp://example.com")), None);
        assert_eq!(usable_url(Some("/relative/privacy")), None);
        assert_eq!(usable_url(None), None);
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("credit card"), "Credit card");
        assert_eq!(title_case("sms"), "Sms");
    }

    #[test]
    fn test_excerpt_caps_length() {
        let text = "x".repeat(5000);
        assert_eq!(excerpt(&text, 3000).unwrap().len(), 3000);
        assert_eq!(excerpt("", 3000), None);
    }
}
