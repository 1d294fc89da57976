use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Main configuration struct for the application
///
/// Holds the store origin to scrape, network timeouts, cache lifetimes, and
/// the HTTP surface settings. Everything is environment-driven with sensible
/// defaults so the service runs without any configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Origin of the app store to scrape (search and listing pages)
    pub store_base_url: String,
    /// Domain treated as store-owned when picking privacy policy candidates
    pub store_domain: String,
    /// Timeout for scraping fetches (store search, listing, policy pages)
    pub fetch_timeout: Duration,
    /// Timeout for the LLM classifier call
    pub llm_timeout: Duration,
    /// Time-to-live for cached composite results
    pub result_ttl: Duration,
    /// Time-to-live for cached LLM judgments, keyed by policy URL
    pub judgment_ttl: Duration,
    /// Maximum length of the raw policy text excerpt kept in the result
    pub excerpt_limit: usize,
    /// Maximum number of characters submitted to the classifier
    pub classifier_input_limit: usize,
    /// Requests allowed per rate-limit window, per client
    pub rate_limit_requests: usize,
    /// Length of the fixed rate-limit window
    pub rate_limit_window: Duration,
    /// Address the HTTP server binds to
    pub bind_addr: String,
}

impl Config {
    /// Builds a configuration from environment variables, falling back to
    /// defaults for anything unset
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(base) = std::env::var("STORE_BASE_URL") {
            config.store_base_url = base.trim_end_matches('/').to_string();
            if let Some(domain) = host_of(&config.store_base_url) {
                config.store_domain = domain;
            }
        }
        if let Ok(port) = std::env::var("PORT") {
            if let Ok(port) = port.parse::<u16>() {
                config.bind_addr = format!("0.0.0.0:{}", port);
            }
        }

        config
    }

    /// Validates the configuration before the pipeline starts
    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.store_base_url)
            .map_err(|e| PipelineError::Config(format!("invalid store base URL: {}", e)))?;
        if self.rate_limit_requests == 0 {
            return Err(PipelineError::Config("rate limit must allow at least one request".into()));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_base_url: "https://play.google.com".to_string(),
            store_domain: "google.com".to_string(),
            fetch_timeout: Duration::from_secs(12),
            llm_timeout: Duration::from_secs(30),
            result_ttl: Duration::from_secs(3600),
            judgment_ttl: Duration::from_secs(86400),
            excerpt_limit: 3000,
            classifier_input_limit: 25000,
            rate_limit_requests: 50,
            rate_limit_window: Duration::from_secs(15 * 60),
            bind_addr: "0.0.0.0:3001".to_string(),
        }
    }
}

/// Extracts the registrable host of a URL, dropping a leading `www.`
fn host_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    Some(host.trim_start_matches("www.").to_string())
}
