use crate::error::Result;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Browser-like user agent; the store serves a reduced page to unknown bots
const USER_AGENT: &str = "Mozilla/5.0";

/// Outbound HTTP GET client with a fixed timeout and browser-like headers
///
/// Every network call in the pipeline goes through this client. Timeouts are
/// treated as failures by the caller; nothing is retried.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    /// Creates a fetcher whose requests all time out after `timeout`
    pub fn new(timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self { client })
    }

    /// Fetches a URL and returns the raw response body
    ///
    /// Non-2xx statuses are errors; redirects are followed by the client.
    pub async fn get_html(&self, url: &str) -> Result<String> {
        debug!("GET {}", url);
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }
}
