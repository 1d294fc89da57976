use crate::classifier::PolicyJudgment;
use crate::config::Config;
use crate::pipeline::AppReport;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// A generic in-memory cache with a per-cache time-to-live
///
/// Reads check expiry before returning a value; writes always reset the
/// entry's clock. Safe for concurrent use from multiple in-flight requests;
/// last writer wins, which is acceptable because pipeline results for the
/// same key are idempotent.
#[derive(Debug)]
pub struct Cache<T> {
    store: Arc<RwLock<HashMap<String, (T, Instant)>>>,
    ttl: Duration,
}

impl<T: Clone + Send + Sync + 'static> Cache<T> {
    /// Creates a new in-memory cache with the specified TTL
    pub fn new(ttl: Duration) -> Self {
        Self {
            store: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// Retrieves a value from the cache if present and not expired
    pub async fn get(&self, key: &str) -> Option<T> {
        let store = self.store.read().await;
        store
            .get(key)
            .filter(|(_, time)| time.elapsed() < self.ttl)
            .map(|(value, _)| value.clone())
    }

    /// Stores a value, resetting its TTL
    pub async fn set(&self, key: &str, value: T) {
        let mut store = self.store.write().await;
        store.insert(key.to_string(), (value, Instant::now()));
    }

    /// Returns the number of entries, expired ones included
    pub async fn len(&self) -> usize {
        let store = self.store.read().await;
        store.len()
    }

    /// Checks if the cache is empty
    pub async fn is_empty(&self) -> bool {
        let store = self.store.read().await;
        store.is_empty()
    }

    /// Removes expired entries and returns the count of removed entries
    pub async fn cleanup_expired(&self) -> usize {
        let mut store = self.store.write().await;
        let before_len = store.len();
        store.retain(|_, (_, time)| time.elapsed() < self.ttl);
        before_len - store.len()
    }
}

impl<T> Clone for Cache<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            ttl: self.ttl,
        }
    }
}

/// The two keyed stores the pipeline memoizes into
///
/// Composite results are keyed by the lower-cased input query; classifier
/// judgments are keyed by policy URL. The stores have independent lifetimes
/// and no shared eviction policy. An instance is injected into the pipeline
/// so tests can run against an isolated cache.
#[derive(Debug, Clone)]
pub struct PipelineCache {
    results: Cache<AppReport>,
    judgments: Cache<PolicyJudgment>,
}

impl PipelineCache {
    /// Creates both stores with the TTLs from the configuration
    pub fn new(config: &Config) -> Self {
        Self {
            results: Cache::new(config.result_ttl),
            judgments: Cache::new(config.judgment_ttl),
        }
    }

    /// Looks up a composite result; the query is normalized case-insensitively
    pub async fn get_result(&self, query: &str) -> Option<AppReport> {
        self.results.get(&query.to_lowercase()).await
    }

    /// Stores a fully composed result
    pub async fn put_result(&self, query: &str, report: AppReport) {
        self.results.set(&query.to_lowercase(), report).await;
    }

    /// Looks up a cached classifier judgment by policy URL
    pub async fn get_judgment(&self, url: &str) -> Option<PolicyJudgment> {
        self.judgments.get(url).await
    }

    /// Stores a classifier judgment under its policy URL
    pub async fn put_judgment(&self, url: &str, judgment: PolicyJudgment) {
        self.judgments.set(url, judgment).await;
    }

    /// Sweeps expired entries from both stores
    pub async fn sweep(&self) -> usize {
        self.results.cleanup_expired().await + self.judgments.cleanup_expired().await
    }
}
