//! Pipeline composition
//!
//! Runs the stages strictly in sequence: resolve the identifier, extract the
//! listing, extract policy signals, compute the score, then cache the
//! composed report. Each stage suspends only on its network calls; nothing
//! is retried, and a composite result is cached only after every stage has
//! completed (successfully or by graceful degradation).

use crate::cache::PipelineCache;
use crate::classifier::{AzureClassifier, PolicyClassifier};
use crate::config::Config;
use crate::error::{PipelineError, Result};
use crate::fetcher::Fetcher;
use crate::listing::{self, ListingMetadata};
use crate::policy::{DataUse, PolicyExtractor, PolicySignals, SecurityPractices};
use crate::resolver;
use crate::score;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

const NOTE_POLICY_PRESENT: &str = "App has a developer privacy policy link on Play Store.";
const NOTE_POLICY_MISSING: &str = "No developer privacy policy link found on Play Store section.";

/// Listing metadata extended with the derived privacy score
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredMetadata {
    /// The scraped listing fields
    #[serde(flatten)]
    pub listing: ListingMetadata,
    /// Derived 0-100 privacy score
    pub privacy_score: u8,
}

/// The data-safety section of a report
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSafety {
    /// Shared data categories, `null` when none were detected
    pub data_shared: Option<Vec<DataUse>>,
    /// Collected data categories, `null` when none were detected
    pub data_collected: Option<Vec<DataUse>>,
    /// Security practice flags and annotations
    pub security_practices: SecurityPractices,
}

/// The composite result returned to callers and cached as a unit
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppReport {
    /// Listing metadata with the privacy score attached
    pub metadata: ScoredMetadata,
    /// Extracted policy signals
    pub data_safety: DataSafety,
    /// Human-readable note about policy availability
    pub notes: String,
}

/// The resolution → extraction → scoring pipeline
///
/// Holds the shared fetcher, the injected caches, and the optional
/// classifier. Concurrent analyses for different queries proceed
/// independently; the caches are the only shared mutable state.
pub struct Pipeline {
    config: Config,
    fetcher: Fetcher,
    cache: Arc<PipelineCache>,
    classifier: Option<Arc<dyn PolicyClassifier>>,
}

impl Pipeline {
    /// Creates a pipeline over an injected cache and classifier
    pub fn new(
        config: Config,
        cache: Arc<PipelineCache>,
        classifier: Option<Arc<dyn PolicyClassifier>>,
    ) -> Result<Self> {
        config.validate()?;
        let fetcher = Fetcher::new(config.fetch_timeout)?;
        Ok(Self {
            config,
            fetcher,
            cache,
            classifier,
        })
    }

    /// Creates a pipeline with a fresh cache and the environment-configured
    /// Azure classifier, when one is available
    pub fn from_config(config: Config) -> Result<Self> {
        let cache = Arc::new(PipelineCache::new(&config));
        let classifier = AzureClassifier::from_env(config.llm_timeout)
            .map(|classifier| Arc::new(classifier) as Arc<dyn PolicyClassifier>);
        if classifier.is_none() {
            info!("LLM classifier not configured; running heuristic-only");
        }
        Self::new(config, cache, classifier)
    }

    /// Shared handle to the pipeline's caches, e.g. for sweep tasks
    pub fn cache_handle(&self) -> Arc<PipelineCache> {
        Arc::clone(&self.cache)
    }

    /// Analyzes one query end to end
    ///
    /// Returns [`PipelineError::AppNotFound`] when resolution fails and a
    /// listing error when the listing page cannot be fetched or parsed;
    /// every other failure degrades into the report itself.
    pub async fn analyze(&self, query: &str) -> Result<AppReport> {
        let query = query.trim();

        if let Some(cached) = self.cache.get_result(query).await {
            debug!("cache hit for query {}", query);
            return Ok(cached);
        }

        let app_id = resolver::resolve_app_id(&self.fetcher, &self.config, query)
            .await
            .ok_or(PipelineError::AppNotFound)?;

        let listing = listing::fetch_listing(&self.fetcher, &self.config, &app_id).await?;

        let extractor = PolicyExtractor::new(
            &self.fetcher,
            &self.config,
            &self.cache,
            self.classifier.as_deref(),
        );
        let signals = extractor.extract(&listing).await;

        let privacy_score = score::calculate_privacy_score(&listing, &signals);
        info!(
            "privacy score for {}: {}/100",
            listing.app_name.as_deref().unwrap_or(&app_id),
            privacy_score
        );

        let report = compose_report(listing, signals, privacy_score);
        self.cache.put_result(query, report.clone()).await;
        Ok(report)
    }
}

/// Assembles the composite report from completed stage outputs
fn compose_report(listing: ListingMetadata, signals: PolicySignals, privacy_score: u8) -> AppReport {
    let notes = if listing.privacy_policy_url.is_some() {
        NOTE_POLICY_PRESENT
    } else {
        NOTE_POLICY_MISSING
    };

    let PolicySignals {
        data_collected,
        data_shared,
        security_practices,
        ..
    } = signals;

    AppReport {
        metadata: ScoredMetadata {
            listing,
            privacy_score,
        },
        data_safety: DataSafety {
            data_shared: (!data_shared.is_empty()).then_some(data_shared),
            data_collected: (!data_collected.is_empty()).then_some(data_collected),
            security_practices,
        },
        notes: notes.to_string(),
    }
}

/// Minimal report for cache tests
#[cfg(test)]
pub(crate) fn test_report() -> AppReport {
    compose_report(
        ListingMetadata {
            package_id: "com.example.app".into(),
            ..ListingMetadata::default()
        },
        PolicySignals::default(),
        70,
    )
}
