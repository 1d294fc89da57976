#![doc = include_str!("../README.md")]
#![warn(missing_docs)]
#![warn(clippy::all)]

//! PrivacyLens resolves a mobile app's Play Store listing and privacy
//! policy, extracts privacy signals from the policy text, and derives a
//! deterministic 0-100 privacy score. The [`pipeline::Pipeline`] type ties
//! the stages together; the library also ships a CLI and an HTTP server
//! built on the same pipeline.

/// TTL caches for composite reports and policy judgments
pub mod cache;
/// LLM-backed policy classification
pub mod classifier;
/// Runtime configuration
pub mod config;
/// Error types
pub mod error;
/// Shared HTTP fetcher
pub mod fetcher;
/// Store listing scraping
pub mod listing;
/// Tracing initialization
pub mod logging;
/// End-to-end analysis pipeline
pub mod pipeline;
/// Privacy policy signal extraction
pub mod policy;
/// Fixed-window rate limiting
pub mod rate_limiter;
/// Query-to-identifier resolution
pub mod resolver;
/// Privacy score calculation
pub mod score;

pub use cache::PipelineCache;
pub use classifier::{AzureClassifier, PolicyClassifier, PolicyJudgment};
pub use config::Config;
pub use error::{PipelineError, Result};
pub use listing::ListingMetadata;
pub use pipeline::{AppReport, Pipeline};
pub use policy::{DataUse, PolicySignals, SecurityPractices};
pub use rate_limiter::RateLimiter;
pub use score::calculate_privacy_score;
