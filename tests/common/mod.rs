use async_trait::async_trait;
use privacylens::{Config, Pipeline, PipelineCache, PolicyClassifier, PolicyJudgment};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Configuration pointed at a mock store server
pub fn test_config(server_url: &str) -> Config {
    Config {
        store_base_url: server_url.trim_end_matches('/').to_string(),
        ..Config::default()
    }
}

/// Builds a pipeline with an isolated cache
pub fn test_pipeline(config: Config, classifier: Option<Arc<dyn PolicyClassifier>>) -> Pipeline {
    let cache = Arc::new(PipelineCache::new(&config));
    Pipeline::new(config, cache, classifier).unwrap()
}

/// Classifier double returning a canned judgment and counting invocations
pub struct StubClassifier {
    pub judgment: Option<PolicyJudgment>,
    calls: AtomicUsize,
}

impl StubClassifier {
    pub fn new(judgment: Option<PolicyJudgment>) -> Self {
        Self {
            judgment,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PolicyClassifier for StubClassifier {
    async fn classify(&self, _text: &str) -> Option<PolicyJudgment> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.judgment.clone()
    }
}
