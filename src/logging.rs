use crate::error::{PipelineError, Result};
use tracing_subscriber::EnvFilter;

/// Initializes the application's logging system with the specified default
/// log level
///
/// `RUST_LOG` takes precedence when set. Valid levels are: error, warn,
/// info, debug, trace.
pub fn init(default_level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init()
        .map_err(|e| PipelineError::Config(format!("failed to initialize logging: {}", e)))
}
