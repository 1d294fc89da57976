use async_openai::error::OpenAIError;
use std::io;
use thiserror::Error;

/// Custom result type alias for the application
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors that can occur while resolving, scraping, and scoring an app
#[derive(Debug, Error)]
pub enum PipelineError {
    /// I/O errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// HTTP request/response errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing/serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing errors
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Azure OpenAI API errors
    #[error("OpenAI error: {0}")]
    OpenAI(#[from] OpenAIError),

    /// No canonical identifier could be resolved for the query
    #[error("App not found")]
    AppNotFound,

    /// Listing page fetch or parse failure
    #[error("Listing error: {0}")]
    Listing(String),

    /// Privacy policy fetch or parse failure
    #[error("Policy error: {0}")]
    Policy(String),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    /// General message errors
    #[error("{0}")]
    Message(String),
}

impl PipelineError {
    /// Creates a new error with the specified message
    pub fn new(message: &str) -> Self {
        Self::Message(message.to_string())
    }

    /// Checks if this error should surface to callers as "app not found"
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::AppNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let error = PipelineError::new("test error");
        assert!(matches!(error, PipelineError::Message(_)));

        if let PipelineError::Message(msg) = error {
            assert_eq!(msg, "test error");
        }
    }

    #[test]
    fn test_is_not_found() {
        assert!(PipelineError::AppNotFound.is_not_found());
        assert!(!PipelineError::Listing("boom".into()).is_not_found());
    }

    #[test]
    fn test_display_messages() {
        let error = PipelineError::Listing("fetch failed".into());
        assert_eq!(error.to_string(), "Listing error: fetch failed");

        assert_eq!(PipelineError::AppNotFound.to_string(), "App not found");
    }
}
