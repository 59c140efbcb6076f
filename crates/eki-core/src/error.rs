//! Error types for EKI

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("Engine error: {0}")]
    Engine(String),

    #[error("Engine request timed out after {0}s")]
    Timeout(u64),

    #[error("Notebook parse error: {0}")]
    NotebookParse(String),

    /// Caller-safe failure; the underlying cause has already been logged.
    #[error("{0}")]
    OperationFailed(&'static str),
}

impl Error {
    /// Transport-level failures that may succeed on a second attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Http(_) | Error::Timeout(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(Error::Timeout(30).is_retryable());
        assert!(!Error::NotFound("x".into()).is_retryable());
        assert!(!Error::Engine("quota exceeded".into()).is_retryable());
        assert!(!Error::Validation("bad".into()).is_retryable());
        assert!(!Error::Forbidden("other user".into()).is_retryable());
    }

    #[test]
    fn test_operation_failed_display_is_bare_message() {
        let err = Error::OperationFailed("Failed to generate insight");
        assert_eq!(err.to_string(), "Failed to generate insight");
    }
}
