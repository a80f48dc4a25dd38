//! Error types for PulseFetch

use thiserror::Error;

/// Errors surfaced by the scrape tool and its collaborators
///
/// Backend failures never appear here: the orchestrator folds them into
/// [`ScrapeResult`](crate::ScrapeResult) diagnostics instead.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// URL is missing
    #[error("Missing required parameter: url")]
    MissingUrl,

    /// URL did not parse or has a non-HTTP scheme
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// A request or builder argument was rejected
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Failed to build HTTP client
    #[error("Failed to create HTTP client")]
    ClientBuildError(#[source] reqwest::Error),

    /// A requested capability has no configured backend
    #[error("Not configured: {0}")]
    NotConfigured(String),

    /// LLM extraction failed
    #[error("Extraction failed: {0}")]
    Extract(String),

    /// Resource storage or strategy config failure
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors from the strategy config store and resource storage
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Resource URI does not exist
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Resource URI does not belong to this storage
    #[error("Invalid resource URI: {0}")]
    InvalidUri(String),

    /// Persisted data could not be decoded
    #[error("Malformed data: {0}")]
    Format(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            ScrapeError::MissingUrl.to_string(),
            "Missing required parameter: url"
        );
        assert_eq!(
            ScrapeError::InvalidUrl("ftp://x".to_string()).to_string(),
            "Invalid URL: ftp://x"
        );
        assert_eq!(
            ScrapeError::NotConfigured("extract".to_string()).to_string(),
            "Not configured: extract"
        );
        assert_eq!(
            StoreError::NotFound("memory://raw/a".to_string()).to_string(),
            "Resource not found: memory://raw/a"
        );
    }

    #[test]
    fn test_store_error_is_transparent() {
        let err: ScrapeError = StoreError::InvalidUri("bogus".to_string()).into();
        assert_eq!(err.to_string(), "Invalid resource URI: bogus");
    }
}
