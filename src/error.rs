//! Error types for CodeRelay

use thiserror::Error;

/// Result type alias using CodeRelay's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for CodeRelay
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Request failed shape or size validation
    #[error("{0}")]
    Validation(String),

    /// Source matched a deny-listed pattern
    #[error("Security violation: {0}")]
    SecurityRejection(String),

    /// Provider did not answer within the time limit
    #[error("Execution timeout after {0}ms")]
    ProviderTimeout(u64),

    /// Provider answered with something we could not use
    #[error("Provider error: {0}")]
    Provider(String),

    /// Provider rejected or lost the submission; safe to resubmit
    #[error("Submission failed: {0}")]
    Submission(String),

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Rate limit exceeded
    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Submission(_) => true,
            Error::Http(e) => {
                e.is_connect()
                    || e.is_timeout()
                    || e.is_request()
                    || e.status().map_or(false, |s| s.is_server_error())
            }
            _ => false,
        }
    }

    /// Check if error is a client error (user's fault)
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::Validation(_) | Error::SecurityRejection(_))
    }

    /// Whether the failure text points at the compiled program outgrowing the
    /// provider's file size limit
    pub fn indicates_oversized_artifact(&self) -> bool {
        let message = self.to_string().to_lowercase();
        message.contains("file size limit") || message.contains("core dumped")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(Error::Submission("no token".into()).is_retryable());
        assert!(!Error::ProviderTimeout(10_000).is_retryable());
        assert!(!Error::Validation("bad".into()).is_retryable());

        assert!(Error::Validation("bad".into()).is_client_error());
        assert!(Error::SecurityRejection("eval".into()).is_client_error());
        assert!(!Error::Internal("boom".into()).is_client_error());
    }

    #[test]
    fn test_oversized_detection() {
        assert!(Error::Provider("File size limit exceeded (core dumped)".into())
            .indicates_oversized_artifact());
        assert!(!Error::Provider("connection reset".into()).indicates_oversized_artifact());
    }

    #[test]
    fn test_timeout_message() {
        assert_eq!(
            Error::ProviderTimeout(5000).to_string(),
            "Execution timeout after 5000ms"
        );
    }
}
