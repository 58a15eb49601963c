//! Unified error types for fixhub

use thiserror::Error;

/// Unified error type for all fixhub operations
#[derive(Error, Debug)]
pub enum FixhubError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // GitHub errors
    #[error("GitHub API error {status}: {body}")]
    GithubApi { status: u16, body: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Agent errors
    #[error("Agent API error: {0}")]
    AgentApi(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    // Identity errors
    #[error("Signing error: {0}")]
    Signing(String),

    // Session errors
    #[error("Session error: {0}")]
    Session(String),

    // Transport errors
    #[error("HTTP error: {0}")]
    Http(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(String),
}

impl FixhubError {
    /// True for a GitHub 404 or an explicit not-found error
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            FixhubError::NotFound(_) | FixhubError::GithubApi { status: 404, .. }
        )
    }
}

/// Result type alias using FixhubError
pub type Result<T> = std::result::Result<T, FixhubError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_detection() {
        let api = FixhubError::GithubApi {
            status: 404,
            body: "Not Found".to_string(),
        };
        assert!(api.is_not_found());
        assert!(FixhubError::NotFound("src/lib.rs".to_string()).is_not_found());

        let conflict = FixhubError::GithubApi {
            status: 422,
            body: "Reference already exists".to_string(),
        };
        assert!(!conflict.is_not_found());
        assert_eq!(
            conflict.to_string(),
            "GitHub API error 422: Reference already exists"
        );
    }
}
