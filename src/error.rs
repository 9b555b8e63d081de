//! Error types for the authentication handshake

use thiserror::Error;

/// Main error type for the handshake layer
#[derive(Error, Debug)]
pub enum AuthError {
    /// Identity endpoint could not be fetched or decoded
    #[error("Identity fetch failed: {0}")]
    Fetch(String),

    /// Callback arrived with a missing or unknown handshake id
    #[error("Handshake not found: {handshake_id}")]
    HandshakeNotFound {
        /// Handshake id parsed from the callback URL (may be empty)
        handshake_id: String,
    },

    /// Return URL is not same-origin with the application base URI
    #[error(
        "Invalid return url '{url}'. The return url needs to have the same origin as the current page ({base_uri})."
    )]
    UnsafeRedirect {
        /// Rejected URL
        url: String,
        /// Application base URI it was checked against
        base_uri: String,
    },

    /// Sign-in invoked with an unusable context (e.g. no provider)
    #[error("Invalid handshake context: {0}")]
    InvalidHandshakeContext(String),

    /// Session storage capability failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Navigation capability failed
    #[error("Navigation error: {0}")]
    Navigation(String),

    /// Caller state could not be serialized or deserialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias for handshake operations
pub type Result<T> = std::result::Result<T, AuthError>;

impl AuthError {
    /// Create a fetch error
    pub fn fetch(msg: impl Into<String>) -> Self {
        Self::Fetch(msg.into())
    }

    /// Create a handshake-not-found error
    pub fn handshake_not_found(handshake_id: impl Into<String>) -> Self {
        Self::HandshakeNotFound {
            handshake_id: handshake_id.into(),
        }
    }

    /// Create an unsafe redirect error
    pub fn unsafe_redirect(url: impl Into<String>, base_uri: impl Into<String>) -> Self {
        Self::UnsafeRedirect {
            url: url.into(),
            base_uri: base_uri.into(),
        }
    }

    /// Create an invalid handshake context error
    pub fn invalid_context(msg: impl Into<String>) -> Self {
        Self::InvalidHandshakeContext(msg.into())
    }

    /// Create a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a navigation error
    pub fn navigation(msg: impl Into<String>) -> Self {
        Self::Navigation(msg.into())
    }

    /// Create an invalid configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Whether this error should be reported as a security-relevant event
    #[must_use]
    pub fn is_security_event(&self) -> bool {
        matches!(self, Self::UnsafeRedirect { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsafe_redirect_is_security_event() {
        let err = AuthError::unsafe_redirect("https://evil.example/x", "https://app.example/");
        assert!(err.is_security_event());
        assert!(err.to_string().contains("https://evil.example/x"));
    }

    #[test]
    fn test_other_errors_are_not_security_events() {
        assert!(!AuthError::handshake_not_found("abc").is_security_event());
        assert!(!AuthError::fetch("500").is_security_event());
        assert!(!AuthError::invalid_context("no provider").is_security_event());
    }
}
