//! Caller state round-tripped through the handshake, and handshake outcomes

use serde::{Deserialize, Serialize, de::DeserializeOwned};

/// Application payload carried across the gateway redirect
///
/// Any serde-serializable type can be caller state; the authenticator only
/// needs access to the post-login return URL.
pub trait CallerState: Serialize + DeserializeOwned + Send + Sync {
    /// Return URL recorded in the state, if any
    fn return_url(&self) -> Option<&str>;

    /// Record the return URL before the handshake starts
    fn set_return_url(&mut self, url: String);
}

/// Minimal caller state: just the return URL
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnState {
    /// Where to go after the handshake completes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_url: Option<String>,
}

impl ReturnState {
    /// State pointing at `url`
    pub fn to(url: impl Into<String>) -> Self {
        Self {
            return_url: Some(url.into()),
        }
    }
}

impl CallerState for ReturnState {
    fn return_url(&self) -> Option<&str> {
        self.return_url.as_deref()
    }

    fn set_return_url(&mut self, url: String) {
        self.return_url = Some(url);
    }
}

/// Result of a handshake step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeOutcome<S> {
    /// A full-page navigation to the gateway was issued; stop processing
    Redirect,
    /// Step completed, with the recovered caller state when there is one
    Success(Option<S>),
    /// Callback could not be correlated
    Failure {
        /// Reason shown on the failure view
        message: String,
    },
}

impl<S> HandshakeOutcome<S> {
    /// Whether the page is about to unload
    #[must_use]
    pub fn is_redirect(&self) -> bool {
        matches!(self, Self::Redirect)
    }

    /// Whether the step succeeded
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Recovered caller state on success
    #[must_use]
    pub fn into_state(self) -> Option<S> {
        match self {
            Self::Success(state) => state,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_return_state_wire_format() {
        let json = serde_json::to_string(&ReturnState::to("https://app.example/x")).unwrap();
        assert_eq!(json, r#"{"returnUrl":"https://app.example/x"}"#);
        assert_eq!(serde_json::to_string(&ReturnState::default()).unwrap(), "{}");
    }

    #[test]
    fn test_outcome_helpers() {
        let ok: HandshakeOutcome<ReturnState> = HandshakeOutcome::Success(Some(ReturnState::to("a")));
        assert!(ok.is_success());
        assert_eq!(ok.into_state().unwrap().return_url(), Some("a"));

        let failed: HandshakeOutcome<ReturnState> = HandshakeOutcome::Failure {
            message: "nope".to_string(),
        };
        assert!(!failed.is_success());
        assert!(failed.into_state().is_none());
        assert!(HandshakeOutcome::<ReturnState>::Redirect.is_redirect());
    }
}
