//! Newtype wrappers for type safety

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;

// ============================================================================
// Newtype Wrappers for Type Safety
// ============================================================================

/// Handshake correlation id that survives a full page navigation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HandshakeId(String);

impl HandshakeId {
    /// Wrap an existing id (e.g. one parsed from a callback URL)
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random id (UUID v4)
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Get the handshake id as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Storage key for this handshake under `prefix`
    #[must_use]
    pub fn storage_key(&self, prefix: &str) -> String {
        format!("{prefix}.{}", self.0)
    }
}

impl std::fmt::Display for HandshakeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for HandshakeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for HandshakeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Identity provider id as understood by the gateway (`github`, `aad`, ...)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderId(String);

impl ProviderId {
    /// Create a new provider id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the provider id as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ProviderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ProviderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::ops::Deref for ProviderId {
    type Target = str;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Post-login destination that passed the same-origin check
///
/// Only [`ReturnUrlGuard`](crate::return_url::ReturnUrlGuard) constructs these.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RedirectTarget(String);

impl RedirectTarget {
    pub(crate) fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    /// Get the target URL as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the underlying URL string
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for RedirectTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for RedirectTarget {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_unique_uuids() {
        let a = HandshakeId::generate();
        let b = HandshakeId::generate();
        assert_ne!(a, b);
        assert!(uuid::Uuid::parse_str(a.as_str()).is_ok());
    }

    #[test]
    fn test_storage_key() {
        let id = HandshakeId::new("abc");
        assert_eq!(id.storage_key("Blazor.EasyAuth"), "Blazor.EasyAuth.abc");
    }
}
