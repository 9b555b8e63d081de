//! Gateway principal wire model and the normalized identity

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ============================================================================
// Wire Model
// ============================================================================

/// Authenticated user as reported by `/.auth/me`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayPrincipal {
    /// Provider that authenticated the user (`github`, `aad`, ...)
    pub identity_provider: String,
    /// Provider-scoped user id
    pub user_id: String,
    /// User name or e-mail, depending on provider
    pub user_details: String,
    /// Role memberships, including the `anonymous` marker
    #[serde(default)]
    pub user_roles: Vec<String>,
}

/// Decoded body of the identity endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationSnapshot {
    /// Absent or `null` for anonymous visitors
    #[serde(default)]
    pub client_principal: Option<GatewayPrincipal>,
}

impl AuthenticationSnapshot {
    /// Snapshot with no principal
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Snapshot carrying `principal`
    #[must_use]
    pub fn with_principal(principal: GatewayPrincipal) -> Self {
        Self {
            client_principal: Some(principal),
        }
    }
}

// ============================================================================
// Claims
// ============================================================================

/// Claim kinds produced from a principal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClaimType {
    /// Stable user id
    NameIdentifier,
    /// Display name
    Name,
    /// Role membership
    Role,
}

/// Single claim of a normalized identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    /// Claim kind
    pub claim_type: ClaimType,
    /// Claim value
    pub value: String,
}

impl Claim {
    fn new(claim_type: ClaimType, value: impl Into<String>) -> Self {
        Self {
            claim_type,
            value: value.into(),
        }
    }
}

// ============================================================================
// Normalized Identity
// ============================================================================

/// Claims-shaped identity handed to the application
///
/// Recomputed on every query and never persisted. `roles` never contains
/// the gateway's `anonymous` marker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NormalizedIdentity {
    /// Whether the user is signed in
    pub is_authenticated: bool,
    /// Stable user id (empty when anonymous)
    pub name_id: String,
    /// Display name (empty when anonymous)
    pub display_name: String,
    /// Role memberships
    pub roles: BTreeSet<String>,
    /// Provider that authenticated the user
    pub identity_provider: Option<String>,
}

impl NormalizedIdentity {
    /// The fully unauthenticated identity
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Check role membership (exact match)
    #[must_use]
    pub fn is_in_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// Authentication type, i.e. the provider for signed-in users
    #[must_use]
    pub fn authentication_type(&self) -> Option<&str> {
        self.identity_provider.as_deref()
    }

    /// Project the identity to a claim list
    ///
    /// Anonymous identities carry no claims.
    #[must_use]
    pub fn claims(&self) -> Vec<Claim> {
        if !self.is_authenticated {
            return Vec::new();
        }

        let mut claims = Vec::with_capacity(self.roles.len() + 2);
        claims.push(Claim::new(ClaimType::NameIdentifier, &self.name_id));
        claims.push(Claim::new(ClaimType::Name, &self.display_name));
        claims.extend(self.roles.iter().map(|r| Claim::new(ClaimType::Role, r)));
        claims
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_decodes_null_principal() {
        let snapshot: AuthenticationSnapshot =
            serde_json::from_str(r#"{"clientPrincipal": null}"#).unwrap();
        assert!(snapshot.client_principal.is_none());

        let snapshot: AuthenticationSnapshot = serde_json::from_str("{}").unwrap();
        assert!(snapshot.client_principal.is_none());
    }

    #[test]
    fn test_snapshot_decodes_principal() {
        let snapshot: AuthenticationSnapshot = serde_json::from_str(
            r#"{"clientPrincipal": {
                "identityProvider": "aad",
                "userId": "u1",
                "userDetails": "bob@example.com",
                "userRoles": ["anonymous", "authenticated"]
            }}"#,
        )
        .unwrap();
        let principal = snapshot.client_principal.unwrap();
        assert_eq!(principal.identity_provider, "aad");
        assert_eq!(principal.user_roles, ["anonymous", "authenticated"]);
    }

    #[test]
    fn test_anonymous_has_no_claims() {
        assert!(NormalizedIdentity::anonymous().claims().is_empty());
    }

    #[test]
    fn test_claims_projection() {
        let identity = NormalizedIdentity {
            is_authenticated: true,
            name_id: "42".to_string(),
            display_name: "alice".to_string(),
            roles: ["reader".to_string(), "admin".to_string()].into(),
            identity_provider: Some("github".to_string()),
        };
        let claims = identity.claims();
        assert_eq!(claims.len(), 4);
        assert_eq!(claims[0].claim_type, ClaimType::NameIdentifier);
        assert_eq!(claims[1].value, "alice");
        assert_eq!(
            claims
                .iter()
                .filter(|c| c.claim_type == ClaimType::Role)
                .count(),
            2
        );
        assert!(identity.is_in_role("admin"));
        assert_eq!(identity.authentication_type(), Some("github"));
    }
}
