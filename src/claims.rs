//! Normalization of the gateway principal into a claims identity

use std::collections::BTreeSet;

use crate::error::{AuthError, Result};
use crate::types::{AuthenticationSnapshot, NormalizedIdentity};

/// Role the gateway assigns to every visitor, signed in or not
pub const ANONYMOUS_ROLE: &str = "anonymous";

/// Convert a decoded `/.auth/me` snapshot into a normalized identity
///
/// The `anonymous` marker role is dropped (case-insensitively). A principal
/// left with no roles is treated as not signed in, since the gateway reports
/// a principal object for anonymous visitors too.
#[must_use]
pub fn normalize(snapshot: &AuthenticationSnapshot) -> NormalizedIdentity {
    let Some(principal) = snapshot.client_principal.as_ref() else {
        return NormalizedIdentity::anonymous();
    };

    let roles: BTreeSet<String> = principal
        .user_roles
        .iter()
        .filter(|role| !role.eq_ignore_ascii_case(ANONYMOUS_ROLE))
        .cloned()
        .collect();

    if roles.is_empty() {
        return NormalizedIdentity::anonymous();
    }

    NormalizedIdentity {
        is_authenticated: true,
        name_id: principal.user_id.clone(),
        display_name: principal.user_details.clone(),
        roles,
        identity_provider: Some(principal.identity_provider.clone()),
    }
}

/// Decode a raw `/.auth/me` body and normalize it
///
/// # Errors
///
/// Returns `AuthError::Fetch` if the body is not a valid snapshot.
pub fn parse_claims(json: &str) -> Result<NormalizedIdentity> {
    let snapshot: AuthenticationSnapshot = serde_json::from_str(json)
        .map_err(|e| AuthError::fetch(format!("Malformed identity response: {e}")))?;
    Ok(normalize(&snapshot))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GatewayPrincipal;

    fn principal(roles: &[&str]) -> AuthenticationSnapshot {
        AuthenticationSnapshot::with_principal(GatewayPrincipal {
            identity_provider: "github".to_string(),
            user_id: "42".to_string(),
            user_details: "alice".to_string(),
            user_roles: roles.iter().map(ToString::to_string).collect(),
        })
    }

    #[test]
    fn test_absent_principal_is_anonymous() {
        let identity = normalize(&AuthenticationSnapshot::anonymous());
        assert!(!identity.is_authenticated);
        assert!(identity.roles.is_empty());
    }

    #[test]
    fn test_anonymous_only_roles_are_unauthenticated() {
        for roles in [
            &["anonymous"][..],
            &["Anonymous", "ANONYMOUS"][..],
            &["aNoNyMoUs"][..],
            &[][..],
        ] {
            let identity = normalize(&principal(roles));
            assert!(!identity.is_authenticated, "roles {roles:?}");
            assert!(identity.roles.is_empty());
        }
    }

    #[test]
    fn test_authenticated_identity() {
        let identity = normalize(&principal(&["anonymous", "reader"]));
        assert!(identity.is_authenticated);
        assert_eq!(identity.name_id, "42");
        assert_eq!(identity.display_name, "alice");
        assert_eq!(identity.roles, BTreeSet::from(["reader".to_string()]));
        assert_eq!(identity.identity_provider.as_deref(), Some("github"));
    }

    #[test]
    fn test_parse_claims_scenario() {
        let identity = parse_claims(
            r#"{"clientPrincipal": {"identityProvider":"github","userId":"42","userDetails":"alice","userRoles":["anonymous","reader"]}}"#,
        )
        .unwrap();
        assert!(identity.is_authenticated);
        assert!(identity.is_in_role("reader"));
        assert!(!identity.is_in_role("anonymous"));
    }

    #[test]
    fn test_parse_claims_malformed() {
        assert!(matches!(parse_claims("<html>"), Err(AuthError::Fetch(_))));
    }
}
