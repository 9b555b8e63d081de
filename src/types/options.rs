//! Handshake configuration options

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use super::identifiers::ProviderId;
use crate::error::{AuthError, Result};

/// Storage key prefix used by the Functions/EasyAuth deployment mode
pub const EASY_AUTH_STORAGE_PREFIX: &str = "Blazor.EasyAuth";

/// Storage key prefix used by the App Service deployment mode
pub const APP_SERVICE_STORAGE_PREFIX: &str = "Blazor.AppServiceAuth";

/// Path of the gateway identity endpoint, appended to `authentication_data_url`
pub const IDENTITY_ENDPOINT: &str = "/.auth/me";

// ============================================================================
// Deployment Mode
// ============================================================================

/// Hosting back-end the application runs behind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AuthMode {
    /// Static Web Apps / Functions EasyAuth; callback URIs are sent as paths
    #[default]
    EasyAuth,
    /// App Service authentication; callback URIs are made absolute against the base URI
    AppService,
}

impl AuthMode {
    /// Default storage key prefix for this mode
    #[must_use]
    pub fn storage_key_prefix(self) -> &'static str {
        match self {
            Self::EasyAuth => EASY_AUTH_STORAGE_PREFIX,
            Self::AppService => APP_SERVICE_STORAGE_PREFIX,
        }
    }

    /// Whether post-login/logout redirect URIs are absolute
    #[must_use]
    pub fn absolute_redirects(self) -> bool {
        matches!(self, Self::AppService)
    }

    /// Providers offered by default in this mode
    #[must_use]
    pub fn default_providers(self) -> Vec<ExternalProvider> {
        let mut providers = vec![
            ExternalProvider::new("github", "GitHub"),
            ExternalProvider::new("twitter", "Twitter"),
        ];
        if self == Self::EasyAuth {
            providers.push(ExternalProvider::new("facebook", "Facebook"));
            providers.push(ExternalProvider::new("google", "Google"));
        }
        providers.push(ExternalProvider::new("aad", "Azure Active Directory"));
        providers
    }
}

// ============================================================================
// Providers
// ============================================================================

/// Identity provider offered to the user; not consumed by the handshake itself
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalProvider {
    /// Gateway provider id
    pub id: ProviderId,
    /// Human-readable name
    pub display_name: String,
}

impl ExternalProvider {
    /// Create a provider entry
    pub fn new(id: impl Into<ProviderId>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }
}

// ============================================================================
// Application Routes
// ============================================================================

/// Routes the host registers for the authenticator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthenticationPaths {
    /// Route that starts sign-in
    pub log_in_path: String,
    /// Route the gateway returns to after sign-in
    pub log_in_callback_path: String,
    /// Route shown when sign-in completion fails
    pub log_in_failed_path: String,
    /// Route that starts sign-out
    pub log_out_path: String,
    /// Route the gateway returns to after sign-out
    pub log_out_callback_path: String,
    /// Route shown when sign-out fails
    pub log_out_failed_path: String,
    /// Route shown after sign-out completed
    pub log_out_succeeded_path: String,
}

impl Default for AuthenticationPaths {
    fn default() -> Self {
        Self {
            log_in_path: "authentication/login".to_string(),
            log_in_callback_path: "authentication/login-callback".to_string(),
            log_in_failed_path: "authentication/login-failed".to_string(),
            log_out_path: "authentication/logout".to_string(),
            log_out_callback_path: "authentication/logout-callback".to_string(),
            log_out_failed_path: "authentication/logout-failed".to_string(),
            log_out_succeeded_path: "authentication/logged-out".to_string(),
        }
    }
}

// ============================================================================
// Auth Options
// ============================================================================

/// Options for the handshake coordinator and identity cache
#[derive(Debug, Clone, TypedBuilder, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[builder(
    builder_method(doc = "Create a new builder for AuthOptions"),
    builder_type(doc = "Builder for AuthOptions", vis = "pub"),
    build_method(doc = "Build the AuthOptions")
)]
pub struct AuthOptions {
    /// Deployment mode
    #[builder(default)]
    pub mode: AuthMode,

    /// Base for the identity endpoint; empty means relative `/.auth/me`
    #[builder(default, setter(into))]
    pub authentication_data_url: String,

    /// Base of the gateway login/logout endpoints; empty means the site root
    #[builder(default, setter(into))]
    pub gateway_url: String,

    /// Providers for UI enumeration
    #[builder(default = AuthMode::default().default_providers())]
    pub providers: Vec<ExternalProvider>,

    /// Host routes
    #[builder(default)]
    pub paths: AuthenticationPaths,

    /// Overrides the mode's storage key prefix
    #[builder(default, setter(strip_option, into))]
    pub storage_key_prefix: Option<String>,

    /// Keep the fetched principal for the rest of the session
    #[builder(default = true)]
    pub cache_identity: bool,
}

impl Default for AuthOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl AuthOptions {
    /// Options for the given mode with its default providers
    #[must_use]
    pub fn for_mode(mode: AuthMode) -> Self {
        Self::builder()
            .mode(mode)
            .providers(mode.default_providers())
            .build()
    }

    /// Load options from a JSON document (camelCase keys, all optional)
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or the options are invalid.
    pub fn from_json(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json)
            .map_err(|e| AuthError::invalid_config(format!("Failed to parse options: {e}")))?;
        options.validate()?;
        Ok(options)
    }

    /// Check that the options can drive a handshake
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidConfig` for empty callback paths or prefix.
    pub fn validate(&self) -> Result<()> {
        if self.paths.log_in_callback_path.trim().is_empty() {
            return Err(AuthError::invalid_config("login callback path is empty"));
        }
        if self.paths.log_out_callback_path.trim().is_empty() {
            return Err(AuthError::invalid_config("logout callback path is empty"));
        }
        if self.storage_key_prefix().trim().is_empty() {
            return Err(AuthError::invalid_config("storage key prefix is empty"));
        }
        Ok(())
    }

    /// Effective storage key prefix
    #[must_use]
    pub fn storage_key_prefix(&self) -> &str {
        self.storage_key_prefix
            .as_deref()
            .unwrap_or_else(|| self.mode.storage_key_prefix())
    }

    /// URL of the identity endpoint
    #[must_use]
    pub fn identity_url(&self) -> String {
        format!(
            "{}{IDENTITY_ENDPOINT}",
            self.authentication_data_url.trim_end_matches('/')
        )
    }

    /// Gateway endpoint URL for `path` (e.g. `/.auth/logout`)
    #[must_use]
    pub fn gateway_endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.gateway_url.trim_end_matches('/'))
    }

    /// Look up a configured provider
    #[must_use]
    pub fn provider(&self, id: &str) -> Option<&ExternalProvider> {
        self.providers.iter().find(|p| p.id.as_str() == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = AuthOptions::default();
        assert_eq!(options.mode, AuthMode::EasyAuth);
        assert_eq!(options.identity_url(), "/.auth/me");
        assert_eq!(options.gateway_endpoint("/.auth/logout"), "/.auth/logout");
        assert_eq!(options.storage_key_prefix(), "Blazor.EasyAuth");
        assert!(options.cache_identity);
        assert_eq!(options.providers.len(), 5);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_app_service_mode() {
        let options = AuthOptions::for_mode(AuthMode::AppService);
        assert_eq!(options.storage_key_prefix(), "Blazor.AppServiceAuth");
        assert!(options.mode.absolute_redirects());
        let ids: Vec<_> = options.providers.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["github", "twitter", "aad"]);
    }

    #[test]
    fn test_identity_url_with_base() {
        let options = AuthOptions::builder()
            .authentication_data_url("https://api.example/")
            .build();
        assert_eq!(options.identity_url(), "https://api.example/.auth/me");
    }

    #[test]
    fn test_from_json_partial() {
        let options = AuthOptions::from_json(
            r#"{
                "mode": "appService",
                "cacheIdentity": false,
                "storageKeyPrefix": "Custom",
                "paths": { "logInCallbackPath": "auth/done" }
            }"#,
        )
        .unwrap();
        assert_eq!(options.mode, AuthMode::AppService);
        assert!(!options.cache_identity);
        assert_eq!(options.storage_key_prefix(), "Custom");
        assert_eq!(options.paths.log_in_callback_path, "auth/done");
        assert_eq!(
            options.paths.log_out_callback_path,
            "authentication/logout-callback"
        );
    }

    #[test]
    fn test_from_json_rejects_empty_callback() {
        let err = AuthOptions::from_json(r#"{ "paths": { "logInCallbackPath": " " } }"#)
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidConfig(_)));
    }

    #[test]
    fn test_provider_lookup() {
        let options = AuthOptions::default();
        assert_eq!(options.provider("github").unwrap().display_name, "GitHub");
        assert!(options.provider("okta").is_none());
    }
}
