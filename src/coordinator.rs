//! Handshake coordinator: the sign-in/sign-out state machine
//!
//! # Overview
//!
//! Nothing about an in-flight handshake survives in memory. The flow is:
//!
//! 1. [`sign_in`](HandshakeCoordinator::sign_in) persists the caller state
//!    under a fresh handshake id, then issues a full-page navigation to
//!    `/.auth/login/{provider}` with the callback route (ending in the id) as
//!    `post_login_redirect_uri`.
//! 2. The gateway authenticates the user and sends the browser back to the
//!    callback route; the application starts from scratch.
//! 3. [`complete_sign_in`](HandshakeCoordinator::complete_sign_in) reads the
//!    id from the callback URL and recovers the caller state.
//!
//! Sign-out mirrors this through `/.auth/logout`, and its completion always
//! succeeds.
//!
//! # Example
//!
//! ```no_run
//! use easyauth_handshake::{
//!     AuthOptions, HandshakeCoordinator, HistoryNavigator, MemorySessionStorage, ReturnState,
//! };
//! use std::sync::Arc;
//!
//! # async fn example() -> easyauth_handshake::Result<()> {
//! let coordinator = HandshakeCoordinator::<ReturnState>::builder()
//!     .options(AuthOptions::default())
//!     .storage(Arc::new(MemorySessionStorage::new()))
//!     .navigator(Arc::new(HistoryNavigator::new(
//!         "https://app.example/",
//!         "https://app.example/authentication/login",
//!     )))
//!     .build()?;
//!
//! coordinator
//!     .sign_in("github", &ReturnState::to("https://app.example/"))
//!     .await?;
//! # Ok(())
//! # }
//! ```

use std::marker::PhantomData;
use std::sync::Arc;

use crate::cache::{AuthenticationDataCache, HttpIdentityFetcher};
use crate::capabilities::{NavigationMode, SharedNavigator, SharedSessionStorage};
use crate::error::{AuthError, Result};
use crate::store::{MemorySessionStorage, RedirectStateStore, handshake_id_from_callback};
use crate::types::{AuthOptions, CallerState, HandshakeId, HandshakeOutcome, NormalizedIdentity};

const LOGIN_ENDPOINT: &str = "/.auth/login";
const LOGOUT_ENDPOINT: &str = "/.auth/logout";

/// Builder for [`HandshakeCoordinator`]
pub struct HandshakeCoordinatorBuilder<S> {
    options: Option<AuthOptions>,
    storage: Option<SharedSessionStorage>,
    navigator: Option<SharedNavigator>,
    cache: Option<Arc<AuthenticationDataCache>>,
    _state: PhantomData<fn() -> S>,
}

impl<S: CallerState> Default for HandshakeCoordinatorBuilder<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: CallerState> HandshakeCoordinatorBuilder<S> {
    /// Create a new builder
    #[must_use]
    pub fn new() -> Self {
        Self {
            options: None,
            storage: None,
            navigator: None,
            cache: None,
            _state: PhantomData,
        }
    }

    /// Set options (default: [`AuthOptions::default`])
    #[must_use]
    pub fn options(mut self, options: AuthOptions) -> Self {
        self.options = Some(options);
        self
    }

    /// Set session storage (default: in-process [`MemorySessionStorage`])
    #[must_use]
    pub fn storage(mut self, storage: SharedSessionStorage) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Set the navigator (required)
    #[must_use]
    pub fn navigator(mut self, navigator: SharedNavigator) -> Self {
        self.navigator = Some(navigator);
        self
    }

    /// Share an existing identity cache (default: HTTP-backed cache for the base URI)
    #[must_use]
    pub fn cache(mut self, cache: Arc<AuthenticationDataCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Build the coordinator
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidConfig` if no navigator was set, the
    /// options are invalid, or the default HTTP fetcher cannot be created.
    pub fn build(self) -> Result<HandshakeCoordinator<S>> {
        let options = self.options.unwrap_or_default();
        options.validate()?;

        let navigator = self
            .navigator
            .ok_or_else(|| AuthError::invalid_config("a navigator is required"))?;

        let cache = match self.cache {
            Some(cache) => cache,
            None => {
                let fetcher = HttpIdentityFetcher::new(&navigator.base_uri())?;
                Arc::new(AuthenticationDataCache::from_options(Arc::new(fetcher), &options))
            }
        };

        let storage = self
            .storage
            .unwrap_or_else(|| Arc::new(MemorySessionStorage::new()));
        let store = RedirectStateStore::new(storage, options.storage_key_prefix());

        Ok(HandshakeCoordinator {
            options,
            store,
            navigator,
            cache,
            _state: PhantomData,
        })
    }
}

/// Drives sign-in and sign-out through the gateway for caller state `S`
pub struct HandshakeCoordinator<S> {
    options: AuthOptions,
    store: RedirectStateStore,
    navigator: SharedNavigator,
    cache: Arc<AuthenticationDataCache>,
    _state: PhantomData<fn() -> S>,
}

impl<S> std::fmt::Debug for HandshakeCoordinator<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandshakeCoordinator")
            .field("options", &self.options)
            .field("store", &self.store)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl<S: CallerState> HandshakeCoordinator<S> {
    /// Create a builder
    #[must_use]
    pub fn builder() -> HandshakeCoordinatorBuilder<S> {
        HandshakeCoordinatorBuilder::new()
    }

    /// Options in effect
    #[must_use]
    pub fn options(&self) -> &AuthOptions {
        &self.options
    }

    /// Navigator used for redirects
    #[must_use]
    pub fn navigator(&self) -> &SharedNavigator {
        &self.navigator
    }

    /// Shared identity cache
    #[must_use]
    pub fn cache(&self) -> &Arc<AuthenticationDataCache> {
        &self.cache
    }

    /// Redirect state store
    #[must_use]
    pub fn store(&self) -> &RedirectStateStore {
        &self.store
    }

    /// Start sign-in with `provider_id`
    ///
    /// The caller state is persisted before the navigation is issued. On
    /// `Ok(Redirect)` the page is unloading and the caller should stop.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidHandshakeContext` for a blank or malformed
    /// provider id, or storage/navigation errors.
    pub async fn sign_in(&self, provider_id: &str, state: &S) -> Result<HandshakeOutcome<S>> {
        validate_provider(provider_id)?;

        let id = self.store.begin_handshake(state).await?;
        let redirect = self.callback_uri(&self.options.paths.log_in_callback_path, &id);
        let url = format!(
            "{}/{provider_id}?post_login_redirect_uri={redirect}",
            self.options.gateway_endpoint(LOGIN_ENDPOINT)
        );

        tracing::debug!(provider = %provider_id, handshake_id = %id, "Redirecting to gateway login");
        self.navigator
            .navigate_to(&url, NavigationMode::FullReload)
            .await?;
        Ok(HandshakeOutcome::Redirect)
    }

    /// Finish sign-in on the login callback route
    ///
    /// An unknown or missing handshake id yields `Failure`. A record that
    /// does not decode as `S` is discarded and also yields `Failure`.
    ///
    /// # Errors
    ///
    /// Returns storage errors.
    pub async fn complete_sign_in(&self, callback_url: &str) -> Result<HandshakeOutcome<S>> {
        match self.store.complete_handshake::<S>(callback_url).await {
            Ok(state) => {
                self.cache.invalidate().await;
                tracing::debug!("Sign-in handshake completed");
                Ok(HandshakeOutcome::Success(Some(state)))
            }
            Err(AuthError::HandshakeNotFound { handshake_id }) => {
                tracing::warn!(handshake_id = %handshake_id, "Sign-in callback did not match a pending handshake");
                Ok(HandshakeOutcome::Failure {
                    message: format!("No pending sign-in matches handshake '{handshake_id}'"),
                })
            }
            Err(AuthError::Serialization(e)) => {
                let id = handshake_id_from_callback(callback_url)
                    .ok_or_else(|| AuthError::handshake_not_found(""))?;
                tracing::warn!(error = %e, handshake_id = %id, "Discarding unreadable sign-in state");
                self.store.discard(&id).await?;
                Ok(HandshakeOutcome::Failure {
                    message: format!("Sign-in state for handshake '{id}' could not be read"),
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Start sign-out
    ///
    /// The caller state is persisted under its own handshake id, which the
    /// logout callback route carries so completion can find it precisely.
    ///
    /// # Errors
    ///
    /// Returns storage or navigation errors.
    pub async fn sign_out(&self, state: &S) -> Result<HandshakeOutcome<S>> {
        let id = self.store.begin_handshake(state).await?;
        self.cache.invalidate().await;

        let redirect = self.callback_uri(&self.options.paths.log_out_callback_path, &id);
        let url = format!(
            "{}?post_logout_redirect_uri={redirect}",
            self.options.gateway_endpoint(LOGOUT_ENDPOINT)
        );

        tracing::debug!(handshake_id = %id, "Redirecting to gateway logout");
        self.navigator
            .navigate_to(&url, NavigationMode::FullReload)
            .await?;
        Ok(HandshakeOutcome::Redirect)
    }

    /// Finish sign-out on the logout callback route; always succeeds
    ///
    /// When the callback carries a known handshake id, that record is
    /// consumed and its state returned. Otherwise any leftover record under
    /// this store's prefix is removed. Storage failures are logged only.
    pub async fn complete_sign_out(&self, callback_url: &str) -> HandshakeOutcome<S> {
        self.cache.invalidate().await;

        if let Some(id) = handshake_id_from_callback(callback_url) {
            match self.store.complete_handshake::<S>(callback_url).await {
                Ok(state) => return HandshakeOutcome::Success(Some(state)),
                Err(AuthError::HandshakeNotFound { .. }) => {}
                Err(e) => {
                    tracing::warn!(error = %e, handshake_id = %id, "Discarding unreadable sign-out state");
                    if let Err(e) = self.store.discard(&id).await {
                        tracing::warn!(error = %e, "Failed to discard sign-out state");
                    }
                    return HandshakeOutcome::Success(None);
                }
            }
        }

        if let Err(e) = self.store.cleanup_any_handshake().await {
            tracing::warn!(error = %e, "Handshake cleanup after sign-out failed");
        }
        HandshakeOutcome::Success(None)
    }

    /// Current identity, for render-time authorization checks
    pub async fn get_authentication_state(&self) -> NormalizedIdentity {
        self.cache.get_identity().await
    }

    /// Callback URI handed to the gateway: `{path}/{id}`, absolute in App Service mode
    fn callback_uri(&self, path: &str, id: &HandshakeId) -> String {
        let path = format!("{}/{id}", path.trim_end_matches('/'));
        if !self.options.mode.absolute_redirects() {
            return path;
        }

        let base = self.navigator.base_uri();
        url::Url::parse(&base)
            .and_then(|b| b.join(&path))
            .map(|u| u.to_string())
            .unwrap_or_else(|_| format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/')))
    }
}

/// Provider ids go into a URL path segment
fn validate_provider(provider_id: &str) -> Result<()> {
    if provider_id.trim().is_empty() {
        return Err(AuthError::invalid_context(
            "sign-in requires a selected identity provider",
        ));
    }
    if provider_id
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '/' | '?' | '#' | '&' | '%'))
    {
        return Err(AuthError::invalid_context(format!(
            "invalid identity provider id '{provider_id}'"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::{HistoryNavigator, IdentityFetcher, SessionStorage};
    use crate::types::{AuthMode, ReturnState};
    use async_trait::async_trait;

    const BASE: &str = "https://app.example/";

    struct StaticFetcher(&'static str);

    #[async_trait]
    impl IdentityFetcher for StaticFetcher {
        async fn fetch(&self, _url: &str) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct Harness {
        storage: Arc<MemorySessionStorage>,
        navigator: Arc<HistoryNavigator>,
        coordinator: HandshakeCoordinator<ReturnState>,
    }

    fn harness(options: AuthOptions) -> Harness {
        let storage = Arc::new(MemorySessionStorage::new());
        let navigator = Arc::new(HistoryNavigator::new(BASE, BASE));
        let cache = Arc::new(AuthenticationDataCache::from_options(
            Arc::new(StaticFetcher(r#"{"clientPrincipal":null}"#)),
            &options,
        ));
        let coordinator = HandshakeCoordinator::<ReturnState>::builder()
            .options(options)
            .storage(storage.clone())
            .navigator(navigator.clone())
            .cache(cache)
            .build()
            .unwrap();
        Harness {
            storage,
            navigator,
            coordinator,
        }
    }

    fn last_handshake_id(url: &str) -> String {
        url.rsplit('/').next().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_sign_in_persists_then_redirects() {
        let h = harness(AuthOptions::default());
        let outcome = h
            .coordinator
            .sign_in("github", &ReturnState::to("https://app.example/x"))
            .await
            .unwrap();
        assert!(outcome.is_redirect());

        let (url, mode) = h.navigator.last().unwrap();
        assert_eq!(mode, NavigationMode::FullReload);
        let id = last_handshake_id(&url);
        assert_eq!(
            url,
            format!("/.auth/login/github?post_login_redirect_uri=authentication/login-callback/{id}")
        );
        assert_eq!(
            h.storage.get(&format!("Blazor.EasyAuth.{id}")).await.unwrap().as_deref(),
            Some(r#"{"returnUrl":"https://app.example/x"}"#)
        );
    }

    #[tokio::test]
    async fn test_sign_in_requires_provider() {
        let h = harness(AuthOptions::default());
        for provider in ["", "   ", "git/hub", "a?b"] {
            let err = h
                .coordinator
                .sign_in(provider, &ReturnState::default())
                .await
                .unwrap_err();
            assert!(matches!(err, AuthError::InvalidHandshakeContext(_)), "{provider:?}");
        }
        assert!(h.navigator.history().is_empty());
        assert!(h.storage.is_empty().await);
    }

    #[tokio::test]
    async fn test_app_service_mode_uses_absolute_callbacks() {
        let h = harness(AuthOptions::for_mode(AuthMode::AppService));
        h.coordinator
            .sign_in("aad", &ReturnState::default())
            .await
            .unwrap();
        let (url, _) = h.navigator.last().unwrap();
        let id = last_handshake_id(&url);
        assert_eq!(
            url,
            format!(
                "/.auth/login/aad?post_login_redirect_uri=https://app.example/authentication/login-callback/{id}"
            )
        );
        assert!(h
            .storage
            .get(&format!("Blazor.AppServiceAuth.{id}"))
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_complete_sign_in_recovers_state() {
        let h = harness(AuthOptions::default());
        h.coordinator
            .sign_in("github", &ReturnState::to("https://app.example/x"))
            .await
            .unwrap();
        let (url, _) = h.navigator.last().unwrap();
        let callback = format!(
            "https://app.example/authentication/login-callback/{}",
            last_handshake_id(&url)
        );

        let outcome = h.coordinator.complete_sign_in(&callback).await.unwrap();
        assert_eq!(
            outcome,
            HandshakeOutcome::Success(Some(ReturnState::to("https://app.example/x")))
        );
        assert!(h.storage.is_empty().await);
    }

    #[tokio::test]
    async fn test_complete_sign_in_unknown_id_fails() {
        let h = harness(AuthOptions::default());
        let outcome = h
            .coordinator
            .complete_sign_in("https://app.example/authentication/login-callback/unknown")
            .await
            .unwrap();
        assert!(matches!(outcome, HandshakeOutcome::Failure { .. }));
    }

    #[tokio::test]
    async fn test_sign_out_round_trip_is_precise() {
        let h = harness(AuthOptions::default());
        // Unrelated pending sign-in that must survive sign-out completion
        let other = h
            .coordinator
            .store()
            .begin_handshake(&ReturnState::to("https://app.example/other"))
            .await
            .unwrap();

        let outcome = h
            .coordinator
            .sign_out(&ReturnState::to("https://app.example/bye"))
            .await
            .unwrap();
        assert!(outcome.is_redirect());

        let (url, mode) = h.navigator.last().unwrap();
        assert_eq!(mode, NavigationMode::FullReload);
        assert!(url.starts_with("/.auth/logout?post_logout_redirect_uri=authentication/logout-callback/"));

        let callback = format!(
            "https://app.example/authentication/logout-callback/{}",
            last_handshake_id(&url)
        );
        let outcome = h.coordinator.complete_sign_out(&callback).await;
        assert_eq!(
            outcome,
            HandshakeOutcome::Success(Some(ReturnState::to("https://app.example/bye")))
        );
        assert_eq!(
            h.storage.keys().await.unwrap(),
            [format!("Blazor.EasyAuth.{other}")]
        );
    }

    #[tokio::test]
    async fn test_complete_sign_out_without_id_cleans_up() {
        let h = harness(AuthOptions::default());
        h.coordinator
            .store()
            .begin_handshake(&ReturnState::default())
            .await
            .unwrap();

        let outcome = h
            .coordinator
            .complete_sign_out("https://app.example/authentication/logout-callback")
            .await;
        assert_eq!(outcome, HandshakeOutcome::Success(None));
        assert!(h.storage.is_empty().await);

        // Nothing left: still succeeds
        let outcome = h
            .coordinator
            .complete_sign_out("https://app.example/authentication/logout-callback")
            .await;
        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn test_complete_sign_in_discards_unreadable_state() {
        let h = harness(AuthOptions::default());
        h.storage.set("Blazor.EasyAuth.bad", "not json").await.unwrap();
        let outcome = h
            .coordinator
            .complete_sign_in("https://app.example/authentication/login-callback/bad")
            .await
            .unwrap();
        assert!(matches!(outcome, HandshakeOutcome::Failure { .. }));
        assert!(h.storage.is_empty().await);

        // Revisiting the callback is an ordinary unknown-id failure
        let outcome = h
            .coordinator
            .complete_sign_in("https://app.example/authentication/login-callback/bad")
            .await
            .unwrap();
        assert!(matches!(outcome, HandshakeOutcome::Failure { .. }));
    }

    #[tokio::test]
    async fn test_complete_sign_out_discards_unreadable_state() {
        let h = harness(AuthOptions::default());
        h.storage.set("Blazor.EasyAuth.bad", "not json").await.unwrap();
        let outcome = h
            .coordinator
            .complete_sign_out("/authentication/logout-callback/bad")
            .await;
        assert_eq!(outcome, HandshakeOutcome::Success(None));
        assert!(h.storage.is_empty().await);
    }

    #[tokio::test]
    async fn test_gateway_url_prefixes_endpoints() {
        let h = harness(
            AuthOptions::builder()
                .gateway_url("https://gw.example/")
                .build(),
        );
        h.coordinator.sign_out(&ReturnState::default()).await.unwrap();
        let (url, _) = h.navigator.last().unwrap();
        assert!(url.starts_with("https://gw.example/.auth/logout?post_logout_redirect_uri="));
    }

    #[tokio::test]
    async fn test_get_authentication_state_delegates_to_cache() {
        let h = harness(AuthOptions::default());
        let identity = h.coordinator.get_authentication_state().await;
        assert!(!identity.is_authenticated);
    }

    #[test]
    fn test_builder_requires_navigator() {
        let err = HandshakeCoordinator::<ReturnState>::builder()
            .build()
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidConfig(_)));
    }

    #[test]
    fn test_builder_default_cache_uses_http_fetcher() {
        let coordinator = HandshakeCoordinator::<ReturnState>::builder()
            .navigator(Arc::new(HistoryNavigator::new(BASE, BASE)))
            .build()
            .unwrap();
        assert_eq!(coordinator.cache().identity_url(), "/.auth/me");
        assert!(coordinator.cache().is_caching());
        assert_eq!(coordinator.store().prefix(), "Blazor.EasyAuth");
    }
}
