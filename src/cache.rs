//! Session-scoped cache of the gateway principal
//!
//! [`AuthenticationDataCache`] probes `/.auth/me` at most once per session
//! (unless caching is disabled) and hands out normalized identities. Fetch
//! failures never escape: they clear the cache and yield the anonymous
//! identity.

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::capabilities::{IdentityFetcher, SharedIdentityFetcher};
use crate::claims::normalize;
use crate::error::{AuthError, Result};
use crate::types::{AuthOptions, AuthenticationSnapshot, NormalizedIdentity};

/// Memoized identity lookups for one session
///
/// Share it by `Arc` between the coordinator and anything else rendering
/// authorization state. The snapshot slot stays locked while a fetch is in
/// flight, so concurrent first lookups produce a single request.
pub struct AuthenticationDataCache {
    fetcher: SharedIdentityFetcher,
    identity_url: String,
    cache_enabled: bool,
    snapshot: Mutex<Option<AuthenticationSnapshot>>,
}

impl std::fmt::Debug for AuthenticationDataCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticationDataCache")
            .field("identity_url", &self.identity_url)
            .field("cache_enabled", &self.cache_enabled)
            .finish_non_exhaustive()
    }
}

impl AuthenticationDataCache {
    /// Create a cache fetching from `identity_url`
    pub fn new(
        fetcher: SharedIdentityFetcher,
        identity_url: impl Into<String>,
        cache_enabled: bool,
    ) -> Self {
        Self {
            fetcher,
            identity_url: identity_url.into(),
            cache_enabled,
            snapshot: Mutex::new(None),
        }
    }

    /// Create a cache from the identity settings in `options`
    #[must_use]
    pub fn from_options(fetcher: SharedIdentityFetcher, options: &AuthOptions) -> Self {
        Self::new(fetcher, options.identity_url(), options.cache_identity)
    }

    /// Identity endpoint URL
    #[must_use]
    pub fn identity_url(&self) -> &str {
        &self.identity_url
    }

    /// Whether snapshots are kept between lookups
    #[must_use]
    pub fn is_caching(&self) -> bool {
        self.cache_enabled
    }

    /// Current identity of the session
    ///
    /// Reuses the cached snapshot when present; otherwise fetches. Any
    /// failure leaves the cache empty and returns the anonymous identity,
    /// so the next lookup fetches again.
    pub async fn get_identity(&self) -> NormalizedIdentity {
        let mut slot = self.snapshot.lock().await;

        if self.cache_enabled {
            if let Some(snapshot) = slot.as_ref() {
                tracing::trace!("Using cached authentication data");
                return normalize(snapshot);
            }
        }

        match self.load().await {
            Ok(snapshot) => {
                let identity = normalize(&snapshot);
                if self.cache_enabled {
                    *slot = Some(snapshot);
                }
                identity
            }
            Err(e) => {
                tracing::warn!(error = %e, url = %self.identity_url, "Identity probe failed, treating user as anonymous");
                *slot = None;
                NormalizedIdentity::anonymous()
            }
        }
    }

    /// Cached snapshot, if any
    pub async fn snapshot(&self) -> Option<AuthenticationSnapshot> {
        self.snapshot.lock().await.clone()
    }

    /// Drop the cached snapshot so the next lookup fetches again
    pub async fn invalidate(&self) {
        *self.snapshot.lock().await = None;
    }

    async fn load(&self) -> Result<AuthenticationSnapshot> {
        tracing::debug!(url = %self.identity_url, "Fetching authentication data");
        let body = self.fetcher.fetch(&self.identity_url).await?;
        serde_json::from_str(&body)
            .map_err(|e| AuthError::fetch(format!("Malformed identity response: {e}")))
    }
}

// ============================================================================
// HTTP fetcher
// ============================================================================

/// [`IdentityFetcher`] over `reqwest`
///
/// Relative URLs (the default `/.auth/me`) are resolved against the
/// application base URI.
#[derive(Debug, Clone)]
pub struct HttpIdentityFetcher {
    client: reqwest::Client,
    base_uri: url::Url,
}

impl HttpIdentityFetcher {
    /// Create a fetcher for the application at `base_uri`
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidConfig` if `base_uri` is not an absolute URL.
    pub fn new(base_uri: &str) -> Result<Self> {
        Self::with_client(reqwest::Client::new(), base_uri)
    }

    /// Create a fetcher reusing an existing HTTP client
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidConfig` if `base_uri` is not an absolute URL.
    pub fn with_client(client: reqwest::Client, base_uri: &str) -> Result<Self> {
        let base_uri = url::Url::parse(base_uri)
            .map_err(|e| AuthError::invalid_config(format!("Invalid base uri '{base_uri}': {e}")))?;
        Ok(Self { client, base_uri })
    }

    fn resolve(&self, url: &str) -> Result<url::Url> {
        self.base_uri
            .join(url)
            .map_err(|e| AuthError::fetch(format!("Invalid identity url '{url}': {e}")))
    }
}

#[async_trait]
impl IdentityFetcher for HttpIdentityFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let url = self.resolve(url)?;
        let response = self
            .client
            .get(url.clone())
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| AuthError::fetch(format!("Request to {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::fetch(format!("{url} returned {status}")));
        }

        response
            .text()
            .await
            .map_err(|e| AuthError::fetch(format!("Failed to read response from {url}: {e}")))
    }
}
