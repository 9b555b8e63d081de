//! Trait-based capabilities injected by the host.
//!
//! The handshake never touches the browser directly. Hosts provide session
//! storage, navigation and HTTP fetch through these traits; in-process
//! implementations live in [`store`](crate::store) ([`MemorySessionStorage`](crate::store::MemorySessionStorage)),
//! [`cache`](crate::cache) ([`HttpIdentityFetcher`](crate::cache::HttpIdentityFetcher))
//! and [`HistoryNavigator`] below.
//!
//! # Example: Implementing `Navigator`
//!
//! ```no_run
//! use easyauth_handshake::capabilities::{NavigationMode, Navigator};
//! use easyauth_handshake::Result;
//! use async_trait::async_trait;
//!
//! struct LoggingNavigator {
//!     base: String,
//! }
//!
//! #[async_trait]
//! impl Navigator for LoggingNavigator {
//!     fn base_uri(&self) -> String {
//!         self.base.clone()
//!     }
//!
//!     fn current_uri(&self) -> String {
//!         self.base.clone()
//!     }
//!
//!     async fn navigate_to(&self, url: &str, mode: NavigationMode) -> Result<()> {
//!         println!("navigate {mode:?} -> {url}");
//!         Ok(())
//!     }
//! }
//! ```

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::error::{AuthError, Result};

// ============================================================================
// Session Storage
// ============================================================================

/// Key-value storage scoped to one browser tab session
///
/// Values are text. Must survive the full-page navigation to the gateway.
#[async_trait]
pub trait SessionStorage: Send + Sync {
    /// Read a value
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, replacing any previous one
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a value; removing a missing key is not an error
    async fn remove(&self, key: &str) -> Result<()>;

    /// All keys currently stored
    async fn keys(&self) -> Result<Vec<String>>;
}

#[async_trait]
impl<T: SessionStorage + ?Sized> SessionStorage for Arc<T> {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key).await
    }

    async fn keys(&self) -> Result<Vec<String>> {
        (**self).keys().await
    }
}

// ============================================================================
// Navigation
// ============================================================================

/// How a navigation is performed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationMode {
    /// Full page load; unloads the current execution context
    FullReload,
    /// In-app route change without reloading
    ClientSide,
}

/// Navigation primitive of the host
#[async_trait]
pub trait Navigator: Send + Sync {
    /// Application base URI, with trailing slash (e.g. `https://app.example/`)
    fn base_uri(&self) -> String;

    /// Absolute URI of the current page
    fn current_uri(&self) -> String;

    /// Navigate to `url`
    async fn navigate_to(&self, url: &str, mode: NavigationMode) -> Result<()>;
}

#[async_trait]
impl<T: Navigator + ?Sized> Navigator for Arc<T> {
    fn base_uri(&self) -> String {
        (**self).base_uri()
    }

    fn current_uri(&self) -> String {
        (**self).current_uri()
    }

    async fn navigate_to(&self, url: &str, mode: NavigationMode) -> Result<()> {
        (**self).navigate_to(url, mode).await
    }
}

// ============================================================================
// Identity Fetch
// ============================================================================

/// HTTP GET primitive used for the identity endpoint
#[async_trait]
pub trait IdentityFetcher: Send + Sync {
    /// Fetch `url` and return the response body
    ///
    /// # Errors
    /// Returns `AuthError::Fetch` on transport failure or a non-2xx status.
    async fn fetch(&self, url: &str) -> Result<String>;
}

#[async_trait]
impl<T: IdentityFetcher + ?Sized> IdentityFetcher for Arc<T> {
    async fn fetch(&self, url: &str) -> Result<String> {
        (**self).fetch(url).await
    }
}

// ============================================================================
// Type aliases for shared capabilities
// ============================================================================

/// Shared session storage handle
pub type SharedSessionStorage = Arc<dyn SessionStorage>;

/// Shared navigator handle
pub type SharedNavigator = Arc<dyn Navigator>;

/// Shared identity fetcher handle
pub type SharedIdentityFetcher = Arc<dyn IdentityFetcher>;

// ============================================================================
// In-process navigator
// ============================================================================

/// Navigator that records navigations instead of performing them
///
/// Full reloads and client-side navigations both move `current_uri`; relative
/// targets are resolved against the base URI.
#[derive(Debug)]
pub struct HistoryNavigator {
    base_uri: String,
    current: Mutex<String>,
    history: Mutex<Vec<(String, NavigationMode)>>,
}

impl HistoryNavigator {
    /// Create a navigator positioned at `current_uri`
    pub fn new(base_uri: impl Into<String>, current_uri: impl Into<String>) -> Self {
        Self {
            base_uri: base_uri.into(),
            current: Mutex::new(current_uri.into()),
            history: Mutex::new(Vec::new()),
        }
    }

    /// Navigations performed so far, oldest first
    #[must_use]
    pub fn history(&self) -> Vec<(String, NavigationMode)> {
        self.history
            .lock()
            .map(|h| h.clone())
            .unwrap_or_default()
    }

    /// Last navigation, if any
    #[must_use]
    pub fn last(&self) -> Option<(String, NavigationMode)> {
        self.history().pop()
    }

    /// Move to `uri` without recording a navigation (e.g. the gateway returning)
    pub fn set_current(&self, uri: impl Into<String>) {
        if let Ok(mut current) = self.current.lock() {
            *current = uri.into();
        }
    }

    fn resolve(&self, url: &str) -> String {
        url::Url::parse(&self.base_uri)
            .and_then(|base| base.join(url))
            .map(|u| u.to_string())
            .unwrap_or_else(|_| url.to_string())
    }
}

#[async_trait]
impl Navigator for HistoryNavigator {
    fn base_uri(&self) -> String {
        self.base_uri.clone()
    }

    fn current_uri(&self) -> String {
        self.current
            .lock()
            .map(|c| c.clone())
            .unwrap_or_else(|_| self.base_uri.clone())
    }

    async fn navigate_to(&self, url: &str, mode: NavigationMode) -> Result<()> {
        let resolved = self.resolve(url);
        self.history
            .lock()
            .map_err(|e| AuthError::navigation(e.to_string()))?
            .push((url.to_string(), mode));
        self.set_current(resolved);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_history_navigator_records() {
        let nav = HistoryNavigator::new("https://app.example/", "https://app.example/");
        nav.navigate_to("/.auth/logout", NavigationMode::FullReload)
            .await
            .unwrap();
        assert_eq!(
            nav.last(),
            Some(("/.auth/logout".to_string(), NavigationMode::FullReload))
        );
        assert_eq!(nav.current_uri(), "https://app.example/.auth/logout");
    }

    #[tokio::test]
    async fn test_arc_wrapped_navigator() {
        let nav: SharedNavigator = Arc::new(HistoryNavigator::new(
            "https://app.example/",
            "https://app.example/page",
        ));
        assert_eq!(nav.current_uri(), "https://app.example/page");
        nav.navigate_to("https://app.example/home", NavigationMode::ClientSide)
            .await
            .unwrap();
        assert_eq!(nav.current_uri(), "https://app.example/home");
    }
}
