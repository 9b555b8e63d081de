//! # EasyAuth Handshake
//!
//! Client-side sign-in/sign-out handshake for applications fronted by an
//! EasyAuth-style authentication gateway (`/.auth/login/{provider}`,
//! `/.auth/logout`, `/.auth/me`). The gateway performs the provider
//! exchange; this crate correlates the redirect flow across full page
//! navigations, normalizes the gateway principal into claims, and refuses
//! unsafe post-login redirects.
//!
//! ## Quick Start
//!
//! ```no_run
//! use easyauth_handshake::{
//!     AuthOptions, Authenticator, FlowOutcome, HandshakeCoordinator, HistoryNavigator,
//!     MemorySessionStorage, ReturnState,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let navigator = Arc::new(HistoryNavigator::new(
//!         "https://app.example/",
//!         "https://app.example/authentication/login?returnUrl=https%3A%2F%2Fapp.example%2Fcounter",
//!     ));
//!
//!     let coordinator = HandshakeCoordinator::<ReturnState>::builder()
//!         .options(AuthOptions::default())
//!         .storage(Arc::new(MemorySessionStorage::new()))
//!         .navigator(navigator)
//!         .build()?;
//!     let authenticator = Authenticator::new(Arc::new(coordinator));
//!
//!     // On the login route with a provider picked: persists state and leaves for the gateway
//!     let outcome = authenticator.handle_current(Some("github")).await?;
//!     assert_eq!(outcome, Some(FlowOutcome::Redirected));
//!     Ok(())
//! }
//! ```
//!
//! ## Components
//!
//! - [`return_url`]: return-URL resolution and the query-string parser
//! - [`claims`]: gateway principal → [`NormalizedIdentity`]
//! - [`store`]: handshake id ↔ caller state in session storage
//! - [`cache`]: session-scoped memoization of `/.auth/me`
//! - [`coordinator`]: the sign-in/sign-out state machine
//! - [`authenticator`]: route-driven driver for hosts
//! - [`capabilities`]: storage, navigation and fetch traits the host injects
//! - [`types`]: identifiers, options, wire model, caller state
//! - [`error`]: error types
//!
//! ## Logging
//!
//! This crate uses [`tracing`](https://crates.io/crates/tracing) for structured logging.
//! Rejected return URLs are logged at `warn` level; treat them as security events.
//!
//! ```rust,ignore
//! tracing_subscriber::fmt::init();
//! ```
//!
//! ## Error Handling
//!
//! Fallible operations return [`Result<T, AuthError>`](Result). Identity
//! lookups never fail: fetch problems degrade to the anonymous identity.
//!
//! ```no_run
//! # use easyauth_handshake::{AuthError, ReturnUrlGuard};
//! let guard = ReturnUrlGuard::new("https://app.example/");
//! match guard.extract_return_url("https://app.example/?returnUrl=https://evil.example/", None, None) {
//!     Ok(target) => println!("go to {target}"),
//!     Err(e @ AuthError::UnsafeRedirect { .. }) => eprintln!("security: {e}"),
//!     Err(e) => eprintln!("error: {e}"),
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod authenticator;
pub mod cache;
pub mod capabilities;
pub mod claims;
pub mod coordinator;
pub mod error;
pub mod return_url;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use authenticator::{AuthenticationAction, Authenticator, FlowOutcome};
pub use cache::{AuthenticationDataCache, HttpIdentityFetcher};
pub use capabilities::{
    HistoryNavigator, IdentityFetcher, NavigationMode, Navigator, SessionStorage,
    SharedIdentityFetcher, SharedNavigator, SharedSessionStorage,
};
pub use claims::{normalize, parse_claims};
pub use coordinator::{HandshakeCoordinator, HandshakeCoordinatorBuilder};
pub use error::{AuthError, Result};
pub use return_url::{ReturnUrlGuard, query_parameter};
pub use store::{MemorySessionStorage, RedirectStateStore};
pub use types::{
    AuthMode, AuthOptions, AuthenticationPaths, AuthenticationSnapshot, CallerState, Claim,
    ClaimType, ExternalProvider, GatewayPrincipal, HandshakeId, HandshakeOutcome,
    NormalizedIdentity, ProviderId, RedirectTarget, ReturnState,
};

/// Version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
