//! Type definitions for the handshake layer
//!
//! Identifiers, configuration options, the gateway wire model with its
//! normalized identity, and the caller-state types carried across redirects.

// Module declarations
pub mod identifiers;
pub mod options;
pub mod principal;
pub mod state;

pub use identifiers::{HandshakeId, ProviderId, RedirectTarget};
pub use options::{
    APP_SERVICE_STORAGE_PREFIX, AuthMode, AuthOptions, AuthOptionsBuilder, AuthenticationPaths,
    EASY_AUTH_STORAGE_PREFIX, ExternalProvider, IDENTITY_ENDPOINT,
};
pub use principal::{AuthenticationSnapshot, Claim, ClaimType, GatewayPrincipal, NormalizedIdentity};
pub use state::{CallerState, HandshakeOutcome, ReturnState};
