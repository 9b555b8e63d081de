//! Route-driven authenticator for hosts
//!
//! Maps the authentication route the application was launched on to the
//! matching coordinator step, then performs the follow-up navigation:
//! full-page reloads to reach the gateway, client-side navigation back to a
//! validated return URL once a handshake completes.

use std::sync::Arc;

use crate::capabilities::NavigationMode;
use crate::coordinator::HandshakeCoordinator;
use crate::error::Result;
use crate::return_url::{ReturnUrlGuard, query_of, query_parameter};
use crate::types::{AuthenticationPaths, CallerState, HandshakeOutcome, RedirectTarget};

/// Authentication route actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthenticationAction {
    /// Start sign-in (needs a selected provider)
    LogIn,
    /// Gateway returned after sign-in
    LogInCallback,
    /// Sign-in could not be completed
    LogInFailed,
    /// Start sign-out
    LogOut,
    /// Gateway returned after sign-out
    LogOutCallback,
    /// Sign-out could not be completed
    LogOutFailed,
    /// Sign-out finished
    LogOutSucceeded,
}

impl AuthenticationAction {
    /// Resolve the action for an application-relative route
    ///
    /// Callback routes may carry a trailing handshake id segment.
    #[must_use]
    pub fn from_route(paths: &AuthenticationPaths, route: &str) -> Option<Self> {
        let route = route.trim_matches('/');
        let is = |path: &str| route == path.trim_matches('/');
        let is_callback = |path: &str| {
            let path = path.trim_matches('/');
            route == path
                || route
                    .strip_prefix(path)
                    .is_some_and(|rest| rest.starts_with('/') && !rest[1..].contains('/'))
        };

        if is_callback(&paths.log_in_callback_path) {
            Some(Self::LogInCallback)
        } else if is_callback(&paths.log_out_callback_path) {
            Some(Self::LogOutCallback)
        } else if is(&paths.log_in_path) {
            Some(Self::LogIn)
        } else if is(&paths.log_in_failed_path) {
            Some(Self::LogInFailed)
        } else if is(&paths.log_out_path) {
            Some(Self::LogOut)
        } else if is(&paths.log_out_failed_path) {
            Some(Self::LogOutFailed)
        } else if is(&paths.log_out_succeeded_path) {
            Some(Self::LogOutSucceeded)
        } else {
            None
        }
    }
}

/// What the host should render after handling an action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowOutcome {
    /// The page is navigating to the gateway
    Redirected,
    /// Client-side navigation to a validated return URL was issued
    Navigated(RedirectTarget),
    /// Sign-in requested but no provider chosen yet; show the provider list
    AwaitingProviderSelection,
    /// Render the sign-in failure view
    LogInFailed {
        /// Failure reason
        message: String,
    },
    /// Render the sign-out failure view
    LogOutFailed {
        /// Failure reason
        message: String,
    },
    /// Render the signed-out view
    LoggedOut,
}

/// Drives the coordinator from the current route
pub struct Authenticator<S> {
    coordinator: Arc<HandshakeCoordinator<S>>,
    guard: ReturnUrlGuard,
}

impl<S> std::fmt::Debug for Authenticator<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("coordinator", &self.coordinator)
            .field("guard", &self.guard)
            .finish()
    }
}

impl<S: CallerState + Default> Authenticator<S> {
    /// Create an authenticator guarding return URLs with the navigator's base URI
    #[must_use]
    pub fn new(coordinator: Arc<HandshakeCoordinator<S>>) -> Self {
        let guard = ReturnUrlGuard::new(coordinator.navigator().base_uri());
        Self { coordinator, guard }
    }

    /// Underlying coordinator
    #[must_use]
    pub fn coordinator(&self) -> &Arc<HandshakeCoordinator<S>> {
        &self.coordinator
    }

    /// Action for the current page, if it is an authentication route
    #[must_use]
    pub fn current_action(&self) -> Option<AuthenticationAction> {
        let current = self.coordinator.navigator().current_uri();
        let route = current
            .strip_prefix(self.guard.base_uri())
            .unwrap_or(&current);
        let route = route.split(['?', '#']).next().unwrap_or(route);
        AuthenticationAction::from_route(&self.coordinator.options().paths, route)
    }

    /// Handle whatever authentication route the page is on
    ///
    /// Returns `None` when the current page is not an authentication route.
    ///
    /// # Errors
    ///
    /// See [`handle`](Self::handle).
    pub async fn handle_current(&self, selected_provider: Option<&str>) -> Result<Option<FlowOutcome>> {
        match self.current_action() {
            Some(action) => self.handle(action, selected_provider).await.map(Some),
            None => Ok(None),
        }
    }

    /// Handle `action` for the current page
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UnsafeRedirect` when a return URL is not
    /// same-origin, `AuthError::InvalidHandshakeContext` for a bad provider,
    /// and collaborator errors from storage or navigation.
    pub async fn handle(
        &self,
        action: AuthenticationAction,
        selected_provider: Option<&str>,
    ) -> Result<FlowOutcome> {
        let current = self.coordinator.navigator().current_uri();
        tracing::debug!(action = ?action, uri = %current, "Handling authentication route");

        match action {
            AuthenticationAction::LogIn => {
                let Some(provider) = selected_provider else {
                    return Ok(FlowOutcome::AwaitingProviderSelection);
                };
                let return_url = self.guard.extract_return_url(&current, None, None)?;
                let mut state = S::default();
                state.set_return_url(return_url.into_string());
                let outcome = self.coordinator.sign_in(provider, &state).await?;
                self.finish_log_in(outcome, &current).await
            }
            AuthenticationAction::LogInCallback => {
                let outcome = self.coordinator.complete_sign_in(&current).await?;
                self.finish_log_in(outcome, &current).await
            }
            AuthenticationAction::LogOut => {
                let logged_out = self.logged_out_uri();
                let return_url = self
                    .guard
                    .extract_return_url(&current, None, Some(&logged_out))?;
                let mut state = S::default();
                state.set_return_url(return_url.into_string());
                match self.coordinator.sign_out(&state).await? {
                    HandshakeOutcome::Redirect => Ok(FlowOutcome::Redirected),
                    other => self.finish_log_out(other, &current).await,
                }
            }
            AuthenticationAction::LogOutCallback => {
                let outcome = self.coordinator.complete_sign_out(&current).await;
                self.finish_log_out(outcome, &current).await
            }
            AuthenticationAction::LogInFailed => Ok(FlowOutcome::LogInFailed {
                message: failure_message(&current),
            }),
            AuthenticationAction::LogOutFailed => Ok(FlowOutcome::LogOutFailed {
                message: failure_message(&current),
            }),
            AuthenticationAction::LogOutSucceeded => Ok(FlowOutcome::LoggedOut),
        }
    }

    async fn finish_log_in(&self, outcome: HandshakeOutcome<S>, current: &str) -> Result<FlowOutcome> {
        match outcome {
            HandshakeOutcome::Redirect => Ok(FlowOutcome::Redirected),
            HandshakeOutcome::Success(state) => {
                let from_state = state.as_ref().and_then(|s| s.return_url());
                let target = self.guard.extract_return_url(current, from_state, None)?;
                self.navigate_client_side(target).await
            }
            HandshakeOutcome::Failure { message } => {
                let failed = self.absolute(&self.coordinator.options().paths.log_in_failed_path);
                self.coordinator
                    .navigator()
                    .navigate_to(&failed, NavigationMode::ClientSide)
                    .await?;
                Ok(FlowOutcome::LogInFailed { message })
            }
        }
    }

    async fn finish_log_out(&self, outcome: HandshakeOutcome<S>, current: &str) -> Result<FlowOutcome> {
        match outcome {
            HandshakeOutcome::Redirect => Ok(FlowOutcome::Redirected),
            HandshakeOutcome::Success(state) => {
                let from_state = state.as_ref().and_then(|s| s.return_url());
                let logged_out = self.logged_out_uri();
                let target = self
                    .guard
                    .extract_return_url(current, from_state, Some(&logged_out))?;
                self.navigate_client_side(target).await
            }
            HandshakeOutcome::Failure { message } => {
                let failed = self.absolute(&self.coordinator.options().paths.log_out_failed_path);
                self.coordinator
                    .navigator()
                    .navigate_to(&failed, NavigationMode::ClientSide)
                    .await?;
                Ok(FlowOutcome::LogOutFailed { message })
            }
        }
    }

    async fn navigate_client_side(&self, target: RedirectTarget) -> Result<FlowOutcome> {
        self.coordinator
            .navigator()
            .navigate_to(target.as_str(), NavigationMode::ClientSide)
            .await?;
        Ok(FlowOutcome::Navigated(target))
    }

    fn logged_out_uri(&self) -> String {
        self.absolute(&self.coordinator.options().paths.log_out_succeeded_path)
    }

    fn absolute(&self, path: &str) -> String {
        format!("{}{}", self.guard.base_uri(), path.trim_start_matches('/'))
    }
}

fn failure_message(current: &str) -> String {
    query_parameter(query_of(current), "message").unwrap_or_else(|| "There was an error during authentication.".to_string())
}
