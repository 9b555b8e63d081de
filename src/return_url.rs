//! Return-URL resolution with open-redirect protection
//!
//! After a handshake completes the user is sent back to a return URL taken
//! from the caller state or from the `returnUrl` query parameter of the
//! current page. Every candidate must share the origin of the application
//! base URI and start with it; anything else is rejected with
//! [`AuthError::UnsafeRedirect`].

use crate::error::{AuthError, Result};
use crate::types::RedirectTarget;

/// Query parameter carrying the return URL
pub const RETURN_URL_PARAMETER: &str = "returnUrl";

/// Same-origin check for post-handshake redirects
#[derive(Debug, Clone)]
pub struct ReturnUrlGuard {
    base_uri: String,
}

impl ReturnUrlGuard {
    /// Create a guard for the application at `base_uri`
    ///
    /// The base is normalized to end in `/` so the prefix check cannot be
    /// satisfied by a lookalike host such as `app.example.evil.com`.
    pub fn new(base_uri: impl Into<String>) -> Self {
        let mut base_uri = base_uri.into();
        if !base_uri.ends_with('/') {
            base_uri.push('/');
        }
        Self { base_uri }
    }

    /// Application base URI
    #[must_use]
    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }

    /// Accept `url` if it has the base URI's origin and starts with it
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UnsafeRedirect` otherwise.
    pub fn check(&self, url: &str) -> Result<RedirectTarget> {
        if url.starts_with(&self.base_uri) && self.same_origin(url) {
            Ok(RedirectTarget::new(url))
        } else {
            tracing::warn!(
                url = %url,
                base_uri = %self.base_uri,
                "Rejected return url with foreign origin"
            );
            Err(AuthError::unsafe_redirect(url, &self.base_uri))
        }
    }

    /// Origin comparison after parsing; a base that is not an absolute URL
    /// leaves the prefix check as the only rule
    fn same_origin(&self, url: &str) -> bool {
        let Ok(base) = url::Url::parse(&self.base_uri) else {
            return true;
        };
        url::Url::parse(url).is_ok_and(|candidate| {
            candidate.origin() == base.origin()
                && candidate.username() == base.username()
                && candidate.password() == base.password()
        })
    }

    /// Resolve where to send the user after a handshake
    ///
    /// Precedence: caller-state return URL, then the `returnUrl` query
    /// parameter of `current_uri`, then `default_url`, then the base URI.
    /// A blank query value counts as absent. All candidates are checked.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UnsafeRedirect` if the chosen candidate is not
    /// same-origin with the base URI.
    pub fn extract_return_url(
        &self,
        current_uri: &str,
        caller_state_return_url: Option<&str>,
        default_url: Option<&str>,
    ) -> Result<RedirectTarget> {
        if let Some(url) = caller_state_return_url {
            return self.check(url);
        }

        let from_query = query_parameter(query_of(current_uri), RETURN_URL_PARAMETER)
            .filter(|v| !v.trim().is_empty());
        if let Some(url) = from_query {
            return self.check(&url);
        }

        match default_url {
            Some(url) => self.check(url),
            None => Ok(RedirectTarget::new(&self.base_uri)),
        }
    }
}

/// Query part of a URI (including the leading `?`), fragment excluded
pub(crate) fn query_of(uri: &str) -> &str {
    let without_fragment = uri.split('#').next().unwrap_or(uri);
    without_fragment
        .find('?')
        .map_or("", |pos| &without_fragment[pos..])
}

/// Look up a query-string parameter
///
/// Keys match case-insensitively after decoding and may be preceded by
/// whitespace. Values have `+` turned into spaces and are percent-decoded.
/// The first match wins; a bare key without `=` yields an empty string.
#[must_use]
pub fn query_parameter(query: &str, key: &str) -> Option<String> {
    let query = query.strip_prefix('?').unwrap_or(query);
    if query.is_empty() {
        return None;
    }

    for pair in query.split('&') {
        let pair = pair.trim_start();
        match pair.split_once('=') {
            Some((name, value)) => {
                if decode_component(name).eq_ignore_ascii_case(key) {
                    return Some(decode_component(value));
                }
            }
            None => {
                if !pair.is_empty() && decode_component(pair).eq_ignore_ascii_case(key) {
                    return Some(String::new());
                }
            }
        }
    }

    None
}

/// `+`-as-space then percent-decoding; malformed escapes are kept verbatim
fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => String::from_utf8_lossy(&urlencoding::decode_binary(spaced.as_bytes())).into_owned(),
    }
}
