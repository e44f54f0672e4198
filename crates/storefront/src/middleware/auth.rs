//! Authentication extractor.
//!
//! Sign-in is handled by an authenticating proxy in front of the storefront.
//! The proxy passes the signed-in user's id in a trusted header (configured
//! via `STOREFRONT_AUTH_HEADER`); requests without it are anonymous.

use axum::{extract::FromRequestParts, http::request::Parts};

use threadline_core::UserId;

use crate::error::set_sentry_user;
use crate::state::AppState;

/// Extractor that optionally gets the signed-in user.
///
/// Never rejects: a missing, empty or non-UTF-8 header means anonymous.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(
///     AuthenticatedUser(user): AuthenticatedUser,
/// ) -> impl IntoResponse {
///     match user {
///         Some(id) => format!("Hello, {id}!"),
///         None => "Hello, guest!".to_string(),
///     }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser(pub Option<UserId>);

impl AuthenticatedUser {
    /// Read the user id from `header` in `parts`.
    fn from_header(parts: &Parts, header: &str) -> Self {
        let user = parts
            .headers
            .get(header)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(UserId::new);
        Self(user)
    }
}

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = Self::from_header(parts, &state.config().auth_header);
        if let Some(id) = &user.0 {
            set_sentry_user(id);
        }
        Ok(user)
    }
}
