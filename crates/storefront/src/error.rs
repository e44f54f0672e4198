//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::cart::{ADD_FAILED_MESSAGE, CartError, UPDATE_FAILED_MESSAGE};
use crate::catalog::CatalogError;
use crate::checkout::CheckoutError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Cart operation failed.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// Checkout completion failed.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Content store query failed.
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Session store operation failed.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),
}

impl AppError {
    fn cart_status(err: &CartError) -> StatusCode {
        match err {
            CartError::ProductNotFound(_) => StatusCode::NOT_FOUND,
            CartError::InvalidQuantity(_) => StatusCode::BAD_REQUEST,
            CartError::Catalog(_) => StatusCode::BAD_GATEWAY,
            CartError::Storage(_) | CartError::Serialize(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Cart(err) | Self::Checkout(CheckoutError::Cart(err)) => Self::cart_status(err),
            Self::Checkout(CheckoutError::NotSignedIn) => StatusCode::UNAUTHORIZED,
            Self::Checkout(CheckoutError::MissingSessionId) => StatusCode::BAD_REQUEST,
            Self::Catalog(_) => StatusCode::BAD_GATEWAY,
            Self::Session(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Cart(err) if err.is_lookup_failure() => ADD_FAILED_MESSAGE.to_string(),
            Self::Cart(CartError::InvalidQuantity(_)) => self.to_string(),
            Self::Cart(_) => UPDATE_FAILED_MESSAGE.to_string(),
            Self::Catalog(_) => "External service error".to_string(),
            Self::Session(_) | Self::Checkout(CheckoutError::Cart(_)) => {
                "Internal server error".to_string()
            }
            Self::Checkout(_) => self.to_string(),
        };

        (status, message).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Called by the authentication extractor so errors are associated with users.
pub fn set_sentry_user(user_id: &impl ToString) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            ..Default::default()
        }));
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added item", Some(&[("product_id", "123")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
