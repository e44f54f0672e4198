//! Checkout completion route handler.
//!
//! The payment processor redirects the customer back with its session id once
//! payment succeeded. Completing the checkout summarizes and discards the
//! signed-in user's cart.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use crate::checkout::{OrderSummary, complete_checkout, order_reference};
use crate::error::{Result, add_breadcrumb};
use crate::middleware::AuthenticatedUser;
use crate::routes::cart::open_cart;
use crate::state::AppState;

/// Checkout completion request body.
#[derive(Debug, Deserialize)]
pub struct CompleteCheckoutRequest {
    pub session_id: String,
}

/// Checkout completion response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutCompleted {
    /// Short order reference shown to the customer.
    pub order_reference: String,
    /// `None` when the cart was already empty.
    pub order: Option<OrderSummary>,
}

/// Complete a paid checkout.
#[instrument(skip(state, session))]
pub async fn complete(
    State(state): State<AppState>,
    session: Session,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(request): Json<CompleteCheckoutRequest>,
) -> Result<Json<CheckoutCompleted>> {
    let mut cart = open_cart(&state, &session, user).await?;
    let order = complete_checkout(&mut cart, &request.session_id, &state.config().cart).await?;

    let reference = order_reference(request.session_id.trim());
    add_breadcrumb(
        "checkout",
        "Completed checkout",
        Some(&[("order_reference", reference.as_str())]),
    );

    Ok(Json(CheckoutCompleted {
        order_reference: reference,
        order,
    }))
}
