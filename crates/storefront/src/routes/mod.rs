//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                  - Health check
//!
//! # Cart (JSON)
//! GET  /api/cart                - Current cart
//! POST /api/cart/items          - Add item
//! POST /api/cart/items/update   - Update quantity (0 or less removes)
//! POST /api/cart/items/remove   - Remove item
//!
//! # Checkout
//! POST /api/checkout/complete   - Summarize and clear the cart after payment
//!
//! # Products
//! GET  /api/products?category=  - Catalog listing
//! ```

pub mod cart;
pub mod checkout;
pub mod products;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Create the cart API router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/items", post(cart::add))
        .route("/items/update", post(cart::update))
        .route("/items/remove", post(cart::remove))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        // Cart API
        .nest("/api/cart", cart_routes())
        // Checkout completion
        .route("/api/checkout/complete", post(checkout::complete))
        // Catalog
        .route("/api/products", get(products::index))
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}
