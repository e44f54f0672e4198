//! Cart route handlers.
//!
//! Each request builds a [`CartContainer`] over the request's session, runs
//! the sign-in migration if this session just went from anonymous to
//! authenticated, performs the operation and responds with the cart view.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use threadline_core::{CartToken, Identity, IdentityKind, ItemKey, ProductId, UserId};

use crate::cart::{CartContainer, CartOptions, LineItem, SessionStorage, migrate_on_sign_in};
use crate::catalog::Catalog;
use crate::checkout::CartTotals;
use crate::config::CartConfig;
use crate::error::{Result, add_breadcrumb};
use crate::middleware::AuthenticatedUser;
use crate::models::session::{last_identity_kind, set_last_identity_kind};
use crate::state::AppState;

/// A cart living in the request's session.
pub type SessionCart = CartContainer<SessionStorage, Catalog>;

/// Cart state as returned by every cart endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub identity: Identity,
    pub cart_id: Option<CartToken>,
    pub items: Vec<LineItem>,
    pub item_count: u64,
    pub totals: CartTotals,
    pub error: Option<String>,
    pub is_loading: bool,
}

impl CartView {
    /// Snapshot a container.
    #[must_use]
    pub fn of(cart: &SessionCart, config: &CartConfig) -> Self {
        Self {
            identity: cart.identity().clone(),
            cart_id: cart.cart_id().cloned(),
            items: cart.items().to_vec(),
            item_count: cart.item_count(),
            totals: CartTotals::compute(cart.items(), config),
            error: cart.error().map(String::from),
            is_loading: cart.is_loading(),
        }
    }
}

/// Add to cart request body.
#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_id: ProductId,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    pub color: String,
    pub size: String,
}

const fn default_quantity() -> u32 {
    1
}

/// Update quantity request body. Zero or less removes the item.
#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub item_key: ItemKey,
    pub quantity: i64,
}

/// Remove item request body.
#[derive(Debug, Deserialize)]
pub struct RemoveItemRequest {
    pub item_key: ItemKey,
}

// =============================================================================
// Session Helpers
// =============================================================================

/// Open the cart for this request.
///
/// The session remembers which kind of identity it saw last. When that was
/// anonymous and the request now carries a signed-in user, the anonymous cart
/// is migrated before the user's cart is loaded.
pub async fn open_cart(
    state: &AppState,
    session: &Session,
    user: Option<UserId>,
) -> Result<SessionCart> {
    let storage = SessionStorage::new(session.clone());
    let persistence = state.config().cart.persistence;

    let last_kind = last_identity_kind(session).await?;
    if let (Some(user), Some(IdentityKind::Anonymous)) = (&user, last_kind) {
        let outcome = migrate_on_sign_in(&storage, user, persistence).await?;
        tracing::info!(user_id = %user, ?outcome, "Session signed in");
    }

    let cart = CartContainer::initialize(
        storage,
        state.catalog().clone(),
        user,
        CartOptions { persistence },
    )
    .await;

    set_last_identity_kind(session, cart.identity().kind()).await?;
    Ok(cart)
}

// =============================================================================
// Handlers
// =============================================================================

/// Show the current cart.
#[instrument(skip(state, session))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<CartView>> {
    let cart = open_cart(&state, &session, user).await?;
    Ok(Json(CartView::of(&cart, &state.config().cart)))
}

/// Add an item to the cart.
///
/// Always creates a new line, even for a product/color/size already in the
/// cart. Unknown products respond 404.
#[instrument(skip(state, session))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(request): Json<AddItemRequest>,
) -> Result<Json<CartView>> {
    let mut cart = open_cart(&state, &session, user).await?;

    let key = cart
        .add_item(
            &request.product_id,
            request.quantity,
            &request.color,
            &request.size,
        )
        .await?;

    add_breadcrumb(
        "cart",
        "Added item",
        Some(&[
            ("product_id", request.product_id.as_str()),
            ("item_key", key.as_str()),
        ]),
    );

    Ok(Json(CartView::of(&cart, &state.config().cart)))
}

/// Change an item's quantity.
#[instrument(skip(state, session))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(request): Json<UpdateItemRequest>,
) -> Result<Json<CartView>> {
    let mut cart = open_cart(&state, &session, user).await?;

    if !cart.update_item(&request.item_key, request.quantity).await? {
        tracing::debug!(item_key = %request.item_key, "Update for unknown item ignored");
    }

    Ok(Json(CartView::of(&cart, &state.config().cart)))
}

/// Remove an item.
#[instrument(skip(state, session))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(request): Json<RemoveItemRequest>,
) -> Result<Json<CartView>> {
    let mut cart = open_cart(&state, &session, user).await?;
    cart.remove_item(&request.item_key).await?;
    Ok(Json(CartView::of(&cart, &state.config().cart)))
}
