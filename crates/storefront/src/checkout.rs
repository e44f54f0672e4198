//! Cart totals and checkout completion.
//!
//! Payment happens elsewhere: the payment processor redirects back with a
//! session id once the customer has paid. Completing a checkout turns the
//! signed-in user's persisted cart into an [`OrderSummary`] and discards the
//! cart.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument};

use threadline_core::{OrderStatus, Price, UserId};

use crate::cart::{CartContainer, CartError, CartStorage, LineItem};
use crate::catalog::CatalogLookup;
use crate::config::CartConfig;

/// Errors that can occur when completing a checkout.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Only signed-in users can complete a checkout.
    #[error("Checkout requires a signed-in user")]
    NotSignedIn,

    /// The payment session id was empty.
    #[error("Missing payment session id")]
    MissingSessionId,

    /// Reading or clearing the cart failed.
    #[error(transparent)]
    Cart(#[from] CartError),
}

/// Subtotal, shipping and total of a set of line items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartTotals {
    pub subtotal: Price,
    pub shipping: Price,
    pub total: Price,
}

impl CartTotals {
    /// Compute totals. Shipping is the flat rate whenever the subtotal is
    /// positive, and free otherwise.
    #[must_use]
    pub fn compute(items: &[LineItem], config: &CartConfig) -> Self {
        let subtotal: Decimal = items.iter().map(LineItem::line_total).sum();
        let shipping = if subtotal > Decimal::ZERO {
            config.shipping_flat_rate
        } else {
            Decimal::ZERO
        };

        Self {
            subtotal: Price::new(subtotal, config.currency),
            shipping: Price::new(shipping, config.currency),
            total: Price::new(subtotal + shipping, config.currency),
        }
    }
}

/// A completed order, ready to be recorded in the user's order history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    /// The payment session id.
    pub order_id: String,
    pub user_id: UserId,
    pub items: Vec<LineItem>,
    pub subtotal: Price,
    pub shipping: Price,
    pub total: Price,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

impl OrderSummary {
    /// Short reference shown to the customer.
    #[must_use]
    pub fn reference(&self) -> String {
        order_reference(&self.order_id)
    }
}

/// Last 8 characters of an order id, upper-cased. `"N/A"` for an empty id.
#[must_use]
pub fn order_reference(order_id: &str) -> String {
    if order_id.is_empty() {
        return "N/A".to_string();
    }
    let skip = order_id.chars().count().saturating_sub(8);
    order_id.chars().skip(skip).collect::<String>().to_uppercase()
}

/// Complete a paid checkout for the container's signed-in user.
///
/// The cart is reloaded from storage, summarized and then cleared. An empty
/// cart is still cleared and yields `None`.
///
/// # Errors
///
/// - `CheckoutError::MissingSessionId` if `session_id` is blank
/// - `CheckoutError::NotSignedIn` if the container's identity is anonymous
/// - `CheckoutError::Cart` if clearing fails under strict persistence
#[instrument(skip(container, config), fields(identity = %container.identity()))]
pub async fn complete_checkout<S: CartStorage, C: CatalogLookup>(
    container: &mut CartContainer<S, C>,
    session_id: &str,
    config: &CartConfig,
) -> Result<Option<OrderSummary>, CheckoutError> {
    let session_id = session_id.trim();
    if session_id.is_empty() {
        return Err(CheckoutError::MissingSessionId);
    }
    let user_id = container
        .identity()
        .user_id()
        .cloned()
        .ok_or(CheckoutError::NotSignedIn)?;

    container.load().await;
    let items = container.items().to_vec();
    container.clear().await?;

    if items.is_empty() {
        info!(session_id, "Checkout completed with an empty cart");
        return Ok(None);
    }

    let totals = CartTotals::compute(&items, config);
    let summary = OrderSummary {
        order_id: session_id.to_string(),
        user_id,
        items,
        subtotal: totals.subtotal,
        shipping: totals.shipping,
        total: totals.total,
        status: OrderStatus::Completed,
        created_at: Utc::now(),
    };

    info!(
        order_reference = %summary.reference(),
        items = summary.items.len(),
        total = %summary.total,
        "Checkout completed"
    );
    Ok(Some(summary))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use threadline_core::{CurrencyCode, ProductId};

    use super::*;
    use crate::cart::{CartOptions, MemoryStorage, cart_key};
    use crate::catalog::Catalog;
    use crate::catalog::tests::product;

    fn config() -> CartConfig {
        CartConfig::default()
    }

    #[test]
    fn test_order_reference() {
        assert_eq!(order_reference("cs_test_a1b2c3d4e5f6"), "C3D4E5F6");
        assert_eq!(order_reference("abc"), "ABC");
        assert_eq!(order_reference(""), "N/A");
    }

    #[test]
    fn test_totals_of_empty_cart_have_no_shipping() {
        let totals = CartTotals::compute(&[], &config());
        assert_eq!(totals.subtotal, Price::zero(CurrencyCode::INR));
        assert_eq!(totals.shipping, Price::zero(CurrencyCode::INR));
        assert_eq!(totals.total, Price::zero(CurrencyCode::INR));
    }

    async fn signed_in_cart(storage: MemoryStorage) -> CartContainer<MemoryStorage, Catalog> {
        CartContainer::initialize(
            storage,
            Catalog::fixed(vec![product("p1", "T-Shirts", 100), product("p2", "Hoodies", 250)]),
            Some(UserId::new("user_1")),
            CartOptions::default(),
        )
        .await
    }

    #[tokio::test]
    async fn test_totals_add_flat_shipping() {
        let mut cart = signed_in_cart(MemoryStorage::new()).await;
        cart.add_item(&ProductId::new("p1"), 3, "Black", "M")
            .await
            .unwrap();
        cart.add_item(&ProductId::new("p2"), 1, "White", "L")
            .await
            .unwrap();

        let totals = CartTotals::compute(cart.items(), &config());
        assert_eq!(totals.subtotal.amount, Decimal::new(550, 0));
        assert_eq!(totals.shipping.amount, Decimal::new(15, 0));
        assert_eq!(totals.total.amount, Decimal::new(565, 0));
    }

    #[tokio::test]
    async fn test_complete_checkout_summarizes_and_clears() {
        let storage = MemoryStorage::new();
        let mut cart = signed_in_cart(storage.clone()).await;
        cart.add_item(&ProductId::new("p1"), 2, "Black", "M")
            .await
            .unwrap();

        let summary = complete_checkout(&mut cart, "cs_test_0000abcd1234", &config())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(summary.order_id, "cs_test_0000abcd1234");
        assert_eq!(summary.reference(), "ABCD1234");
        assert_eq!(summary.user_id.as_str(), "user_1");
        assert_eq!(summary.items.len(), 1);
        assert_eq!(summary.total.amount, Decimal::new(215, 0));
        assert_eq!(summary.status, OrderStatus::Completed);

        assert!(cart.is_empty());
        assert!(storage.get(&cart_key("user_1")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_complete_checkout_with_empty_cart() {
        let mut cart = signed_in_cart(MemoryStorage::new()).await;
        let summary = complete_checkout(&mut cart, "cs_1", &config()).await.unwrap();
        assert!(summary.is_none());
    }

    #[tokio::test]
    async fn test_complete_checkout_requires_sign_in() {
        let mut cart = CartContainer::initialize(
            MemoryStorage::new(),
            Catalog::fixed(vec![product("p1", "T-Shirts", 100)]),
            None,
            CartOptions::default(),
        )
        .await;
        cart.add_item(&ProductId::new("p1"), 1, "Black", "M")
            .await
            .unwrap();

        let err = complete_checkout(&mut cart, "cs_1", &config())
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::NotSignedIn));
        assert_eq!(cart.items().len(), 1);

        let err = complete_checkout(&mut cart, "  ", &config())
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::MissingSessionId));
    }
}
