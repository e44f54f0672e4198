//! Cart data model and its persisted form.
//!
//! Field names of the persisted JSON are fixed: carts written by older
//! clients (`{"cartId": ..., "items": [{"_key": ..., "product": {"_id": ...}}]}`)
//! must keep loading.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use threadline_core::{CartToken, CurrencyCode, ItemKey, Price, ProductId};

use crate::catalog::Product;

/// Product fields copied into a line item at add time.
///
/// This is a denormalized snapshot: upstream price or option changes never
/// affect items already in a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    #[serde(rename = "_id")]
    pub id: ProductId,
    pub name: String,
    /// Unit price in the store currency's standard unit.
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    #[serde(rename = "imageUrl", default)]
    pub image_url: String,
    #[serde(default)]
    pub sizes: Vec<String>,
    #[serde(default)]
    pub colors: Vec<String>,
}

impl ProductSnapshot {
    /// Snapshot a catalog product under the id the caller asked for.
    #[must_use]
    pub fn of(id: ProductId, product: &Product) -> Self {
        Self {
            id,
            name: product.name.clone(),
            price: product.price,
            image_url: product.image_url.clone(),
            sizes: product.sizes.clone(),
            colors: product.colors.clone(),
        }
    }
}

/// One product configuration in a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(rename = "_key")]
    pub key: ItemKey,
    pub product: ProductSnapshot,
    pub quantity: u32,
    pub color: String,
    pub size: String,
}

impl LineItem {
    /// Create a line item with a freshly generated key.
    #[must_use]
    pub fn new(product: ProductSnapshot, quantity: u32, color: String, size: String) -> Self {
        Self {
            key: ItemKey::generate(),
            product,
            quantity,
            color,
            size,
        }
    }

    /// Unit price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.product.price * Decimal::from(self.quantity)
    }

    /// Line total as a [`Price`] in the given currency.
    #[must_use]
    pub fn line_price(&self, currency: CurrencyCode) -> Price {
        Price::new(self.line_total(), currency)
    }
}

/// The persisted form of a cart: `{cartId, items}` under `cart_<identity>`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCart {
    #[serde(rename = "cartId", default)]
    pub cart_id: Option<CartToken>,
    #[serde(default)]
    pub items: Vec<LineItem>,
}

impl StoredCart {
    /// Parse a persisted cart. Any malformed payload reads as `None`.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match serde_json::from_str(raw) {
            Ok(cart) => Some(cart),
            Err(e) => {
                tracing::warn!(error = %e, "Discarding malformed stored cart");
                None
            }
        }
    }

    /// Serialize for storage.
    ///
    /// # Errors
    ///
    /// Returns `serde_json::Error` if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
