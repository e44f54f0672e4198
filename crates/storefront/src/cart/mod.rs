//! Cart state container.
//!
//! # Architecture
//!
//! - A cart is a list of line items keyed by browsing identity, persisted as
//!   JSON in device-scoped storage under `cart_<identity>`
//! - There is no server-side cart authority; the persisted copy is the
//!   long-lived source of truth across reloads
//! - [`CartContainer`] is constructed explicitly per browsing context (one per
//!   request in the web server) and owns the in-memory items
//! - Identity resolution and the anonymous → authenticated migration live in
//!   [`identity`]
//!
//! # Example
//!
//! ```rust,ignore
//! use threadline_storefront::cart::{CartContainer, CartOptions, MemoryStorage};
//!
//! let mut cart = CartContainer::initialize(storage, catalog, None, CartOptions::default()).await;
//! let key = cart.add_item(&product_id, 1, "Black", "M").await?;
//! cart.update_item(&key, 3).await?;
//! cart.remove_item(&key).await?;
//! ```

mod container;
pub mod identity;
mod model;
pub mod storage;

pub use container::{CartContainer, CartOptions};
pub use identity::{MigrationOutcome, migrate_on_sign_in, resolve_identity};
pub use model::{LineItem, ProductSnapshot, StoredCart};
pub use storage::{
    ANONYMOUS_ID_KEY, CartStorage, FileStorage, MemoryStorage, SessionStorage, StorageError,
    cart_key,
};

use thiserror::Error;

use threadline_core::ProductId;

use crate::catalog::CatalogError;

/// Message placed in the error slot when an add fails.
pub const ADD_FAILED_MESSAGE: &str = "Failed to add item to cart";

/// Message placed in the error slot when an update or remove fails.
pub const UPDATE_FAILED_MESSAGE: &str = "Failed to update cart";

/// Message placed in the error slot when a strict-mode read fails.
pub const FETCH_FAILED_MESSAGE: &str = "Failed to fetch cart";

/// Errors that can occur when modifying a cart.
#[derive(Debug, Error)]
pub enum CartError {
    /// The product id did not resolve to a catalog product.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// The catalog lookup itself failed.
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// A new line item needs a positive quantity.
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(u32),

    /// Writing the cart failed (strict persistence only).
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// The cart could not be serialized.
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl CartError {
    /// Whether the error came from looking up the product, as opposed to
    /// persisting the result.
    #[must_use]
    pub const fn is_lookup_failure(&self) -> bool {
        matches!(self, Self::ProductNotFound(_) | Self::Catalog(_))
    }
}

/// What to do when writing a cart to storage fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PersistencePolicy {
    /// Log the failure and carry on as if the write had succeeded. The next
    /// reload will not reflect the change.
    #[default]
    BestEffort,
    /// Surface the failure to the caller as [`CartError::Storage`]. The
    /// in-memory change is kept.
    Strict,
}

impl std::str::FromStr for PersistencePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "best-effort" | "best_effort" | "besteffort" => Ok(Self::BestEffort),
            "strict" => Ok(Self::Strict),
            other => Err(format!(
                "unknown persistence policy '{other}' (expected best-effort or strict)"
            )),
        }
    }
}
