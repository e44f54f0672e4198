//! The cart state container.

use tracing::{debug, info, instrument, warn};

use threadline_core::{CartToken, Identity, ItemKey, ProductId, UserId};

use super::identity::{migrate_on_sign_in, read_cart, resolve_identity};
use super::model::{LineItem, ProductSnapshot, StoredCart};
use super::storage::{CartStorage, cart_key};
use super::{
    ADD_FAILED_MESSAGE, CartError, FETCH_FAILED_MESSAGE, PersistencePolicy, UPDATE_FAILED_MESSAGE,
};
use crate::catalog::CatalogLookup;

/// Container construction options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CartOptions {
    /// How storage failures are reported.
    pub persistence: PersistencePolicy,
}

/// Owns the active identity's line items and mirrors every change to storage.
///
/// Operations run to completion one at a time (`&mut self`). Two containers
/// over the same storage are not coordinated: whichever writes last wins.
pub struct CartContainer<S, C> {
    storage: S,
    catalog: C,
    options: CartOptions,
    identity: Identity,
    items: Vec<LineItem>,
    cart_id: Option<CartToken>,
    is_loading: bool,
    error: Option<String>,
}

impl<S: CartStorage, C: CatalogLookup> CartContainer<S, C> {
    /// Resolve the identity and load its cart.
    pub async fn initialize(
        storage: S,
        catalog: C,
        authenticated: Option<UserId>,
        options: CartOptions,
    ) -> Self {
        let identity = resolve_identity(authenticated.as_ref(), &storage).await;
        let mut container = Self {
            storage,
            catalog,
            options,
            identity,
            items: Vec::new(),
            cart_id: None,
            is_loading: false,
            error: None,
        };
        container.load().await;
        container
    }

    /// Switch to an authenticated identity.
    ///
    /// Coming from an anonymous identity, the device's anonymous cart is
    /// migrated into the user's cart first. Already-authenticated containers
    /// simply switch users. Either way the new identity's cart is reloaded.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Storage` if the migration fails under strict
    /// persistence. The identity is switched regardless.
    #[instrument(skip(self), fields(from = %self.identity))]
    pub async fn sign_in(&mut self, user: UserId) -> Result<(), CartError> {
        let next = Identity::Authenticated(user.clone());
        if self.identity == next {
            return Ok(());
        }

        let migration = if self.identity.is_sign_in_to(&next) {
            migrate_on_sign_in(&self.storage, &user, self.options.persistence)
                .await
                .map(|outcome| debug!(?outcome, "Sign-in migration finished"))
        } else {
            Ok(())
        };

        self.identity = next;
        self.load().await;
        migration
    }

    /// Reload the active identity's cart from storage.
    ///
    /// Never fails: a missing or malformed entry yields an empty cart with no
    /// token. Under strict persistence a storage failure also sets the error
    /// slot.
    #[instrument(skip(self), fields(identity = %self.identity))]
    pub async fn load(&mut self) {
        self.is_loading = true;

        let stored = match read_cart(&self.storage, self.identity.as_str()).await {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "Failed to read cart");
                if self.options.persistence == PersistencePolicy::Strict {
                    self.error = Some(FETCH_FAILED_MESSAGE.to_string());
                }
                None
            }
        };

        let stored = stored.unwrap_or_default();
        self.items = stored.items;
        self.cart_id = stored.cart_id;
        self.is_loading = false;
    }

    /// Add a new line item for `product_id`.
    ///
    /// The product is resolved through the catalog and snapshotted. Always
    /// appends a new line, even if the same product/color/size is already in
    /// the cart.
    ///
    /// # Errors
    ///
    /// - `CartError::InvalidQuantity` if `quantity` is zero
    /// - `CartError::ProductNotFound` / `CartError::Catalog` if the product
    ///   cannot be resolved; the cart is unchanged
    /// - `CartError::Storage` if the write fails under strict persistence;
    ///   the item stays in memory
    #[instrument(skip(self), fields(identity = %self.identity))]
    pub async fn add_item(
        &mut self,
        product_id: &ProductId,
        quantity: u32,
        color: &str,
        size: &str,
    ) -> Result<ItemKey, CartError> {
        self.is_loading = true;
        let result = self.try_add_item(product_id, quantity, color, size).await;
        self.is_loading = false;

        if let Err(e) = &result {
            match e {
                CartError::ProductNotFound(_) | CartError::InvalidQuantity(_) => {
                    info!(error = %e, "Add to cart rejected");
                }
                _ => tracing::error!(error = %e, "Failed to add item to cart"),
            }
            self.error = Some(ADD_FAILED_MESSAGE.to_string());
        }
        result
    }

    async fn try_add_item(
        &mut self,
        product_id: &ProductId,
        quantity: u32,
        color: &str,
        size: &str,
    ) -> Result<ItemKey, CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity(quantity));
        }

        let product = self
            .catalog
            .find_product(product_id)
            .await?
            .ok_or_else(|| CartError::ProductNotFound(product_id.clone()))?;

        let item = LineItem::new(
            ProductSnapshot::of(product_id.clone(), &product),
            quantity,
            color.to_string(),
            size.to_string(),
        );
        let key = item.key.clone();
        self.items.push(item);

        self.persist().await?;
        Ok(key)
    }

    /// Set the quantity of the item with `key`.
    ///
    /// A quantity of zero or less removes the item; this is the only removal
    /// path. An unknown key leaves the items unchanged and is not an error.
    /// The full cart is written back either way.
    ///
    /// Returns whether an item matched `key`.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Storage` if the write fails under strict
    /// persistence; the in-memory change is kept.
    #[instrument(skip(self), fields(identity = %self.identity))]
    pub async fn update_item(&mut self, key: &ItemKey, quantity: i64) -> Result<bool, CartError> {
        self.is_loading = true;

        let matched = if quantity <= 0 {
            let before = self.items.len();
            self.items.retain(|item| item.key != *key);
            self.items.len() != before
        } else {
            let quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
            if let Some(item) = self.items.iter_mut().find(|item| item.key == *key) {
                item.quantity = quantity;
                true
            } else {
                false
            }
        };

        let result = self.persist().await.map(|()| matched);
        self.is_loading = false;

        if let Err(e) = &result {
            tracing::error!(error = %e, "Failed to update cart");
            self.error = Some(UPDATE_FAILED_MESSAGE.to_string());
        }
        result
    }

    /// Remove the item with `key`. Same as `update_item(key, 0)`.
    ///
    /// # Errors
    ///
    /// See [`update_item`](Self::update_item).
    pub async fn remove_item(&mut self, key: &ItemKey) -> Result<bool, CartError> {
        self.update_item(key, 0).await
    }

    /// Discard the cart: delete the persisted slot and empty the container.
    ///
    /// Only called once the payment processor has confirmed a checkout.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Storage` if the delete fails under strict
    /// persistence.
    #[instrument(skip(self), fields(identity = %self.identity))]
    pub async fn clear(&mut self) -> Result<(), CartError> {
        self.items.clear();
        self.cart_id = None;

        match self.storage.remove(&cart_key(self.identity.as_str())).await {
            Ok(()) => Ok(()),
            Err(e) => self.storage_failure(e.into()),
        }
    }

    /// Write the full collection under the current (or a new) token.
    async fn persist(&mut self) -> Result<(), CartError> {
        let cart_id = self.cart_id.clone().unwrap_or_else(CartToken::generate);
        let stored = StoredCart {
            cart_id: Some(cart_id.clone()),
            items: self.items.clone(),
        };
        self.cart_id = Some(cart_id);

        let json = stored.to_json()?;
        match self
            .storage
            .set(&cart_key(self.identity.as_str()), json)
            .await
        {
            Ok(()) => Ok(()),
            Err(e) => self.storage_failure(e.into()),
        }
    }

    fn storage_failure(&self, error: CartError) -> Result<(), CartError> {
        match self.options.persistence {
            PersistencePolicy::Strict => Err(error),
            PersistencePolicy::BestEffort => {
                warn!(error = %error, identity = %self.identity, "Cart write failed, continuing");
                Ok(())
            }
        }
    }
}

impl<S, C> CartContainer<S, C> {
    /// The active identity.
    #[must_use]
    pub const fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Line items in insertion order.
    #[must_use]
    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    /// The persisted cart's session token, if any.
    #[must_use]
    pub const fn cart_id(&self) -> Option<&CartToken> {
        self.cart_id.as_ref()
    }

    /// Whether an operation is in flight.
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        self.is_loading
    }

    /// Message of the most recent failed operation.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Whether the cart has no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Sum of all line quantities.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }

    /// Find an item by key.
    #[must_use]
    pub fn item(&self, key: &ItemKey) -> Option<&LineItem> {
        self.items.iter().find(|item| item.key == *key)
    }

    /// The underlying storage.
    #[must_use]
    pub const fn storage(&self) -> &S {
        &self.storage
    }
}
