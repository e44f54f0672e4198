//! Identity resolution and the sign-in cart migration.
//!
//! Both are plain functions of (authentication status, device storage). No
//! ambient state is consulted.

use tracing::{info, instrument, warn};

use threadline_core::{AnonymousId, CartToken, Identity, UserId};

use super::model::StoredCart;
use super::storage::{ANONYMOUS_ID_KEY, CartStorage, cart_key};
use super::{CartError, PersistencePolicy};

/// Result of a sign-in migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// The device has no anonymous identity yet.
    NoAnonymousIdentity,
    /// The anonymous cart was absent, unreadable or empty; nothing moved.
    NothingToMove,
    /// Anonymous items were appended to the user's cart.
    Moved {
        /// Number of line items moved.
        items: usize,
        /// Fresh token the merged cart was written under.
        cart_id: CartToken,
    },
}

/// Resolve the active identity.
///
/// An authenticated user always wins. Otherwise the device's anonymous token
/// is read from storage, or generated and stored if there is none. This never
/// fails. If the slot cannot be read, a fresh token is returned for this call
/// only and the stored one is left in place.
#[instrument(skip(storage))]
pub async fn resolve_identity<S: CartStorage>(
    authenticated: Option<&UserId>,
    storage: &S,
) -> Identity {
    if let Some(user) = authenticated {
        return Identity::Authenticated(user.clone());
    }

    match storage.get(ANONYMOUS_ID_KEY).await {
        Ok(Some(existing)) if !existing.is_empty() => {
            return Identity::Anonymous(AnonymousId::new(existing));
        }
        Ok(_) => {}
        Err(e) => {
            warn!(error = %e, "Failed to read anonymous identity slot");
            return Identity::Anonymous(AnonymousId::generate());
        }
    }

    let fresh = AnonymousId::generate();
    if let Err(e) = storage
        .set(ANONYMOUS_ID_KEY, fresh.as_str().to_string())
        .await
    {
        warn!(error = %e, "Failed to persist anonymous identity");
    }
    info!(anonymous_id = %fresh, "Generated anonymous identity");
    Identity::Anonymous(fresh)
}

/// Read and parse the cart stored for `identity`.
///
/// Absent and malformed entries both read as `Ok(None)`; only storage
/// failures are errors.
pub(crate) async fn read_cart<S: CartStorage>(
    storage: &S,
    identity: &str,
) -> Result<Option<StoredCart>, CartError> {
    let raw = storage.get(&cart_key(identity)).await?;
    Ok(raw.as_deref().and_then(StoredCart::parse))
}

/// Move the device's anonymous cart into `user`'s cart.
///
/// Run exactly once when a browsing session goes from anonymous to
/// authenticated. The anonymous items are appended after the user's existing
/// items (no deduplication, no quantity merging), the result is written under
/// a fresh cart token, and the anonymous cart slot is deleted. The anonymous
/// identity token itself stays on the device.
///
/// The anonymous slot is only deleted after the merged cart was written.
///
/// # Errors
///
/// With [`PersistencePolicy::Strict`], returns `CartError::Storage` if any
/// storage operation fails. With best-effort persistence, failures are
/// logged and the migration reports what it managed to do.
#[instrument(skip(storage))]
pub async fn migrate_on_sign_in<S: CartStorage>(
    storage: &S,
    user: &UserId,
    policy: PersistencePolicy,
) -> Result<MigrationOutcome, CartError> {
    let anonymous_id = match storage.get(ANONYMOUS_ID_KEY).await {
        Ok(Some(id)) if !id.is_empty() => AnonymousId::new(id),
        Ok(_) => return Ok(MigrationOutcome::NoAnonymousIdentity),
        Err(e) => return handle_failure(policy, e.into(), MigrationOutcome::NothingToMove),
    };

    let anonymous_cart = match read_cart(storage, anonymous_id.as_str()).await {
        Ok(cart) => cart.unwrap_or_default(),
        Err(e) => return handle_failure(policy, e, MigrationOutcome::NothingToMove),
    };

    if anonymous_cart.items.is_empty() {
        return Ok(MigrationOutcome::NothingToMove);
    }

    let existing = match read_cart(storage, user.as_str()).await {
        Ok(cart) => cart.unwrap_or_default(),
        Err(e) => return handle_failure(policy, e, MigrationOutcome::NothingToMove),
    };

    let moved = anonymous_cart.items.len();
    let mut items = existing.items;
    items.extend(anonymous_cart.items);

    let cart_id = CartToken::generate();
    let merged = StoredCart {
        cart_id: Some(cart_id.clone()),
        items,
    };

    if let Err(e) = storage.set(&cart_key(user.as_str()), merged.to_json()?).await {
        return handle_failure(policy, e.into(), MigrationOutcome::NothingToMove);
    }

    let outcome = MigrationOutcome::Moved {
        items: moved,
        cart_id,
    };

    if let Err(e) = storage.remove(&cart_key(anonymous_id.as_str())).await {
        return handle_failure(policy, e.into(), outcome);
    }

    info!(
        anonymous_id = %anonymous_id,
        user_id = %user,
        moved,
        "Migrated anonymous cart on sign-in"
    );
    Ok(outcome)
}

/// Apply the persistence policy to a storage failure.
fn handle_failure(
    policy: PersistencePolicy,
    error: CartError,
    fallback: MigrationOutcome,
) -> Result<MigrationOutcome, CartError> {
    match policy {
        PersistencePolicy::Strict => Err(error),
        PersistencePolicy::BestEffort => {
            warn!(error = %error, "Cart migration storage failure ignored");
            Ok(fallback)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;
    use threadline_core::{ItemKey, ProductId};

    use super::*;
    use crate::cart::model::{LineItem, ProductSnapshot};
    use crate::cart::storage::MemoryStorage;
    use crate::cart::storage::tests::FailingReads;

    fn item(key: &str) -> LineItem {
        LineItem {
            key: ItemKey::new(key),
            product: ProductSnapshot {
                id: ProductId::new("p1"),
                name: "Tee".to_string(),
                price: Decimal::new(100, 0),
                image_url: String::new(),
                sizes: vec!["M".to_string()],
                colors: vec!["Black".to_string()],
            },
            quantity: 1,
            color: "Black".to_string(),
            size: "M".to_string(),
        }
    }

    async fn store_cart(storage: &MemoryStorage, identity: &str, keys: &[&str]) {
        let cart = StoredCart {
            cart_id: Some(CartToken::new(format!("token-{identity}"))),
            items: keys.iter().map(|k| item(k)).collect(),
        };
        storage
            .set(&cart_key(identity), cart.to_json().unwrap())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_resolve_prefers_authenticated() {
        let storage = MemoryStorage::new();
        let user = UserId::new("user_1");
        let identity = resolve_identity(Some(&user), &storage).await;
        assert_eq!(identity, Identity::Authenticated(user));
        // Signed-in resolution never touches the anonymous slot.
        assert!(storage.keys().is_empty());
    }

    #[tokio::test]
    async fn test_resolve_generates_and_reuses_anonymous() {
        let storage = MemoryStorage::new();
        let first = resolve_identity(None, &storage).await;
        let second = resolve_identity(None, &storage).await;

        assert!(!first.is_authenticated());
        assert_eq!(first, second);
        assert_eq!(
            storage.get(ANONYMOUS_ID_KEY).await.unwrap().as_deref(),
            Some(first.as_str())
        );
    }

    #[tokio::test]
    async fn test_migration_appends_anonymous_items() {
        let storage = MemoryStorage::new();
        storage
            .set(ANONYMOUS_ID_KEY, "anon".to_string())
            .await
            .unwrap();
        store_cart(&storage, "anon", &["a", "b"]).await;
        store_cart(&storage, "user_1", &["c"]).await;

        let outcome = migrate_on_sign_in(
            &storage,
            &UserId::new("user_1"),
            PersistencePolicy::BestEffort,
        )
        .await
        .unwrap();

        let MigrationOutcome::Moved { items, cart_id } = outcome else {
            panic!("expected items to move");
        };
        assert_eq!(items, 2);
        assert_ne!(cart_id, CartToken::new("token-user_1"));

        let merged = read_cart(&storage, "user_1").await.unwrap().unwrap();
        let keys: Vec<&str> = merged.items.iter().map(|i| i.key.as_str()).collect();
        assert_eq!(keys, vec!["c", "a", "b"]);
        assert_eq!(merged.cart_id, Some(cart_id));

        assert!(read_cart(&storage, "anon").await.unwrap().is_none());
        // The anonymous identity itself is kept.
        assert!(storage.get(ANONYMOUS_ID_KEY).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_migration_without_anonymous_items_is_noop() {
        let storage = MemoryStorage::new();
        let user = UserId::new("user_1");

        let outcome = migrate_on_sign_in(&storage, &user, PersistencePolicy::Strict)
            .await
            .unwrap();
        assert_eq!(outcome, MigrationOutcome::NoAnonymousIdentity);

        storage
            .set(ANONYMOUS_ID_KEY, "anon".to_string())
            .await
            .unwrap();
        store_cart(&storage, "anon", &[]).await;
        store_cart(&storage, "user_1", &["c"]).await;

        let outcome = migrate_on_sign_in(&storage, &user, PersistencePolicy::Strict)
            .await
            .unwrap();
        assert_eq!(outcome, MigrationOutcome::NothingToMove);

        // User cart untouched, empty anonymous cart left in place.
        let user_cart = read_cart(&storage, "user_1").await.unwrap().unwrap();
        assert_eq!(user_cart.cart_id, Some(CartToken::new("token-user_1")));
        assert!(storage.get(&cart_key("anon")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_migration_into_empty_user_cart() {
        let storage = MemoryStorage::new();
        storage
            .set(ANONYMOUS_ID_KEY, "anon".to_string())
            .await
            .unwrap();
        store_cart(&storage, "anon", &["a"]).await;

        let outcome = migrate_on_sign_in(
            &storage,
            &UserId::new("user_2"),
            PersistencePolicy::BestEffort,
        )
        .await
        .unwrap();
        assert!(matches!(outcome, MigrationOutcome::Moved { items: 1, .. }));

        let merged = read_cart(&storage, "user_2").await.unwrap().unwrap();
        assert_eq!(merged.items.len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_anonymous_cart_moves_nothing() {
        let storage = MemoryStorage::new();
        storage
            .set(ANONYMOUS_ID_KEY, "anon".to_string())
            .await
            .unwrap();
        storage
            .set(&cart_key("anon"), "{broken".to_string())
            .await
            .unwrap();

        let outcome = migrate_on_sign_in(
            &storage,
            &UserId::new("user_1"),
            PersistencePolicy::Strict,
        )
        .await
        .unwrap();
        assert_eq!(outcome, MigrationOutcome::NothingToMove);
    }

    #[tokio::test]
    async fn test_resolve_read_failure_keeps_stored_identity() {
        let inner = MemoryStorage::new();
        inner
            .set(ANONYMOUS_ID_KEY, "anon-original".to_string())
            .await
            .unwrap();
        let storage = FailingReads::any(inner.clone(), 1);

        let transient = resolve_identity(None, &storage).await;
        assert!(!transient.is_authenticated());
        assert_ne!(transient.as_str(), "anon-original");
        assert_eq!(
            inner.get(ANONYMOUS_ID_KEY).await.unwrap().as_deref(),
            Some("anon-original")
        );

        // Once reads work again the device's identity comes back.
        let recovered = resolve_identity(None, &storage).await;
        assert_eq!(recovered.as_str(), "anon-original");
    }

    async fn seeded() -> MemoryStorage {
        let storage = MemoryStorage::new();
        storage
            .set(ANONYMOUS_ID_KEY, "anon".to_string())
            .await
            .unwrap();
        store_cart(&storage, "anon", &["a"]).await;
        store_cart(&storage, "user_1", &["c"]).await;
        storage
    }

    #[tokio::test]
    async fn test_migration_read_failures_under_best_effort() {
        let user = UserId::new("user_1");
        let failing_keys = [ANONYMOUS_ID_KEY.to_string(), cart_key("anon"), cart_key("user_1")];

        for key in &failing_keys {
            let inner = seeded().await;
            let storage = FailingReads::key(inner.clone(), key);

            let outcome = migrate_on_sign_in(&storage, &user, PersistencePolicy::BestEffort)
                .await
                .unwrap();
            assert_eq!(outcome, MigrationOutcome::NothingToMove, "failing {key}");

            // Nothing was written or deleted.
            let user_cart = read_cart(&inner, "user_1").await.unwrap().unwrap();
            assert_eq!(user_cart.items.len(), 1);
            assert_eq!(user_cart.cart_id, Some(CartToken::new("token-user_1")));
            assert!(inner.get(&cart_key("anon")).await.unwrap().is_some());
        }
    }

    #[tokio::test]
    async fn test_migration_read_failures_under_strict() {
        let user = UserId::new("user_1");
        let failing_keys = [ANONYMOUS_ID_KEY.to_string(), cart_key("anon"), cart_key("user_1")];

        for key in &failing_keys {
            let inner = seeded().await;
            let storage = FailingReads::key(inner.clone(), key);

            let err = migrate_on_sign_in(&storage, &user, PersistencePolicy::Strict)
                .await
                .unwrap_err();
            assert!(matches!(err, CartError::Storage(_)), "failing {key}");
            assert!(inner.get(&cart_key("anon")).await.unwrap().is_some());
        }
    }
}
