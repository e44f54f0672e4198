//! Device-scoped key-value storage for carts and the anonymous identity slot.
//!
//! # Keys
//!
//! - `anonymousUserId` - the device's anonymous identity token
//! - `cart_<identity>` - the persisted [`StoredCart`](super::StoredCart) JSON
//!
//! # Backends
//!
//! - [`MemoryStorage`] - process-local map, for tests and ephemeral contexts
//! - [`FileStorage`] - one file per key in a directory (the CLI's "device")
//! - [`SessionStorage`] - values stored in the browser's tower-sessions record
//!
//! Every write is a full-value overwrite. No backend offers cross-device or
//! cross-session consistency.

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tower_sessions::Session;

/// Key of the device's anonymous identity slot.
pub const ANONYMOUS_ID_KEY: &str = "anonymousUserId";

/// Key prefix for persisted carts.
const CART_KEY_PREFIX: &str = "cart_";

/// Storage key for the cart belonging to `identity`.
#[must_use]
pub fn cart_key(identity: &str) -> String {
    format!("{CART_KEY_PREFIX}{identity}")
}

/// Errors raised by storage backends.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Session store operation failed.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Backend is disabled or otherwise unusable.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// A device-scoped string key-value store.
///
/// Implementations must be cheap to share; the cart container holds one for
/// its whole lifetime.
pub trait CartStorage: Send + Sync {
    /// Read the value stored under `key`.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>, StorageError>> + Send;

    /// Overwrite the value stored under `key`.
    fn set(&self, key: &str, value: String) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Delete the value stored under `key`. Deleting a missing key succeeds.
    fn remove(&self, key: &str) -> impl Future<Output = Result<(), StorageError>> + Send;
}

// =============================================================================
// MemoryStorage
// =============================================================================

/// In-memory storage backend.
///
/// Clones share the same underlying map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStorage {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all keys currently stored, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .entries
            .lock()
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    fn with_entries<T>(
        &self,
        f: impl FnOnce(&mut HashMap<String, String>) -> T,
    ) -> Result<T, StorageError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| StorageError::Unavailable("memory store lock poisoned".to_string()))?;
        Ok(f(&mut entries))
    }
}

impl CartStorage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.with_entries(|entries| entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        self.with_entries(|entries| {
            entries.insert(key.to_string(), value);
        })
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.with_entries(|entries| {
            entries.remove(key);
        })
    }
}

// =============================================================================
// FileStorage
// =============================================================================

/// Directory-backed storage: one `<key>.json` file per key.
///
/// Writes go to a temporary sibling file that is then renamed over the
/// target, so a crash mid-write never leaves a truncated cart behind.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    /// Open (and create if needed) a storage directory.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the directory cannot be created.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", encode_file_name(key)))
    }
}

/// Map an arbitrary key to a safe file name.
///
/// ASCII alphanumerics, `-` and `_` pass through; every other byte becomes
/// `%XX`. Identities come from external providers, so path separators and
/// `..` must never reach the filesystem.
fn encode_file_name(key: &str) -> String {
    use std::fmt::Write;

    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            out.push(char::from(byte));
        } else {
            let _ = write!(out, "%{byte:02X}");
        }
    }
    out
}

impl CartStorage for FileStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        let path = self.path_for(key);
        let temp_path = path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, value).await?;
        tokio::fs::rename(&temp_path, &path).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// =============================================================================
// SessionStorage
// =============================================================================

/// Storage backed by the request's tower-sessions record.
///
/// The session cookie is the web storefront's notion of a device: values live
/// as long as the session does and are invisible to every other session.
#[derive(Debug, Clone)]
pub struct SessionStorage {
    session: Session,
}

impl SessionStorage {
    /// Wrap the current request's session.
    #[must_use]
    pub const fn new(session: Session) -> Self {
        Self { session }
    }
}

impl CartStorage for SessionStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.session.get::<String>(key).await?)
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        Ok(self.session.insert(key, value).await?)
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.session.remove_value(key).await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Memory storage whose reads fail a set number of times, optionally only
    /// for one key. Writes always succeed.
    #[derive(Clone, Default)]
    pub(crate) struct FailingReads {
        pub(crate) inner: MemoryStorage,
        key: Option<String>,
        remaining: Arc<AtomicUsize>,
    }

    impl FailingReads {
        /// Fail the next `times` reads of any key.
        pub(crate) fn any(inner: MemoryStorage, times: usize) -> Self {
            Self {
                inner,
                key: None,
                remaining: Arc::new(AtomicUsize::new(times)),
            }
        }

        /// Fail every read of `key`.
        pub(crate) fn key(inner: MemoryStorage, key: &str) -> Self {
            Self {
                inner,
                key: Some(key.to_string()),
                remaining: Arc::new(AtomicUsize::new(usize::MAX)),
            }
        }

        fn should_fail(&self, key: &str) -> bool {
            if self.key.as_deref().is_some_and(|k| k != key) {
                return false;
            }
            self.remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        }
    }

    impl CartStorage for FailingReads {
        async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            if self.should_fail(key) {
                return Err(StorageError::Unavailable("read failed".to_string()));
            }
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
            self.inner.set(key, value).await
        }

        async fn remove(&self, key: &str) -> Result<(), StorageError> {
            self.inner.remove(key).await
        }
    }

    #[test]
    fn test_cart_key() {
        assert_eq!(cart_key("user_123"), "cart_user_123");
    }

    #[test]
    fn test_encode_file_name() {
        assert_eq!(encode_file_name("cart_user-1"), "cart_user-1");
        assert_eq!(encode_file_name("cart_../etc"), "cart_%2E%2E%2Fetc");
        assert_eq!(encode_file_name("a b"), "a%20b");
    }

    #[tokio::test]
    async fn test_memory_storage_roundtrip() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get("k").await.unwrap(), None);

        storage.set("k", "v1".to_string()).await.unwrap();
        storage.set("k", "v2".to_string()).await.unwrap();
        assert_eq!(storage.get("k").await.unwrap().as_deref(), Some("v2"));

        storage.remove("k").await.unwrap();
        storage.remove("k").await.unwrap();
        assert_eq!(storage.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_storage_clones_share_state() {
        let storage = MemoryStorage::new();
        let clone = storage.clone();
        clone.set("cart_a", "{}".to_string()).await.unwrap();
        assert_eq!(storage.keys(), vec!["cart_a".to_string()]);
    }

    #[tokio::test]
    async fn test_file_storage_roundtrip() {
        let dir = tempfile::TempDir::new().unwrap();
        let storage = FileStorage::open(dir.path().join("device")).await.unwrap();

        assert_eq!(storage.get(ANONYMOUS_ID_KEY).await.unwrap(), None);
        storage
            .set(ANONYMOUS_ID_KEY, "anon-1".to_string())
            .await
            .unwrap();
        assert_eq!(
            storage.get(ANONYMOUS_ID_KEY).await.unwrap().as_deref(),
            Some("anon-1")
        );

        storage.remove(ANONYMOUS_ID_KEY).await.unwrap();
        storage.remove(ANONYMOUS_ID_KEY).await.unwrap();
        assert_eq!(storage.get(ANONYMOUS_ID_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_storage_survives_reopen() {
        let dir = tempfile::TempDir::new().unwrap();
        let key = cart_key("user/with/slashes");

        let storage = FileStorage::open(dir.path()).await.unwrap();
        storage.set(&key, "{\"items\":[]}".to_string()).await.unwrap();

        let reopened = FileStorage::open(dir.path()).await.unwrap();
        assert_eq!(
            reopened.get(&key).await.unwrap().as_deref(),
            Some("{\"items\":[]}")
        );
        // Slashes never become path components.
        assert!(dir.path().join("cart_user%2Fwith%2Fslashes.json").exists());
    }
}
