//! The storage seam: the [`Store`] capability trait plus a ready-made
//! in-memory implementation.
//!
//! The ordering structure never persists values itself. Every publicly
//! visible mutation is driven through a `Store`, and the structure only
//! updates its own bookkeeping once the store reports success. A store can
//! be anything that answers `set`/`get`/`del`: a process-local map, a disk
//! table, a remote cache.

use std::collections::HashMap;
use std::convert::Infallible;
use std::hash::Hash;

use async_trait::async_trait;
use thiserror::Error;

/// Asynchronous persistence capability required by
/// [`OrderedCache`](crate::OrderedCache).
///
/// Implementations choose their own error type; the cache never inspects
/// it, it only forwards failures to the caller. A failed operation must
/// leave the store unchanged from the cache's point of view, since the
/// cache will not apply the corresponding ordering update.
///
/// Methods take `&mut self`: the cache owns its store and issues one
/// operation at a time, so implementations do not need interior
/// mutability or their own locking for the cache's sake.
#[async_trait]
pub trait Store {
    /// Key type shared with the cache.
    type Key;
    /// Value type persisted by this store.
    type Value;
    /// Opaque failure type, surfaced to cache callers verbatim.
    type Error;

    /// Persists `value` under `key`, overwriting any previous value.
    async fn set(&mut self, key: &Self::Key, value: Self::Value) -> Result<(), Self::Error>;

    /// Fetches the value persisted under `key`, or `None` when absent.
    async fn get(&mut self, key: &Self::Key) -> Result<Option<Self::Value>, Self::Error>;

    /// Removes the value persisted under `key`. Deleting an absent key is
    /// a success.
    async fn del(&mut self, key: &Self::Key) -> Result<(), Self::Error>;
}

/// Opaque store failure for host programs whose backing store has no
/// richer error type of its own.
///
/// The cache itself never constructs this; it exists purely as a
/// convenience for [`Store`] implementors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("store operation failed: {reason}")]
pub struct StoreError {
    reason: String,
}

impl StoreError {
    /// Creates a failure with the given reason.
    pub fn new(reason: impl Into<String>) -> Self {
        StoreError {
            reason: reason.into(),
        }
    }

    /// The reason supplied at construction.
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Process-local [`Store`] backed by a `HashMap`.
///
/// Useful on its own for plain in-memory caching and as the reference
/// store in tests. Its operations cannot fail, which the error type
/// records as [`Infallible`].
///
/// # Examples
///
/// ```
/// use recency::{MemoryStore, OrderedCache};
///
/// # async fn demo() -> Result<(), std::convert::Infallible> {
/// let mut cache = OrderedCache::new(MemoryStore::new());
/// cache.put("session", 17u64).await?;
/// assert_eq!(cache.store().peek(&"session"), Some(&17));
/// # Ok(()) }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryStore<K, V> {
    table: HashMap<K, V>,
}

impl<K, V> MemoryStore<K, V> {
    /// Creates an empty store.
    pub fn new() -> Self {
        MemoryStore {
            table: HashMap::new(),
        }
    }

    /// Number of values currently persisted.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// True when nothing is persisted.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Reads a persisted value without going through the cache.
    pub fn peek(&self, key: &K) -> Option<&V>
    where
        K: Hash + Eq,
    {
        self.table.get(key)
    }
}

#[async_trait]
impl<K, V> Store for MemoryStore<K, V>
where
    K: Hash + Eq + Clone + Send + Sync,
    V: Clone + Send,
{
    type Key = K;
    type Value = V;
    type Error = Infallible;

    async fn set(&mut self, key: &K, value: V) -> Result<(), Infallible> {
        self.table.insert(key.clone(), value);
        Ok(())
    }

    async fn get(&mut self, key: &K) -> Result<Option<V>, Infallible> {
        Ok(self.table.get(key).cloned())
    }

    async fn del(&mut self, key: &K) -> Result<(), Infallible> {
        self.table.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_set_get_del() {
        let mut store = MemoryStore::new();
        assert!(store.is_empty());

        store.set(&"a", 1).await.unwrap();
        store.set(&"b", 2).await.unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(&"a").await.unwrap(), Some(1));

        store.del(&"a").await.unwrap();
        assert_eq!(store.get(&"a").await.unwrap(), None);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_memory_store_overwrites() {
        let mut store = MemoryStore::new();
        store.set(&"k", "v1").await.unwrap();
        store.set(&"k", "v2").await.unwrap();
        assert_eq!(store.get(&"k").await.unwrap(), Some("v2"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_memory_store_del_absent_is_ok() {
        let mut store = MemoryStore::<&str, i32>::new();
        store.del(&"missing").await.unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_error_reason() {
        let err = StoreError::new("disk full");
        assert_eq!(err.reason(), "disk full");
        assert_eq!(err.to_string(), "store operation failed: disk full");
    }
}
