#![doc = include_str!("../README.md")]
#![deny(missing_docs)]

mod chain;
mod store;

use std::hash::Hash;
use std::num::NonZeroUsize;

use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::chain::{Chain, Ptr};
pub use crate::store::{MemoryStore, Store, StoreError};

#[cfg(not(feature = "ahash"))]
type RandomState = std::hash::RandomState;
#[cfg(feature = "ahash")]
type RandomState = ahash::RandomState;

/// Capacity used by [`OrderedCache::new`].
pub const DEFAULT_LIMIT: NonZeroUsize = NonZeroUsize::new(100).unwrap();

/// Least-recently-used key ordering in front of an asynchronous store.
///
/// The cache tracks *which* keys exist and how recently each was used; the
/// values themselves live in the [`Store`] supplied at construction. Every
/// operation talks to the store first and only updates the ordering once
/// the store reports success, so the ordering never claims a value exists
/// that the store failed to persist (or vice versa). On a store failure
/// the ordering is left untouched and the store's error is returned
/// verbatim.
///
/// Internally the ordering is a doubly-linked chain of entries from oldest
/// (`head`) to newest (`tail`) use, held in a slot arena and addressed
/// through stable handles, plus a key→entry index for O(1) lookup.
///
/// # Duplicate keys
///
/// Inserting a key that is already present does not unlink the old entry.
/// The new entry is appended at the tail and the index is repointed to it;
/// the superseded entry stays in the chain as an *orphan*. Orphans consume
/// a capacity slot and age out through eviction, but they can no longer be
/// looked up, promoted, or removed by key. [`ordered_keys`] reflects the
/// chain as it is, duplicates included.
///
/// # One call at a time
///
/// Operations take `&mut self`, so the borrow checker already enforces
/// that no two structural mutations interleave. There is no internal
/// locking and no cancellation support: dropping an operation future
/// mid-flight may leave the store updated without the matching ordering
/// update. Callers needing concurrent traffic must serialize calls through
/// a queue of their own.
///
/// # Examples
///
/// ```
/// use std::num::NonZeroUsize;
///
/// use recency::{MemoryStore, OrderedCache};
///
/// # async fn demo() -> Result<(), std::convert::Infallible> {
/// let mut cache = OrderedCache::with_limit(
///     MemoryStore::new(),
///     NonZeroUsize::new(2).unwrap(),
/// );
///
/// cache.put("a", 1).await?;
/// cache.put("b", 2).await?;
///
/// // Reading "a" marks it most recently used...
/// assert_eq!(cache.get(&"a").await?, Some(1));
///
/// // ...so inserting over capacity evicts "b", from chain and store both.
/// let evicted = cache.put("c", 3).await?;
/// assert_eq!(evicted, Some("b"));
/// assert_eq!(cache.ordered_keys(), ["a", "c"]);
/// assert_eq!(cache.store().peek(&"b"), None);
/// # Ok(()) }
/// ```
///
/// [`ordered_keys`]: Self::ordered_keys
pub struct OrderedCache<S: Store> {
    chain: Chain<S::Key>,
    index: IndexMap<S::Key, Ptr, RandomState>,
    limit: NonZeroUsize,
    store: S,
}

impl<S> std::fmt::Debug for OrderedCache<S>
where
    S: Store,
    S::Key: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderedCache")
            .field("keys", &self.chain.keys().collect::<Vec<_>>())
            .field("len", &self.chain.len())
            .field("limit", &self.limit)
            .finish_non_exhaustive()
    }
}

impl<S> OrderedCache<S>
where
    S: Store,
    S::Key: Hash + Eq + Clone,
{
    /// Creates a cache over `store` with the [`DEFAULT_LIMIT`] capacity.
    ///
    /// # Examples
    ///
    /// ```
    /// use recency::{MemoryStore, OrderedCache};
    ///
    /// let cache = OrderedCache::new(MemoryStore::<&str, i32>::new());
    /// assert_eq!(cache.limit().get(), 100);
    /// assert!(cache.is_empty());
    /// ```
    pub fn new(store: S) -> Self {
        Self::with_limit(store, DEFAULT_LIMIT)
    }

    /// Creates a cache over `store` holding at most `limit` chain entries.
    ///
    /// The limit bounds chain slots, not distinct keys: orphaned duplicate
    /// entries count against it until they age out.
    pub fn with_limit(store: S, limit: NonZeroUsize) -> Self {
        OrderedCache {
            chain: Chain::with_capacity(limit.get()),
            index: IndexMap::with_capacity_and_hasher(limit.get(), RandomState::default()),
            limit,
            store,
        }
    }

    /// Persists `(key, value)` and appends the key at the newest position.
    ///
    /// The store's `set` runs first; if it fails the ordering is unchanged
    /// and the error is returned. On success a new entry is linked at the
    /// tail and indexed, orphaning any previous entry for the same key.
    /// If the chain would exceed the limit, the oldest entry is evicted in
    /// the same call (including its store `del`, see
    /// [`evict_oldest`](Self::evict_oldest)) and the evicted key is
    /// returned.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::num::NonZeroUsize;
    ///
    /// use recency::{MemoryStore, OrderedCache};
    ///
    /// # async fn demo() -> Result<(), std::convert::Infallible> {
    /// let mut cache = OrderedCache::with_limit(
    ///     MemoryStore::new(),
    ///     NonZeroUsize::new(2).unwrap(),
    /// );
    ///
    /// assert_eq!(cache.put("a", 1).await?, None);
    /// assert_eq!(cache.put("b", 2).await?, None);
    /// assert_eq!(cache.put("c", 3).await?, Some("a"));
    /// assert_eq!(cache.ordered_keys(), ["b", "c"]);
    /// # Ok(()) }
    /// ```
    pub async fn put(&mut self, key: S::Key, value: S::Value) -> Result<Option<S::Key>, S::Error> {
        self.store.set(&key, value).await?;

        let ptr = self.chain.push_tail(key.clone());
        if self.index.insert(key, ptr).is_some() {
            trace!("superseded entry left orphaned in the chain");
        }

        if self.chain.len() > self.limit.get() {
            return self.evict_oldest().await;
        }
        Ok(None)
    }

    /// Reads the value for `key` and promotes it to most recently used.
    ///
    /// The store's `get` runs first, whether or not the key is currently
    /// tracked; a store failure is returned with no ordering change. When
    /// the read succeeds but the key is not indexed here, the fetched
    /// value is discarded and `Ok(None)` is returned: this structure never
    /// acknowledged that key. Otherwise the entry moves to the tail (a
    /// no-op when it already is the tail) and the store's value is
    /// returned.
    ///
    /// # Examples
    ///
    /// ```
    /// use recency::{MemoryStore, OrderedCache};
    ///
    /// # async fn demo() -> Result<(), std::convert::Infallible> {
    /// let mut cache = OrderedCache::new(MemoryStore::new());
    /// cache.put("a", 1).await?;
    /// cache.put("b", 2).await?;
    ///
    /// assert_eq!(cache.get(&"a").await?, Some(1));
    /// assert_eq!(cache.ordered_keys(), ["b", "a"]);
    /// assert_eq!(cache.get(&"missing").await?, None);
    /// # Ok(()) }
    /// ```
    pub async fn get(&mut self, key: &S::Key) -> Result<Option<S::Value>, S::Error> {
        let value = self.store.get(key).await?;

        let Some(&ptr) = self.index.get(key) else {
            return Ok(None);
        };
        if self.chain.tail() != ptr {
            self.chain.promote(ptr);
            trace!("promoted entry to most recently used");
        }
        Ok(value)
    }

    /// Deletes `key` from the store and drops its entry from the ordering.
    ///
    /// The store's `del` runs first; on failure nothing changes here. On
    /// success the live entry for the key, if any, is unlinked and its
    /// slot reclaimed. Removing a key that is not tracked (never inserted,
    /// already removed, or only present as an orphan) is a success with no
    /// ordering change.
    ///
    /// # Examples
    ///
    /// ```
    /// use recency::{MemoryStore, OrderedCache};
    ///
    /// # async fn demo() -> Result<(), std::convert::Infallible> {
    /// let mut cache = OrderedCache::new(MemoryStore::new());
    /// cache.put("a", 1).await?;
    ///
    /// cache.remove(&"a").await?;
    /// assert!(cache.is_empty());
    /// assert_eq!(cache.store().peek(&"a"), None);
    ///
    /// // Removing again is fine.
    /// cache.remove(&"a").await?;
    /// # Ok(()) }
    /// ```
    pub async fn remove(&mut self, key: &S::Key) -> Result<(), S::Error> {
        self.store.del(key).await?;

        let Some(ptr) = self.index.swap_remove(key) else {
            return Ok(());
        };
        self.chain.detach(ptr);
        self.chain.reclaim(ptr);
        debug!(len = self.chain.len(), "removed entry");
        Ok(())
    }

    /// Evicts the oldest chain entry, deleting its key from the store.
    ///
    /// Completes with `Ok(None)` when the chain is empty. Otherwise the
    /// head entry is unlinked *before* the store `del` is issued: the
    /// entry leaving the chain is the true oldest regardless of what the
    /// store does, and the delete only clears the persisted value.
    ///
    /// When the delete fails, the entry has therefore already left the
    /// chain while its key may still be indexed. The key stays readable
    /// through [`get`](Self::get) (which re-links the entry at the tail on
    /// success) and removable through [`remove`](Self::remove); until one
    /// of those succeeds the entry keeps occupying a capacity slot.
    /// Callers that cannot tolerate this window should treat an eviction
    /// error as fatal for the affected key.
    ///
    /// # Examples
    ///
    /// ```
    /// use recency::{MemoryStore, OrderedCache};
    ///
    /// # async fn demo() -> Result<(), std::convert::Infallible> {
    /// let mut cache = OrderedCache::new(MemoryStore::new());
    /// assert_eq!(cache.evict_oldest().await?, None);
    ///
    /// cache.put("a", 1).await?;
    /// cache.put("b", 2).await?;
    ///
    /// assert_eq!(cache.evict_oldest().await?, Some("a"));
    /// assert_eq!(cache.store().peek(&"a"), None);
    /// assert_eq!(cache.ordered_keys(), ["b"]);
    /// # Ok(()) }
    /// ```
    pub async fn evict_oldest(&mut self) -> Result<Option<S::Key>, S::Error> {
        let Some(ptr) = self.chain.head().optional() else {
            return Ok(None);
        };

        self.chain.detach(ptr);
        match self.store.del(self.chain.key(ptr)).await {
            Err(error) => {
                debug!("store delete failed during eviction; entry left detached");
                Err(error)
            }
            Ok(()) => {
                // Only clear the index slot when it still points at the
                // evicted entry. An orphan's key may be indexed to a newer
                // live entry, which must stay indexed.
                if self.index.get(self.chain.key(ptr)) == Some(&ptr) {
                    self.index.swap_remove(self.chain.key(ptr));
                }
                let key = self.chain.reclaim(ptr);
                debug!(len = self.chain.len(), "evicted oldest entry");
                Ok(Some(key))
            }
        }
    }

    /// Returns every chain key, oldest first.
    ///
    /// This reflects the chain itself, so orphaned duplicates appear once
    /// per entry. Callers that need at most one entry per key should
    /// cross-check [`contains_key`](Self::contains_key). No store
    /// interaction, no side effects.
    ///
    /// # Examples
    ///
    /// ```
    /// use recency::{MemoryStore, OrderedCache};
    ///
    /// # async fn demo() -> Result<(), std::convert::Infallible> {
    /// let mut cache = OrderedCache::new(MemoryStore::new());
    /// cache.put("a", 1).await?;
    /// cache.put("b", 2).await?;
    /// cache.put("a", 3).await?; // orphans the first "a" entry
    ///
    /// assert_eq!(cache.ordered_keys(), ["a", "b", "a"]);
    /// # Ok(()) }
    /// ```
    pub fn ordered_keys(&self) -> Vec<S::Key> {
        self.keys().cloned().collect()
    }

    /// Iterates chain keys, oldest first, without allocating.
    ///
    /// Same contents as [`ordered_keys`](Self::ordered_keys).
    pub fn keys(&self) -> impl Iterator<Item = &S::Key> {
        self.chain.keys()
    }

    /// True when `key` currently has a live (indexed) entry.
    ///
    /// Orphaned duplicates do not count, even though their keys still show
    /// up in [`ordered_keys`](Self::ordered_keys).
    pub fn contains_key(&self, key: &S::Key) -> bool {
        self.index.contains_key(key)
    }

    /// The key that [`evict_oldest`](Self::evict_oldest) would target, or
    /// `None` when the chain is empty.
    ///
    /// # Examples
    ///
    /// ```
    /// use recency::{MemoryStore, OrderedCache};
    ///
    /// # async fn demo() -> Result<(), std::convert::Infallible> {
    /// let mut cache = OrderedCache::new(MemoryStore::new());
    /// cache.put("a", 1).await?;
    /// cache.put("b", 2).await?;
    /// assert_eq!(cache.oldest(), Some(&"a"));
    ///
    /// cache.get(&"a").await?;
    /// assert_eq!(cache.oldest(), Some(&"b"));
    /// # Ok(()) }
    /// ```
    pub fn oldest(&self) -> Option<&S::Key> {
        self.chain.head().optional().map(|ptr| self.chain.key(ptr))
    }

    /// The most recently used key, or `None` when the chain is empty.
    pub fn newest(&self) -> Option<&S::Key> {
        self.chain.tail().optional().map(|ptr| self.chain.key(ptr))
    }

    /// Number of occupied chain slots.
    ///
    /// Counts live entries plus any orphaned duplicates still aging out;
    /// never exceeds [`limit`](Self::limit) once an operation completes.
    pub fn len(&self) -> usize {
        self.chain.len()
    }

    /// True when no chain slot is occupied.
    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    /// The capacity this cache was built with.
    pub fn limit(&self) -> NonZeroUsize {
        self.limit
    }

    /// Shared access to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Exclusive access to the underlying store.
    ///
    /// Mutating the store directly bypasses the ordering; the caller is
    /// responsible for keeping the two consistent.
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Consumes the cache, returning the store.
    pub fn into_store(self) -> S {
        self.store
    }

    #[doc(hidden)]
    #[cfg(all(debug_assertions, feature = "internal-debugging"))]
    pub fn debug_validate(&self) {
        self.chain.debug_validate();
        assert!(
            self.index.len() <= self.chain.len(),
            "index holds more entries than the chain has slots"
        );
        for (key, &ptr) in &self.index {
            assert_eq!(
                self.chain.key(ptr),
                key,
                "indexed entry does not carry the indexed key"
            );
        }
    }
}
