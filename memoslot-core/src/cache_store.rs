use std::collections::{HashMap, VecDeque};
use std::fmt;

use crate::utils::{find_min_frequency_key, move_key_to_end, remove_key};
use crate::{CacheEntry, CacheKey, EvictionPolicy};

/// Key-value backend used by the keyed (N-argument) strategy.
///
/// One store is created per instance and member, on the first call that
/// needs it, by the configured cache factory. The dispatcher only ever uses
/// these three operations, in this order: `has` to check, `get` on a hit,
/// `set` after computing a miss. Eviction is entirely up to the
/// implementation.
///
/// A store that reports `has == true` but then returns `None` from `get` is
/// treated as a miss.
///
/// # Examples
///
/// A store that never keeps anything, so every call recomputes:
///
/// ```
/// use memoslot_core::{CacheKey, CacheStore};
///
/// struct Passthrough;
///
/// impl<R> CacheStore<R> for Passthrough {
///     fn has(&self, _key: &CacheKey) -> bool {
///         false
///     }
///
///     fn get(&mut self, _key: &CacheKey) -> Option<R> {
///         None
///     }
///
///     fn set(&mut self, _key: CacheKey, _value: R) {}
/// }
/// ```
pub trait CacheStore<R>: Send {
    fn has(&self, key: &CacheKey) -> bool;

    fn get(&mut self, key: &CacheKey) -> Option<R>;

    fn set(&mut self, key: CacheKey, value: R);
}

impl<R, S: CacheStore<R> + ?Sized> CacheStore<R> for Box<S> {
    fn has(&self, key: &CacheKey) -> bool {
        (**self).has(key)
    }

    fn get(&mut self, key: &CacheKey) -> Option<R> {
        (**self).get(key)
    }

    fn set(&mut self, key: CacheKey, value: R) {
        (**self).set(key, value)
    }
}

/// Default backend: an unbounded in-memory map.
///
/// # Examples
///
/// ```
/// use memoslot_core::{CacheKey, CacheStore, MapStore};
///
/// let mut store = MapStore::new();
/// store.set(CacheKey::from("John"), "Hello, John".to_string());
///
/// assert!(store.has(&CacheKey::from("John")));
/// assert_eq!(store.get(&CacheKey::from("John")).as_deref(), Some("Hello, John"));
/// assert_eq!(store.len(), 1);
/// ```
pub struct MapStore<R> {
    entries: HashMap<CacheKey, R>,
}

impl<R> MapStore<R> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<R> Default for MapStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> fmt::Debug for MapStore<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapStore")
            .field("len", &self.entries.len())
            .finish()
    }
}

impl<R: Clone + Send> CacheStore<R> for MapStore<R> {
    fn has(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    fn get(&mut self, key: &CacheKey) -> Option<R> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: CacheKey, value: R) {
        self.entries.insert(key, value);
    }
}

/// Capacity-bounded backend with a configurable [`EvictionPolicy`].
///
/// Holds at most `limit` entries. Inserting a new key into a full store first
/// evicts one entry chosen by the policy. A limit of zero stores nothing.
///
/// # Examples
///
/// ```
/// use memoslot_core::{BoundedStore, CacheKey, CacheStore};
///
/// let mut store = BoundedStore::lfu(2);
/// store.set(CacheKey::from("A"), 1);
/// let _ = store.get(&CacheKey::from("A"));
/// store.set(CacheKey::from("B"), 2);
///
/// // "B" has never been read, so it makes room for "C"
/// store.set(CacheKey::from("C"), 3);
/// assert!(store.has(&CacheKey::from("A")));
/// assert!(!store.has(&CacheKey::from("B")));
/// assert!(store.has(&CacheKey::from("C")));
/// ```
pub struct BoundedStore<R> {
    map: HashMap<CacheKey, CacheEntry<R>>,
    order: VecDeque<CacheKey>,
    limit: usize,
    policy: EvictionPolicy,
}

impl<R> BoundedStore<R> {
    pub fn new(limit: usize, policy: EvictionPolicy) -> Self {
        Self {
            map: HashMap::with_capacity(limit),
            order: VecDeque::with_capacity(limit),
            limit,
            policy,
        }
    }

    pub fn fifo(limit: usize) -> Self {
        Self::new(limit, EvictionPolicy::FIFO)
    }

    pub fn lru(limit: usize) -> Self {
        Self::new(limit, EvictionPolicy::LRU)
    }

    pub fn lfu(limit: usize) -> Self {
        Self::new(limit, EvictionPolicy::LFU)
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn policy(&self) -> EvictionPolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    fn evict_one(&mut self) {
        let victim = match self.policy {
            EvictionPolicy::FIFO | EvictionPolicy::LRU => self.order.pop_front(),
            EvictionPolicy::LFU => {
                let key = find_min_frequency_key(&self.map, &self.order);
                if let Some(key) = &key {
                    remove_key(&mut self.order, key);
                }
                key
            }
        };

        if let Some(key) = victim {
            tracing::trace!(key = %key, policy = ?self.policy, "evicting cache entry");
            self.map.remove(&key);
        }
    }
}

impl<R> fmt::Debug for BoundedStore<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedStore")
            .field("len", &self.map.len())
            .field("limit", &self.limit)
            .field("policy", &self.policy)
            .finish()
    }
}

impl<R: Clone + Send> CacheStore<R> for BoundedStore<R> {
    fn has(&self, key: &CacheKey) -> bool {
        self.map.contains_key(key)
    }

    fn get(&mut self, key: &CacheKey) -> Option<R> {
        let entry = self.map.get_mut(key)?;
        let value = entry.value.clone();

        match self.policy {
            EvictionPolicy::LRU => move_key_to_end(&mut self.order, key),
            EvictionPolicy::LFU => entry.increment_frequency(),
            EvictionPolicy::FIFO => {}
        }

        Some(value)
    }

    fn set(&mut self, key: CacheKey, value: R) {
        if self.limit == 0 {
            return;
        }

        if let Some(entry) = self.map.get_mut(&key) {
            entry.value = value;
            if self.policy == EvictionPolicy::LRU {
                move_key_to_end(&mut self.order, &key);
            }
            return;
        }

        while self.map.len() >= self.limit {
            let before = self.map.len();
            self.evict_one();
            if self.map.len() == before {
                break;
            }
        }

        self.order.push_back(key.clone());
        self.map.insert(key, CacheEntry::new(value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> CacheKey {
        CacheKey::from(s)
    }

    #[test]
    fn test_map_store_overwrites() {
        let mut store = MapStore::new();
        store.set(key("a"), 1);
        store.set(key("a"), 2);
        assert_eq!(store.get(&key("a")), Some(2));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_map_store_missing_key() {
        let mut store: MapStore<u8> = MapStore::default();
        assert!(!store.has(&key("nope")));
        assert_eq!(store.get(&key("nope")), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_fifo_ignores_reads() {
        let mut store = BoundedStore::fifo(2);
        store.set(key("a"), 1);
        store.set(key("b"), 2);
        let _ = store.get(&key("a"));
        store.set(key("c"), 3);

        assert!(!store.has(&key("a")));
        assert!(store.has(&key("b")));
        assert!(store.has(&key("c")));
    }

    #[test]
    fn test_lru_keeps_recently_read() {
        let mut store = BoundedStore::lru(2);
        store.set(key("a"), 1);
        store.set(key("b"), 2);
        let _ = store.get(&key("a"));
        store.set(key("c"), 3);

        assert!(store.has(&key("a")));
        assert!(!store.has(&key("b")));
        assert!(store.has(&key("c")));
    }

    #[test]
    fn test_lfu_keeps_frequently_read() {
        let mut store = BoundedStore::lfu(2);
        store.set(key("a"), 1);
        store.set(key("b"), 2);
        for _ in 0..3 {
            let _ = store.get(&key("b"));
        }
        store.set(key("c"), 3);

        assert!(!store.has(&key("a")));
        assert!(store.has(&key("b")));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_has_does_not_count_as_read() {
        let mut store = BoundedStore::lfu(2);
        store.set(key("a"), 1);
        store.set(key("b"), 2);
        for _ in 0..5 {
            assert!(store.has(&key("b")));
        }
        let _ = store.get(&key("a"));
        store.set(key("c"), 3);

        assert!(store.has(&key("a")));
        assert!(!store.has(&key("b")));
    }

    #[test]
    fn test_zero_limit_stores_nothing() {
        let mut store = BoundedStore::lru(0);
        store.set(key("a"), 1);
        assert!(!store.has(&key("a")));
        assert!(store.is_empty());
    }

    #[test]
    fn test_overwrite_does_not_evict() {
        let mut store = BoundedStore::fifo(2);
        store.set(key("a"), 1);
        store.set(key("b"), 2);
        store.set(key("a"), 10);

        assert_eq!(store.len(), 2);
        assert_eq!(store.get(&key("a")), Some(10));
        assert!(store.has(&key("b")));
    }

    #[test]
    fn test_boxed_store_delegates() {
        let mut store: Box<dyn CacheStore<u32>> = Box::new(BoundedStore::fifo(1));
        store.set(key("a"), 1);
        store.set(key("b"), 2);
        assert!(!store.has(&key("a")));
        assert_eq!(store.get(&key("b")), Some(2));
    }
}
