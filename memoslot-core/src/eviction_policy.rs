/// Policy a [`BoundedStore`](crate::BoundedStore) follows when it is full and
/// a new key arrives.
///
/// # Variants
///
/// * `FIFO` - evicts the key that was inserted first; reads do not reorder
/// * `LRU` - evicts the key read least recently (default)
/// * `LFU` - evicts the key read least often; ties go to the oldest key
///
/// Only `get` counts as a read. `has` never touches recency or frequency, so
/// the hit/miss check done by the dispatcher does not skew eviction.
///
/// # Examples
///
/// ```
/// use memoslot_core::EvictionPolicy;
///
/// assert_eq!(EvictionPolicy::default(), EvictionPolicy::LRU);
///
/// let policy: EvictionPolicy = "LFU".into();
/// assert_eq!(policy, EvictionPolicy::LFU);
/// ```
///
/// | Policy | Eviction | Read | Insert |
/// |--------|----------|------|--------|
/// | FIFO   | O(1)     | O(1) | O(1)   |
/// | LRU    | O(1)     | O(n) | O(1)   |
/// | LFU    | O(n)     | O(1) | O(1)   |
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EvictionPolicy {
    FIFO,
    #[default]
    LRU,
    LFU,
}

/// Case-insensitive conversion; unknown names fall back to LRU.
///
/// ```
/// use memoslot_core::EvictionPolicy;
///
/// assert_eq!(EvictionPolicy::from("fifo"), EvictionPolicy::FIFO);
/// assert_eq!(EvictionPolicy::from("Lru"), EvictionPolicy::LRU);
/// assert_eq!(EvictionPolicy::from("random"), EvictionPolicy::LRU);
/// ```
impl From<&str> for EvictionPolicy {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "fifo" => EvictionPolicy::FIFO,
            "lfu" => EvictionPolicy::LFU,
            _ => EvictionPolicy::LRU,
        }
    }
}
