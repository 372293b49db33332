/// A value held by a [`BoundedStore`](crate::BoundedStore) together with its
/// read counter.
///
/// The counter starts at zero on insertion and is bumped on every `get`; the
/// LFU policy evicts the entry with the lowest count.
///
/// # Examples
///
/// ```
/// use memoslot_core::CacheEntry;
///
/// let mut entry = CacheEntry::new("Hello, Alice");
/// assert_eq!(entry.frequency, 0);
///
/// entry.increment_frequency();
/// assert_eq!(entry.frequency, 1);
/// ```
#[derive(Clone, Debug)]
pub struct CacheEntry<R> {
    pub value: R,
    pub frequency: u64,
}

impl<R> CacheEntry<R> {
    pub fn new(value: R) -> Self {
        Self {
            value,
            frequency: 0,
        }
    }

    pub fn increment_frequency(&mut self) {
        self.frequency = self.frequency.saturating_add(1);
    }
}
