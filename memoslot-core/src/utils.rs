//! Ordering helpers shared by the bounded cache store.

use std::collections::{HashMap, VecDeque};

use crate::{CacheEntry, CacheKey};

/// Moves `key` to the back of `order`, marking it as most recently used.
///
/// Keys not present in `order` leave it unchanged.
///
/// # Examples
///
/// ```
/// use std::collections::VecDeque;
/// use memoslot_core::{utils::move_key_to_end, CacheKey};
///
/// let mut order: VecDeque<CacheKey> = ["a", "b", "c"].into_iter().map(CacheKey::from).collect();
/// move_key_to_end(&mut order, &CacheKey::from("a"));
/// assert_eq!(order.back(), Some(&CacheKey::from("a")));
/// ```
pub fn move_key_to_end(order: &mut VecDeque<CacheKey>, key: &CacheKey) {
    if let Some(pos) = order.iter().position(|k| k == key) {
        if let Some(k) = order.remove(pos) {
            order.push_back(k);
        }
    }
}

/// Removes `key` from `order`, returning `true` if it was present.
pub fn remove_key(order: &mut VecDeque<CacheKey>, key: &CacheKey) -> bool {
    match order.iter().position(|k| k == key) {
        Some(pos) => order.remove(pos).is_some(),
        None => false,
    }
}

/// Finds the key with the lowest read count.
///
/// Keys are scanned in `order`, so on a tie the key closest to the front
/// (the oldest insertion) wins. Keys missing from `map` are skipped.
///
/// # Examples
///
/// ```
/// use std::collections::{HashMap, VecDeque};
/// use memoslot_core::{utils::find_min_frequency_key, CacheEntry, CacheKey};
///
/// let mut map = HashMap::new();
/// map.insert(CacheKey::from("a"), CacheEntry { value: 1, frequency: 3 });
/// map.insert(CacheKey::from("b"), CacheEntry { value: 2, frequency: 1 });
///
/// let order: VecDeque<CacheKey> = ["a", "b"].into_iter().map(CacheKey::from).collect();
/// assert_eq!(find_min_frequency_key(&map, &order), Some(CacheKey::from("b")));
/// ```
pub fn find_min_frequency_key<R>(
    map: &HashMap<CacheKey, CacheEntry<R>>,
    order: &VecDeque<CacheKey>,
) -> Option<CacheKey> {
    let mut min: Option<(&CacheKey, u64)> = None;

    for key in order.iter() {
        if let Some(entry) = map.get(key) {
            match min {
                Some((_, freq)) if entry.frequency >= freq => {}
                _ => min = Some((key, entry.frequency)),
            }
        }
    }

    min.map(|(key, _)| key.clone())
}
