use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::CacheStats;

/// Global registry of per-member statistics, keyed by name.
///
/// `#[memoize]` registers every memoized method here on its first call,
/// under the method name or the `name = "..."` given to the attribute.
///
/// # Examples
///
/// ```
/// use memoslot_core::stats_registry;
///
/// if let Some(stats) = stats_registry::get("greeting") {
///     println!("greeting hit rate: {:.2}", stats.hit_rate());
/// }
/// ```
static STATS_REGISTRY: Lazy<RwLock<HashMap<String, &'static CacheStats>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Registers `stats` under `name`, replacing any previous entry.
pub fn register(name: &str, stats: &'static CacheStats) {
    STATS_REGISTRY.write().insert(name.to_string(), stats);
}

/// Returns a snapshot of the statistics registered under `name`.
pub fn get(name: &str) -> Option<CacheStats> {
    STATS_REGISTRY.read().get(name).map(|stats| (*stats).clone())
}

/// Returns the live statistics registered under `name`.
pub fn get_ref(name: &str) -> Option<&'static CacheStats> {
    STATS_REGISTRY.read().get(name).copied()
}

pub fn list() -> Vec<String> {
    STATS_REGISTRY.read().keys().cloned().collect()
}

/// Removes `name` from the registry. The statistics themselves keep counting.
pub fn unregister(name: &str) -> bool {
    STATS_REGISTRY.write().remove(name).is_some()
}

pub fn clear() {
    STATS_REGISTRY.write().clear();
}
