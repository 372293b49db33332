//! # Memoslot Core
//!
//! Core types for per-instance memoization of methods and getters.
//!
//! Every memoized member owns a [`SlotToken`], allocated once when the member
//! is wrapped. Every instance owns a [`MemoSlots`] storage area. The value a
//! member caches for an instance lives in that instance's storage under the
//! member's token, so instances never see each other's results and the cache
//! goes away with the instance.
//!
//! ## Module Organization
//!
//! - [`CacheKey`], [`Argument`], [`Args`], [`PrimitiveArgs`] - primitive keys and argument classification
//! - [`SlotToken`], [`MemoSlots`], [`Memoizable`] - slot tokens and per-instance storage
//! - [`Dispatcher`] - zero-argument and keyed caching strategies
//! - [`Memoize`], [`Memoized`], [`Options`] - the wrapper factory and its configuration
//! - [`CacheStore`], [`MapStore`], [`BoundedStore`] - pluggable stores
//! - [`EvictionPolicy`] - FIFO, LRU and LFU for `BoundedStore`
//! - [`utils`] - ordering helpers used by the bounded store
//!
mod cache_entry;
mod cache_key;
mod cache_store;
mod dispatch;
mod error;
mod eviction_policy;
mod memoize;
mod slot;
mod stats;

pub mod utils;

#[cfg(feature = "stats")]
pub mod stats_registry;

pub use cache_entry::CacheEntry;
pub use cache_key::{Args, Argument, CacheKey, PrimitiveArgs};
pub use cache_store::{BoundedStore, CacheStore, MapStore};
pub use dispatch::Dispatcher;
pub use error::MemoizeError;
pub use eviction_policy::EvictionPolicy;
pub use memoize::{MemberKind, Memoize, Memoized, Options};
pub use slot::{MemoSlots, Memoizable, SlotToken};
pub use stats::CacheStats;

/// Items used by code generated from `#[memoize]`. Not part of the public API.
#[doc(hidden)]
pub mod __private {
    use std::marker::PhantomData;

    pub use once_cell::sync::Lazy;

    use crate::cache_key::no_primitive_key;
    use crate::{CacheKey, CacheStats, MemoizeError, PrimitiveArgs};

    /// Picks the primitive key deriver of a concrete argument list: the
    /// [`PrimitiveArgs`] one when the list implements it, none otherwise.
    ///
    /// Method resolution does the choice. `(&KeySelector::<A>::new()).key_deriver()`
    /// finds [`PrimitiveKeys`] on `KeySelector<A>` first and only falls back to
    /// [`OpaqueKeys`] on `&KeySelector<A>` when `A: PrimitiveArgs` does not hold.
    pub struct KeySelector<A>(PhantomData<fn(&A)>);

    impl<A> KeySelector<A> {
        #[allow(clippy::new_without_default)]
        pub fn new() -> Self {
            KeySelector(PhantomData)
        }
    }

    pub trait PrimitiveKeys<A> {
        fn key_deriver(&self) -> fn(&A) -> Option<CacheKey>;
    }

    impl<A: PrimitiveArgs> PrimitiveKeys<A> for KeySelector<A> {
        fn key_deriver(&self) -> fn(&A) -> Option<CacheKey> {
            <A as PrimitiveArgs>::primitive_key
        }
    }

    pub trait OpaqueKeys<A> {
        fn key_deriver(&self) -> fn(&A) -> Option<CacheKey>;
    }

    impl<A> OpaqueKeys<A> for &KeySelector<A> {
        fn key_deriver(&self) -> fn(&A) -> Option<CacheKey> {
            no_primitive_key::<A>
        }
    }

    /// Error of a `Result`-returning memoized method: either the method's own
    /// error or a dispatch failure.
    pub enum Failure<E> {
        Memoize(MemoizeError),
        Operation(E),
    }

    impl<E> From<MemoizeError> for Failure<E> {
        fn from(err: MemoizeError) -> Self {
            Failure::Memoize(err)
        }
    }

    /// Registers the statistics of a memoized method under `name`. Does
    /// nothing without the `stats` feature.
    #[allow(unused_variables)]
    pub fn register_stats(name: &str, stats: &'static CacheStats) {
        #[cfg(feature = "stats")]
        crate::stats_registry::register(name, stats);
    }
}

#[cfg(test)]
mod tests {
    use super::__private::{KeySelector, OpaqueKeys, PrimitiveKeys};
    use super::CacheKey;
    use std::time::Duration;

    #[test]
    fn test_key_selector_prefers_primitive_keys() {
        let derive = (&KeySelector::<(u32,)>::new()).key_deriver();
        assert_eq!(derive(&(4,)), Some(CacheKey::Int(4)));
    }

    #[test]
    fn test_key_selector_falls_back_for_foreign_types() {
        let derive = (&KeySelector::<(Duration,)>::new()).key_deriver();
        assert_eq!(derive(&(Duration::from_secs(1),)), None);
    }
}
