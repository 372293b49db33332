//! # Memoslot
//!
//! Per-instance memoization of methods and getters.
//!
//! Each memoized member gets a private slot token; each instance keeps its
//! cached values in its own `MemoSlots` storage area. Results are never
//! shared between instances and disappear when the instance is dropped.
//!
//! ## Features
//!
//! - **Declarative**: put `#[memoize]` on a `&self` method
//! - **Explicit presence**: `0`, `false`, `""` and `None` results are cached too
//! - **Primitive keys**: a single primitive argument is its own key
//! - **Hash functions**: anything else is keyed by a function you provide
//! - **Pluggable stores**: swap the default map for a bounded FIFO/LRU/LFU
//!   store or your own `CacheStore`
//! - **Result-aware**: only `Ok` values are cached
//!
//! ## Quick Start
//!
//! ```rust
//! use memoslot::{memoize, MemoSlots, Memoizable};
//!
//! #[derive(Default, Memoizable)]
//! struct Invoice {
//!     slots: MemoSlots,
//!     lines: Vec<u64>,
//! }
//!
//! impl Invoice {
//!     #[memoize]
//!     fn total(&self) -> u64 {
//!         self.lines.iter().sum()
//!     }
//!
//!     #[memoize]
//!     fn with_tax(&self, percent: u64) -> u64 {
//!         self.total() * (100 + percent) / 100
//!     }
//! }
//!
//! let invoice = Invoice {
//!     lines: vec![100, 250],
//!     ..Default::default()
//! };
//!
//! assert_eq!(invoice.total(), 350);
//! assert_eq!(invoice.with_tax(20), 420);
//! // Served from the instance's cache
//! assert_eq!(invoice.with_tax(20), 420);
//! ```
//!
//! ## Non-Primitive Arguments
//!
//! Arguments that are not primitives need a hash function turning them into
//! a deterministic string key:
//!
//! ```rust
//! use memoslot::{memoize, MemoSlots, Memoizable};
//!
//! struct User {
//!     id: u64,
//! }
//!
//! struct Company {
//!     id: u64,
//! }
//!
//! #[derive(Default, Memoizable)]
//! struct Directory {
//!     slots: MemoSlots,
//! }
//!
//! impl Directory {
//!     #[memoize(hash = |u: &User, c: &Company| format!("{}:{}", u.id, c.id))]
//!     fn badge(&self, u: &User, c: &Company) -> String {
//!         format!("user {} at company {}", u.id, c.id)
//!     }
//! }
//!
//! let directory = Directory::default();
//! let badge = directory.badge(&User { id: 1 }, &Company { id: 7 });
//! assert_eq!(badge, "user 1 at company 7");
//! ```
//!
//! With a hash function the argument types need no trait impl, so foreign
//! types work too:
//!
//! ```rust
//! use std::time::Duration;
//!
//! use memoslot::{memoize, MemoSlots, Memoizable};
//!
//! #[derive(Default, Memoizable)]
//! struct Timer {
//!     slots: MemoSlots,
//! }
//!
//! impl Timer {
//!     #[memoize(hash = |d: &Duration| d.as_millis().to_string())]
//!     fn label(&self, d: Duration) -> String {
//!         format!("{}ms", d.as_millis())
//!     }
//! }
//!
//! assert_eq!(Timer::default().label(Duration::from_millis(250)), "250ms");
//! ```
//!
//! ## Custom Stores
//!
//! ```rust
//! use memoslot::{memoize, BoundedStore, MemoSlots, Memoizable};
//!
//! #[derive(Default, Memoizable)]
//! struct Profiles {
//!     slots: MemoSlots,
//! }
//!
//! impl Profiles {
//!     // At most two profiles per instance, least frequently read goes first
//!     #[memoize(cache = || BoundedStore::lfu(2))]
//!     fn profile(&self, name: &str) -> String {
//!         format!("profile of {}", name)
//!     }
//!
//!     // Same thing, spelled with attributes
//!     #[memoize(limit = 2, policy = "lfu")]
//!     fn avatar(&self, name: &str) -> String {
//!         format!("avatar of {}", name)
//!     }
//! }
//! ```
//!
//! ## Without the Attribute
//!
//! [`Memoize`] wraps any closure and validates what it is attached to:
//!
//! ```rust
//! use memoslot::{MemberKind, Memoize, MemoizeError, MemoSlots, Memoizable};
//!
//! #[derive(Default, Memoizable)]
//! struct Counter {
//!     slots: MemoSlots,
//! }
//!
//! let err = Memoize::<Counter, (u32,), ()>::new()
//!     .attach(MemberKind::Setter, |_, _| ())
//!     .unwrap_err();
//! assert_eq!(err, MemoizeError::InvalidTarget { kind: MemberKind::Setter });
//! ```

pub use memoslot_core::*;
pub use memoslot_macros::{memoize, Memoizable};

// Code generated by `#[memoize]` and `#[derive(Memoizable)]` names
// `::memoslot` paths only, so depending on this crate is enough.
#[doc(hidden)]
pub use memoslot_core::__private;
