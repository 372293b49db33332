use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::MemoizeError;

static NEXT_SLOT: AtomicU64 = AtomicU64::new(1);

/// Opaque identifier of one memoized member.
///
/// A token is allocated once per wrapped member and shared by every instance
/// of the owning type; each instance keeps the value stored under it in its
/// own [`MemoSlots`]. Tokens come from a process-wide counter and have no
/// public constructor, so they cannot be forged or collide with each other.
///
/// # Examples
///
/// ```
/// use memoslot_core::SlotToken;
///
/// let a = SlotToken::allocate();
/// let b = SlotToken::allocate();
/// assert_ne!(a, b);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotToken(u64);

impl SlotToken {
    /// Allocates a fresh, never-before-seen token.
    pub fn allocate() -> Self {
        SlotToken(NEXT_SLOT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SlotToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot#{}", self.0)
    }
}

/// Per-instance storage area for memoized results.
///
/// Embed one in every type that has memoized members and expose it through
/// [`Memoizable`]. Slot values are created lazily on the first call of each
/// member and live as long as the instance.
///
/// Cloning produces an *empty* storage area: a clone is a different instance
/// and starts with its own caches.
///
/// # Examples
///
/// ```
/// use memoslot_core::{Memoizable, MemoSlots};
///
/// #[derive(Default)]
/// struct Report {
///     slots: MemoSlots,
/// }
///
/// impl Memoizable for Report {
///     fn memo_slots(&self) -> &MemoSlots {
///         &self.slots
///     }
/// }
///
/// let report = Report::default();
/// assert!(report.memo_slots().is_empty());
/// ```
#[derive(Default)]
pub struct MemoSlots {
    slots: Mutex<HashMap<SlotToken, Arc<dyn Any + Send + Sync>>>,
}

impl MemoSlots {
    /// Creates an empty storage area.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value stored under `token`, creating it with `init` if the
    /// slot is still empty.
    ///
    /// Creation happens under the storage lock, so `init` runs at most once
    /// per slot even when several threads race on the first call. `init` must
    /// not call back into memoized members of the same instance.
    pub(crate) fn get_or_create<S, F>(&self, token: SlotToken, init: F) -> Result<Arc<S>, MemoizeError>
    where
        S: Any + Send + Sync,
        F: FnOnce() -> S,
    {
        let value = {
            let mut slots = self.slots.lock();
            slots
                .entry(token)
                .or_insert_with(|| {
                    tracing::debug!(slot = %token, "creating storage slot");
                    Arc::new(init()) as Arc<dyn Any + Send + Sync>
                })
                .clone()
        };

        value
            .downcast::<S>()
            .map_err(|_| MemoizeError::SlotTypeMismatch { slot: token })
    }

    /// Returns `true` if a value has been stored under `token`.
    pub fn contains(&self, token: SlotToken) -> bool {
        self.slots.lock().contains_key(&token)
    }

    /// Number of populated slots.
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Clone for MemoSlots {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl fmt::Debug for MemoSlots {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoSlots")
            .field("populated", &self.len())
            .finish()
    }
}

/// Types that own a [`MemoSlots`] storage area.
///
/// Usually derived with `#[derive(Memoizable)]`, which points the
/// implementation at the struct's `MemoSlots` field.
pub trait Memoizable {
    fn memo_slots(&self) -> &MemoSlots;
}
