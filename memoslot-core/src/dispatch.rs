use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use crate::cache_key::no_primitive_key;
use crate::{
    Args, CacheKey, CacheStats, CacheStore, MapStore, Memoizable, MemoizeError, PrimitiveArgs,
    SlotToken,
};

/// Slot value of a member whose argument list is empty.
type SingleSlot<R> = OnceCell<R>;

/// Slot value of a member that takes arguments.
struct KeyedSlot<R> {
    store: Mutex<Box<dyn CacheStore<R>>>,
    /// Keys whose original operation is running; late callers wait on the cell.
    in_flight: Mutex<HashMap<CacheKey, Arc<OnceCell<R>>>>,
}

impl<R> KeyedSlot<R> {
    fn new(store: Box<dyn CacheStore<R>>) -> Self {
        Self {
            store: Mutex::new(store),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    fn in_flight(&self, key: &CacheKey) -> Arc<OnceCell<R>> {
        self.in_flight.lock().entry(key.clone()).or_default().clone()
    }

    fn settle(&self, key: &CacheKey, cell: &Arc<OnceCell<R>>) {
        let mut in_flight = self.in_flight.lock();
        if in_flight.get(key).is_some_and(|current| Arc::ptr_eq(current, cell)) {
            in_flight.remove(key);
        }
    }
}

/// Routes one call of a memoized member to the zero-argument or keyed
/// strategy.
///
/// A dispatcher is cheap to build: it borrows the hash function, cache
/// factory and statistics it needs, so `#[memoize]` creates one per call and
/// [`Memoized`](crate::Memoized) builds one from its stored options.
///
/// # Strategies
///
/// * **Zero arguments** (`A = ()`): the slot holds a single lazily computed
///   value. Presence is tracked explicitly, so `0`, `false`, `""` or `None`
///   results are cached like any other value.
/// * **Keyed** (any other `A`): the slot holds a [`CacheStore`] created by the
///   cache factory (default [`MapStore`]). The key is the argument itself for
///   a single primitive argument, otherwise the string returned by the hash
///   function. Without a hash function such calls fail with
///   [`MemoizeError::MissingHashFunction`] before anything runs.
///
/// The original operation is never called while a lock is held, so memoized
/// members may call each other (or themselves, recursively) on the same
/// instance. Concurrent callers asking for the same missing key wait for the
/// first one instead of running the original again.
///
/// [`new`](Self::new) needs [`PrimitiveArgs`] to recognise a single primitive
/// argument. [`hashed`](Self::hashed) works for any argument types and takes
/// every key from the hash function.
///
/// # Examples
///
/// ```
/// use memoslot_core::{Dispatcher, Memoizable, MemoSlots, SlotToken};
///
/// #[derive(Default)]
/// struct Greeter {
///     slots: MemoSlots,
/// }
///
/// impl Memoizable for Greeter {
///     fn memo_slots(&self) -> &MemoSlots {
///         &self.slots
///     }
/// }
///
/// let token = SlotToken::allocate();
/// let greeter = Greeter::default();
/// let mut runs = 0;
///
/// for _ in 0..3 {
///     let greeting = Dispatcher::<Greeter, (&str,), String>::new(token)
///         .call(&greeter, ("John",), |(name,)| {
///             runs += 1;
///             format!("Hello, {}", name)
///         })
///         .unwrap();
///     assert_eq!(greeting, "Hello, John");
/// }
///
/// assert_eq!(runs, 1);
/// ```
pub struct Dispatcher<'a, T: ?Sized, A, R> {
    slot: SlotToken,
    primitive_key: fn(&A) -> Option<CacheKey>,
    hash_function: Option<&'a (dyn Fn(&T, &A) -> String + 'a)>,
    cache_factory: Option<&'a (dyn Fn() -> Box<dyn CacheStore<R>> + 'a)>,
    stats: Option<&'a CacheStats>,
}

impl<'a, T, A, R> Dispatcher<'a, T, A, R>
where
    T: Memoizable + ?Sized,
    A: Args,
    R: Clone + Send + Sync + 'static,
{
    pub fn new(slot: SlotToken) -> Self
    where
        A: PrimitiveArgs,
    {
        Self::with_primitive_keys(slot, <A as PrimitiveArgs>::primitive_key)
    }

    /// A dispatcher whose arguments are never their own key.
    pub fn hashed(slot: SlotToken) -> Self {
        Self::with_primitive_keys(slot, no_primitive_key::<A>)
    }

    /// A dispatcher recognising single primitive arguments with
    /// `primitive_key`.
    pub fn with_primitive_keys(slot: SlotToken, primitive_key: fn(&A) -> Option<CacheKey>) -> Self {
        Self {
            slot,
            primitive_key,
            hash_function: None,
            cache_factory: None,
            stats: None,
        }
    }

    /// Derives keys through `hash_function` when the arguments are not a
    /// single primitive.
    pub fn hash_function(mut self, hash_function: &'a (dyn Fn(&T, &A) -> String + 'a)) -> Self {
        self.hash_function = Some(hash_function);
        self
    }

    /// Creates the per-instance store with `cache_factory` instead of a
    /// [`MapStore`].
    pub fn cache_factory(
        mut self,
        cache_factory: &'a (dyn Fn() -> Box<dyn CacheStore<R>> + 'a),
    ) -> Self {
        self.cache_factory = Some(cache_factory);
        self
    }

    /// Records hits and misses in `stats`.
    pub fn stats(mut self, stats: &'a CacheStats) -> Self {
        self.stats = Some(stats);
        self
    }

    pub fn slot(&self) -> SlotToken {
        self.slot
    }

    /// Returns the cached result for `args` on `instance`, running `original`
    /// on a miss.
    ///
    /// `original` receives the arguments back and is already bound to the
    /// instance (usually a closure capturing it).
    pub fn call<F>(&self, instance: &T, args: A, original: F) -> Result<R, MemoizeError>
    where
        F: FnOnce(A) -> R,
    {
        self.dispatch(instance, args, |args| Ok::<R, Infallible>(original(args)))
            .map_err(|err| match err {
                DispatchError::Memoize(err) => err,
                DispatchError::Operation(never) => match never {},
            })
    }

    /// Like [`call`](Self::call) for a fallible operation.
    ///
    /// Only `Ok` values are stored. An `Err` is returned unchanged and the
    /// next call with the same key runs `original` again.
    pub fn try_call<F, E>(&self, instance: &T, args: A, original: F) -> Result<R, E>
    where
        F: FnOnce(A) -> Result<R, E>,
        E: From<MemoizeError>,
    {
        self.dispatch(instance, args, original).map_err(|err| match err {
            DispatchError::Memoize(err) => E::from(err),
            DispatchError::Operation(err) => err,
        })
    }

    fn dispatch<F, E>(&self, instance: &T, args: A, original: F) -> Result<R, DispatchError<E>>
    where
        F: FnOnce(A) -> Result<R, E>,
    {
        if A::LEN == 0 {
            self.dispatch_single(instance, args, original)
        } else {
            self.dispatch_keyed(instance, args, original)
        }
    }

    fn dispatch_single<F, E>(
        &self,
        instance: &T,
        args: A,
        original: F,
    ) -> Result<R, DispatchError<E>>
    where
        F: FnOnce(A) -> Result<R, E>,
    {
        let cell = instance
            .memo_slots()
            .get_or_create(self.slot, SingleSlot::<R>::new)?;

        if let Some(value) = cell.get() {
            self.record_hit(None);
            return Ok(value.clone());
        }

        let mut computed = false;
        let value = cell.get_or_try_init(|| {
            computed = true;
            self.record_miss(None);
            original(args).map_err(DispatchError::Operation)
        })?;
        if !computed {
            self.record_hit(None);
        }
        Ok(value.clone())
    }

    fn dispatch_keyed<F, E>(
        &self,
        instance: &T,
        args: A,
        original: F,
    ) -> Result<R, DispatchError<E>>
    where
        F: FnOnce(A) -> Result<R, E>,
    {
        let key = self.derive_key(instance, &args)?;

        let slot = instance
            .memo_slots()
            .get_or_create(self.slot, || KeyedSlot::new(self.new_store()))?;

        let cached = lookup(&mut **slot.store.lock(), &key);
        if let Some(value) = cached {
            self.record_hit(Some(&key));
            return Ok(value);
        }

        let cell = slot.in_flight(&key);
        let mut initialized = false;
        let mut computed = false;
        let result = cell
            .get_or_try_init(|| {
                initialized = true;
                // stored by a caller that finished after our first lookup
                if let Some(value) = lookup(&mut **slot.store.lock(), &key) {
                    return Ok(value);
                }
                computed = true;
                self.record_miss(Some(&key));
                original(args).map_err(DispatchError::Operation)
            })
            .map(R::clone);

        if computed {
            if let Ok(value) = &result {
                slot.store.lock().set(key.clone(), value.clone());
            }
        } else if result.is_ok() {
            self.record_hit(Some(&key));
        }
        if initialized {
            slot.settle(&key, &cell);
        }
        result
    }

    fn derive_key(&self, instance: &T, args: &A) -> Result<CacheKey, MemoizeError> {
        if let Some(key) = (self.primitive_key)(args) {
            return Ok(key);
        }

        match self.hash_function {
            Some(hash_function) => Ok(CacheKey::Str(hash_function(instance, args))),
            None => {
                tracing::debug!(
                    slot = %self.slot,
                    arity = A::LEN,
                    "no hash function for non-primitive arguments"
                );
                Err(MemoizeError::MissingHashFunction { arity: A::LEN })
            }
        }
    }

    fn new_store(&self) -> Box<dyn CacheStore<R>> {
        match self.cache_factory {
            Some(cache_factory) => cache_factory(),
            None => Box::new(MapStore::new()),
        }
    }

    fn record_hit(&self, key: Option<&CacheKey>) {
        tracing::trace!(slot = %self.slot, key = ?key, "memoized hit");
        if let Some(stats) = self.stats {
            stats.record_hit();
        }
    }

    fn record_miss(&self, key: Option<&CacheKey>) {
        tracing::trace!(slot = %self.slot, key = ?key, "memoized miss");
        if let Some(stats) = self.stats {
            stats.record_miss();
        }
    }
}

fn lookup<R, S: CacheStore<R> + ?Sized>(store: &mut S, key: &CacheKey) -> Option<R> {
    if store.has(key) {
        store.get(key)
    } else {
        None
    }
}

enum DispatchError<E> {
    Memoize(MemoizeError),
    Operation(E),
}

impl<E> From<MemoizeError> for DispatchError<E> {
    fn from(err: MemoizeError) -> Self {
        DispatchError::Memoize(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Argument, BoundedStore, MemoSlots};
    use std::cell::Cell;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    #[derive(Default)]
    struct Owner {
        slots: MemoSlots,
    }

    impl Memoizable for Owner {
        fn memo_slots(&self) -> &MemoSlots {
            &self.slots
        }
    }

    #[derive(Debug)]
    struct User {
        id: u64,
        name: String,
    }

    impl Argument for User {}

    #[derive(Debug, PartialEq)]
    enum TestError {
        Memoize(MemoizeError),
        Failed,
    }

    impl From<MemoizeError> for TestError {
        fn from(err: MemoizeError) -> Self {
            TestError::Memoize(err)
        }
    }

    #[test]
    fn test_zero_arg_runs_once() {
        let owner = Owner::default();
        let token = SlotToken::allocate();
        let runs = Cell::new(0);

        for _ in 0..3 {
            let value = Dispatcher::<Owner, (), u32>::new(token)
                .call(&owner, (), |()| {
                    runs.set(runs.get() + 1);
                    7
                })
                .unwrap();
            assert_eq!(value, 7);
        }

        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn test_zero_arg_caches_falsy_values() {
        let owner = Owner::default();
        let token = SlotToken::allocate();
        let runs = Cell::new(0);

        for _ in 0..2 {
            let value = Dispatcher::<Owner, (), Option<u32>>::new(token)
                .call(&owner, (), |()| {
                    runs.set(runs.get() + 1);
                    None
                })
                .unwrap();
            assert_eq!(value, None);
        }

        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn test_primitive_key_hits() {
        let owner = Owner::default();
        let token = SlotToken::allocate();
        let runs = Cell::new(0);
        let greet = |name: &str| {
            Dispatcher::<Owner, (&str,), String>::new(token)
                .call(&owner, (name,), |(name,)| {
                    runs.set(runs.get() + 1);
                    format!("Hello, {}", name)
                })
                .unwrap()
        };

        assert_eq!(greet("Alice"), "Hello, Alice");
        assert_eq!(greet("Alice"), "Hello, Alice");
        assert_eq!(greet("Bob"), "Hello, Bob");
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn test_missing_hash_never_runs_original() {
        let owner = Owner::default();
        let token = SlotToken::allocate();
        let user = User {
            id: 1,
            name: "John".to_string(),
        };

        let result = Dispatcher::<Owner, (&User,), String>::new(token).call(&owner, (&user,), |_| {
            panic!("original must not run");
        });

        assert_eq!(result, Err(MemoizeError::MissingHashFunction { arity: 1 }));
        assert!(!owner.slots.contains(token));
    }

    #[test]
    fn test_hash_function_collapses_equal_keys() {
        let owner = Owner::default();
        let token = SlotToken::allocate();
        let runs = Cell::new(0);
        let hash = |_: &Owner, (user,): &(User,)| user.id.to_string();

        let greet = |user: User| {
            Dispatcher::<Owner, (User,), String>::new(token)
                .hash_function(&hash)
                .call(&owner, (user,), |(user,)| {
                    runs.set(runs.get() + 1);
                    format!("Hello, {}", user.name)
                })
                .unwrap()
        };

        let first = greet(User { id: 1, name: "John".to_string() });
        let second = greet(User { id: 1, name: "Johnny".to_string() });

        assert_eq!(first, "Hello, John");
        assert_eq!(second, "Hello, John");
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn test_multi_arg_requires_hash() {
        let owner = Owner::default();
        let result = Dispatcher::<Owner, (i32, i32), i32>::new(SlotToken::allocate())
            .call(&owner, (1, 2), |(a, b)| a * b);
        assert_eq!(result, Err(MemoizeError::MissingHashFunction { arity: 2 }));
    }

    #[test]
    fn test_errors_are_not_cached() {
        let owner = Owner::default();
        let token = SlotToken::allocate();
        let runs = Cell::new(0);
        let attempt = |fail: bool| {
            Dispatcher::<Owner, (u32,), u32>::new(token).try_call(&owner, (5,), |(n,)| {
                runs.set(runs.get() + 1);
                if fail {
                    Err(TestError::Failed)
                } else {
                    Ok(n * 2)
                }
            })
        };

        assert_eq!(attempt(true), Err(TestError::Failed));
        assert_eq!(attempt(false), Ok(10));
        assert_eq!(attempt(true), Ok(10));
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn test_zero_arg_errors_are_not_cached() {
        let owner = Owner::default();
        let token = SlotToken::allocate();
        let runs = Cell::new(0);
        let attempt = |fail: bool| {
            Dispatcher::<Owner, (), u32>::new(token).try_call(&owner, (), |()| {
                runs.set(runs.get() + 1);
                if fail {
                    Err(TestError::Failed)
                } else {
                    Ok(1)
                }
            })
        };

        assert_eq!(attempt(true), Err(TestError::Failed));
        assert_eq!(attempt(false), Ok(1));
        assert_eq!(attempt(true), Ok(1));
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn test_try_call_converts_memoize_errors() {
        let owner = Owner::default();
        let result: Result<u32, TestError> = Dispatcher::<Owner, (u8, u8), u32>::new(SlotToken::allocate())
            .try_call(&owner, (1, 1), |_| Ok(0));
        assert_eq!(
            result,
            Err(TestError::Memoize(MemoizeError::MissingHashFunction { arity: 2 }))
        );
    }

    #[test]
    fn test_custom_factory_called_once_per_instance() {
        let first = Owner::default();
        let second = Owner::default();
        let token = SlotToken::allocate();
        let created = Cell::new(0);
        let factory = || -> Box<dyn CacheStore<u32>> {
            created.set(created.get() + 1);
            Box::new(BoundedStore::lru(4))
        };

        for owner in [&first, &second] {
            for n in 0..3_u32 {
                Dispatcher::<Owner, (u32,), u32>::new(token)
                    .cache_factory(&factory)
                    .call(owner, (n,), |(n,)| n + 1)
                    .unwrap();
            }
        }

        assert_eq!(created.get(), 2);
    }

    #[test]
    fn test_stats_recorded() {
        let owner = Owner::default();
        let token = SlotToken::allocate();
        let stats = CacheStats::new();

        for _ in 0..3 {
            Dispatcher::<Owner, (bool,), bool>::new(token)
                .stats(&stats)
                .call(&owner, (true,), |(b,)| !b)
                .unwrap();
        }

        assert_eq!(stats.misses(), 1);
        assert_eq!(stats.hits(), 2);
    }

    #[test]
    fn test_instances_are_isolated() {
        let a = Owner::default();
        let b = Owner::default();
        let token = SlotToken::allocate();
        let runs = Cell::new(0);

        for owner in [&a, &b, &a, &b] {
            Dispatcher::<Owner, (), u8>::new(token)
                .call(owner, (), |()| {
                    runs.set(runs.get() + 1);
                    0
                })
                .unwrap();
        }

        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn test_concurrent_callers_share_one_run() {
        let owner = Owner::default();
        let token = SlotToken::allocate();
        let stats = CacheStats::new();
        let runs = AtomicUsize::new(0);
        let barrier = Barrier::new(4);

        let results: Vec<u64> = thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    scope.spawn(|| {
                        barrier.wait();
                        Dispatcher::<Owner, (u64,), u64>::new(token)
                            .stats(&stats)
                            .call(&owner, (3,), |(n,)| {
                                runs.fetch_add(1, Ordering::SeqCst);
                                thread::sleep(Duration::from_millis(50));
                                n * n
                            })
                            .unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(results, vec![9; 4]);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(stats.misses(), 1);
        assert_eq!(stats.hits(), 3);
    }

    #[test]
    fn test_concurrent_zero_arg_counts_one_miss() {
        let owner = Owner::default();
        let token = SlotToken::allocate();
        let stats = CacheStats::new();
        let runs = AtomicUsize::new(0);
        let barrier = Barrier::new(4);

        thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    barrier.wait();
                    Dispatcher::<Owner, (), u32>::new(token)
                        .stats(&stats)
                        .call(&owner, (), |()| {
                            runs.fetch_add(1, Ordering::SeqCst);
                            thread::sleep(Duration::from_millis(50));
                            1
                        })
                        .unwrap();
                });
            }
        });

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(stats.misses(), 1);
        assert_eq!(stats.hits(), 3);
    }

    #[test]
    fn test_recursion_through_the_same_slot() {
        fn fib(owner: &Owner, token: SlotToken, runs: &Cell<u32>, n: u64) -> u64 {
            Dispatcher::<Owner, (u64,), u64>::new(token)
                .call(owner, (n,), |(n,)| {
                    runs.set(runs.get() + 1);
                    if n < 2 {
                        n
                    } else {
                        fib(owner, token, runs, n - 1) + fib(owner, token, runs, n - 2)
                    }
                })
                .unwrap()
        }

        let owner = Owner::default();
        let runs = Cell::new(0);
        assert_eq!(fib(&owner, SlotToken::allocate(), &runs, 30), 832_040);
        assert_eq!(runs.get(), 31);
    }

    #[test]
    fn test_hashed_accepts_foreign_argument_types() {
        let owner = Owner::default();
        let token = SlotToken::allocate();
        let runs = Cell::new(0);
        let hash = |_: &Owner, (d,): &(Duration,)| d.as_millis().to_string();

        let label = |d: Duration| {
            Dispatcher::<Owner, (Duration,), String>::hashed(token)
                .hash_function(&hash)
                .call(&owner, (d,), |(d,)| {
                    runs.set(runs.get() + 1);
                    format!("{}ms", d.as_millis())
                })
                .unwrap()
        };

        assert_eq!(label(Duration::from_millis(1500)), "1500ms");
        assert_eq!(label(Duration::from_secs_f64(1.5)), "1500ms");
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn test_hashed_without_hash_function_fails() {
        let owner = Owner::default();
        let result = Dispatcher::<Owner, (u32,), u32>::hashed(SlotToken::allocate())
            .call(&owner, (1,), |(n,)| n);
        assert_eq!(result, Err(MemoizeError::MissingHashFunction { arity: 1 }));
    }
}
