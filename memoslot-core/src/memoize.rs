use std::fmt;
use std::sync::Arc;

use crate::cache_key::no_primitive_key;
use crate::{
    Args, CacheKey, CacheStats, CacheStore, Dispatcher, Memoizable, MemoizeError, PrimitiveArgs,
    SlotToken,
};

type HashFunction<T, A> = dyn Fn(&T, &A) -> String + Send + Sync;
type CacheFactory<R> = dyn Fn() -> Box<dyn CacheStore<R>> + Send + Sync;
type Operation<T, A, R> = dyn Fn(&T, A) -> R + Send + Sync;
type PrimitiveKey<A> = fn(&A) -> Option<CacheKey>;

/// The kind of member a memoizing wrapper is attached to.
///
/// Only methods and getters can be memoized; everything else is rejected by
/// [`Memoize::attach`] before any instance exists.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MemberKind {
    /// A method taking zero or more arguments.
    Method,
    /// A value-producing accessor without arguments.
    Getter,
    /// An accessor that stores a value and returns nothing.
    Setter,
    /// A plain data field.
    Field,
    /// A type (struct, enum, trait...) as a whole.
    Type,
}

impl MemberKind {
    pub fn is_memoizable(self) -> bool {
        matches!(self, MemberKind::Method | MemberKind::Getter)
    }
}

impl fmt::Display for MemberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MemberKind::Method => "method",
            MemberKind::Getter => "get accessor",
            MemberKind::Setter => "set accessor",
            MemberKind::Field => "field",
            MemberKind::Type => "type",
        };
        f.write_str(name)
    }
}

/// Configuration of a memoized member.
///
/// * `hash_function` derives the cache key from the instance and the
///   arguments when they are not a single primitive. It must be
///   deterministic: equal logical inputs have to produce equal strings.
/// * `cache_factory` builds the per-instance [`CacheStore`]; it runs once
///   per instance, on the first call with arguments. Defaults to an unbounded
///   [`MapStore`](crate::MapStore).
///
/// Any `Fn(&T, &A) -> String` converts into `Options` with that hash
/// function and the default cache factory.
///
/// # Examples
///
/// ```
/// use memoslot_core::{BoundedStore, Options};
///
/// struct Calculator;
///
/// let options: Options<Calculator, (i64, i64), i64> = Options::new()
///     .hash_function(|_: &Calculator, (a, b): &(i64, i64)| format!("{}:{}", a, b))
///     .cache_factory(|| BoundedStore::lru(128));
///
/// assert!(options.has_hash_function());
/// ```
pub struct Options<T: ?Sized, A, R> {
    hash_function: Option<Arc<HashFunction<T, A>>>,
    cache_factory: Option<Arc<CacheFactory<R>>>,
}

impl<T: ?Sized, A, R> Options<T, A, R> {
    pub fn new() -> Self {
        Self {
            hash_function: None,
            cache_factory: None,
        }
    }

    pub fn hash_function<F>(mut self, hash_function: F) -> Self
    where
        F: Fn(&T, &A) -> String + Send + Sync + 'static,
    {
        self.hash_function = Some(Arc::new(hash_function));
        self
    }

    pub fn cache_factory<F, S>(mut self, cache_factory: F) -> Self
    where
        F: Fn() -> S + Send + Sync + 'static,
        S: CacheStore<R> + 'static,
    {
        self.cache_factory = Some(Arc::new(move || Box::new(cache_factory()) as Box<dyn CacheStore<R>>));
        self
    }

    pub fn has_hash_function(&self) -> bool {
        self.hash_function.is_some()
    }

    pub fn has_cache_factory(&self) -> bool {
        self.cache_factory.is_some()
    }
}

impl<T: ?Sized, A, R> Default for Options<T, A, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized, A, R> Clone for Options<T, A, R> {
    fn clone(&self) -> Self {
        Self {
            hash_function: self.hash_function.clone(),
            cache_factory: self.cache_factory.clone(),
        }
    }
}

impl<T: ?Sized, A, R> fmt::Debug for Options<T, A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("hash_function", &self.has_hash_function())
            .field("cache_factory", &self.has_cache_factory())
            .finish()
    }
}

impl<T: ?Sized, A, R, F> From<F> for Options<T, A, R>
where
    F: Fn(&T, &A) -> String + Send + Sync + 'static,
{
    fn from(hash_function: F) -> Self {
        Options::new().hash_function(hash_function)
    }
}

/// Factory that turns an operation into its memoized replacement.
///
/// `attach` is where the member kind is validated and where the member's
/// [`SlotToken`] is allocated. [`new`](Self::new) and
/// [`with_options`](Self::with_options) key a single primitive argument by
/// itself and need [`PrimitiveArgs`]; [`hashed`](Self::hashed) accepts any
/// argument types and takes every key from the hash function.
///
/// The member's the returned [`Memoized`] is usually kept in a
/// `static` next to the type so that every instance shares the token while
/// keeping its own cached values.
///
/// # Examples
///
/// ```
/// use memoslot_core::{Memoizable, Memoize, MemoSlots, Memoized};
/// use once_cell::sync::Lazy;
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
/// static GREETING: Lazy<Memoized<Greeter, (String,), String>> =
///     Lazy::new(|| {
///         Memoize::<Greeter, (String,), String>::new()
///             .method(|_, (name,)| format!("Hello, {}", name))
///     });
///
/// let greeter = Greeter::default();
/// let greeting = GREETING.call(&greeter, ("John".to_string(),)).unwrap();
/// assert_eq!(greeting, "Hello, John");
/// ```
pub struct Memoize<T: ?Sized, A, R> {
    options: Options<T, A, R>,
    primitive_key: PrimitiveKey<A>,
}

impl<T, A, R> Memoize<T, A, R>
where
    T: Memoizable + ?Sized,
    A: PrimitiveArgs,
    R: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::with_options(Options::new())
    }

    /// Uses `options`, or a bare hash function as shorthand for options with
    /// only a hash function.
    pub fn with_options(options: impl Into<Options<T, A, R>>) -> Self {
        Self {
            options: options.into(),
            primitive_key: <A as PrimitiveArgs>::primitive_key,
        }
    }
}

impl<T, A, R> Memoize<T, A, R>
where
    T: Memoizable + ?Sized,
    A: Args,
    R: Clone + Send + Sync + 'static,
{
    /// Like [`with_options`](Self::with_options) for argument types without
    /// an [`Argument`](crate::Argument) impl, such as `Duration` or
    /// `PathBuf`. Keys always come from the hash function.
    pub fn hashed(options: impl Into<Options<T, A, R>>) -> Self {
        Self {
            options: options.into(),
            primitive_key: no_primitive_key::<A>,
        }
    }

    /// Wraps `original` as a member of the given kind.
    ///
    /// Fails with [`MemoizeError::InvalidTarget`] unless `kind` is
    /// [`MemberKind::Method`] or [`MemberKind::Getter`], and with
    /// [`MemoizeError::GetterArguments`] for a getter whose argument list is
    /// not empty.
    pub fn attach<F>(self, kind: MemberKind, original: F) -> Result<Memoized<T, A, R>, MemoizeError>
    where
        F: Fn(&T, A) -> R + Send + Sync + 'static,
    {
        if !kind.is_memoizable() {
            tracing::debug!(%kind, "refusing to memoize");
            return Err(MemoizeError::InvalidTarget { kind });
        }
        if kind == MemberKind::Getter && A::LEN != 0 {
            tracing::debug!(arity = A::LEN, "refusing to memoize getter with arguments");
            return Err(MemoizeError::GetterArguments { arity: A::LEN });
        }

        Ok(self.build(kind, Arc::new(original)))
    }

    pub fn method<F>(self, original: F) -> Memoized<T, A, R>
    where
        F: Fn(&T, A) -> R + Send + Sync + 'static,
    {
        self.build(MemberKind::Method, Arc::new(original))
    }

    fn build(self, kind: MemberKind, original: Arc<Operation<T, A, R>>) -> Memoized<T, A, R> {
        Memoized {
            slot: SlotToken::allocate(),
            kind,
            options: self.options,
            primitive_key: self.primitive_key,
            original,
            stats: CacheStats::new(),
        }
    }
}

impl<T, R> Memoize<T, (), R>
where
    T: Memoizable + ?Sized,
    R: Clone + Send + Sync + 'static,
{
    pub fn getter<F>(self, original: F) -> Memoized<T, (), R>
    where
        F: Fn(&T) -> R + Send + Sync + 'static,
    {
        self.build(MemberKind::Getter, Arc::new(move |instance: &T, ()| original(instance)))
    }
}

impl<T, A, R> Default for Memoize<T, A, R>
where
    T: Memoizable + ?Sized,
    A: PrimitiveArgs,
    R: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

/// A memoized member: the replacement for the original operation.
///
/// Calls go through a [`Dispatcher`] using the member's slot token and
/// options; the original operation only runs on a miss.
pub struct Memoized<T: ?Sized, A, R> {
    slot: SlotToken,
    kind: MemberKind,
    options: Options<T, A, R>,
    primitive_key: PrimitiveKey<A>,
    original: Arc<Operation<T, A, R>>,
    stats: CacheStats,
}

impl<T, A, R> Memoized<T, A, R>
where
    T: Memoizable + ?Sized,
    A: Args,
    R: Clone + Send + Sync + 'static,
{
    /// Invokes the member on `instance`.
    pub fn call(&self, instance: &T, args: A) -> Result<R, MemoizeError> {
        let mut dispatcher: Dispatcher<'_, T, A, R> =
            Dispatcher::with_primitive_keys(self.slot, self.primitive_key).stats(&self.stats);
        if let Some(hash_function) = &self.options.hash_function {
            dispatcher = dispatcher.hash_function(&**hash_function);
        }
        if let Some(cache_factory) = &self.options.cache_factory {
            dispatcher = dispatcher.cache_factory(&**cache_factory);
        }

        dispatcher.call(instance, args, |args| (self.original)(instance, args))
    }

    pub fn slot(&self) -> SlotToken {
        self.slot
    }

    pub fn kind(&self) -> MemberKind {
        self.kind
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }
}

impl<T, R> Memoized<T, (), R>
where
    T: Memoizable + ?Sized,
    R: Clone + Send + Sync + 'static,
{
    /// Reads the getter on `instance`.
    pub fn get(&self, instance: &T) -> Result<R, MemoizeError> {
        self.call(instance, ())
    }
}

impl<T: ?Sized, A, R> fmt::Debug for Memoized<T, A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memoized")
            .field("slot", &self.slot)
            .field("kind", &self.kind)
            .field("options", &self.options)
            .finish()
    }
}
