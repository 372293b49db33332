use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;
use std::sync::Arc;

/// A primitive value used to index a [`CacheStore`](crate::CacheStore).
///
/// Keys come from one of two places:
///
/// * a single primitive argument, converted through [`Argument::primitive_key`]
/// * the string returned by a configured hash function, stored as [`CacheKey::Str`]
///
/// Floats follow same-value-zero equality: `NaN` equals `NaN` and `-0.0`
/// equals `0.0`, so a float argument always finds its own cached result.
///
/// # Examples
///
/// ```
/// use memoslot_core::CacheKey;
///
/// assert_eq!(CacheKey::from("Alice"), CacheKey::Str("Alice".to_string()));
/// assert_eq!(CacheKey::from(f64::NAN), CacheKey::from(f64::NAN));
/// assert_eq!(CacheKey::from(-0.0_f64), CacheKey::from(0.0_f64));
/// assert_ne!(CacheKey::from(1_i64), CacheKey::from("1"));
/// ```
#[derive(Clone, Debug)]
pub enum CacheKey {
    Null,
    Bool(bool),
    Int(i128),
    /// Unsigned integers above `i128::MAX`.
    Wide(u128),
    Float(f64),
    Char(char),
    Str(String),
}

impl CacheKey {
    fn float_bits(value: f64) -> u64 {
        if value.is_nan() {
            f64::NAN.to_bits()
        } else if value == 0.0 {
            0.0_f64.to_bits()
        } else {
            value.to_bits()
        }
    }
}

impl PartialEq for CacheKey {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (CacheKey::Null, CacheKey::Null) => true,
            (CacheKey::Bool(a), CacheKey::Bool(b)) => a == b,
            (CacheKey::Int(a), CacheKey::Int(b)) => a == b,
            (CacheKey::Wide(a), CacheKey::Wide(b)) => a == b,
            (CacheKey::Float(a), CacheKey::Float(b)) => {
                CacheKey::float_bits(*a) == CacheKey::float_bits(*b)
            }
            (CacheKey::Char(a), CacheKey::Char(b)) => a == b,
            (CacheKey::Str(a), CacheKey::Str(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for CacheKey {}

impl Hash for CacheKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            CacheKey::Null => {}
            CacheKey::Bool(b) => b.hash(state),
            CacheKey::Int(i) => i.hash(state),
            CacheKey::Wide(i) => i.hash(state),
            CacheKey::Float(f) => CacheKey::float_bits(*f).hash(state),
            CacheKey::Char(c) => c.hash(state),
            CacheKey::Str(s) => s.hash(state),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Null => f.write_str("null"),
            CacheKey::Bool(b) => write!(f, "{}", b),
            CacheKey::Int(i) => write!(f, "{}", i),
            CacheKey::Wide(i) => write!(f, "{}", i),
            CacheKey::Float(x) => write!(f, "{}", x),
            CacheKey::Char(c) => write!(f, "{:?}", c),
            CacheKey::Str(s) => write!(f, "{:?}", s),
        }
    }
}

impl From<&str> for CacheKey {
    fn from(s: &str) -> Self {
        CacheKey::Str(s.to_string())
    }
}

impl From<String> for CacheKey {
    fn from(s: String) -> Self {
        CacheKey::Str(s)
    }
}

impl From<bool> for CacheKey {
    fn from(b: bool) -> Self {
        CacheKey::Bool(b)
    }
}

impl From<char> for CacheKey {
    fn from(c: char) -> Self {
        CacheKey::Char(c)
    }
}

impl From<f64> for CacheKey {
    fn from(x: f64) -> Self {
        CacheKey::Float(x)
    }
}

impl From<f32> for CacheKey {
    fn from(x: f32) -> Self {
        CacheKey::Float(f64::from(x))
    }
}

macro_rules! int_cache_key {
    ($($t:ty),*) => {
        $(
            impl From<$t> for CacheKey {
                fn from(i: $t) -> Self {
                    CacheKey::Int(i128::from(i))
                }
            }

            impl Argument for $t {
                fn primitive_key(&self) -> Option<CacheKey> {
                    Some(CacheKey::from(*self))
                }
            }
        )*
    };
}

int_cache_key!(i8, i16, i32, i64, i128, u8, u16, u32, u64);

impl From<u128> for CacheKey {
    fn from(i: u128) -> Self {
        match i128::try_from(i) {
            Ok(i) => CacheKey::Int(i),
            Err(_) => CacheKey::Wide(i),
        }
    }
}

impl From<isize> for CacheKey {
    fn from(i: isize) -> Self {
        // isize is at most 64 bits wide on every supported target
        CacheKey::Int(i as i128)
    }
}

impl From<usize> for CacheKey {
    fn from(i: usize) -> Self {
        CacheKey::Int(i as i128)
    }
}

/// A single argument of a memoized operation.
///
/// Primitive types report themselves as a [`CacheKey`], which lets a
/// one-argument operation be cached without a hash function. Every other type
/// keeps the default implementation and opts in with an empty impl, the same
/// way it would declare any marker trait:
///
/// ```
/// use memoslot_core::{Argument, CacheKey};
///
/// struct User {
///     id: u64,
/// }
///
/// impl Argument for User {}
///
/// assert_eq!(User { id: 1 }.primitive_key(), None);
/// assert_eq!("Alice".primitive_key(), Some(CacheKey::from("Alice")));
/// assert_eq!(None::<u32>.primitive_key(), Some(CacheKey::Null));
/// ```
///
/// A non-primitive argument needs a hash function; without one the call
/// fails with [`MemoizeError::MissingHashFunction`](crate::MemoizeError::MissingHashFunction).
pub trait Argument {
    /// Returns the cache key for a primitive value, `None` otherwise.
    fn primitive_key(&self) -> Option<CacheKey> {
        None
    }
}

macro_rules! primitive_argument {
    ($($t:ty),*) => {
        $(
            impl Argument for $t {
                fn primitive_key(&self) -> Option<CacheKey> {
                    Some(CacheKey::from(*self))
                }
            }
        )*
    };
}

primitive_argument!(u128, isize, usize, bool, char, f32, f64);

impl Argument for str {
    fn primitive_key(&self) -> Option<CacheKey> {
        Some(CacheKey::from(self))
    }
}

impl Argument for String {
    fn primitive_key(&self) -> Option<CacheKey> {
        Some(CacheKey::Str(self.clone()))
    }
}

impl Argument for () {
    fn primitive_key(&self) -> Option<CacheKey> {
        Some(CacheKey::Null)
    }
}

impl<T: Argument> Argument for Option<T> {
    fn primitive_key(&self) -> Option<CacheKey> {
        match self {
            Some(value) => value.primitive_key(),
            None => Some(CacheKey::Null),
        }
    }
}

impl<T: Argument + ?Sized> Argument for &T {
    fn primitive_key(&self) -> Option<CacheKey> {
        (**self).primitive_key()
    }
}

impl<T: Argument + ?Sized> Argument for &mut T {
    fn primitive_key(&self) -> Option<CacheKey> {
        (**self).primitive_key()
    }
}

impl<T: Argument + ?Sized> Argument for Box<T> {
    fn primitive_key(&self) -> Option<CacheKey> {
        (**self).primitive_key()
    }
}

impl<T: Argument + ?Sized> Argument for Arc<T> {
    fn primitive_key(&self) -> Option<CacheKey> {
        (**self).primitive_key()
    }
}

impl<T: Argument + ?Sized> Argument for Rc<T> {
    fn primitive_key(&self) -> Option<CacheKey> {
        (**self).primitive_key()
    }
}

impl<T> Argument for Vec<T> {}

impl<T> Argument for [T] {}

/// The full argument list of a memoized operation, as a tuple.
///
/// Implemented for `()` and tuples of up to eight elements of any type. The
/// empty tuple selects the zero-argument strategy; any other arity selects
/// the keyed strategy.
///
/// ```
/// use memoslot_core::Args;
///
/// assert_eq!(<() as Args>::LEN, 0);
/// assert_eq!(<(std::time::Duration,) as Args>::LEN, 1);
/// ```
pub trait Args {
    /// Number of arguments.
    const LEN: usize;
}

/// Argument lists that can tell whether they are a single primitive.
///
/// Only a one-element tuple of a primitive [`Argument`] produces a key on
/// its own; every other shape, including multi-argument tuples of any type,
/// reports `None`.
///
/// # Examples
///
/// ```
/// use memoslot_core::{CacheKey, PrimitiveArgs};
///
/// assert_eq!(("Bob",).primitive_key(), Some(CacheKey::from("Bob")));
/// assert_eq!((4, 6).primitive_key(), None);
/// ```
pub trait PrimitiveArgs: Args {
    /// Key of a single primitive argument; `None` for every other shape.
    fn primitive_key(&self) -> Option<CacheKey>;
}

/// Key deriver for argument lists that are never their own key.
pub(crate) fn no_primitive_key<A>(_: &A) -> Option<CacheKey> {
    None
}

impl Args for () {
    const LEN: usize = 0;
}

impl PrimitiveArgs for () {
    fn primitive_key(&self) -> Option<CacheKey> {
        None
    }
}

impl<A> Args for (A,) {
    const LEN: usize = 1;
}

impl<A: Argument> PrimitiveArgs for (A,) {
    fn primitive_key(&self) -> Option<CacheKey> {
        self.0.primitive_key()
    }
}

macro_rules! multi_args {
    ($len:expr; $($name:ident),+) => {
        impl<$($name),+> Args for ($($name,)+) {
            const LEN: usize = $len;
        }

        impl<$($name),+> PrimitiveArgs for ($($name,)+) {
            fn primitive_key(&self) -> Option<CacheKey> {
                None
            }
        }
    };
}

multi_args!(2; A, B);
multi_args!(3; A, B, C);
multi_args!(4; A, B, C, D);
multi_args!(5; A, B, C, D, E);
multi_args!(6; A, B, C, D, E, F);
multi_args!(7; A, B, C, D, E, F, G);
multi_args!(8; A, B, C, D, E, F, G, H);
