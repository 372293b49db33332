use thiserror::Error;

use crate::{MemberKind, SlotToken};

/// Errors raised while attaching or dispatching a memoized operation.
///
/// None of these are recoverable from inside the wrapper: they are returned
/// to the caller as-is and the original operation is never invoked on an
/// error path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoizeError {
    /// The wrapper was attached to something other than a method or a getter.
    #[error("Only put a Memoize() decorator on a method or get accessor.")]
    InvalidTarget { kind: MemberKind },

    /// A call needs a key but its arguments cannot produce one.
    #[error(
        "You are applying memoization to a method that accepts arguments of non-primitive types ({arity} argument(s)). \n\
         Please provide an explicit hash function that deterministically converts arguments \n\
         to a primitive type, like so: #[memoize(hash = |u: &User, c: &Company| format!(\"{{}}:{{}}\", u.id, c.id))]"
    )]
    MissingHashFunction { arity: usize },

    /// A getter was attached to an operation that takes arguments.
    #[error("a get accessor takes no arguments, this one takes {arity}")]
    GetterArguments { arity: usize },

    /// A storage slot already holds a value of a different type.
    #[error("storage slot {slot} already holds a value of a different type")]
    SlotTypeMismatch { slot: SlotToken },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_target_message() {
        let err = MemoizeError::InvalidTarget {
            kind: MemberKind::Setter,
        };
        assert_eq!(
            err.to_string(),
            "Only put a Memoize() decorator on a method or get accessor."
        );
    }

    #[test]
    fn test_missing_hash_message_explains_fix() {
        let msg = MemoizeError::MissingHashFunction { arity: 2 }.to_string();
        assert!(msg.contains("non-primitive types"));
        assert!(msg.contains("explicit hash function"));
        assert!(msg.contains("#[memoize(hash = |u: &User, c: &Company| format!(\"{}:{}\", u.id, c.id))]"));
    }
}
