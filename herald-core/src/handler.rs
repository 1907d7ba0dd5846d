//! Handler outcomes and callback identity.

use crate::error::BoxError;
use std::{
    any::TypeId,
    sync::atomic::{AtomicU64, Ordering},
};

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

/// Conversion of a handler's return value into success or failure.
///
/// Handlers return nothing, or a `Result<(), E>` to report a failure. A
/// failure is logged and isolated by the bus; it never reaches the producer.
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not a valid handler return type",
    label = "handlers must return `()` or `Result<(), E>`",
    note = "Handlers cannot return values; report failures with `Err`."
)]
pub trait IntoHandlerOutcome {
    /// Convert into the bus's outcome type.
    fn into_outcome(self) -> Result<(), BoxError>;
}

impl IntoHandlerOutcome for () {
    fn into_outcome(self) -> Result<(), BoxError> {
        Ok(())
    }
}

impl<E> IntoHandlerOutcome for Result<(), E>
where
    E: Into<BoxError>,
{
    fn into_outcome(self) -> Result<(), BoxError> {
        self.map_err(Into::into)
    }
}

/// Identity of the callback behind a registration.
///
/// Two registrations with the same owner and the same key (and declared
/// event type) are duplicates; the second attempt is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallbackKey {
    /// A declared handler method of a subscriber type.
    Method {
        /// The registering subscriber type.
        subscriber: TypeId,
        /// Method name.
        name: &'static str,
    },
    /// A capture-free closure or fn item, identified by its type.
    Closure(TypeId),
    /// A callback value with state, unique to one registration attempt.
    Instance(u64),
    /// An explicit caller-chosen token.
    Token(u64),
    /// A collected free function, identified by its path.
    Function(&'static str),
}

impl CallbackKey {
    /// Key of a dynamic callback of type `F`.
    ///
    /// A zero-sized `F` (a capture-free closure or a fn item) names exactly
    /// one function, so its type is its identity. Any other value (a
    /// capturing closure, a fn pointer, a boxed `dyn Fn`) gets a fresh key
    /// and never counts as a duplicate.
    pub fn of_callback<F: 'static>() -> Self {
        if size_of::<F>() == 0 {
            Self::Closure(TypeId::of::<F>())
        } else {
            Self::Instance(NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_is_success() {
        assert!(().into_outcome().is_ok());
    }

    #[test]
    fn test_result_error_is_boxed() {
        let failed: Result<(), std::io::Error> = Err(std::io::Error::other("shield offline"));
        let err = failed.into_outcome().unwrap_err();
        assert_eq!(err.to_string(), "shield offline");

        let from_str: Result<(), &str> = Err("boom");
        assert_eq!(from_str.into_outcome().unwrap_err().to_string(), "boom");
    }

    fn key_of<F: 'static>(_: &F) -> CallbackKey {
        CallbackKey::of_callback::<F>()
    }

    #[test]
    fn test_capture_free_keys_differ_by_type() {
        let a = |_: u8| ();
        let b = |_: u8| ();
        assert_eq!(key_of(&a), key_of(&a));
        assert_ne!(key_of(&a), key_of(&b));
        assert!(matches!(key_of(&a), CallbackKey::Closure(_)));
    }

    #[test]
    fn test_stateful_callbacks_are_never_equal() {
        let step = 2u8;
        let capturing = move |x: u8| x + step;
        assert_ne!(key_of(&capturing), key_of(&capturing));

        fn double(x: u8) -> u8 {
            x * 2
        }
        let pointer: fn(u8) -> u8 = double;
        assert!(matches!(key_of(&pointer), CallbackKey::Instance(_)));
        assert_eq!(key_of(&double), key_of(&double));
    }
}
