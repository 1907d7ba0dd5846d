//! Owner identity for registrations.

use crate::event::short_type_name;
use std::{
    any::type_name,
    borrow::Cow,
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identity of a registration owner.
///
/// Buses use it to de-duplicate registrations, to unregister everything an
/// owner registered, and to exclude an owner from its own dispatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Owner of handlers collected from free functions.
    pub const COLLECTED: ListenerId = ListenerId(0);

    /// Allocate a fresh, process-unique id.
    pub fn next() -> Self {
        Self(NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw value.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::next()
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener#{}", self.0)
    }
}

/// An object that owns handler registrations.
///
/// Implement it with `#[derive(Listener)]` on a struct holding a
/// [`ListenerId`].
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not a Listener",
    label = "missing `Listener` implementation",
    note = "Derive `Listener` and mark a `ListenerId` field with `#[listener(id)]`."
)]
pub trait Listener: Send + Sync {
    /// Identity used for de-duplication and bulk unregistration.
    fn listener_id(&self) -> ListenerId;

    /// Name shown in diagnostics.
    fn debug_name(&self) -> Cow<'static, str> {
        Cow::Borrowed(short_type_name(type_name::<Self>()))
    }
}

impl<L: Listener + ?Sized> Listener for Arc<L> {
    fn listener_id(&self) -> ListenerId {
        (**self).listener_id()
    }

    fn debug_name(&self) -> Cow<'static, str> {
        (**self).debug_name()
    }
}

impl<L: Listener + ?Sized> Listener for Box<L> {
    fn listener_id(&self) -> ListenerId {
        (**self).listener_id()
    }

    fn debug_name(&self) -> Cow<'static, str> {
        (**self).debug_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Turret {
        id: ListenerId,
    }

    impl Listener for Turret {
        fn listener_id(&self) -> ListenerId {
            self.id
        }
    }

    #[test]
    fn test_ids_are_unique() {
        let a = ListenerId::next();
        let b = ListenerId::next();
        assert_ne!(a, b);
        assert_ne!(a, ListenerId::COLLECTED);
    }

    #[test]
    fn test_default_debug_name() {
        let turret = Turret {
            id: ListenerId::default(),
        };
        assert_eq!(turret.debug_name(), "Turret");

        let shared = Arc::new(turret);
        assert_eq!(shared.listener_id(), shared.id);
        assert_eq!(Listener::debug_name(&shared), "Turret");
    }
}
