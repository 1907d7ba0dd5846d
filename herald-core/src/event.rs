//! Event contract and type-hierarchy matching.
//!
//! Every dispatchable type implements [`Event`]. An event embeds an
//! [`EventState`] (cancellation flag and one-shot dispatch marker) either
//! directly or through a *parent* event field. The parent relation is what
//! handler matching treats as subtyping: a handler declared for a parent
//! event also receives every child event, and a handler declared for
//! `dyn Event` receives everything.
//!
//! # Example
//!
//! ```rust,ignore
//! struct CombatEvent { state: EventState, source: u32 }
//! impl_event!(CombatEvent { state: state });
//!
//! struct HitEvent { base: CombatEvent, damage: f32 }
//! impl_event!(HitEvent { parent: base: CombatEvent });
//! ```

use std::{
    any::{Any, TypeId, type_name},
    fmt,
    hash::{Hash, Hasher},
};

/// Cancellation flag and dispatch marker carried by every event.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EventState {
    cancelled: bool,
    dispatched: bool,
}

impl EventState {
    /// A fresh, undispatched and uncancelled state.
    pub const fn new() -> Self {
        Self {
            cancelled: false,
            dispatched: false,
        }
    }

    /// Whether a producer or handler flagged the event as cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Set or clear the cancellation flag.
    pub fn set_cancelled(&mut self, cancelled: bool) {
        self.cancelled = cancelled;
    }

    /// Whether the event was handed to a bus.
    pub fn has_been_dispatched(&self) -> bool {
        self.dispatched
    }

    /// Set the dispatch marker. Returns `false` if it was already set.
    ///
    /// Buses call this exactly once per event, before any handler runs.
    pub fn begin_dispatch(&mut self) -> bool {
        !std::mem::replace(&mut self.dispatched, true)
    }
}

/// Identifies a declared event type: a `TypeId` plus its name for diagnostics.
///
/// Equality and hashing only consider the `TypeId`.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// The key of `T`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    /// The key of `dyn Event`, the root of every event hierarchy.
    pub fn root() -> Self {
        Self::of::<dyn Event>()
    }

    /// Whether this is the root key.
    pub fn is_root(&self) -> bool {
        self.id == TypeId::of::<dyn Event>()
    }

    /// The underlying `TypeId`.
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Full type name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Type name without its module path.
    pub fn short_name(&self) -> &'static str {
        short_type_name(self.name)
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeKey({})", self.name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// Strip the module path from a type name, keeping generic arguments intact.
pub fn short_type_name(name: &'static str) -> &'static str {
    let end = name.find('<').unwrap_or(name.len());
    match name[..end].rfind("::") {
        Some(pos) => &name[pos + 2..],
        None => name,
    }
}

/// The data contract of every dispatchable message.
///
/// Implement it with [`impl_event!`](crate::impl_event) or
/// `#[derive(Event)]` rather than by hand.
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not an Event",
    label = "missing `Event` implementation",
    note = "Derive `Event` with an `#[event(state)]` or `#[event(parent)]` field."
)]
pub trait Event: Any + Send {
    /// The embedded state.
    fn state(&self) -> &EventState;

    /// The embedded state, mutably.
    fn state_mut(&mut self) -> &mut EventState;

    /// View this event as `target`, which must be its own type or an ancestor.
    fn upcast_ref(&self, target: TypeId) -> Option<&dyn Any>;

    /// View this event as `target`, which must be its own type or an ancestor.
    fn upcast_mut(&mut self, target: TypeId) -> Option<&mut dyn Any>;

    /// Keys of this type followed by its ancestors, nearest first.
    fn lineage() -> Vec<TypeKey>
    where
        Self: Sized;

    /// Type name, for diagnostics.
    fn event_name(&self) -> &'static str {
        type_name::<Self>()
    }

    /// Whether the event was flagged as cancelled.
    fn is_cancelled(&self) -> bool {
        self.state().is_cancelled()
    }

    /// Set or clear the cancellation flag.
    fn set_cancelled(&mut self, cancelled: bool) {
        self.state_mut().set_cancelled(cancelled);
    }

    /// Flag the event as cancelled.
    fn cancel(&mut self) {
        self.set_cancelled(true);
    }

    /// Whether the event was handed to a bus.
    fn has_been_dispatched(&self) -> bool {
        self.state().has_been_dispatched()
    }

    /// Whether a handler declared for `key` accepts this event.
    fn is_a(&self, key: TypeKey) -> bool {
        key.is_root() || self.upcast_ref(key.id()).is_some()
    }
}

/// A type a handler can be declared for: any [`Event`], or `dyn Event`.
pub trait EventKind: 'static {
    /// Key of the declared type.
    fn key() -> TypeKey;

    /// Keys of every type a handler must be declared for to receive this
    /// type: itself, its ancestors and the root.
    fn hierarchy() -> Vec<TypeKey>;

    /// Project a dispatched event onto this type.
    fn project_mut<'a>(event: &'a mut (dyn Event + 'static)) -> Option<&'a mut Self>;

    /// Project a dispatched event onto this type.
    fn project_ref<'a>(event: &'a (dyn Event + 'static)) -> Option<&'a Self>;
}

impl<E: Event> EventKind for E {
    fn key() -> TypeKey {
        TypeKey::of::<E>()
    }

    fn hierarchy() -> Vec<TypeKey> {
        let mut keys = <E as Event>::lineage();
        keys.push(TypeKey::root());
        keys
    }

    fn project_mut<'a>(event: &'a mut (dyn Event + 'static)) -> Option<&'a mut Self> {
        event.upcast_mut(TypeId::of::<E>())?.downcast_mut::<E>()
    }

    fn project_ref<'a>(event: &'a (dyn Event + 'static)) -> Option<&'a Self> {
        event.upcast_ref(TypeId::of::<E>())?.downcast_ref::<E>()
    }
}

impl EventKind for dyn Event {
    fn key() -> TypeKey {
        TypeKey::root()
    }

    fn hierarchy() -> Vec<TypeKey> {
        vec![TypeKey::root()]
    }

    fn project_mut<'a>(event: &'a mut (dyn Event + 'static)) -> Option<&'a mut Self> {
        Some(event)
    }

    fn project_ref<'a>(event: &'a (dyn Event + 'static)) -> Option<&'a Self> {
        Some(event)
    }
}

/// Implement [`Event`] for a struct.
///
/// - `impl_event!(Ty { state: field })` for a root event embedding its
///   [`EventState`] in `field`.
/// - `impl_event!(Ty { parent: field: ParentTy })` for an event extending
///   `ParentTy`, stored in `field`.
#[macro_export]
macro_rules! impl_event {
    ($ty:ty { state: $field:ident }) => {
        impl $crate::Event for $ty {
            $crate::__event_body!(state: $field);
        }
    };
    ($ty:ty { parent: $field:ident : $parent:ty }) => {
        impl $crate::Event for $ty {
            $crate::__event_body!(parent: $field: $parent);
        }
    };
}

/// The `Event` items shared by [`impl_event!`] and `#[derive(Event)]`.
#[doc(hidden)]
#[macro_export]
macro_rules! __event_body {
    (state: $field:ident) => {
        fn state(&self) -> &$crate::EventState {
            &self.$field
        }

        fn state_mut(&mut self) -> &mut $crate::EventState {
            &mut self.$field
        }

        fn upcast_ref(
            &self,
            target: ::std::any::TypeId,
        ) -> ::std::option::Option<&dyn ::std::any::Any> {
            if target == ::std::any::TypeId::of::<Self>() {
                ::std::option::Option::Some(self)
            } else {
                ::std::option::Option::None
            }
        }

        fn upcast_mut(
            &mut self,
            target: ::std::any::TypeId,
        ) -> ::std::option::Option<&mut dyn ::std::any::Any> {
            if target == ::std::any::TypeId::of::<Self>() {
                ::std::option::Option::Some(self)
            } else {
                ::std::option::Option::None
            }
        }

        fn lineage() -> ::std::vec::Vec<$crate::TypeKey> {
            ::std::vec![$crate::TypeKey::of::<Self>()]
        }
    };
    (parent: $field:ident : $parent:ty) => {
        fn state(&self) -> &$crate::EventState {
            $crate::Event::state(&self.$field)
        }

        fn state_mut(&mut self) -> &mut $crate::EventState {
            $crate::Event::state_mut(&mut self.$field)
        }

        fn upcast_ref(
            &self,
            target: ::std::any::TypeId,
        ) -> ::std::option::Option<&dyn ::std::any::Any> {
            if target == ::std::any::TypeId::of::<Self>() {
                ::std::option::Option::Some(self)
            } else {
                $crate::Event::upcast_ref(&self.$field, target)
            }
        }

        fn upcast_mut(
            &mut self,
            target: ::std::any::TypeId,
        ) -> ::std::option::Option<&mut dyn ::std::any::Any> {
            if target == ::std::any::TypeId::of::<Self>() {
                ::std::option::Option::Some(self)
            } else {
                $crate::Event::upcast_mut(&mut self.$field, target)
            }
        }

        fn lineage() -> ::std::vec::Vec<$crate::TypeKey> {
            let mut keys = ::std::vec![$crate::TypeKey::of::<Self>()];
            keys.extend(<$parent as $crate::Event>::lineage());
            keys
        }
    };
}
