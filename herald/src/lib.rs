//! # herald - In-Process Event Bus
//!
//! `herald` delivers typed events, synchronously and in priority order, to
//! every handler whose declared event type matches the event. Handlers
//! declared for a parent event also receive its child events, and handler
//! failures never reach the producer.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use herald::prelude::*;
//!
//! #[derive(Event)]
//! struct Combat {
//!     #[event(state)]
//!     state: EventState,
//!     source: u32,
//! }
//!
//! #[derive(Event)]
//! struct Hit {
//!     #[event(parent)]
//!     combat: Combat,
//!     damage: f32,
//! }
//!
//! #[derive(Listener)]
//! struct Shield {
//!     #[listener(id)]
//!     id: ListenerId,
//! }
//!
//! #[handlers]
//! impl Shield {
//!     #[handler(priority = High)]
//!     fn absorb(&self, hit: &mut Hit) {
//!         hit.damage /= 2.0;
//!     }
//! }
//!
//! let shield = Arc::new(Shield { id: ListenerId::next() });
//! Bus::main().register_static(&shield)?;
//! let hit = Bus::main().dispatch(Hit::new(10.0))?;
//! ```
//!
//! ## Buses
//!
//! [`Bus::main`] is the process-wide bus. [`Bus::new`] and [`BusBuilder`]
//! create isolated buses; [`registry::all_buses`] lists the live ones.

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

pub use herald_core::{
    // Errors
    BoxError,
    BusError,
    // Identity
    CallbackKey,
    DeclKind,
    DiscoveryError,
    DispatchError,
    // Audit
    DispatchObserver,
    DispatchRecord,
    // Events
    Event,
    EventKind,
    EventState,
    FailureKind,
    HandlerDecl,
    HandlerFailure,
    // Declared handlers
    HandlerSet,
    HeraldError,
    IntoHandlerOutcome,
    InvokeFn,
    Listener,
    ListenerId,
    ParsePriorityError,
    Priority,
    Subscriber,
    TypeKey,
    impl_event,
    short_type_name,
};

#[doc(hidden)]
pub use herald_core::__event_body;

pub use herald_std::{
    Bus, BusBuilder, BusConfig, BusId, DrainReport, HandlerHandle, HandlerInfo, MAIN_BUS_NAME,
    ScopedListener, TracingObserver,
};

/// Handler discovery and its per-type cache.
pub mod discovery {
    pub use herald_std::discovery::{
        HandlerDescriptor, Resolution, cached_types, discover, is_cached, resolve,
    };
}

/// Enumeration of live buses.
pub mod registry {
    pub use herald_std::registry::{WeakBus, all_buses};
}

/// Testing utilities.
pub mod testing {
    #![allow(clippy::wildcard_imports)]
    pub use herald_std::testing::*;
}

/// Free-function handlers collected with `#[subscribe]`.
#[cfg(feature = "inventory")]
pub mod collected {
    pub use herald_std::collected::{CollectedHandler, collected_handlers, project};
}

/// Prelude module - common imports for Herald.
///
/// # Usage
///
/// ```rust,ignore
/// use herald::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        // Errors
        BoxError,
        // Buses
        Bus,
        BusBuilder,
        BusError,
        DispatchError,
        DispatchObserver,
        DispatchRecord,
        // Core traits
        Event,
        EventState,
        HandlerHandle,
        HandlerSet,
        Listener,
        ListenerId,
        Priority,
        ScopedListener,
        Subscriber,
    };

    #[cfg(feature = "macros")]
    pub use crate::{handler, handlers};

    #[cfg(all(feature = "macros", feature = "inventory"))]
    pub use crate::subscribe;
}

#[cfg(feature = "macros")]
pub use herald_macros::{Event, Listener, handler, handlers};

#[cfg(all(feature = "macros", feature = "inventory"))]
pub use herald_macros::subscribe;

#[cfg(feature = "inventory")]
pub use inventory;
