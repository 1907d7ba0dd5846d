//! Scoped registration of a subscriber.

use crate::bus::Bus;
use herald_core::{BusError, Listener, Subscriber};
use std::{fmt, ops::Deref, sync::Arc};

/// Keeps a subscriber's declared handlers registered on a bus for as long
/// as the guard lives.
///
/// Dropping the guard removes every registration the subscriber owns on
/// that bus, dynamic ones included.
///
/// # Example
///
/// ```rust,ignore
/// let hud = ScopedListener::new(Bus::main(), Hud::default())?;
/// // ... `hud` receives events ...
/// drop(hud); // unregistered
/// ```
pub struct ScopedListener<S: Subscriber + Listener> {
    bus: Bus,
    subscriber: Arc<S>,
}

impl<S: Subscriber + Listener> ScopedListener<S> {
    /// Register `subscriber` on `bus`.
    pub fn new(bus: &Bus, subscriber: S) -> Result<Self, BusError> {
        Self::from_arc(bus, Arc::new(subscriber))
    }

    /// Register an already shared subscriber on `bus`.
    pub fn from_arc(bus: &Bus, subscriber: Arc<S>) -> Result<Self, BusError> {
        bus.register_static(&subscriber)?;
        Ok(Self {
            bus: bus.clone(),
            subscriber,
        })
    }

    /// The bus the subscriber is registered on.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// The shared subscriber.
    pub fn subscriber(&self) -> &Arc<S> {
        &self.subscriber
    }
}

impl<S: Subscriber + Listener> Deref for ScopedListener<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.subscriber
    }
}

impl<S: Subscriber + Listener> Drop for ScopedListener<S> {
    fn drop(&mut self) {
        self.bus.unregister_all(&*self.subscriber);
    }
}

impl<S: Subscriber + Listener> fmt::Debug for ScopedListener<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedListener")
            .field("bus", &self.bus.name())
            .field("subscriber", &self.subscriber.debug_name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_core::{EventState, HandlerSet, ListenerId, impl_event};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Tick {
        state: EventState,
    }
    impl_event!(Tick { state: state });

    struct Clock {
        id: ListenerId,
        ticks: AtomicUsize,
    }

    impl Listener for Clock {
        fn listener_id(&self) -> ListenerId {
            self.id
        }
    }

    impl Subscriber for Clock {
        fn handlers() -> HandlerSet<Self> {
            HandlerSet::<Self>::new().handler::<Tick, _, _>("on_tick", None, |s, _| {
                s.ticks.fetch_add(1, Ordering::SeqCst);
            })
        }
    }

    #[test]
    fn test_drop_unregisters() {
        let bus = Bus::new("scoped");
        let clock = Arc::new(Clock {
            id: ListenerId::next(),
            ticks: AtomicUsize::new(0),
        });

        {
            let scoped = ScopedListener::from_arc(&bus, clock.clone()).unwrap();
            assert_eq!(bus.handler_count(), 1);
            bus.dispatch(Tick {
                state: EventState::new(),
            })
            .unwrap();
            assert_eq!(scoped.ticks.load(Ordering::SeqCst), 1);
        }

        assert_eq!(bus.handler_count(), 0);
        bus.dispatch(Tick {
            state: EventState::new(),
        })
        .unwrap();
        assert_eq!(clock.ticks.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_disposed_bus_is_refused() {
        let bus = Bus::new("gone");
        bus.dispose().unwrap();
        let clock = Clock {
            id: ListenerId::next(),
            ticks: AtomicUsize::new(0),
        };
        assert!(ScopedListener::new(&bus, clock).is_err());
    }
}
