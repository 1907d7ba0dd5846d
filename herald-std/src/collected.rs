//! Free-function handlers collected at link time via `inventory`.
//!
//! Functions marked `#[subscribe]` are submitted to a process-wide
//! collection. They are not attached to any bus until
//! [`Bus::register_collected`] is called.
//!
//! # Example
//!
//! ```rust,ignore
//! #[subscribe(priority = Final)]
//! fn log_hits(hit: &mut HitEvent) {
//!     tracing::info!(damage = hit.damage, "hit");
//! }
//!
//! Bus::main().register_collected()?;
//! ```

use crate::{bus::Bus, registration::Thunk};
use herald_core::{
    BoxError, BusError, CallbackKey, Event, EventKind, Listener, ListenerId, Priority, TypeKey,
};
use std::borrow::Cow;

/// Registration entry for a collected handler.
///
/// This struct is submitted to `inventory` by `#[subscribe]`.
pub struct CollectedHandler {
    /// Path of the function, unique per handler.
    pub name: &'static str,
    /// Declared event type.
    pub event_type: fn() -> TypeKey,
    /// Priority band.
    pub priority: Priority,
    /// Invocation thunk.
    pub invoke: fn(&mut (dyn Event + 'static)) -> Result<(), BoxError>,
}

inventory::collect!(CollectedHandler);

/// Owner of every collected registration.
struct Collected;

impl Listener for Collected {
    fn listener_id(&self) -> ListenerId {
        ListenerId::COLLECTED
    }

    fn debug_name(&self) -> Cow<'static, str> {
        Cow::Borrowed("collected")
    }
}

/// Every collected handler in the process.
pub fn collected_handlers() -> impl Iterator<Item = &'static CollectedHandler> {
    inventory::iter::<CollectedHandler>.into_iter()
}

/// Project an event onto a collected handler's parameter type.
#[doc(hidden)]
pub fn project<'a, E>(
    event: &'a mut (dyn Event + 'static),
    handler: &'static str,
) -> Result<&'a mut E, BoxError>
where
    E: EventKind + ?Sized,
{
    let name = event.event_name();
    E::project_mut(event).ok_or_else(|| {
        format!(
            "collected handler `{handler}` cannot take `{name}` as `{}`",
            E::key().short_name()
        )
        .into()
    })
}

impl Bus {
    /// Attach every collected handler to this bus.
    ///
    /// Handlers already attached are skipped. Returns the number of newly
    /// added registrations.
    pub fn register_collected(&self) -> Result<usize, BusError> {
        let mut added = 0;
        for handler in collected_handlers() {
            let invoke = handler.invoke;
            let thunk: Thunk = Box::new(move |event: &mut (dyn Event + 'static)| invoke(event));
            let registered = self.register_erased(
                &Collected,
                (handler.event_type)(),
                handler.priority,
                CallbackKey::Function(handler.name),
                Cow::Borrowed(handler.name),
                thunk,
            )?;
            if registered.is_some() {
                added += 1;
            }
        }
        tracing::debug!(bus = %self.name(), added, "attached collected handlers");
        Ok(added)
    }

    /// Remove every collected handler from this bus.
    pub fn unregister_collected(&self) -> usize {
        self.unregister_all(&Collected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_core::{EventState, impl_event};

    struct Alarm {
        state: EventState,
        rings: u32,
    }
    impl_event!(Alarm { state: state });

    fn ring(event: &mut (dyn Event + 'static)) -> Result<(), BoxError> {
        let alarm = project::<Alarm>(event, "ring")?;
        alarm.rings += 1;
        Ok(())
    }

    inventory::submit! {
        CollectedHandler {
            name: "herald_std::collected::tests::ring",
            event_type: <Alarm as EventKind>::key,
            priority: Priority::High,
            invoke: ring,
        }
    }

    #[test]
    fn test_register_collected_is_idempotent() {
        let bus = Bus::new("collected");
        assert!(bus.register_collected().unwrap() >= 1);
        assert_eq!(bus.register_collected().unwrap(), 0);

        let alarm = bus
            .dispatch(Alarm {
                state: EventState::new(),
                rings: 0,
            })
            .unwrap();
        assert_eq!(alarm.rings, 1);

        assert!(bus.unregister_collected() >= 1);
        assert_eq!(bus.handler_count_for::<Alarm>(), 0);
    }
}
