//! Process-wide enumeration of live buses.
//!
//! Every bus is tracked here by a weak reference from construction until it
//! is disposed or dropped, so inspection tools can list buses without
//! keeping any of them alive.

use crate::bus::{Bus, BusId, BusInner};
use std::{
    borrow::Cow,
    fmt,
    sync::{Arc, LazyLock, Mutex, PoisonError, Weak},
};

static BUSES: LazyLock<Mutex<Vec<(BusId, Weak<BusInner>)>>> =
    LazyLock::new(|| Mutex::new(Vec::new()));

pub(crate) fn track(inner: &Arc<BusInner>) {
    BUSES
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push((inner.id, Arc::downgrade(inner)));
}

pub(crate) fn forget(id: BusId) {
    BUSES
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .retain(|(tracked, _)| *tracked != id);
}

/// A non-owning reference to a bus.
#[derive(Clone)]
pub struct WeakBus {
    id: BusId,
    name: Cow<'static, str>,
    inner: Weak<BusInner>,
}

impl WeakBus {
    /// The bus's identity.
    pub fn id(&self) -> BusId {
        self.id
    }

    /// The bus's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The bus, if it is still alive and not disposed.
    pub fn upgrade(&self) -> Option<Bus> {
        let bus = Bus::from_inner(self.inner.upgrade()?);
        (!bus.is_disposed()).then_some(bus)
    }
}

impl fmt::Debug for WeakBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakBus")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}

/// All live, undisposed buses, in creation order.
///
/// Entries whose bus was dropped are pruned on the way.
pub fn all_buses() -> Vec<WeakBus> {
    let tracked: Vec<(BusId, Weak<BusInner>)> = {
        let mut buses = BUSES.lock().unwrap_or_else(PoisonError::into_inner);
        buses.retain(|(_, weak)| weak.strong_count() > 0);
        buses.clone()
    };

    // Upgraded outside the lock: the last strong reference may drop here,
    // and dropping a bus takes the lock again.
    tracked
        .into_iter()
        .filter_map(|(id, weak)| {
            let inner = weak.upgrade()?;
            if inner.is_disposed() {
                return None;
            }
            let name = inner.name.clone();
            drop(inner);
            Some(WeakBus { id, name, inner: weak })
        })
        .collect()
}
