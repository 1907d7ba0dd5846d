//! Handler registrations and the ordered collection a bus keeps them in.

use crate::bus::BusId;
use herald_core::{BoxError, CallbackKey, Event, ListenerId, Priority, TypeKey};
use std::{
    borrow::Cow,
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

static NEXT_REGISTRATION_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) type Thunk =
    Box<dyn Fn(&mut (dyn Event + 'static)) -> Result<(), BoxError> + Send + Sync>;

/// One subscription: a type-erased callback plus its declared event type,
/// owner and priority.
pub(crate) struct Registration {
    pub(crate) id: u64,
    pub(crate) owner: ListenerId,
    pub(crate) owner_name: Cow<'static, str>,
    pub(crate) event_type: TypeKey,
    pub(crate) priority: Priority,
    pub(crate) key: CallbackKey,
    pub(crate) label: Cow<'static, str>,
    thunk: Thunk,
    live: AtomicBool,
}

impl Registration {
    pub(crate) fn new(
        owner: ListenerId,
        owner_name: Cow<'static, str>,
        event_type: TypeKey,
        priority: Priority,
        key: CallbackKey,
        label: Cow<'static, str>,
        thunk: Thunk,
    ) -> Self {
        Self {
            id: NEXT_REGISTRATION_ID.fetch_add(1, Ordering::Relaxed),
            owner,
            owner_name,
            event_type,
            priority,
            key,
            label,
            thunk,
            live: AtomicBool::new(true),
        }
    }

    pub(crate) fn invoke(&self, event: &mut (dyn Event + 'static)) -> Result<(), BoxError> {
        (self.thunk)(event)
    }

    /// Cleared when the registration leaves its bus, so that a dispatch
    /// already walking a snapshot skips it.
    pub(crate) fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    fn retire(&self) {
        self.live.store(false, Ordering::Release);
    }

    pub(crate) fn same_callback(&self, owner: ListenerId, key: &CallbackKey, event: TypeKey) -> bool {
        self.owner == owner && self.key == *key && self.event_type == event
    }

    pub(crate) fn handle(&self, bus: BusId) -> HandlerHandle {
        HandlerHandle {
            bus,
            id: self.id,
            event_type: self.event_type,
            priority: self.priority,
        }
    }

    pub(crate) fn info(&self, bus: BusId) -> HandlerInfo {
        HandlerInfo {
            handle: self.handle(bus),
            owner: self.owner,
            owner_name: self.owner_name.clone(),
            label: self.label.clone(),
        }
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("id", &self.id)
            .field("owner", &self.owner)
            .field("event_type", &self.event_type)
            .field("priority", &self.priority)
            .field("label", &self.label)
            .finish()
    }
}

/// Opaque handle to one dynamic registration, used for targeted
/// unregistration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerHandle {
    bus: BusId,
    id: u64,
    event_type: TypeKey,
    priority: Priority,
}

impl HandlerHandle {
    /// The bus the registration lives on.
    pub fn bus(&self) -> BusId {
        self.bus
    }

    /// Declared event type.
    pub fn event_type(&self) -> TypeKey {
        self.event_type
    }

    /// Priority band.
    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }
}

/// A snapshot of one registration, for inspection tooling.
#[derive(Debug, Clone)]
pub struct HandlerInfo {
    /// Handle of the registration.
    pub handle: HandlerHandle,
    /// Owner identity.
    pub owner: ListenerId,
    /// Owner debug name.
    pub owner_name: Cow<'static, str>,
    /// Handler label (`Type::method` for declared handlers).
    pub label: Cow<'static, str>,
}

impl HandlerInfo {
    /// Declared event type.
    pub fn event_type(&self) -> TypeKey {
        self.handle.event_type
    }

    /// Priority band.
    pub fn priority(&self) -> Priority {
        self.handle.priority
    }
}

/// Registrations ordered by priority, ties broken by insertion order.
#[derive(Debug, Default)]
pub(crate) struct RegistrationList {
    entries: Vec<Arc<Registration>>,
}

impl RegistrationList {
    /// Insert after every registration of the same or an earlier band.
    pub(crate) fn insert(&mut self, registration: Registration) -> &Arc<Registration> {
        let priority = registration.priority;
        let pos = self.entries.partition_point(|r| r.priority <= priority);
        self.entries.insert(pos, Arc::new(registration));
        &self.entries[pos]
    }

    pub(crate) fn contains(&self, owner: ListenerId, key: &CallbackKey, event: TypeKey) -> bool {
        self.entries
            .iter()
            .any(|r| r.same_callback(owner, key, event))
    }

    // Removed registrations are handed back so that callers drop them, and
    // the subscribers they hold, after releasing the bus lock.
    pub(crate) fn remove_id(&mut self, id: u64) -> Option<Arc<Registration>> {
        let pos = self.entries.iter().position(|r| r.id == id)?;
        let removed = self.entries.remove(pos);
        removed.retire();
        Some(removed)
    }

    /// Remove every registration matching `predicate`.
    pub(crate) fn remove_where(
        &mut self,
        mut predicate: impl FnMut(&Registration) -> bool,
    ) -> Vec<Arc<Registration>> {
        let (removed, kept) = std::mem::take(&mut self.entries)
            .into_iter()
            .partition::<Vec<_>, _>(|r| predicate(r));
        self.entries = kept;
        for registration in &removed {
            registration.retire();
        }
        removed
    }

    pub(crate) fn clear(&mut self) -> Vec<Arc<Registration>> {
        let removed = std::mem::take(&mut self.entries);
        for registration in &removed {
            registration.retire();
        }
        removed
    }

    pub(crate) fn snapshot(&self) -> Vec<Arc<Registration>> {
        self.entries.clone()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Arc<Registration>> {
        self.entries.iter()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration(priority: Priority, key: u64) -> Registration {
        Registration::new(
            ListenerId::COLLECTED,
            "test".into(),
            TypeKey::root(),
            priority,
            CallbackKey::Token(key),
            format!("token-{key}").into(),
            Box::new(|_| Ok(())),
        )
    }

    fn labels(list: &RegistrationList) -> Vec<String> {
        list.iter().map(|r| r.label.to_string()).collect()
    }

    #[test]
    fn test_insert_is_stable_within_band() {
        let mut list = RegistrationList::default();
        list.insert(registration(Priority::Normal, 1));
        list.insert(registration(Priority::Final, 2));
        list.insert(registration(Priority::Highest, 3));
        list.insert(registration(Priority::Normal, 4));
        list.insert(registration(Priority::Highest, 5));

        assert_eq!(
            labels(&list),
            vec!["token-3", "token-5", "token-1", "token-4", "token-2"]
        );
    }

    #[test]
    fn test_removed_registrations_are_retired() {
        let mut list = RegistrationList::default();
        let id = list.insert(registration(Priority::Normal, 1)).id;
        let snapshot = list.snapshot();
        assert!(list.remove_id(id).is_some());
        assert!(list.remove_id(id).is_none());
        assert!(!snapshot[0].is_live());
        assert_eq!(list.len(), 0);
    }

    #[test]
    fn test_contains_matches_owner_key_and_type() {
        let mut list = RegistrationList::default();
        list.insert(registration(Priority::Normal, 7));
        assert!(list.contains(ListenerId::COLLECTED, &CallbackKey::Token(7), TypeKey::root()));
        assert!(!list.contains(ListenerId::COLLECTED, &CallbackKey::Token(8), TypeKey::root()));
        assert!(!list.contains(ListenerId::next(), &CallbackKey::Token(7), TypeKey::root()));
    }

    #[test]
    fn test_remove_where_counts() {
        let mut list = RegistrationList::default();
        for key in 0..4 {
            list.insert(registration(Priority::Normal, key));
        }
        let removed = list.remove_where(|r| r.key == CallbackKey::Token(2));
        assert_eq!(removed.len(), 1);
        assert!(!removed[0].is_live());
        assert_eq!(labels(&list), vec!["token-0", "token-1", "token-3"]);
        assert_eq!(list.clear().len(), 3);
        assert_eq!(list.len(), 0);
    }
}
