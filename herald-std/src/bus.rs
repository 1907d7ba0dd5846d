//! The event bus.
//!
//! A [`Bus`] owns one priority-ordered collection of handler registrations
//! and delivers each dispatched event, synchronously and on the caller's
//! thread, to every registration whose declared type matches the event.
//!
//! # Dispatch
//!
//! 1. An event that was already dispatched is rejected.
//! 2. A disposed bus rejects the event.
//! 3. The event is marked dispatched before any handler runs.
//! 4. A snapshot of the registrations is walked in (priority, insertion)
//!    order. The lock is released first, so handlers may register,
//!    unregister, enqueue or dispatch on the same bus. A registration
//!    removed during the walk is skipped; one added during the walk is
//!    seen by the next dispatch.
//! 5. Handler errors and panics are logged, recorded and isolated.
//!
//! # Example
//!
//! ```rust,ignore
//! let bus = Bus::new("combat");
//! bus.register_static(&shield)?;
//! let hit = bus.dispatch(HitEvent::new(12.0))?;
//! if !hit.is_cancelled() {
//!     apply(hit.damage);
//! }
//! ```

use crate::{
    discovery,
    registration::{HandlerHandle, HandlerInfo, Registration, RegistrationList, Thunk},
    registry,
};
use herald_core::{
    BusError, CallbackKey, DispatchError, DispatchObserver, DispatchRecord, Event, EventKind,
    FailureKind, HandlerFailure, IntoHandlerOutcome, Listener, ListenerId, Priority, Subscriber,
    TypeKey, short_type_name,
};
use std::{
    any::{Any, TypeId, type_name},
    borrow::Cow,
    collections::VecDeque,
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::{
        Arc, LazyLock, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
        atomic::{AtomicU64, Ordering},
    },
};

/// Name of the main bus.
pub const MAIN_BUS_NAME: &str = "Main";

static NEXT_BUS_ID: AtomicU64 = AtomicU64::new(1);

static MAIN: LazyLock<Bus> = LazyLock::new(|| BusBuilder::new(MAIN_BUS_NAME).main().build());

// ============================================================================
// Identity & configuration
// ============================================================================

/// Process-unique identity of a bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BusId(u64);

impl BusId {
    fn next() -> Self {
        Self(NEXT_BUS_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw value.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for BusId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bus#{}", self.0)
    }
}

/// Runtime settings of a bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusConfig {
    /// Catch handler panics and report them as failures. When `false`, a
    /// panicking handler unwinds through `dispatch`.
    pub capture_panics: bool,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            capture_panics: true,
        }
    }
}

/// Builder for a [`Bus`].
///
/// # Example
///
/// ```rust,ignore
/// let bus = BusBuilder::new("ui")
///     .capture_panics(false)
///     .observer(TracingObserver::new())
///     .build();
/// ```
pub struct BusBuilder {
    name: Cow<'static, str>,
    main: bool,
    config: BusConfig,
    observers: Vec<Arc<dyn DispatchObserver>>,
}

impl BusBuilder {
    /// A builder for a bus called `name`.
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            main: false,
            config: BusConfig::default(),
            observers: Vec::new(),
        }
    }

    /// Whether handler panics are caught. Defaults to `true`.
    pub fn capture_panics(mut self, capture: bool) -> Self {
        self.config.capture_panics = capture;
        self
    }

    /// Attach a dispatch observer.
    pub fn observer<O: DispatchObserver>(mut self, observer: O) -> Self {
        self.observers.push(Arc::new(observer));
        self
    }

    fn main(mut self) -> Self {
        self.main = true;
        self
    }

    /// Build the bus and track it in the bus registry.
    pub fn build(self) -> Bus {
        let inner = Arc::new(BusInner {
            id: BusId::next(),
            name: self.name,
            main: self.main,
            config: self.config,
            state: RwLock::new(BusState::default()),
            observers: RwLock::new(self.observers),
            pending: Mutex::new(VecDeque::new()),
        });
        registry::track(&inner);
        tracing::debug!(bus = %inner.name, id = %inner.id, "bus created");
        Bus { inner }
    }
}

// ============================================================================
// Bus
// ============================================================================

#[derive(Default)]
struct BusState {
    disposed: bool,
    registrations: RegistrationList,
}

pub(crate) struct BusInner {
    pub(crate) id: BusId,
    pub(crate) name: Cow<'static, str>,
    main: bool,
    config: BusConfig,
    state: RwLock<BusState>,
    observers: RwLock<Vec<Arc<dyn DispatchObserver>>>,
    pending: Mutex<VecDeque<Box<dyn Event>>>,
}

impl BusInner {
    pub(crate) fn is_disposed(&self) -> bool {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .disposed
    }
}

impl Drop for BusInner {
    fn drop(&mut self) {
        registry::forget(self.id);
    }
}

/// Counts reported by [`Bus::drain`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    /// Queued events that were dispatched.
    pub dispatched: usize,
    /// Queued events the bus refused to dispatch.
    pub failed: usize,
    /// Handler failures across every dispatched event.
    pub handler_failures: usize,
}

/// A handle to an event bus.
///
/// Cloning is cheap and yields a handle to the same bus.
#[derive(Clone)]
pub struct Bus {
    inner: Arc<BusInner>,
}

impl Bus {
    /// The main bus, created on first use. It cannot be disposed.
    pub fn main() -> &'static Bus {
        &MAIN
    }

    /// A new, isolated bus with the default configuration.
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        BusBuilder::new(name).build()
    }

    /// A builder for a new bus.
    pub fn builder(name: impl Into<Cow<'static, str>>) -> BusBuilder {
        BusBuilder::new(name)
    }

    pub(crate) fn from_inner(inner: Arc<BusInner>) -> Self {
        Self { inner }
    }

    /// Identity of the bus.
    pub fn id(&self) -> BusId {
        self.inner.id
    }

    /// Diagnostic name of the bus.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Whether this is the main bus.
    pub fn is_main(&self) -> bool {
        self.inner.main
    }

    /// The bus configuration.
    pub fn config(&self) -> &BusConfig {
        &self.inner.config
    }

    /// Whether [`dispose`](Self::dispose) was called.
    pub fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }

    fn read_state(&self) -> RwLockReadGuard<'_, BusState> {
        self.inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, BusState> {
        self.inner
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn pending(&self) -> MutexGuard<'_, VecDeque<Box<dyn Event>>> {
        self.inner
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn disposed_error(&self) -> BusError {
        BusError::Disposed {
            name: self.inner.name.to_string(),
        }
    }

    /// Drop every registration and queued event and stop accepting new ones.
    ///
    /// Disposing twice is a no-op. The main bus refuses with
    /// [`BusError::MainBusDisposal`].
    pub fn dispose(&self) -> Result<(), BusError> {
        if self.inner.main {
            return Err(BusError::MainBusDisposal);
        }

        let removed = {
            let mut state = self.write_state();
            if state.disposed {
                return Ok(());
            }
            state.disposed = true;
            state.registrations.clear()
        };
        let dropped = std::mem::take(&mut *self.pending());
        registry::forget(self.inner.id);

        tracing::debug!(
            bus = %self.inner.name,
            registrations = removed.len(),
            pending = dropped.len(),
            "bus disposed"
        );
        Ok(())
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Register every declared handler of `subscriber`.
    ///
    /// Handlers the subscriber already has on this bus are skipped, so
    /// registering the same instance twice is harmless. Returns the number
    /// of newly added registrations.
    pub fn register_static<S>(&self, subscriber: &Arc<S>) -> Result<usize, BusError>
    where
        S: Subscriber + Listener,
    {
        let descriptors = discovery::discover::<S>();
        let owner = subscriber.listener_id();
        let owner_name = subscriber.debug_name();

        let mut state = self.write_state();
        if state.disposed {
            return Err(self.disposed_error());
        }

        let mut added = 0;
        for descriptor in descriptors.iter() {
            let key = CallbackKey::Method {
                subscriber: TypeId::of::<S>(),
                name: descriptor.method(),
            };
            if state
                .registrations
                .contains(owner, &key, descriptor.event_type())
            {
                continue;
            }

            let target = Arc::clone(subscriber);
            let invoke = descriptor.invoker();
            let thunk: Thunk = Box::new(move |event: &mut (dyn Event + 'static)| {
                invoke(&*target, event)
            });
            let registration = state.registrations.insert(Registration::new(
                owner,
                owner_name.clone(),
                descriptor.event_type(),
                descriptor.priority(),
                key,
                descriptor.label().into(),
                thunk,
            ));
            tracing::debug!(
                bus = %self.inner.name,
                handler = %registration.label,
                event = %registration.event_type,
                priority = %registration.priority,
                "registered handler"
            );
            added += 1;
        }
        Ok(added)
    }

    /// Register a closure for events of type `E` (or `dyn Event` for all).
    ///
    /// A capture-free closure or fn item is identified by its type:
    /// registering it for the same owner twice returns `Ok(None)`. Callbacks
    /// carrying state (capturing closures, fn pointers, boxed closures) are
    /// always distinct; keep the returned handle, or use
    /// [`register_dynamic_keyed`](Self::register_dynamic_keyed), to remove
    /// them again.
    pub fn register_dynamic<E, R, F>(
        &self,
        owner: &dyn Listener,
        priority: Priority,
        callback: F,
    ) -> Result<Option<HandlerHandle>, BusError>
    where
        E: EventKind + ?Sized,
        R: IntoHandlerOutcome,
        F: Fn(&mut E) -> R + Send + Sync + 'static,
    {
        self.register_erased(
            owner,
            E::key(),
            priority,
            CallbackKey::of_callback::<F>(),
            Cow::Borrowed(type_name::<F>()),
            erase::<E, R, F>(callback),
        )
    }

    /// Like [`register_dynamic`](Self::register_dynamic), with an explicit
    /// identity `key` chosen by the caller.
    pub fn register_dynamic_keyed<E, R, F>(
        &self,
        owner: &dyn Listener,
        key: u64,
        priority: Priority,
        callback: F,
    ) -> Result<Option<HandlerHandle>, BusError>
    where
        E: EventKind + ?Sized,
        R: IntoHandlerOutcome,
        F: Fn(&mut E) -> R + Send + Sync + 'static,
    {
        let label = format!("{}#{key}", owner.debug_name());
        self.register_erased(
            owner,
            E::key(),
            priority,
            CallbackKey::Token(key),
            Cow::Owned(label),
            erase::<E, R, F>(callback),
        )
    }

    pub(crate) fn register_erased(
        &self,
        owner: &dyn Listener,
        event_type: TypeKey,
        priority: Priority,
        key: CallbackKey,
        label: Cow<'static, str>,
        thunk: Thunk,
    ) -> Result<Option<HandlerHandle>, BusError> {
        let owner_id = owner.listener_id();
        let owner_name = owner.debug_name();
        let mut state = self.write_state();
        if state.disposed {
            return Err(self.disposed_error());
        }
        if state.registrations.contains(owner_id, &key, event_type) {
            tracing::debug!(bus = %self.inner.name, handler = %label, "duplicate registration ignored");
            return Ok(None);
        }

        let registration = state.registrations.insert(Registration::new(
            owner_id,
            owner_name,
            event_type,
            priority,
            key,
            label,
            thunk,
        ));
        tracing::debug!(
            bus = %self.inner.name,
            handler = %registration.label,
            event = %registration.event_type,
            priority = %registration.priority,
            "registered handler"
        );
        Ok(Some(registration.handle(self.inner.id)))
    }

    /// Remove exactly the registration behind `handle`.
    ///
    /// Returns `false` for handles of other buses, handles already removed
    /// and disposed buses.
    pub fn unregister(&self, handle: &HandlerHandle) -> bool {
        if handle.bus() != self.inner.id {
            tracing::debug!(bus = %self.inner.name, handle_bus = %handle.bus(), "handle belongs to another bus");
            return false;
        }
        let removed = self.write_state().registrations.remove_id(handle.id());
        if removed.is_none() {
            tracing::debug!(bus = %self.inner.name, "unregister of unknown handle ignored");
        }
        removed.is_some()
    }

    /// Remove the registrations of `owner` that would receive an `E`: those
    /// declared for `E`, one of its ancestors, or `dyn Event`.
    pub fn unregister_all_of_type<E>(&self, owner: &dyn Listener) -> usize
    where
        E: EventKind + ?Sized,
    {
        let (key, hierarchy) = (E::key(), E::hierarchy());
        let owner = owner.listener_id();
        let removed = self
            .write_state()
            .registrations
            .remove_where(|r| r.owner == owner && hierarchy.contains(&r.event_type));
        tracing::debug!(bus = %self.inner.name, %owner, removed = removed.len(), event = %key, "unregistered handlers");
        removed.len()
    }

    /// Remove every registration of `owner`.
    pub fn unregister_all(&self, owner: &dyn Listener) -> usize {
        let owner = owner.listener_id();
        let removed = self
            .write_state()
            .registrations
            .remove_where(|r| r.owner == owner);
        tracing::debug!(bus = %self.inner.name, %owner, removed = removed.len(), "unregistered handlers");
        removed.len()
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    /// Deliver `event` to every matching handler and hand it back.
    pub fn dispatch<E: Event>(&self, mut event: E) -> Result<E, DispatchError> {
        self.deliver(&mut event, None)?;
        Ok(event)
    }

    /// Deliver a borrowed event and return the audit record of the dispatch.
    pub fn dispatch_mut(
        &self,
        event: &mut (dyn Event + 'static),
    ) -> Result<DispatchRecord, DispatchError> {
        self.deliver(event, None)
    }

    /// Deliver `event`, then run `on_complete` with the settled event.
    pub fn dispatch_with<E, F>(&self, event: E, on_complete: F) -> Result<E, DispatchError>
    where
        E: Event,
        F: FnOnce(&E),
    {
        let event = self.dispatch(event)?;
        on_complete(&event);
        Ok(event)
    }

    /// Deliver `event` to every matching handler not owned by `source`.
    pub fn dispatch_from<E: Event>(
        &self,
        source: &dyn Listener,
        mut event: E,
    ) -> Result<E, DispatchError> {
        self.deliver(&mut event, Some(source.listener_id()))?;
        Ok(event)
    }

    fn deliver(
        &self,
        event: &mut (dyn Event + 'static),
        exclude: Option<ListenerId>,
    ) -> Result<DispatchRecord, DispatchError> {
        let event_name = short_type_name(event.event_name());
        if event.has_been_dispatched() {
            return Err(DispatchError::AlreadyDispatched { event: event_name });
        }

        let snapshot = {
            let state = self.read_state();
            if state.disposed {
                return Err(self.disposed_error().into());
            }
            state.registrations.snapshot()
        };
        event.state_mut().begin_dispatch();

        let mut record = DispatchRecord::new(self.inner.name.clone(), event_name);
        for registration in &snapshot {
            if !registration.is_live()
                || exclude == Some(registration.owner)
                || !event.is_a(registration.event_type)
            {
                continue;
            }

            tracing::trace!(bus = %self.inner.name, handler = %registration.label, event = event_name, "invoking handler");
            record.invoked.push(registration.label.clone());
            if let Err(failure) = self.invoke(registration, event, event_name) {
                tracing::error!(
                    bus = %self.inner.name,
                    handler = %failure.handler,
                    owner = %failure.owner,
                    event = failure.event,
                    kind = ?failure.kind,
                    "handler failed: {}",
                    failure.message
                );
                record.failures.push(failure);
            }
        }
        drop(snapshot);

        record.cancelled = event.is_cancelled();
        self.notify(&record);
        Ok(record)
    }

    fn invoke(
        &self,
        registration: &Registration,
        event: &mut (dyn Event + 'static),
        event_name: &'static str,
    ) -> Result<(), HandlerFailure> {
        let outcome = if self.inner.config.capture_panics {
            match panic::catch_unwind(AssertUnwindSafe(|| registration.invoke(event))) {
                Ok(outcome) => outcome.map_err(|err| (FailureKind::Error, err.to_string())),
                Err(payload) => Err((FailureKind::Panic, panic_message(payload.as_ref()))),
            }
        } else {
            registration
                .invoke(event)
                .map_err(|err| (FailureKind::Error, err.to_string()))
        };

        outcome.map_err(|(kind, message)| HandlerFailure {
            handler: registration.label.clone(),
            owner: registration.owner_name.clone(),
            event: event_name,
            kind,
            message,
        })
    }

    fn notify(&self, record: &DispatchRecord) {
        let observers = self
            .inner
            .observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for observer in observers {
            if panic::catch_unwind(AssertUnwindSafe(|| observer.on_dispatched(record))).is_err() {
                tracing::error!(bus = %self.inner.name, event = record.event, "dispatch observer panicked");
            }
        }
    }

    /// Attach a dispatch observer.
    pub fn add_observer<O: DispatchObserver>(&self, observer: O) {
        self.inner
            .observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(observer));
    }

    // ========================================================================
    // Pending queue
    // ========================================================================

    /// Queue `event` for the next [`drain`](Self::drain).
    pub fn enqueue<E: Event>(&self, event: E) -> Result<(), BusError> {
        // Held across the push so a concurrent dispose clears the event.
        let state = self.read_state();
        if state.disposed {
            return Err(self.disposed_error());
        }
        self.pending().push_back(Box::new(event));
        Ok(())
    }

    /// Number of queued events.
    pub fn pending_len(&self) -> usize {
        self.pending().len()
    }

    /// Dispatch queued events one at a time, oldest first, until the queue
    /// is empty. Events queued by handlers during the drain are included.
    pub fn drain(&self) -> DrainReport {
        let mut report = DrainReport::default();
        loop {
            let next = self.pending().pop_front();
            let Some(mut event) = next else {
                break;
            };
            match self.dispatch_mut(event.as_mut()) {
                Ok(record) => {
                    report.dispatched += 1;
                    report.handler_failures += record.failures.len();
                }
                Err(error) => {
                    tracing::error!(bus = %self.inner.name, %error, "queued event was not dispatched");
                    report.failed += 1;
                }
            }
        }
        report
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    /// Every registration, in dispatch order.
    pub fn handlers(&self) -> Vec<HandlerInfo> {
        self.read_state()
            .registrations
            .iter()
            .map(|r| r.info(self.inner.id))
            .collect()
    }

    /// Number of registrations.
    pub fn handler_count(&self) -> usize {
        self.read_state().registrations.len()
    }

    /// Number of registrations declared exactly for `E`.
    pub fn handler_count_for<E: EventKind + ?Sized>(&self) -> usize {
        let key = E::key();
        self.read_state()
            .registrations
            .iter()
            .filter(|r| r.event_type == key)
            .count()
    }
}

impl PartialEq for Bus {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Bus {}

impl fmt::Debug for Bus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.read_state();
        f.debug_struct("Bus")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("main", &self.inner.main)
            .field("disposed", &state.disposed)
            .field("handlers", &state.registrations.len())
            .finish()
    }
}

fn erase<E, R, F>(callback: F) -> Thunk
where
    E: EventKind + ?Sized,
    R: IntoHandlerOutcome,
    F: Fn(&mut E) -> R + Send + Sync + 'static,
{
    Box::new(move |event: &mut (dyn Event + 'static)| {
        let name = event.event_name();
        match E::project_mut(event) {
            Some(event) => callback(event).into_outcome(),
            None => Err(format!("event `{name}` is not a `{}`", E::key().short_name()).into()),
        }
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with a non-string payload".to_owned()
    }
}
