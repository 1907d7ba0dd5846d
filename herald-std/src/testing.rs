//! Testing utilities for Herald.
//!
//! This module provides helpers to make testing buses and handlers easier.
//!
//! # Features
//!
//! - [`TraceLog`]: An ordered, shared record handlers can write to
//! - [`RecordingObserver`]: A dispatch observer that keeps every record
//! - [`TestListener`]: A named owner for dynamic registrations
//! - [`CallCounter`]: A shared invocation counter

use herald_core::{DispatchObserver, DispatchRecord, Listener, ListenerId};
use std::{
    borrow::Cow,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

// ============================================================================
// Trace Log
// ============================================================================

/// An ordered log shared between handlers and the test body.
///
/// # Example
///
/// ```rust,ignore
/// let log = TraceLog::new();
/// let sink = log.clone();
/// bus.register_dynamic::<Ping, _, _>(&owner, Priority::High, move |_| sink.push("h1"))?;
///
/// bus.dispatch(Ping::new())?;
/// assert_eq!(log.entries(), vec!["h1"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct TraceLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl TraceLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry.
    pub fn push(&self, entry: impl Into<String>) {
        self.entries.lock().unwrap().push(entry.into());
    }

    /// A copy of the entries, oldest first.
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every entry.
    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }
}

// ============================================================================
// Recording Observer
// ============================================================================

/// A dispatch observer that records every [`DispatchRecord`] it receives.
///
/// Clones share the same records, so keep one clone and attach the other.
#[derive(Debug, Clone, Default)]
pub struct RecordingObserver {
    records: Arc<Mutex<Vec<DispatchRecord>>>,
}

impl RecordingObserver {
    /// Create an observer with no records.
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of the records, oldest first.
    pub fn records(&self) -> Vec<DispatchRecord> {
        self.records.lock().unwrap().clone()
    }

    /// The most recent record.
    pub fn last(&self) -> Option<DispatchRecord> {
        self.records.lock().unwrap().last().cloned()
    }

    /// Event names of the records, oldest first.
    pub fn events(&self) -> Vec<&'static str> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .map(|record| record.event)
            .collect()
    }

    /// Number of records.
    pub fn count(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    /// Remove every record.
    pub fn clear(&self) {
        self.records.lock().unwrap().clear();
    }
}

impl DispatchObserver for RecordingObserver {
    fn on_dispatched(&self, record: &DispatchRecord) {
        self.records.lock().unwrap().push(record.clone());
    }
}

// ============================================================================
// Test Listener
// ============================================================================

/// A named registration owner with a fresh identity.
#[derive(Debug, Clone)]
pub struct TestListener {
    id: ListenerId,
    name: Cow<'static, str>,
}

impl TestListener {
    /// Create a listener called `name`.
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            id: ListenerId::next(),
            name: name.into(),
        }
    }
}

impl Listener for TestListener {
    fn listener_id(&self) -> ListenerId {
        self.id
    }

    fn debug_name(&self) -> Cow<'static, str> {
        self.name.clone()
    }
}

// ============================================================================
// Call Counter
// ============================================================================

/// A shared counter handlers can bump.
#[derive(Debug, Clone, Default)]
pub struct CallCounter {
    count: Arc<AtomicUsize>,
}

impl CallCounter {
    /// Create a counter at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one call.
    pub fn hit(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    /// Get the current count.
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// Reset the counter.
    pub fn reset(&self) {
        self.count.store(0, Ordering::SeqCst);
    }
}
