//! Per-dispatch audit records.
//!
//! After every dispatch a bus builds one [`DispatchRecord`] and hands it to
//! its attached [`DispatchObserver`]s. Inspection tools (event logs,
//! debuggers) consume the bus through this surface only.

use std::{borrow::Cow, time::SystemTime};
use thiserror::Error;

/// How a handler failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The handler returned `Err`.
    Error,
    /// The handler panicked.
    Panic,
}

/// A handler failure caught by the dispatch loop.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("handler `{handler}` of {owner} failed on `{event}`: {message}")]
pub struct HandlerFailure {
    /// Label of the failing handler.
    pub handler: Cow<'static, str>,
    /// Debug name of the handler's owner.
    pub owner: Cow<'static, str>,
    /// Type name of the event being dispatched.
    pub event: &'static str,
    /// Error or panic.
    pub kind: FailureKind,
    /// Error message or panic payload.
    pub message: String,
}

/// What happened to one dispatched event.
#[derive(Debug, Clone)]
pub struct DispatchRecord {
    /// Name of the bus.
    pub bus: Cow<'static, str>,
    /// Type name of the event.
    pub event: &'static str,
    /// Cancellation flag after every handler ran.
    pub cancelled: bool,
    /// Labels of the invoked handlers, in invocation order.
    pub invoked: Vec<Cow<'static, str>>,
    /// Handlers that failed.
    pub failures: Vec<HandlerFailure>,
    /// When the dispatch started.
    pub timestamp: SystemTime,
}

impl DispatchRecord {
    /// An empty record for `event` on `bus`, stamped now.
    pub fn new(bus: impl Into<Cow<'static, str>>, event: &'static str) -> Self {
        Self {
            bus: bus.into(),
            event,
            cancelled: false,
            invoked: Vec::new(),
            failures: Vec::new(),
            timestamp: SystemTime::now(),
        }
    }

    /// Number of invoked handlers.
    pub fn invoked_count(&self) -> usize {
        self.invoked.len()
    }

    /// Whether every invoked handler succeeded.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Receives one [`DispatchRecord`] per dispatch.
pub trait DispatchObserver: Send + Sync + 'static {
    /// Called after every handler ran.
    fn on_dispatched(&self, record: &DispatchRecord);
}

// Blanket impl for closures
impl<F> DispatchObserver for F
where
    F: Fn(&DispatchRecord) + Send + Sync + 'static,
{
    fn on_dispatched(&self, record: &DispatchRecord) {
        (self)(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_display() {
        let failure = HandlerFailure {
            handler: "Shield::absorb".into(),
            owner: "Shield".into(),
            event: "HitEvent",
            kind: FailureKind::Panic,
            message: "shield offline".into(),
        };
        assert_eq!(
            failure.to_string(),
            "handler `Shield::absorb` of Shield failed on `HitEvent`: shield offline"
        );
    }

    #[test]
    fn test_closure_observer() {
        let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = seen.clone();
        let observer = move |record: &DispatchRecord| sink.lock().unwrap().push(record.event);
        let record = DispatchRecord::new("Main", "Ping");
        observer.on_dispatched(&record);
        assert!(record.is_clean());
        assert_eq!(record.invoked_count(), 0);
        assert_eq!(*seen.lock().unwrap(), vec!["Ping"]);
    }
}
