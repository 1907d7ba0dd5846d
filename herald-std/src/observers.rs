//! Standard dispatch observers.

use herald_core::{DispatchObserver, DispatchRecord};

/// Logs one line per dispatch through `tracing`.
///
/// Clean dispatches are logged at `debug`, dispatches with failing handlers
/// at `warn`.
#[derive(Debug, Clone, Default)]
pub struct TracingObserver {
    failures_only: bool,
}

impl TracingObserver {
    /// Log every dispatch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Log only dispatches in which a handler failed.
    pub fn failures_only() -> Self {
        Self {
            failures_only: true,
        }
    }
}

impl DispatchObserver for TracingObserver {
    fn on_dispatched(&self, record: &DispatchRecord) {
        if record.is_clean() {
            if !self.failures_only {
                tracing::debug!(
                    bus = %record.bus,
                    event = record.event,
                    handlers = record.invoked_count(),
                    cancelled = record.cancelled,
                    "event dispatched"
                );
            }
            return;
        }

        tracing::warn!(
            bus = %record.bus,
            event = record.event,
            handlers = record.invoked_count(),
            failures = record.failures.len(),
            cancelled = record.cancelled,
            "event dispatched with failing handlers"
        );
    }
}
