//! Error types for Herald.
//!
//! This module provides a structured error hierarchy using `thiserror`:
//!
//! - [`HeraldError`] - Top-level error type
//! - [`DispatchError`] - Errors returned to the caller of a dispatch
//! - [`BusError`] - Bus lifecycle violations
//! - [`DiscoveryError`] - Invalid handler declarations found during discovery

use std::borrow::Cow;
use thiserror::Error;

/// A boxed error type for dynamic error handling.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Top-level error type for all Herald operations.
#[derive(Error, Debug)]
pub enum HeraldError {
    /// An error occurred during event dispatch.
    #[error("dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    /// A bus was used outside of its lifecycle.
    #[error("bus error: {0}")]
    Bus(#[from] BusError),

    /// A handler declaration was invalid.
    #[error("discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    /// A custom error occurred.
    #[error(transparent)]
    Custom(BoxError),
}

/// Errors returned by `dispatch`.
///
/// Both variants are programming errors: they are reported to the caller
/// immediately and no handler runs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// The event instance was already handed to a bus once.
    #[error("event `{event}` has already been dispatched")]
    AlreadyDispatched {
        /// Type name of the offending event.
        event: &'static str,
    },

    /// The bus cannot accept the event.
    #[error(transparent)]
    Bus(#[from] BusError),
}

/// Errors raised by bus lifecycle violations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    /// The bus was disposed and can no longer register or dispatch.
    #[error("bus '{name}' has been disposed")]
    Disposed {
        /// Diagnostic name of the bus.
        name: String,
    },

    /// An attempt was made to dispose the main bus.
    #[error("the main bus cannot be disposed")]
    MainBusDisposal,
}

/// Errors found while resolving a subscriber's handler declarations.
///
/// These never abort discovery: the offending declaration is logged and
/// skipped, the subscriber's remaining handlers are still registered.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryError {
    /// A marked method does not have the `(&self, &mut Event) -> ()` shape.
    #[error("invalid target for handler: {subscriber}::{method} ({reason})")]
    InvalidSignature {
        /// Subscriber type name.
        subscriber: &'static str,
        /// Method name.
        method: &'static str,
        /// Why the signature was rejected.
        reason: Cow<'static, str>,
    },

    /// An override accepts a different event type than the handler it overrides.
    #[error(
        "override {subscriber}::{method} takes `{found}` but the inherited handler takes `{expected}`"
    )]
    OverrideMismatch {
        /// Subscriber type name.
        subscriber: &'static str,
        /// Method name.
        method: &'static str,
        /// Event type of the inherited handler.
        expected: &'static str,
        /// Event type of the override.
        found: &'static str,
    },

    /// The same method name was declared twice at one level of the hierarchy.
    #[error("{subscriber}::{method} is declared more than once")]
    DuplicateMethod {
        /// Subscriber type name.
        subscriber: &'static str,
        /// Method name.
        method: &'static str,
    },
}

// Convenience conversions
impl From<BoxError> for HeraldError {
    fn from(err: BoxError) -> Self {
        HeraldError::Custom(err)
    }
}
