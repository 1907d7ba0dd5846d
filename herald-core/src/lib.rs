//! # herald-core
//!
//! Core traits for the Herald in-process event bus.
//!
//! This crate has minimal dependencies and is designed to be imported by
//! crates that define events or subscribers without needing the bus
//! implementation in `herald-std`.
//!
//! # Building Blocks
//!
//! ## Events ([`Event`])
//!
//! A data bag for one occurrence. Every event carries an [`EventState`]
//! (cancellation flag and one-shot dispatch marker). Events form type
//! hierarchies by composition: an event may name a parent event, and a
//! handler declared for the parent receives the child too.
//!
//! ## Priorities ([`Priority`])
//!
//! A closed, ordered set of bands. Lower bands run first; [`Priority::Final`]
//! runs after everything else and is meant for handlers that apply an
//! event's settled outcome.
//!
//! ## Owners ([`Listener`])
//!
//! Every registration belongs to an owner identified by a [`ListenerId`].
//!
//! ## Declared handlers ([`Subscriber`])
//!
//! A subscriber type lists its handler methods as a [`HandlerSet`], from
//! which the bus discovers and registers them.
//!
//! ## Audit ([`DispatchObserver`])
//!
//! One [`DispatchRecord`] per dispatch, for inspection tooling.
//!
//! # Error Types
//!
//! - [`HeraldError`] - Top-level error type
//! - [`DispatchError`] - Dispatch programming errors
//! - [`BusError`] - Bus lifecycle violations
//! - [`DiscoveryError`] - Invalid handler declarations

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

mod error;
mod event;
mod handler;
mod listener;
mod observer;
mod priority;
mod subscriber;

// Re-exports
pub use error::{BoxError, BusError, DiscoveryError, DispatchError, HeraldError};
pub use event::{Event, EventKind, EventState, TypeKey, short_type_name};
pub use handler::{CallbackKey, IntoHandlerOutcome};
pub use listener::{Listener, ListenerId};
pub use observer::{DispatchObserver, DispatchRecord, FailureKind, HandlerFailure};
pub use priority::{ParsePriorityError, Priority};
pub use subscriber::{DeclKind, HandlerDecl, HandlerSet, InvokeFn, Subscriber};
