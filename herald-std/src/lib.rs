//! # herald-std
//!
//! Standard implementations for the Herald event bus.
//!
//! This crate provides:
//! - **Buses**: [`Bus`], [`BusBuilder`], [`BusConfig`], the main bus and the
//!   pending queue
//! - **Discovery**: [`discovery`], resolving and caching subscriber handlers
//! - **Enumeration**: [`registry`], weak references to every live bus
//! - **Observers**: [`TracingObserver`]
//! - **Scoping**: [`ScopedListener`]
//! - **Collected handlers**: `collected` (feature `inventory`)

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

// Re-export core traits
pub use herald_core;

// Modules
mod bus;
pub mod discovery;
mod observers;
mod registration;
pub mod registry;
mod scoped;
pub mod testing;

#[cfg(feature = "inventory")]
pub mod collected;

pub use bus::{Bus, BusBuilder, BusConfig, BusId, DrainReport, MAIN_BUS_NAME};
pub use observers::TracingObserver;
pub use registration::{HandlerHandle, HandlerInfo};
pub use scoped::ScopedListener;

#[cfg(feature = "inventory")]
pub use inventory;
