//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use herald::{Event, EventState, Listener, ListenerId, impl_event};
use lazy_static::lazy_static;
use std::sync::{Mutex, MutexGuard, PoisonError};

// ============================================================================
// Test Event Types
// ============================================================================

#[derive(Debug, Default)]
pub struct Ping {
    pub state: EventState,
    pub hops: u32,
}
impl_event!(Ping { state: state });

impl Ping {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Debug)]
pub struct Combat {
    pub state: EventState,
    pub source: u32,
}
impl_event!(Combat { state: state });

#[derive(Debug)]
pub struct Hit {
    pub combat: Combat,
    pub damage: f32,
}
impl_event!(Hit { parent: combat: Combat });

impl Hit {
    pub fn new(source: u32, damage: f32) -> Self {
        Self {
            combat: Combat {
                state: EventState::new(),
                source,
            },
            damage,
        }
    }
}

#[derive(Debug)]
pub struct CriticalHit {
    pub hit: Hit,
    pub multiplier: f32,
}
impl_event!(CriticalHit { parent: hit: Hit });

impl CriticalHit {
    pub fn new(source: u32, damage: f32, multiplier: f32) -> Self {
        Self {
            hit: Hit::new(source, damage),
            multiplier,
        }
    }
}

#[derive(Debug, Default)]
pub struct Heal {
    pub state: EventState,
    pub amount: f32,
}
impl_event!(Heal { state: state });

// ============================================================================
// Owners
// ============================================================================

/// A bare owner for dynamic registrations.
pub struct Owner {
    pub id: ListenerId,
}

impl Owner {
    pub fn new() -> Self {
        Self {
            id: ListenerId::next(),
        }
    }
}

impl Listener for Owner {
    fn listener_id(&self) -> ListenerId {
        self.id
    }
}

/// Cancel whatever event it receives.
pub fn cancel_any(event: &mut (dyn Event + 'static)) {
    event.cancel();
}

// ============================================================================
// Main bus access
// ============================================================================

lazy_static! {
    static ref MAIN_BUS: Mutex<()> = Mutex::new(());
}

/// Serializes tests that register on the main bus.
pub fn main_bus_guard() -> MutexGuard<'static, ()> {
    MAIN_BUS.lock().unwrap_or_else(PoisonError::into_inner)
}
