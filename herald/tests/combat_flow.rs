//! An end-to-end combat round: modifiers, cancellation, settlement and
//! follow-up events queued for the next frame.

#![cfg(feature = "macros")]

use herald::{TracingObserver, prelude::*, testing::RecordingObserver};
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicU32, Ordering},
};

#[derive(Event, Debug)]
struct Attack {
    #[event(state)]
    state: EventState,
    attacker: &'static str,
    target: &'static str,
}

#[derive(Event, Debug)]
struct Damage {
    #[event(parent)]
    attack: Attack,
    amount: u32,
}

#[derive(Event, Debug)]
struct Defeated {
    #[event(state)]
    state: EventState,
    name: &'static str,
}

impl Damage {
    fn new(attacker: &'static str, target: &'static str, amount: u32) -> Self {
        Self {
            attack: Attack {
                state: EventState::new(),
                attacker,
                target,
            },
            amount,
        }
    }
}

#[derive(Listener)]
struct Armor {
    id: ListenerId,
    owner: &'static str,
    reduction: u32,
}

#[handlers]
impl Armor {
    #[handler(priority = High)]
    fn reduce(&self, damage: &mut Damage) {
        if damage.attack.target == self.owner {
            damage.amount = damage.amount.saturating_sub(self.reduction);
        }
    }
}

#[derive(Listener)]
struct Dodge {
    id: ListenerId,
    owner: &'static str,
    rolls: Mutex<Vec<bool>>,
}

#[handlers]
impl Dodge {
    #[handler(priority = Highest)]
    fn roll(&self, attack: &mut Attack) {
        if attack.target != self.owner {
            return;
        }
        let dodged = self.rolls.lock().unwrap().pop().unwrap_or(false);
        if dodged {
            attack.cancel();
        }
    }
}

#[derive(Listener)]
struct Health {
    id: ListenerId,
    owner: &'static str,
    points: AtomicU32,
    bus: Bus,
}

#[handlers]
impl Health {
    #[handler(priority = Final)]
    fn settle(&self, damage: &mut Damage) {
        if damage.is_cancelled() || damage.attack.target != self.owner {
            return;
        }
        let before = self.points.load(Ordering::SeqCst);
        let after = before.saturating_sub(damage.amount);
        self.points.store(after, Ordering::SeqCst);
        if before > 0 && after == 0 {
            self.bus
                .enqueue(Defeated {
                    state: EventState::new(),
                    name: self.owner,
                })
                .unwrap();
        }
    }
}

#[test]
fn test_combat_round() {
    let observer = RecordingObserver::new();
    let bus = Bus::builder("arena")
        .observer(observer.clone())
        .observer(TracingObserver::failures_only())
        .build();

    let armor = ScopedListener::new(
        &bus,
        Armor {
            id: ListenerId::next(),
            owner: "knight",
            reduction: 3,
        },
    )
    .unwrap();
    let dodge = ScopedListener::new(
        &bus,
        Dodge {
            id: ListenerId::next(),
            owner: "knight",
            // Popped from the back: hit, dodge.
            rolls: Mutex::new(vec![true, false]),
        },
    )
    .unwrap();
    let health = Arc::new(Health {
        id: ListenerId::next(),
        owner: "knight",
        points: AtomicU32::new(10),
        bus: bus.clone(),
    });
    bus.register_static(&health).unwrap();

    let defeated = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&defeated);
    bus.register_dynamic::<Defeated, _, _>(&*health, Priority::Normal, move |event| {
        sink.lock().unwrap().push(event.name)
    })
    .unwrap();

    // Landed: 8 - 3 armor.
    let first = bus.dispatch(Damage::new("orc", "knight", 8)).unwrap();
    assert!(!first.is_cancelled());
    assert_eq!(first.amount, 5);
    assert_eq!(first.attack.attacker, "orc");
    assert_eq!(health.points.load(Ordering::SeqCst), 5);

    // Dodged: health ignores the cancelled hit.
    let second = bus.dispatch(Damage::new("orc", "knight", 8)).unwrap();
    assert!(second.is_cancelled());
    assert_eq!(health.points.load(Ordering::SeqCst), 5);

    // No more dodges; 9 - 3 is lethal.
    bus.dispatch(Damage::new("troll", "knight", 9)).unwrap();
    assert_eq!(health.points.load(Ordering::SeqCst), 0);
    assert!(defeated.lock().unwrap().is_empty());
    assert_eq!(bus.pending_len(), 1);

    let report = bus.drain();
    assert_eq!(report.dispatched, 1);
    assert_eq!(*defeated.lock().unwrap(), vec!["knight"]);

    // Teardown of the scoped modifiers.
    drop(armor);
    drop(dodge);
    let raw = bus.dispatch(Damage::new("orc", "knight", 8)).unwrap();
    assert_eq!(raw.amount, 8);

    assert_eq!(
        observer.events(),
        vec!["Damage", "Damage", "Damage", "Defeated", "Damage"]
    );
    assert!(observer.records().iter().all(|record| record.is_clean()));
    assert!(observer.records()[1].cancelled);

    assert_eq!(bus.unregister_all(&*health), 2);
}
