//! Arm/disarm controller against the in-memory store.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread;

use doorwatch::app::controller::Controller;
use doorwatch::app::ports::{EventLog, FlagStore};
use doorwatch::app::status::ArmState;
use doorwatch::config::FallbackPolicy;
use doorwatch::error::FlagError;
use doorwatch::events::{Action, SYSTEM_SOURCE};
use doorwatch::flags::ARMED;

use crate::mock_hw::{MemoryStore, Rig};

fn controller(rig: &Rig) -> Controller<MemoryStore> {
    Controller::new(
        Arc::clone(&rig.store),
        rig.clock.clone(),
        Arc::clone(&rig.status),
    )
}

fn latest_system_action(store: &MemoryStore) -> Option<Action> {
    store
        .list_descending()
        .unwrap()
        .into_iter()
        .find(|e| e.name == SYSTEM_SOURCE)
        .map(|e| e.action)
}

#[test]
fn status_and_log_agree_after_each_call() {
    let rig = Rig::new();
    let c = controller(&rig);
    for arm in [true, false, false, true, true, false] {
        rig.clock.advance(10);
        let s = if arm { c.arm() } else { c.disarm() }.unwrap();
        assert_eq!(s.status, ArmState::from_armed(arm));
        assert_eq!(rig.status.get(), s);
        assert_eq!(
            latest_system_action(&rig.store),
            Some(if arm { Action::Arm } else { Action::Disarm })
        );
        assert_eq!(rig.store.flag(ARMED).unwrap().value, i64::from(arm));
    }
}

#[test]
fn failed_append_changes_nothing() {
    let rig = Rig::new();
    let c = controller(&rig);
    c.disarm().unwrap();
    let before = rig.status.get();

    rig.store.fail_append.store(true, Ordering::SeqCst);
    assert!(c.arm().is_err());

    assert_eq!(rig.status.get(), before);
    assert_eq!(rig.store.flag(ARMED).unwrap().value, 0);
    assert_eq!(rig.store.events_oldest_first().len(), 1);
}

#[test]
fn failed_flag_write_leaves_status_unchanged() {
    let rig = Rig::new();
    let c = controller(&rig);
    c.disarm().unwrap();
    let before = rig.status.get();

    rig.store.fail_flag_write.store(true, Ordering::SeqCst);
    assert!(c.arm().is_err());

    assert_eq!(rig.status.get(), before);
    assert!(!rig.status.is_armed());
    // The log may run ahead of the status, never behind it.
    assert_eq!(latest_system_action(&rig.store), Some(Action::Arm));
}

#[test]
fn empty_store_falls_back_to_armed() {
    let rig = Rig::new();
    let c = controller(&rig);
    assert!(matches!(rig.store.get_flag(ARMED), Err(FlagError::NotFound(_))));

    let s = c.restore(FallbackPolicy::Armed);
    assert_eq!(s.status, ArmState::Armed);

    let events = rig.store.events_oldest_first();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].name, SYSTEM_SOURCE);
    assert_eq!(events[0].action, Action::Arm);
    assert!(!events[0].was_armed);
}

#[test]
fn unreadable_flag_follows_disarmed_policy() {
    let rig = Rig::new();
    let c = controller(&rig);
    rig.store.set_flag(ARMED, 1, 5).unwrap();
    rig.store.fail_flag_read.store(true, Ordering::SeqCst);

    let s = c.restore(FallbackPolicy::Disarmed);
    assert_eq!(s.status, ArmState::Disarmed);
    assert_eq!(latest_system_action(&rig.store), Some(Action::Disarm));
}

#[test]
fn fallback_still_applies_when_store_is_down() {
    let rig = Rig::new();
    let c = controller(&rig);
    rig.store.fail_append.store(true, Ordering::SeqCst);

    let s = c.restore(FallbackPolicy::Armed);
    assert_eq!(s.status, ArmState::Armed);
    assert_eq!(s.last_update, 1_000_000);
    assert!(rig.store.events_oldest_first().is_empty());
}

#[test]
fn restore_reads_existing_flag_without_writing() {
    let rig = Rig::new();
    let c = controller(&rig);
    rig.store.set_flag(ARMED, 1, 77).unwrap();
    let s = c.restore(FallbackPolicy::Disarmed);
    assert_eq!(s.status, ArmState::Armed);
    assert_eq!(s.last_update, 77);
    assert!(rig.store.events_oldest_first().is_empty());
}

#[test]
fn flag_reads_are_stable_without_writes() {
    let rig = Rig::new();
    let c = controller(&rig);
    c.arm().unwrap();
    let a = rig.store.get_flag(ARMED).unwrap();
    let b = rig.store.get_flag(ARMED).unwrap();
    assert_eq!(a, b);
}

#[test]
fn concurrent_callers_serialize() {
    let rig = Rig::new();
    let c = Arc::new(controller(&rig));
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let c = Arc::clone(&c);
            thread::spawn(move || {
                for _ in 0..10 {
                    if i % 2 == 0 {
                        c.arm().unwrap();
                    } else {
                        c.disarm().unwrap();
                    }
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let status = rig.status.get();
    let flag = rig.store.flag(ARMED).unwrap();
    assert_eq!(status.is_armed(), flag.is_set());
    assert_eq!(status.last_update, flag.time);
    assert_eq!(
        latest_system_action(&rig.store),
        Some(if status.is_armed() { Action::Arm } else { Action::Disarm })
    );
    assert_eq!(rig.store.events_oldest_first().len(), 80);

    // Each event's was_armed is the status left by the one before it.
    let events = rig.store.events_oldest_first();
    for pair in events.windows(2) {
        assert_eq!(pair[1].was_armed, pair[0].action == Action::Arm);
    }
}
