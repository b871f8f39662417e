//! Sensor watcher: debounce, event emission and the alert trigger policy.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use doorwatch::adapters::sim_gpio::{SimGpio, SimPin};
use doorwatch::app::controller::Controller;
use doorwatch::app::ports::PinDriver;
use doorwatch::events::Action;
use doorwatch::sensors::watcher::{SensorWatcher, WatchTiming};
use doorwatch::sensors::{Sensor, SensorState};

use crate::mock_hw::Rig;

const DOOR: &str = "Front Door";
const PIN: u32 = 4;

fn timing() -> WatchTiming {
    WatchTiming {
        error_backoff: Duration::from_millis(1),
        max_failures: 3,
        ..WatchTiming::new(50, Duration::from_millis(1))
    }
}

fn watcher(rig: &Rig, gpio: &SimGpio) -> (SensorWatcher<SimPin>, Arc<Sensor>) {
    let sensor = Arc::new(Sensor::new(DOOR, PIN));
    let pin = gpio.open_pin(PIN).unwrap();
    let w = SensorWatcher::new(Arc::clone(&sensor), pin, timing(), rig.context());
    (w, sensor)
}

fn arm(rig: &Rig, armed: bool) {
    let c = Controller::new(Arc::clone(&rig.store), rig.clock.clone(), Arc::clone(&rig.status));
    if armed {
        c.arm().unwrap();
    } else {
        c.disarm().unwrap();
    }
}

#[test]
fn initial_state_comes_from_first_sample() {
    let rig = Rig::new();
    let gpio = SimGpio::new();
    gpio.set_level(PIN, true);
    let (mut w, sensor) = watcher(&rig, &gpio);
    assert_eq!(sensor.state(), SensorState::Unknown);
    assert!(w.prime().unwrap());
    assert_eq!(sensor.state(), SensorState::Open);
    assert!(rig.store.sensor_events(DOOR).is_empty());
}

#[test]
fn open_while_armed_records_and_alerts_once() {
    let rig = Rig::new();
    arm(&rig, true);
    let gpio = SimGpio::new();
    let (mut w, sensor) = watcher(&rig, &gpio);
    w.prime().unwrap();
    assert_eq!(sensor.state(), SensorState::Closed);

    assert!(w.on_sample(true, 0).is_none());
    assert!(w.on_sample(true, 20).is_none());
    let t = w.on_sample(true, 60).expect("transition after window");
    assert!(t.open && t.was_armed && t.alerted);
    assert!(w.on_sample(true, 200).is_none());

    assert_eq!(sensor.state(), SensorState::Open);
    let events = rig.store.sensor_events(DOOR);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].action, Action::Open);
    assert!(events[0].was_armed);
    assert_eq!(Some(events[0].clone()), t.event);

    let alerts = rig.alerts.all();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].sensor, DOOR);
    assert!(alerts[0].open);
    assert_eq!(alerts[0].time, events[0].time);
}

#[test]
fn close_while_disarmed_records_without_alert() {
    let rig = Rig::new();
    arm(&rig, false);
    let gpio = SimGpio::new();
    gpio.set_level(PIN, true);
    let (mut w, _) = watcher(&rig, &gpio);
    w.prime().unwrap();

    w.on_sample(false, 0);
    let t = w.on_sample(false, 50).unwrap();
    assert!(!t.open && !t.was_armed && !t.alerted);

    let events = rig.store.sensor_events(DOOR);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].action, Action::Close);
    assert!(!events[0].was_armed);
    assert_eq!(rig.alerts.count(), 0);
}

#[test]
fn glitch_shorter_than_window_is_ignored() {
    let rig = Rig::new();
    arm(&rig, true);
    let gpio = SimGpio::new();
    let (mut w, sensor) = watcher(&rig, &gpio);
    w.prime().unwrap();

    w.on_sample(true, 0);
    w.on_sample(false, 10);
    w.on_sample(true, 30);
    w.on_sample(false, 45);
    w.on_sample(false, 500);

    assert_eq!(sensor.state(), SensorState::Closed);
    assert!(rig.store.sensor_events(DOOR).is_empty());
    assert_eq!(rig.alerts.count(), 0);
}

#[test]
fn storage_fault_does_not_suppress_alert() {
    let rig = Rig::new();
    arm(&rig, true);
    let gpio = SimGpio::new();
    let (mut w, sensor) = watcher(&rig, &gpio);
    w.prime().unwrap();

    rig.store.fail_append.store(true, Ordering::SeqCst);
    w.on_sample(true, 0);
    let t = w.on_sample(true, 50).unwrap();

    assert!(t.event.is_none());
    assert!(t.alerted);
    assert_eq!(sensor.state(), SensorState::Open);
    assert_eq!(rig.alerts.count(), 1);
}

#[test]
fn consecutive_events_alternate() {
    let rig = Rig::new();
    let gpio = SimGpio::new();
    let (mut w, _) = watcher(&rig, &gpio);
    w.prime().unwrap();

    let mut now = 0;
    for level in [true, true, false, false, false, true, false, true, true] {
        w.on_sample(level, now);
        now += 60;
        w.on_sample(level, now);
        now += 60;
    }

    let actions: Vec<Action> = rig.store.sensor_events(DOOR).iter().map(|e| e.action).collect();
    assert!(!actions.is_empty());
    for pair in actions.windows(2) {
        assert_ne!(pair[0], pair[1]);
    }
}

#[test]
fn running_watcher_follows_pin_and_releases_it() {
    let rig = Rig::new();
    arm(&rig, true);
    let gpio = SimGpio::new();
    let (mut w, sensor) = watcher(&rig, &gpio);
    w.prime().unwrap();

    let stop = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&stop);
    let h = thread::spawn(move || w.run(&flag));

    gpio.set_level(PIN, true);
    let deadline = Instant::now() + Duration::from_secs(5);
    while sensor.state() != SensorState::Open && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(sensor.state(), SensorState::Open);

    stop.store(true, Ordering::SeqCst);
    h.join().unwrap();
    assert!(!gpio.is_open(PIN));
    assert_eq!(rig.alerts.count(), 1);
}
