//! MonitorHub lifecycle on simulated pins.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use doorwatch::adapters::sim_gpio::SimGpio;
use doorwatch::config::SensorConfig;
use doorwatch::events::Action;
use doorwatch::sensors::watcher::WatchTiming;
use doorwatch::sensors::{MonitorHub, SensorState};

use crate::mock_hw::{Rig, UnreadableGpio};

fn sensors() -> Vec<SensorConfig> {
    [("Front Door", 4), ("Deck Door", 17), ("Laundry Door", 27)]
        .into_iter()
        .map(|(name, pin)| SensorConfig {
            name: name.into(),
            pin,
        })
        .collect()
}

fn timing() -> WatchTiming {
    WatchTiming {
        error_backoff: Duration::from_millis(1),
        max_failures: 3,
        ..WatchTiming::new(5, Duration::from_millis(1))
    }
}

fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    false
}

#[test]
fn unavailable_pin_only_disables_its_sensor() {
    let rig = Rig::new();
    let gpio = SimGpio::new();
    gpio.fail_pin(17);
    gpio.set_level(27, true);

    let hub = MonitorHub::start(&sensors(), Arc::new(gpio.clone()), timing(), rig.context());
    assert!(hub.wait_ready(Duration::from_secs(5)));

    let snap = hub.snapshot();
    assert_eq!(snap[0].state, SensorState::Closed);
    assert_eq!(snap[1].state, SensorState::Unmonitored);
    assert_eq!(snap[2].state, SensorState::Open);

    // The healthy watchers still react.
    gpio.set_level(4, true);
    assert!(wait_for(|| hub.sensors()[0].state() == SensorState::Open));
    hub.shutdown();

    let events = rig.store.sensor_events("Front Door");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].action, Action::Open);
}

#[test]
fn unreadable_first_sample_disables_sensor_and_releases_pin() {
    let rig = Rig::new();
    let gpio = SimGpio::new();
    let driver = Arc::new(UnreadableGpio::new(gpio.clone(), [17]));

    let hub = MonitorHub::start(&sensors(), Arc::clone(&driver), timing(), rig.context());
    assert!(hub.wait_ready(Duration::from_secs(5)));
    assert_eq!(hub.sensors()[1].state(), SensorState::Unmonitored);
    assert_eq!(hub.sensors()[0].state(), SensorState::Closed);
    assert!(wait_for(|| !gpio.is_open(17)));
    assert_eq!(driver.closed(), vec![17]);

    gpio.set_level(27, true);
    assert!(wait_for(|| hub.sensors()[2].state() == SensorState::Open));
    hub.shutdown();

    assert!(rig.store.sensor_events("Deck Door").is_empty());
    let mut closed = driver.closed();
    closed.sort_unstable();
    assert_eq!(closed, vec![4, 17, 27]);
}

#[test]
fn repeated_read_failures_give_up_on_one_sensor() {
    let rig = Rig::new();
    let gpio = SimGpio::new();
    let hub = MonitorHub::start(&sensors(), Arc::new(gpio.clone()), timing(), rig.context());
    assert!(hub.wait_ready(Duration::from_secs(5)));

    gpio.fail_pin(4);
    assert!(wait_for(|| hub.sensors()[0].state() == SensorState::Unmonitored));
    assert!(wait_for(|| !gpio.is_open(4)), "failed pin not released");

    gpio.set_level(17, true);
    assert!(wait_for(|| hub.sensors()[1].state() == SensorState::Open));
    assert_eq!(hub.sensors()[2].state(), SensorState::Closed);
    hub.shutdown();

    assert!(rig.store.sensor_events("Front Door").is_empty());
}

#[test]
fn shutdown_releases_every_pin() {
    let rig = Rig::new();
    let gpio = SimGpio::new();
    let hub = MonitorHub::start(&sensors(), Arc::new(gpio.clone()), timing(), rig.context());
    assert!(hub.wait_ready(Duration::from_secs(5)));
    for pin in [4, 17, 27] {
        assert!(gpio.is_open(pin));
    }

    hub.shutdown();
    for pin in [4, 17, 27] {
        assert!(!gpio.is_open(pin), "GPIO{pin} still held");
    }
}

#[test]
fn simultaneous_transitions_stay_per_sensor() {
    let rig = Rig::new();
    let gpio = SimGpio::new();
    let hub = MonitorHub::start(&sensors(), Arc::new(gpio.clone()), timing(), rig.context());
    assert!(hub.wait_ready(Duration::from_secs(5)));

    for pin in [4, 17, 27] {
        gpio.set_level(pin, true);
    }
    assert!(wait_for(|| hub
        .sensors()
        .iter()
        .all(|s| s.state() == SensorState::Open)));
    hub.shutdown();

    for name in ["Front Door", "Deck Door", "Laundry Door"] {
        let events = rig.store.sensor_events(name);
        assert_eq!(events.len(), 1, "{name}");
        assert_eq!(events[0].action, Action::Open);
    }
    let times: Vec<u64> = rig.store.events_oldest_first().iter().map(|e| e.time).collect();
    let mut unique = times.clone();
    unique.dedup();
    assert_eq!(times, unique);
}
