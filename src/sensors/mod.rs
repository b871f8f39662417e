//! Sensor subsystem: per-sensor records and the [`MonitorHub`] that runs
//! one [`watcher::SensorWatcher`] thread for each of them.
//!
//! ```text
//!   SensorConfig ──▶ MonitorHub::start ──▶ [watch-gpio4] [watch-gpio17] ...
//!                         │                       │
//!                         └── snapshot() ◀── Arc<Sensor> (state written by its watcher only)
//! ```

pub mod debounce;
pub mod watcher;

use core::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{error, info, warn};
use serde::Serialize;

use crate::app::ports::{PinDriver, PinHandle};
use crate::config::SensorConfig;
use crate::worker::{self, WATCHER_STACK_KB};
use watcher::{SensorWatcher, WatchContext, WatchTiming};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum SensorState {
    /// Watcher not yet started.
    Unknown = 0,
    Closed = 1,
    Open = 2,
    /// The pin could not be opened or read; nobody is watching this sensor.
    Unmonitored = 3,
}

impl SensorState {
    /// HIGH = open.
    pub const fn from_level(open: bool) -> Self {
        if open { Self::Open } else { Self::Closed }
    }

    const fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Closed,
            2 => Self::Open,
            3 => Self::Unmonitored,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for SensorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unknown => "unknown",
            Self::Closed => "closed",
            Self::Open => "open",
            Self::Unmonitored => "unmonitored",
        })
    }
}

/// One configured contact.  Name and pin are fixed; the state is written
/// by the sensor's own watcher and read by anyone.
#[derive(Debug)]
pub struct Sensor {
    name: String,
    pin: u32,
    state: AtomicU8,
}

impl Sensor {
    pub fn new(name: impl Into<String>, pin: u32) -> Self {
        Self {
            name: name.into(),
            pin,
            state: AtomicU8::new(SensorState::Unknown as u8),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pin(&self) -> u32 {
        self.pin
    }

    pub fn state(&self) -> SensorState {
        SensorState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn set_state(&self, state: SensorState) {
        self.state.store(state as u8, Ordering::Release);
    }

    pub fn snapshot(&self) -> SensorSnapshot {
        SensorSnapshot {
            name: self.name.clone(),
            pin: self.pin,
            state: self.state(),
        }
    }
}

/// Point-in-time copy of one sensor, for queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SensorSnapshot {
    pub name: String,
    pub pin: u32,
    pub state: SensorState,
}

/// Owns the watcher threads.
pub struct MonitorHub {
    sensors: Vec<Arc<Sensor>>,
    stop: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
}

impl MonitorHub {
    /// Start one watcher per sensor.  A sensor whose pin cannot be opened or
    /// first read is marked [`SensorState::Unmonitored`]; the others run on.
    pub fn start<D>(
        sensors: &[SensorConfig],
        driver: Arc<D>,
        timing: WatchTiming,
        ctx: WatchContext,
    ) -> Self
    where
        D: PinDriver + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let mut records = Vec::with_capacity(sensors.len());
        let mut workers = Vec::with_capacity(sensors.len());

        for cfg in sensors {
            let sensor = Arc::new(Sensor::new(cfg.name.clone(), cfg.pin));
            records.push(Arc::clone(&sensor));

            let thread_sensor = Arc::clone(&sensor);
            let driver = Arc::clone(&driver);
            let ctx = ctx.clone();
            let stop = Arc::clone(&stop);
            let spawned = worker::spawn_named(
                format!("watch-gpio{}", cfg.pin),
                WATCHER_STACK_KB,
                move || watch(thread_sensor, driver.as_ref(), timing, ctx, &stop),
            );
            match spawned {
                Ok(h) => workers.push(h),
                Err(e) => {
                    error!("hub: cannot start watcher for {}: {}", sensor.name(), e);
                    sensor.set_state(SensorState::Unmonitored);
                }
            }
        }

        info!("hub: {} watcher(s) started", workers.len());
        Self {
            sensors: records,
            stop,
            workers,
        }
    }

    pub fn sensors(&self) -> &[Arc<Sensor>] {
        &self.sensors
    }

    pub fn snapshot(&self) -> Vec<SensorSnapshot> {
        self.sensors.iter().map(|s| s.snapshot()).collect()
    }

    /// Block until every sensor has left [`SensorState::Unknown`], or until
    /// `timeout`.  Returns whether all of them did.
    pub fn wait_ready(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.sensors.iter().all(|s| s.state() != SensorState::Unknown) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(2));
        }
    }

    /// Signal every watcher, wait for each to release its pin.
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        if self.workers.is_empty() {
            return;
        }
        self.stop.store(true, Ordering::Release);
        for h in self.workers.drain(..) {
            let name = h.thread().name().unwrap_or("watcher").to_string();
            if h.join().is_err() {
                error!("hub: {} panicked", name);
            }
        }
        info!("hub: all watchers stopped");
    }
}

impl Drop for MonitorHub {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

/// Body of one watcher thread.
fn watch<D: PinDriver>(
    sensor: Arc<Sensor>,
    driver: &D,
    timing: WatchTiming,
    ctx: WatchContext,
    stop: &AtomicBool,
) {
    let pin = match driver.open_pin(sensor.pin()) {
        Ok(pin) => pin,
        Err(e) => {
            error!("hub: {} not monitored: {}", sensor.name(), e);
            sensor.set_state(SensorState::Unmonitored);
            return;
        }
    };

    let mut w = SensorWatcher::new(Arc::clone(&sensor), pin, timing, ctx);
    if let Err(e) = w.prime() {
        error!("hub: {} not monitored: {}", sensor.name(), e);
        sensor.set_state(SensorState::Unmonitored);
        if let Err(e) = w.into_pin().close() {
            warn!("hub: {} pin release failed: {}", sensor.name(), e);
        }
        return;
    }
    w.run(stop);
}
