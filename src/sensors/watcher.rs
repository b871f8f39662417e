//! Per-sensor watcher.
//!
//! One [`SensorWatcher`] runs on its own thread for each configured sensor.
//! It blocks on the pin's edge wait, feeds every wake-up sample through the
//! [`Debouncer`], and on an accepted change:
//!
//! 1. records the new state on its [`Sensor`],
//! 2. appends an open/close [`Event`] carrying the current armed status,
//! 3. hands an [`Alert`] to the dispatcher when the system is armed.
//!
//! Only this watcher writes its sensor's state.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};

use super::debounce::Debouncer;
use super::{Sensor, SensorState};
use crate::app::events::Alert;
use crate::app::ports::{AlertSink, Clock, Edge, EventLog, PinHandle};
use crate::app::status::StatusCell;
use crate::error::HardwareError;
use crate::events::Event;

/// Longest a watcher blocks before re-checking the stop flag.
pub const IDLE_WAIT: Duration = Duration::from_millis(250);
pub const DEFAULT_ERROR_BACKOFF: Duration = Duration::from_millis(500);
pub const DEFAULT_MAX_FAILURES: u32 = 20;

/// Shared collaborators every watcher needs.
#[derive(Clone)]
pub struct WatchContext {
    pub log: Arc<dyn EventLog>,
    pub status: Arc<StatusCell>,
    pub alerts: Arc<dyn AlertSink>,
    pub clock: Arc<dyn Clock>,
}

#[derive(Debug, Clone, Copy)]
pub struct WatchTiming {
    pub debounce_ms: u32,
    /// Re-sample period while a change is settling.
    pub poll_interval: Duration,
    /// Pause after a failed read or wait.
    pub error_backoff: Duration,
    /// Consecutive hardware failures before the sensor is given up on.
    pub max_failures: u32,
}

impl WatchTiming {
    pub fn new(debounce_ms: u32, poll_interval: Duration) -> Self {
        Self {
            debounce_ms,
            poll_interval,
            error_backoff: DEFAULT_ERROR_BACKOFF,
            max_failures: DEFAULT_MAX_FAILURES,
        }
    }
}

/// Outcome of one accepted transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub open: bool,
    pub was_armed: bool,
    /// The stored event, `None` when the append failed.
    pub event: Option<Event>,
    pub alerted: bool,
}

pub struct SensorWatcher<P: PinHandle> {
    sensor: Arc<Sensor>,
    pin: P,
    debouncer: Debouncer,
    ctx: WatchContext,
    poll_interval: Duration,
    error_backoff: Duration,
    max_failures: u32,
    epoch: Instant,
}

impl<P: PinHandle> SensorWatcher<P> {
    pub fn new(sensor: Arc<Sensor>, pin: P, timing: WatchTiming, ctx: WatchContext) -> Self {
        Self {
            sensor,
            pin,
            debouncer: Debouncer::new(timing.debounce_ms),
            ctx,
            poll_interval: timing.poll_interval.max(Duration::from_millis(1)),
            error_backoff: timing.error_backoff,
            max_failures: timing.max_failures.max(1),
            epoch: Instant::now(),
        }
    }

    /// Give the pin back without running (startup failure path).
    pub fn into_pin(self) -> P {
        self.pin
    }

    /// Take the first hardware sample as the sensor's initial state.
    /// No event is recorded for it.
    pub fn prime(&mut self) -> Result<bool, HardwareError> {
        let level = self.pin.is_high()?;
        self.debouncer.prime(level);
        self.sensor.set_state(SensorState::from_level(level));
        info!(
            "watch: {} (GPIO{}) starts {}",
            self.sensor.name(),
            self.sensor.pin(),
            SensorState::from_level(level)
        );
        Ok(level)
    }

    /// Feed one raw sample taken at `now_ms` (monotonic milliseconds).
    pub fn on_sample(&mut self, level: bool, now_ms: u64) -> Option<Transition> {
        let open = self.debouncer.sample(level, now_ms)?;
        let next = SensorState::from_level(open);
        if self.sensor.state() == next {
            return None;
        }
        Some(self.transition(open))
    }

    fn transition(&mut self, open: bool) -> Transition {
        self.sensor.set_state(SensorState::from_level(open));
        let was_armed = self.ctx.status.is_armed();

        let stored = self
            .ctx
            .log
            .append(Event::sensor(self.sensor.name(), open, was_armed));
        let event = match stored {
            Ok(e) => Some(e),
            Err(e) => {
                error!(
                    "watch: {} {} not recorded: {}",
                    self.sensor.name(),
                    SensorState::from_level(open),
                    e
                );
                None
            }
        };

        info!(
            "watch: {} -> {} (armed={})",
            self.sensor.name(),
            SensorState::from_level(open),
            was_armed
        );

        if was_armed {
            let time = event
                .as_ref()
                .map_or_else(|| self.ctx.clock.now_ns(), |e| e.time);
            self.ctx.alerts.notify(Alert {
                sensor: self.sensor.name().to_string(),
                pin: self.sensor.pin(),
                open,
                time,
            });
        }

        Transition {
            open,
            was_armed,
            event,
            alerted: was_armed,
        }
    }

    fn now_ms(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    fn wait_and_sample(&mut self) -> Result<bool, HardwareError> {
        let timeout = if self.debouncer.is_settling() {
            self.poll_interval
        } else {
            IDLE_WAIT
        };
        self.pin.wait_for_edge(Edge::Both, timeout)?;
        self.pin.is_high()
    }

    /// Run until `stop` is set or the pin keeps failing, then release it.
    pub fn run(mut self, stop: &AtomicBool) {
        let mut failures = 0u32;

        while !stop.load(Ordering::Acquire) {
            match self.wait_and_sample() {
                Ok(level) => {
                    if failures > 0 {
                        info!("watch: {} readable again", self.sensor.name());
                        failures = 0;
                    }
                    let now = self.now_ms();
                    self.on_sample(level, now);
                }
                Err(e) => {
                    failures += 1;
                    if failures == 1 {
                        warn!("watch: {}: {}", self.sensor.name(), e);
                    } else {
                        debug!("watch: {}: {} (x{})", self.sensor.name(), e, failures);
                    }
                    if failures >= self.max_failures {
                        error!(
                            "watch: {} (GPIO{}) failed {} times in a row, no longer monitored",
                            self.sensor.name(),
                            self.sensor.pin(),
                            failures
                        );
                        self.sensor.set_state(SensorState::Unmonitored);
                        break;
                    }
                    thread::sleep(self.error_backoff);
                }
            }
        }

        let name = self.sensor.name().to_string();
        match self.pin.close() {
            Ok(()) => debug!("watch: {} stopped, pin released", name),
            Err(e) => warn!("watch: {} stopped, pin release failed: {}", name, e),
        }
    }
}
