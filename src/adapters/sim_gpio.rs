//! Simulated GPIO bank.
//!
//! Implements [`PinDriver`] entirely in memory so the monitor can run on a
//! desk (`gpio_backend = sim`) and so watchers can be driven from tests.
//! Levels are changed through [`SimGpio::set_level`]; a pin handle blocked
//! in `wait_for_edge` wakes immediately.
//!
//! Unknown pins start LOW (contact closed).

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use embedded_hal::digital::{ErrorType, InputPin};
use log::debug;

use crate::app::ports::{Edge, PinDriver, PinHandle};
use crate::error::HardwareError;

#[derive(Debug, Default, Clone, Copy)]
struct Line {
    level: bool,
    /// Bumped on every level change.
    changes: u64,
    open: bool,
    failing: bool,
}

#[derive(Debug, Default)]
struct Bank {
    lines: Mutex<HashMap<u32, Line>>,
    changed: Condvar,
}

impl Bank {
    fn lock(&self) -> MutexGuard<'_, HashMap<u32, Line>> {
        self.lines.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Cloneable handle to one shared simulated bank.
#[derive(Debug, Clone, Default)]
pub struct SimGpio {
    bank: Arc<Bank>,
}

impl SimGpio {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drive a pin to `level` (HIGH = open).
    pub fn set_level(&self, pin: u32, level: bool) {
        let mut lines = self.bank.lock();
        let line = lines.entry(pin).or_default();
        if line.level != level {
            line.level = level;
            line.changes += 1;
            debug!("sim: GPIO{} -> {}", pin, if level { "HIGH" } else { "LOW" });
        }
        drop(lines);
        self.bank.changed.notify_all();
    }

    pub fn level(&self, pin: u32) -> bool {
        self.bank.lock().get(&pin).is_some_and(|l| l.level)
    }

    /// Make every later open/read/wait on `pin` fail.
    pub fn fail_pin(&self, pin: u32) {
        self.bank.lock().entry(pin).or_default().failing = true;
        self.bank.changed.notify_all();
    }

    /// Whether some handle currently holds `pin`.
    pub fn is_open(&self, pin: u32) -> bool {
        self.bank.lock().get(&pin).is_some_and(|l| l.open)
    }
}

impl PinDriver for SimGpio {
    type Pin = SimPin;

    fn open_pin(&self, pin: u32) -> Result<SimPin, HardwareError> {
        let mut lines = self.bank.lock();
        let line = lines.entry(pin).or_default();
        if line.failing {
            return Err(HardwareError::PinUnavailable {
                pin,
                reason: "simulated fault".into(),
            });
        }
        if line.open {
            return Err(HardwareError::PinUnavailable {
                pin,
                reason: "already in use".into(),
            });
        }
        line.open = true;
        Ok(SimPin {
            pin,
            bank: Arc::clone(&self.bank),
        })
    }
}

pub struct SimPin {
    pin: u32,
    bank: Arc<Bank>,
}

impl SimPin {
    fn line(&self) -> Result<Line, HardwareError> {
        let line = self.bank.lock().get(&self.pin).copied().unwrap_or_default();
        if line.failing {
            return Err(HardwareError::ReadFailed {
                pin: self.pin,
                reason: "simulated fault".into(),
            });
        }
        Ok(line)
    }
}

impl ErrorType for SimPin {
    type Error = HardwareError;
}

impl InputPin for SimPin {
    fn is_high(&mut self) -> Result<bool, HardwareError> {
        self.line().map(|l| l.level)
    }

    fn is_low(&mut self) -> Result<bool, HardwareError> {
        self.is_high().map(|h| !h)
    }
}

impl PinHandle for SimPin {
    fn number(&self) -> u32 {
        self.pin
    }

    fn wait_for_edge(&mut self, edge: Edge, timeout: Duration) -> Result<bool, HardwareError> {
        let start = self.line()?;
        let pin = self.pin;
        let guard = self.bank.lock();
        let (lines, _) = self
            .bank
            .changed
            .wait_timeout_while(guard, timeout, |lines| {
                let now = lines.get(&pin).copied().unwrap_or_default();
                !now.failing
                    && (now.changes == start.changes || !counts(edge, &start, &now))
            })
            .unwrap_or_else(PoisonError::into_inner);

        let now = lines.get(&pin).copied().unwrap_or_default();
        if now.failing {
            return Err(HardwareError::WatchFailed {
                pin,
                reason: "simulated fault".into(),
            });
        }
        Ok(now.changes != start.changes && counts(edge, &start, &now))
    }

    fn close(self) -> Result<(), HardwareError> {
        if let Some(line) = self.bank.lock().get_mut(&self.pin) {
            line.open = false;
        }
        Ok(())
    }
}

/// A glitch that returned to the starting level still wakes a `Both`
/// waiter; directional edges compare end levels.
fn counts(edge: Edge, start: &Line, now: &Line) -> bool {
    match edge {
        Edge::Both => true,
        _ => edge.matches(start.level, now.level),
    }
}
