//! Linux sysfs GPIO adapter.
//!
//! Implements [`PinDriver`] over the legacy `/sys/class/gpio` interface:
//!
//! ```text
//!   <root>/export            write "N" to claim GPIO N
//!   <root>/unexport          write "N" to release it
//!   <root>/gpioN/direction   "in"
//!   <root>/gpioN/edge        "both" (best effort)
//!   <root>/gpioN/value       "0" / "1"
//! ```
//!
//! Edge waits sample `value` every `poll_interval`; the debouncer upstream
//! absorbs the sampling jitter.  The root is configurable so tests can point
//! it at a scratch directory.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use embedded_hal::digital::{ErrorType, InputPin};
use log::{debug, info, warn};

use crate::app::ports::{Edge, PinDriver, PinHandle};
use crate::error::HardwareError;

/// Attempts at configuring a freshly exported pin; udev may still be
/// fixing permissions on the new node.
const SETUP_ATTEMPTS: u32 = 5;
const SETUP_RETRY: Duration = Duration::from_millis(20);

pub struct SysfsGpio {
    root: PathBuf,
    poll_interval: Duration,
}

impl SysfsGpio {
    pub fn new(root: impl Into<PathBuf>, poll_interval: Duration) -> Self {
        Self {
            root: root.into(),
            poll_interval: poll_interval.max(Duration::from_millis(1)),
        }
    }

    fn pin_dir(&self, pin: u32) -> PathBuf {
        self.root.join(format!("gpio{pin}"))
    }
}

fn write_attr(path: &Path, value: &str) -> io::Result<()> {
    fs::write(path, value)
}

impl PinDriver for SysfsGpio {
    type Pin = SysfsPin;

    fn open_pin(&self, pin: u32) -> Result<SysfsPin, HardwareError> {
        let unavailable = |reason: String| HardwareError::PinUnavailable { pin, reason };
        let dir = self.pin_dir(pin);

        let exported = if dir.exists() {
            debug!("gpio: GPIO{} already exported", pin);
            false
        } else {
            write_attr(&self.root.join("export"), &pin.to_string())
                .map_err(|e| unavailable(format!("export: {e}")))?;
            true
        };

        let mut attempt = 0;
        loop {
            match write_attr(&dir.join("direction"), "in") {
                Ok(()) => break,
                Err(e) if attempt + 1 < SETUP_ATTEMPTS => {
                    debug!("gpio: GPIO{} direction not ready ({}), retrying", pin, e);
                    attempt += 1;
                    thread::sleep(SETUP_RETRY);
                }
                Err(e) => {
                    if exported {
                        if let Err(ue) = write_attr(&self.root.join("unexport"), &pin.to_string()) {
                            warn!("gpio: GPIO{} unexport after failed open: {}", pin, ue);
                        }
                    }
                    return Err(unavailable(format!("direction: {e}")));
                }
            }
        }

        if let Err(e) = write_attr(&dir.join("edge"), "both") {
            debug!("gpio: GPIO{} edge attribute not set: {}", pin, e);
        }

        info!("gpio: GPIO{} opened as input", pin);
        Ok(SysfsPin {
            pin,
            value_path: dir.join("value"),
            unexport_path: exported.then(|| self.root.join("unexport")),
            poll_interval: self.poll_interval,
        })
    }
}

pub struct SysfsPin {
    pin: u32,
    value_path: PathBuf,
    /// Set when this handle exported the pin and must release it.
    unexport_path: Option<PathBuf>,
    poll_interval: Duration,
}

impl SysfsPin {
    fn read_level(&self) -> Result<bool, HardwareError> {
        let raw = fs::read_to_string(&self.value_path).map_err(|e| HardwareError::ReadFailed {
            pin: self.pin,
            reason: e.to_string(),
        })?;
        match raw.trim() {
            "1" => Ok(true),
            "0" => Ok(false),
            other => Err(HardwareError::ReadFailed {
                pin: self.pin,
                reason: format!("unexpected value {other:?}"),
            }),
        }
    }
}

impl ErrorType for SysfsPin {
    type Error = HardwareError;
}

impl InputPin for SysfsPin {
    fn is_high(&mut self) -> Result<bool, HardwareError> {
        self.read_level()
    }

    fn is_low(&mut self) -> Result<bool, HardwareError> {
        self.read_level().map(|h| !h)
    }
}

impl PinHandle for SysfsPin {
    fn number(&self) -> u32 {
        self.pin
    }

    fn wait_for_edge(&mut self, edge: Edge, timeout: Duration) -> Result<bool, HardwareError> {
        let watch_err = |e: HardwareError| HardwareError::WatchFailed {
            pin: e.pin(),
            reason: e.to_string(),
        };
        let deadline = Instant::now() + timeout;
        let mut last = self.read_level().map_err(watch_err)?;
        loop {
            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            thread::sleep(self.poll_interval.min(deadline - now));
            let level = self.read_level().map_err(watch_err)?;
            if edge.matches(last, level) {
                return Ok(true);
            }
            last = level;
        }
    }

    fn close(self) -> Result<(), HardwareError> {
        if let Some(path) = &self.unexport_path {
            write_attr(path, &self.pin.to_string()).map_err(|e| {
                warn!("gpio: GPIO{} unexport failed: {}", self.pin, e);
                HardwareError::PinUnavailable {
                    pin: self.pin,
                    reason: format!("unexport: {e}"),
                }
            })?;
            debug!("gpio: GPIO{} released", self.pin);
        }
        Ok(())
    }
}
