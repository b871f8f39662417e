//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Controller / SensorWatcher (domain)
//! ```
//!
//! Driven adapters (SQLite store, GPIO, SMTP, wall clock, settings file)
//! implement these traits.  The domain holds them behind `Arc` / generics,
//! so it never touches a database, a pin or a socket directly.
//!
//! ## Durability and concurrency notes
//!
//! - **EventLog** / **FlagStore** writes MUST be durable before `Ok` is
//!   returned, and all-or-nothing.
//! - Both are shared by every watcher thread and the controller, so
//!   implementations serialize writers internally.
//! - **AlertSink::notify** MUST NOT block; delivery failures stay inside the
//!   sink.

use std::collections::BTreeMap;
use std::time::Duration;

use embedded_hal::digital::InputPin;

use crate::error::{ConfigError, FlagError, HardwareError, NotificationError, StorageError};
use crate::events::Event;
use crate::flags::Flag;

use super::events::Alert;

// ───────────────────────────────────────────────────────────────
// Event log port (domain → durable history)
// ───────────────────────────────────────────────────────────────

/// Append-only, time-keyed history of arm/disarm and open/close events.
pub trait EventLog: Send + Sync {
    /// Store one event.  A zero `time` is replaced with the current time;
    /// colliding times are moved forward until unique.  Returns the event
    /// exactly as stored.
    fn append(&self, event: Event) -> Result<Event, StorageError>;

    /// Every stored event, most recent first.
    fn list_descending(&self) -> Result<Vec<Event>, StorageError>;

    /// At most `limit` events strictly older than `before` (or starting at
    /// the newest when `None`), most recent first.
    fn page_descending(&self, before: Option<u64>, limit: usize)
    -> Result<Vec<Event>, StorageError>;
}

// ───────────────────────────────────────────────────────────────
// Flag store port (domain ↔ durable current state)
// ───────────────────────────────────────────────────────────────

/// One overwritable value per name.
pub trait FlagStore: Send + Sync {
    fn set_flag(&self, name: &str, value: i64, time: u64) -> Result<(), StorageError>;

    /// Absence is reported as [`FlagError::NotFound`]; the caller picks the
    /// fallback.
    fn get_flag(&self, name: &str) -> Result<Flag, FlagError>;
}

// ───────────────────────────────────────────────────────────────
// Time port
// ───────────────────────────────────────────────────────────────

pub trait Clock: Send + Sync {
    /// Wall-clock nanoseconds since the Unix epoch.
    fn now_ns(&self) -> u64;
}

// ───────────────────────────────────────────────────────────────
// GPIO ports (hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Which level changes wake a waiting watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Rising,
    Falling,
    Both,
}

impl Edge {
    /// Whether a change from `from` to `to` counts as this edge.
    pub fn matches(self, from: bool, to: bool) -> bool {
        match self {
            Self::Rising => !from && to,
            Self::Falling => from && !to,
            Self::Both => from != to,
        }
    }
}

/// An opened input pin.
///
/// Reading comes from [`InputPin`]; watching is a blocking wait with a
/// timeout so the owning thread can notice shutdown.
pub trait PinHandle: InputPin<Error = HardwareError> + Send {
    /// GPIO number this handle is bound to.
    fn number(&self) -> u32;

    /// Block until the level changes as described by `edge`, or until
    /// `timeout` passes.  Returns `true` when an edge was seen.
    fn wait_for_edge(&mut self, edge: Edge, timeout: Duration) -> Result<bool, HardwareError>;

    /// Release the pin.
    fn close(self) -> Result<(), HardwareError>
    where
        Self: Sized;
}

/// Opens pins by number.  Shared by every watcher thread.
pub trait PinDriver: Send + Sync {
    type Pin: PinHandle + 'static;

    fn open_pin(&self, pin: u32) -> Result<Self::Pin, HardwareError>;
}

// ───────────────────────────────────────────────────────────────
// Alert ports (domain → outside world)
// ───────────────────────────────────────────────────────────────

/// Fire-and-forget alert hand-off used by sensor watchers.
pub trait AlertSink: Send + Sync {
    fn notify(&self, alert: Alert);
}

/// One concrete delivery channel (SMTP, log, ...), driven by the dispatcher.
pub trait AlertTransport: Send {
    /// Short name for log lines.
    fn name(&self) -> &'static str;

    fn send(&mut self, alert: &Alert) -> Result<(), NotificationError>;
}

// ───────────────────────────────────────────────────────────────
// Configuration port
// ───────────────────────────────────────────────────────────────

/// Supplies raw `key → value` settings; interpretation lives in
/// [`SystemConfig::from_settings`](crate::config::SystemConfig::from_settings).
pub trait ConfigPort {
    fn load(&self) -> Result<BTreeMap<String, String>, ConfigError>;
}
