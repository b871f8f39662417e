//! Event records and their storage encoding.
//!
//! Every arm, disarm and sensor open/close becomes one immutable [`Event`]
//! in the "events" collection.  The key is the event time in nanoseconds,
//! encoded big-endian so that byte order equals chronological order:
//!
//! ```text
//!  key   = [u8; 8]  big-endian time_ns
//!  value = postcard(Event)
//! ```

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// Name used for events produced by the arm/disarm controller.
pub const SYSTEM_SOURCE: &str = "system";

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Arm,
    Disarm,
    Open,
    Close,
}

impl Action {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Arm => "arm",
            Self::Disarm => "disarm",
            Self::Open => "open",
            Self::Close => "close",
        }
    }

    /// Sensor action for a debounced pin level (HIGH = open).
    pub const fn for_level(open: bool) -> Self {
        if open { Self::Open } else { Self::Close }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the append-only log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Nanoseconds since the Unix epoch; 0 means "assign on append".
    pub time: u64,
    /// Sensor name, or [`SYSTEM_SOURCE`].
    pub name: String,
    pub action: Action,
    /// Whether the system was armed when this happened.
    pub was_armed: bool,
}

impl Event {
    /// An arm/disarm event; `was_armed` is the status before the change.
    pub fn system(action: Action, was_armed: bool) -> Self {
        Self {
            time: 0,
            name: SYSTEM_SOURCE.to_string(),
            action,
            was_armed,
        }
    }

    /// A sensor open/close event.
    pub fn sensor(name: impl Into<String>, open: bool, was_armed: bool) -> Self {
        Self {
            time: 0,
            name: name.into(),
            action: Action::for_level(open),
            was_armed,
        }
    }
}

// ── Key / value codec ─────────────────────────────────────────

/// Storage key for an event time.
pub fn key_for(time: u64) -> [u8; 8] {
    time.to_be_bytes()
}

/// Recover the event time from a stored key.
pub fn time_from_key(key: &[u8]) -> Result<u64, StorageError> {
    let bytes: [u8; 8] = key
        .try_into()
        .map_err(|_| StorageError::Corrupted("event key is not 8 bytes"))?;
    Ok(u64::from_be_bytes(bytes))
}

pub fn encode(event: &Event) -> Result<Vec<u8>, StorageError> {
    Ok(postcard::to_allocvec(event)?)
}

pub fn decode(bytes: &[u8]) -> Result<Event, StorageError> {
    Ok(postcard::from_bytes(bytes)?)
}
