//! Named, overwritable durable settings.
//!
//! Unlike events, a flag holds only its latest value.  The controller keeps
//! the armed state in the [`ARMED`] flag (1 = armed, 0 = disarmed) so the
//! status survives restarts.

use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// Name of the flag holding the armed state.
pub const ARMED: &str = "armed";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flag {
    pub name: String,
    pub value: i64,
    /// Nanoseconds since the Unix epoch of the last write.
    pub time: u64,
}

impl Flag {
    pub fn armed(armed: bool, time: u64) -> Self {
        Self {
            name: ARMED.to_string(),
            value: i64::from(armed),
            time,
        }
    }

    /// Any non-zero value counts as set.
    pub fn is_set(&self) -> bool {
        self.value != 0
    }
}

pub fn encode(flag: &Flag) -> Result<Vec<u8>, StorageError> {
    Ok(postcard::to_allocvec(flag)?)
}

pub fn decode(bytes: &[u8]) -> Result<Flag, StorageError> {
    Ok(postcard::from_bytes(bytes)?)
}
