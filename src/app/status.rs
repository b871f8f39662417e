//! Process-wide armed/disarmed status.
//!
//! [`StatusCell`] is shared by `Arc` between the controller (sole writer)
//! and every sensor watcher and query (readers).  Readers get a copy; a
//! decision taken on that copy may already be stale when it is acted on.
//! A sensor transition racing a disarm can therefore still send one last
//! alert.

use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArmState {
    /// Not yet restored from the flag store.
    Unknown,
    Armed,
    Disarmed,
}

impl ArmState {
    pub fn from_armed(armed: bool) -> Self {
        if armed { Self::Armed } else { Self::Disarmed }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemStatus {
    pub status: ArmState,
    /// Nanoseconds since the Unix epoch of the last change.
    pub last_update: u64,
}

impl SystemStatus {
    pub fn is_armed(&self) -> bool {
        self.status == ArmState::Armed
    }
}

/// Single-writer, multi-reader holder of the [`SystemStatus`].
#[derive(Debug)]
pub struct StatusCell {
    inner: RwLock<SystemStatus>,
}

impl StatusCell {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(SystemStatus {
                status: ArmState::Unknown,
                last_update: 0,
            }),
        }
    }

    pub fn get(&self) -> SystemStatus {
        *self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_armed(&self) -> bool {
        self.get().is_armed()
    }

    /// Only the controller writes the status.
    pub(crate) fn set(&self, status: ArmState, at: u64) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        *guard = SystemStatus {
            status,
            last_update: at,
        };
    }
}

impl Default for StatusCell {
    fn default() -> Self {
        Self::new()
    }
}
