//! Monitor service: the operations an outer layer (HTTP, console) calls.
//!
//! [`MonitorService`] owns no state of its own.  It forwards writes to the
//! [`Controller`] and reads to the event log, status cell and sensor
//! records.
//!
//! ```text
//!  console / HTTP ──▶ ┌────────────────┐ ──▶ Controller ──▶ EventLog + FlagStore
//!                     │ MonitorService │ ──▶ EventLog (reads)
//!                     └────────────────┘ ──▶ StatusCell, Sensor records
//! ```

use std::sync::Arc;

use log::warn;
use serde::Serialize;

use super::commands::{Command, HELP};
use super::controller::Controller;
use super::ports::{EventLog, FlagStore};
use super::status::SystemStatus;
use crate::error::StorageError;
use crate::events::Event;
use crate::sensors::{Sensor, SensorSnapshot};

/// Everything a status page shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonitorSnapshot {
    pub system: SystemStatus,
    pub sensors: Vec<SensorSnapshot>,
}

pub struct MonitorService<S> {
    controller: Arc<Controller<S>>,
    store: Arc<S>,
    sensors: Vec<Arc<Sensor>>,
}

impl<S: EventLog + FlagStore> MonitorService<S> {
    pub fn new(controller: Arc<Controller<S>>, store: Arc<S>, sensors: Vec<Arc<Sensor>>) -> Self {
        Self {
            controller,
            store,
            sensors,
        }
    }

    pub fn arm(&self) -> Result<SystemStatus, StorageError> {
        self.controller.arm()
    }

    pub fn disarm(&self) -> Result<SystemStatus, StorageError> {
        self.controller.disarm()
    }

    /// Full history, most recent first.
    pub fn list_events(&self) -> Result<Vec<Event>, StorageError> {
        self.store.list_descending()
    }

    /// The `limit` most recent events.
    pub fn recent_events(&self, limit: usize) -> Result<Vec<Event>, StorageError> {
        self.store.page_descending(None, limit)
    }

    pub fn snapshot(&self) -> MonitorSnapshot {
        MonitorSnapshot {
            system: self.controller.status(),
            sensors: self.sensors.iter().map(|s| s.snapshot()).collect(),
        }
    }

    /// Run one console command and render its reply.
    pub fn execute(&self, cmd: &Command) -> String {
        match cmd {
            Command::Arm => render_status(self.arm()),
            Command::Disarm => render_status(self.disarm()),
            Command::Status => to_json(&self.snapshot()),
            Command::Events { limit } => match self.recent_events(*limit) {
                Ok(events) => to_json(&events),
                Err(e) => format!("error: {e}"),
            },
            Command::SetPin { .. } => "error: pin control needs gpio_backend = sim".to_string(),
            Command::Help => HELP.to_string(),
        }
    }
}

fn render_status(result: Result<SystemStatus, StorageError>) -> String {
    match result {
        Ok(s) => to_json(&s),
        Err(e) => format!("error: {e} (status unchanged)"),
    }
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| {
        warn!("service: JSON render failed: {}", e);
        format!("error: {e}")
    })
}
