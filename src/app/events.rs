//! Outbound alerts.
//!
//! A sensor watcher builds an [`Alert`] when its sensor changes state while
//! the system is armed, and hands it to an
//! [`AlertSink`](super::ports::AlertSink).  Adapters on the other side decide
//! how it leaves the box: e-mail, log line, etc.

use serde::Serialize;

/// One "sensor changed while armed" notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alert {
    pub sensor: String,
    pub pin: u32,
    /// New debounced state: `true` = open.
    pub open: bool,
    /// Time of the transition (nanoseconds since the Unix epoch).
    pub time: u64,
}

impl Alert {
    pub fn state_label(&self) -> &'static str {
        if self.open { "OPEN" } else { "CLOSED" }
    }

    /// One-line summary, e.g. `Front Door is now OPEN`.
    pub fn subject(&self) -> String {
        format!("{} is now {}", self.sensor, self.state_label())
    }

    pub fn body(&self) -> String {
        format!(
            "{}\n\nsensor: {} (GPIO{})\nevent time: {} ns since epoch\n",
            self.subject(),
            self.sensor,
            self.pin,
            self.time
        )
    }
}
