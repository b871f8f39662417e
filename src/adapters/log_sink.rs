//! Log-based alert transport.
//!
//! Implements [`AlertTransport`] by writing each alert to the log.  This is
//! the delivery path when no SMTP relay is configured.  It also gives a
//! bench installation a visible trace of what would have been mailed.

use log::warn;

use crate::app::events::Alert;
use crate::app::ports::AlertTransport;
use crate::error::NotificationError;

/// Adapter that logs every [`Alert`].
#[derive(Debug, Default)]
pub struct LogAlertTransport;

impl LogAlertTransport {
    pub fn new() -> Self {
        Self
    }
}

impl AlertTransport for LogAlertTransport {
    fn name(&self) -> &'static str {
        "log"
    }

    fn send(&mut self, alert: &Alert) -> Result<(), NotificationError> {
        warn!(
            "ALERT | {} | GPIO{} | t={}",
            alert.subject(),
            alert.pin,
            alert.time
        );
        Ok(())
    }
}
