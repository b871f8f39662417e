//! Arm/Disarm controller.
//!
//! The only writer of the [`StatusCell`].  A status change is three steps,
//! each gated on the one before:
//!
//! ```text
//!  (a) append {system, arm|disarm, was_armed}  ──ok──▶
//!  (b) set flag "armed" = 1|0                  ──ok──▶
//!  (c) StatusCell ← Armed|Disarmed
//! ```
//!
//! A failure at (a) or (b) returns the error and leaves the status as it
//! was, so the durable log never holds less history than the in-memory
//! status claims.

use std::sync::{Arc, Mutex, PoisonError};

use log::{error, info, warn};

use super::ports::{Clock, EventLog, FlagStore};
use super::status::{ArmState, StatusCell, SystemStatus};
use crate::config::FallbackPolicy;
use crate::error::{FlagError, StorageError};
use crate::events::{Action, Event};
use crate::flags;

pub struct Controller<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    status: Arc<StatusCell>,
    /// Serializes arm/disarm/restore against each other.
    op_lock: Mutex<()>,
}

impl<S: EventLog + FlagStore> Controller<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, status: Arc<StatusCell>) -> Self {
        Self {
            store,
            clock,
            status,
            op_lock: Mutex::new(()),
        }
    }

    pub fn arm(&self) -> Result<SystemStatus, StorageError> {
        let _op = self.op_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.set_armed(true)
    }

    pub fn disarm(&self) -> Result<SystemStatus, StorageError> {
        let _op = self.op_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.set_armed(false)
    }

    pub fn status(&self) -> SystemStatus {
        self.status.get()
    }

    /// Rebuild the status from the `"armed"` flag at startup.
    ///
    /// A missing or unreadable flag is not an error: `policy` decides the
    /// status, and that decision is written through like a normal
    /// arm/disarm.  If even that write fails the status is still set in
    /// memory so the monitor runs.
    pub fn restore(&self, policy: FallbackPolicy) -> SystemStatus {
        let _op = self.op_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let reason = match self.store.get_flag(flags::ARMED) {
            Ok(flag) => {
                let state = ArmState::from_armed(flag.is_set());
                self.status.set(state, flag.time);
                info!("controller: restored {:?} (since {})", state, flag.time);
                return self.status.get();
            }
            Err(FlagError::NotFound(_)) => "no stored 'armed' flag".to_string(),
            Err(FlagError::Storage(e)) => format!("'armed' flag unreadable ({e})"),
        };

        let armed = policy == FallbackPolicy::Armed;
        warn!(
            "controller: {}; assuming {} per missing_flag_policy",
            reason,
            if armed { "ARMED" } else { "DISARMED" }
        );

        if let Err(e) = self.set_armed(armed) {
            error!(
                "controller: fallback not persisted ({}); status is in memory only",
                e
            );
            self.status
                .set(ArmState::from_armed(armed), self.clock.now_ns());
        }
        self.status.get()
    }

    /// Caller holds `op_lock`.
    fn set_armed(&self, armed: bool) -> Result<SystemStatus, StorageError> {
        let action = if armed { Action::Arm } else { Action::Disarm };
        let was_armed = self.status.is_armed();

        let event = self
            .store
            .append(Event::system(action, was_armed))
            .inspect_err(|e| error!("controller: {} aborted, event not written: {}", action, e))?;

        self.store
            .set_flag(flags::ARMED, i64::from(armed), event.time)
            .inspect_err(|e| error!("controller: {} aborted, flag not written: {}", action, e))?;

        self.status.set(ArmState::from_armed(armed), event.time);
        info!("controller: {} (was_armed={})", action, was_armed);
        Ok(self.status.get())
    }
}
