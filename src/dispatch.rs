//! Notification dispatcher.
//!
//! Sensor watchers must never block on the network, so alerts cross a
//! bounded `embassy-sync` channel to one dispatcher thread that owns the
//! [`AlertTransport`]:
//!
//! ```text
//! ┌──────────────┐  DispatchMsg  ┌────────────────────┐
//! │ watch-gpioN  │──try_send()──▶│  dispatch (thread) │──▶ SMTP / log
//! │ (many)       │  depth 16     │  block_on(receive) │
//! └──────────────┘               └────────────────────┘
//! ```
//!
//! A full queue drops the alert with a warning.  Each delivery is retried
//! with linear backoff; failures are counted and logged, never returned to
//! the watcher.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, TrySendError};
use log::{debug, error, info, warn};
use serde::Serialize;

use crate::app::events::Alert;
use crate::app::ports::{AlertSink, AlertTransport};
use crate::error::NotificationError;
use crate::worker::{self, DISPATCH_STACK_KB};

/// Alerts waiting for delivery.
pub const QUEUE_DEPTH: usize = 16;

/// Re-check interval while shutdown waits for a queue slot.
const SHUTDOWN_POLL: Duration = Duration::from_millis(5);

enum DispatchMsg {
    Alert(Alert),
    Shutdown,
}

type AlertQueue = Channel<CriticalSectionRawMutex, DispatchMsg, QUEUE_DEPTH>;

/// Delivery attempts and the spacing between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.  At least 1.
    pub attempts: u8,
    /// Wait after the n-th failure is `n * backoff`.
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn delay_after(&self, failed_attempt: u32) -> Duration {
        self.backoff.saturating_mul(failed_attempt)
    }
}

#[derive(Debug, Default)]
struct Counters {
    sent: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

/// Delivery counters since start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    pub sent: u64,
    /// Gave up after every retry.
    pub failed: u64,
    /// Rejected because the queue was full.
    pub dropped: u64,
}

/// Cloneable producer side; this is what watchers hold.
#[derive(Clone)]
pub struct DispatchHandle {
    queue: Arc<AlertQueue>,
    counters: Arc<Counters>,
}

impl DispatchHandle {
    /// Queue `alert` without blocking.  A full queue drops it and counts it.
    pub fn try_notify(&self, alert: Alert) -> Result<(), NotificationError> {
        self.queue
            .try_send(DispatchMsg::Alert(alert))
            .map_err(|_| {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                NotificationError::QueueFull
            })
    }
}

impl AlertSink for DispatchHandle {
    fn notify(&self, alert: Alert) {
        let subject = alert.subject();
        if let Err(e) = self.try_notify(alert) {
            warn!("dispatch: {}, dropped alert '{}'", e, subject);
        }
    }
}

/// Owns the dispatcher thread.
pub struct Dispatcher {
    handle: DispatchHandle,
    worker: Option<JoinHandle<()>>,
}

impl Dispatcher {
    pub fn spawn<T>(transport: T, policy: RetryPolicy) -> io::Result<Self>
    where
        T: AlertTransport + 'static,
    {
        let handle = DispatchHandle {
            queue: Arc::new(Channel::new()),
            counters: Arc::new(Counters::default()),
        };
        let policy = RetryPolicy {
            attempts: policy.attempts.max(1),
            ..policy
        };

        let queue = Arc::clone(&handle.queue);
        let counters = Arc::clone(&handle.counters);
        info!(
            "dispatch: transport={} attempts={} backoff={:?}",
            transport.name(),
            policy.attempts,
            policy.backoff
        );
        let worker = worker::spawn_named("dispatch", DISPATCH_STACK_KB, move || {
            run(transport, &queue, policy, &counters);
        })?;

        Ok(Self {
            handle,
            worker: Some(worker),
        })
    }

    /// Producer handle for watchers.
    pub fn sink(&self) -> DispatchHandle {
        self.handle.clone()
    }

    pub fn stats(&self) -> DispatchStats {
        let c = &self.handle.counters;
        DispatchStats {
            sent: c.sent.load(Ordering::Relaxed),
            failed: c.failed.load(Ordering::Relaxed),
            dropped: c.dropped.load(Ordering::Relaxed),
        }
    }

    /// Deliver everything already queued, then stop the thread.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        // Queued behind pending alerts so they go out first.  A dead worker
        // never frees a slot.
        let mut msg = DispatchMsg::Shutdown;
        while let Err(TrySendError::Full(m)) = self.handle.queue.try_send(msg) {
            if worker.is_finished() {
                warn!("dispatch: worker exited early, queued alerts lost");
                break;
            }
            msg = m;
            thread::sleep(SHUTDOWN_POLL);
        }
        if worker.join().is_err() {
            error!("dispatch: worker panicked");
        }
        let s = self.stats();
        info!(
            "dispatch: stopped (sent={} failed={} dropped={})",
            s.sent, s.failed, s.dropped
        );
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run<T: AlertTransport>(
    mut transport: T,
    queue: &AlertQueue,
    policy: RetryPolicy,
    counters: &Counters,
) {
    futures_lite::future::block_on(async {
        loop {
            match queue.receive().await {
                DispatchMsg::Alert(alert) => {
                    if deliver(&mut transport, &alert, policy) {
                        counters.sent.fetch_add(1, Ordering::Relaxed);
                    } else {
                        counters.failed.fetch_add(1, Ordering::Relaxed);
                    }
                }
                DispatchMsg::Shutdown => break,
            }
        }
    });
}

/// Try up to `policy.attempts` times.  Returns whether the alert went out.
fn deliver<T: AlertTransport>(transport: &mut T, alert: &Alert, policy: RetryPolicy) -> bool {
    for attempt in 1..=u32::from(policy.attempts) {
        match transport.send(alert) {
            Ok(()) => {
                debug!(
                    "dispatch: '{}' via {} (attempt {})",
                    alert.subject(),
                    transport.name(),
                    attempt
                );
                return true;
            }
            Err(e) if attempt < u32::from(policy.attempts) => {
                let delay = policy.delay_after(attempt);
                warn!(
                    "dispatch: {} attempt {} failed: {}; retry in {:?}",
                    transport.name(),
                    attempt,
                    e,
                    delay
                );
                thread::sleep(delay);
            }
            Err(e) => {
                error!(
                    "dispatch: giving up on '{}' after {} attempts: {}",
                    alert.subject(),
                    attempt,
                    e
                );
            }
        }
    }
    false
}
