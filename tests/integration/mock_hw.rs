//! Mock adapters for integration tests.
//!
//! - [`MemoryStore`]: `EventLog` + `FlagStore` in memory, with switches to
//!   make individual operations fail.
//! - [`RecordingAlerts`]: `AlertSink` that keeps every alert.
//! - [`UnreadableGpio`]: `PinDriver` over [`SimGpio`] whose chosen pins
//!   open fine but can never be sampled.
//! - [`context`]: a `WatchContext` wired to the above.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use doorwatch::adapters::sim_gpio::{SimGpio, SimPin};
use doorwatch::adapters::time::ManualClock;
use doorwatch::app::events::Alert;
use doorwatch::app::ports::{AlertSink, Clock, Edge, EventLog, FlagStore, PinDriver, PinHandle};
use doorwatch::app::status::StatusCell;
use doorwatch::error::{FlagError, HardwareError, NotFoundError, StorageError};
use doorwatch::events::Event;
use doorwatch::flags::Flag;
use doorwatch::sensors::watcher::WatchContext;
use embedded_hal::digital::{ErrorType, InputPin};

// ── MemoryStore ───────────────────────────────────────────────

pub struct MemoryStore {
    clock: Arc<dyn Clock>,
    events: Mutex<BTreeMap<u64, Event>>,
    flags: Mutex<HashMap<String, Flag>>,
    pub fail_append: AtomicBool,
    pub fail_flag_write: AtomicBool,
    pub fail_flag_read: AtomicBool,
}

#[allow(dead_code)]
impl MemoryStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            events: Mutex::new(BTreeMap::new()),
            flags: Mutex::new(HashMap::new()),
            fail_append: AtomicBool::new(false),
            fail_flag_write: AtomicBool::new(false),
            fail_flag_read: AtomicBool::new(false),
        }
    }

    pub fn events_oldest_first(&self) -> Vec<Event> {
        self.events.lock().unwrap().values().cloned().collect()
    }

    pub fn sensor_events(&self, name: &str) -> Vec<Event> {
        self.events_oldest_first()
            .into_iter()
            .filter(|e| e.name == name)
            .collect()
    }

    pub fn flag(&self, name: &str) -> Option<Flag> {
        self.flags.lock().unwrap().get(name).cloned()
    }
}

impl EventLog for MemoryStore {
    fn append(&self, mut event: Event) -> Result<Event, StorageError> {
        if self.fail_append.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("disk full".into()));
        }
        let mut events = self.events.lock().unwrap();
        let last = events.keys().next_back().copied().unwrap_or(0);
        let mut time = if event.time == 0 {
            self.clock.now_ns().max(last + 1)
        } else {
            event.time
        };
        while events.contains_key(&time) {
            time += 1;
        }
        event.time = time;
        events.insert(time, event.clone());
        Ok(event)
    }

    fn list_descending(&self) -> Result<Vec<Event>, StorageError> {
        Ok(self.events.lock().unwrap().values().rev().cloned().collect())
    }

    fn page_descending(
        &self,
        before: Option<u64>,
        limit: usize,
    ) -> Result<Vec<Event>, StorageError> {
        let events = self.events.lock().unwrap();
        let upper = before.unwrap_or(u64::MAX);
        Ok(events
            .range(..upper)
            .rev()
            .take(limit)
            .map(|(_, e)| e.clone())
            .collect())
    }
}

impl FlagStore for MemoryStore {
    fn set_flag(&self, name: &str, value: i64, time: u64) -> Result<(), StorageError> {
        if self.fail_flag_write.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("read-only filesystem".into()));
        }
        self.flags.lock().unwrap().insert(
            name.to_string(),
            Flag {
                name: name.to_string(),
                value,
                time,
            },
        );
        Ok(())
    }

    fn get_flag(&self, name: &str) -> Result<Flag, FlagError> {
        if self.fail_flag_read.load(Ordering::SeqCst) {
            return Err(FlagError::Storage(StorageError::Corrupted("bad page")));
        }
        self.flags
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| {
                FlagError::NotFound(NotFoundError {
                    collection: "flags",
                    key: name.to_string(),
                })
            })
    }
}

// ── RecordingAlerts ───────────────────────────────────────────

#[derive(Default)]
pub struct RecordingAlerts {
    alerts: Mutex<Vec<Alert>>,
}

#[allow(dead_code)]
impl RecordingAlerts {
    pub fn all(&self) -> Vec<Alert> {
        self.alerts.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.alerts.lock().unwrap().len()
    }
}

impl AlertSink for RecordingAlerts {
    fn notify(&self, alert: Alert) {
        self.alerts.lock().unwrap().push(alert);
    }
}

// ── UnreadableGpio ────────────────────────────────────────────

pub struct UnreadableGpio {
    sim: SimGpio,
    unreadable: HashSet<u32>,
    closed: Arc<Mutex<Vec<u32>>>,
}

impl UnreadableGpio {
    pub fn new(sim: SimGpio, unreadable: impl IntoIterator<Item = u32>) -> Self {
        Self {
            sim,
            unreadable: unreadable.into_iter().collect(),
            closed: Arc::default(),
        }
    }

    /// Pins whose handle has been closed, in order.
    pub fn closed(&self) -> Vec<u32> {
        self.closed.lock().unwrap().clone()
    }
}

impl PinDriver for UnreadableGpio {
    type Pin = UnreadablePin;

    fn open_pin(&self, pin: u32) -> Result<UnreadablePin, HardwareError> {
        Ok(UnreadablePin {
            inner: self.sim.open_pin(pin)?,
            unreadable: self.unreadable.contains(&pin),
            closed: Arc::clone(&self.closed),
        })
    }
}

pub struct UnreadablePin {
    inner: SimPin,
    unreadable: bool,
    closed: Arc<Mutex<Vec<u32>>>,
}

impl ErrorType for UnreadablePin {
    type Error = HardwareError;
}

impl InputPin for UnreadablePin {
    fn is_high(&mut self) -> Result<bool, HardwareError> {
        if self.unreadable {
            return Err(HardwareError::ReadFailed {
                pin: self.inner.number(),
                reason: "bus error".into(),
            });
        }
        self.inner.is_high()
    }

    fn is_low(&mut self) -> Result<bool, HardwareError> {
        self.is_high().map(|h| !h)
    }
}

impl PinHandle for UnreadablePin {
    fn number(&self) -> u32 {
        self.inner.number()
    }

    fn wait_for_edge(&mut self, edge: Edge, timeout: Duration) -> Result<bool, HardwareError> {
        self.inner.wait_for_edge(edge, timeout)
    }

    fn close(self) -> Result<(), HardwareError> {
        self.closed.lock().unwrap().push(self.inner.number());
        self.inner.close()
    }
}

// ── Wiring ────────────────────────────────────────────────────

pub struct Rig {
    pub clock: Arc<ManualClock>,
    pub store: Arc<MemoryStore>,
    pub status: Arc<StatusCell>,
    pub alerts: Arc<RecordingAlerts>,
}

impl Rig {
    pub fn new() -> Self {
        let clock = Arc::new(ManualClock::new(1_000_000));
        Self {
            store: Arc::new(MemoryStore::new(clock.clone())),
            clock,
            status: Arc::new(StatusCell::new()),
            alerts: Arc::new(RecordingAlerts::default()),
        }
    }

    pub fn context(&self) -> WatchContext {
        WatchContext {
            log: self.store.clone(),
            status: Arc::clone(&self.status),
            alerts: self.alerts.clone(),
            clock: self.clock.clone(),
        }
    }
}
