//! SQLite storage adapter.
//!
//! Implements both [`EventLog`] and [`FlagStore`] on one long-lived
//! connection.  The database holds two ordered key/value collections:
//!
//! | table    | key                         | value            |
//! |----------|-----------------------------|------------------|
//! | `events` | 8-byte big-endian time (ns) | postcard `Event` |
//! | `flags`  | flag name                   | postcard `Flag`  |
//!
//! # Durability
//!
//! - `synchronous = FULL`: a commit is on disk before `Ok` is returned.
//! - Each append is one IMMEDIATE transaction: all-or-nothing.
//! - One mutex guards the connection for the whole logical operation, so
//!   writers never interleave and readers only ever see committed rows.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, error, info};
use rusqlite::{Connection, OptionalExtension, Params, Statement, TransactionBehavior, params};

use crate::app::ports::{Clock, EventLog, FlagStore};
use crate::error::{FlagError, NotFoundError, StorageError};
use crate::events::{self, Event};
use crate::flags::{self, Flag};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS events (
        key   BLOB PRIMARY KEY NOT NULL,
        value BLOB NOT NULL
    ) WITHOUT ROWID;
    CREATE TABLE IF NOT EXISTS flags (
        name  TEXT PRIMARY KEY NOT NULL,
        value BLOB NOT NULL
    ) WITHOUT ROWID;
";

impl From<rusqlite::Error> for StorageError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Backend(e.to_string())
    }
}

struct Inner {
    conn: Connection,
    /// Highest event time written through this handle (or found at open).
    last_time: u64,
}

pub struct SqliteStore {
    inner: Mutex<Inner>,
    clock: Arc<dyn Clock>,
}

impl SqliteStore {
    /// Open (or create) the database file.
    pub fn open(path: impl AsRef<Path>, clock: Arc<dyn Clock>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                StorageError::Backend(format!("create {}: {e}", parent.display()))
            })?;
        }
        let conn = Connection::open(path)?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        debug!("SqliteStore: journal_mode={}", mode);
        let store = Self::init(conn, clock)?;
        info!("SqliteStore: opened {}", path.display());
        Ok(store)
    }

    /// Private in-memory database (tests, bench runs).
    pub fn open_in_memory(clock: Arc<dyn Clock>) -> Result<Self, StorageError> {
        let store = Self::init(Connection::open_in_memory()?, clock)?;
        info!("SqliteStore: in-memory backend");
        Ok(store)
    }

    fn init(conn: Connection, clock: Arc<dyn Clock>) -> Result<Self, StorageError> {
        conn.pragma_update(None, "synchronous", "FULL")?;
        conn.execute_batch(SCHEMA)?;

        let last_key: Option<Vec<u8>> = conn
            .query_row(
                "SELECT key FROM events ORDER BY key DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        let last_time = match last_key {
            Some(key) => events::time_from_key(&key)?,
            None => 0,
        };

        Ok(Self {
            inner: Mutex::new(Inner { conn, last_time }),
            clock,
        })
    }

    /// Number of stored events.
    pub fn event_count(&self) -> Result<u64, StorageError> {
        let inner = self.lock();
        let n: i64 = inner
            .conn
            .query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
        Ok(n as u64)
    }

    /// Held for the duration of one logical operation; released on every
    /// exit path when the guard drops.  A panic mid-operation rolls back the
    /// open transaction, so a poisoned lock still guards consistent data.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn append_locked(inner: &mut Inner, mut event: Event, now: u64) -> Result<Event, StorageError> {
        let mut time = if event.time == 0 {
            now.max(inner.last_time.saturating_add(1))
        } else {
            event.time
        };

        let tx = inner
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        while key_exists(&tx, time)? {
            time = time
                .checked_add(1)
                .ok_or(StorageError::Corrupted("event time overflow"))?;
        }
        event.time = time;

        let value = events::encode(&event)?;
        tx.execute(
            "INSERT INTO events (key, value) VALUES (?1, ?2)",
            params![&events::key_for(time)[..], value],
        )?;
        tx.commit()?;

        inner.last_time = inner.last_time.max(time);
        Ok(event)
    }
}

fn key_exists(conn: &Connection, time: u64) -> Result<bool, StorageError> {
    let hit: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM events WHERE key = ?1",
            params![&events::key_for(time)[..]],
            |row| row.get(0),
        )
        .optional()?;
    Ok(hit.is_some())
}

fn collect_events(stmt: &mut Statement<'_>, params: impl Params) -> Result<Vec<Event>, StorageError> {
    let rows = stmt.query_map(params, |row| row.get::<_, Vec<u8>>(0))?;
    let mut out = Vec::new();
    for value in rows {
        out.push(events::decode(&value?)?);
    }
    Ok(out)
}

impl EventLog for SqliteStore {
    fn append(&self, event: Event) -> Result<Event, StorageError> {
        let now = self.clock.now_ns();
        let mut inner = self.lock();
        Self::append_locked(&mut inner, event, now)
            .inspect(|e| debug!("events: +{} {} {}", e.time, e.name, e.action))
            .inspect_err(|e| error!("events: append failed: {}", e))
    }

    fn list_descending(&self) -> Result<Vec<Event>, StorageError> {
        let inner = self.lock();
        let result = inner
            .conn
            .prepare("SELECT value FROM events ORDER BY key DESC")
            .map_err(StorageError::from)
            .and_then(|mut stmt| collect_events(&mut stmt, params![]));
        result.inspect_err(|e| error!("events: scan failed: {}", e))
    }

    fn page_descending(
        &self,
        before: Option<u64>,
        limit: usize,
    ) -> Result<Vec<Event>, StorageError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let inner = self.lock();
        let result = match before {
            Some(t) => inner
                .conn
                .prepare("SELECT value FROM events WHERE key < ?1 ORDER BY key DESC LIMIT ?2")
                .map_err(StorageError::from)
                .and_then(|mut stmt| {
                    collect_events(&mut stmt, params![&events::key_for(t)[..], limit])
                }),
            None => inner
                .conn
                .prepare("SELECT value FROM events ORDER BY key DESC LIMIT ?1")
                .map_err(StorageError::from)
                .and_then(|mut stmt| collect_events(&mut stmt, params![limit])),
        };
        result.inspect_err(|e| error!("events: page scan failed: {}", e))
    }
}

impl FlagStore for SqliteStore {
    fn set_flag(&self, name: &str, value: i64, time: u64) -> Result<(), StorageError> {
        let bytes = flags::encode(&Flag {
            name: name.to_string(),
            value,
            time,
        })?;
        let inner = self.lock();
        inner
            .conn
            .execute(
                "INSERT INTO flags (name, value) VALUES (?1, ?2)
                 ON CONFLICT(name) DO UPDATE SET value = excluded.value",
                params![name, bytes],
            )
            .map(|_| debug!("flags: {}={}", name, value))
            .map_err(StorageError::from)
            .inspect_err(|e| error!("flags: write '{}' failed: {}", name, e))
    }

    fn get_flag(&self, name: &str) -> Result<Flag, FlagError> {
        let inner = self.lock();
        let bytes: Option<Vec<u8>> = inner
            .conn
            .query_row(
                "SELECT value FROM flags WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()
            .map_err(StorageError::from)?;
        match bytes {
            Some(bytes) => Ok(flags::decode(&bytes)?),
            None => Err(FlagError::NotFound(NotFoundError {
                collection: "flags",
                key: name.to_string(),
            })),
        }
    }
}
