//! doorwatch library.
//!
//! Door/window contact monitor: per-sensor watcher threads debounce GPIO
//! levels into open/close events, an append-only SQLite log records them,
//! and an arm/disarm controller decides when a transition becomes an
//! e-mail alert.  Exposed as a library for the binary, integration tests
//! and fuzz targets.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod flags;
pub mod pins;
pub mod sensors;
pub mod worker;

pub use error::{Error, Result};
