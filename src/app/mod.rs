//! Application core: domain logic behind port traits.
//!
//! The arm/disarm rules, status bookkeeping and the query façade live
//! here.  All interaction with storage, pins and mail happens through the
//! **port traits** in [`ports`], so this layer is testable with in-memory
//! adapters.

pub mod commands;
pub mod controller;
pub mod events;
pub mod ports;
pub mod service;
pub mod status;
