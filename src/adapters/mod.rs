//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter        | Implements          | Connects to                 |
//! |----------------|---------------------|-----------------------------|
//! | `sqlite_store` | EventLog, FlagStore | SQLite file (bundled)       |
//! | `sysfs_gpio`   | PinDriver           | Linux `/sys/class/gpio`     |
//! | `sim_gpio`     | PinDriver           | in-memory simulated pins    |
//! | `smtp`         | AlertTransport      | SMTP relay (lettre)         |
//! | `log_sink`     | AlertTransport      | log output                  |
//! | `time`         | Clock               | system wall clock           |
//! | `config_file`  | ConfigPort          | `key = value` settings file |

pub mod config_file;
pub mod log_sink;
pub mod sim_gpio;
pub mod smtp;
pub mod sqlite_store;
pub mod sysfs_gpio;
pub mod time;
