//! Unified error types for the monitor.
//!
//! One enum per failure domain (storage, hardware, notification, config)
//! plus a crate-wide [`Error`] that every subsystem converts into, keeping
//! the binary's top-level error handling uniform.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the crate funnels into this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Reading or writing the event log / flag store failed.
    Storage(StorageError),
    /// A flag or event is absent.
    NotFound(NotFoundError),
    /// A sensor pin could not be opened, read or watched.
    Hardware(HardwareError),
    /// An alert could not be delivered.
    Notification(NotificationError),
    /// Configuration is invalid or could not be loaded.
    Config(ConfigError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::NotFound(e) => write!(f, "not found: {e}"),
            Self::Hardware(e) => write!(f, "hardware: {e}"),
            Self::Notification(e) => write!(f, "notification: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Storage errors
// ---------------------------------------------------------------------------

/// I/O or serialization failure while reading/writing the log or flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The database engine reported an error.
    Backend(String),
    /// A record could not be encoded or decoded.
    Codec(String),
    /// A stored key does not have the expected shape.
    Corrupted(&'static str),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Backend(msg) => write!(f, "backend error: {msg}"),
            Self::Codec(msg) => write!(f, "codec error: {msg}"),
            Self::Corrupted(what) => write!(f, "corrupted record: {what}"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl From<postcard::Error> for StorageError {
    fn from(e: postcard::Error) -> Self {
        Self::Codec(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Not found
// ---------------------------------------------------------------------------

/// A keyed lookup found nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotFoundError {
    pub collection: &'static str,
    pub key: String,
}

impl fmt::Display for NotFoundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}' does not exist", self.collection, self.key)
    }
}

impl std::error::Error for NotFoundError {}

impl From<NotFoundError> for Error {
    fn from(e: NotFoundError) -> Self {
        Self::NotFound(e)
    }
}

/// Result of a flag lookup: absence is reported separately from failure
/// so the caller chooses the fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlagError {
    NotFound(NotFoundError),
    Storage(StorageError),
}

impl fmt::Display for FlagError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(e) => e.fmt(f),
            Self::Storage(e) => e.fmt(f),
        }
    }
}

impl std::error::Error for FlagError {}

impl From<StorageError> for FlagError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl From<FlagError> for Error {
    fn from(e: FlagError) -> Self {
        match e {
            FlagError::NotFound(e) => Self::NotFound(e),
            FlagError::Storage(e) => Self::Storage(e),
        }
    }
}

// ---------------------------------------------------------------------------
// Hardware errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HardwareError {
    /// The pin could not be claimed or configured as an input.
    PinUnavailable { pin: u32, reason: String },
    /// Reading the pin level failed.
    ReadFailed { pin: u32, reason: String },
    /// Waiting for an edge failed.
    WatchFailed { pin: u32, reason: String },
}

impl HardwareError {
    pub fn pin(&self) -> u32 {
        match self {
            Self::PinUnavailable { pin, .. }
            | Self::ReadFailed { pin, .. }
            | Self::WatchFailed { pin, .. } => *pin,
        }
    }
}

impl fmt::Display for HardwareError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PinUnavailable { pin, reason } => write!(f, "GPIO{pin} unavailable: {reason}"),
            Self::ReadFailed { pin, reason } => write!(f, "GPIO{pin} read failed: {reason}"),
            Self::WatchFailed { pin, reason } => write!(f, "GPIO{pin} watch failed: {reason}"),
        }
    }
}

impl std::error::Error for HardwareError {}

impl embedded_hal::digital::Error for HardwareError {
    fn kind(&self) -> embedded_hal::digital::ErrorKind {
        embedded_hal::digital::ErrorKind::Other
    }
}

impl From<HardwareError> for Error {
    fn from(e: HardwareError) -> Self {
        Self::Hardware(e)
    }
}

// ---------------------------------------------------------------------------
// Notification errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationError {
    /// Required settings (host, recipient) are missing.
    NotConfigured(&'static str),
    /// The message could not be built (bad address, etc.).
    Build(String),
    /// The transport rejected or failed to deliver the message.
    Transport(String),
    /// The dispatch queue was full and the alert was dropped.
    QueueFull,
}

impl fmt::Display for NotificationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConfigured(what) => write!(f, "not configured: {what}"),
            Self::Build(msg) => write!(f, "message build failed: {msg}"),
            Self::Transport(msg) => write!(f, "delivery failed: {msg}"),
            Self::QueueFull => write!(f, "alert queue full"),
        }
    }
}

impl std::error::Error for NotificationError {}

impl From<NotificationError> for Error {
    fn from(e: NotificationError) -> Self {
        Self::Notification(e)
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// No settings file exists (first boot).
    NotFound,
    /// A line of the settings file is not `key = value`.
    Malformed { line: usize },
    /// A value could not be parsed for its key.
    InvalidValue { key: String, value: String },
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Generic I/O error reading the settings file.
    IoError(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Malformed { line } => write!(f, "line {line}: expected 'key = value'"),
            Self::InvalidValue { key, value } => write!(f, "invalid value '{value}' for '{key}'"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {msg}"),
            Self::IoError(msg) => write!(f, "I/O error: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
