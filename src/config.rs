//! System configuration parameters
//!
//! All tunable parameters for the monitor. Values come from the settings
//! file (`key = value` pairs, see [`crate::adapters::config_file`]) and fall
//! back to [`SystemConfig::default`] for anything not given.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::pins;

/// Which status to assume when the durable `"armed"` flag is missing or
/// unreadable at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackPolicy {
    /// Fail safe: treat an unknown installation as armed.
    Armed,
    /// Treat an unknown installation as disarmed (new installs).
    Disarmed,
}

/// Where sensor pins come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GpioBackend {
    /// Linux `/sys/class/gpio` interface.
    Sysfs,
    /// In-process simulated pins (bench runs, no hardware).
    Sim,
}

/// One door/window contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorConfig {
    pub name: String,
    pub pin: u32,
}

/// Alert delivery settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyConfig {
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_user: Option<String>,
    pub smtp_pass: Option<String>,
    /// Use STARTTLS (true) or a plain connection (false).
    pub smtp_tls: bool,
    /// Sender address.
    pub from: Option<String>,
    /// Recipient address.
    pub recipient: Option<String>,
}

impl NotifyConfig {
    /// SMTP delivery needs at least a host and a recipient.
    pub fn smtp_enabled(&self) -> bool {
        self.smtp_host.is_some() && self.recipient.is_some()
    }
}

/// Core system configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Storage ---
    /// SQLite database file holding the "events" and "flags" collections.
    pub db_path: PathBuf,
    /// Status to assume when the "armed" flag is absent.
    pub missing_flag_policy: FallbackPolicy,

    // --- Sensors ---
    pub sensors: Vec<SensorConfig>,
    pub gpio_backend: GpioBackend,
    /// Root of the sysfs GPIO tree.
    pub gpio_root: PathBuf,
    /// A level change must hold this long to count (milliseconds).
    pub debounce_ms: u32,
    /// Pin sampling period while waiting for an edge (milliseconds).
    pub poll_interval_ms: u32,

    // --- Notification ---
    pub notify: NotifyConfig,
    /// Delivery attempts per alert (including the first).
    pub notify_retries: u8,
    /// Delay between delivery attempts grows by this much each time (milliseconds).
    pub notify_backoff_ms: u32,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            // Storage
            db_path: PathBuf::from("/var/lib/doorwatch/doorwatch.db"),
            missing_flag_policy: FallbackPolicy::Armed,

            // Sensors
            sensors: pins::DEFAULT_SENSORS
                .iter()
                .map(|(name, pin)| SensorConfig {
                    name: (*name).to_string(),
                    pin: *pin,
                })
                .collect(),
            gpio_backend: GpioBackend::Sysfs,
            gpio_root: PathBuf::from("/sys/class/gpio"),
            debounce_ms: 50,
            poll_interval_ms: 10, // 100 Hz

            // Notification
            notify: NotifyConfig {
                smtp_port: 587,
                smtp_tls: true,
                ..NotifyConfig::default()
            },
            notify_retries: 3,
            notify_backoff_ms: 2000,
        }
    }
}

impl SystemConfig {
    /// Build a config from loaded settings, starting from defaults.
    ///
    /// Unknown keys are ignored. Any `sensor.<Name>` entry replaces the
    /// default sensor table. The result is validated before it is returned.
    pub fn from_settings(settings: &BTreeMap<String, String>) -> Result<Self, ConfigError> {
        let mut cfg = Self::default();
        let mut sensors = Vec::new();

        for (key, value) in settings {
            match key.as_str() {
                "db_path" => cfg.db_path = PathBuf::from(value),
                "missing_flag_policy" => {
                    cfg.missing_flag_policy = match value.to_ascii_lowercase().as_str() {
                        "armed" => FallbackPolicy::Armed,
                        "disarmed" => FallbackPolicy::Disarmed,
                        _ => return Err(invalid(key, value)),
                    };
                }
                "gpio_backend" => {
                    cfg.gpio_backend = match value.to_ascii_lowercase().as_str() {
                        "sysfs" => GpioBackend::Sysfs,
                        "sim" => GpioBackend::Sim,
                        _ => return Err(invalid(key, value)),
                    };
                }
                "gpio_root" => cfg.gpio_root = PathBuf::from(value),
                "debounce_ms" => cfg.debounce_ms = parse(key, value)?,
                "poll_interval_ms" => cfg.poll_interval_ms = parse(key, value)?,
                "notify_retries" => cfg.notify_retries = parse(key, value)?,
                "notify_backoff_ms" => cfg.notify_backoff_ms = parse(key, value)?,
                "smtp_host" => cfg.notify.smtp_host = Some(value.clone()),
                "smtp_port" => cfg.notify.smtp_port = parse(key, value)?,
                "smtp_user" => cfg.notify.smtp_user = Some(value.clone()),
                "smtp_pass" => cfg.notify.smtp_pass = Some(value.clone()),
                "smtp_from" => cfg.notify.from = Some(value.clone()),
                "smtp_tls" => cfg.notify.smtp_tls = parse_bool(key, value)?,
                "notify" => cfg.notify.recipient = Some(value.clone()),
                _ => {
                    if let Some(name) = key.strip_prefix("sensor.") {
                        sensors.push(SensorConfig {
                            name: name.trim().to_string(),
                            pin: parse(key, value)?,
                        });
                    } else {
                        log::debug!("config: ignoring unknown key '{}'", key);
                    }
                }
            }
        }

        if !sensors.is_empty() {
            sensors.sort_by_key(|s| s.pin);
            cfg.sensors = sensors;
        }

        validate_config(&cfg)?;
        Ok(cfg)
    }
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn parse<T: core::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| invalid(key, value))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(key, value)),
    }
}

/// Range-check every field. Invalid values are rejected, never clamped.
pub fn validate_config(cfg: &SystemConfig) -> Result<(), ConfigError> {
    if cfg.sensors.is_empty() {
        return Err(ConfigError::ValidationFailed("at least one sensor is required"));
    }
    for (i, s) in cfg.sensors.iter().enumerate() {
        if s.name.is_empty() {
            return Err(ConfigError::ValidationFailed("sensor names must not be empty"));
        }
        if cfg.gpio_backend == GpioBackend::Sysfs && s.pin > pins::MAX_GPIO {
            return Err(ConfigError::ValidationFailed("sensor pin must be GPIO 0–27"));
        }
        if cfg.sensors[..i].iter().any(|o| o.pin == s.pin) {
            return Err(ConfigError::ValidationFailed("two sensors share a pin"));
        }
        if cfg.sensors[..i].iter().any(|o| o.name == s.name) {
            return Err(ConfigError::ValidationFailed("two sensors share a name"));
        }
    }
    if !(1..=2000).contains(&cfg.debounce_ms) {
        return Err(ConfigError::ValidationFailed("debounce_ms must be 1–2000"));
    }
    if !(1..=1000).contains(&cfg.poll_interval_ms) {
        return Err(ConfigError::ValidationFailed("poll_interval_ms must be 1–1000"));
    }
    if !(1..=10).contains(&cfg.notify_retries) {
        return Err(ConfigError::ValidationFailed("notify_retries must be 1–10"));
    }
    if cfg.notify_backoff_ms > 60_000 {
        return Err(ConfigError::ValidationFailed("notify_backoff_ms must be 0–60000"));
    }
    if cfg.notify.smtp_port == 0 {
        return Err(ConfigError::ValidationFailed("smtp_port must be non-zero"));
    }
    Ok(())
}
