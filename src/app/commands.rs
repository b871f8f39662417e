//! Inbound operator commands.
//!
//! One command per line on the console (stdin).  The
//! [`MonitorService`](super::service::MonitorService) interprets them.

/// Events listed by `events` when no count is given.
pub const DEFAULT_EVENT_LIMIT: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Arm,
    Disarm,
    /// System status and every sensor, as JSON.
    Status,
    /// Most recent events, newest first, as JSON.
    Events { limit: usize },
    /// Drive a simulated pin (`gpio_backend = sim` only).
    SetPin { pin: u32, open: bool },
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    Empty,
    Unknown(String),
    BadCount(String),
    /// `set` needs `<pin> open|closed`.
    BadPin,
}

impl core::fmt::Display for ParseError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Empty => write!(f, "empty command"),
            Self::Unknown(w) => write!(f, "unknown command '{w}'"),
            Self::BadCount(w) => write!(f, "'{w}' is not a count"),
            Self::BadPin => write!(f, "usage: set <pin> open|closed"),
        }
    }
}

impl std::error::Error for ParseError {}

pub const HELP: &str = "\
commands:
  arm          arm the system
  disarm       disarm the system
  status       show system and sensor state
  events [N]   show the N most recent events (default 20)
  set P open|closed
               drive simulated pin P (gpio_backend = sim)
  help         this text";

impl Command {
    /// Case-insensitive; surrounding whitespace is ignored.
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let mut words = line.split_whitespace();
        let Some(word) = words.next() else {
            return Err(ParseError::Empty);
        };
        let cmd = match word.to_ascii_lowercase().as_str() {
            "arm" => Self::Arm,
            "disarm" => Self::Disarm,
            "status" => Self::Status,
            "events" => {
                let limit = match words.next() {
                    Some(n) => n
                        .parse::<usize>()
                        .ok()
                        .filter(|n| *n > 0)
                        .ok_or_else(|| ParseError::BadCount(n.to_string()))?,
                    None => DEFAULT_EVENT_LIMIT,
                };
                Self::Events { limit }
            }
            "set" => {
                let pin = words.next().and_then(|p| p.parse::<u32>().ok());
                let open = match words.next().map(str::to_ascii_lowercase).as_deref() {
                    Some("open" | "1" | "high") => Some(true),
                    Some("closed" | "close" | "0" | "low") => Some(false),
                    _ => None,
                };
                match (pin, open) {
                    (Some(pin), Some(open)) => Self::SetPin { pin, open },
                    _ => return Err(ParseError::BadPin),
                }
            }
            "help" | "?" => Self::Help,
            other => return Err(ParseError::Unknown(other.to_string())),
        };
        Ok(cmd)
    }
}
