//! Settings file adapter.
//!
//! Implements [`ConfigPort`] over a plain-text file of `key = value` lines:
//!
//! ```text
//! # doorwatch.cfg
//! db_path = /var/lib/doorwatch/doorwatch.db
//! sensor.Front Door = 4
//! notify = owner@example.org
//! ```
//!
//! Blank lines and lines starting with `#` are skipped.  The first `=`
//! splits key from value; both are trimmed.  A later duplicate key wins.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::PathBuf;

use log::info;

use crate::app::ports::ConfigPort;
use crate::error::ConfigError;

pub struct FileConfigAdapter {
    path: PathBuf,
}

impl FileConfigAdapter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ConfigPort for FileConfigAdapter {
    fn load(&self) -> Result<BTreeMap<String, String>, ConfigError> {
        let text = std::fs::read_to_string(&self.path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => ConfigError::NotFound,
            _ => ConfigError::IoError(format!("{}: {e}", self.path.display())),
        })?;
        let settings = parse_settings(&text)?;
        info!(
            "config: {} keys from {}",
            settings.len(),
            self.path.display()
        );
        Ok(settings)
    }
}

/// Parse settings text.  Errors carry the 1-based line number.
pub fn parse_settings(text: &str) -> Result<BTreeMap<String, String>, ConfigError> {
    let mut out = BTreeMap::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            return Err(ConfigError::Malformed { line: idx + 1 });
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(ConfigError::Malformed { line: idx + 1 });
        }
        out.insert(key.to_string(), value.trim().to_string());
    }
    Ok(out)
}
