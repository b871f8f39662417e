//! Fuzz target: settings file parser + config mapping
//!
//! Feeds arbitrary UTF-8 text through `parse_settings` and, when it parses,
//! through `SystemConfig::from_settings`.
//!
//! Invariants checked:
//! - No panics under any input
//! - Every parsed key is non-empty and trimmed
//! - A config that maps successfully also passes `validate_config`
//!
//! cargo fuzz run fuzz_settings_parser

#![no_main]

use doorwatch::adapters::config_file::parse_settings;
use doorwatch::config::{SystemConfig, validate_config};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(settings) = parse_settings(text) else {
        return;
    };
    for key in settings.keys() {
        assert!(!key.is_empty());
        assert_eq!(key.trim(), key);
    }
    if let Ok(cfg) = SystemConfig::from_settings(&settings) {
        assert!(validate_config(&cfg).is_ok());
    }
});
