//! Fuzz target: stored event value + key decoding
//!
//! A corrupted database page must surface as a `StorageError`, never a
//! panic.  Anything that does decode must re-encode to a value that
//! decodes to the same event.
//!
//! cargo fuzz run fuzz_event_decode

#![no_main]

use doorwatch::events::{decode, encode, key_for, time_from_key};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(t) = time_from_key(data) {
        assert_eq!(key_for(t).as_slice(), data);
    }

    if let Ok(event) = decode(data) {
        let bytes = encode(&event).expect("decoded event must re-encode");
        assert_eq!(decode(&bytes).expect("re-encoded event must decode"), event);
    }
});
