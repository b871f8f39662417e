//! Named worker-thread spawning.
//!
//! Every long-lived thread in the monitor (one watcher per sensor, the
//! alert dispatcher, the operator console) goes through [`spawn_named`] so
//! that thread names show up in logs, `top -H` and panic messages, and so
//! stack sizes are explicit.

use std::io;
use std::thread::{self, JoinHandle};

/// Stack for sensor watchers: a debouncer and a few small buffers.
pub const WATCHER_STACK_KB: usize = 64;
/// Stack for the dispatcher: SMTP + TLS handshakes.
pub const DISPATCH_STACK_KB: usize = 256;
/// Stack for the stdin console.
pub const CONSOLE_STACK_KB: usize = 128;

/// Spawn a named thread with an explicit stack size.
///
/// Thread creation failure is returned to the caller instead of panicking;
/// the caller decides whether the process can run without that worker.
pub fn spawn_named<F>(name: impl Into<String>, stack_kb: usize, f: F) -> io::Result<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    let name = name.into();
    log::debug!("Spawning '{}' (stack={}KB)", name, stack_kb);
    thread::Builder::new()
        .name(name)
        .stack_size(stack_kb * 1024)
        .spawn(f)
}
