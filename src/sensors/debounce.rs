//! Contact debouncer.
//!
//! Pure state machine: the watcher feeds it raw pin samples with a
//! monotonic millisecond timestamp and gets back `Some(level)` exactly when
//! a new level has held for the whole window.
//!
//! ```text
//!            sample != stable               held >= window
//!  Stable ────────────────────▶ Settling ────────────────────▶ Stable(new)  => Some(new)
//!    ▲                            │
//!    └────── sample == stable ────┘  (glitch, no event)
//! ```

/// Default settle time for reed contacts.
pub const DEFAULT_DEBOUNCE_MS: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DebounceState {
    /// No sample seen yet.
    Unprimed,
    Stable { level: bool },
    Settling { stable: bool, since_ms: u64 },
}

#[derive(Debug, Clone)]
pub struct Debouncer {
    window_ms: u64,
    state: DebounceState,
}

impl Debouncer {
    pub fn new(window_ms: u32) -> Self {
        Self {
            window_ms: u64::from(window_ms.max(1)),
            state: DebounceState::Unprimed,
        }
    }

    /// Accept `level` as the starting stable level.
    pub fn prime(&mut self, level: bool) {
        self.state = DebounceState::Stable { level };
    }

    /// Last accepted level, `None` before priming.
    pub fn level(&self) -> Option<bool> {
        match self.state {
            DebounceState::Unprimed => None,
            DebounceState::Stable { level } => Some(level),
            DebounceState::Settling { stable, .. } => Some(stable),
        }
    }

    /// A candidate level is waiting out the window.
    pub fn is_settling(&self) -> bool {
        matches!(self.state, DebounceState::Settling { .. })
    }

    pub fn window_ms(&self) -> u64 {
        self.window_ms
    }

    /// Feed one raw sample.  Returns the new level when a change is accepted.
    pub fn sample(&mut self, level: bool, now_ms: u64) -> Option<bool> {
        match self.state {
            DebounceState::Unprimed => {
                self.prime(level);
                None
            }

            DebounceState::Stable { level: stable } => {
                if level != stable {
                    self.state = DebounceState::Settling {
                        stable,
                        since_ms: now_ms,
                    };
                }
                None
            }

            DebounceState::Settling { stable, since_ms } => {
                if level == stable {
                    self.state = DebounceState::Stable { level: stable };
                    return None;
                }
                if now_ms.saturating_sub(since_ms) >= self.window_ms {
                    self.state = DebounceState::Stable { level };
                    return Some(level);
                }
                None
            }
        }
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE_MS)
    }
}
