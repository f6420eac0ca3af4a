//! Ctrl+C handling for interactive scans.
//!
//! SIGINT/SIGTERM set a shared flag through `signal-hook`; the scan loop polls
//! it once per block and ends the session as interrupted.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use signal_hook::consts::{SIGINT, SIGTERM};

/// Shared "stop scanning" flag.
#[derive(Debug, Clone, Default)]
pub struct InterruptFlag {
    raised: Arc<AtomicBool>,
}

impl InterruptFlag {
    /// Flag wired to SIGINT and SIGTERM. Registration failures are reported
    /// on stderr and leave the flag usable programmatically.
    #[must_use]
    pub fn install() -> Self {
        let flag = Self::default();
        for (signal, name) in [(SIGINT, "SIGINT"), (SIGTERM, "SIGTERM")] {
            if let Err(e) = signal_hook::flag::register(signal, Arc::clone(&flag.raised)) {
                eprintln!("[BV-SIGNAL] failed to register {name}: {e}");
            }
        }
        flag
    }

    #[must_use]
    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Relaxed)
    }

    pub fn raise(&self) {
        self.raised.store(true, Ordering::Relaxed);
    }

    /// The underlying atomic, for loops that take `&AtomicBool`.
    #[must_use]
    pub fn as_atomic(&self) -> &AtomicBool {
        &self.raised
    }
}
