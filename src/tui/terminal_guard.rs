//! RAII terminal lifecycle guard backed by crossterm.
//!
//! [`TerminalGuard`] enters the alternate screen and hides the cursor on
//! construction, and restores the terminal on [`Drop`], even during panics or
//! early error returns. A custom panic hook restores the screen *before* the
//! default panic message is printed, so the backtrace is readable.

use std::io::{self, Write};
use std::panic;
use std::sync::atomic::{AtomicBool, Ordering};

use crossterm::cursor::{Hide, Show};
use crossterm::execute;
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};

/// Set while the alternate screen is active. Checked by the panic hook to
/// decide whether restoration is needed.
static ALT_SCREEN_ACTIVE: AtomicBool = AtomicBool::new(false);

/// Keeps the dashboard on the alternate screen for its lifetime.
pub struct TerminalGuard {
    hook_installed: bool,
}

impl TerminalGuard {
    /// Enter the alternate screen, installing a panic-safe cleanup hook.
    ///
    /// # Errors
    /// Returns I/O errors if terminal setup fails.
    pub fn new() -> io::Result<Self> {
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, Hide)?;
        ALT_SCREEN_ACTIVE.store(true, Ordering::SeqCst);

        let prev = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            restore_terminal_best_effort();
            prev(info);
        }));

        Ok(Self {
            hook_installed: true,
        })
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        if self.hook_installed {
            // The previous hook was moved into our closure; fall back to the
            // default one.
            let _ = panic::take_hook();
        }
        restore_terminal_best_effort();
    }
}

/// Best-effort terminal restoration. Safe to call multiple times; uses the
/// atomic flag to avoid redundant work.
fn restore_terminal_best_effort() {
    if ALT_SCREEN_ACTIVE.swap(false, Ordering::SeqCst) {
        let mut stdout = io::stdout();
        let _ = terminal::disable_raw_mode();
        let _ = execute!(stdout, Show, LeaveAlternateScreen);
        let _ = stdout.flush();
    }
}

// ──────────────────── tests ────────────────────
