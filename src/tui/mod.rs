//! Terminal plumbing under the dashboard: output surfaces and screen guard.

#![allow(missing_docs)]

pub mod surface;
pub mod terminal_guard;

pub use surface::{CaptureSurface, CrosstermSurface, DiscardSurface, Surface};
pub use terminal_guard::TerminalGuard;
