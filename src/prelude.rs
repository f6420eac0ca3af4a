//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use blockview::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::errors::{BvError, Result};

// Render
pub use crate::render::activity::{ActivityEvent, LogHandle};
pub use crate::render::legend::{Glyph, Legend};
pub use crate::render::report::{BlockReport, BlockStatus, DeviceContext};
pub use crate::render::stats::StatsState;
pub use crate::render::{Renderer, SessionSummary, SlidingWindow};

// Terminal
pub use crate::tui::surface::{CaptureSurface, CrosstermSurface, DiscardSurface, Surface};
pub use crate::tui::terminal_guard::TerminalGuard;
