//! Scan visualization: report ring, statistics, canvas and render loop.

#![allow(missing_docs)]

pub mod activity;
pub mod canvas;
pub mod legend;
pub mod render_loop;
pub mod report;
pub mod ring;
pub mod sliding_window;
pub mod stats;

use crate::core::config::Config;
use crate::core::errors::Result;
use crate::tui::surface::Surface;

pub use report::{BlockReport, BlockStatus, DeviceContext};
pub use sliding_window::{SessionSummary, SlidingWindow};

/// Contract between a scanning host and a visualization backend.
///
/// The host calls `open` once before the first block, `handle_report` once
/// per processed block from its scanning thread, and `close` once at the end.
pub trait Renderer: Sized {
    /// Start a session for `device`, painting onto `surface`.
    fn open(device: &DeviceContext, surface: Box<dyn Surface>, config: &Config) -> Result<Self>;

    /// Account for one processed block. `progress` counts reports from 1 and
    /// only ever increases. Must not block.
    fn handle_report(&mut self, report: &BlockReport, progress: u64);

    /// End the session. `interrupted` selects the verdict shown to the user.
    fn close(self, interrupted: bool) -> Result<SessionSummary>;
}
