#![forbid(unsafe_code)]

//! blockview: live terminal dashboard for block-device scans.
//!
//! A scanning host feeds one [`render::BlockReport`] per processed block into
//! a [`render::SlidingWindow`]; a dedicated render thread drains them at a
//! fixed rate and paints:
//! 1. **Block map**: one glyph per block, coloured by latency band or error kind
//! 2. **Histogram**: counts per latency band and per error kind
//! 3. **Readouts**: average speed, ETA, current and end LBA, and a log strip
//!
//! # Library usage
//!
//! ```rust,no_run
//! use blockview::prelude::*;
//!
//! # fn main() -> blockview::core::errors::Result<()> {
//! let device = DeviceContext::new("/dev/sdb", 1 << 30, 512, "read");
//! let mut window = SlidingWindow::open(&device, Box::new(CrosstermSurface::new()), &Config::default())?;
//! window.handle_report(&BlockReport::ok(0, 850), 1);
//! let summary = window.close(false)?;
//! println!("{} blocks", summary.stats.reports);
//! # Ok(())
//! # }
//! ```

pub mod prelude;

#[cfg(feature = "cli")]
pub mod cli;
pub mod core;
pub mod render;
pub mod tui;
