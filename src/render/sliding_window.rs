//! Sliding-window dashboard: the host-facing lifecycle of one scan session.
//!
//! ```text
//! scan thread ── handle_report ──► report ring ──► render thread ──► canvas
//!      │                                                ▲
//!      └── ProgressGauge (speed / ETA / LBA) ───────────┘
//! ```
//!
//! `open` builds the canvas, paints the static panels and starts the render
//! thread. `handle_report` is the hot path and never blocks. `close` hangs up,
//! joins the render thread, prints the verdict, and only then destroys the
//! canvas it got back from the join.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Instant;

use crate::core::config::{Config, SessionConfig};
use crate::core::errors::{BvError, Result};
use crate::render::Renderer;
use crate::render::activity::{LogHandle, log_channel};
use crate::render::canvas::Canvas;
use crate::render::legend::Legend;
use crate::render::render_loop::{RenderLoop, RenderOutcome, RenderPhase};
use crate::render::report::{BlockReport, DeviceContext};
use crate::render::ring::{RingProducer, report_ring};
use crate::render::stats::{ProgressGauge, StatsAggregator, StatsState, ThroughputEstimator};
use crate::tui::surface::Surface;

/// Final numbers of a session, returned by [`SlidingWindow::close`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub stats: StatsState,
    pub interrupted: bool,
    /// Reports handed to `handle_report`.
    pub reports_published: u64,
    /// Reports the render thread never saw because the ring wrapped.
    pub overwritten: u64,
    pub render_ticks: u64,
    pub regions_released: usize,
    /// Log-strip lines dropped under back-pressure.
    pub dropped_log_events: u64,
}

/// One live dashboard session.
pub struct SlidingWindow {
    producer: RingProducer,
    throughput: ThroughputEstimator,
    gauge: Arc<ProgressGauge>,
    hangup: Arc<AtomicBool>,
    render: Option<JoinHandle<Result<RenderOutcome>>>,
    log: LogHandle,
    session: SessionConfig,
    published: u64,
}

impl SlidingWindow {
    /// Allocate the canvas, paint legend and header, start the render thread.
    ///
    /// # Errors
    /// Fails if the terminal is too small, the first frame cannot be written,
    /// or the render thread cannot be spawned. The canvas is released before
    /// any of these errors returns.
    pub fn open(device: &DeviceContext, surface: Box<dyn Surface>, config: &Config) -> Result<Self> {
        let legend = Legend::from_config(&config.legend);
        let mut canvas = Canvas::allocate(surface)?;
        canvas.paint_legend(&legend);
        canvas.paint_header(device);
        canvas.commit()?;

        let (producer, consumer) = report_ring(config.render.ring_capacity);
        let (log, log_rx) = log_channel(config.render.log_channel_capacity);
        let gauge = Arc::new(ProgressGauge::default());
        let hangup = Arc::new(AtomicBool::new(false));

        let render = RenderLoop::new(
            consumer,
            StatsAggregator::new(legend),
            canvas,
            Arc::clone(&gauge),
            Arc::clone(&hangup),
            log_rx,
            config.render.refresh_interval(),
        )
        .spawn()?;

        Ok(Self {
            producer,
            throughput: ThroughputEstimator::new(device, config.render.eta_update_every),
            gauge,
            hangup,
            render: Some(render),
            log,
            session: config.session.clone(),
            published: 0,
        })
    }

    /// Publish one report. `progress` is the host's 1-based report counter.
    pub fn handle_report(&mut self, report: &BlockReport, progress: u64) {
        let reading = self
            .throughput
            .observe(progress, report.lba, Instant::now());
        self.gauge.store(reading);

        let mut slot = self.producer.reserve_for_write();
        slot.write(report);
        slot.publish();
        self.published += 1;
    }

    /// Handle for pushing lines into the log strip from any thread.
    #[must_use]
    pub fn log_handle(&self) -> LogHandle {
        self.log.clone()
    }

    /// Stop rendering, show the verdict, wait for the user, tear down.
    ///
    /// # Errors
    /// Returns the render thread's error if it failed, or a terminal error
    /// from the final frame. Regions are released in every case.
    pub fn close(mut self, interrupted: bool) -> Result<SessionSummary> {
        let outcome = self.stop_render()?;
        let RenderOutcome {
            mut canvas,
            phase,
            stats,
            overwritten,
            ticks,
        } = outcome;
        if phase != RenderPhase::Terminated {
            return Err(BvError::RenderThread {
                details: format!("render loop returned while {phase:?}"),
            });
        }

        canvas.paint_outcome(interrupted);
        canvas.commit()?;
        if self.session.bell {
            canvas.alert()?;
        }
        if self.session.wait_for_key {
            canvas.wait_for_key()?;
        }
        let regions_released = canvas.destroy()?;

        Ok(SessionSummary {
            stats,
            interrupted,
            reports_published: self.published,
            overwritten,
            render_ticks: ticks,
            regions_released,
            dropped_log_events: self.log.dropped_events(),
        })
    }

    /// Raise hangup and join. Runs at most once per session.
    fn stop_render(&mut self) -> Result<RenderOutcome> {
        self.hangup.store(true, Ordering::Release);
        let handle = self.render.take().ok_or_else(|| BvError::RenderThread {
            details: "render thread already joined".to_string(),
        })?;
        handle.join().map_err(|_| BvError::RenderThread {
            details: "render thread panicked".to_string(),
        })?
    }
}

impl Drop for SlidingWindow {
    fn drop(&mut self) {
        // Session abandoned without close(): stop the thread, and let the
        // returned canvas release its regions as it drops.
        if self.render.is_some() {
            let _ = self.stop_render();
        }
    }
}

impl Renderer for SlidingWindow {
    fn open(device: &DeviceContext, surface: Box<dyn Surface>, config: &Config) -> Result<Self> {
        Self::open(device, surface, config)
    }

    fn handle_report(&mut self, report: &BlockReport, progress: u64) {
        Self::handle_report(self, report, progress);
    }

    fn close(self, interrupted: bool) -> Result<SessionSummary> {
        Self::close(self, interrupted)
    }
}
