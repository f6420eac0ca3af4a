//! Fixed-rate render loop: the consumer side of the report ring.
//!
//! Every tick drains whatever is pending, counts and paints it, refreshes the
//! readouts, and commits one frame. Ticks come from a crossbeam `tick`
//! channel, so the thread sleeps between frames instead of spinning.
//!
//! Shutdown is cooperative: the hangup flag is checked at the top of each
//! tick. Once it is seen, the loop performs exactly one more drain, so every
//! report published before the flag was raised is reflected in the returned
//! stats, and then exits handing the canvas back to the joiner.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, tick};

use crate::core::errors::{BvError, Result};
use crate::render::activity::LogLine;
use crate::render::canvas::Canvas;
use crate::render::ring::RingConsumer;
use crate::render::stats::{ProgressGauge, StatsAggregator, StatsState};

/// Render loop states.
///
/// `Running` until the hangup flag is seen, `Draining` for the one final
/// tick, `Terminated` once the loop has returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderPhase {
    Running,
    Draining,
    Terminated,
}

/// What the render thread hands back when it exits.
#[derive(Debug)]
pub struct RenderOutcome {
    pub canvas: Canvas,
    /// Always [`RenderPhase::Terminated`] for a loop that returned normally.
    pub phase: RenderPhase,
    pub stats: StatsState,
    /// Reports lost to producer overrun.
    pub overwritten: u64,
    pub ticks: u64,
}

/// Consumer-side state, moved onto the render thread by [`RenderLoop::spawn`].
pub struct RenderLoop {
    consumer: RingConsumer,
    stats: StatsAggregator,
    canvas: Canvas,
    gauge: Arc<ProgressGauge>,
    hangup: Arc<AtomicBool>,
    log_rx: Receiver<LogLine>,
    interval: Duration,
    phase: RenderPhase,
    ticks: u64,
}

impl RenderLoop {
    #[must_use]
    pub fn new(
        consumer: RingConsumer,
        stats: StatsAggregator,
        canvas: Canvas,
        gauge: Arc<ProgressGauge>,
        hangup: Arc<AtomicBool>,
        log_rx: Receiver<LogLine>,
        interval: Duration,
    ) -> Self {
        Self {
            consumer,
            stats,
            canvas,
            gauge,
            hangup,
            log_rx,
            interval,
            phase: RenderPhase::Running,
            ticks: 0,
        }
    }

    #[must_use]
    pub fn phase(&self) -> RenderPhase {
        self.phase
    }

    /// Drain, paint, commit. Returns the number of reports consumed.
    pub fn tick(&mut self) -> Result<u64> {
        let Self {
            consumer,
            stats,
            canvas,
            gauge,
            log_rx,
            ..
        } = self;

        let consumed = consumer.drain(|entry| {
            let glyph = stats.record(&entry.report);
            canvas.push_glyph(glyph);
        });
        stats.sync_progress(gauge.load());
        canvas.paint_stats(stats.state());
        for line in log_rx.try_iter() {
            canvas.append_log(&line.render());
        }
        canvas.commit()?;

        self.ticks += 1;
        Ok(consumed)
    }

    /// Run until hangup, then drain once more and return.
    pub fn run(mut self) -> Result<RenderOutcome> {
        let ticker = tick(self.interval);
        while !self.hangup.load(Ordering::Acquire) {
            self.tick()?;
            // The tick channel never disconnects while `ticker` is alive.
            let _ = ticker.recv();
        }

        self.phase = RenderPhase::Draining;
        self.tick()?;
        self.phase = RenderPhase::Terminated;

        Ok(RenderOutcome {
            overwritten: self.consumer.overwritten(),
            stats: self.stats.into_state(),
            canvas: self.canvas,
            phase: self.phase,
            ticks: self.ticks,
        })
    }

    /// Start the loop on a dedicated thread.
    ///
    /// If the thread cannot be created the loop, and the canvas inside it, is
    /// dropped here, which releases every region before the error returns.
    pub fn spawn(self) -> Result<thread::JoinHandle<Result<RenderOutcome>>> {
        thread::Builder::new()
            .name("bv-render".to_string())
            .spawn(move || self.run())
            .map_err(|e| BvError::RenderThread {
                details: format!("failed to spawn render thread: {e}"),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::activity::{ActivityEvent, log_channel};
    use crate::render::canvas::RegionKind;
    use crate::render::legend::Legend;
    use crate::render::report::{BlockReport, BlockStatus};
    use crate::render::ring::{RingProducer, report_ring};
    use crate::render::stats::ProgressReading;
    use crate::tui::surface::CaptureSurface;

    struct Fixture {
        render: RenderLoop,
        producer: RingProducer,
        gauge: Arc<ProgressGauge>,
        hangup: Arc<AtomicBool>,
        log: crate::render::activity::LogHandle,
        surface: CaptureSurface,
    }

    fn fixture(capacity: usize) -> Fixture {
        let (producer, consumer) = report_ring(capacity);
        let surface = CaptureSurface::new(100, 30);
        let canvas = Canvas::allocate(Box::new(surface.clone())).expect("canvas");
        let gauge = Arc::new(ProgressGauge::default());
        let hangup = Arc::new(AtomicBool::new(false));
        let (log, log_rx) = log_channel(16);
        let render = RenderLoop::new(
            consumer,
            StatsAggregator::new(Legend::default()),
            canvas,
            Arc::clone(&gauge),
            Arc::clone(&hangup),
            log_rx,
            Duration::from_millis(5),
        );
        Fixture {
            render,
            producer,
            gauge,
            hangup,
            log,
            surface,
        }
    }

    #[test]
    fn tick_drains_everything_pending() {
        let mut fx = fixture(64);
        for lba in 0..10 {
            fx.producer.push(BlockReport::ok(lba, 100));
        }
        fx.producer
            .push(BlockReport::failed(10, BlockStatus::Error, 0));

        assert_eq!(fx.render.tick().expect("tick"), 11);
        assert_eq!(fx.render.tick().expect("idle tick"), 0);

        let state = fx.render.stats.state();
        assert_eq!(state.ok_count(), 10);
        assert_eq!(state.error_counts[0], 1);
        let vis = fx.render.canvas.region(RegionKind::Vis).text_lines();
        assert_eq!(vis.concat().chars().count(), 11);
    }

    #[test]
    fn tick_folds_in_gauge_and_log() {
        let mut fx = fixture(8);
        fx.gauge.store(ProgressReading {
            current_lba: 5_000,
            avg_speed: 4_096,
            eta_seconds: 61,
        });
        fx.log.send(ActivityEvent::Message("hello strip".to_string()));
        fx.render.tick().expect("tick");

        assert_eq!(fx.render.stats.state().current_lba, 5_000);
        let log = fx.render.canvas.region(RegionKind::Log).text_lines();
        assert_eq!(log.len(), 1);
        assert!(log[0].ends_with("hello strip"));
        assert!(fx.surface.text().contains("LBA:          5,000"));
    }

    #[test]
    fn one_commit_per_tick() {
        let mut fx = fixture(8);
        fx.render.tick().expect("tick");
        fx.producer.push(BlockReport::ok(0, 1));
        fx.render.tick().expect("tick");
        assert_eq!(fx.surface.flushes(), 2);
    }

    #[test]
    fn hangup_triggers_exactly_one_final_drain() {
        let fx = fixture(1_024);
        let Fixture {
            render,
            mut producer,
            hangup,
            ..
        } = fx;

        // Raised before the thread starts: the loop must skip Running and
        // still drain once.
        for lba in 0..500 {
            producer.push(BlockReport::ok(lba, 10));
        }
        hangup.store(true, Ordering::Release);

        let handle = render.spawn().expect("spawn");
        let outcome = handle.join().expect("join").expect("render ok");
        assert_eq!(outcome.phase, RenderPhase::Terminated);
        assert_eq!(outcome.ticks, 1);
        assert_eq!(outcome.stats.reports, 500);
        assert_eq!(outcome.overwritten, 0);
        assert_eq!(outcome.canvas.live_regions(), RegionKind::ALL.len());
    }

    #[test]
    fn running_loop_sees_reports_published_before_hangup() {
        let fx = fixture(100_000);
        let Fixture {
            render,
            mut producer,
            hangup,
            ..
        } = fx;

        let handle = render.spawn().expect("spawn");
        for lba in 0..20_000 {
            producer.push(BlockReport::ok(lba, lba % 700_000));
            if lba % 5_000 == 0 {
                thread::sleep(Duration::from_millis(7));
            }
        }
        hangup.store(true, Ordering::Release);

        let outcome = handle.join().expect("join").expect("render ok");
        assert_eq!(outcome.stats.reports, 20_000);
        assert!(outcome.ticks >= 2);
    }

    #[test]
    fn inline_run_after_hangup_ticks_once() {
        let fx = fixture(4);
        assert_eq!(fx.render.phase(), RenderPhase::Running);
        fx.hangup.store(true, Ordering::Release);
        let outcome = fx.render.run().expect("run");
        assert_eq!(outcome.phase, RenderPhase::Terminated);
        assert_eq!(outcome.ticks, 1);
        assert_eq!(outcome.stats.reports, 0);
    }

    #[test]
    fn phase_stays_running_across_ticks_until_hangup() {
        let mut fx = fixture(8);
        fx.producer.push(BlockReport::ok(0, 1));
        fx.render.tick().expect("tick");
        fx.render.tick().expect("tick");
        assert_eq!(fx.render.phase(), RenderPhase::Running);

        fx.hangup.store(true, Ordering::Release);
        let outcome = fx.render.run().expect("run");
        assert_eq!(outcome.phase, RenderPhase::Terminated);
        assert_eq!(outcome.ticks, 3);
        assert_eq!(outcome.stats.reports, 1);
    }
}
