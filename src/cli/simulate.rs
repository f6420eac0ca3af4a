//! Synthetic scan: drives the dashboard with generated reports, for demos and
//! for exercising the render path without a real device.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use rand::Rng;

use crate::cli::ScanOutcome;
use crate::core::config::Config;
use crate::core::errors::{BvError, Result};
use crate::render::activity::{ActivityEvent, LogHandle};
use crate::render::report::{BlockReport, BlockStatus, DeviceContext};
use crate::render::{Renderer, SessionSummary, SlidingWindow};
use crate::tui::surface::Surface;

/// Procedure name shown in the dashboard header.
pub const SIMULATE_PROCEDURE: &str = "simulate";

/// Shape of a synthetic scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationPlan {
    pub blocks: u64,
    pub block_size: u64,
    /// Every Nth block fails; 0 disables failures.
    pub error_every: u64,
    /// Pause after each block.
    pub delay: Duration,
}

impl Default for SimulationPlan {
    fn default() -> Self {
        Self {
            blocks: 100_000,
            block_size: 65_536,
            error_every: 0,
            delay: Duration::ZERO,
        }
    }
}

impl SimulationPlan {
    #[must_use]
    pub fn device(&self) -> DeviceContext {
        DeviceContext::new(
            Path::new("<synthetic>"),
            self.blocks.saturating_mul(self.block_size),
            self.block_size,
            SIMULATE_PROCEDURE,
        )
    }

    /// Whether block `lba` is one of the planned failures.
    #[must_use]
    pub const fn fails(&self, lba: u64) -> bool {
        self.error_every != 0 && lba != 0 && lba % self.error_every == 0
    }
}

/// Latency skewed towards fast reads with a long slow tail.
pub fn synthetic_latency_us<G: Rng>(rng: &mut G) -> u64 {
    match rng.random_range(0..100u32) {
        0..80 => rng.random_range(200..3_000),
        80..92 => rng.random_range(3_000..10_000),
        92..97 => rng.random_range(10_000..50_000),
        97..99 => rng.random_range(50_000..150_000),
        _ => rng.random_range(150_000..700_000),
    }
}

/// Report for block `lba` under `plan`. Failures cycle through error kinds.
pub fn synthetic_report<G: Rng>(plan: &SimulationPlan, lba: u64, rng: &mut G) -> BlockReport {
    let latency = synthetic_latency_us(rng);
    if plan.fails(lba) {
        let kinds = BlockStatus::ERRORS;
        let idx = usize::try_from(lba / plan.error_every).unwrap_or(0) % kinds.len();
        BlockReport::failed(lba, kinds[idx], latency)
    } else {
        BlockReport::ok(lba, latency)
    }
}

/// Feed `plan.blocks` synthetic reports into `renderer`.
pub fn simulate_blocks<R: Renderer, G: Rng>(
    plan: &SimulationPlan,
    renderer: &mut R,
    log: Option<&LogHandle>,
    stop: &AtomicBool,
    rng: &mut G,
) -> ScanOutcome {
    let mut outcome = ScanOutcome::default();
    for lba in 0..plan.blocks {
        if stop.load(Ordering::Relaxed) {
            outcome.interrupted = true;
            if let Some(log) = log {
                log.send(ActivityEvent::Interrupted { lba });
            }
            break;
        }

        let report = synthetic_report(plan, lba, rng);
        if report.status.is_ok() {
            outcome.blocks_ok += 1;
        } else {
            outcome.blocks_failed += 1;
            if let Some(log) = log {
                log.send(ActivityEvent::BlockFailed {
                    lba,
                    status: report.status,
                });
            }
        }
        renderer.handle_report(&report, lba + 1);

        if !plan.delay.is_zero() {
            thread::sleep(plan.delay);
        }
    }

    if !outcome.interrupted
        && let Some(log) = log
    {
        log.send(ActivityEvent::Finished {
            blocks: outcome.blocks(),
        });
    }
    outcome
}

/// Run a whole synthetic session on `surface`.
///
/// # Errors
/// Fails on an empty plan or when the dashboard cannot be opened or closed.
pub fn simulate_session(
    plan: &SimulationPlan,
    config: &Config,
    surface: Box<dyn Surface>,
    stop: &AtomicBool,
) -> Result<(SessionSummary, ScanOutcome)> {
    if plan.blocks == 0 || plan.block_size == 0 {
        return Err(BvError::InvalidConfig {
            details: "simulation needs at least one block of non-zero size".to_string(),
        });
    }

    let device = plan.device();
    let mut window = SlidingWindow::open(&device, surface, config)?;
    let log = window.log_handle();
    log.send(ActivityEvent::ScanStarted {
        device: device.path.display().to_string(),
        blocks: plan.blocks,
    });

    let outcome = simulate_blocks(plan, &mut window, Some(&log), stop, &mut rand::rng());
    let summary = window.close(outcome.interrupted)?;
    Ok((summary, outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::test_support::RecordingRenderer;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn latencies_stay_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..10_000 {
            let us = synthetic_latency_us(&mut rng);
            assert!((200..700_000).contains(&us));
        }
    }

    #[test]
    fn failures_follow_plan_and_cycle_kinds() {
        let plan = SimulationPlan {
            blocks: 60,
            block_size: 512,
            error_every: 10,
            delay: Duration::ZERO,
        };
        let mut rng = StdRng::seed_from_u64(1);
        let mut renderer = RecordingRenderer::default();
        let outcome = simulate_blocks(&plan, &mut renderer, None, &AtomicBool::new(false), &mut rng);

        assert_eq!(outcome.blocks_failed, 5);
        assert_eq!(outcome.blocks_ok, 55);
        let failed: Vec<(u64, BlockStatus)> = renderer
            .reports
            .iter()
            .filter(|(r, _)| !r.status.is_ok())
            .map(|(r, _)| (r.lba, r.status))
            .collect();
        assert_eq!(
            failed,
            vec![
                (10, BlockStatus::Timeout),
                (20, BlockStatus::Uncorrectable),
                (30, BlockStatus::IdNotFound),
                (40, BlockStatus::Aborted),
                (50, BlockStatus::Error),
            ]
        );
    }

    #[test]
    fn no_failures_when_disabled() {
        let plan = SimulationPlan {
            blocks: 100,
            block_size: 512,
            ..SimulationPlan::default()
        };
        assert!((0..100).all(|lba| !plan.fails(lba)));
    }

    #[test]
    fn device_capacity_covers_every_block() {
        let plan = SimulationPlan {
            blocks: 1_000,
            block_size: 4_096,
            ..SimulationPlan::default()
        };
        assert_eq!(plan.device().end_lba(), 1_000);
    }

    #[test]
    fn empty_plan_is_rejected() {
        let plan = SimulationPlan {
            blocks: 0,
            ..SimulationPlan::default()
        };
        let surface = crate::tui::surface::CaptureSurface::new(100, 30);
        let err = simulate_session(&plan, &Config::default(), Box::new(surface), &AtomicBool::new(false))
            .expect_err("empty plan");
        assert_eq!(err.code(), "BV-1001");
    }
}
