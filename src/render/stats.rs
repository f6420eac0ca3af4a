//! Running statistics: latency histogram, error counters, throughput and ETA.
//!
//! Split by thread:
//! - [`ThroughputEstimator`] runs on the scan thread inside `handle_report`
//!   and publishes speed/ETA/current LBA through a [`ProgressGauge`];
//! - [`StatsAggregator`] runs on the render thread, counts every consumed
//!   report, and folds the latest gauge reading into [`StatsState`].
//!
//! The gauge is three independent relaxed atomics. Readers may see a speed
//! from one update and an ETA from the next, which is harmless for display.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::render::legend::{ERROR_KINDS, Glyph, LATENCY_BUCKETS, Legend};
use crate::render::report::{BlockReport, DeviceContext};

/// Aggregated view of the scan so far. Zero speed/ETA means "not yet known".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsState {
    /// Five latency bands plus the overflow bucket.
    pub latency_buckets: [u64; LATENCY_BUCKETS],
    /// Indexed like [`crate::render::report::BlockStatus::ERRORS`].
    pub error_counts: [u64; ERROR_KINDS],
    /// Bytes per second.
    pub avg_speed: u64,
    pub eta_seconds: u64,
    pub current_lba: u64,
    /// Reports folded into this state.
    pub reports: u64,
}

impl StatsState {
    #[must_use]
    pub fn ok_count(&self) -> u64 {
        self.latency_buckets.iter().sum()
    }

    #[must_use]
    pub fn error_count(&self) -> u64 {
        self.error_counts.iter().sum()
    }
}

/// Render-thread side: single writer of [`StatsState`].
#[derive(Debug)]
pub struct StatsAggregator {
    legend: Legend,
    state: StatsState,
}

impl StatsAggregator {
    #[must_use]
    pub fn new(legend: Legend) -> Self {
        Self {
            legend,
            state: StatsState::default(),
        }
    }

    /// Count one report and return the glyph to paint for it.
    pub fn record(&mut self, report: &BlockReport) -> Glyph {
        match report.status.error_index() {
            Some(idx) => self.state.error_counts[idx] += 1,
            None => {
                let bucket = self.legend.latency_bucket(report.access_time_us);
                self.state.latency_buckets[bucket] += 1;
            }
        }
        self.state.reports += 1;
        self.legend.glyph_for(report)
    }

    /// Fold the latest producer-side reading into the state.
    pub fn sync_progress(&mut self, reading: ProgressReading) {
        self.state.current_lba = reading.current_lba;
        self.state.avg_speed = reading.avg_speed;
        self.state.eta_seconds = reading.eta_seconds;
    }

    #[must_use]
    pub fn state(&self) -> &StatsState {
        &self.state
    }

    #[must_use]
    pub fn legend(&self) -> &Legend {
        &self.legend
    }

    #[must_use]
    pub fn into_state(self) -> StatsState {
        self.state
    }
}

/// One consistent-enough snapshot of the producer's progress numbers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressReading {
    pub current_lba: u64,
    pub avg_speed: u64,
    pub eta_seconds: u64,
}

/// Scan thread → render thread hand-off for progress numbers.
#[derive(Debug, Default)]
pub struct ProgressGauge {
    current_lba: AtomicU64,
    avg_speed: AtomicU64,
    eta_seconds: AtomicU64,
}

impl ProgressGauge {
    pub fn store(&self, reading: ProgressReading) {
        self.current_lba
            .store(reading.current_lba, Ordering::Relaxed);
        self.avg_speed.store(reading.avg_speed, Ordering::Relaxed);
        self.eta_seconds
            .store(reading.eta_seconds, Ordering::Relaxed);
    }

    #[must_use]
    pub fn load(&self) -> ProgressReading {
        ProgressReading {
            current_lba: self.current_lba.load(Ordering::Relaxed),
            avg_speed: self.avg_speed.load(Ordering::Relaxed),
            eta_seconds: self.eta_seconds.load(Ordering::Relaxed),
        }
    }
}

/// Scan-thread side: average speed since the first report and the ETA
/// derived from it, recomputed on every `every`-th report.
#[derive(Debug, Clone)]
pub struct ThroughputEstimator {
    device: DeviceContext,
    every: u64,
    start_time: Option<Instant>,
    reading: ProgressReading,
}

impl ThroughputEstimator {
    #[must_use]
    pub fn new(device: &DeviceContext, every: u64) -> Self {
        Self {
            device: device.clone(),
            every: every.max(1),
            start_time: None,
            reading: ProgressReading::default(),
        }
    }

    /// Account for report number `progress` (1-based) at `lba`, observed at
    /// `now`. Speed and ETA keep their previous values between updates.
    pub fn observe(&mut self, progress: u64, lba: u64, now: Instant) -> ProgressReading {
        self.reading.current_lba = lba;

        let Some(start) = self.start_time else {
            self.start_time = Some(now);
            return self.reading;
        };
        if progress == 0 || progress % self.every != 0 {
            return self.reading;
        }

        let elapsed_ms = u64::try_from(now.saturating_duration_since(start).as_millis())
            .unwrap_or(u64::MAX);
        if elapsed_ms == 0 {
            return self.reading;
        }

        let bytes = u128::from(self.device.bytes_processed(lba));
        let speed = u64::try_from(bytes * 1_000 / u128::from(elapsed_ms)).unwrap_or(u64::MAX);
        self.reading.avg_speed = speed;
        if speed > 0 {
            self.reading.eta_seconds = (self.device.capacity / speed).saturating_sub(elapsed_ms / 1_000);
        }
        self.reading
    }

    #[must_use]
    pub fn start_time(&self) -> Option<Instant> {
        self.start_time
    }
}
