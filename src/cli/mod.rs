//! Scan hosts behind the `blockview` binary: a real sequential read and a
//! synthetic generator, both driving the dashboard through [`Renderer`].
//!
//! [`Renderer`]: crate::render::Renderer
#![allow(missing_docs)]

pub mod scan;
pub mod signals;
pub mod simulate;

use std::fmt;

use crate::render::canvas::group_thousands;
use crate::render::legend::Legend;
use crate::render::stats::StatsState;

/// Tally of one scan as seen by the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanOutcome {
    pub blocks_ok: u64,
    pub blocks_failed: u64,
    pub interrupted: bool,
}

impl ScanOutcome {
    #[must_use]
    pub const fn blocks(&self) -> u64 {
        self.blocks_ok + self.blocks_failed
    }
}

impl fmt::Display for ScanOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} blocks ({} ok, {} failed){}",
            self.blocks(),
            self.blocks_ok,
            self.blocks_failed,
            if self.interrupted { ", interrupted" } else { "" }
        )
    }
}

/// Final histogram as `label  count` rows, in legend order: latency bands,
/// the overflow band, then error kinds.
#[must_use]
pub fn histogram_lines(stats: &StatsState, legend: &Legend) -> Vec<String> {
    let counts = stats.latency_buckets.iter().chain(&stats.error_counts);
    legend
        .entries()
        .into_iter()
        .zip(counts)
        .map(|(entry, count)| format!("{:<8} {:>12}", entry.label, group_thousands(*count)))
        .collect()
}
