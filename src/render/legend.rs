//! Glyph legend: latency bands and error kinds mapped to one visual symbol.
//!
//! Built once from [`LegendConfig`] and handed to the stats aggregator and the
//! canvas at construction; nothing here is mutable global state.

use crossterm::style::Color;

use crate::core::config::{LATENCY_BANDS, LegendConfig};
use crate::render::report::{BlockReport, BlockStatus};

/// Index of the overflow bucket (slower than every threshold).
pub const OVERFLOW_BUCKET: usize = LATENCY_BANDS;

/// Total latency buckets including overflow.
pub const LATENCY_BUCKETS: usize = LATENCY_BANDS + 1;

/// Number of error kinds tracked.
pub const ERROR_KINDS: usize = BlockStatus::ERRORS.len();

/// A single styled cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Glyph {
    pub symbol: char,
    pub fg: Color,
    pub bg: Option<Color>,
}

impl Glyph {
    #[must_use]
    pub const fn new(symbol: char, fg: Color) -> Self {
        Self {
            symbol,
            fg,
            bg: None,
        }
    }

    #[must_use]
    pub const fn on(mut self, bg: Color) -> Self {
        self.bg = Some(bg);
        self
    }
}

const BAND_GLYPHS: [Glyph; LATENCY_BUCKETS] = [
    Glyph::new('░', Color::DarkGrey),
    Glyph::new('▒', Color::Grey),
    Glyph::new('▓', Color::Green),
    Glyph::new('█', Color::Yellow),
    Glyph::new('█', Color::DarkYellow),
    Glyph::new('█', Color::Red),
];

const ERROR_GLYPHS: [Glyph; ERROR_KINDS] = [
    Glyph::new('x', Color::White).on(Color::DarkRed),
    Glyph::new('T', Color::White).on(Color::DarkRed),
    Glyph::new('U', Color::White).on(Color::DarkRed),
    Glyph::new('I', Color::White).on(Color::DarkRed),
    Glyph::new('A', Color::White).on(Color::DarkRed),
];

/// One legend row: the glyph and what it stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegendEntry {
    pub glyph: Glyph,
    pub label: String,
}

/// Latency thresholds and the glyph tables that go with them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Legend {
    thresholds_us: [u64; LATENCY_BANDS],
}

impl Legend {
    /// Thresholds must be strictly ascending; [`LegendConfig`] validation
    /// guarantees that for loaded configs.
    #[must_use]
    pub const fn new(thresholds_us: [u64; LATENCY_BANDS]) -> Self {
        Self { thresholds_us }
    }

    #[must_use]
    pub const fn from_config(config: &LegendConfig) -> Self {
        Self::new(config.latency_thresholds_us)
    }

    /// First bucket whose threshold exceeds `access_time_us`, or
    /// [`OVERFLOW_BUCKET`].
    #[must_use]
    pub fn latency_bucket(&self, access_time_us: u64) -> usize {
        self.thresholds_us
            .iter()
            .position(|&threshold| access_time_us < threshold)
            .unwrap_or(OVERFLOW_BUCKET)
    }

    /// Glyph for one report: error kind first, latency band otherwise.
    #[must_use]
    pub fn glyph_for(&self, report: &BlockReport) -> Glyph {
        match report.status.error_index() {
            Some(idx) => ERROR_GLYPHS[idx],
            None => BAND_GLYPHS[self.latency_bucket(report.access_time_us)],
        }
    }

    /// Legend rows: latency buckets in ascending order, then error kinds.
    #[must_use]
    pub fn entries(&self) -> Vec<LegendEntry> {
        let mut entries = Vec::with_capacity(LATENCY_BUCKETS + ERROR_KINDS);
        for (glyph, threshold) in BAND_GLYPHS.iter().zip(self.thresholds_us) {
            entries.push(LegendEntry {
                glyph: *glyph,
                label: format!("<{}", format_latency(threshold)),
            });
        }
        entries.push(LegendEntry {
            glyph: BAND_GLYPHS[OVERFLOW_BUCKET],
            label: format!(">{}", format_latency(self.thresholds_us[LATENCY_BANDS - 1])),
        });
        for (glyph, status) in ERROR_GLYPHS.iter().zip(BlockStatus::ERRORS) {
            entries.push(LegendEntry {
                glyph: *glyph,
                label: status.label().to_string(),
            });
        }
        entries
    }
}

impl Default for Legend {
    fn default() -> Self {
        Self::from_config(&LegendConfig::default())
    }
}

fn format_latency(us: u64) -> String {
    if us >= 1_000 && us % 1_000 == 0 {
        format!("{} ms", us / 1_000)
    } else {
        format!("{us} us")
    }
}
