//! Dashboard canvas: a fixed set of terminal regions painted by the render
//! thread.
//!
//! Regions are laid out once, from the terminal size at allocation time, with
//! a 40-column legend column on the right:
//!
//! ```text
//! row 1        CUR LBA | END LBA            | ETA
//! row 2..      visualization strip          | SPEED
//! row 4..14                                 | legend | counts
//! row 16..                                  | summary
//! rows-3..-2   log strip (full width)
//! ```
//!
//! Painting only stages text into region buffers and flags them dirty.
//! [`Canvas::commit`] turns every dirty region into one escape-sequence frame
//! and hands it to the surface with a single write and a single flush.
//!
//! The canvas owns its regions. [`Canvas::destroy`] blanks and releases them
//! exactly once; dropping a canvas that was never destroyed releases them too,
//! so an aborted `open` cannot leak regions.

use std::collections::VecDeque;
use std::io::{self, Write};

use crossterm::cursor::MoveTo;
use crossterm::queue;
use crossterm::style::{Color, ResetColor, SetBackgroundColor, SetForegroundColor};
use crossterm::terminal::{BeginSynchronizedUpdate, EndSynchronizedUpdate};

use crate::core::errors::{BvError, Result};
use crate::render::legend::{Glyph, Legend};
use crate::render::report::DeviceContext;
use crate::render::stats::StatsState;
use crate::tui::surface::Surface;

/// Width of the legend/readout column on the right.
pub const LEGEND_WIDTH: u16 = 40;
/// Smallest terminal the layout fits in.
pub const MIN_COLS: u16 = 80;
pub const MIN_ROWS: u16 = 24;

const LEGEND_TOP: u16 = 4;
const LEGEND_HEIGHT: u16 = 11;
const SUMMARY_TOP: u16 = 16;
const SUMMARY_MAX_HEIGHT: u16 = 10;
const LBA_READOUT_WIDTH: u16 = 20;

/// Screen rectangle, zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

impl Rect {
    const fn new(x: u16, y: u16, width: u16, height: u16) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Named dashboard regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegionKind {
    Legend,
    Counts,
    Vis,
    Speed,
    Eta,
    Summary,
    EndLba,
    CurLba,
    Log,
}

impl RegionKind {
    pub const ALL: [Self; 9] = [
        Self::Legend,
        Self::Counts,
        Self::Vis,
        Self::Speed,
        Self::Eta,
        Self::Summary,
        Self::EndLba,
        Self::CurLba,
        Self::Log,
    ];

    const fn index(self) -> usize {
        self as usize
    }
}

/// Compute every region rectangle for a `cols` x `rows` terminal.
pub fn layout(cols: u16, rows: u16) -> Result<Vec<(RegionKind, Rect)>> {
    if cols < MIN_COLS || rows < MIN_ROWS {
        return Err(BvError::TerminalTooSmall {
            cols,
            rows,
            min_cols: MIN_COLS,
            min_rows: MIN_ROWS,
        });
    }
    let right = cols - LEGEND_WIDTH;
    let half = LEGEND_WIDTH / 2;
    let summary_height = (rows - 3 - SUMMARY_TOP).min(SUMMARY_MAX_HEIGHT);

    Ok(RegionKind::ALL
        .iter()
        .map(|&kind| {
            let rect = match kind {
                RegionKind::Legend => Rect::new(right, LEGEND_TOP, half, LEGEND_HEIGHT),
                RegionKind::Counts => Rect::new(right + half, LEGEND_TOP, half, LEGEND_HEIGHT),
                RegionKind::Vis => Rect::new(0, 2, right - 1, rows - 5),
                RegionKind::Speed => Rect::new(right, 2, LEGEND_WIDTH, 1),
                RegionKind::Eta => Rect::new(right, 1, LEGEND_WIDTH, 1),
                RegionKind::Summary => Rect::new(right, SUMMARY_TOP, LEGEND_WIDTH, summary_height),
                RegionKind::EndLba => {
                    Rect::new(right - LBA_READOUT_WIDTH, 1, LBA_READOUT_WIDTH - 1, 1)
                }
                RegionKind::CurLba => {
                    Rect::new(right - 2 * LBA_READOUT_WIDTH, 1, LBA_READOUT_WIDTH, 1)
                }
                RegionKind::Log => Rect::new(0, rows - 3, cols, 2),
            };
            (kind, rect)
        })
        .collect())
}

// ──────────────────── region ────────────────────

/// A scrolling text buffer bound to one rectangle.
#[derive(Debug)]
pub struct Region {
    rect: Rect,
    lines: VecDeque<Vec<Glyph>>,
    at_line_start: bool,
    dirty: bool,
}

impl Region {
    fn new(rect: Rect) -> Self {
        Self {
            rect,
            lines: VecDeque::with_capacity(usize::from(rect.height) + 1),
            at_line_start: false,
            dirty: true,
        }
    }

    #[must_use]
    pub const fn rect(&self) -> Rect {
        self.rect
    }

    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Visible text, one string per line, trailing blanks dropped.
    #[must_use]
    pub fn text_lines(&self) -> Vec<String> {
        self.lines
            .iter()
            .map(|line| line.iter().map(|g| g.symbol).collect::<String>())
            .collect()
    }

    /// Clear the region content.
    pub fn erase(&mut self) {
        self.lines.clear();
        self.at_line_start = false;
        self.dirty = true;
    }

    /// Append one cell, wrapping at the region width and scrolling at its
    /// height.
    pub fn put(&mut self, glyph: Glyph) {
        let width = usize::from(self.rect.width);
        let needs_line = self.at_line_start
            || self
                .lines
                .back()
                .is_none_or(|line| line.len() >= width);
        if needs_line {
            self.push_line();
            self.at_line_start = false;
        }
        if let Some(line) = self.lines.back_mut() {
            line.push(glyph);
        }
        self.dirty = true;
    }

    /// Print text in one colour; `\n` moves to the next line.
    pub fn print(&mut self, text: &str, fg: Color) {
        for c in text.chars() {
            if c == '\n' {
                if self.at_line_start || self.lines.is_empty() {
                    self.push_line();
                }
                self.at_line_start = true;
                self.dirty = true;
            } else {
                self.put(Glyph::new(c, fg));
            }
        }
    }

    /// Start a fresh line unless the region is empty.
    pub fn start_line(&mut self) {
        if !self.lines.is_empty() {
            self.at_line_start = true;
        }
    }

    fn push_line(&mut self) {
        self.lines.push_back(Vec::new());
        while self.lines.len() > usize::from(self.rect.height) {
            self.lines.pop_front();
        }
    }

    fn stage(&self, out: &mut Vec<u8>) -> io::Result<()> {
        let width = usize::from(self.rect.width);
        for row in 0..self.rect.height {
            queue!(out, MoveTo(self.rect.x, self.rect.y + row), ResetColor)?;
            let cells = self
                .lines
                .get(usize::from(row))
                .map_or(&[][..], Vec::as_slice);
            let mut style: Option<(Color, Option<Color>)> = None;
            for glyph in cells.iter().take(width) {
                if style != Some((glyph.fg, glyph.bg)) {
                    queue!(
                        out,
                        SetForegroundColor(glyph.fg),
                        SetBackgroundColor(glyph.bg.unwrap_or(Color::Reset))
                    )?;
                    style = Some((glyph.fg, glyph.bg));
                }
                write!(out, "{}", glyph.symbol)?;
            }
            let used = cells.len().min(width);
            if used < width {
                queue!(out, ResetColor)?;
                write!(out, "{:pad$}", "", pad = width - used)?;
            }
        }
        Ok(())
    }

    fn stage_blank(&self, out: &mut Vec<u8>) -> io::Result<()> {
        let width = usize::from(self.rect.width);
        queue!(out, ResetColor)?;
        for row in 0..self.rect.height {
            queue!(out, MoveTo(self.rect.x, self.rect.y + row))?;
            write!(out, "{:width$}", "")?;
        }
        Ok(())
    }
}

// ──────────────────── canvas ────────────────────

/// All dashboard regions plus the surface they are flushed to.
pub struct Canvas {
    surface: Box<dyn Surface>,
    regions: Vec<Region>,
    frame: Vec<u8>,
    released: bool,
}

impl std::fmt::Debug for Canvas {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Canvas")
            .field("regions", &self.regions.len())
            .field("released", &self.released)
            .finish_non_exhaustive()
    }
}

impl Canvas {
    /// Allocate every region for the surface's current size.
    ///
    /// # Errors
    /// [`BvError::TerminalTooSmall`] when the layout does not fit, or a
    /// terminal error if the size cannot be queried.
    pub fn allocate(surface: Box<dyn Surface>) -> Result<Self> {
        let (cols, rows) = surface
            .size()
            .map_err(|source| BvError::terminal("query terminal size", source))?;
        let regions = layout(cols, rows)?
            .into_iter()
            .map(|(_, rect)| Region::new(rect))
            .collect();
        Ok(Self {
            surface,
            regions,
            frame: Vec::with_capacity(16 * 1024),
            released: false,
        })
    }

    #[must_use]
    pub fn region(&self, kind: RegionKind) -> &Region {
        &self.regions[kind.index()]
    }

    pub fn region_mut(&mut self, kind: RegionKind) -> &mut Region {
        &mut self.regions[kind.index()]
    }

    /// Regions still held by the canvas.
    #[must_use]
    pub fn live_regions(&self) -> usize {
        if self.released { 0 } else { self.regions.len() }
    }

    /// Static legend: one glyph and label per latency band and error kind.
    pub fn paint_legend(&mut self, legend: &Legend) {
        let region = self.region_mut(RegionKind::Legend);
        region.erase();
        for entry in legend.entries() {
            region.start_line();
            region.put(entry.glyph);
            region.print(&format!(" {}", entry.label), Color::Reset);
        }
    }

    /// Summary header and end-LBA readout.
    pub fn paint_header(&mut self, device: &DeviceContext) {
        let summary = self.region_mut(RegionKind::Summary);
        summary.erase();
        summary.print(
            &format!(
                "{} {} bs={}\nCtrl+C to abort\n",
                device.procedure,
                device.path.display(),
                device.block_size
            ),
            Color::Reset,
        );

        let end = self.region_mut(RegionKind::EndLba);
        end.erase();
        end.print(
            &format!("/ {}", group_thousands(device.end_lba())),
            Color::Reset,
        );
    }

    /// Append one block glyph to the visualization strip.
    pub fn push_glyph(&mut self, glyph: Glyph) {
        self.region_mut(RegionKind::Vis).put(glyph);
    }

    /// Counts panel, speed/ETA readouts (once known) and current LBA.
    pub fn paint_stats(&mut self, state: &StatsState) {
        let counts = self.region_mut(RegionKind::Counts);
        counts.erase();
        for count in state.latency_buckets.iter().chain(&state.error_counts) {
            counts.start_line();
            counts.print(&count.to_string(), Color::Reset);
        }

        if state.avg_speed != 0 {
            let speed = self.region_mut(RegionKind::Speed);
            speed.erase();
            speed.print(&format_speed(state.avg_speed), Color::Reset);
        }

        if state.eta_seconds != 0 {
            let eta = self.region_mut(RegionKind::Eta);
            eta.erase();
            eta.print(&format_eta(state.eta_seconds), Color::Reset);
        }

        let cur = self.region_mut(RegionKind::CurLba);
        cur.erase();
        cur.print(
            &format!("LBA: {:>14}", group_thousands(state.current_lba)),
            Color::Reset,
        );
    }

    /// Add one line to the scrolling log strip.
    pub fn append_log(&mut self, line: &str) {
        let log = self.region_mut(RegionKind::Log);
        log.start_line();
        log.print(line, Color::Reset);
    }

    /// Final verdict and the key prompt.
    pub fn paint_outcome(&mut self, interrupted: bool) {
        let summary = self.region_mut(RegionKind::Summary);
        summary.start_line();
        if interrupted {
            summary.print("Aborted.\n", Color::Yellow);
        } else {
            summary.print("Completed.\n", Color::Green);
        }
        summary.print("Press any key", Color::Reset);
    }

    /// Flush every dirty region to the surface as one frame.
    pub fn commit(&mut self) -> Result<()> {
        let Self {
            surface,
            regions,
            frame,
            ..
        } = self;
        if !regions.iter().any(Region::is_dirty) {
            return Ok(());
        }

        frame.clear();
        stage_dirty(frame, regions).map_err(|source| BvError::terminal("stage frame", source))?;

        let out = surface.writer();
        out.write_all(frame)
            .and_then(|()| out.flush())
            .map_err(|source| BvError::terminal("flush frame", source))
    }

    /// Audible/visual alert.
    pub fn alert(&mut self) -> Result<()> {
        let out = self.surface.writer();
        out.write_all(b"\x07")
            .and_then(|()| out.flush())
            .map_err(|source| BvError::terminal("ring bell", source))
    }

    /// Block until the user presses a key.
    pub fn wait_for_key(&mut self) -> Result<()> {
        self.surface
            .wait_for_key()
            .map_err(|source| BvError::terminal("wait for key", source))
    }

    /// Blank every region on screen and release it. Returns how many regions
    /// were released.
    pub fn destroy(mut self) -> Result<usize> {
        self.release()
    }

    fn release(&mut self) -> Result<usize> {
        if self.released {
            return Ok(0);
        }
        self.released = true;

        let Self {
            surface,
            regions,
            frame,
            ..
        } = self;
        frame.clear();
        stage_blank(frame, regions).map_err(|source| BvError::terminal("clear regions", source))?;

        let out = surface.writer();
        out.write_all(frame)
            .and_then(|()| out.flush())
            .map_err(|source| BvError::terminal("clear regions", source))?;
        Ok(regions.len())
    }
}

fn stage_dirty(frame: &mut Vec<u8>, regions: &mut [Region]) -> io::Result<()> {
    queue!(frame, BeginSynchronizedUpdate)?;
    for region in regions.iter_mut().filter(|r| r.dirty) {
        region.stage(frame)?;
        region.dirty = false;
    }
    queue!(frame, ResetColor, EndSynchronizedUpdate)
}

fn stage_blank(frame: &mut Vec<u8>, regions: &[Region]) -> io::Result<()> {
    for region in regions {
        region.stage_blank(frame)?;
    }
    queue!(frame, ResetColor)
}

impl Drop for Canvas {
    fn drop(&mut self) {
        if !self.released {
            let _ = self.release();
        }
    }
}

// ──────────────────── format helpers ────────────────────

/// `1234567` → `1,234,567`.
#[must_use]
pub fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn format_speed(bytes_per_sec: u64) -> String {
    format!("SPEED {:7} kb/s", bytes_per_sec / 1024)
}

fn format_eta(seconds: u64) -> String {
    format!("ETA {:11}:{:02}", seconds / 60, seconds % 60)
}
