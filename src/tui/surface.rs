//! Terminal surfaces the canvas paints onto.
//!
//! [`CrosstermSurface`] drives the real terminal. [`DiscardSurface`] counts
//! bytes and frames and keeps nothing, for headless sessions of any length.
//! [`CaptureSurface`] records every byte into a shared buffer so tests can
//! inspect what was painted. Both report a fixed size and never block on key
//! presses.

use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use crossterm::event::{self, Event, KeyEventKind};
use crossterm::terminal;
use parking_lot::Mutex;

/// Where a canvas draws, and how the end-of-scan prompt waits for the user.
pub trait Surface: Send {
    /// Terminal dimensions (columns, rows).
    fn size(&self) -> io::Result<(u16, u16)>;

    /// Sink for escape sequences and text.
    fn writer(&mut self) -> &mut dyn Write;

    /// Block until one key is pressed.
    fn wait_for_key(&mut self) -> io::Result<()>;
}

// ──────────────────── crossterm ────────────────────

/// Stdout-backed surface.
pub struct CrosstermSurface {
    out: io::Stdout,
}

impl CrosstermSurface {
    #[must_use]
    pub fn new() -> Self {
        Self { out: io::stdout() }
    }
}

impl Default for CrosstermSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl Surface for CrosstermSurface {
    fn size(&self) -> io::Result<(u16, u16)> {
        terminal::size()
    }

    fn writer(&mut self) -> &mut dyn Write {
        &mut self.out
    }

    fn wait_for_key(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        let result = read_one_key();
        let restored = terminal::disable_raw_mode();
        result.and(restored)
    }
}

fn read_one_key() -> io::Result<()> {
    // Discard keys typed while the scan was running.
    while event::poll(Duration::ZERO)? {
        let _ = event::read()?;
    }
    loop {
        if let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            return Ok(());
        }
    }
}

// ──────────────────── discard ────────────────────

/// Headless surface that drops every frame after counting it.
///
/// Memory use is constant regardless of how long the session runs. Clones
/// share the counters.
#[derive(Clone)]
pub struct DiscardSurface {
    cols: u16,
    rows: u16,
    writer: CountingWriter,
}

#[derive(Clone, Default)]
struct CountingWriter {
    written: Arc<AtomicU64>,
    flushes: Arc<AtomicUsize>,
}

impl Write for CountingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.written.fetch_add(buf.len() as u64, Ordering::Relaxed);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flushes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

impl DiscardSurface {
    #[must_use]
    pub fn new(cols: u16, rows: u16) -> Self {
        Self {
            cols,
            rows,
            writer: CountingWriter::default(),
        }
    }

    /// Total bytes painted and dropped so far.
    #[must_use]
    pub fn bytes_written(&self) -> u64 {
        self.writer.written.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn flushes(&self) -> usize {
        self.writer.flushes.load(Ordering::Relaxed)
    }
}

impl Surface for DiscardSurface {
    fn size(&self) -> io::Result<(u16, u16)> {
        Ok((self.cols, self.rows))
    }

    fn writer(&mut self) -> &mut dyn Write {
        &mut self.writer
    }

    fn wait_for_key(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// ──────────────────── capture ────────────────────

/// In-memory surface. Clones share the same buffer.
#[derive(Clone)]
pub struct CaptureSurface {
    cols: u16,
    rows: u16,
    writer: CaptureWriter,
    key_waits: Arc<AtomicUsize>,
}

#[derive(Clone, Default)]
struct CaptureWriter {
    buffer: Arc<Mutex<Vec<u8>>>,
    flushes: Arc<AtomicUsize>,
}

impl Write for CaptureWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flushes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

impl CaptureSurface {
    #[must_use]
    pub fn new(cols: u16, rows: u16) -> Self {
        Self {
            cols,
            rows,
            writer: CaptureWriter::default(),
            key_waits: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Raw bytes written so far, escape sequences included.
    #[must_use]
    pub fn bytes(&self) -> Vec<u8> {
        self.writer.buffer.lock().clone()
    }

    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.writer.buffer.lock().len()
    }

    /// Printed text with escape sequences stripped.
    #[must_use]
    pub fn text(&self) -> String {
        strip_escapes(&String::from_utf8_lossy(&self.bytes()))
    }

    /// Number of flushes, one per committed frame.
    #[must_use]
    pub fn flushes(&self) -> usize {
        self.writer.flushes.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn key_waits(&self) -> usize {
        self.key_waits.load(Ordering::Relaxed)
    }
}

impl Surface for CaptureSurface {
    fn size(&self) -> io::Result<(u16, u16)> {
        Ok((self.cols, self.rows))
    }

    fn writer(&mut self) -> &mut dyn Write {
        &mut self.writer
    }

    fn wait_for_key(&mut self) -> io::Result<()> {
        self.key_waits.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// Remove CSI (`ESC [ ... final`) and two-byte `ESC x` sequences.
fn strip_escapes(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\u{1b}' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('[') => {
                for next in chars.by_ref() {
                    if ('\u{40}'..='\u{7e}').contains(&next) {
                        break;
                    }
                }
            }
            Some(_) | None => {}
        }
    }
    out
}
