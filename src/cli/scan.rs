//! Sequential read scan of a block device or disk image.
//!
//! Each block is read with one `read_exact` and timed with a monotonic clock.
//! A failed read is reported with a status derived from the I/O error kind,
//! and the next block is read after an explicit seek so one bad sector does
//! not shift every later offset.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use crate::cli::ScanOutcome;
use crate::core::config::Config;
use crate::core::errors::{BvError, Result};
use crate::render::activity::{ActivityEvent, LogHandle};
use crate::render::report::{BlockReport, BlockStatus, DeviceContext};
use crate::render::{Renderer, SessionSummary, SlidingWindow};
use crate::tui::surface::Surface;

/// Procedure name shown in the dashboard header.
pub const READ_PROCEDURE: &str = "read";

/// Device size in bytes, leaving the cursor at the start.
pub fn probe_capacity<S: Seek>(source: &mut S) -> io::Result<u64> {
    let end = source.seek(SeekFrom::End(0))?;
    source.seek(SeekFrom::Start(0))?;
    Ok(end)
}

/// Map a failed read to the error kind shown on the block map.
#[must_use]
pub fn classify_read_error(err: &io::Error) -> BlockStatus {
    match err.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => BlockStatus::Timeout,
        io::ErrorKind::InvalidData => BlockStatus::Uncorrectable,
        io::ErrorKind::UnexpectedEof | io::ErrorKind::NotFound => BlockStatus::IdNotFound,
        io::ErrorKind::Interrupted => BlockStatus::Aborted,
        _ => BlockStatus::Error,
    }
}

/// Read every whole block of `device` from `source`, feeding `renderer`.
///
/// Stops early, with `interrupted` set, once `stop` is raised.
///
/// # Errors
/// Only seek failures are fatal; read failures become error reports.
pub fn scan_blocks<S, R>(
    source: &mut S,
    device: &DeviceContext,
    renderer: &mut R,
    log: Option<&LogHandle>,
    stop: &AtomicBool,
) -> Result<ScanOutcome>
where
    S: Read + Seek,
    R: Renderer,
{
    let block_len = usize::try_from(device.block_size)
        .ok()
        .filter(|&len| len > 0)
        .ok_or_else(|| BvError::InvalidConfig {
            details: format!("block size {} is not usable", device.block_size),
        })?;
    let mut buf = vec![0u8; block_len];
    let mut outcome = ScanOutcome::default();
    let mut needs_seek = true;

    for lba in 0..device.end_lba() {
        if stop.load(Ordering::Relaxed) {
            outcome.interrupted = true;
            if let Some(log) = log {
                log.send(ActivityEvent::Interrupted { lba });
            }
            break;
        }
        if needs_seek {
            source
                .seek(SeekFrom::Start(lba * device.block_size))
                .map_err(|e| BvError::io(&device.path, e))?;
            needs_seek = false;
        }

        let started = Instant::now();
        let result = source.read_exact(&mut buf);
        let access_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);

        let report = match result {
            Ok(()) => {
                outcome.blocks_ok += 1;
                BlockReport::ok(lba, access_time_us)
            }
            Err(e) => {
                let status = classify_read_error(&e);
                outcome.blocks_failed += 1;
                needs_seek = true;
                if let Some(log) = log {
                    log.send(ActivityEvent::BlockFailed { lba, status });
                }
                BlockReport::failed(lba, status, access_time_us)
            }
        };
        renderer.handle_report(&report, lba + 1);
    }

    if !outcome.interrupted
        && let Some(log) = log
    {
        log.send(ActivityEvent::Finished {
            blocks: outcome.blocks(),
        });
    }
    Ok(outcome)
}

/// Open `path`, show the dashboard on `surface`, and read it end to end.
///
/// # Errors
/// Fails if the path cannot be opened or sized, the device is smaller than
/// one block, or the dashboard cannot be opened or closed cleanly.
pub fn read_session(
    path: &Path,
    block_size: u64,
    config: &Config,
    surface: Box<dyn Surface>,
    stop: &AtomicBool,
) -> Result<(SessionSummary, ScanOutcome)> {
    let mut file = File::open(path).map_err(|e| BvError::io(path, e))?;
    let capacity = probe_capacity(&mut file).map_err(|e| BvError::io(path, e))?;
    if block_size == 0 || capacity < block_size {
        return Err(BvError::InvalidConfig {
            details: format!(
                "{} holds {capacity} bytes, not enough for one {block_size}-byte block",
                path.display()
            ),
        });
    }

    let device = DeviceContext::new(path, capacity, block_size, READ_PROCEDURE);
    let mut window = SlidingWindow::open(&device, surface, config)?;
    let log = window.log_handle();
    log.send(ActivityEvent::ScanStarted {
        device: path.display().to_string(),
        blocks: device.end_lba(),
    });

    let outcome = scan_blocks(&mut file, &device, &mut window, Some(&log), stop)?;
    let summary = window.close(outcome.interrupted)?;
    Ok((summary, outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::test_support::RecordingRenderer;
    use std::io::Cursor;

    /// Cursor that fails reads starting inside `bad` byte ranges.
    struct FlakySource {
        inner: Cursor<Vec<u8>>,
        bad: Vec<(u64, io::ErrorKind)>,
        block: u64,
    }

    impl Read for FlakySource {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let pos = self.inner.position();
            if let Some((_, kind)) = self.bad.iter().find(|(lba, _)| *lba == pos / self.block) {
                // Leave the cursor mid-block so the next read must re-seek.
                self.inner.set_position(pos + 1);
                return Err(io::Error::new(*kind, "injected"));
            }
            self.inner.read(buf)
        }
    }

    impl Seek for FlakySource {
        fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
            self.inner.seek(pos)
        }
    }

    fn device(blocks: u64) -> DeviceContext {
        DeviceContext::new("/dev/test", blocks * 512, 512, READ_PROCEDURE)
    }

    #[test]
    fn classify_maps_error_kinds() {
        let kind = |k| classify_read_error(&io::Error::new(k, "x"));
        assert_eq!(kind(io::ErrorKind::TimedOut), BlockStatus::Timeout);
        assert_eq!(kind(io::ErrorKind::InvalidData), BlockStatus::Uncorrectable);
        assert_eq!(kind(io::ErrorKind::UnexpectedEof), BlockStatus::IdNotFound);
        assert_eq!(kind(io::ErrorKind::Interrupted), BlockStatus::Aborted);
        assert_eq!(kind(io::ErrorKind::PermissionDenied), BlockStatus::Error);
    }

    #[test]
    fn probe_capacity_rewinds() {
        let mut cursor = Cursor::new(vec![0u8; 4096]);
        assert_eq!(probe_capacity(&mut cursor).expect("probe"), 4096);
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn clean_source_reports_every_block_in_order() {
        let mut source = Cursor::new(vec![7u8; 16 * 512]);
        let mut renderer = RecordingRenderer::default();
        let stop = AtomicBool::new(false);

        let outcome =
            scan_blocks(&mut source, &device(16), &mut renderer, None, &stop).expect("scan");
        assert_eq!(outcome.blocks_ok, 16);
        assert_eq!(outcome.blocks_failed, 0);
        assert!(!outcome.interrupted);

        let lbas: Vec<u64> = renderer.reports.iter().map(|(r, _)| r.lba).collect();
        assert_eq!(lbas, (0..16).collect::<Vec<_>>());
        let progress: Vec<u64> = renderer.reports.iter().map(|(_, p)| *p).collect();
        assert_eq!(progress, (1..=16).collect::<Vec<_>>());
    }

    #[test]
    fn failed_blocks_are_reported_and_later_blocks_realigned() {
        let mut data = vec![0u8; 8 * 512];
        for (lba, chunk) in data.chunks_mut(512).enumerate() {
            chunk.fill(u8::try_from(lba).expect("small lba"));
        }
        let mut source = FlakySource {
            inner: Cursor::new(data),
            bad: vec![(2, io::ErrorKind::InvalidData), (5, io::ErrorKind::TimedOut)],
            block: 512,
        };
        let mut renderer = RecordingRenderer::default();
        let stop = AtomicBool::new(false);

        let outcome =
            scan_blocks(&mut source, &device(8), &mut renderer, None, &stop).expect("scan");
        assert_eq!(outcome.blocks_ok, 6);
        assert_eq!(outcome.blocks_failed, 2);

        let statuses: Vec<BlockStatus> = renderer.reports.iter().map(|(r, _)| r.status).collect();
        assert_eq!(statuses[2], BlockStatus::Uncorrectable);
        assert_eq!(statuses[5], BlockStatus::Timeout);
        assert_eq!(statuses.iter().filter(|s| s.is_ok()).count(), 6);
    }

    #[test]
    fn raised_stop_flag_interrupts_before_next_block() {
        let mut source = Cursor::new(vec![0u8; 4 * 512]);
        let mut renderer = RecordingRenderer::default();
        let stop = AtomicBool::new(true);
        let (log, rx) = crate::render::activity::log_channel(4);

        let outcome =
            scan_blocks(&mut source, &device(4), &mut renderer, Some(&log), &stop).expect("scan");
        assert!(outcome.interrupted);
        assert!(renderer.reports.is_empty());
        let line = rx.try_recv().expect("interrupt logged");
        assert_eq!(line.event, ActivityEvent::Interrupted { lba: 0 });
    }

    #[test]
    fn zero_block_size_is_rejected() {
        let mut source = Cursor::new(vec![0u8; 512]);
        let device = DeviceContext::new("/dev/test", 512, 0, READ_PROCEDURE);
        let err = scan_blocks(
            &mut source,
            &device,
            &mut RecordingRenderer::default(),
            None,
            &AtomicBool::new(false),
        )
        .expect_err("zero block size");
        assert_eq!(err.code(), "BV-1001");
    }
}
