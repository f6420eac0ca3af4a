//! Session log: events any thread can push into the dashboard's log strip.
//!
//! Senders hold a cloneable [`LogHandle`] wrapping a bounded crossbeam
//! `Sender`. `send()` uses `try_send()`, so the scan loop is never blocked by
//! a slow render thread; events that do not fit are dropped and counted.
//! The render thread drains the channel once per tick.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Local};
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

use crate::render::report::BlockStatus;

/// Things worth a line in the log strip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityEvent {
    ScanStarted { device: String, blocks: u64 },
    BlockFailed { lba: u64, status: BlockStatus },
    Interrupted { lba: u64 },
    Finished { blocks: u64 },
    Message(String),
}

impl ActivityEvent {
    /// One-line description without timestamp.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::ScanStarted { device, blocks } => {
                format!("scan started on {device} ({blocks} blocks)")
            }
            Self::BlockFailed { lba, status } => {
                format!("{} at LBA {lba}", status.label())
            }
            Self::Interrupted { lba } => format!("interrupted at LBA {lba}"),
            Self::Finished { blocks } => format!("finished, {blocks} blocks processed"),
            Self::Message(text) => text.clone(),
        }
    }
}

/// A timestamped event as queued for the render thread.
#[derive(Debug, Clone)]
pub struct LogLine {
    pub at: DateTime<Local>,
    pub event: ActivityEvent,
}

impl LogLine {
    #[must_use]
    pub fn render(&self) -> String {
        format!("[{}] {}", self.at.format("%H:%M:%S"), self.event.describe())
    }
}

/// Thread-safe, cheaply-cloneable sending side of the log strip.
#[derive(Debug, Clone)]
pub struct LogHandle {
    tx: Sender<LogLine>,
    dropped_events: Arc<AtomicU64>,
}

impl LogHandle {
    /// Queue an event. Non-blocking; drops and counts on a full channel.
    pub fn send(&self, event: ActivityEvent) {
        let line = LogLine {
            at: Local::now(),
            event,
        };
        if let Err(TrySendError::Full(_)) = self.tx.try_send(line) {
            self.dropped_events.fetch_add(1, Ordering::Relaxed);
        }
        // Disconnected is fine once the render thread has exited.
    }

    /// Shorthand for [`ActivityEvent::Message`].
    pub fn message(&self, text: impl Into<String>) {
        self.send(ActivityEvent::Message(text.into()));
    }

    /// Number of events dropped due to channel back-pressure.
    #[must_use]
    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }
}

/// Create the log channel with room for `capacity` pending lines.
#[must_use]
pub fn log_channel(capacity: usize) -> (LogHandle, Receiver<LogLine>) {
    let (tx, rx) = bounded(capacity.max(1));
    (
        LogHandle {
            tx,
            dropped_events: Arc::new(AtomicU64::new(0)),
        },
        rx,
    )
}
