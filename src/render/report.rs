//! Per-block reports produced by the scan loop, and the device context the
//! dashboard is opened against.

use std::path::{Path, PathBuf};

/// Outcome of reading or verifying one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum BlockStatus {
    #[default]
    Ok = 0,
    /// Generic I/O error.
    Error = 1,
    /// Command timed out.
    Timeout = 2,
    /// Uncorrectable read error.
    Uncorrectable = 3,
    /// Sector ID not found.
    IdNotFound = 4,
    /// Command aborted by the device.
    Aborted = 5,
}

impl BlockStatus {
    /// Error kinds in display order.
    pub const ERRORS: [Self; 5] = [
        Self::Error,
        Self::Timeout,
        Self::Uncorrectable,
        Self::IdNotFound,
        Self::Aborted,
    ];

    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Index into per-error-kind tables, `None` for [`BlockStatus::Ok`].
    #[must_use]
    pub const fn error_index(self) -> Option<usize> {
        match self {
            Self::Ok => None,
            other => Some(other as usize - 1),
        }
    }

    /// Wire value stored in ring slots.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Decode a slot value. Unknown values are reported as a generic error.
    #[must_use]
    pub const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Ok,
            2 => Self::Timeout,
            3 => Self::Uncorrectable,
            4 => Self::IdNotFound,
            5 => Self::Aborted,
            _ => Self::Error,
        }
    }

    /// Short legend label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Error => "ERR",
            Self::Timeout => "TIMEOUT",
            Self::Uncorrectable => "UNC",
            Self::IdNotFound => "IDNF",
            Self::Aborted => "ABRT",
        }
    }
}

/// One processed block as seen by the dashboard. Immutable once produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockReport {
    /// Logical block address.
    pub lba: u64,
    pub status: BlockStatus,
    /// Time spent on the block, in microseconds.
    pub access_time_us: u64,
}

impl BlockReport {
    #[must_use]
    pub const fn ok(lba: u64, access_time_us: u64) -> Self {
        Self {
            lba,
            status: BlockStatus::Ok,
            access_time_us,
        }
    }

    #[must_use]
    pub const fn failed(lba: u64, status: BlockStatus, access_time_us: u64) -> Self {
        Self {
            lba,
            status,
            access_time_us,
        }
    }
}

/// A report together with the sequence number it was published under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueEntry {
    pub seqno: u64,
    pub report: BlockReport,
}

/// Static facts about the scanned device, supplied by the host at `open`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceContext {
    /// Device size in bytes.
    pub capacity: u64,
    /// Bytes covered by one LBA step.
    pub block_size: u64,
    pub path: PathBuf,
    /// Name of the running procedure, shown in the summary header.
    pub procedure: String,
}

impl DeviceContext {
    #[must_use]
    pub fn new(
        path: impl AsRef<Path>,
        capacity: u64,
        block_size: u64,
        procedure: impl Into<String>,
    ) -> Self {
        Self {
            capacity,
            block_size,
            path: path.as_ref().to_path_buf(),
            procedure: procedure.into(),
        }
    }

    /// Last addressable LBA step (`capacity / block_size`).
    #[must_use]
    pub const fn end_lba(&self) -> u64 {
        if self.block_size == 0 {
            0
        } else {
            self.capacity / self.block_size
        }
    }

    /// Bytes covered up to `lba`, clamped to the device capacity.
    #[must_use]
    pub const fn bytes_processed(&self, lba: u64) -> u64 {
        let bytes = lba.saturating_mul(self.block_size);
        if bytes > self.capacity {
            self.capacity
        } else {
            bytes
        }
    }
}
