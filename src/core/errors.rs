//! BV-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, BvError>;

/// Top-level error type for blockview.
#[derive(Debug, Error)]
pub enum BvError {
    #[error("[BV-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[BV-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[BV-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error(
        "[BV-2001] terminal too small for dashboard: {cols}x{rows}, need at least {min_cols}x{min_rows}"
    )]
    TerminalTooSmall {
        cols: u16,
        rows: u16,
        min_cols: u16,
        min_rows: u16,
    },

    #[error("[BV-2002] terminal failure during {context}: {source}")]
    Terminal {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("[BV-2101] render thread failure: {details}")]
    RenderThread { details: String },

    #[error("[BV-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl BvError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "BV-1001",
            Self::MissingConfig { .. } => "BV-1002",
            Self::ConfigParse { .. } => "BV-1003",
            Self::TerminalTooSmall { .. } => "BV-2001",
            Self::Terminal { .. } => "BV-2002",
            Self::RenderThread { .. } => "BV-2101",
            Self::Io { .. } => "BV-3002",
        }
    }

    /// Whether the failure ends the render session.
    ///
    /// Region allocation and render-thread failures abort the scan; the host
    /// reports them and stops.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::TerminalTooSmall { .. } | Self::Terminal { .. } | Self::RenderThread { .. }
        )
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Convenience constructor for terminal write/query failures.
    #[must_use]
    pub fn terminal(context: &'static str, source: std::io::Error) -> Self {
        Self::Terminal { context, source }
    }
}

impl From<toml::de::Error> for BvError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}

impl From<toml::ser::Error> for BvError {
    fn from(value: toml::ser::Error) -> Self {
        Self::ConfigParse {
            context: "toml-ser",
            details: value.to_string(),
        }
    }
}
