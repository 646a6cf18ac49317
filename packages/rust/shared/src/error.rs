//! Error types for LawWatch.
//!
//! Library crates use [`LawWatchError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all LawWatch operations.
#[derive(Debug, thiserror::Error)]
pub enum LawWatchError {
    /// Network/HTTP failure talking to the feed, stage, file, or bot endpoints.
    ///
    /// `transient` marks failures worth retrying (connect/timeout, 5xx, 429).
    #[error("fetch error: {message}")]
    Fetch { message: String, transient: bool },

    /// Malformed feed markup, stage metadata, or document structure.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Attachment body could not be turned into text.
    #[error("extract error: {0}")]
    Extract(String),

    /// Snapshot, ledger, keyword, or pending-file read/write failure.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// The notification sink rejected a delivery.
    #[error("notify error: {0}")]
    Notify(String),

    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, LawWatchError>;

impl LawWatchError {
    /// A fetch failure that is worth retrying.
    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Fetch {
            message: msg.into(),
            transient: true,
        }
    }

    /// A fetch failure that will not succeed on retry (4xx, bad URL).
    pub fn permanent(msg: impl Into<String>) -> Self {
        Self::Fetch {
            message: msg.into(),
            transient: false,
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether a retry could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Fetch {
                transient: true,
                ..
            }
        )
    }
}
