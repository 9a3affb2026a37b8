//! Crate-specific error types for mmap-view.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result alias for mmap-view operations.
pub type Result<T> = std::result::Result<T, MapError>;

/// Error type for mapping requests.
///
/// There are two families: caller mistakes ([`MapError::InvalidArgument`],
/// [`MapError::OutOfBounds`]) which are raised before any filesystem work,
/// and I/O failures ([`MapError::Io`], [`MapError::FlushFailed`]) raised by
/// the backing store or the mapping syscall.
#[derive(Debug, Error)]
pub enum MapError {
    /// A request argument was rejected before touching the filesystem.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Error when a requested offset/length pair is out of bounds.
    #[error("range out of bounds: offset={offset}, len={len}, total={total}")]
    OutOfBounds {
        /// Requested offset.
        offset: u64,
        /// Requested length.
        len: u64,
        /// Total size of the mapping.
        total: u64,
    },

    /// A filesystem or mapping syscall failed.
    #[error("{op} failed for {}: {source}", path.display())]
    Io {
        /// Operation that failed (`open`, `stat`, `extend`, `mmap`, ...).
        op: &'static str,
        /// Path the operation was applied to.
        path: PathBuf,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// Error when a flush operation fails.
    #[error("flush failed: {0}")]
    FlushFailed(String),
}

impl MapError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            op,
            path: path.into(),
            source,
        }
    }

    /// Whether this error was caused by the caller's arguments rather than the OS.
    #[must_use]
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_) | Self::OutOfBounds { .. })
    }

    /// Whether the backing file did not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.io_kind() == Some(io::ErrorKind::NotFound)
    }

    /// Kind of the underlying OS error, if any.
    #[must_use]
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            Self::Io { source, .. } => Some(source.kind()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_argument_errors() {
        assert!(MapError::invalid("path must not be empty").is_invalid_argument());
        let oob = MapError::OutOfBounds {
            offset: 10,
            len: 4,
            total: 8,
        };
        assert!(oob.is_invalid_argument());
        assert_eq!(oob.io_kind(), None);
    }

    #[test]
    fn io_error_carries_context() {
        let err = MapError::io(
            "open",
            "/tmp/missing.bin",
            io::Error::from(io::ErrorKind::NotFound),
        );
        assert!(err.is_not_found());
        assert!(!err.is_invalid_argument());
        let msg = err.to_string();
        assert!(msg.starts_with("open failed for /tmp/missing.bin"), "{msg}");
    }
}
