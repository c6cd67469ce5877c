//! Error types for the OSCP engine.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the engine.
pub type Result<T> = std::result::Result<T, Error>;

/// Engine error.
///
/// Verification failure is deliberately not represented here: the verifier
/// reports its outcome as a `bool` and the solution is emitted either way.
#[derive(Debug, Error)]
pub enum Error {
    /// A file or directory could not be read.
    #[error("i/o error on {path}: {source}")]
    Io {
        /// Path of the file or directory that failed.
        path: PathBuf,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// Malformed input: weight file, corpus pattern, cache file or an
    /// empty exemplar.
    #[error("format error: {message}")]
    Format {
        /// What was malformed.
        message: String,
    },

    /// An out-of-range row or column argument. Indicates a caller bug.
    #[error("{op}: index {index} out of range (limit {limit})")]
    Index {
        /// Operation that was handed the bad index.
        op: &'static str,
        /// The offending index.
        index: usize,
        /// Exclusive upper bound that was violated.
        limit: usize,
    },

    /// A post-condition check on the matrix failed. Indicates an engine bug.
    #[error("invariant violated: {message}")]
    Invariant {
        /// Description of the failed check.
        message: String,
    },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn format(message: impl Into<String>) -> Self {
        Error::Format {
            message: message.into(),
        }
    }

    pub(crate) fn index(op: &'static str, index: usize, limit: usize) -> Self {
        Error::Index { op, index, limit }
    }

    pub(crate) fn invariant(message: impl Into<String>) -> Self {
        Error::Invariant {
            message: message.into(),
        }
    }
}
