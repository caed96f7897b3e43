//! Error types for crono-writer.

use std::io;
use std::path::PathBuf;

use crono_fs::FsError;

/// Result type for writer operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by [`crate::CronoWriter`].
///
/// `PatternCompile` only ever comes out of construction; every other variant
/// is a runtime failure of a specific `write` or `close` call.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid pattern {pattern:?}: {reason}")]
    PatternCompile { pattern: String, reason: String },

    #[error("failed to create directory {}: {source}", .path.display())]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: FsError,
    },

    #[error("failed to open {}: {source}", .path.display())]
    OpenFile {
        path: PathBuf,
        #[source]
        source: FsError,
    },

    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to close {}: {source}", .path.display())]
    Close {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("no active file: nothing has been written yet")]
    NotOpen,

    #[error("writer is closed")]
    Closed,
}

impl Error {
    /// True for errors raised while building the writer, as opposed to
    /// failures of an individual write or close.
    pub fn is_construction(&self) -> bool {
        matches!(self, Error::PatternCompile { .. })
    }

    fn io_kind(&self) -> io::ErrorKind {
        match self {
            Error::PatternCompile { .. } => io::ErrorKind::InvalidInput,
            Error::CreateDirectory { source, .. } | Error::OpenFile { source, .. } => {
                source.kind()
            }
            Error::Write { source, .. } | Error::Close { source, .. } => source.kind(),
            Error::NotOpen | Error::Closed => io::ErrorKind::NotConnected,
        }
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        io::Error::new(err.io_kind(), err)
    }
}
