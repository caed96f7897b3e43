//! Time-rotating file writer.
//!
//! This crate provides:
//! - CronoWriter, which appends to a file named by a strftime-style pattern
//!   and moves to a new file whenever the resolved name changes
//! - Guard policies (Exclusive, PassThrough) selecting how calls are serialized
//! - An optional symlink kept pointing at the active file
//! - A Diagnostics sink for mirroring writes and reporting what happened
//! - WriterOptions for time zone, clock, filesystem and disposal settings

pub mod diagnostics;
mod disposer;
pub mod error;
pub mod guard;
mod handle;
pub mod options;
pub mod pattern;
pub mod symlink;
mod writer;

#[cfg(test)]
mod test_support;

pub use crono_clock::{AdvancingClock, Clock, MockClock, SystemClock};
pub use crono_fs::{Filesystem, MockFilesystem, RealFilesystem};
pub use diagnostics::{
    Diagnostics, Level, LogEntry, MockDiagnostics, NullDiagnostics, StderrDiagnostics,
    StdioDiagnostics, StdoutDiagnostics,
};
pub use error::{Error, Result};
pub use guard::{Exclusive, Guard, PassThrough};
pub use options::{
    WriterOptions, DEFAULT_DISPOSAL_GRACE, DEFAULT_LOCATION, DEFAULT_OPEN_ON_CONSTRUCT,
};
pub use pattern::{Location, LocationParseError, Pattern};
pub use symlink::SymlinkWarning;
pub use writer::CronoWriter;
