//! Writer configuration.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crono_clock::{Clock, SystemClock};
use crono_fs::{Filesystem, RealFilesystem};

use crate::diagnostics::{
    Diagnostics, Level, NullDiagnostics, StderrDiagnostics, StdioDiagnostics, StdoutDiagnostics,
};
use crate::pattern::Location;

/// Default time zone for path resolution.
pub const DEFAULT_LOCATION: Location = Location::Local;

/// Default for opening the first file while constructing the writer.
pub const DEFAULT_OPEN_ON_CONSTRUCT: bool = false;

/// Default delay before a superseded handle is closed.
pub const DEFAULT_DISPOSAL_GRACE: Duration = Duration::ZERO;

/// Options for [`crate::CronoWriter`].
///
/// Assembled once and consumed by the constructor; the writer never changes
/// them afterwards.
#[derive(Clone)]
pub struct WriterOptions {
    pub location: Location,
    /// Template for a symlink kept pointing at the active file.
    pub symlink: Option<String>,
    pub open_on_construct: bool,
    pub disposal_grace: Duration,
    pub diagnostics: Arc<dyn Diagnostics>,
    pub clock: Arc<dyn Clock>,
    pub filesystem: Arc<dyn Filesystem>,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            location: DEFAULT_LOCATION,
            symlink: None,
            open_on_construct: DEFAULT_OPEN_ON_CONSTRUCT,
            disposal_grace: DEFAULT_DISPOSAL_GRACE,
            diagnostics: Arc::new(NullDiagnostics),
            clock: Arc::new(SystemClock),
            filesystem: Arc::new(RealFilesystem),
        }
    }
}

impl WriterOptions {
    /// Create options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set location.
    pub fn with_location(mut self, location: Location) -> Self {
        self.location = location;
        self
    }

    /// Builder: set symlink template.
    pub fn with_symlink(mut self, pattern: impl Into<String>) -> Self {
        self.symlink = Some(pattern.into());
        self
    }

    /// Builder: set open_on_construct.
    pub fn with_open_on_construct(mut self, open: bool) -> Self {
        self.open_on_construct = open;
        self
    }

    /// Builder: set disposal_grace.
    pub fn with_disposal_grace(mut self, grace: Duration) -> Self {
        self.disposal_grace = grace;
        self
    }

    /// Builder: set diagnostics sink.
    pub fn with_diagnostics<D: Diagnostics + 'static>(mut self, diagnostics: D) -> Self {
        self.diagnostics = Arc::new(diagnostics);
        self
    }

    /// Builder: mirror writes to stdout and report errors to stderr.
    pub fn with_stdio_diagnostics(self) -> Self {
        self.with_diagnostics(StdioDiagnostics::new(Level::Error))
    }

    /// Builder: mirror writes and report errors to stdout.
    pub fn with_stdout_diagnostics(self) -> Self {
        self.with_diagnostics(StdoutDiagnostics::new(Level::Error))
    }

    /// Builder: mirror writes and report errors to stderr.
    pub fn with_stderr_diagnostics(self) -> Self {
        self.with_diagnostics(StderrDiagnostics::new(Level::Error))
    }

    /// Builder: set clock.
    pub fn with_clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Builder: set filesystem.
    pub fn with_filesystem<F: Filesystem + 'static>(mut self, filesystem: F) -> Self {
        self.filesystem = Arc::new(filesystem);
        self
    }
}

impl fmt::Debug for WriterOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriterOptions")
            .field("location", &self.location)
            .field("symlink", &self.symlink)
            .field("open_on_construct", &self.open_on_construct)
            .field("disposal_grace", &self.disposal_grace)
            .finish_non_exhaustive()
    }
}
