//! The rotating writer.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crono_clock::Clock;
use crono_fs::Filesystem;

use crate::diagnostics::Diagnostics;
use crate::disposer::Disposer;
use crate::error::{Error, Result};
use crate::guard::{Exclusive, Guard};
use crate::handle::HandleLifecycle;
use crate::options::WriterOptions;
use crate::pattern::{Location, Pattern};
use crate::symlink::SymlinkMaintainer;

/// Mutable part of the writer, only touched under the guard.
struct WriterState {
    files: HandleLifecycle,
    closed: bool,
}

/// Writer that appends to a file whose path is derived from the current time.
///
/// Every write resolves the pattern for "now". When the resolved path differs
/// from the file currently open, the new file is opened (creating parent
/// directories), made current, and the old one is closed in the background.
///
/// The guard type decides how concurrent calls are serialized; see
/// [`crate::guard`].
///
/// # Example
///
/// ```no_run
/// use crono_writer::{CronoWriter, Location, WriterOptions};
///
/// let options = WriterOptions::new()
///     .with_location(Location::Utc)
///     .with_symlink("/var/log/app/current.log");
/// let writer = CronoWriter::new("/var/log/app/%Y/%m/%d/app.log", options)?;
/// writer.write(b"started\n")?;
/// # Ok::<(), crono_writer::Error>(())
/// ```
pub struct CronoWriter<G: Guard = Exclusive> {
    pattern: Pattern,
    symlink: SymlinkMaintainer,
    location: Location,
    clock: Arc<dyn Clock>,
    fs: Arc<dyn Filesystem>,
    diagnostics: Arc<dyn Diagnostics>,
    state: G::Cell<WriterState>,
}

impl CronoWriter<Exclusive> {
    /// Compile `pattern` and build a writer guarded by a mutex.
    pub fn new(pattern: &str, options: WriterOptions) -> Result<Self> {
        Self::with_guard(pattern, options)
    }

    /// Like [`CronoWriter::new`], but panics if the writer cannot be built.
    pub fn must_new(pattern: &str, options: WriterOptions) -> Self {
        match Self::new(pattern, options) {
            Ok(writer) => writer,
            Err(e) => panic!("cannot create writer for {pattern:?}: {e}"),
        }
    }
}

impl<G: Guard> CronoWriter<G> {
    /// Build a writer with an explicit guard, e.g.
    /// `CronoWriter::<PassThrough>::with_guard(..)`.
    ///
    /// Fails if the pattern or the symlink pattern is malformed, or, with
    /// `open_on_construct`, if the first file cannot be opened.
    pub fn with_guard(pattern: &str, options: WriterOptions) -> Result<Self> {
        let pattern = Pattern::compile(pattern)?;
        let symlink = options
            .symlink
            .as_deref()
            .map(Pattern::compile)
            .transpose()?;

        let disposer = Disposer::new(options.disposal_grace, Arc::clone(&options.diagnostics));
        let files = HandleLifecycle::new(Arc::clone(&options.filesystem), disposer);

        let writer = Self {
            pattern,
            symlink: SymlinkMaintainer::new(symlink),
            location: options.location,
            clock: options.clock,
            fs: options.filesystem,
            diagnostics: options.diagnostics,
            state: G::wrap(WriterState {
                files,
                closed: false,
            }),
        };

        if options.open_on_construct {
            writer.write(&[])?;
        }
        Ok(writer)
    }

    /// Append `data` to the file for the current instant.
    ///
    /// Returns the number of bytes written, which is always `data.len()` on
    /// success. Directory, open and write failures are returned as is; a
    /// failed rotation leaves the previous file current.
    pub fn write(&self, data: &[u8]) -> Result<usize> {
        self.report(G::with(&self.state, |state| self.write_locked(state, data)))
    }

    /// Close the active file.
    ///
    /// Closing a writer that never opened a file returns [`Error::NotOpen`]
    /// and leaves it usable. Any call after a close returns [`Error::Closed`].
    pub fn close(&self) -> Result<()> {
        self.report(G::with(&self.state, |state| {
            if state.closed {
                return Err(Error::Closed);
            }
            let result = state.files.close();
            if !matches!(result, Err(Error::NotOpen)) {
                state.closed = true;
            }
            result
        }))
    }

    /// Path of the file currently open, if any.
    pub fn path(&self) -> Option<PathBuf> {
        G::with(&self.state, |state| state.files.active_path().map(Path::to_path_buf))
    }

    /// The compiled file pattern.
    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    /// The compiled symlink pattern, if a symlink is maintained.
    pub fn symlink_pattern(&self) -> Option<&Pattern> {
        self.symlink.pattern()
    }

    /// Time zone the patterns are resolved in.
    pub fn location(&self) -> Location {
        self.location
    }

    fn write_locked(&self, state: &mut WriterState, data: &[u8]) -> Result<usize> {
        if state.closed {
            return Err(Error::Closed);
        }

        let now = self.clock.now();
        let path = self.pattern.resolve(now, self.location);

        if state.files.needs_rotation(&path) {
            let previous = state.files.active_path().map(Path::to_path_buf);
            state.files.rotate(&path)?;
            match previous {
                None => self.diagnostics.info(&format!("opened {}", path.display())),
                Some(prev) if prev == path => {
                    self.diagnostics.info(&format!("reopened {}", path.display()))
                }
                Some(prev) => self.diagnostics.info(&format!(
                    "rotated {} -> {}",
                    prev.display(),
                    path.display()
                )),
            }
            self.symlink
                .refresh(&*self.fs, &path, now, self.location, &*self.diagnostics);
        }

        self.diagnostics.emit(data);
        state.files.write(data)
    }

    fn report<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            self.diagnostics.error(&e.to_string());
        }
        result
    }
}

impl<G: Guard> io::Write for CronoWriter<G> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        CronoWriter::write(&*self, buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<G: Guard> io::Write for &CronoWriter<G> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        CronoWriter::write(*self, buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<G: Guard> fmt::Debug for CronoWriter<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CronoWriter")
            .field("pattern", &self.pattern.as_str())
            .field("symlink", &self.symlink.pattern().map(Pattern::as_str))
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{Level, MockDiagnostics};
    use crate::guard::PassThrough;
    use crate::test_support::wait_until;
    use chrono::{DateTime, TimeDelta, Utc};
    use crono_clock::{AdvancingClock, MockClock};
    use crono_fs::{FailPoint, MockFilesystem};

    const PER_SECOND: &str = "/logs/test.log.%Y%m%d%H%M%S";

    fn start() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2017-02-04T16:35:05+09:00")
            .expect("valid timestamp")
            .with_timezone(&Utc)
    }

    struct Harness {
        clock: MockClock,
        fs: MockFilesystem,
        diag: MockDiagnostics,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                clock: MockClock::new(start()),
                fs: MockFilesystem::new(),
                diag: MockDiagnostics::new(),
            }
        }

        fn options(&self) -> WriterOptions {
            WriterOptions::new()
                .with_location("+09:00".parse().expect("location"))
                .with_clock(self.clock.clone())
                .with_filesystem(self.fs.clone())
                .with_diagnostics(self.diag.clone())
        }

        fn file(&self, path: &str) -> Option<Vec<u8>> {
            self.fs.get_file(Path::new(path))
        }
    }

    // --- Construction ---

    #[test]
    fn test_new_rejects_malformed_pattern() {
        let h = Harness::new();
        let err = CronoWriter::new("/path/to/%", h.options()).unwrap_err();

        assert!(err.is_construction());
        assert_eq!(h.fs.open_count(), 0);
    }

    #[test]
    fn test_new_rejects_malformed_symlink_pattern() {
        let h = Harness::new();
        let err = CronoWriter::new(PER_SECOND, h.options().with_symlink("/logs/%")).unwrap_err();

        assert!(matches!(err, Error::PatternCompile { ref pattern, .. } if pattern == "/logs/%"));
    }

    #[test]
    #[should_panic(expected = "cannot create writer")]
    fn test_must_new_panics_on_malformed_pattern() {
        let h = Harness::new();
        let _ = CronoWriter::must_new("/path/to/%", h.options());
    }

    #[test]
    fn test_construct_does_not_open_by_default() {
        let h = Harness::new();
        let writer = CronoWriter::new(PER_SECOND, h.options()).expect("new");

        assert_eq!(writer.path(), None);
        assert_eq!(h.fs.open_count(), 0);
    }

    #[test]
    fn test_open_on_construct_opens_first_file() {
        let h = Harness::new();
        let writer = CronoWriter::new(PER_SECOND, h.options().with_open_on_construct(true))
            .expect("new");

        assert_eq!(writer.path(), Some(PathBuf::from("/logs/test.log.20170204163505")));
        assert_eq!(h.file("/logs/test.log.20170204163505"), Some(Vec::new()));
    }

    #[test]
    fn test_open_on_construct_surfaces_open_failure() {
        let h = Harness::new();
        h.fs.inject_failure(FailPoint::Open, "/logs/test.log.20170204163505");

        let err = CronoWriter::new(PER_SECOND, h.options().with_open_on_construct(true))
            .unwrap_err();

        assert!(matches!(err, Error::OpenFile { .. }));
        assert!(!err.is_construction());
    }

    #[test]
    fn test_accessors() {
        let h = Harness::new();
        let writer = CronoWriter::new(PER_SECOND, h.options().with_symlink("/logs/current"))
            .expect("new");

        assert_eq!(writer.pattern().as_str(), PER_SECOND);
        assert_eq!(writer.symlink_pattern().map(Pattern::as_str), Some("/logs/current"));
        assert_eq!(writer.location().to_string(), "+09:00");
        assert!(format!("{:?}", writer).starts_with("CronoWriter { pattern: \"/logs/test.log"));
    }

    // --- Write and rotate ---

    #[test]
    fn test_writes_in_same_second_share_file() {
        let h = Harness::new();
        let writer = CronoWriter::new(PER_SECOND, h.options()).expect("new");

        assert_eq!(writer.write(b"test").expect("write"), 4);
        assert_eq!(writer.write(b"test").expect("write"), 4);

        assert_eq!(h.file("/logs/test.log.20170204163505"), Some(b"testtest".to_vec()));
        assert_eq!(h.fs.open_count(), 1);
    }

    #[test]
    fn test_new_second_rotates_to_new_file() {
        let h = Harness::new();
        let writer = CronoWriter::new(PER_SECOND, h.options()).expect("new");

        writer.write(b"test").expect("write");
        h.clock.advance(TimeDelta::seconds(2));
        writer.write(b"test").expect("write");

        assert_eq!(h.file("/logs/test.log.20170204163505"), Some(b"test".to_vec()));
        assert_eq!(h.file("/logs/test.log.20170204163507"), Some(b"test".to_vec()));
        assert_eq!(writer.path(), Some(PathBuf::from("/logs/test.log.20170204163507")));
        assert!(wait_until(|| h.fs.closed_count() == 1));
        assert_eq!(h.fs.live_handles(), vec![PathBuf::from("/logs/test.log.20170204163507")]);
    }

    #[test]
    fn test_no_rotation_within_boundary() {
        let fs = MockFilesystem::new();
        let options = WriterOptions::new()
            .with_location(Location::Utc)
            .with_clock(AdvancingClock::new(start(), TimeDelta::seconds(1)))
            .with_filesystem(fs.clone());
        let writer = CronoWriter::new("/logs/%Y%m%d%H.log", options).expect("new");

        for _ in 0..30 {
            writer.write(b".").expect("write");
        }

        assert_eq!(fs.open_count(), 1);
        assert_eq!(fs.get_file(Path::new("/logs/2017020407.log")), Some(vec![b'.'; 30]));
    }

    #[test]
    fn test_rotation_is_reported() {
        let h = Harness::new();
        let writer = CronoWriter::new(PER_SECOND, h.options()).expect("new");

        writer.write(b"a").expect("write");
        h.clock.advance(TimeDelta::seconds(1));
        writer.write(b"b").expect("write");

        assert_eq!(
            h.diag.messages_at_level(Level::Info),
            vec![
                "opened /logs/test.log.20170204163505",
                "rotated /logs/test.log.20170204163505 -> /logs/test.log.20170204163506",
            ]
        );
        assert_eq!(h.diag.emitted(), b"ab");
    }

    #[test]
    fn test_failed_open_keeps_previous_file() {
        let h = Harness::new();
        let writer = CronoWriter::new(PER_SECOND, h.options()).expect("new");
        writer.write(b"first").expect("write");
        h.fs.inject_failure(FailPoint::Open, "/logs/test.log.20170204163506");

        h.clock.advance(TimeDelta::seconds(1));
        let err = writer.write(b"lost").unwrap_err();

        assert!(matches!(err, Error::OpenFile { .. }));
        assert_eq!(writer.path(), Some(PathBuf::from("/logs/test.log.20170204163505")));
        assert_eq!(h.diag.error_count(), 1);

        h.clock.set(start());
        writer.write(b" again").expect("write to previous file");
        assert_eq!(h.file("/logs/test.log.20170204163505"), Some(b"first again".to_vec()));
        assert_eq!(h.fs.open_count(), 1);
    }

    #[test]
    fn test_failed_directory_creation_is_returned() {
        let h = Harness::new();
        h.fs.inject_failure(FailPoint::CreateDir, "/logs/2017");
        let writer = CronoWriter::new("/logs/%Y/app.log", h.options()).expect("new");

        let err = writer.write(b"x").unwrap_err();

        assert!(matches!(err, Error::CreateDirectory { ref path, .. } if path == Path::new("/logs/2017")));
        assert_eq!(writer.path(), None);
        assert!(h.diag.contains("failed to create directory /logs/2017"));
    }

    #[test]
    fn test_write_failure_reopens_on_next_write() {
        let h = Harness::new();
        let writer = CronoWriter::new(PER_SECOND, h.options()).expect("new");
        writer.write(b"one").expect("write");
        h.fs.inject_failure(FailPoint::Write, "/logs/test.log.20170204163505");

        assert!(matches!(writer.write(b"two"), Err(Error::Write { .. })));

        h.fs.clear_failure(FailPoint::Write, "/logs/test.log.20170204163505");
        writer.write(b"three").expect("write");

        assert_eq!(h.file("/logs/test.log.20170204163505"), Some(b"onethree".to_vec()));
        assert_eq!(h.fs.open_count(), 2);
        assert!(h.diag.contains("reopened /logs/test.log.20170204163505"));
    }

    // --- Symlink ---

    #[test]
    fn test_symlink_tracks_active_file() {
        let h = Harness::new();
        let writer = CronoWriter::new(PER_SECOND, h.options().with_symlink("/logs/current"))
            .expect("new");

        writer.write(b"test").expect("write");
        assert_eq!(
            h.fs.read_through(Path::new("/logs/current")),
            h.file("/logs/test.log.20170204163505")
        );

        h.clock.advance(TimeDelta::seconds(2));
        writer.write(b"next").expect("write");
        assert_eq!(
            h.fs.symlink_target(Path::new("/logs/current")),
            Some(PathBuf::from("/logs/test.log.20170204163507"))
        );
        assert_eq!(h.fs.read_through(Path::new("/logs/current")), Some(b"next".to_vec()));
    }

    #[test]
    fn test_symlink_not_refreshed_without_rotation() {
        let h = Harness::new();
        let writer = CronoWriter::new(PER_SECOND, h.options().with_symlink("/logs/current"))
            .expect("new");

        writer.write(b"a").expect("write");
        writer.write(b"b").expect("write");

        assert_eq!(h.diag.messages_at_level(Level::Debug).len(), 1);
    }

    #[test]
    fn test_symlink_same_path_does_not_fail_write() {
        let h = Harness::new();
        let writer = CronoWriter::new(PER_SECOND, h.options().with_symlink(PER_SECOND))
            .expect("new");

        writer.write(b"test").expect("write");

        assert_eq!(h.file("/logs/test.log.20170204163505"), Some(b"test".to_vec()));
        assert!(h.diag.contains("resolves to the active file itself"));
    }

    #[test]
    fn test_symlink_failure_does_not_fail_write() {
        let h = Harness::new();
        h.fs.inject_failure(FailPoint::Symlink, "/logs/current");
        let writer = CronoWriter::new(PER_SECOND, h.options().with_symlink("/logs/current"))
            .expect("new");

        assert_eq!(writer.write(b"test").expect("write"), 4);

        assert_eq!(h.file("/logs/test.log.20170204163505"), Some(b"test".to_vec()));
        assert_eq!(h.diag.error_count(), 1);
        assert!(h.diag.contains("failed to link /logs/current"));
    }

    // --- Close ---

    #[test]
    fn test_close_never_opened() {
        let h = Harness::new();
        let writer = CronoWriter::new(PER_SECOND, h.options()).expect("new");

        assert!(matches!(writer.close(), Err(Error::NotOpen)));

        writer.write(b"still usable").expect("write");
        writer.close().expect("close");
    }

    #[test]
    fn test_close_releases_handle() {
        let h = Harness::new();
        let writer = CronoWriter::new(PER_SECOND, h.options()).expect("new");
        writer.write(b"test").expect("write");

        writer.close().expect("close");

        assert_eq!(h.fs.closed_count(), 1);
        assert_eq!(writer.path(), None);
    }

    #[test]
    fn test_calls_after_close_fail() {
        let h = Harness::new();
        let writer = CronoWriter::new(PER_SECOND, h.options()).expect("new");
        writer.write(b"test").expect("write");
        writer.close().expect("close");

        assert!(matches!(writer.close(), Err(Error::Closed)));
        assert!(matches!(writer.write(b"late"), Err(Error::Closed)));
        assert_eq!(h.file("/logs/test.log.20170204163505"), Some(b"test".to_vec()));
        assert_eq!(h.fs.open_count(), 1);
    }

    #[test]
    fn test_close_failure_is_returned() {
        let h = Harness::new();
        let writer = CronoWriter::new(PER_SECOND, h.options()).expect("new");
        writer.write(b"test").expect("write");
        h.fs.inject_failure(FailPoint::Close, "/logs/test.log.20170204163505");

        assert!(matches!(writer.close(), Err(Error::Close { .. })));
        assert!(matches!(writer.write(b"late"), Err(Error::Closed)));
    }

    // --- Guards and io::Write ---

    #[test]
    fn test_pass_through_guard() {
        let h = Harness::new();
        let writer = CronoWriter::<PassThrough>::with_guard(PER_SECOND, h.options()).expect("new");

        writer.write(b"test").expect("write");
        writer.write(b"test").expect("write");
        writer.close().expect("close");

        assert_eq!(h.file("/logs/test.log.20170204163505"), Some(b"testtest".to_vec()));
    }

    #[test]
    fn test_io_write_impls() {
        use std::io::Write as _;

        let h = Harness::new();
        let mut writer = CronoWriter::new(PER_SECOND, h.options()).expect("new");

        writeln!(writer, "line {}", 1).expect("owned write");
        writeln!(&writer, "line {}", 2).expect("shared write");
        writer.flush().expect("flush");

        assert_eq!(h.file("/logs/test.log.20170204163505"), Some(b"line 1\nline 2\n".to_vec()));
    }

    #[test]
    fn test_io_write_maps_errors() {
        use std::io::Write as _;

        let h = Harness::new();
        let mut writer = CronoWriter::new(PER_SECOND, h.options()).expect("new");
        writer.write(b"x").expect("write");
        writer.close().expect("close");

        let err = writer.write_all(b"late").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
    }

    #[test]
    fn test_exclusive_writer_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        fn assert_send<T: Send>() {}

        assert_send_sync::<CronoWriter<Exclusive>>();
        assert_send::<CronoWriter<PassThrough>>();
    }
}
