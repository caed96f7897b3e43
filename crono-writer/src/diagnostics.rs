//! Diagnostics sink for testable side-channel output.
//!
//! A writer can mirror the bytes it writes, and report what it is doing, to a
//! [`Diagnostics`] implementation. Nothing here feeds back into the write
//! path: a sink that fails to print never fails a write.

use std::io::Write;
use std::sync::{Arc, PoisonError, RwLock};

/// Severity of a diagnostics message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    /// Failures, including ones that were swallowed (symlink problems).
    Error,
    /// Rotations.
    Info,
    /// Handle disposal and other internals.
    Debug,
}

/// Trait for the diagnostics side channel.
///
/// Implementations must be thread-safe: the disposal worker reports from its
/// own thread.
pub trait Diagnostics: Send + Sync {
    /// Mirror bytes that are about to be written to the active file.
    fn emit(&self, data: &[u8]);

    /// Report a message at the given level.
    fn log(&self, level: Level, message: &str);

    fn error(&self, message: &str) {
        self.log(Level::Error, message);
    }

    fn info(&self, message: &str) {
        self.log(Level::Info, message);
    }

    fn debug(&self, message: &str) {
        self.log(Level::Debug, message);
    }
}

/// Sink that discards everything. The default.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullDiagnostics;

impl Diagnostics for NullDiagnostics {
    fn emit(&self, _data: &[u8]) {}

    fn log(&self, _level: Level, _message: &str) {}
}

/// Mirrors written bytes to stdout and messages to stderr.
#[derive(Debug, Clone, Copy)]
pub struct StdioDiagnostics {
    level: Level,
}

impl StdioDiagnostics {
    /// Create a sink that prints messages at or above `level` in severity.
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Whether a message at `level` is printed.
    pub fn enabled(&self, level: Level) -> bool {
        level <= self.level
    }
}

impl Default for StdioDiagnostics {
    fn default() -> Self {
        Self::new(Level::Error)
    }
}

impl Diagnostics for StdioDiagnostics {
    fn emit(&self, data: &[u8]) {
        let _ = std::io::stdout().write_all(data);
    }

    fn log(&self, level: Level, message: &str) {
        if self.enabled(level) {
            let _ = writeln!(std::io::stderr(), "{}", message);
        }
    }
}

/// Sends both written bytes and messages to stdout.
#[derive(Debug, Clone, Copy)]
pub struct StdoutDiagnostics {
    level: Level,
}

impl StdoutDiagnostics {
    /// Create a sink that prints messages at or above `level` in severity.
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Whether a message at `level` is printed.
    pub fn enabled(&self, level: Level) -> bool {
        level <= self.level
    }
}

impl Default for StdoutDiagnostics {
    fn default() -> Self {
        Self::new(Level::Error)
    }
}

impl Diagnostics for StdoutDiagnostics {
    fn emit(&self, data: &[u8]) {
        let _ = std::io::stdout().write_all(data);
    }

    fn log(&self, level: Level, message: &str) {
        if self.enabled(level) {
            let _ = writeln!(std::io::stdout(), "{}", message);
        }
    }
}

/// Sends both written bytes and messages to stderr.
#[derive(Debug, Clone, Copy)]
pub struct StderrDiagnostics {
    level: Level,
}

impl StderrDiagnostics {
    /// Create a sink that prints messages at or above `level` in severity.
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Whether a message at `level` is printed.
    pub fn enabled(&self, level: Level) -> bool {
        level <= self.level
    }
}

impl Default for StderrDiagnostics {
    fn default() -> Self {
        Self::new(Level::Error)
    }
}

impl Diagnostics for StderrDiagnostics {
    fn emit(&self, data: &[u8]) {
        let _ = std::io::stderr().write_all(data);
    }

    fn log(&self, level: Level, message: &str) {
        if self.enabled(level) {
            let _ = writeln!(std::io::stderr(), "{}", message);
        }
    }
}

/// A captured log entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub level: Level,
    pub message: String,
}

#[derive(Debug, Default)]
struct Captured {
    emitted: Vec<u8>,
    entries: Vec<LogEntry>,
}

/// Mock sink for testing that captures everything it is given.
/// Clones share the same capture buffer.
#[derive(Debug, Clone, Default)]
pub struct MockDiagnostics {
    captured: Arc<RwLock<Captured>>,
}

impl MockDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// All bytes passed to `emit`, concatenated.
    pub fn emitted(&self) -> Vec<u8> {
        self.read(|c| c.emitted.clone())
    }

    /// Get all captured log entries.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.read(|c| c.entries.clone())
    }

    /// Get messages at a specific level.
    pub fn messages_at_level(&self, level: Level) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|e| e.level == level)
            .map(|e| e.message)
            .collect()
    }

    /// Check if any message contains the given substring.
    pub fn contains(&self, substring: &str) -> bool {
        self.read(|c| c.entries.iter().any(|e| e.message.contains(substring)))
    }

    /// Number of messages logged at `Level::Error`.
    pub fn error_count(&self) -> usize {
        self.read(|c| c.entries.iter().filter(|e| e.level == Level::Error).count())
    }

    /// Clear all captured output.
    pub fn clear(&self) {
        let mut captured = self.captured.write().unwrap_or_else(PoisonError::into_inner);
        captured.emitted.clear();
        captured.entries.clear();
    }

    fn read<R>(&self, f: impl FnOnce(&Captured) -> R) -> R {
        f(&self.captured.read().unwrap_or_else(PoisonError::into_inner))
    }
}

impl Diagnostics for MockDiagnostics {
    fn emit(&self, data: &[u8]) {
        self.captured
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .emitted
            .extend_from_slice(data);
    }

    fn log(&self, level: Level, message: &str) {
        // Capture regardless of level so tests can see everything.
        self.captured
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .push(LogEntry {
                level,
                message: message.to_string(),
            });
    }
}
