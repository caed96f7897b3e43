//! Filesystem operations used by the rotating writer.
//!
//! Everything that touches the disk goes through [`Filesystem`], so rotation
//! logic can be exercised against [`crate::MockFilesystem`] without real I/O.

use std::fmt;
use std::fs::{self, DirBuilder, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use thiserror::Error;

/// Permission bits for newly created directories (before umask).
#[cfg(unix)]
const DIR_MODE: u32 = 0o777;

/// Permission bits for newly created output files (before umask).
#[cfg(unix)]
const FILE_MODE: u32 = 0o644;

/// Errors from filesystem operations.
#[derive(Debug, Error)]
pub enum FsError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("path error: {0}")]
    Path(String),
}

impl FsError {
    /// The `io::ErrorKind` behind this error, if it came from the OS.
    pub fn kind(&self) -> io::ErrorKind {
        match self {
            FsError::Io(e) => e.kind(),
            FsError::Path(_) => io::ErrorKind::InvalidInput,
        }
    }
}

/// An open destination that receives appended bytes.
pub trait OutputHandle: Send + fmt::Debug {
    /// Write the whole buffer. A short write is an error, never a silent truncation.
    fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// Flush buffered data to storage and release the handle.
    fn close(self: Box<Self>) -> io::Result<()>;
}

/// Trait for filesystem operations.
/// Abstracted for testing with mock implementations.
pub trait Filesystem: Send + Sync {
    /// Create directory and parents if needed.
    fn create_dir_all(&self, path: &Path) -> Result<(), FsError>;

    /// Open a file for appending, creating it if it doesn't exist.
    fn open_append(&self, path: &Path) -> Result<Box<dyn OutputHandle>, FsError>;

    /// Check whether any entry (file, directory or symlink, even a dangling
    /// one) exists at `path`. A missing entry is `Ok(false)`.
    fn entry_exists(&self, path: &Path) -> Result<bool, FsError>;

    /// Remove a file or symlink.
    fn remove(&self, path: &Path) -> Result<(), FsError>;

    /// Create a symlink at `link` pointing to `target`.
    fn symlink(&self, target: &Path, link: &Path) -> Result<(), FsError>;
}

/// Real filesystem implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFilesystem;

impl Filesystem for RealFilesystem {
    fn create_dir_all(&self, path: &Path) -> Result<(), FsError> {
        let mut builder = DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(DIR_MODE);
        }
        builder.create(path)?;
        Ok(())
    }

    fn open_append(&self, path: &Path) -> Result<Box<dyn OutputHandle>, FsError> {
        let mut options = OpenOptions::new();
        options.create(true).append(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(FILE_MODE);
        }
        let file = options.open(path)?;
        Ok(Box::new(FileHandle::new(file)))
    }

    fn entry_exists(&self, path: &Path) -> Result<bool, FsError> {
        match fs::symlink_metadata(path) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn remove(&self, path: &Path) -> Result<(), FsError> {
        fs::remove_file(path)?;
        Ok(())
    }

    fn symlink(&self, target: &Path, link: &Path) -> Result<(), FsError> {
        #[cfg(unix)]
        return std::os::unix::fs::symlink(target, link).map_err(FsError::from);

        #[cfg(windows)]
        return std::os::windows::fs::symlink_file(target, link).map_err(FsError::from);

        #[cfg(not(any(unix, windows)))]
        {
            let _ = (target, link);
            Err(FsError::Io(io::Error::new(
                io::ErrorKind::Unsupported,
                "symlinks are not supported on this platform",
            )))
        }
    }
}

/// Output handle backed by a real file opened in append mode.
#[derive(Debug)]
pub struct FileHandle {
    file: File,
}

impl FileHandle {
    /// Wrap an already opened file.
    pub fn new(file: File) -> Self {
        Self { file }
    }
}

impl OutputHandle for FileHandle {
    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.file.write_all(data)
    }

    fn close(self: Box<Self>) -> io::Result<()> {
        // Character devices and pipes reject fsync with EINVAL; there is
        // nothing to flush for them.
        match self.file.sync_data() {
            Err(e) if e.kind() != io::ErrorKind::InvalidInput => Err(e),
            _ => Ok(()),
        }
    }
}
