//! Ownership of the active output file.
//!
//! [`HandleLifecycle`] holds at most one [`ActiveFile`]. Rotation opens the
//! replacement first and only then retires the old handle, so a failed
//! rotation leaves the previous file current and writable.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crono_fs::{Filesystem, OutputHandle};

use crate::disposer::Disposer;
use crate::error::{Error, Result};

/// The single open destination and the path it was opened for.
#[derive(Debug)]
pub(crate) struct ActiveFile {
    path: PathBuf,
    handle: Box<dyn OutputHandle>,
    /// Set after a failed write; the next write reopens the path.
    poisoned: bool,
}

impl ActiveFile {
    pub(crate) fn new(path: PathBuf, handle: Box<dyn OutputHandle>) -> Self {
        Self {
            path,
            handle,
            poisoned: false,
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn close(self) -> Result<()> {
        let ActiveFile { path, handle, .. } = self;
        handle.close().map_err(|source| Error::Close { path, source })
    }
}

pub(crate) struct HandleLifecycle {
    fs: Arc<dyn Filesystem>,
    active: Option<ActiveFile>,
    disposer: Disposer,
}

impl HandleLifecycle {
    pub(crate) fn new(fs: Arc<dyn Filesystem>, disposer: Disposer) -> Self {
        Self {
            fs,
            active: None,
            disposer,
        }
    }

    pub(crate) fn active_path(&self) -> Option<&Path> {
        self.active.as_ref().map(ActiveFile::path)
    }

    /// Whether a write targeting `path` must open a new handle first.
    pub(crate) fn needs_rotation(&self, path: &Path) -> bool {
        match &self.active {
            Some(active) => active.poisoned || active.path != path,
            None => true,
        }
    }

    /// Open `path` and make it the active file.
    ///
    /// Parent directories are created as needed. The previous handle, if any,
    /// is handed to the disposer only after the new one is installed.
    pub(crate) fn rotate(&mut self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            self.fs
                .create_dir_all(dir)
                .map_err(|source| Error::CreateDirectory {
                    path: dir.to_path_buf(),
                    source,
                })?;
        }

        let handle = self
            .fs
            .open_append(path)
            .map_err(|source| Error::OpenFile {
                path: path.to_path_buf(),
                source,
            })?;

        let fresh = ActiveFile::new(path.to_path_buf(), handle);
        if let Some(previous) = self.active.replace(fresh) {
            self.disposer.dispose(previous);
        }
        Ok(())
    }

    /// Write the whole buffer to the active file.
    pub(crate) fn write(&mut self, data: &[u8]) -> Result<usize> {
        let active = self.active.as_mut().ok_or(Error::NotOpen)?;
        match active.handle.write_all(data) {
            Ok(()) => Ok(data.len()),
            Err(source) => {
                active.poisoned = true;
                Err(Error::Write {
                    path: active.path.clone(),
                    source,
                })
            }
        }
    }

    /// Close the active file synchronously.
    pub(crate) fn close(&mut self) -> Result<()> {
        self.active.take().ok_or(Error::NotOpen)?.close()
    }
}
