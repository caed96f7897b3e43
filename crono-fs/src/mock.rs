//! In-memory filesystem for tests.
//!
//! `MockFilesystem` keeps files, directories and symlinks in shared maps,
//! records every handle it hands out, and can be told to fail specific
//! operations on specific paths.

use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::filesystem::{Filesystem, FsError, OutputHandle};

/// Maximum symlink hops followed by [`MockFilesystem::read_through`].
const MAX_SYMLINK_HOPS: usize = 16;

/// Operations that can be made to fail on a given path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    CreateDir,
    Open,
    Write,
    Close,
    Probe,
    Remove,
    Symlink,
}

#[derive(Debug, Clone)]
struct HandleRecord {
    path: PathBuf,
    closed: bool,
}

#[derive(Debug, Default)]
struct MockState {
    files: HashMap<PathBuf, Vec<u8>>,
    dirs: HashSet<PathBuf>,
    symlinks: HashMap<PathBuf, PathBuf>,
    handles: Vec<HandleRecord>,
    failures: HashSet<(FailPoint, PathBuf)>,
}

impl MockState {
    fn fails(&self, point: FailPoint, path: &Path) -> bool {
        self.failures.contains(&(point, path.to_path_buf()))
    }

    fn has_entry(&self, path: &Path) -> bool {
        self.files.contains_key(path)
            || self.dirs.contains(path)
            || self.symlinks.contains_key(path)
    }

    fn parent_exists(&self, path: &Path) -> bool {
        match path.parent() {
            None => true,
            Some(parent) if parent.as_os_str().is_empty() || parent == Path::new("/") => true,
            Some(parent) => self.dirs.contains(parent),
        }
    }
}

/// Where a symlink at `link` storing `target` points. Relative targets are
/// taken from the link's own directory.
fn follow(link: &Path, target: &Path) -> PathBuf {
    if target.is_absolute() {
        return target.to_path_buf();
    }
    let joined = link.parent().unwrap_or(Path::new("")).join(target);
    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) => {}
                _ => out.push(".."),
            },
            other => out.push(other),
        }
    }
    out
}

fn injected(point: FailPoint, path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::PermissionDenied,
        format!("injected {:?} failure: {}", point, path.display()),
    )
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("no such file or directory: {}", path.display()),
    )
}

/// Mock filesystem for testing.
/// Cloning creates a new handle to the same underlying data.
#[derive(Debug, Clone, Default)]
pub struct MockFilesystem {
    state: Arc<RwLock<MockState>>,
}

impl MockFilesystem {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, MockState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, MockState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make `point` fail for `path` until cleared.
    pub fn inject_failure(&self, point: FailPoint, path: impl Into<PathBuf>) {
        self.write().failures.insert((point, path.into()));
    }

    /// Stop failing `point` for `path`.
    pub fn clear_failure(&self, point: FailPoint, path: impl AsRef<Path>) {
        self.write()
            .failures
            .remove(&(point, path.as_ref().to_path_buf()));
    }

    /// Get all files in the mock filesystem.
    pub fn files(&self) -> HashMap<PathBuf, Vec<u8>> {
        self.read().files.clone()
    }

    /// Get content of a specific file (symlinks are not followed).
    pub fn get_file(&self, path: &Path) -> Option<Vec<u8>> {
        self.read().files.get(path).cloned()
    }

    /// Get content of a file, following symlinks like `open(2)` would.
    pub fn read_through(&self, path: &Path) -> Option<Vec<u8>> {
        let state = self.read();
        let mut current = path.to_path_buf();
        for _ in 0..MAX_SYMLINK_HOPS {
            match state.symlinks.get(&current) {
                Some(target) => current = follow(&current, target),
                None => return state.files.get(&current).cloned(),
            }
        }
        None
    }

    /// Target of the symlink at `link`, if there is one.
    pub fn symlink_target(&self, link: &Path) -> Option<PathBuf> {
        self.read().symlinks.get(link).cloned()
    }

    /// Whether `path` was created as a directory.
    pub fn has_dir(&self, path: &Path) -> bool {
        self.read().dirs.contains(path)
    }

    /// Add a file directly (for test setup).
    pub fn add_file(&self, path: PathBuf, data: Vec<u8>) {
        self.write().files.insert(path, data);
    }

    /// Add a directory directly (for test setup).
    pub fn add_dir(&self, path: PathBuf) {
        self.write().dirs.insert(path);
    }

    /// Paths of every handle opened so far, in open order.
    pub fn opened_paths(&self) -> Vec<PathBuf> {
        self.read().handles.iter().map(|h| h.path.clone()).collect()
    }

    /// Number of handles opened so far.
    pub fn open_count(&self) -> usize {
        self.read().handles.len()
    }

    /// Number of handles that have been closed.
    pub fn closed_count(&self) -> usize {
        self.read().handles.iter().filter(|h| h.closed).count()
    }

    /// Paths of handles that are still open.
    pub fn live_handles(&self) -> Vec<PathBuf> {
        self.read()
            .handles
            .iter()
            .filter(|h| !h.closed)
            .map(|h| h.path.clone())
            .collect()
    }
}

impl Filesystem for MockFilesystem {
    fn create_dir_all(&self, path: &Path) -> Result<(), FsError> {
        let mut state = self.write();
        if state.fails(FailPoint::CreateDir, path) {
            return Err(injected(FailPoint::CreateDir, path).into());
        }
        let ancestors: Vec<&Path> = path
            .ancestors()
            .filter(|a| !a.as_os_str().is_empty())
            .collect();
        if let Some(file) = ancestors.iter().find(|a| state.files.contains_key(**a)) {
            return Err(FsError::Path(format!("not a directory: {}", file.display())));
        }
        for ancestor in ancestors {
            state.dirs.insert(ancestor.to_path_buf());
        }
        Ok(())
    }

    fn open_append(&self, path: &Path) -> Result<Box<dyn OutputHandle>, FsError> {
        let mut state = self.write();
        if state.fails(FailPoint::Open, path) {
            return Err(injected(FailPoint::Open, path).into());
        }
        if state.dirs.contains(path) {
            return Err(FsError::Path(format!("is a directory: {}", path.display())));
        }
        if !state.parent_exists(path) {
            return Err(not_found(path).into());
        }
        state.files.entry(path.to_path_buf()).or_default();
        state.handles.push(HandleRecord {
            path: path.to_path_buf(),
            closed: false,
        });
        let id = state.handles.len() - 1;
        Ok(Box::new(MockHandle {
            id,
            path: path.to_path_buf(),
            state: Arc::clone(&self.state),
        }))
    }

    fn entry_exists(&self, path: &Path) -> Result<bool, FsError> {
        let state = self.read();
        if state.fails(FailPoint::Probe, path) {
            return Err(injected(FailPoint::Probe, path).into());
        }
        Ok(state.has_entry(path))
    }

    fn remove(&self, path: &Path) -> Result<(), FsError> {
        let mut state = self.write();
        if state.fails(FailPoint::Remove, path) {
            return Err(injected(FailPoint::Remove, path).into());
        }
        if state.symlinks.remove(path).is_some() || state.files.remove(path).is_some() {
            Ok(())
        } else {
            Err(not_found(path).into())
        }
    }

    fn symlink(&self, target: &Path, link: &Path) -> Result<(), FsError> {
        let mut state = self.write();
        if state.fails(FailPoint::Symlink, link) {
            return Err(injected(FailPoint::Symlink, link).into());
        }
        if !state.parent_exists(link) {
            return Err(not_found(link).into());
        }
        if state.has_entry(link) {
            return Err(FsError::Io(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("file exists: {}", link.display()),
            )));
        }
        state.symlinks.insert(link.to_path_buf(), target.to_path_buf());
        Ok(())
    }
}

/// Handle returned by [`MockFilesystem::open_append`].
#[derive(Debug)]
pub struct MockHandle {
    id: usize,
    path: PathBuf,
    state: Arc<RwLock<MockState>>,
}

impl OutputHandle for MockHandle {
    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.fails(FailPoint::Write, &self.path) {
            return Err(injected(FailPoint::Write, &self.path));
        }
        if state.handles[self.id].closed {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                format!("write to closed handle: {}", self.path.display()),
            ));
        }
        state
            .files
            .entry(self.path.clone())
            .or_default()
            .extend_from_slice(data);
        Ok(())
    }

    fn close(self: Box<Self>) -> io::Result<()> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.handles[self.id].closed = true;
        if state.fails(FailPoint::Close, &self.path) {
            return Err(injected(FailPoint::Close, &self.path));
        }
        Ok(())
    }
}
