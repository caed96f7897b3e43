//! Stable symlink to the active file.
//!
//! Failures here are never returned to the writer's caller. They are turned
//! into a [`SymlinkWarning`] and reported through diagnostics, and the write
//! that triggered the refresh goes ahead.

use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use crono_fs::{Filesystem, FsError};

use crate::diagnostics::Diagnostics;
use crate::pattern::{Location, Pattern};

/// A symlink refresh that did not happen.
#[derive(Debug, thiserror::Error)]
pub enum SymlinkWarning {
    #[error("symlink {} resolves to the active file itself, not linking", .link.display())]
    SamePath { link: PathBuf },

    #[error("failed to probe symlink {}: {source}", .link.display())]
    Probe {
        link: PathBuf,
        #[source]
        source: FsError,
    },

    #[error("failed to remove old symlink {}: {source}", .link.display())]
    Remove {
        link: PathBuf,
        #[source]
        source: FsError,
    },

    #[error("failed to link {} -> {}: {source}", .link.display(), .target.display())]
    Create {
        link: PathBuf,
        target: PathBuf,
        #[source]
        source: FsError,
    },
}

#[derive(Debug, Clone)]
pub(crate) struct SymlinkMaintainer {
    pattern: Option<Pattern>,
}

impl SymlinkMaintainer {
    pub(crate) fn new(pattern: Option<Pattern>) -> Self {
        Self { pattern }
    }

    pub(crate) fn pattern(&self) -> Option<&Pattern> {
        self.pattern.as_ref()
    }

    /// Point the configured symlink, resolved for `at`, at `active`.
    pub(crate) fn refresh(
        &self,
        fs: &dyn Filesystem,
        active: &Path,
        at: DateTime<Utc>,
        location: Location,
        diagnostics: &dyn Diagnostics,
    ) {
        let Some(pattern) = &self.pattern else {
            return;
        };
        let link = pattern.resolve(at, location);
        match relink(fs, active, link) {
            Ok(link) => diagnostics.debug(&format!(
                "symlink {} -> {}",
                link.display(),
                active.display()
            )),
            Err(warning) => diagnostics.error(&warning.to_string()),
        }
    }
}

fn relink(fs: &dyn Filesystem, target: &Path, link: PathBuf) -> Result<PathBuf, SymlinkWarning> {
    if link == target {
        return Err(SymlinkWarning::SamePath { link });
    }

    match fs.entry_exists(&link) {
        Ok(true) => {
            if let Err(source) = fs.remove(&link) {
                return Err(SymlinkWarning::Remove { link, source });
            }
        }
        Ok(false) => {}
        Err(source) => return Err(SymlinkWarning::Probe { link, source }),
    }

    let stored = link_target(target, &link);
    match fs.symlink(&stored, &link) {
        Ok(()) => Ok(link),
        Err(source) => Err(SymlinkWarning::Create {
            link,
            target: stored,
            source,
        }),
    }
}

/// The target to store in `link` so that it resolves to `active`.
///
/// A relative symlink target is read from the link's own directory, while
/// `active` is relative to the working directory. Both are relative to the
/// same base, so the link's directory is walked back to their common prefix.
/// When that is not possible lexically the target is made absolute.
fn link_target(active: &Path, link: &Path) -> PathBuf {
    if active.is_absolute() {
        return active.to_path_buf();
    }

    let base = link.parent().unwrap_or(Path::new(""));
    let lexical = !base.is_absolute()
        && !base.components().any(|c| matches!(c, Component::ParentDir));
    if !lexical {
        return match std::env::current_dir() {
            Ok(cwd) => cwd.join(active),
            Err(_) => active.to_path_buf(),
        };
    }

    let base: Vec<Component> = base
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();
    let active: Vec<Component> = active
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();
    let common = base.iter().zip(&active).take_while(|(a, b)| a == b).count();

    let mut stored = PathBuf::new();
    for _ in common..base.len() {
        stored.push("..");
    }
    for component in &active[common..] {
        stored.push(component);
    }
    stored
}
