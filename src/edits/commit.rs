//! Applies staged edits to the filesystem.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::{EditState, ItemStore};

/// Filesystem operations the commit pass needs. Production code uses
/// [`SystemFileOps`]; tests substitute recording or failing implementations.
pub trait FileOps {
    fn create_dir_all(&self, dir: &Path) -> io::Result<()>;
    /// Move `from` to `to`. Must fail if `to` already exists.
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;
    /// Move `path` to the system trash.
    fn trash(&self, path: &Path) -> io::Result<()>;
}

/// `std::fs` renames and the desktop trash.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemFileOps;

impl FileOps for SystemFileOps {
    fn create_dir_all(&self, dir: &Path) -> io::Result<()> {
        std::fs::create_dir_all(dir)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        // std::fs::rename silently replaces an existing file on Unix.
        if to.symlink_metadata().is_ok() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} already exists", to.display()),
            ));
        }
        std::fs::rename(from, to)
    }

    fn trash(&self, path: &Path) -> io::Result<()> {
        trash::delete(path).map_err(|e| io::Error::other(e.to_string()))
    }
}

/// What a commit pass applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitReport {
    /// Store indices that were renamed or moved.
    pub renamed: Vec<usize>,
    /// Store indices that were trashed.
    pub deleted: Vec<usize>,
    /// Directory texts of committed directory-mode renames, in commit order.
    pub directories: Vec<String>,
}

impl CommitReport {
    pub fn is_empty(&self) -> bool {
        self.renamed.is_empty() && self.deleted.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum CommitFailure {
    #[error("failed to create directory {dir:?}")]
    CreateDir {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to rename to {target:?}")]
    Rename {
        target: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to move to trash")]
    Trash {
        #[source]
        source: io::Error,
    },
}

/// A commit pass stopped early. Items before `index` were applied (see
/// `completed`); the item at `index` and everything after it are untouched.
#[derive(Debug, Error)]
#[error("commit stopped at item {index} ({path:?})")]
pub struct CommitError {
    pub index: usize,
    pub path: PathBuf,
    #[source]
    pub failure: CommitFailure,
    pub completed: CommitReport,
}

/// Apply every staged edit in store order.
pub fn commit_all(store: &mut ItemStore, ops: &dyn FileOps) -> Result<CommitReport, CommitError> {
    let mut report = CommitReport::default();

    for (index, item) in store.iter_mut().enumerate() {
        match &item.edit {
            EditState::Unmodified | EditState::Deleted => {}
            EditState::DeletePending => {
                if let Err(source) = ops.trash(&item.path) {
                    return Err(abort(index, &item.path, CommitFailure::Trash { source }, report));
                }
                debug!(index, path = ?item.path, "Moved to trash");
                item.edit = EditState::Deleted;
                report.deleted.push(index);
            }
            EditState::RenamePending(rename) => {
                if let Some(dir) = rename.target.parent() {
                    if let Err(source) = ops.create_dir_all(dir) {
                        let failure = CommitFailure::CreateDir {
                            dir: dir.to_path_buf(),
                            source,
                        };
                        return Err(abort(index, &item.path, failure, report));
                    }
                }
                if let Err(source) = ops.rename(&item.path, &rename.target) {
                    let failure = CommitFailure::Rename {
                        target: rename.target.clone(),
                        source,
                    };
                    return Err(abort(index, &item.path, failure, report));
                }
                debug!(index, from = ?item.path, to = ?rename.target, "Renamed");
                if let Some(dir) = &rename.directory {
                    report.directories.push(dir.clone());
                }
                item.path = rename.target.clone();
                item.edit = EditState::Unmodified;
                report.renamed.push(index);
            }
        }
    }

    info!(
        renamed = report.renamed.len(),
        deleted = report.deleted.len(),
        "Commit complete"
    );
    Ok(report)
}

fn abort(index: usize, path: &Path, failure: CommitFailure, completed: CommitReport) -> CommitError {
    warn!(index, ?path, error = %failure, "Commit aborted");
    CommitError {
        index,
        path: path.to_path_buf(),
        failure,
        completed,
    }
}
