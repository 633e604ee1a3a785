use std::path::{Path, PathBuf};

/// File extensions the crawler accepts. Matching is exact: `.Png` or `.jpG`
/// are not images as far as the organizer is concerned.
pub const ACCEPTED_EXTENSIONS: [&str; 6] = ["png", "PNG", "jpg", "JPG", "jpeg", "JPEG"];

/// Returns true if `path` ends in one of the accepted extension literals.
pub fn has_accepted_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| ACCEPTED_EXTENSIONS.contains(&ext))
        .unwrap_or(false)
}

/// Decoded pixel dimensions of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// A rename staged for the next commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRename {
    /// Where the file will live after commit.
    pub target: PathBuf,
    /// Directory text that produced the target, if the edit relocated the file.
    pub directory: Option<String>,
}

/// Deferred edit state of an item.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EditState {
    #[default]
    Unmodified,
    RenamePending(PendingRename),
    DeletePending,
    /// Terminal: the file has been moved to the trash.
    Deleted,
}

impl EditState {
    pub fn is_deleted(&self) -> bool {
        matches!(self, Self::Deleted)
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::RenamePending(_) | Self::DeletePending)
    }

    /// Staged rename target, if any.
    pub fn rename_target(&self) -> Option<&Path> {
        match self {
            Self::RenamePending(rename) => Some(&rename.target),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Item {
    pub path: PathBuf,
    pub known_size: Option<ImageSize>,
    pub edit: EditState,
}

impl Item {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            known_size: None,
            edit: EditState::Unmodified,
        }
    }
}
