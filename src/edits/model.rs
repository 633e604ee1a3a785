//! Per-item deferred edits.
//!
//! User input never touches the filesystem directly. It moves an item's
//! `EditState` between `Unmodified`, `RenamePending` and `DeletePending`;
//! only the commit pipeline turns those into renames and trash moves.

use std::path::{Path, PathBuf};

use crate::models::{EditState, Item, PendingRename};

/// Shortest text (in characters) accepted for a name or directory field.
pub const MIN_INPUT_CHARS: usize = 3;

/// Name text that stages a delete instead of a rename.
pub const DELETE_KEYWORD: &str = "del";

/// Which of the user's text fields feed the rename target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditMode {
    /// Keep the directory, replace the file name.
    FilenameOnly,
    /// Keep the file name, move under `root / directory`.
    DirectoryOnly,
    /// Replace both.
    FilenameAndDirectory,
}

impl EditMode {
    pub fn uses_name(self) -> bool {
        matches!(self, Self::FilenameOnly | Self::FilenameAndDirectory)
    }

    pub fn uses_directory(self) -> bool {
        matches!(self, Self::DirectoryOnly | Self::FilenameAndDirectory)
    }
}

/// What an edit request did to the item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    /// Input was too short, or the item does not accept the edit.
    Ignored,
    RenameStaged,
    /// A rename back to the current path dropped the staged rename.
    RenameCleared,
    DeleteStaged,
    DeleteCleared,
}

impl EditOutcome {
    /// True if the item's state was changed or confirmed by the request.
    pub fn applied(self) -> bool {
        !matches!(self, Self::Ignored)
    }
}

fn accepted(text: &str) -> Option<&str> {
    (text.chars().count() >= MIN_INPUT_CHARS).then_some(text)
}

/// Resolve the rename target for `current` from the user's text fields.
///
/// Returns `None` when none of the fields the mode reads is long enough.
/// The current extension is always kept.
pub fn resolve_target(
    root: &Path,
    current: &Path,
    mode: EditMode,
    name: &str,
    directory: &str,
) -> Option<PendingRename> {
    let name = mode.uses_name().then(|| accepted(name)).flatten();
    let directory = mode.uses_directory().then(|| accepted(directory)).flatten();
    if name.is_none() && directory.is_none() {
        return None;
    }

    let file_name = match name {
        Some(name) => {
            let suffix = current
                .extension()
                .map(|ext| format!(".{}", ext.to_string_lossy()))
                .unwrap_or_default();
            PathBuf::from(format!("{}{}", name, suffix))
        }
        None => PathBuf::from(current.file_name()?),
    };

    let parent = match directory {
        Some(directory) => root.join(directory),
        None => current.parent()?.to_path_buf(),
    };

    Some(PendingRename {
        target: parent.join(file_name),
        directory: directory.map(str::to_owned),
    })
}

/// Apply a name/directory edit to `item`.
///
/// Precedence: a deleted item ignores everything; the `del` keyword stages a
/// delete and discards any rename; a pending delete ignores renames.
pub fn apply_edit(
    item: &mut Item,
    root: &Path,
    mode: EditMode,
    name: &str,
    directory: &str,
) -> EditOutcome {
    if item.edit.is_deleted() {
        return EditOutcome::Ignored;
    }

    if mode.uses_name() && name == DELETE_KEYWORD {
        item.edit = EditState::DeletePending;
        return EditOutcome::DeleteStaged;
    }

    if item.edit == EditState::DeletePending {
        return EditOutcome::Ignored;
    }

    let Some(rename) = resolve_target(root, &item.path, mode, name, directory) else {
        return EditOutcome::Ignored;
    };

    if rename.target == item.path {
        return if item.edit.is_pending() {
            item.edit = EditState::Unmodified;
            EditOutcome::RenameCleared
        } else {
            EditOutcome::Ignored
        };
    }

    item.edit = EditState::RenamePending(rename);
    EditOutcome::RenameStaged
}

/// Flip the pending-delete mark. A staged rename is discarded in favour of
/// the delete; deleted items are left alone.
pub fn toggle_delete(item: &mut Item) -> EditOutcome {
    match item.edit {
        EditState::Deleted => EditOutcome::Ignored,
        EditState::DeletePending => {
            item.edit = EditState::Unmodified;
            EditOutcome::DeleteCleared
        }
        EditState::Unmodified | EditState::RenamePending(_) => {
            item.edit = EditState::DeletePending;
            EditOutcome::DeleteStaged
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROOT: &str = "/photos";

    fn item(path: &str) -> Item {
        Item::new(PathBuf::from(path))
    }

    fn target_of(item: &Item) -> Option<PathBuf> {
        item.edit.rename_target().map(Path::to_path_buf)
    }

    #[test]
    fn test_filename_only_keeps_directory_and_suffix() {
        let mut it = item("/photos/2020/IMG_0001.JPG");
        let outcome = apply_edit(&mut it, Path::new(ROOT), EditMode::FilenameOnly, "beach", "");
        assert_eq!(outcome, EditOutcome::RenameStaged);
        assert_eq!(target_of(&it), Some(PathBuf::from("/photos/2020/beach.JPG")));
    }

    #[test]
    fn test_directory_only_relocates_under_root() {
        let mut it = item("/photos/inbox/IMG_0001.jpg");
        apply_edit(&mut it, Path::new(ROOT), EditMode::DirectoryOnly, "", "trips/alps");
        assert_eq!(
            target_of(&it),
            Some(PathBuf::from("/photos/trips/alps/IMG_0001.jpg"))
        );
        match &it.edit {
            EditState::RenamePending(rename) => {
                assert_eq!(rename.directory.as_deref(), Some("trips/alps"))
            }
            other => panic!("unexpected state {:?}", other),
        }
    }

    #[test]
    fn test_filename_and_directory_combined() {
        let mut it = item("/photos/inbox/IMG_0001.png");
        apply_edit(
            &mut it,
            Path::new(ROOT),
            EditMode::FilenameAndDirectory,
            "summit",
            "alps",
        );
        assert_eq!(target_of(&it), Some(PathBuf::from("/photos/alps/summit.png")));
    }

    #[test]
    fn test_combined_mode_uses_the_valid_field_only() {
        let mut it = item("/photos/inbox/IMG_0001.png");
        apply_edit(&mut it, Path::new(ROOT), EditMode::FilenameAndDirectory, "summit", "ab");
        assert_eq!(target_of(&it), Some(PathBuf::from("/photos/inbox/summit.png")));

        let mut it = item("/photos/inbox/IMG_0001.png");
        let outcome =
            apply_edit(&mut it, Path::new(ROOT), EditMode::FilenameAndDirectory, "ab", "cd");
        assert_eq!(outcome, EditOutcome::Ignored);
        assert_eq!(it.edit, EditState::Unmodified);
    }

    #[test]
    fn test_short_input_is_ignored() {
        let mut it = item("/photos/a.jpg");
        let outcome = apply_edit(&mut it, Path::new(ROOT), EditMode::FilenameOnly, "ab", "");
        assert_eq!(outcome, EditOutcome::Ignored);
        assert_eq!(it.edit, EditState::Unmodified);

        let outcome = apply_edit(&mut it, Path::new(ROOT), EditMode::FilenameOnly, "abc", "");
        assert_eq!(outcome, EditOutcome::RenameStaged);
        assert!(it.edit.is_pending());
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        // Two characters, four bytes.
        let mut it = item("/photos/a.jpg");
        let outcome = apply_edit(&mut it, Path::new(ROOT), EditMode::FilenameOnly, "éé", "");
        assert_eq!(outcome, EditOutcome::Ignored);
    }

    #[test]
    fn test_mode_ignores_unused_field() {
        let mut it = item("/photos/a.jpg");
        let outcome =
            apply_edit(&mut it, Path::new(ROOT), EditMode::DirectoryOnly, "longname", "x");
        assert_eq!(outcome, EditOutcome::Ignored);
    }

    #[test]
    fn test_del_keyword_supersedes_rename() {
        let mut it = item("/photos/a.jpg");
        apply_edit(&mut it, Path::new(ROOT), EditMode::FilenameOnly, "renamed", "");
        assert!(target_of(&it).is_some());

        let outcome = apply_edit(&mut it, Path::new(ROOT), EditMode::FilenameOnly, "del", "");
        assert_eq!(outcome, EditOutcome::DeleteStaged);
        assert_eq!(it.edit, EditState::DeletePending);
    }

    #[test]
    fn test_pending_delete_blocks_rename() {
        let mut it = item("/photos/a.jpg");
        toggle_delete(&mut it);
        let outcome = apply_edit(&mut it, Path::new(ROOT), EditMode::FilenameOnly, "renamed", "");
        assert_eq!(outcome, EditOutcome::Ignored);
        assert_eq!(it.edit, EditState::DeletePending);
    }

    #[test]
    fn test_toggle_delete_twice_restores() {
        let mut it = item("/photos/a.jpg");
        assert_eq!(toggle_delete(&mut it), EditOutcome::DeleteStaged);
        assert_eq!(toggle_delete(&mut it), EditOutcome::DeleteCleared);
        assert_eq!(it.edit, EditState::Unmodified);
    }

    #[test]
    fn test_toggle_delete_discards_rename() {
        let mut it = item("/photos/a.jpg");
        apply_edit(&mut it, Path::new(ROOT), EditMode::FilenameOnly, "renamed", "");
        toggle_delete(&mut it);
        assert_eq!(it.edit, EditState::DeletePending);
        toggle_delete(&mut it);
        assert_eq!(it.edit, EditState::Unmodified);
    }

    #[test]
    fn test_deleted_is_terminal() {
        let mut it = item("/photos/a.jpg");
        it.edit = EditState::Deleted;
        assert_eq!(toggle_delete(&mut it), EditOutcome::Ignored);
        assert_eq!(
            apply_edit(&mut it, Path::new(ROOT), EditMode::FilenameOnly, "del", ""),
            EditOutcome::Ignored
        );
        assert_eq!(
            apply_edit(&mut it, Path::new(ROOT), EditMode::FilenameOnly, "other", ""),
            EditOutcome::Ignored
        );
        assert_eq!(it.edit, EditState::Deleted);
    }

    #[test]
    fn test_later_rename_replaces_target() {
        let mut it = item("/photos/a.jpg");
        apply_edit(&mut it, Path::new(ROOT), EditMode::FilenameOnly, "first", "");
        apply_edit(&mut it, Path::new(ROOT), EditMode::FilenameOnly, "second", "");
        assert_eq!(target_of(&it), Some(PathBuf::from("/photos/second.jpg")));
    }

    #[test]
    fn test_rename_to_current_name_clears_pending() {
        let mut it = item("/photos/keep.jpg");
        apply_edit(&mut it, Path::new(ROOT), EditMode::FilenameOnly, "other", "");
        let outcome = apply_edit(&mut it, Path::new(ROOT), EditMode::FilenameOnly, "keep", "");
        assert_eq!(outcome, EditOutcome::RenameCleared);
        assert_eq!(it.edit, EditState::Unmodified);

        let outcome = apply_edit(&mut it, Path::new(ROOT), EditMode::FilenameOnly, "keep", "");
        assert_eq!(outcome, EditOutcome::Ignored);
    }

    #[test]
    fn test_file_without_extension() {
        let target = resolve_target(
            Path::new(ROOT),
            Path::new("/photos/raw"),
            EditMode::FilenameOnly,
            "cooked",
            "",
        )
        .unwrap();
        assert_eq!(target.target, PathBuf::from("/photos/cooked"));
        assert_eq!(target.directory, None);
    }
}
