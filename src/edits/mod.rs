pub mod commit;
pub mod model;

pub use commit::{commit_all, CommitError, CommitFailure, CommitReport, FileOps, SystemFileOps};
pub use model::{apply_edit, resolve_target, toggle_delete, EditMode, EditOutcome};
