//! Best-effort recursive removal.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// What a [`remove_tree`] pass managed to delete.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub files_removed: usize,
    pub dirs_removed: usize,
    pub failed: Vec<PathBuf>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Remove `root` and everything below it, children before parents.
///
/// Symlinks are unlinked, never followed. A failure on one path is recorded
/// and the walk continues with the rest. A missing `root` is a clean no-op.
pub fn remove_tree(root: impl AsRef<Path>) -> CleanupReport {
    let root = root.as_ref();
    let mut report = CleanupReport::default();

    if std::fs::symlink_metadata(root).is_err() {
        return report;
    }

    for entry in WalkDir::new(root).follow_links(false).contents_first(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                if let Some(path) = e.path() {
                    report.failed.push(path.to_path_buf());
                }
                continue;
            }
        };

        let path = entry.path();
        let removed = if entry.file_type().is_dir() {
            std::fs::remove_dir(path).map(|()| report.dirs_removed += 1)
        } else {
            std::fs::remove_file(path).map(|()| report.files_removed += 1)
        };

        if removed.is_err() {
            report.failed.push(path.to_path_buf());
        }
    }

    report
}
