use std::path::{Path, PathBuf};

use tracing::{debug, error};

use crate::cleanup::{CleanupReport, remove_tree};
use crate::random::random_hex;
use crate::{Error, Result, promote_dir};

/// A directory created for exactly one operation.
///
/// The name is `<prefix>-<random hex>` inside a caller-chosen root. Unless it
/// is promoted, the directory and everything in it is removed when the value
/// is dropped.
#[derive(Debug)]
pub struct OwnedDir {
    path: PathBuf,
    released: bool,
}

impl OwnedDir {
    /// Create a fresh directory under `root` (created if missing).
    ///
    /// `suffix_bytes` random bytes are hex-encoded into the name.
    pub fn create_in(root: impl AsRef<Path>, prefix: &str, suffix_bytes: usize) -> Result<Self> {
        let root = root.as_ref();
        std::fs::create_dir_all(root).map_err(|e| Error::CreateDir {
            path: root.to_path_buf(),
            source: e,
        })?;

        let path = root.join(format!("{prefix}-{}", random_hex(suffix_bytes)));
        std::fs::create_dir(&path).map_err(|e| Error::CreateDir {
            path: path.clone(),
            source: e,
        })?;

        debug!(path = %path.display(), "created owned directory");
        Ok(Self {
            path,
            released: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rename into `dest`. On failure the directory is still owned and is
    /// cleaned up when `self` drops.
    pub fn promote(mut self, dest: impl AsRef<Path>) -> Result<PathBuf> {
        let dest = dest.as_ref();
        promote_dir(&self.path, dest)?;
        self.released = true;
        Ok(dest.to_path_buf())
    }

    /// Remove the directory now and report what happened.
    pub fn discard(mut self) -> CleanupReport {
        self.released = true;
        cleanup_logged(&self.path)
    }
}

impl Drop for OwnedDir {
    fn drop(&mut self) {
        if !self.released {
            cleanup_logged(&self.path);
        }
    }
}

/// [`remove_tree`] with failures logged at error level.
pub fn cleanup_logged(path: &Path) -> CleanupReport {
    let report = remove_tree(path);
    if report.is_clean() {
        debug!(path = %path.display(), files = report.files_removed, "removed directory");
    } else {
        error!(
            path = %path.display(),
            leftover = report.failed.len(),
            first = %report.failed[0].display(),
            "cleanup left files behind"
        );
    }
    report
}
