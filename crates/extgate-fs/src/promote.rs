use std::path::Path;

use crate::{Error, Result};

/// Move a fully populated directory to its final location with one rename.
///
/// Refuses to touch an existing `dest` (file, directory or dangling link).
/// The parent of `dest` is created when missing.
pub fn promote_dir(src: impl AsRef<Path>, dest: impl AsRef<Path>) -> Result<()> {
    let src = src.as_ref();
    let dest = dest.as_ref();

    if std::fs::symlink_metadata(dest).is_ok() {
        return Err(Error::AlreadyExists {
            path: dest.to_path_buf(),
        });
    }

    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent).map_err(|e| Error::CreateDir {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    std::fs::rename(src, dest).map_err(|e| Error::Rename {
        from: src.to_path_buf(),
        to: dest.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn moves_directory_and_creates_parent() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        let dest = dir.path().join("extensions").join("theme");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(src.join("file.txt"), "data").unwrap();

        promote_dir(&src, &dest).unwrap();

        assert!(dest.join("file.txt").exists());
        assert!(!src.exists());
    }

    #[test]
    fn existing_destination_is_left_alone() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        let dest = dir.path().join("dest");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::create_dir_all(&dest).unwrap();
        std::fs::write(dest.join("old.txt"), "old").unwrap();

        let result = promote_dir(&src, &dest);

        assert!(matches!(result, Err(Error::AlreadyExists { .. })));
        assert!(src.exists());
        assert_eq!(std::fs::read_to_string(dest.join("old.txt")).unwrap(), "old");
    }
}
