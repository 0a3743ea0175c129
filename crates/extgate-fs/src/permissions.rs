use std::path::Path;

use crate::{Error, Result};

/// Permission modes applied to installed extension content.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PermissionMode {
    /// Regular file, `0o644` (rw-r--r--).
    ReadWrite,

    /// Directory, `0o755` (rwxr-xr-x).
    Directory,
}

impl PermissionMode {
    pub fn unix_mode(self) -> u32 {
        match self {
            Self::ReadWrite => 0o644,
            Self::Directory => 0o755,
        }
    }

    /// Apply the mode to `path`. No-op on non-Unix targets.
    pub fn apply_to_path(self, path: &Path) -> Result<()> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            std::fs::set_permissions(path, std::fs::Permissions::from_mode(self.unix_mode()))
                .map_err(|e| Error::Permissions {
                    path: path.to_path_buf(),
                    source: e,
                })?;
        }
        #[cfg(not(unix))]
        let _ = path;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_bits() {
        assert_eq!(PermissionMode::ReadWrite.unix_mode(), 0o644);
        assert_eq!(PermissionMode::Directory.unix_mode(), 0o755);
    }

    #[cfg(unix)]
    #[test]
    fn apply_sets_file_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("style.css");
        std::fs::write(&path, "body{}").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600)).unwrap();

        PermissionMode::ReadWrite.apply_to_path(&path).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }

    #[test]
    fn apply_to_missing_path_fails_on_unix() {
        let dir = tempfile::tempdir().unwrap();
        let result = PermissionMode::Directory.apply_to_path(&dir.path().join("missing"));
        if cfg!(unix) {
            assert!(matches!(result, Err(Error::Permissions { .. })));
        } else {
            assert!(result.is_ok());
        }
    }
}
