//! Real-path containment checks.
//!
//! These work against the filesystem rather than the path text, so a
//! symlink planted anywhere under the root is seen for what it points at.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Resolve `candidate` and `root` to symlink-free paths and require that the
/// first lives under the second. Returns the resolved candidate.
pub fn ensure_within(root: &Path, candidate: &Path) -> Result<PathBuf> {
    let real_root = resolve(root)?;
    let real = resolve(candidate)?;

    if !real.starts_with(&real_root) {
        return Err(Error::Escapes {
            path: real,
            root: real_root,
        });
    }
    Ok(real)
}

/// Create `root/segments[0]/segments[1]/...` one level at a time.
///
/// An existing component that is anything other than a real directory
/// (a symlink or a file) stops the walk with [`Error::Escapes`].
pub fn create_dir_chain<S: AsRef<str>>(root: &Path, segments: &[S]) -> Result<PathBuf> {
    let mut current = root.to_path_buf();

    for segment in segments {
        current.push(segment.as_ref());
        match std::fs::symlink_metadata(&current) {
            Ok(meta) if meta.file_type().is_dir() => {}
            Ok(_) => {
                return Err(Error::Escapes {
                    path: current,
                    root: root.to_path_buf(),
                });
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                std::fs::create_dir(&current).map_err(|e| Error::CreateDir {
                    path: current.clone(),
                    source: e,
                })?;
            }
            Err(e) => {
                return Err(Error::Resolve {
                    path: current,
                    source: e,
                });
            }
        }
    }

    Ok(current)
}

fn resolve(path: &Path) -> Result<PathBuf> {
    std::fs::canonicalize(path).map_err(|e| Error::Resolve {
        path: path.to_path_buf(),
        source: e,
    })
}
