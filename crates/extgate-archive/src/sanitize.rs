use std::fmt;
use std::path::{Path, PathBuf};

/// Why an entry name was refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathViolation {
    Empty,
    Nul,
    Absolute,
    DriveLetter,
    ParentSegment,
    /// Lexically fine, but the real path lands outside the target root.
    OutsideRoot,
    /// Same name as an earlier file entry once case is ignored.
    Collision,
}

impl fmt::Display for PathViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Empty => "empty path",
            Self::Nul => "NUL byte",
            Self::Absolute => "absolute path",
            Self::DriveLetter => "drive letter",
            Self::ParentSegment => "'..' segment",
            Self::OutsideRoot => "resolves outside the target root",
            Self::Collision => "collides with another entry when case is ignored",
        })
    }
}

/// An entry name reduced to plain relative segments.
///
/// Never empty, never absolute, no `.`/`..` segments, no NUL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NormalizedPath {
    segments: Vec<String>,
}

impl NormalizedPath {
    /// Canonicalize a raw entry name.
    ///
    /// Backslashes become slashes, runs of slashes collapse, `.` segments
    /// drop out. `..` is refused outright rather than resolved.
    pub fn parse(raw: &str) -> Result<Self, PathViolation> {
        if raw.contains('\0') {
            return Err(PathViolation::Nul);
        }

        let unified = raw.replace('\\', "/");
        if unified.starts_with('/') {
            return Err(PathViolation::Absolute);
        }
        if has_drive_letter(&unified) {
            return Err(PathViolation::DriveLetter);
        }

        let mut segments = Vec::new();
        for segment in unified.split('/') {
            match segment {
                "" | "." => {}
                ".." => return Err(PathViolation::ParentSegment),
                other => segments.push(other.to_string()),
            }
        }

        if segments.is_empty() {
            return Err(PathViolation::Empty);
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    pub fn first(&self) -> &str {
        &self.segments[0]
    }

    /// Segments above the last one.
    pub fn parent_segments(&self) -> &[String] {
        &self.segments[..self.segments.len() - 1]
    }

    /// Drop a leading `prefix` segment.
    ///
    /// `None` when the path is not under `prefix`, `Some(None)` when the path
    /// is `prefix` itself.
    pub fn strip_first(&self, prefix: &str) -> Option<Option<Self>> {
        if self.first() != prefix {
            return None;
        }
        if self.depth() == 1 {
            return Some(None);
        }
        Some(Some(Self {
            segments: self.segments[1..].to_vec(),
        }))
    }

    pub fn join_onto(&self, base: &Path) -> PathBuf {
        let mut path = base.to_path_buf();
        path.extend(&self.segments);
        path
    }

    /// Forward-slash form, as stored in a zip.
    pub fn to_entry_name(&self) -> String {
        self.segments.join("/")
    }
}

impl fmt::Display for NormalizedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_entry_name())
    }
}

fn has_drive_letter(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}
