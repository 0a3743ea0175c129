//! Upload intake: prove the bytes are a zip, then move them somewhere
//! nobody else chose the name of.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use extgate_fs::{ensure_within, random_hex};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::IntakeError;
use crate::sniff::{SNIFF_LEN, ZIP_MIME, has_zip_signature, sniff_mime};

/// What the web layer knows about an upload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Upload {
    /// Client-supplied file name. Only its extension is looked at.
    pub original_name: String,
    /// Where the server put the bytes.
    pub temp_path: PathBuf,
    /// Declared length.
    pub size: u64,
}

impl Upload {
    pub fn new(original_name: impl Into<String>, temp_path: impl Into<PathBuf>, size: u64) -> Self {
        Self {
            original_name: original_name.into(),
            temp_path: temp_path.into(),
            size,
        }
    }
}

/// An upload relocated into the sandbox.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sandboxed {
    pub path: PathBuf,
    pub size: u64,
    /// Hex SHA-256 of the relocated bytes.
    pub sha256: String,
}

/// Gatekeeper between the upload handler and anything zip-aware.
#[derive(Clone, Debug)]
pub struct IntakeGuard {
    temp_dir: PathBuf,
    max_upload_bytes: u64,
}

impl IntakeGuard {
    pub fn new(temp_dir: impl Into<PathBuf>, max_upload_bytes: u64) -> Self {
        Self {
            temp_dir: temp_dir.into(),
            max_upload_bytes,
        }
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    /// Check `upload` and move it into the sandbox.
    ///
    /// On success `upload` is rewritten to describe the sandboxed copy, so the
    /// original temp path is never reopened.
    pub fn accept(&self, upload: &mut Upload) -> Result<Sandboxed, IntakeError> {
        self.check(upload).inspect_err(|e| {
            warn!(
                check = check_name(e),
                code = e.code(),
                name = %upload.original_name,
                "upload rejected"
            );
        })?;

        let dest = self.sandbox_path()?;
        relocate(&upload.temp_path, &dest)?;

        let size = std::fs::metadata(&dest)
            .map_err(|e| IntakeError::Move {
                to: dest.clone(),
                source: e,
            })?
            .len();
        let sha256 = sha256_file(&dest).map_err(|e| IntakeError::Move {
            to: dest.clone(),
            source: e,
        })?;

        upload.temp_path = dest.clone();
        upload.size = size;

        info!(path = %dest.display(), size, sha256 = %sha256, "upload accepted");
        Ok(Sandboxed {
            path: dest,
            size,
            sha256,
        })
    }

    /// The read-only checks, in order.
    fn check(&self, upload: &Upload) -> Result<(), IntakeError> {
        let empty = || IntakeError::Empty {
            path: upload.temp_path.clone(),
        };
        let actual = std::fs::metadata(&upload.temp_path)
            .map_err(|_| empty())?
            .len();
        if actual == 0 || upload.size == 0 {
            return Err(empty());
        }

        let size = actual.max(upload.size);
        if size > self.max_upload_bytes {
            return Err(IntakeError::TooLarge {
                size,
                limit: self.max_upload_bytes,
            });
        }

        // A bare ".zip" is a stem with no extension and is refused.
        let is_zip_name = Path::new(&upload.original_name)
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"));
        if !is_zip_name {
            return Err(IntakeError::InvalidExtension {
                name: upload.original_name.clone(),
            });
        }

        let header = read_header(&upload.temp_path).map_err(|_| empty())?;
        let mime = sniff_mime(&header);
        if mime != ZIP_MIME {
            return Err(IntakeError::InvalidMime { mime });
        }
        if !has_zip_signature(&header) {
            return Err(IntakeError::InvalidSignature);
        }

        debug!(name = %upload.original_name, size, "upload passed content checks");
        Ok(())
    }

    /// A fresh `upload-<32 hex>.zip` path, proven to sit inside the sandbox.
    fn sandbox_path(&self) -> Result<PathBuf, IntakeError> {
        std::fs::create_dir_all(&self.temp_dir).map_err(|e| IntakeError::Move {
            to: self.temp_dir.clone(),
            source: e,
        })?;

        let candidate = self.temp_dir.join(format!("upload-{}.zip", random_hex(16)));
        let escape = || {
            warn!(security = true, code = "temp_path_escape", path = %candidate.display(), "sandbox path escapes upload directory");
            IntakeError::TempPathEscape {
                path: candidate.clone(),
            }
        };

        let parent = candidate.parent().ok_or_else(escape)?;
        let real_parent = ensure_within(&self.temp_dir, parent).map_err(|_| escape())?;
        let file_name = candidate.file_name().ok_or_else(escape)?;
        let dest = real_parent.join(file_name);
        if std::fs::symlink_metadata(&dest).is_ok() {
            return Err(escape());
        }
        Ok(dest)
    }
}

/// Rename, or copy and delete when the rename crosses filesystems.
fn relocate(from: &Path, to: &Path) -> Result<(), IntakeError> {
    let move_err = |e| IntakeError::Move {
        to: to.to_path_buf(),
        source: e,
    };

    if std::fs::rename(from, to).is_ok() {
        return Ok(());
    }

    if let Err(e) = std::fs::copy(from, to) {
        let _ = std::fs::remove_file(to);
        return Err(move_err(e));
    }
    if let Err(e) = std::fs::remove_file(from) {
        warn!(path = %from.display(), error = %e, "could not remove original upload after copy");
    }
    Ok(())
}

fn read_header(path: &Path) -> io::Result<Vec<u8>> {
    let mut header = Vec::new();
    File::open(path)?.take(SNIFF_LEN).read_to_end(&mut header)?;
    Ok(header)
}

fn sha256_file(path: &Path) -> io::Result<String> {
    let mut reader = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

fn check_name(e: &IntakeError) -> &'static str {
    match e {
        IntakeError::Empty { .. } => "presence",
        IntakeError::TooLarge { .. } => "size",
        IntakeError::InvalidExtension { .. } => "extension",
        IntakeError::InvalidMime { .. } => "mime",
        IntakeError::InvalidSignature => "signature",
        IntakeError::TempPathEscape { .. } => "sandbox",
        IntakeError::Move { .. } => "relocate",
    }
}
