use std::io;
use std::path::PathBuf;

use crate::sanitize::PathViolation;

/// How a failure should be treated by the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input from the uploader; safe to report back.
    InputRejection,
    /// The archive tried something hostile; audit it.
    StructuralViolation,
    /// Filesystem trouble on our side.
    Environmental,
}

/// Normalizer steps that can fail on the filesystem.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NormalizeStep {
    Workdir,
    ExtractDir,
    ExtractFile,
    ExtractParent,
    Repack,
    OpenOutput,
}

impl NormalizeStep {
    pub fn code(self) -> &'static str {
        match self {
            Self::Workdir => "workdir_create_failed",
            Self::ExtractDir => "extract_dir_failed",
            Self::ExtractFile => "extract_file_failed",
            Self::ExtractParent => "extract_parent_failed",
            Self::Repack => "write_failed",
            Self::OpenOutput => "norm_zip_open_failed",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("archive missing or shorter than a zip header: {path}")]
    NotFoundOrEmpty { path: PathBuf },

    #[error("failed to open archive '{path}': {source}")]
    Open {
        path: PathBuf,
        source: zip::result::ZipError,
    },

    #[error("unreadable entry #{index}: {source}")]
    Corrupted {
        index: usize,
        source: zip::result::ZipError,
    },

    #[error("extension.json not found or empty")]
    ManifestMissing,

    #[error("extension.json is not a JSON object")]
    ManifestInvalidJson,

    #[error("extension.json has no usable slug")]
    ManifestMissingSlug,

    #[error("slug '{slug}' has no filesystem-safe characters")]
    SlugNormalizedEmpty { slug: String },

    #[error("invalid slug '{slug}'")]
    InvalidSlug { slug: String },

    #[error("symlink entry rejected: '{entry}'")]
    SymlinkDetected { entry: String },

    #[error("archive has more than {limit} files")]
    TooManyFiles { limit: usize },

    #[error("archive expands beyond {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("unsafe entry path '{entry}' ({violation})")]
    PathTraversal {
        entry: String,
        violation: PathViolation,
    },

    #[error("no extension.json at the package root")]
    MissingManifest,

    #[error("manifest slug {found:?} does not match expected '{expected}'")]
    SlugMismatch {
        expected: String,
        found: Option<String>,
    },

    #[error("extension already installed at {path}")]
    AlreadyInstalled { path: PathBuf },

    #[error("failed to write '{path}': {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("staging failed: {0}")]
    Staging(#[source] extgate_fs::Error),

    #[error("normalization step '{}' failed on '{path}': {source}", .step.code())]
    Normalize {
        step: NormalizeStep,
        path: PathBuf,
        source: io::Error,
    },
}

impl Error {
    /// Stable identifier for callers and audit logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFoundOrEmpty { .. } => "zip_not_found_or_empty",
            Self::Open { .. } | Self::Corrupted { .. } => "zip_open_failed",
            Self::ManifestMissing => "manifest_missing_or_empty",
            Self::ManifestInvalidJson => "manifest_invalid_json",
            Self::ManifestMissingSlug => "manifest_missing_slug",
            Self::SlugNormalizedEmpty { .. } => "slug_normalized_empty",
            Self::InvalidSlug { .. } => "invalid_slug",
            Self::SymlinkDetected { .. } => "symlink_detected",
            Self::TooManyFiles { .. } => "too_many_files",
            Self::TooLarge { .. } => "too_large",
            Self::PathTraversal { .. } => "path_traversal",
            Self::MissingManifest => "missing_manifest",
            Self::SlugMismatch { .. } => "slug_mismatch",
            Self::AlreadyInstalled { .. } => "already_installed",
            Self::Write { .. } | Self::Staging(_) => "write_failed",
            Self::Normalize { step, .. } => step.code(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::SymlinkDetected { .. }
            | Self::TooManyFiles { .. }
            | Self::TooLarge { .. }
            | Self::PathTraversal { .. }
            | Self::MissingManifest
            | Self::SlugMismatch { .. } => ErrorKind::StructuralViolation,
            Self::Write { .. } | Self::Staging(_) | Self::Normalize { .. } => {
                ErrorKind::Environmental
            }
            _ => ErrorKind::InputRejection,
        }
    }

    pub(crate) fn normalize(step: NormalizeStep, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Normalize {
            step,
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(Error::MissingManifest.code(), "missing_manifest");
        assert_eq!(Error::TooManyFiles { limit: 500 }.code(), "too_many_files");
        assert_eq!(
            Error::Staging(extgate_fs::Error::AlreadyExists {
                path: PathBuf::from("x")
            })
            .code(),
            "write_failed"
        );
        assert_eq!(NormalizeStep::Repack.code(), "write_failed");
        assert_eq!(NormalizeStep::OpenOutput.code(), "norm_zip_open_failed");
    }

    #[test]
    fn kinds() {
        let traversal = Error::PathTraversal {
            entry: "../x".into(),
            violation: PathViolation::ParentSegment,
        };
        assert_eq!(traversal.kind(), ErrorKind::StructuralViolation);
        assert_eq!(
            Error::InvalidSlug { slug: "A".into() }.kind(),
            ErrorKind::InputRejection
        );
        assert_eq!(
            Error::normalize(NormalizeStep::Workdir, "/tmp", io::Error::other("x")).kind(),
            ErrorKind::Environmental
        );
    }
}
