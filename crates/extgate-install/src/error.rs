use std::io;
use std::path::PathBuf;

use extgate_archive::ErrorKind;

/// Why the intake guard refused or failed an upload.
#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error("upload is empty or its temporary file is missing: {path}")]
    Empty { path: PathBuf },

    #[error("upload is {size} bytes, limit is {limit}")]
    TooLarge { size: u64, limit: u64 },

    #[error("'{name}' does not have a .zip extension")]
    InvalidExtension { name: String },

    #[error("content looks like {mime}, not a zip archive")]
    InvalidMime { mime: &'static str },

    #[error("content does not start with a zip local file header")]
    InvalidSignature,

    #[error("sandbox path '{path}' is not inside the upload directory")]
    TempPathEscape { path: PathBuf },

    #[error("failed to move upload into '{to}': {source}")]
    Move { to: PathBuf, source: io::Error },
}

impl IntakeError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Empty { .. } => "upload_empty",
            Self::TooLarge { .. } => "upload_too_large",
            Self::InvalidExtension { .. } => "invalid_extension",
            Self::InvalidMime { .. } => "invalid_mime",
            Self::InvalidSignature => "invalid_signature",
            Self::TempPathEscape { .. } => "temp_path_escape",
            Self::Move { .. } => "upload_move_failed",
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TempPathEscape { .. } => ErrorKind::StructuralViolation,
            Self::Move { .. } => ErrorKind::Environmental,
            _ => ErrorKind::InputRejection,
        }
    }
}

/// Invalid installer configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to parse config '{path}': {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("{first} and {second} must be separate directories ('{path}')")]
    OverlappingDirs {
        first: &'static str,
        second: &'static str,
        path: PathBuf,
    },

    #[error("limit '{name}' must be greater than zero")]
    ZeroLimit { name: &'static str },
}

/// Any failure of the end-to-end pipeline.
#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    #[error(transparent)]
    Intake(#[from] IntakeError),

    #[error(transparent)]
    Archive(#[from] extgate_archive::Error),
}

impl InstallError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Intake(e) => e.code(),
            Self::Archive(e) => e.code(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Intake(e) => e.kind(),
            Self::Archive(e) => e.kind(),
        }
    }
}

pub type Result<T> = std::result::Result<T, InstallError>;
