use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to create directory '{path}': {source}")]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("failed to resolve '{path}': {source}")]
    Resolve { path: PathBuf, source: io::Error },

    #[error("'{path}' resolves outside of '{root}'")]
    Escapes { path: PathBuf, root: PathBuf },

    #[error("destination already exists: {path}")]
    AlreadyExists { path: PathBuf },

    #[error("failed to move '{from}' to '{to}': {source}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },

    #[error("failed to set permissions on '{path}': {source}")]
    Permissions { path: PathBuf, source: io::Error },
}

pub type Result<T> = std::result::Result<T, Error>;
