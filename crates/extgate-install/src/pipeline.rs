//! Intake, normalization and extraction in one call.
//!
//! Every temporary file the pipeline creates (the sandboxed upload and a
//! rehomed archive) is removed before `install` returns, whatever the
//! outcome.

use std::path::{Path, PathBuf};

use extgate_archive::{ErrorKind, Manifest, extract_safe, normalize};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::InstallerConfig;
use crate::error::{ConfigError, InstallError, Result};
use crate::intake::{IntakeGuard, Upload};

/// What a successful install produced.
#[derive(Clone, Debug)]
pub struct InstallReport {
    pub slug: String,
    pub path: PathBuf,
    pub manifest: Manifest,
    pub file_count: usize,
    pub total_bytes: u64,
    /// Hex SHA-256 of the uploaded archive.
    pub sha256: String,
    /// Whether the archive had to be rehomed under its slug folder.
    pub normalized: bool,
}

/// Flat result for collaborators that only branch on a code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub success: bool,
    pub code: Option<&'static str>,
}

impl<T> From<&std::result::Result<T, InstallError>> for Outcome {
    fn from(result: &std::result::Result<T, InstallError>) -> Self {
        match result {
            Ok(_) => Self {
                success: true,
                code: None,
            },
            Err(e) => Self {
                success: false,
                code: Some(e.code()),
            },
        }
    }
}

#[derive(Clone, Debug)]
pub struct Installer {
    config: InstallerConfig,
    intake: IntakeGuard,
}

impl Installer {
    pub fn new(config: InstallerConfig) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        let intake = IntakeGuard::new(&config.temp_dir, config.max_upload_bytes);
        Ok(Self { config, intake })
    }

    pub fn config(&self) -> &InstallerConfig {
        &self.config
    }

    /// Install an uploaded package.
    ///
    /// With `expected_slug` set the manifest must declare exactly that slug;
    /// otherwise the manifest's own slug is used.
    pub fn install(&self, upload: &mut Upload, expected_slug: Option<&str>) -> Result<InstallReport> {
        let result = self.run(upload, expected_slug);
        if let Err(e) = &result {
            match e.kind() {
                ErrorKind::StructuralViolation => {
                    warn!(security = true, code = e.code(), error = %e, "install rejected")
                }
                ErrorKind::Environmental => error!(code = e.code(), error = %e, "install failed"),
                ErrorKind::InputRejection => info!(code = e.code(), error = %e, "install rejected"),
            }
        }
        result
    }

    fn run(&self, upload: &mut Upload, expected_slug: Option<&str>) -> Result<InstallReport> {
        let sandboxed = self.intake.accept(upload)?;
        let mut scratch = TempFiles::default();
        scratch.push(&sandboxed.path);

        let normalized = normalize(&sandboxed.path, &self.config.limits)?;
        if normalized.rewritten {
            scratch.push(&normalized.path);
        }

        let slug = expected_slug.unwrap_or(&normalized.slug);
        let installed = extract_safe(
            &normalized.path,
            slug,
            &self.config.extensions_dir,
            &self.config.staging_dir,
            &self.config.limits,
        )?;

        Ok(InstallReport {
            slug: installed.slug,
            path: installed.path,
            manifest: installed.manifest,
            file_count: installed.file_count,
            total_bytes: installed.total_bytes,
            sha256: sandboxed.sha256,
            normalized: normalized.rewritten,
        })
    }
}

/// Files removed on drop.
#[derive(Default)]
struct TempFiles(Vec<PathBuf>);

impl TempFiles {
    fn push(&mut self, path: &Path) {
        self.0.push(path.to_path_buf());
    }
}

impl Drop for TempFiles {
    fn drop(&mut self) {
        for path in &self.0 {
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => error!(path = %path.display(), error = %e, "failed to remove temporary file"),
            }
        }
    }
}
