//! Two-pass validate-then-extract with atomic promotion.

use std::fs::File;
use std::io::{self, Read, Seek};
use std::path::{Path, PathBuf};

use extgate_fs::{OwnedDir, PermissionMode, create_dir_chain, ensure_within};
use tracing::{debug, info, warn};
use zip::ZipArchive;
use zip::result::ZipError;

use crate::entry::{open_archive, read_entry};
use crate::limits::ExtractionLimits;
use crate::manifest::{Manifest, is_valid_slug, read_capped};
use crate::sanitize::{NormalizedPath, PathViolation};
use crate::scan::{PackageRoot, ScanReport, Scanner};
use crate::{Error, Result};

/// An archive that passed Pass 1.
#[derive(Clone, Debug)]
pub struct Validated {
    pub slug: String,
    pub manifest: Manifest,
    pub report: ScanReport,
    pub root: PackageRoot,
}

/// A fully populated staging directory waiting for promotion.
///
/// Dropping it without calling [`StagedExtraction::commit`] removes the
/// staging directory.
#[derive(Debug)]
pub struct StagedExtraction {
    staging: OwnedDir,
    validated: Validated,
    files_written: usize,
}

/// The result of a successful install.
#[derive(Clone, Debug)]
pub struct Installed {
    pub slug: String,
    pub path: PathBuf,
    pub manifest: Manifest,
    pub file_count: usize,
    pub total_bytes: u64,
}

/// Validate, extract and promote `zip_path` as `expected_slug`.
///
/// On success `dest_dir/expected_slug` holds the package. On any failure
/// nothing is left under `staging_dir` and `dest_dir` is untouched.
pub fn extract_safe(
    zip_path: &Path,
    expected_slug: &str,
    dest_dir: &Path,
    staging_dir: &Path,
    limits: &ExtractionLimits,
) -> Result<Installed> {
    if !is_valid_slug(expected_slug) {
        info!(slug = expected_slug, code = "invalid_slug", "refusing to extract");
        return Err(Error::InvalidSlug {
            slug: expected_slug.to_string(),
        });
    }

    let mut archive = open_archive(zip_path)?;
    let validated = validate(&mut archive, expected_slug, limits)?;
    let staged = extract_to_staging(&mut archive, validated, staging_dir)?;
    staged.commit(dest_dir)
}

/// Pass 1. Reads the central directory and the manifest, writes nothing.
pub fn validate<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    expected_slug: &str,
    limits: &ExtractionLimits,
) -> Result<Validated> {
    let report = scan_archive(archive, limits)?;
    report.ensure_contained()?;

    let root = report.locate_package_root(expected_slug).inspect_err(|e| {
        warn!(security = true, code = e.code(), slug = expected_slug, "no manifest at package root");
    })?;

    let manifest = match read_manifest(archive, root.manifest_index)? {
        Ok(manifest) if manifest.slug == expected_slug => manifest,
        decoded => {
            let found = decoded.ok().map(|m| m.slug);
            warn!(security = true, code = "slug_mismatch", expected = expected_slug, found = ?found, "manifest does not match");
            return Err(Error::SlugMismatch {
                expected: expected_slug.to_string(),
                found,
            });
        }
    };

    debug!(
        slug = expected_slug,
        files = report.file_count,
        bytes = report.total_bytes,
        prefix = root.prefix.as_deref().unwrap_or(""),
        "archive validated"
    );

    Ok(Validated {
        slug: expected_slug.to_string(),
        manifest,
        report,
        root,
    })
}

/// Pass 1 without an expected slug: the slug is taken from whichever
/// manifest the archive carries, then checked like [`validate`] would.
pub fn inspect(zip_path: &Path, limits: &ExtractionLimits) -> Result<Validated> {
    let mut archive = open_archive(zip_path)?;
    let report = scan_archive(&mut archive, limits)?;
    report.ensure_contained()?;

    let index = report
        .root_manifest
        .or_else(|| report.nested_manifests.first().map(|(_, i)| *i))
        .ok_or(Error::MissingManifest)?;
    let manifest = read_manifest(&mut archive, index)??;
    if !is_valid_slug(&manifest.slug) {
        return Err(Error::InvalidSlug { slug: manifest.slug });
    }

    validate(&mut archive, &manifest.slug, limits)
}

/// Pass 2. Re-reads every entry and writes the package into a fresh
/// `<staging_dir>/<slug>-<hex>` directory.
pub fn extract_to_staging<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    validated: Validated,
    staging_dir: &Path,
) -> Result<StagedExtraction> {
    let staging = OwnedDir::create_in(staging_dir, &validated.slug, 4).map_err(Error::Staging)?;
    let root = staging.path().to_path_buf();
    let prefix = validated.root.prefix.as_deref();
    let mut files_written = 0;

    for index in 0..archive.len() {
        let entry = read_entry(archive, index)?;
        if entry.is_symlink() {
            return Err(Error::SymlinkDetected { entry: entry.name });
        }

        let path = entry.normalized().map_err(|violation| traversal(&entry.name, violation))?;
        let path = match prefix {
            None => path,
            Some(prefix) => match path.strip_first(prefix) {
                Some(Some(inner)) => inner,
                Some(None) => continue,
                None => {
                    debug!(entry = %entry.name, "skipping entry outside package root");
                    continue;
                }
            },
        };

        if entry.is_directory {
            let dir = create_dir_chain(&root, path.segments()).map_err(|e| fs_error(&entry.name, e))?;
            ensure_within(&root, &dir).map_err(|e| fs_error(&entry.name, e))?;
            continue;
        }

        let mut file = archive
            .by_index(index)
            .map_err(|e| Error::Corrupted { index, source: e })?;
        write_file(&root, &path, &entry.name, &mut file, entry.uncompressed_size)?;
        files_written += 1;
    }

    Ok(StagedExtraction {
        staging,
        validated,
        files_written,
    })
}

impl StagedExtraction {
    pub fn path(&self) -> &Path {
        self.staging.path()
    }

    pub fn files_written(&self) -> usize {
        self.files_written
    }

    /// Rename the staging directory to `dest_dir/<slug>`.
    ///
    /// An existing destination is never replaced or merged into.
    pub fn commit(self, dest_dir: &Path) -> Result<Installed> {
        let slug = self.validated.slug;
        let final_path = dest_dir.join(&slug);

        if std::fs::symlink_metadata(&final_path).is_ok() {
            info!(slug = %slug, code = "already_installed", path = %final_path.display(), "destination exists");
            return Err(Error::AlreadyInstalled { path: final_path });
        }

        let installed = self.staging.promote(&final_path).map_err(|e| match e {
            extgate_fs::Error::AlreadyExists { path } => Error::AlreadyInstalled { path },
            other => Error::Staging(other),
        })?;

        if let Err(e) = PermissionMode::Directory.apply_to_path(&installed) {
            warn!(path = %installed.display(), error = %e, "could not set directory mode");
        }

        info!(
            slug = %slug,
            path = %installed.display(),
            files = self.files_written,
            "extension installed"
        );

        Ok(Installed {
            slug,
            path: installed,
            manifest: self.validated.manifest,
            file_count: self.files_written,
            total_bytes: self.validated.report.total_bytes,
        })
    }
}

fn scan_archive<R: Read + Seek>(archive: &mut ZipArchive<R>, limits: &ExtractionLimits) -> Result<ScanReport> {
    let mut scanner = Scanner::new(*limits);
    for index in 0..archive.len() {
        scanner.observe(&read_entry(archive, index)?)?;
    }
    Ok(scanner.finish())
}

/// Outer error is the archive failing, inner is the manifest not decoding.
fn read_manifest<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    index: usize,
) -> Result<std::result::Result<Manifest, Error>> {
    let file = archive
        .by_index(index)
        .map_err(|e| Error::Corrupted { index, source: e })?;
    let bytes = read_capped(file).map_err(|e| Error::Corrupted {
        index,
        source: ZipError::Io(e),
    })?;
    Ok(Manifest::from_slice(&bytes).map_err(Error::from))
}

fn write_file(
    root: &Path,
    path: &NormalizedPath,
    entry_name: &str,
    reader: &mut impl Read,
    size: u64,
) -> Result<()> {
    let parent = create_dir_chain(root, path.parent_segments()).map_err(|e| fs_error(entry_name, e))?;
    let parent = ensure_within(root, &parent).map_err(|e| fs_error(entry_name, e))?;

    let Some(leaf) = path.segments().last() else {
        return Err(traversal(entry_name, PathViolation::Empty));
    };
    let target = parent.join(leaf);

    match std::fs::symlink_metadata(&target) {
        Ok(meta) if meta.file_type().is_symlink() => {
            return Err(traversal(entry_name, PathViolation::OutsideRoot));
        }
        Ok(meta) if meta.is_dir() => {
            return Err(Error::Write {
                path: target,
                source: io::Error::new(io::ErrorKind::AlreadyExists, "a directory is in the way"),
            });
        }
        _ => {}
    }

    let write_err = |e: io::Error| Error::Write {
        path: target.clone(),
        source: e,
    };
    let mut out = File::create(&target).map_err(write_err)?;
    io::copy(&mut reader.take(size), &mut out).map_err(write_err)?;
    out.sync_all().map_err(write_err)?;
    drop(out);

    PermissionMode::ReadWrite
        .apply_to_path(&target)
        .map_err(|e| match e {
            extgate_fs::Error::Permissions { path, source } => Error::Write { path, source },
            other => Error::Staging(other),
        })
}

fn traversal(entry: &str, violation: PathViolation) -> Error {
    warn!(security = true, code = "path_traversal", entry, %violation, "unsafe entry during extraction");
    Error::PathTraversal {
        entry: entry.to_string(),
        violation,
    }
}

fn fs_error(entry: &str, e: extgate_fs::Error) -> Error {
    match e {
        extgate_fs::Error::Escapes { .. } | extgate_fs::Error::Resolve { .. } => {
            traversal(entry, PathViolation::OutsideRoot)
        }
        extgate_fs::Error::CreateDir { path, source } => Error::Write { path, source },
        other => Error::Staging(other),
    }
}
