//! Rehome a package whose manifest sits one folder deep under a folder
//! named after its canonical slug.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek};
use std::path::{Path, PathBuf};

use extgate_fs::{OwnedDir, create_dir_chain, random_hex};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, error, info};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::entry::{ArchiveEntry, entries, open_archive};
use crate::error::NormalizeStep;
use crate::limits::ExtractionLimits;
use crate::manifest::{MANIFEST_NAME, Manifest, canonical_slug, read_capped};
use crate::scan::Scanner;
use crate::{Error, Result};

static NESTED_MANIFEST_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^([^/]+)/extension\.json$").unwrap());

const SCRATCH_PREFIX: &str = ".extgate-norm";

/// Outcome of [`normalize`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Normalized {
    /// Archive to hand to the extractor.
    pub path: PathBuf,
    /// Slug as declared by the manifest.
    pub slug: String,
    pub canonical_slug: String,
    /// `true` when `path` is a new archive written next to the input.
    pub rewritten: bool,
}

impl Normalized {
    /// Delete the rewritten archive, if one was produced.
    pub fn remove_rewritten(&self) -> io::Result<()> {
        if self.rewritten {
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

/// Make sure the manifest of `zip_path` is either at the root or directly
/// under `<canonical slug>/`.
///
/// Archives already in that shape are returned as is. Otherwise the package
/// folder is re-rooted under `<canonical slug>/` in a new archive next to the
/// input. The input is never modified.
pub fn normalize(zip_path: &Path, limits: &ExtractionLimits) -> Result<Normalized> {
    let parent = zip_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    normalize_in(zip_path, parent, limits)
}

/// [`normalize`] with the scratch directory and any rewritten archive placed
/// in `work_dir` (created if missing).
pub fn normalize_in(zip_path: &Path, work_dir: &Path, limits: &ExtractionLimits) -> Result<Normalized> {
    let mut archive = open_archive(zip_path)?;
    let listing: Vec<ArchiveEntry> = entries(&mut archive).collect::<Result<_>>()?;

    let (manifest_index, prefix) = find_manifest(&listing)?;
    let file = archive
        .by_index(manifest_index)
        .map_err(|e| Error::Corrupted {
            index: manifest_index,
            source: e,
        })?;
    let bytes = read_capped(file).map_err(|e| Error::Corrupted {
        index: manifest_index,
        source: zip::result::ZipError::Io(e),
    })?;
    let manifest = Manifest::from_slice(&bytes)?;
    let canonical = canonical_slug(&manifest.slug)?;

    let unchanged = |canonical: String| Normalized {
        path: zip_path.to_path_buf(),
        slug: manifest.slug.clone(),
        canonical_slug: canonical,
        rewritten: false,
    };

    let Some(prefix) = prefix else {
        debug!(path = %zip_path.display(), "manifest at archive root");
        return Ok(unchanged(canonical));
    };
    if prefix.eq_ignore_ascii_case(&canonical) {
        debug!(path = %zip_path.display(), folder = %prefix, "package folder already named after slug");
        return Ok(unchanged(canonical));
    }

    let mut scanner = Scanner::new(*limits);
    for entry in &listing {
        scanner.observe(entry)?;
    }
    scanner.finish().ensure_contained()?;

    let scratch = OwnedDir::create_in(work_dir, SCRATCH_PREFIX, 4).map_err(|e| match e {
        extgate_fs::Error::CreateDir { path, source } => {
            Error::normalize(NormalizeStep::Workdir, path, source)
        }
        other => Error::Staging(other),
    })?;

    unpack_prefix(&mut archive, &listing, &prefix, scratch.path())?;

    let output = work_dir.join(format!("{canonical}-{}.zip", random_hex(4)));
    let repacked = repack(scratch.path(), &canonical, &output);
    let report = scratch.discard();
    if !report.is_clean() {
        error!(leftover = report.failed.len(), "normalizer scratch directory not fully removed");
    }
    repacked?;

    info!(
        from = %zip_path.display(),
        to = %output.display(),
        folder = %prefix,
        slug = %canonical,
        "rehomed package folder"
    );

    Ok(Normalized {
        path: output,
        slug: manifest.slug,
        canonical_slug: canonical,
        rewritten: true,
    })
}

/// Index of the manifest entry and the folder it sits in, if any.
fn find_manifest(listing: &[ArchiveEntry]) -> Result<(usize, Option<String>)> {
    let at_root = listing.iter().find(|e| {
        !e.is_directory
            && e.normalized()
                .is_ok_and(|p| p.depth() == 1 && p.first().eq_ignore_ascii_case(MANIFEST_NAME))
    });
    if let Some(entry) = at_root {
        return Ok((entry.index, None));
    }

    listing
        .iter()
        .filter(|e| !e.is_directory)
        .find_map(|e| {
            let name = e.normalized().ok()?.to_entry_name();
            let captures = NESTED_MANIFEST_RE.captures(&name)?;
            Some((e.index, Some(captures[1].to_string())))
        })
        .ok_or(Error::ManifestMissing)
}

fn unpack_prefix<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    listing: &[ArchiveEntry],
    prefix: &str,
    scratch: &Path,
) -> Result<()> {
    for entry in listing {
        let Ok(path) = entry.normalized() else {
            continue;
        };
        let Some(Some(inner)) = path.strip_first(prefix) else {
            continue;
        };

        if entry.is_directory {
            create_dir_chain(scratch, inner.segments())
                .map_err(|e| step_error(NormalizeStep::ExtractDir, scratch, e))?;
            continue;
        }

        let dir = create_dir_chain(scratch, inner.parent_segments())
            .map_err(|e| step_error(NormalizeStep::ExtractParent, scratch, e))?;
        let target = inner.join_onto(scratch);
        debug_assert!(target.starts_with(&dir));

        let mut file = archive.by_index(entry.index).map_err(|e| Error::Corrupted {
            index: entry.index,
            source: e,
        })?;
        let extract_err = |e| Error::normalize(NormalizeStep::ExtractFile, &target, e);
        let mut out = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
            .map_err(extract_err)?;
        io::copy(&mut (&mut file).take(entry.uncompressed_size), &mut out).map_err(extract_err)?;
    }
    Ok(())
}

/// Zip `scratch` under `<slug>/` into `output`. A partial output is removed.
fn repack(scratch: &Path, slug: &str, output: &Path) -> Result<()> {
    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(output)
        .map_err(|e| Error::normalize(NormalizeStep::OpenOutput, output, e))?;

    let result = write_zip(file, scratch, slug);
    if result.is_err() {
        let _ = std::fs::remove_file(output);
    }
    result.map_err(|e| Error::normalize(NormalizeStep::Repack, output, e))
}

fn write_zip(file: File, scratch: &Path, slug: &str) -> io::Result<()> {
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644);
    let dir_options = options.unix_permissions(0o755);
    let mut writer = ZipWriter::new(file);
    writer.add_directory(format!("{slug}/"), dir_options).map_err(io::Error::other)?;

    for entry in WalkDir::new(scratch).min_depth(1).sort_by_file_name() {
        let entry = entry?;
        let rel = entry.path().strip_prefix(scratch).map_err(io::Error::other)?;
        let rel: Vec<_> = rel.components().map(|c| c.as_os_str().to_string_lossy()).collect();
        let name = format!("{slug}/{}", rel.join("/"));

        if entry.file_type().is_dir() {
            writer.add_directory(format!("{name}/"), dir_options).map_err(io::Error::other)?;
        } else {
            writer.start_file(name, options).map_err(io::Error::other)?;
            io::copy(&mut File::open(entry.path())?, &mut writer)?;
        }
    }

    writer.finish().map_err(io::Error::other)?;
    Ok(())
}

fn step_error(step: NormalizeStep, scratch: &Path, e: extgate_fs::Error) -> Error {
    match e {
        extgate_fs::Error::CreateDir { path, source } => Error::normalize(step, path, source),
        extgate_fs::Error::Escapes { path, .. } => Error::normalize(
            step,
            path,
            io::Error::new(io::ErrorKind::AlreadyExists, "not a directory"),
        ),
        extgate_fs::Error::Resolve { path, source } => Error::normalize(step, path, source),
        other => Error::normalize(step, scratch, io::Error::other(other.to_string())),
    }
}
