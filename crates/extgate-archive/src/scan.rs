//! Pass 1: read-only validation over the central directory.
//!
//! Nothing here touches the filesystem, so the scanner can be fed a crafted
//! entry list directly.

use std::collections::HashSet;

use tracing::warn;

use crate::entry::ArchiveEntry;
use crate::limits::ExtractionLimits;
use crate::manifest::{MANIFEST_NAME, canonical_slug};
use crate::sanitize::PathViolation;
use crate::{Error, Result};

/// Accumulates Pass 1 state one entry at a time.
#[derive(Debug)]
pub struct Scanner {
    limits: ExtractionLimits,
    report: ScanReport,
    /// Lowercased names of the file entries seen so far.
    names: HashSet<String>,
}

/// What a completed scan saw.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub entries_seen: usize,
    pub file_count: usize,
    pub total_bytes: u64,
    /// First unsafe entry name, if any.
    pub traversal: Option<(String, PathViolation)>,
    /// Index of `extension.json` at the archive root.
    pub root_manifest: Option<usize>,
    /// `(folder, index)` for every `<folder>/extension.json`.
    pub nested_manifests: Vec<(String, usize)>,
}

/// Where the package content starts inside the archive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PackageRoot {
    pub manifest_index: usize,
    /// Top-level folder to strip, `None` when the manifest is at the root.
    pub prefix: Option<String>,
}

impl Scanner {
    pub fn new(limits: ExtractionLimits) -> Self {
        Self {
            limits,
            report: ScanReport::default(),
            names: HashSet::new(),
        }
    }

    /// Check one entry.
    ///
    /// Symlinks and limit overruns fail immediately. An unsafe name is only
    /// recorded, so the remaining entries still count against the limits.
    /// A file whose name matches an earlier file once case is ignored is
    /// recorded as a [`PathViolation::Collision`].
    pub fn observe(&mut self, entry: &ArchiveEntry) -> Result<()> {
        let report = &mut self.report;
        report.entries_seen += 1;

        match entry.normalized() {
            Ok(path) if !entry.is_directory => {
                let collides = !self.names.insert(path.to_entry_name().to_lowercase());
                if collides && report.traversal.is_none() {
                    report.traversal = Some((entry.name.clone(), PathViolation::Collision));
                }

                let manifest_leaf = path
                    .segments()
                    .last()
                    .is_some_and(|s| s.eq_ignore_ascii_case(MANIFEST_NAME));
                if manifest_leaf && path.depth() == 1 && report.root_manifest.is_none() {
                    report.root_manifest = Some(entry.index);
                } else if manifest_leaf && path.depth() == 2 {
                    report
                        .nested_manifests
                        .push((path.first().to_string(), entry.index));
                }
            }
            Ok(_) => {}
            Err(violation) => {
                if report.traversal.is_none() {
                    report.traversal = Some((entry.name.clone(), violation));
                }
            }
        }

        if entry.is_symlink() {
            warn!(security = true, code = "symlink_detected", entry = %entry.name, "symlink entry in archive");
            return Err(Error::SymlinkDetected {
                entry: entry.name.clone(),
            });
        }

        if entry.is_directory {
            return Ok(());
        }

        report.file_count += 1;
        if report.file_count > self.limits.max_files {
            warn!(security = true, code = "too_many_files", limit = self.limits.max_files, "archive file count over limit");
            return Err(Error::TooManyFiles {
                limit: self.limits.max_files,
            });
        }

        report.total_bytes = report.total_bytes.saturating_add(entry.uncompressed_size);
        if report.total_bytes > self.limits.max_total_bytes {
            warn!(security = true, code = "too_large", limit = self.limits.max_total_bytes, "archive size over limit");
            return Err(Error::TooLarge {
                limit: self.limits.max_total_bytes,
            });
        }

        Ok(())
    }

    pub fn finish(self) -> ScanReport {
        self.report
    }
}

impl ScanReport {
    /// Fail with `path_traversal` if any entry name was unsafe.
    pub fn ensure_contained(&self) -> Result<()> {
        match &self.traversal {
            Some((entry, violation)) => {
                warn!(security = true, code = "path_traversal", entry = %entry, %violation, "unsafe entry path");
                Err(Error::PathTraversal {
                    entry: entry.clone(),
                    violation: *violation,
                })
            }
            None => Ok(()),
        }
    }

    /// Pick the package root for `expected_slug`.
    ///
    /// A root manifest wins. Otherwise a single top-level folder named after
    /// the slug (case-insensitively, raw or canonical form) qualifies.
    pub fn locate_package_root(&self, expected_slug: &str) -> Result<PackageRoot> {
        if let Some(index) = self.root_manifest {
            return Ok(PackageRoot {
                manifest_index: index,
                prefix: None,
            });
        }

        let canonical = canonical_slug(expected_slug).ok();
        let matches_slug = |folder: &str| {
            folder.eq_ignore_ascii_case(expected_slug)
                || canonical
                    .as_deref()
                    .is_some_and(|c| folder.eq_ignore_ascii_case(c))
        };

        self.nested_manifests
            .iter()
            .find(|(folder, _)| matches_slug(folder))
            .map(|(folder, index)| PackageRoot {
                manifest_index: *index,
                prefix: Some(folder.clone()),
            })
            .ok_or(Error::MissingManifest)
    }
}

/// Run a whole scan over already-read entries.
pub fn scan<I>(entries: I, limits: ExtractionLimits) -> Result<ScanReport>
where
    I: IntoIterator<Item = ArchiveEntry>,
{
    let mut scanner = Scanner::new(limits);
    for entry in entries {
        scanner.observe(&entry)?;
    }
    Ok(scanner.finish())
}
