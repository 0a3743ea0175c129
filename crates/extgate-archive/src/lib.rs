//! Validate-then-extract for untrusted extension packages.
//!
//! # Architecture
//!
//! - `sanitize.rs` - entry name canonicalization (zip-slip prevention)
//! - `entry.rs` - central-directory projection
//! - `scan.rs` - Pass 1, pure over an entry list
//! - `extract.rs` - Pass 2 into staging, then atomic promotion
//! - `normalize.rs` - rehoming of packages nested one folder deep
//! - `manifest.rs` - `extension.json` and slug rules

pub use entry::{ArchiveEntry, open_archive, read_entry};
pub use error::{Error, ErrorKind, NormalizeStep, Result};
pub use extract::{
    Installed, StagedExtraction, Validated, extract_safe, extract_to_staging, inspect, validate,
};
pub use limits::ExtractionLimits;
pub use manifest::{MANIFEST_NAME, Manifest, ManifestError, canonical_slug, is_valid_slug};
pub use normalize::{Normalized, normalize, normalize_in};
pub use sanitize::{NormalizedPath, PathViolation};
pub use scan::{PackageRoot, ScanReport, Scanner, scan};

pub mod limits;
mod entry;
mod error;
mod extract;
mod manifest;
mod normalize;
mod sanitize;
mod scan;
