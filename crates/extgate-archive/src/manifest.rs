//! `extension.json` decoding and slug rules.

use std::io::Read;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::{Error, Result};

pub const MANIFEST_NAME: &str = "extension.json";

/// Manifests larger than this are not read past the limit.
pub const MANIFEST_READ_LIMIT: u64 = 1024 * 1024;

static SLUG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z0-9_-]{3,64}$").unwrap());

/// Whether `slug` is acceptable as an install identity.
pub fn is_valid_slug(slug: &str) -> bool {
    SLUG_RE.is_match(slug)
}

/// Reduce a declared slug to a directory name.
///
/// Anything outside `[A-Za-z0-9-]` becomes `-`, then leading and trailing
/// dashes are trimmed.
pub fn canonical_slug(slug: &str) -> Result<String> {
    let replaced: String = slug
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '-' })
        .collect();
    let trimmed = replaced.trim_matches('-');
    if trimmed.is_empty() {
        return Err(Error::SlugNormalizedEmpty {
            slug: slug.to_string(),
        });
    }
    Ok(trimmed.to_string())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ManifestError {
    Empty,
    NotJson,
    NotObject,
    MissingSlug,
}

/// A decoded manifest. Only `slug` is interpreted; the rest is carried along.
#[derive(Clone, Debug, PartialEq)]
pub struct Manifest {
    pub slug: String,
    pub fields: Map<String, Value>,
}

impl Manifest {
    pub fn from_slice(bytes: &[u8]) -> std::result::Result<Self, ManifestError> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(ManifestError::Empty);
        }
        let value: Value = serde_json::from_slice(bytes).map_err(|_| ManifestError::NotJson)?;
        let Value::Object(fields) = value else {
            return Err(ManifestError::NotObject);
        };
        let slug = match fields.get("slug") {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            _ => return Err(ManifestError::MissingSlug),
        };
        Ok(Self { slug, fields })
    }

    pub fn name(&self) -> Option<&str> {
        self.fields.get("name").and_then(Value::as_str)
    }

    pub fn version(&self) -> Option<&str> {
        self.fields.get("version").and_then(Value::as_str)
    }
}

impl From<ManifestError> for Error {
    fn from(e: ManifestError) -> Self {
        match e {
            ManifestError::Empty => Error::ManifestMissing,
            ManifestError::NotJson | ManifestError::NotObject => Error::ManifestInvalidJson,
            ManifestError::MissingSlug => Error::ManifestMissingSlug,
        }
    }
}

/// Read at most [`MANIFEST_READ_LIMIT`] bytes of a manifest entry.
pub(crate) fn read_capped(reader: impl Read) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    reader.take(MANIFEST_READ_LIMIT).read_to_end(&mut buf)?;
    Ok(buf)
}
