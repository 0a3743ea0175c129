use std::path::{Path, PathBuf};

use extgate_archive::ExtractionLimits;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Directories and ceilings for the installer.
///
/// ```toml
/// temp_dir = "/var/lib/cms/private/tmp"
/// staging_dir = "/var/lib/cms/private/staging"
/// extensions_dir = "/var/lib/cms/private/extensions"
/// max_upload_bytes = 10485760
///
/// [limits]
/// max_files = 500
/// max_total_bytes = 8388608
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallerConfig {
    /// Private sandbox uploads are moved into.
    pub temp_dir: PathBuf,
    /// Root for per-attempt staging directories.
    pub staging_dir: PathBuf,
    /// Final install root; each extension lands in `<extensions_dir>/<slug>`.
    pub extensions_dir: PathBuf,
    pub max_upload_bytes: u64,
    pub limits: ExtractionLimits,
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self::rooted_at(".")
    }
}

impl InstallerConfig {
    /// `tmp/`, `staging/` and `extensions/` under one root.
    pub fn rooted_at(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            temp_dir: root.join("tmp"),
            staging_dir: root.join("staging"),
            extensions_dir: root.join("extensions"),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            limits: ExtractionLimits::default(),
        }
    }

    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml_str(&text).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn with_limits(mut self, limits: ExtractionLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_max_upload_bytes(mut self, bytes: u64) -> Self {
        self.max_upload_bytes = bytes;
        self
    }

    pub fn with_extensions_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.extensions_dir = dir.into();
        self
    }

    pub fn with_staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = dir.into();
        self
    }

    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = dir.into();
        self
    }

    /// The three directories must be disjoint and every limit non-zero.
    ///
    /// Overlap is judged on the paths as written; nothing needs to exist yet.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let dirs = [
            ("temp_dir", &self.temp_dir),
            ("staging_dir", &self.staging_dir),
            ("extensions_dir", &self.extensions_dir),
        ];
        for (i, (first, a)) in dirs.iter().enumerate() {
            for (second, b) in &dirs[i + 1..] {
                if a.starts_with(b) || b.starts_with(a) {
                    return Err(ConfigError::OverlappingDirs {
                        first: *first,
                        second: *second,
                        path: a.to_path_buf(),
                    });
                }
            }
        }

        if self.max_upload_bytes == 0 {
            return Err(ConfigError::ZeroLimit {
                name: "max_upload_bytes",
            });
        }
        if self.limits.max_files == 0 {
            return Err(ConfigError::ZeroLimit {
                name: "limits.max_files",
            });
        }
        if self.limits.max_total_bytes == 0 {
            return Err(ConfigError::ZeroLimit {
                name: "limits.max_total_bytes",
            });
        }
        Ok(())
    }
}
