use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_FILES: usize = 500;
pub const DEFAULT_MAX_TOTAL_BYTES: u64 = 8 * 1024 * 1024;

/// Archive-wide ceilings enforced during the scan.
///
/// Both are cumulative over every non-directory entry, not per file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionLimits {
    pub max_files: usize,
    pub max_total_bytes: u64,
}

impl Default for ExtractionLimits {
    fn default() -> Self {
        Self {
            max_files: DEFAULT_MAX_FILES,
            max_total_bytes: DEFAULT_MAX_TOTAL_BYTES,
        }
    }
}

impl ExtractionLimits {
    pub fn max_files(mut self, n: usize) -> Self {
        self.max_files = n;
        self
    }

    pub fn max_total_bytes(mut self, bytes: u64) -> Self {
        self.max_total_bytes = bytes;
        self
    }
}
