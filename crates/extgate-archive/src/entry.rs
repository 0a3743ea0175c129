use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;

use zip::ZipArchive;

use crate::sanitize::{NormalizedPath, PathViolation};
use crate::{Error, Result};

const S_IFMT: u32 = 0o170000;
const S_IFLNK: u32 = 0o120000;

/// One central-directory record, as the archive declares it.
#[derive(Clone, Debug)]
pub struct ArchiveEntry {
    pub index: usize,
    pub raw_name: Vec<u8>,
    pub name: String,
    pub is_directory: bool,
    pub uncompressed_size: u64,
    pub unix_mode: Option<u32>,
}

impl ArchiveEntry {
    pub fn new(index: usize, name: impl Into<String>, uncompressed_size: u64) -> Self {
        let name = name.into();
        Self {
            index,
            raw_name: name.as_bytes().to_vec(),
            is_directory: name.ends_with('/') || name.ends_with('\\'),
            name,
            uncompressed_size,
            unix_mode: None,
        }
    }

    pub fn with_unix_mode(mut self, mode: u32) -> Self {
        self.unix_mode = Some(mode);
        self
    }

    pub fn is_symlink(&self) -> bool {
        self.unix_mode.is_some_and(|m| m & S_IFMT == S_IFLNK)
    }

    /// The entry name reduced to safe relative segments.
    ///
    /// NUL is checked on the stored bytes since the decoded name may have
    /// lost it.
    pub fn normalized(&self) -> std::result::Result<NormalizedPath, PathViolation> {
        if self.raw_name.contains(&0) {
            return Err(PathViolation::Nul);
        }
        NormalizedPath::parse(&self.name)
    }
}

/// Open a zip on disk.
///
/// Missing files and files too short to hold a local header are
/// `zip_not_found_or_empty`; anything the zip reader refuses is
/// `zip_open_failed`.
pub fn open_archive(path: &Path) -> Result<ZipArchive<File>> {
    let not_found = || Error::NotFoundOrEmpty {
        path: path.to_path_buf(),
    };

    let len = std::fs::metadata(path).map_err(|_| not_found())?.len();
    if len < 4 {
        return Err(not_found());
    }
    let file = File::open(path).map_err(|_| not_found())?;
    ZipArchive::new(file).map_err(|e| Error::Open {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Read entry `index` without decompressing it.
pub fn read_entry<R: Read + Seek>(archive: &mut ZipArchive<R>, index: usize) -> Result<ArchiveEntry> {
    let file = archive
        .by_index_raw(index)
        .map_err(|e| Error::Corrupted { index, source: e })?;

    let name = file.name().to_string();
    Ok(ArchiveEntry {
        index,
        raw_name: file.name_raw().to_vec(),
        is_directory: name.ends_with('/') || name.ends_with('\\'),
        name,
        uncompressed_size: file.size(),
        unix_mode: file.unix_mode(),
    })
}

/// Iterate the central directory once.
pub fn entries<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
) -> impl Iterator<Item = Result<ArchiveEntry>> + '_ {
    (0..archive.len()).map(move |i| read_entry(archive, i))
}
