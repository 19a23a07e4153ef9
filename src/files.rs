//! File-record helpers shared by the bundled transforms.
//!
//! A transform stage consumes a batch of [`FileRecord`]s (path + content)
//! and produces a transformed batch, which eventually lands on disk through
//! [`write_records`]. Writes are content-addressed: a destination whose
//! hash already matches the new content is left untouched, so downstream
//! watchers don't fire on no-op rebuilds.

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::error::FilesError;

/// 32 bytes length generic hash
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct Hash32([u8; 32]);

impl<T> From<T> for Hash32
where
    T: Into<[u8; 32]>,
{
    fn from(value: T) -> Self {
        Hash32(value.into())
    }
}

impl Hash32 {
    pub(crate) fn hash(buffer: impl AsRef<[u8]>) -> Self {
        blake3::Hasher::new()
            .update(buffer.as_ref())
            .finalize()
            .into()
    }

    pub(crate) fn hash_file(path: impl AsRef<std::path::Path>) -> std::io::Result<Self> {
        Ok(blake3::Hasher::new()
            .update_mmap_rayon(path)?
            .finalize()
            .into())
    }
}

/// A single file flowing through a transform stage.
#[derive(Debug, Clone)]
pub struct FileRecord {
    /// Source path the content was read from.
    pub path: Utf8PathBuf,
    pub content: Vec<u8>,
}

/// Read every file matching the pattern into records, sorted by path for
/// deterministic downstream output.
pub fn read_glob(pattern: &str) -> Result<Vec<FileRecord>, FilesError> {
    let mut paths = Vec::new();
    for entry in glob::glob(pattern)? {
        let path = Utf8PathBuf::try_from(entry?)?;
        if path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();

    paths
        .into_par_iter()
        .map(|path| {
            let content = fs::read(&path)?;
            Ok(FileRecord { path, content })
        })
        .collect()
}

/// Static directory prefix of a glob pattern: the components before the
/// first one containing a wildcard.
pub fn glob_base(pattern: &str) -> Utf8PathBuf {
    Utf8Path::new(pattern)
        .components()
        .take_while(|c| !c.as_str().contains(['*', '?', '[']))
        .collect()
}

/// Write `content` to `path` unless an identical file is already there.
/// Returns whether the file was actually written.
pub fn write_if_changed(path: &Utf8Path, content: &[u8]) -> Result<bool, FilesError> {
    if path.is_file() && Hash32::hash_file(path)? == Hash32::hash(content) {
        return Ok(false);
    }

    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    fs::write(path, content)?;

    Ok(true)
}

/// Write a batch of records under `dest`, preserving their location relative
/// to `base`. A record outside `base` falls back to its file name. Returns
/// the number of files actually written.
pub fn write_records(
    records: &[FileRecord],
    base: &Utf8Path,
    dest: &Utf8Path,
) -> Result<usize, FilesError> {
    let mut written = 0;

    for record in records {
        let rel = match record.path.strip_prefix(base) {
            Ok(rel) if !rel.as_str().is_empty() => rel,
            _ => Utf8Path::new(record.path.file_name().unwrap_or_default()),
        };

        if write_if_changed(&dest.join(rel), &record.content)? {
            written += 1;
        }
    }

    Ok(written)
}
