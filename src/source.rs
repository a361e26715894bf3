//! File sources backing a property store.
//!
//! A store captured from a live system resolves its dependent files against
//! the panel config directory; a store loaded from an archive resolves them
//! against the archive members. Both go through the same capability trait so
//! the normalizer and the live adapter never branch on where a store came
//! from.

use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::debug;

use crate::archive::{self, Compression};

/// Read-only access to dependent files by relative path.
/// `Ok(None)` means the file simply is not there, which is never an error
/// for callers — plugins may reference files that were never written.
pub trait FileSource {
    fn open(&self, rel: &str) -> Result<Option<Vec<u8>>>;
}

/// Filesystem-backed source rooted at a directory (the live panel config
/// directory during capture and apply).
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl FileSource for DirSource {
    fn open(&self, rel: &str) -> Result<Option<Vec<u8>>> {
        let path = self.root.join(rel);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => {
                // unreadable is treated the same as absent
                debug!(path = %path.display(), error = %e, "dependent file unreadable");
                Ok(None)
            }
        }
    }
}

/// Archive-backed source. Members are not extracted eagerly; each `open`
/// re-scans the archive for the requested entry.
pub struct ArchiveSource {
    path: PathBuf,
    compression: Compression,
}

impl ArchiveSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let compression = Compression::from_path(&path);
        Self { path, compression }
    }
}

impl FileSource for ArchiveSource {
    fn open(&self, rel: &str) -> Result<Option<Vec<u8>>> {
        let mut archive = archive::open_reader(&self.path, self.compression)?;
        for entry in archive.entries()? {
            let mut entry = entry?;
            if entry.path()?.as_ref() == Path::new(rel) {
                let mut bytes = Vec::with_capacity(entry.size() as usize);
                entry.read_to_end(&mut bytes)?;
                return Ok(Some(bytes));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dir_source_reads_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("launcher-3")).unwrap();
        std::fs::write(dir.path().join("launcher-3/a.desktop"), b"hello").unwrap();

        let source = DirSource::new(dir.path());
        assert_eq!(
            source.open("launcher-3/a.desktop").unwrap(),
            Some(b"hello".to_vec())
        );
    }

    #[test]
    fn test_dir_source_missing_file_is_none_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = DirSource::new(dir.path());
        assert_eq!(source.open("netload-7.rc").unwrap(), None);
    }
}
