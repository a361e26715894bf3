//! Portable snapshot archives.
//!
//! A snapshot is a tar container (optionally gzip- or bzip2-compressed,
//! chosen by the destination filename) holding a `config.txt` manifest —
//! one `<path> <value>` line per property, sorted by path — followed by
//! the dependent desktop and settings files embedded verbatim under their
//! relative names. The tar bytes are identical regardless of compression.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::source::FileSource;
use crate::store::PanelConfig;
use crate::value::PropertyValue;

pub const MANIFEST_NAME: &str = "config.txt";

/// Failures that mean the container itself is unusable. Unlike a garbled
/// manifest line (skipped) or a missing member (tolerated), these abort the
/// whole load.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("cannot open `{path}` as a panel archive: {reason}")]
    Unreadable { path: String, reason: String },
    #[error("`{path}` contains no config.txt manifest")]
    MissingManifest { path: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
    Bzip2,
}

impl Compression {
    /// Selected purely by filename suffix, like the formats users name
    /// their backups with: `.gz` → gzip, `.bz2` → bzip2, anything else
    /// is a plain tar.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("gz") => Compression::Gzip,
            Some("bz2") => Compression::Bzip2,
            _ => Compression::None,
        }
    }
}

/// Serialize a normalized store and its dependent files to `dest`.
///
/// `mtime` is stamped on every entry; passing a fixed value makes the
/// output byte-for-byte reproducible for identical stores.
pub fn write(
    config: &PanelConfig,
    source: &dyn FileSource,
    dest: &Path,
    mtime: u64,
) -> Result<()> {
    let mut builder = tar::Builder::new(Vec::new());
    append_entry(&mut builder, MANIFEST_NAME, manifest_text(config).as_bytes(), mtime)?;

    for rel in config.desktop_files.iter().chain(config.settings_files.iter()) {
        match source.open(rel)? {
            Some(bytes) => append_entry(&mut builder, rel, &bytes, mtime)?,
            None => warn!(file = %rel, "dependent file no longer in source, skipping"),
        }
    }

    let tar_bytes = builder
        .into_inner()
        .context("failed to finish tar stream")?;

    let file = File::create(dest)
        .context(format!("failed to create archive at {}", dest.display()))?;
    match Compression::from_path(dest) {
        Compression::None => {
            let mut file = file;
            file.write_all(&tar_bytes)
                .context("failed to write archive")?;
        }
        Compression::Gzip => {
            let mut encoder =
                flate2::write::GzEncoder::new(file, flate2::Compression::default());
            encoder
                .write_all(&tar_bytes)
                .context("failed to write archive")?;
            encoder.finish().context("failed to finish gzip stream")?;
        }
        Compression::Bzip2 => {
            let mut encoder = bzip2::write::BzEncoder::new(file, bzip2::Compression::default());
            encoder
                .write_all(&tar_bytes)
                .context("failed to write archive")?;
            encoder.finish().context("failed to finish bzip2 stream")?;
        }
    }
    Ok(())
}

/// Load the manifest from the archive at `path` into a fresh store.
///
/// Dependent files are left inside the archive; pair the result with an
/// `ArchiveSource` for on-demand access. Lines that do not split into a
/// path and a parseable value are skipped silently (best-effort recovery);
/// an unopenable container is an `ArchiveError`.
pub fn read(path: &Path) -> Result<PanelConfig> {
    let unreadable = |reason: String| ArchiveError::Unreadable {
        path: path.display().to_string(),
        reason,
    };

    let mut archive = open_reader(path, Compression::from_path(path))?;
    let entries = archive.entries().map_err(|e| unreadable(e.to_string()))?;
    for entry in entries {
        let mut entry = entry.map_err(|e| unreadable(e.to_string()))?;
        let is_manifest = entry
            .path()
            .map_err(|e| unreadable(e.to_string()))?
            .as_ref()
            == Path::new(MANIFEST_NAME);
        if is_manifest {
            let mut text = String::new();
            entry
                .read_to_string(&mut text)
                .map_err(|e| unreadable(e.to_string()))?;
            let mut config = PanelConfig::new();
            parse_manifest(&text, &mut config);
            return Ok(config);
        }
    }
    Err(ArchiveError::MissingManifest {
        path: path.display().to_string(),
    }
    .into())
}

/// Open `path` as a tar reader with the right decompression layered in.
pub(crate) fn open_reader(
    path: &Path,
    compression: Compression,
) -> Result<tar::Archive<Box<dyn Read>>> {
    let file = File::open(path).map_err(|e| ArchiveError::Unreadable {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    let reader: Box<dyn Read> = match compression {
        Compression::None => Box::new(file),
        Compression::Gzip => Box::new(flate2::read::GzDecoder::new(file)),
        Compression::Bzip2 => Box::new(bzip2::read::BzDecoder::new(file)),
    };
    Ok(tar::Archive::new(reader))
}

fn manifest_text(config: &PanelConfig) -> String {
    let lines: Vec<String> = config
        .iter()
        .map(|(path, value)| format!("{path} {}", value.to_text()))
        .collect();
    lines.join("\n")
}

fn parse_manifest(text: &str, config: &mut PanelConfig) {
    for line in text.lines() {
        let line = line.trim();
        let Some((path, value_text)) = line.split_once(' ') else {
            continue;
        };
        if path.is_empty() {
            continue;
        }
        match PropertyValue::parse(value_text) {
            Some(value) => config.set(path, value),
            None => debug!(line = %line, "skipping unparseable manifest line"),
        }
    }
}

fn append_entry(
    builder: &mut tar::Builder<Vec<u8>>,
    name: &str,
    bytes: &[u8],
    mtime: u64,
) -> Result<()> {
    let mut header = tar::Header::new_gnu();
    header.set_size(bytes.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(mtime);
    builder
        .append_data(&mut header, name, bytes)
        .context(format!("failed to append `{name}` to archive"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{ArchiveSource, DirSource};
    use std::collections::BTreeMap;
    use std::fs;

    fn sample_config() -> PanelConfig {
        let mut config = PanelConfig::new();
        config.set("/panels/panel-0/plugin-ids", PropertyValue::IntArray(vec![1, 5]));
        config.set("/plugins/plugin-1", PropertyValue::Str("clock".into()));
        config.set("/plugins/plugin-1/digital", PropertyValue::Bool(false));
        config.set("/plugins/plugin-5", PropertyValue::Str("launcher".into()));
        config.set(
            "/plugins/plugin-5/items",
            PropertyValue::StrArray(vec!["a.desktop".into()]),
        );
        config
    }

    fn properties(config: &PanelConfig) -> BTreeMap<String, PropertyValue> {
        config
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn write_sample(dest: &Path, with_desktop: bool) -> PanelConfig {
        let dir = tempfile::tempdir().unwrap();
        let mut config = sample_config();
        if with_desktop {
            fs::create_dir_all(dir.path().join("launcher-5")).unwrap();
            fs::write(dir.path().join("launcher-5/a.desktop"), b"[Desktop Entry]\nExec=/bin/sh\n").unwrap();
            config.desktop_files.push("launcher-5/a.desktop".to_string());
        }
        let source = DirSource::new(dir.path());
        write(&config, &source, dest, 1_700_000_000).unwrap();
        config
    }

    #[test]
    fn test_roundtrip_plain_tar() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("backup.tar");
        let written = write_sample(&dest, true);

        let loaded = read(&dest).unwrap();
        assert_eq!(properties(&loaded), properties(&written));

        let source = ArchiveSource::new(&dest);
        assert_eq!(
            source.open("launcher-5/a.desktop").unwrap(),
            Some(b"[Desktop Entry]\nExec=/bin/sh\n".to_vec())
        );
    }

    #[test]
    fn test_roundtrip_gzip() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("backup.tar.gz");
        let written = write_sample(&dest, false);
        let loaded = read(&dest).unwrap();
        assert_eq!(properties(&loaded), properties(&written));
    }

    #[test]
    fn test_roundtrip_bzip2() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("backup.tar.bz2");
        let written = write_sample(&dest, false);
        let loaded = read(&dest).unwrap();
        assert_eq!(properties(&loaded), properties(&written));
    }

    #[test]
    fn test_serialization_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let source = DirSource::new(dir.path());

        let mut forward = PanelConfig::new();
        forward.set("/a", PropertyValue::Int(1));
        forward.set("/b", PropertyValue::Int(2));
        let mut backward = PanelConfig::new();
        backward.set("/b", PropertyValue::Int(2));
        backward.set("/a", PropertyValue::Int(1));

        let dest_a = dir.path().join("a.tar");
        let dest_b = dir.path().join("b.tar");
        write(&forward, &source, &dest_a, 42).unwrap();
        write(&backward, &source, &dest_b, 42).unwrap();
        assert_eq!(fs::read(dest_a).unwrap(), fs::read(dest_b).unwrap());
    }

    #[test]
    fn test_manifest_lines_are_sorted_by_path() {
        let mut config = PanelConfig::new();
        config.set("/z", PropertyValue::Int(1));
        config.set("/a", PropertyValue::Int(2));
        let text = manifest_text(&config);
        assert_eq!(text, "/a 2\n/z 1");
    }

    #[test]
    fn test_bad_manifest_lines_are_skipped() {
        let mut config = PanelConfig::new();
        parse_manifest(
            "/good 'value'\nno-second-field\n/bad-value [1, oops]\n/also-good 7",
            &mut config,
        );
        assert_eq!(config.len(), 2);
        assert_eq!(config.get("/good"), Some(&PropertyValue::Str("value".into())));
        assert_eq!(config.get("/also-good"), Some(&PropertyValue::Int(7)));
    }

    #[test]
    fn test_unopenable_archive_is_a_distinct_error() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("garbage.tar.gz");
        fs::write(&dest, b"this is not a gzip stream at all").unwrap();

        let err = read(&dest).unwrap_err();
        assert!(err.downcast_ref::<ArchiveError>().is_some(), "got: {err:#}");
    }

    #[test]
    fn test_missing_archive_file_is_a_distinct_error() {
        let err = read(Path::new("/nonexistent/backup.tar")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ArchiveError>(),
            Some(ArchiveError::Unreadable { .. })
        ));
    }

    #[test]
    fn test_archive_without_manifest_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("empty.tar");
        let builder = tar::Builder::new(Vec::new());
        fs::write(&dest, builder.into_inner().unwrap()).unwrap();

        let err = read(&dest).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ArchiveError>(),
            Some(ArchiveError::MissingManifest { .. })
        ));
    }

    #[test]
    fn test_vanished_dependent_file_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let source = DirSource::new(dir.path());
        let mut config = sample_config();
        config.desktop_files.push("launcher-5/gone.desktop".to_string());

        let dest = dir.path().join("backup.tar");
        write(&config, &source, &dest, 0).unwrap();

        let archive_source = ArchiveSource::new(&dest);
        assert_eq!(archive_source.open("launcher-5/gone.desktop").unwrap(), None);
    }
}
