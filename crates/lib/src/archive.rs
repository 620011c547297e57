//! Distribution archives.
//!
//! Runners bundle their outputs into either a gzip-compressed tarball or a zip
//! file. Every entry is stored under a single top-level prefix directory
//! (`<prefix>/<entry>`), so an extracted archive never scatters files into
//! the current directory.

use std::fs::{self, File};
use std::io::{self, Seek, Write};
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;
use thiserror::Error;
use tracing::{debug, info};
use zip::write::SimpleFileOptions;

/// Errors while building an archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
  #[error("failed to read archive entry {path}: {source}")]
  Entry {
    path: String,
    #[source]
    source: io::Error,
  },

  #[error("io error: {0}")]
  Io(#[from] io::Error),

  #[error("zip error: {0}")]
  Zip(#[from] zip::result::ZipError),
}

/// Archive container format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
  TarGz,
  Zip,
}

impl ArchiveFormat {
  /// File extension without the leading dot.
  pub fn extension(&self) -> &'static str {
    match self {
      ArchiveFormat::TarGz => "tar.gz",
      ArchiveFormat::Zip => "zip",
    }
  }

  /// `<prefix>.<extension>`
  pub fn file_name(&self, prefix: &str) -> String {
    format!("{}.{}", prefix, self.extension())
  }
}

/// Write `entries` (relative to `dir`) as a `.tar.gz` stream into `out`.
///
/// Entries that are not regular files are skipped.
pub fn tar_gzip<W: Write>(dir: &Path, prefix: &str, entries: &[String], out: W) -> Result<(), ArchiveError> {
  let gz = GzEncoder::new(out, Compression::default());
  let mut builder = tar::Builder::new(gz);

  for entry in entries {
    let path = dir.join(entry);
    if !is_regular(&path)? {
      continue;
    }
    let name = format!("{}/{}", prefix, entry);
    debug!(%name, "adding tar entry");
    builder
      .append_path_with_name(&path, &name)
      .map_err(|source| ArchiveError::Entry {
        path: path.display().to_string(),
        source,
      })?;
  }

  builder.into_inner()?.finish()?;
  Ok(())
}

/// Write `entries` (relative to `dir`) as a deflated zip stream into `out`.
///
/// Entries that are not regular files are skipped.
pub fn zip_files<W: Write + Seek>(dir: &Path, prefix: &str, entries: &[String], out: W) -> Result<(), ArchiveError> {
  let mut zw = zip::ZipWriter::new(out);

  for entry in entries {
    let path = dir.join(entry);
    if !is_regular(&path)? {
      continue;
    }
    let name = format!("{}/{}", prefix, entry);
    debug!(%name, "adding zip entry");

    let mut options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    #[cfg(unix)]
    {
      use std::os::unix::fs::PermissionsExt;
      options = options.unix_permissions(fs::metadata(&path)?.permissions().mode());
    }

    zw.start_file(name, options)?;
    let mut file = File::open(&path).map_err(|source| ArchiveError::Entry {
      path: path.display().to_string(),
      source,
    })?;
    io::copy(&mut file, &mut zw)?;
  }

  zw.finish()?;
  Ok(())
}

/// Create `<out_dir>/<prefix>.<ext>` from `entries` (relative to `dir`) and
/// return the archive file name.
pub fn write_archive(
  format: ArchiveFormat,
  dir: &Path,
  out_dir: &Path,
  prefix: &str,
  entries: &[String],
) -> Result<String, ArchiveError> {
  let file_name = format.file_name(prefix);
  let out_path: PathBuf = out_dir.join(&file_name);
  let file = File::create(&out_path)?;

  match format {
    ArchiveFormat::TarGz => tar_gzip(dir, prefix, entries, file)?,
    ArchiveFormat::Zip => zip_files(dir, prefix, entries, file)?,
  }

  info!(archive = %out_path.display(), entries = entries.len(), "archive written");
  Ok(file_name)
}

fn is_regular(path: &Path) -> Result<bool, ArchiveError> {
  let meta = fs::metadata(path).map_err(|source| ArchiveError::Entry {
    path: path.display().to_string(),
    source,
  })?;
  Ok(meta.is_file())
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::BTreeMap;
  use std::io::{Cursor, Read};
  use tempfile::tempdir;

  fn fixture() -> (tempfile::TempDir, Vec<String>) {
    let temp = tempdir().unwrap();
    fs::write(temp.path().join("tool"), b"\x7fELF binary bytes").unwrap();
    fs::write(temp.path().join("license.txt"), "MIT").unwrap();
    fs::create_dir(temp.path().join("subdir")).unwrap();
    let entries = vec!["tool".to_string(), "license.txt".to_string(), "subdir".to_string()];
    (temp, entries)
  }

  #[test]
  fn tar_gzip_round_trip() {
    let (temp, entries) = fixture();
    let mut buf = Vec::new();
    tar_gzip(temp.path(), "tool-linux-amd64-1.0", &entries, &mut buf).unwrap();

    let mut archive = tar::Archive::new(flate2::read::GzDecoder::new(&buf[..]));
    let mut files = BTreeMap::new();
    for entry in archive.entries().unwrap() {
      let mut entry = entry.unwrap();
      let name = entry.path().unwrap().to_string_lossy().into_owned();
      let mut content = Vec::new();
      entry.read_to_end(&mut content).unwrap();
      files.insert(name, content);
    }

    assert_eq!(files.len(), 2, "directories are skipped");
    assert_eq!(files["tool-linux-amd64-1.0/tool"], b"\x7fELF binary bytes");
    assert_eq!(files["tool-linux-amd64-1.0/license.txt"], b"MIT");
  }

  #[test]
  fn zip_round_trip() {
    let (temp, entries) = fixture();
    let mut buf = Cursor::new(Vec::new());
    zip_files(temp.path(), "tool-windows-386-1.0", &entries, &mut buf).unwrap();

    let mut archive = zip::ZipArchive::new(Cursor::new(buf.into_inner())).unwrap();
    assert_eq!(archive.len(), 2);

    let mut content = Vec::new();
    archive
      .by_name("tool-windows-386-1.0/tool")
      .unwrap()
      .read_to_end(&mut content)
      .unwrap();
    assert_eq!(content, b"\x7fELF binary bytes");
  }

  #[test]
  fn missing_entry_is_an_error() {
    let temp = tempdir().unwrap();
    let err = tar_gzip(temp.path(), "p", &["nope".to_string()], Vec::new()).unwrap_err();
    assert!(matches!(err, ArchiveError::Entry { .. }));
  }

  #[test]
  fn write_archive_names_file_after_prefix() {
    let (temp, entries) = fixture();
    let out = tempdir().unwrap();
    let name = write_archive(ArchiveFormat::Zip, temp.path(), out.path(), "tool-1.0", &entries).unwrap();
    assert_eq!(name, "tool-1.0.zip");
    assert!(out.path().join("tool-1.0.zip").is_file());
  }
}
