//! Packaging of the local Windows build scripts into a single zip archive.

use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::consts::SCRIPTS_ARCHIVE_KEY;

#[derive(Debug, Error)]
pub enum PackageError {
  #[error("build script directory not found: {0}")]
  MissingDir(PathBuf),

  #[error("build script directory {0} contains no files")]
  Empty(PathBuf),

  #[error("failed to walk {path}: {message}")]
  Walk { path: PathBuf, message: String },

  #[error("io error: {0}")]
  Io(#[from] io::Error),

  #[error("zip error: {0}")]
  Zip(#[from] zip::result::ZipError),

  #[error("packaging task did not complete: {0}")]
  Task(#[from] tokio::task::JoinError),
}

/// A packaged script archive. The file lives as long as this value.
#[derive(Debug)]
pub struct ScriptArchive {
  _dir: TempDir,
  path: PathBuf,
  files: usize,
}

impl ScriptArchive {
  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Number of regular files in the archive.
  pub fn file_count(&self) -> usize {
    self.files
  }
}

/// Zip every file under `dir`, with entry names relative to `dir`.
pub fn package_scripts(dir: &Path) -> Result<ScriptArchive, PackageError> {
  if !dir.is_dir() {
    return Err(PackageError::MissingDir(dir.to_path_buf()));
  }

  let out_dir = TempDir::new()?;
  let path = out_dir.path().join(SCRIPTS_ARCHIVE_KEY);
  let mut writer = ZipWriter::new(BufWriter::new(File::create(&path)?));
  let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
  let mut files = 0;

  for entry in WalkDir::new(dir).sort_by_file_name() {
    let entry = entry.map_err(|e| PackageError::Walk {
      path: dir.to_path_buf(),
      message: e.to_string(),
    })?;

    let rel = entry.path().strip_prefix(dir).unwrap_or(entry.path());
    if rel.as_os_str().is_empty() {
      continue;
    }
    // Zip entry names always use forward slashes.
    let name = rel
      .components()
      .map(|c| c.as_os_str().to_string_lossy())
      .collect::<Vec<_>>()
      .join("/");

    if entry.file_type().is_dir() {
      writer.add_directory(name, options)?;
    } else if entry.file_type().is_file() {
      debug!(entry = %name, "adding build script");
      writer.start_file(name, options)?;
      let mut source = File::open(entry.path())?;
      io::copy(&mut source, &mut writer)?;
      files += 1;
    }
  }

  writer.finish()?.into_inner().map_err(io::Error::from)?;

  if files == 0 {
    return Err(PackageError::Empty(dir.to_path_buf()));
  }

  Ok(ScriptArchive {
    _dir: out_dir,
    path,
    files,
  })
}

/// [`package_scripts`] on the blocking thread pool, off the async workers.
pub async fn package_scripts_blocking(dir: &Path) -> Result<ScriptArchive, PackageError> {
  let dir = dir.to_path_buf();
  tokio::task::spawn_blocking(move || package_scripts(&dir)).await?
}
