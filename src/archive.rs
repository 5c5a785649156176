//! Per-bucket archive construction.
//!
//! Stage 3 of the packaging pipeline. For a bucket that needs rebuilding,
//! [`build_archive`] stages the bucket's files into a [`ScratchArea`] at their
//! relative paths, compresses the scratch area into one zip, then
//! fingerprints the finished archive.
//!
//! ## Scratch area
//!
//! The scratch directory is emptied when acquired and again when released,
//! so nothing from one bucket can leak into the next bucket's archive. A
//! [`ScratchArea`] is owned by exactly one `build_archive` call; buckets are
//! therefore built one after another, never concurrently.
//!
//! ## Archive format
//!
//! - Deflate compression, no encryption.
//! - Only files are stored; directories are implied by entry paths.
//! - Entry names are `/`-separated and sorted.
//! - Every entry carries the zip epoch (1980-01-01 00:00) as its timestamp.
//!
//! The last two make the output byte-identical for identical input, so the
//! archive fingerprint changes only when the packaged content does.
//!
//! ## Failure
//!
//! Any copy or write error aborts the build. A half-written archive is left
//! in place; the next successful run overwrites it.

use crate::classify::FileEntry;
use crate::fingerprint::fingerprint_file;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Invalid archive path: {0}")]
    InvalidPath(String),
}

/// A produced archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltArchive {
    /// File name, e.g. `checkout_high.zip`.
    pub name: String,
    pub path: PathBuf,
    pub fingerprint: String,
    pub file_count: usize,
}

/// A staging directory held for the duration of one archive build.
///
/// Emptied on [`acquire`](Self::acquire) and on [`release`](Self::release).
/// Dropping an unreleased area (e.g. on an error path) empties it best-effort.
#[derive(Debug)]
pub struct ScratchArea {
    path: PathBuf,
    released: bool,
}

impl ScratchArea {
    pub fn acquire(path: &Path) -> io::Result<Self> {
        empty_dir(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            released: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copy every entry to `<scratch>/<archive path>`.
    ///
    /// Two entries resolving to the same archive path are an error.
    pub fn stage(&self, files: &[FileEntry]) -> Result<(), ArchiveError> {
        let mut seen = HashSet::new();
        for file in files {
            let relative = checked_relative(file.archive_path())?;
            if !seen.insert(relative) {
                return Err(ArchiveError::InvalidPath(format!(
                    "{} (duplicate archive path)",
                    file.archive_path()
                )));
            }
            let target = self.path.join(relative);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(&file.absolute_path, &target)?;
        }
        Ok(())
    }

    pub fn release(mut self) -> io::Result<()> {
        self.released = true;
        empty_dir(&self.path)
    }
}

impl Drop for ScratchArea {
    fn drop(&mut self) {
        if !self.released
            && let Err(e) = empty_dir(&self.path)
        {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to clear scratch area");
        }
    }
}

/// Build `<dest_dir>/<archive_name>` from a bucket's files.
pub fn build_archive(
    files: &[FileEntry],
    scratch_dir: &Path,
    dest_dir: &Path,
    archive_name: &str,
) -> Result<BuiltArchive, ArchiveError> {
    let archive_path = dest_dir.join(archive_name);

    let scratch = ScratchArea::acquire(scratch_dir)?;
    scratch.stage(files)?;
    let file_count = write_zip(scratch.path(), &archive_path)?;
    scratch.release()?;

    let fingerprint = fingerprint_file(&archive_path)?;
    tracing::debug!(archive = archive_name, %fingerprint, file_count, "archive written");

    Ok(BuiltArchive {
        name: archive_name.to_string(),
        path: archive_path,
        fingerprint,
        file_count,
    })
}

/// Compress every file under `src_dir` into a zip at `dest`, overwriting any
/// existing file. Returns the number of entries written.
pub fn write_zip(src_dir: &Path, dest: &Path) -> Result<usize, ArchiveError> {
    let mut entries = Vec::new();
    for entry in WalkDir::new(src_dir) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(src_dir) else {
            continue;
        };
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        entries.push((name, entry.into_path()));
    }
    entries.sort();

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut zip = ZipWriter::new(BufWriter::new(File::create(dest)?));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default());

    for (name, path) in &entries {
        zip.start_file(name.as_str(), options)?;
        let mut source = File::open(path)?;
        io::copy(&mut source, &mut zip)?;
    }

    let mut writer = zip.finish()?;
    writer.flush()?;
    Ok(entries.len())
}

/// Empty a directory, creating it if needed. The directory itself stays.
pub(crate) fn empty_dir(path: &Path) -> io::Result<()> {
    if !path.exists() {
        return fs::create_dir_all(path);
    }
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            fs::remove_dir_all(entry.path())?;
        } else {
            fs::remove_file(entry.path())?;
        }
    }
    Ok(())
}

/// Reject archive paths that would land outside the scratch area.
fn checked_relative(path: &str) -> Result<&Path, ArchiveError> {
    let p = Path::new(path);
    let escapes = p.as_os_str().is_empty()
        || p
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(ArchiveError::InvalidPath(format!(
            "{path} (escapes the staging area)"
        )));
    }
    Ok(p)
}
