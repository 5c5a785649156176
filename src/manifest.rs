//! Persisted run state: the classification manifest and archive fingerprints.
//!
//! Two JSON files live in the native output directory:
//!
//! - `module.json`: the full [`Classification`] of the last successful run,
//!   the baseline for the next run's change detection.
//! - `zips_content_hash.json`: archive file name → fingerprint, read by
//!   whatever downloads the archives.
//!
//! ```json
//! {
//!   "assets": [{ "absolutePath": "/p/dist/images/logo.svg",
//!                "relativePath": "images/logo.svg", "contentHash": "3f1a9c0e" }],
//!   "low":    [{ "absolutePath": "/p/dist/js/vendors~main.9b8e1d.js",
//!                "relativePath": "js/vendors~main.9b8e1d.js" }],
//!   "high":   [{ "absolutePath": "/p/dist/index.html",
//!                "relativePath": "index.html", "contentHash": "abc123de" }]
//! }
//! ```
//!
//! ## Missing vs malformed
//!
//! A missing `module.json` is a cold start: [`load_manifest`] returns
//! `Ok(None)` and every bucket is rebuilt. A file that exists but does not
//! parse is [`ManifestError::Malformed`], a hard error; pass `--no-cache` to
//! ignore it deliberately.
//!
//! ## Writes
//!
//! Both files are written to a `.tmp` sibling and renamed into place, so a
//! crash mid-write leaves the previous version intact.

use crate::classify::Classification;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Malformed {}: {source}", .path.display())]
    Malformed {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Archive file name → archive fingerprint.
pub type ArchiveHashes = BTreeMap<String, String>;

/// Load the previous run's classification. `Ok(None)` if there is none.
pub fn load_manifest(path: &Path) -> Result<Option<Classification>, ManifestError> {
    read_json(path)
}

pub fn save_manifest(path: &Path, classification: &Classification) -> Result<(), ManifestError> {
    write_json_atomic(path, classification)
}

/// Load the archive fingerprints written by the previous run.
pub fn load_archive_hashes(path: &Path) -> Result<Option<ArchiveHashes>, ManifestError> {
    read_json(path)
}

pub fn save_archive_hashes(path: &Path, hashes: &ArchiveHashes) -> Result<(), ManifestError> {
    write_json_atomic(path, hashes)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, ManifestError> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|source| ManifestError::Malformed {
            path: path.to_path_buf(),
            source,
        })
}

fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), ManifestError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value)?;
    let tmp = staging_path(path);
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
