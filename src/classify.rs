//! Build-output classification.
//!
//! Stage 1 of the packaging pipeline. Walks the build output directory and
//! sorts every regular file into one of three [`Bucket`]s, each of which ships
//! as its own archive:
//!
//! | Bucket | Contents | Changes when |
//! |--------|----------|--------------|
//! | `assets` | everything under an `images/` or `fonts/` directory, at any depth | any file's bytes change |
//! | `low` | code-split vendor and runtime chunks (`vendor-*`, `vendors~*`, `runtime-*`, `runtimes~*`) | dependencies are upgraded |
//! | `high` | everything else: entry HTML, application scripts and styles | every release |
//!
//! ## Rules
//!
//! First match wins:
//!
//! 1. Any ancestor directory (below the root) named `images` or `fonts` puts
//!    the file in `assets`. Its content is fingerprinted.
//! 2. A base name (last extension stripped) of one or more `vendor` or
//!    `runtime` repetitions followed by `-` or `s~` puts the file in `low`.
//! 3. Everything else is `high`. Only `.html` files are fingerprinted here:
//!    scripts and styles already carry a content hash in their generated
//!    names, so a content change shows up as a new path.
//!
//! ## Ordering
//!
//! Directory entries are visited sorted by file name, so classifying the same
//! tree twice yields identical bucket sequences. Fingerprints are computed in
//! parallel after the walk without disturbing that order.

use crate::fingerprint::fingerprint_file;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ClassifyError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Build output directory not found: {0}")]
    MissingRoot(PathBuf),
}

/// Directory names that put every file beneath them in the `assets` bucket.
const ASSET_DIRS: &[&str] = &["images", "fonts"];

/// Chunk-name prefixes produced by code splitting for third-party code.
const LOW_PRIORITY_PREFIXES: &[&str] = &["vendor", "runtime"];

/// One of the three archive groups.
///
/// Ordering follows [`Bucket::ALL`]; it is also the key order in the
/// persisted manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    Assets,
    Low,
    High,
}

impl Bucket {
    pub const ALL: [Bucket; 3] = [Bucket::Assets, Bucket::Low, Bucket::High];

    pub fn as_str(self) -> &'static str {
        match self {
            Bucket::Assets => "assets",
            Bucket::Low => "low",
            Bucket::High => "high",
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified file.
///
/// Serialized with camelCase keys; `module.json` consumers read
/// `absolutePath`, `relativePath` and `contentHash`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    /// Location at classification time.
    pub absolute_path: PathBuf,
    /// `/`-separated path relative to the build root. Identity across runs.
    pub relative_path: String,
    /// Content fingerprint, for asset files and HTML entry documents only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    /// Path inside the archive when it differs from `relative_path`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dest_path: Option<String>,
}

impl FileEntry {
    pub fn is_html(&self) -> bool {
        Path::new(&self.relative_path)
            .extension()
            .is_some_and(|ext| ext == "html")
    }

    /// Where this file lands inside its archive.
    pub fn archive_path(&self) -> &str {
        self.dest_path.as_deref().unwrap_or(&self.relative_path)
    }
}

/// Bucket → files, in walk order.
///
/// A fresh classification always has all three buckets (possibly empty). A
/// manifest loaded from disk may lack some, which change detection treats
/// differently from an empty bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Classification {
    buckets: BTreeMap<Bucket, Vec<FileEntry>>,
}

impl Classification {
    /// All three buckets present and empty.
    pub fn empty() -> Self {
        Self {
            buckets: Bucket::ALL.iter().map(|&b| (b, Vec::new())).collect(),
        }
    }

    /// Files of a bucket, or `None` if the bucket is absent altogether.
    pub fn bucket(&self, bucket: Bucket) -> Option<&[FileEntry]> {
        self.buckets.get(&bucket).map(Vec::as_slice)
    }

    /// Files of a bucket; an absent bucket reads as empty.
    pub fn files(&self, bucket: Bucket) -> &[FileEntry] {
        self.bucket(bucket).unwrap_or_default()
    }

    pub fn push(&mut self, bucket: Bucket, entry: FileEntry) {
        self.buckets.entry(bucket).or_default().push(entry);
    }

    /// Insert or replace a whole bucket.
    pub fn insert_bucket(&mut self, bucket: Bucket, files: Vec<FileEntry>) {
        self.buckets.insert(bucket, files);
    }

    /// Total number of files across all buckets.
    pub fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Present buckets in [`Bucket::ALL`] order.
    pub fn iter(&self) -> impl Iterator<Item = (Bucket, &[FileEntry])> {
        self.buckets.iter().map(|(&b, files)| (b, files.as_slice()))
    }
}

/// Classify every regular file under `root`.
pub fn classify(root: &Path) -> Result<Classification, ClassifyError> {
    if !root.is_dir() {
        return Err(ClassifyError::MissingRoot(root.to_path_buf()));
    }

    let mut pending = Vec::new();
    // Links are followed so a symlink is classified as whatever it points to.
    for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let bucket = bucket_for(relative);
        let fingerprinted = match bucket {
            Bucket::Assets => true,
            Bucket::Low => false,
            Bucket::High => relative.extension().is_some_and(|ext| ext == "html"),
        };
        pending.push((
            bucket,
            fingerprinted,
            FileEntry {
                absolute_path: entry.path().to_path_buf(),
                relative_path: to_slash_path(relative),
                content_hash: None,
                dest_path: None,
            },
        ));
    }

    let entries = pending
        .into_par_iter()
        .map(|(bucket, fingerprinted, mut entry)| {
            if fingerprinted {
                entry.content_hash = Some(fingerprint_file(&entry.absolute_path)?);
            }
            Ok((bucket, entry))
        })
        .collect::<Result<Vec<_>, io::Error>>()?;

    let mut classification = Classification::empty();
    for (bucket, entry) in entries {
        classification.push(bucket, entry);
    }
    Ok(classification)
}

/// Decide the bucket for a path relative to the build root.
pub fn bucket_for(relative: &Path) -> Bucket {
    if in_asset_context(relative) {
        return Bucket::Assets;
    }
    let base_name = relative
        .file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default();
    if is_low_priority_name(&base_name) {
        Bucket::Low
    } else {
        Bucket::High
    }
}

fn in_asset_context(relative: &Path) -> bool {
    relative.parent().is_some_and(|dir| {
        dir.components().any(|c| match c {
            Component::Normal(name) => ASSET_DIRS.iter().any(|d| name == *d),
            _ => false,
        })
    })
}

/// Whether a base name looks like a vendor or runtime chunk.
///
/// Matches one or more repetitions of the prefix followed by `-` or `s~`:
/// `vendor-react`, `vendors~main`, `runtime-main`, `runtimes~app`.
pub fn is_low_priority_name(base_name: &str) -> bool {
    LOW_PRIORITY_PREFIXES.iter().any(|prefix| {
        let mut rest = base_name;
        let mut repeats = 0;
        while let Some(stripped) = rest.strip_prefix(prefix) {
            rest = stripped;
            repeats += 1;
        }
        repeats > 0 && (rest.starts_with('-') || rest.starts_with("s~"))
    })
}

fn to_slash_path(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
