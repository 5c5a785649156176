//! End-to-end packaging runs.
//!
//! A [`Packager`] owns the resolved [`Layout`] for one project and exposes the
//! two post-build operations:
//!
//! - [`publish_web`](Packager::publish_web): replace `<production>/web/` with
//!   a full copy of the build output.
//! - [`package_native`](Packager::package_native): classify → detect changes
//!   → rebuild changed archives → persist manifest and archive fingerprints.
//!
//! ## Run semantics
//!
//! Buckets are handled one at a time in [`Bucket::ALL`] order. For each
//! bucket:
//!
//! | Files | Decision | Archive on disk | Result |
//! |-------|----------|-----------------|--------|
//! | none | any | removed if present | [`ArchiveStatus::Empty`] |
//! | some | rebuild | overwritten | [`ArchiveStatus::Built`] |
//! | some | skip | present | [`ArchiveStatus::Kept`], fingerprint re-read |
//! | some | skip | missing | rebuilt with [`ChangeReason::ArchiveMissing`] |
//!
//! `module.json` and `zips_content_hash.json` are written only after every
//! bucket succeeded. A failed run leaves the previous manifest in place, but
//! archives written before the failure stay on disk: treat the output
//! directory as unknown after any error.

use crate::archive::{self, ArchiveError, build_archive};
use crate::classify::{Bucket, Classification, ClassifyError, classify};
use crate::config::{Layout, PackConfig};
use crate::detect::{ChangeReason, ChangeSet, detect_changes};
use crate::fingerprint::fingerprint_file;
use crate::manifest::{self, ArchiveHashes, ManifestError};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum PackageError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Classification failed: {0}")]
    Classify(#[from] ClassifyError),
    #[error("Archive failed: {0}")]
    Archive(#[from] ArchiveError),
    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),
    #[error("Build output directory not found: {0}")]
    MissingBuild(PathBuf),
}

/// What happened to one bucket's archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveStatus {
    Built { name: String, fingerprint: String },
    Kept { name: String, fingerprint: String },
    /// The bucket has no files, so there is no archive.
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketReport {
    pub bucket: Bucket,
    pub file_count: usize,
    pub reason: ChangeReason,
    pub status: ArchiveStatus,
}

/// Result of [`Packager::package_native`].
#[derive(Debug, Clone)]
pub struct NativeReport {
    pub buckets: Vec<BucketReport>,
    pub classification: Classification,
    pub archive_hashes: ArchiveHashes,
    pub native_dir: PathBuf,
}

impl NativeReport {
    pub fn built(&self) -> usize {
        self.count(|s| matches!(s, ArchiveStatus::Built { .. }))
    }

    pub fn kept(&self) -> usize {
        self.count(|s| matches!(s, ArchiveStatus::Kept { .. }))
    }

    pub fn empty(&self) -> usize {
        self.count(|s| matches!(s, ArchiveStatus::Empty))
    }

    fn count(&self, pred: impl Fn(&ArchiveStatus) -> bool) -> usize {
        self.buckets.iter().filter(|b| pred(&b.status)).count()
    }
}

/// Result of [`Packager::publish_web`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebReport {
    pub web_dir: PathBuf,
    pub file_count: usize,
}

pub struct Packager {
    layout: Layout,
}

impl Packager {
    pub fn new(root: &Path, config: &PackConfig) -> Self {
        Self {
            layout: Layout::new(root, config),
        }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Classify the build output without writing anything.
    pub fn classify(&self) -> Result<Classification, PackageError> {
        Ok(classify(&self.layout.build)?)
    }

    /// Replace the web output directory with a copy of the build output.
    pub fn publish_web(&self) -> Result<WebReport, PackageError> {
        let build = &self.layout.build;
        if !build.is_dir() {
            return Err(PackageError::MissingBuild(build.clone()));
        }
        tracing::info!(
            from = %build.display(),
            to = %self.layout.web.display(),
            "publishing web files"
        );

        archive::empty_dir(&self.layout.web)?;
        let mut file_count = 0;
        for entry in WalkDir::new(build).follow_links(true) {
            let entry = entry?;
            let Ok(relative) = entry.path().strip_prefix(build) else {
                continue;
            };
            let target = self.layout.web.join(relative);
            if entry.file_type().is_dir() {
                fs::create_dir_all(&target)?;
            } else if entry.file_type().is_file() {
                fs::copy(entry.path(), &target)?;
                file_count += 1;
            }
        }

        Ok(WebReport {
            web_dir: self.layout.web.clone(),
            file_count,
        })
    }

    /// Build the per-bucket archives that changed and persist run state.
    ///
    /// With `use_cache = false` the previous manifest is not read at all and
    /// every bucket is rebuilt.
    pub fn package_native(&self, use_cache: bool) -> Result<NativeReport, PackageError> {
        let layout = &self.layout;
        let classification = classify(&layout.build)?;
        tracing::info!(
            module = layout.module_name(),
            files = classification.len(),
            "classified build output"
        );

        let previous = if use_cache {
            manifest::load_manifest(&layout.manifest)?
        } else {
            None
        };
        let previous_hashes = if use_cache {
            previous_archive_hashes(layout)
        } else {
            ArchiveHashes::new()
        };
        let mut changes = detect_changes(&classification, previous.as_ref());

        let mut buckets = Vec::new();
        let mut archive_hashes = ArchiveHashes::new();

        for bucket in Bucket::ALL {
            let files = classification.files(bucket);
            let name = layout.archive_name(bucket);
            let archive_path = layout.archive_path(bucket);

            if files.is_empty() {
                if archive_path.exists() {
                    tracing::debug!(archive = %name, "removing archive of empty bucket");
                    fs::remove_file(&archive_path)?;
                }
                buckets.push(BucketReport {
                    bucket,
                    file_count: 0,
                    reason: reason_of(&changes, bucket),
                    status: ArchiveStatus::Empty,
                });
                continue;
            }

            if !changes.needs_rebuild(bucket) && !archive_path.is_file() {
                changes.set_reason(bucket, ChangeReason::ArchiveMissing);
            }
            let reason = reason_of(&changes, bucket);
            log_reason(bucket, &reason);

            let status = if changes.needs_rebuild(bucket) {
                tracing::info!(%bucket, files = files.len(), %reason, "building archive");
                let built = build_archive(files, &layout.scratch, &layout.native, &name)?;
                match previous_hashes.get(&name) {
                    Some(old) if *old == built.fingerprint => {
                        tracing::debug!(archive = %name, "rebuilt archive is identical");
                    }
                    Some(old) => {
                        tracing::info!(
                            archive = %name,
                            from = %old,
                            to = %built.fingerprint,
                            "archive fingerprint changed"
                        );
                    }
                    None => {}
                }
                ArchiveStatus::Built {
                    name: built.name,
                    fingerprint: built.fingerprint,
                }
            } else {
                ArchiveStatus::Kept {
                    fingerprint: fingerprint_file(&archive_path)?,
                    name,
                }
            };

            match &status {
                ArchiveStatus::Built { name, fingerprint }
                | ArchiveStatus::Kept { name, fingerprint } => {
                    archive_hashes.insert(name.clone(), fingerprint.clone());
                }
                ArchiveStatus::Empty => {}
            }
            buckets.push(BucketReport {
                bucket,
                file_count: files.len(),
                reason,
                status,
            });
        }

        manifest::save_manifest(&layout.manifest, &classification)?;
        manifest::save_archive_hashes(&layout.archive_hashes, &archive_hashes)?;

        Ok(NativeReport {
            buckets,
            classification,
            archive_hashes,
            native_dir: layout.native.clone(),
        })
    }
}

/// Fingerprints from the last run, used only for logging. An unreadable file
/// is logged and treated as empty; it is rewritten at the end of the run.
fn previous_archive_hashes(layout: &Layout) -> ArchiveHashes {
    match manifest::load_archive_hashes(&layout.archive_hashes) {
        Ok(hashes) => hashes.unwrap_or_default(),
        Err(e) => {
            tracing::warn!(error = %e, "ignoring unreadable archive fingerprints");
            ArchiveHashes::new()
        }
    }
}

fn reason_of(changes: &ChangeSet, bucket: Bucket) -> ChangeReason {
    changes
        .reason(bucket)
        .cloned()
        .unwrap_or(ChangeReason::ColdStart)
}

fn log_reason(bucket: Bucket, reason: &ChangeReason) {
    match reason {
        ChangeReason::PathsChanged { added, removed } => {
            tracing::debug!(%bucket, ?added, ?removed, "file set changed");
        }
        ChangeReason::ContentChanged {
            path,
            previous,
            current,
        } => {
            tracing::debug!(%bucket, %path, ?previous, ?current, "content changed");
        }
        other => tracing::debug!(%bucket, reason = %other),
    }
}
