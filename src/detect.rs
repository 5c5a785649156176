//! Per-bucket change detection.
//!
//! Stage 2 of the packaging pipeline. [`detect_changes`] is a pure function
//! from the current [`Classification`] and the previous run's manifest to a
//! [`ChangeSet`]: one [`Decision`] per bucket, each with the
//! [`ChangeReason`] that produced it. No filesystem access happens here.
//!
//! ## Policy
//!
//! Every bucket is rebuilt unless all of these hold:
//!
//! 1. A previous manifest exists (otherwise: cold start).
//! 2. It has an entry for the bucket.
//! 3. The bucket's file count is unchanged.
//! 4. The set of relative paths is identical. Order does not matter.
//! 5. Every content-compared file present in both snapshots has the same
//!    fingerprint. The first mismatch, in previous-manifest order, decides.
//!
//! Which files are content-compared depends on the bucket:
//!
//! | Bucket | Compared |
//! |--------|----------|
//! | `assets` | every file |
//! | `low` | none |
//! | `high` | `.html` entry documents only |
//!
//! Scripts and styles are never content-compared: their generated names
//! embed a content hash, so an edit surfaces as a renamed file and rule 4
//! catches it. HTML entry documents and images keep stable names, hence
//! rule 5.

use crate::classify::{Bucket, Classification, FileEntry};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// What to do with one bucket's archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Skip,
    Rebuild,
}

/// Why a bucket got its [`Decision`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeReason {
    /// No previous manifest, or it was deliberately ignored.
    ColdStart,
    /// The previous manifest has no entry for this bucket.
    MissingBucket,
    CountChanged {
        previous: usize,
        current: usize,
    },
    PathsChanged {
        added: Vec<String>,
        removed: Vec<String>,
    },
    ContentChanged {
        path: String,
        previous: Option<String>,
        current: Option<String>,
    },
    /// Nothing changed, but the archive from the last run is gone.
    ArchiveMissing,
    Unchanged,
}

impl ChangeReason {
    pub fn decision(&self) -> Decision {
        match self {
            ChangeReason::Unchanged => Decision::Skip,
            _ => Decision::Rebuild,
        }
    }
}

impl fmt::Display for ChangeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeReason::ColdStart => write!(f, "no previous manifest"),
            ChangeReason::MissingBucket => write!(f, "not in previous manifest"),
            ChangeReason::CountChanged { previous, current } => {
                write!(f, "{} → {} files", previous, current)
            }
            ChangeReason::PathsChanged { added, removed } => {
                write!(f, "{} added, {} removed", added.len(), removed.len())
            }
            ChangeReason::ContentChanged { path, .. } => write!(f, "{} changed", path),
            ChangeReason::ArchiveMissing => write!(f, "archive missing"),
            ChangeReason::Unchanged => write!(f, "unchanged"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketChange {
    pub bucket: Bucket,
    pub reason: ChangeReason,
}

impl BucketChange {
    pub fn decision(&self) -> Decision {
        self.reason.decision()
    }
}

/// Decisions for all three buckets, in [`Bucket::ALL`] order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSet {
    changes: Vec<BucketChange>,
}

impl ChangeSet {
    /// Every bucket marked for rebuild with the same reason.
    pub fn all(reason: ChangeReason) -> Self {
        Self {
            changes: Bucket::ALL
                .iter()
                .map(|&bucket| BucketChange {
                    bucket,
                    reason: reason.clone(),
                })
                .collect(),
        }
    }

    /// Decision for a bucket. Rebuild is the default.
    pub fn decision(&self, bucket: Bucket) -> Decision {
        self.reason(bucket)
            .map(ChangeReason::decision)
            .unwrap_or(Decision::Rebuild)
    }

    pub fn needs_rebuild(&self, bucket: Bucket) -> bool {
        self.decision(bucket) == Decision::Rebuild
    }

    pub fn reason(&self, bucket: Bucket) -> Option<&ChangeReason> {
        self.changes
            .iter()
            .find(|c| c.bucket == bucket)
            .map(|c| &c.reason)
    }

    /// Replace a bucket's reason, e.g. to force a rebuild the pure comparison
    /// could not see.
    pub fn set_reason(&mut self, bucket: Bucket, reason: ChangeReason) {
        match self.changes.iter_mut().find(|c| c.bucket == bucket) {
            Some(change) => change.reason = reason,
            None => self.changes.push(BucketChange { bucket, reason }),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &BucketChange> {
        self.changes.iter()
    }
}

/// Compare the current classification against the previous manifest.
pub fn detect_changes(current: &Classification, previous: Option<&Classification>) -> ChangeSet {
    let Some(previous) = previous else {
        return ChangeSet::all(ChangeReason::ColdStart);
    };

    ChangeSet {
        changes: Bucket::ALL
            .iter()
            .map(|&bucket| BucketChange {
                bucket,
                reason: compare_bucket(
                    bucket,
                    current.files(bucket),
                    previous.bucket(bucket),
                ),
            })
            .collect(),
    }
}

fn compare_bucket(
    bucket: Bucket,
    current: &[FileEntry],
    previous: Option<&[FileEntry]>,
) -> ChangeReason {
    let Some(previous) = previous else {
        return ChangeReason::MissingBucket;
    };

    if previous.len() != current.len() {
        return ChangeReason::CountChanged {
            previous: previous.len(),
            current: current.len(),
        };
    }

    let before: BTreeSet<&str> = previous.iter().map(|f| f.relative_path.as_str()).collect();
    let after: BTreeSet<&str> = current.iter().map(|f| f.relative_path.as_str()).collect();
    if before != after {
        return ChangeReason::PathsChanged {
            added: after.difference(&before).map(|s| s.to_string()).collect(),
            removed: before.difference(&after).map(|s| s.to_string()).collect(),
        };
    }

    compare_content(bucket, current, previous).unwrap_or(ChangeReason::Unchanged)
}

fn is_content_compared(bucket: Bucket, file: &FileEntry) -> bool {
    match bucket {
        Bucket::Assets => true,
        Bucket::Low => false,
        Bucket::High => file.is_html(),
    }
}

/// First compared file, in previous-manifest order, whose fingerprint differs.
fn compare_content(
    bucket: Bucket,
    current: &[FileEntry],
    previous: &[FileEntry],
) -> Option<ChangeReason> {
    let current_by_path: HashMap<&str, &FileEntry> = current
        .iter()
        .filter(|f| is_content_compared(bucket, f))
        .map(|f| (f.relative_path.as_str(), f))
        .collect();

    previous
        .iter()
        .filter(|f| is_content_compared(bucket, f))
        .find_map(|before| {
            let after = current_by_path.get(before.relative_path.as_str())?;
            (after.content_hash != before.content_hash).then(|| ChangeReason::ContentChanged {
                path: before.relative_path.clone(),
                previous: before.content_hash.clone(),
                current: after.content_hash.clone(),
            })
        })
}
