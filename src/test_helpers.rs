//! Shared test utilities for the distpack test suite.
//!
//! Provides fixture setup, small tree builders, and classification lookups
//! that panic with a list of what *was* found, so a failing assertion says
//! more than "None".
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = setup_fixtures();
//! let c = classify(&tmp.path().join("dist")).unwrap();
//!
//! let index = find_entry(&c, Bucket::High, "index.html");
//! assert!(index.content_hash.is_some());
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::classify::{Bucket, Classification, FileEntry};

// =========================================================================
// Fixture setup
// =========================================================================

/// Copy `fixtures/dist/` to `<tmp>/dist` and return the temp project root.
///
/// Tests get an isolated copy they can mutate without affecting other tests
/// or the source fixtures.
pub fn setup_fixtures() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/dist");
    let dist = tmp.path().join("dist");
    fs::create_dir_all(&dist).unwrap();
    copy_dir_recursive(&fixtures, &dist).unwrap();
    tmp
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if src_path.is_dir() {
            fs::create_dir_all(&dst_path)?;
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

/// Write `(relative path, contents)` pairs under `root`, creating parents.
pub fn write_tree(root: &Path, files: &[(&str, &str)]) {
    for (rel, contents) in files {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, contents).unwrap();
    }
}

/// A `FileEntry` without touching the filesystem.
pub fn entry(relative_path: &str, content_hash: Option<&str>) -> FileEntry {
    FileEntry {
        absolute_path: PathBuf::from("/build").join(relative_path),
        relative_path: relative_path.to_string(),
        content_hash: content_hash.map(str::to_string),
        dest_path: None,
    }
}

/// Build a classification from `(bucket, entries)` groups. Buckets not
/// listed are absent, not empty.
pub fn classification(groups: Vec<(Bucket, Vec<FileEntry>)>) -> Classification {
    let mut c = Classification::default();
    for (bucket, entries) in groups {
        c.insert_bucket(bucket, entries);
    }
    c
}

// =========================================================================
// Classification lookups: panic listing what was available
// =========================================================================

/// Relative paths of a bucket in walk order.
pub fn relative_paths(c: &Classification, bucket: Bucket) -> Vec<&str> {
    c.files(bucket)
        .iter()
        .map(|f| f.relative_path.as_str())
        .collect()
}

/// Find an entry by relative path within a bucket. Panics if not found.
pub fn find_entry<'a>(c: &'a Classification, bucket: Bucket, rel: &str) -> &'a FileEntry {
    c.files(bucket)
        .iter()
        .find(|f| f.relative_path == rel)
        .unwrap_or_else(|| {
            let available = relative_paths(c, bucket);
            panic!("'{rel}' not found in bucket {bucket}. Available: {available:?}")
        })
}

/// Entry names of a zip archive, in archive order.
pub fn zip_entry_names(path: &Path) -> Vec<String> {
    let file = fs::File::open(path).unwrap();
    let archive = zip::ZipArchive::new(file).unwrap();
    archive.file_names().map(str::to_string).collect()
}

/// Read one entry of a zip archive as a string.
pub fn zip_entry_contents(path: &Path, name: &str) -> String {
    use std::io::Read;

    let file = fs::File::open(path).unwrap();
    let mut archive = zip::ZipArchive::new(file).unwrap();
    let mut entry = archive
        .by_name(name)
        .unwrap_or_else(|e| panic!("'{name}' not in {}: {e}", path.display()));
    let mut contents = String::new();
    entry.read_to_string(&mut contents).unwrap();
    contents
}
