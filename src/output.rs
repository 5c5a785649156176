//! CLI output formatting for packaging runs.
//!
//! Output is bucket-centric: every bucket gets a header line with its file
//! count, followed by indented context lines. The same header shape is used
//! for `classify` and `native` so the two read as one inventory.
//!
//! # Output Format
//!
//! ## Classify
//!
//! ```text
//! assets (2 files)
//!     fonts/inter.woff2 [3f1a9c0e]
//!     images/logo.svg [77d0e1aa]
//! low (1 file)
//!     js/vendors~main.9b8e1d.js
//! high (0 files)
//! ```
//!
//! ## Native
//!
//! ```text
//! assets (2 files)
//!     Archive: app_assets.zip
//!     Status: built 1a2b3c4d (images/logo.svg changed)
//! low (1 file)
//!     Archive: app_low.zip
//!     Status: unchanged 9f8e7d6c
//! high (0 files)
//!     Status: empty, no archive
//!
//! Built 1, kept 1, empty 1 → dist_production/native
//! ```
//!
//! ## Web
//!
//! ```text
//! Published 13 files → dist_production/web
//! ```
//!
//! Each report has a `format_*` function (returns `Vec<String>`) and a
//! `print_*` wrapper that writes to stdout. Format functions do no I/O.

use crate::classify::{Bucket, Classification};
use crate::pipeline::{ArchiveStatus, BucketReport, NativeReport, WebReport};

fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// `assets (2 files)`, `low (1 file)`.
fn bucket_header(bucket: Bucket, count: usize) -> String {
    let noun = if count == 1 { "file" } else { "files" };
    format!("{bucket} ({count} {noun})")
}

// ============================================================================
// Classify
// ============================================================================

pub fn format_classification(classification: &Classification) -> Vec<String> {
    let mut lines = Vec::new();
    for bucket in Bucket::ALL {
        let files = classification.files(bucket);
        lines.push(bucket_header(bucket, files.len()));
        for file in files {
            match &file.content_hash {
                Some(hash) => lines.push(format!("{}{} [{hash}]", indent(1), file.relative_path)),
                None => lines.push(format!("{}{}", indent(1), file.relative_path)),
            }
        }
    }
    lines
}

pub fn print_classification(classification: &Classification) {
    for line in format_classification(classification) {
        println!("{line}");
    }
}

// ============================================================================
// Native
// ============================================================================

fn status_line(report: &BucketReport) -> String {
    match &report.status {
        ArchiveStatus::Built { fingerprint, .. } => {
            format!("{}Status: built {fingerprint} ({})", indent(1), report.reason)
        }
        ArchiveStatus::Kept { fingerprint, .. } => {
            format!("{}Status: unchanged {fingerprint}", indent(1))
        }
        ArchiveStatus::Empty => format!("{}Status: empty, no archive", indent(1)),
    }
}

pub fn format_native_report(report: &NativeReport) -> Vec<String> {
    let mut lines = Vec::new();
    for bucket in &report.buckets {
        lines.push(bucket_header(bucket.bucket, bucket.file_count));
        if let ArchiveStatus::Built { name, .. } | ArchiveStatus::Kept { name, .. } = &bucket.status
        {
            lines.push(format!("{}Archive: {name}", indent(1)));
        }
        lines.push(status_line(bucket));
    }
    lines.push(String::new());
    lines.push(format!(
        "Built {}, kept {}, empty {} → {}",
        report.built(),
        report.kept(),
        report.empty(),
        report.native_dir.display()
    ));
    lines
}

pub fn print_native_report(report: &NativeReport) {
    for line in format_native_report(report) {
        println!("{line}");
    }
}

// ============================================================================
// Web
// ============================================================================

pub fn format_web_report(report: &WebReport) -> Vec<String> {
    let noun = if report.file_count == 1 { "file" } else { "files" };
    vec![format!(
        "Published {} {noun} → {}",
        report.file_count,
        report.web_dir.display()
    )]
}

pub fn print_web_report(report: &WebReport) {
    for line in format_web_report(report) {
        println!("{line}");
    }
}
