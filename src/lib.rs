//! # distpack
//!
//! Post-build packaging for a web front-end that also ships inside a native
//! shell. The web bundler writes its output to `dist/`; distpack turns that
//! tree into two deliverables:
//!
//! - `web/`: a straight copy, served as-is.
//! - `native/`: three zip archives the native app downloads, plus the
//!   manifests it needs to decide what to fetch.
//!
//! # Architecture: Classify, Detect, Archive
//!
//! ```text
//! 1. Classify  dist/                    →  Classification   (files → buckets)
//! 2. Detect    Classification + module.json →  ChangeSet     (skip / rebuild)
//! 3. Archive   changed buckets          →  <module>_<bucket>.zip
//! 4. Persist   Classification, fingerprints →  module.json, zips_content_hash.json
//! ```
//!
//! Files are split into three buckets by how often they change:
//!
//! | Bucket | Contents | Changes |
//! |--------|----------|---------|
//! | `assets` | anything under an `images/` or `fonts/` directory | rarely |
//! | `low` | `vendor-*`, `vendors~*`, `runtime-*` chunks | on dependency bumps |
//! | `high` | everything else: app code, styles, HTML | every release |
//!
//! Only buckets whose content changed are re-zipped, and archive output is
//! deterministic, so an unchanged bucket keeps the same archive fingerprint
//! across releases and clients skip the download.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`fingerprint`] | 8-hex-char SHA-256 content fingerprints |
//! | [`classify`] | Stage 1: walks the build output and buckets every file |
//! | [`detect`] | Stage 2: pure per-bucket change detection against the last manifest |
//! | [`archive`] | Stage 3: scratch staging and deterministic zip output |
//! | [`manifest`] | Stage 4: `module.json` and `zips_content_hash.json` persistence |
//! | [`pipeline`] | [`Packager`](pipeline::Packager): runs the stages and the web copy |
//! | [`config`] | `distpack.toml` loading, layering and validation; resolved [`Layout`](config::Layout) |
//! | [`output`] | CLI output formatting for run reports |
//!
//! # Design Decisions
//!
//! ## Manifest as Cache Key
//!
//! The previous run's classification is the only state carried between runs.
//! There is no separate cache directory: delete `module.json` (or pass
//! `--no-cache`) and the next run rebuilds every archive.
//!
//! ## Missing Is Not Malformed
//!
//! A missing manifest means first run. A manifest that exists but does not
//! parse stops the run instead of silently rebuilding, since it usually means
//! something else wrote to the output directory.

pub mod archive;
pub mod classify;
pub mod config;
pub mod detect;
pub mod fingerprint;
pub mod manifest;
pub mod output;
pub mod pipeline;

#[cfg(test)]
pub(crate) mod test_helpers;
