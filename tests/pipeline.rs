//! End-to-end packaging runs against a throwaway project directory.
//!
//! Each test lays out a small build output under `<tmp>/dist`, runs the
//! packager one or more times, and inspects what landed in
//! `<tmp>/dist_production`.

use distpack::classify::{Bucket, classify};
use distpack::config::{PackConfig, load_config};
use distpack::detect::ChangeReason;
use distpack::fingerprint::fingerprint_bytes;
use distpack::manifest::{load_archive_hashes, load_manifest};
use distpack::pipeline::{ArchiveStatus, NativeReport, Packager};
use std::fs;
use std::io::Read;
use std::path::Path;
use tempfile::TempDir;

fn write_files(root: &Path, files: &[(&str, &str)]) {
    for (rel, content) in files {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }
}

fn project() -> TempDir {
    let tmp = TempDir::new().unwrap();
    write_files(
        &tmp.path().join("dist"),
        &[
            ("index.html", "<html>v1</html>"),
            ("js/main.aaaa.js", "app()"),
            ("js/vendors~main.bbbb.js", "react()"),
            ("js/runtime-main.cccc.js", "boot()"),
            ("css/app.dddd.css", "body{}"),
            ("images/logo.svg", "<svg>1</svg>"),
            ("fonts/inter.woff2", "font"),
        ],
    );
    tmp
}

fn packager(root: &Path) -> Packager {
    Packager::new(root, &load_config(root).unwrap())
}

fn reason(report: &NativeReport, bucket: Bucket) -> &ChangeReason {
    &report.buckets.iter().find(|b| b.bucket == bucket).unwrap().reason
}

fn rebuilt(report: &NativeReport) -> Vec<Bucket> {
    report
        .buckets
        .iter()
        .filter(|b| matches!(b.status, ArchiveStatus::Built { .. }))
        .map(|b| b.bucket)
        .collect()
}

fn zip_names(path: &Path) -> Vec<String> {
    let archive = zip::ZipArchive::new(fs::File::open(path).unwrap()).unwrap();
    archive.file_names().map(str::to_string).collect()
}

fn zip_read(path: &Path, name: &str) -> String {
    let mut archive = zip::ZipArchive::new(fs::File::open(path).unwrap()).unwrap();
    let mut contents = String::new();
    archive
        .by_name(name)
        .unwrap()
        .read_to_string(&mut contents)
        .unwrap();
    contents
}

// ============================================================================
// First run
// ============================================================================

#[test]
fn first_run_writes_archives_and_manifests() {
    let tmp = project();
    let p = packager(tmp.path());
    p.package_native(true).unwrap();

    let native = tmp.path().join("dist_production/native");
    let high = native.join("module_high.zip");
    let mut names = zip_names(&high);
    names.sort();
    assert_eq!(names, vec!["css/app.dddd.css", "index.html", "js/main.aaaa.js"]);
    assert_eq!(zip_read(&high, "index.html"), "<html>v1</html>");

    let mut low = zip_names(&native.join("module_low.zip"));
    low.sort();
    assert_eq!(low, vec!["js/runtime-main.cccc.js", "js/vendors~main.bbbb.js"]);

    let mut assets = zip_names(&native.join("module_assets.zip"));
    assets.sort();
    assert_eq!(assets, vec!["fonts/inter.woff2", "images/logo.svg"]);

    let hashes = load_archive_hashes(&native.join("zips_content_hash.json"))
        .unwrap()
        .unwrap();
    assert_eq!(
        hashes.keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["module_assets.zip", "module_high.zip", "module_low.zip"]
    );
    for fp in hashes.values() {
        assert_eq!(fp.len(), 8);
    }
}

#[test]
fn manifest_matches_fresh_classification() {
    let tmp = project();
    packager(tmp.path()).package_native(true).unwrap();

    let saved = load_manifest(&tmp.path().join("dist_production/native/module.json"))
        .unwrap()
        .unwrap();
    assert_eq!(saved, classify(&tmp.path().join("dist")).unwrap());
}

#[test]
fn manifest_matches_classification_after_partial_rebuild() {
    let tmp = project();
    let p = packager(tmp.path());
    p.package_native(true).unwrap();

    write_files(&tmp.path().join("dist"), &[("index.html", "<html>v2</html>")]);
    let report = p.package_native(true).unwrap();
    assert_eq!(rebuilt(&report), vec![Bucket::High]);
    assert_eq!(report.kept(), 2);

    let saved = load_manifest(&tmp.path().join("dist_production/native/module.json"))
        .unwrap()
        .unwrap();
    assert_eq!(saved, classify(&tmp.path().join("dist")).unwrap());

    let index = saved
        .files(Bucket::High)
        .iter()
        .find(|f| f.relative_path == "index.html")
        .unwrap();
    assert_eq!(
        index.content_hash.as_deref(),
        Some(fingerprint_bytes(b"<html>v2</html>").as_str())
    );
}

#[test]
fn scratch_area_is_empty_after_run() {
    let tmp = project();
    packager(tmp.path()).package_native(true).unwrap();

    let scratch = tmp.path().join("tmp");
    assert!(scratch.is_dir());
    assert_eq!(fs::read_dir(scratch).unwrap().count(), 0);
}

// ============================================================================
// Incremental runs
// ============================================================================

#[test]
fn html_edit_rebuilds_only_high() {
    let tmp = project();
    let p = packager(tmp.path());
    let first = p.package_native(true).unwrap();

    write_files(&tmp.path().join("dist"), &[("index.html", "<html>v2</html>")]);
    let second = p.package_native(true).unwrap();

    assert_eq!(rebuilt(&second), vec![Bucket::High]);
    assert!(matches!(
        reason(&second, Bucket::High),
        ChangeReason::ContentChanged { path, .. } if path == "index.html"
    ));
    assert_ne!(
        second.archive_hashes["module_high.zip"],
        first.archive_hashes["module_high.zip"]
    );
    assert_eq!(
        second.archive_hashes["module_low.zip"],
        first.archive_hashes["module_low.zip"]
    );
}

#[test]
fn new_vendor_chunk_rebuilds_only_low() {
    let tmp = project();
    let p = packager(tmp.path());
    p.package_native(true).unwrap();

    write_files(&tmp.path().join("dist"), &[("js/vendor-lodash.eeee.js", "_()")]);
    let report = p.package_native(true).unwrap();

    assert_eq!(rebuilt(&report), vec![Bucket::Low]);
    assert_eq!(
        reason(&report, Bucket::Low),
        &ChangeReason::CountChanged {
            previous: 2,
            current: 3
        }
    );
}

#[test]
fn replaced_image_rebuilds_assets() {
    let tmp = project();
    let p = packager(tmp.path());
    p.package_native(true).unwrap();

    write_files(&tmp.path().join("dist"), &[("images/logo.svg", "<svg>2</svg>")]);
    let report = p.package_native(true).unwrap();

    assert_eq!(rebuilt(&report), vec![Bucket::Assets]);
    let assets = tmp.path().join("dist_production/native/module_assets.zip");
    assert_eq!(zip_read(&assets, "images/logo.svg"), "<svg>2</svg>");
}

#[test]
fn renamed_script_rebuilds_high() {
    let tmp = project();
    let p = packager(tmp.path());
    p.package_native(true).unwrap();

    let dist = tmp.path().join("dist");
    fs::rename(dist.join("js/main.aaaa.js"), dist.join("js/main.ffff.js")).unwrap();
    let report = p.package_native(true).unwrap();

    assert_eq!(rebuilt(&report), vec![Bucket::High]);
    assert_eq!(
        reason(&report, Bucket::High),
        &ChangeReason::PathsChanged {
            added: vec!["js/main.ffff.js".into()],
            removed: vec!["js/main.aaaa.js".into()],
        }
    );
}

#[test]
fn rebuilt_archive_is_byte_identical_for_same_input() {
    let tmp = project();
    let p = packager(tmp.path());
    p.package_native(true).unwrap();
    let high = tmp.path().join("dist_production/native/module_high.zip");
    let before = fs::read(&high).unwrap();

    let report = p.package_native(false).unwrap();
    assert_eq!(fs::read(&high).unwrap(), before);
    assert_eq!(report.archive_hashes["module_high.zip"], fingerprint_bytes(&before));
}

// ============================================================================
// Configuration and web output
// ============================================================================

#[test]
fn config_file_sets_module_name_and_paths() {
    let tmp = TempDir::new().unwrap();
    write_files(
        tmp.path(),
        &[
            (
                "distpack.toml",
                "module_name = \"checkout\"\n[paths]\nbuild = \"build\"\nproduction = \"out\"\n",
            ),
            ("build/index.html", "<html></html>"),
        ],
    );

    let report = packager(tmp.path()).package_native(true).unwrap();
    assert!(tmp.path().join("out/native/checkout_high.zip").is_file());
    assert_eq!(report.built(), 1);
    assert_eq!(report.empty(), 2);
    assert!(!tmp.path().join("out/native/checkout_low.zip").exists());
}

#[test]
fn nested_scratch_config_is_rejected_before_touching_build() {
    let tmp = TempDir::new().unwrap();
    write_files(
        tmp.path(),
        &[
            ("distpack.toml", "[paths]\nbuild = \"work/dist\"\nscratch = \"work\"\n"),
            ("work/dist/index.html", "<html></html>"),
        ],
    );

    assert!(load_config(tmp.path()).is_err());
    assert!(tmp.path().join("work/dist/index.html").is_file());
}

#[test]
fn module_name_change_rebuilds_under_new_names() {
    let tmp = project();
    packager(tmp.path()).package_native(true).unwrap();

    let mut config = PackConfig::default();
    config.module_name = "renamed".into();
    let report = Packager::new(tmp.path(), &config).package_native(true).unwrap();

    assert_eq!(reason(&report, Bucket::Low), &ChangeReason::ArchiveMissing);
    assert!(tmp.path().join("dist_production/native/renamed_low.zip").is_file());
}

#[test]
fn web_copy_mirrors_build_output() {
    let tmp = project();
    let report = packager(tmp.path()).publish_web().unwrap();

    assert_eq!(report.file_count, 7);
    let web = tmp.path().join("dist_production/web");
    assert_eq!(fs::read_to_string(web.join("index.html")).unwrap(), "<html>v1</html>");
    assert_eq!(fs::read_to_string(web.join("fonts/inter.woff2")).unwrap(), "font");
}
