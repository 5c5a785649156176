//! Packaging configuration.
//!
//! Handles loading, validating, and merging `distpack.toml`. Stock defaults
//! reproduce the layout the web build has always used, so a project without a
//! config file packages `dist/` into `dist_production/` with no setup.
//!
//! ## Config File Location
//!
//! `distpack.toml` lives in the project root, next to the build output:
//!
//! ```text
//! project/
//! ├── distpack.toml          # optional
//! ├── dist/                  # build output (input to packaging)
//! ├── dist_production/       # packaging output
//! │   ├── web/
//! │   └── native/
//! └── tmp/                   # scratch area, empty between runs
//! ```
//!
//! ## Configuration Options
//!
//! ```toml
//! module_name = "module"      # archive prefix: <module_name>_<bucket>.zip
//!
//! [paths]
//! build = "dist"              # build output to package
//! production = "dist_production"
//! scratch = "tmp"             # staging area for one archive at a time
//! ```
//!
//! Relative paths resolve against the project root; absolute paths are used
//! as-is.
//!
//! ## Layering
//!
//! Values are resolved in three layers, each overriding the last: stock
//! defaults, then `distpack.toml`, then command-line overrides. Layers are
//! merged as TOML tables by [`merge_toml`] before deserializing, so every
//! layer only needs the keys it changes. Unknown keys are rejected to catch
//! typos early.

use crate::classify::Bucket;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the config file in the project root.
pub const CONFIG_FILENAME: &str = "distpack.toml";

/// Persisted classification, relative to the native output directory.
pub const MANIFEST_FILENAME: &str = "module.json";

/// Persisted archive fingerprints, relative to the native output directory.
pub const ARCHIVE_HASHES_FILENAME: &str = "zips_content_hash.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Packaging configuration loaded from `distpack.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PackConfig {
    /// Prefix of every archive file name.
    pub module_name: String,
    /// Input and output directories.
    pub paths: PathsConfig,
}

impl Default for PackConfig {
    fn default() -> Self {
        Self {
            module_name: "module".to_string(),
            paths: PathsConfig::default(),
        }
    }
}

/// Directory layout, relative to the project root unless absolute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    /// Finished build output. Read-only to this tool.
    pub build: String,
    /// Root of everything this tool writes (`web/` and `native/`).
    pub production: String,
    /// Staging directory for one archive at a time.
    pub scratch: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            build: "dist".to_string(),
            production: "dist_production".to_string(),
            scratch: "tmp".to_string(),
        }
    }
}

impl PackConfig {
    /// Validate names and directory relationships.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.module_name.is_empty() {
            return Err(ConfigError::Validation(
                "module_name must not be empty".into(),
            ));
        }
        if let Some(c) = self
            .module_name
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
        {
            return Err(ConfigError::Validation(format!(
                "module_name contains invalid character {c:?}"
            )));
        }

        let build = Path::new(&self.paths.build);
        let production = Path::new(&self.paths.production);
        let scratch = Path::new(&self.paths.scratch);
        for (key, value) in [
            ("paths.build", &self.paths.build),
            ("paths.production", &self.paths.production),
            ("paths.scratch", &self.paths.scratch),
        ] {
            if value.is_empty() {
                return Err(ConfigError::Validation(format!("{key} must not be empty")));
            }
        }
        // No directory may contain another: production and scratch are
        // emptied by a run, and everything under build is classified.
        let dirs = [
            ("paths.build", build),
            ("paths.production", production),
            ("paths.scratch", scratch),
        ];
        for (i, (inner_key, inner)) in dirs.iter().enumerate() {
            for (j, (outer_key, outer)) in dirs.iter().enumerate() {
                if i == j || !inner.starts_with(outer) {
                    continue;
                }
                let message = if inner == outer {
                    format!("{outer_key} and {inner_key} must be distinct")
                } else {
                    format!("{inner_key} must not be inside {outer_key}")
                };
                return Err(ConfigError::Validation(message));
            }
        }
        Ok(())
    }
}

/// Absolute locations for one packaging run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub build: PathBuf,
    pub web: PathBuf,
    pub native: PathBuf,
    pub scratch: PathBuf,
    pub manifest: PathBuf,
    pub archive_hashes: PathBuf,
    module_name: String,
}

impl Layout {
    pub fn new(root: &Path, config: &PackConfig) -> Self {
        let production = root.join(&config.paths.production);
        let native = production.join("native");
        Self {
            build: root.join(&config.paths.build),
            web: production.join("web"),
            manifest: native.join(MANIFEST_FILENAME),
            archive_hashes: native.join(ARCHIVE_HASHES_FILENAME),
            native,
            scratch: root.join(&config.paths.scratch),
            module_name: config.module_name.clone(),
        }
    }

    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    /// File name of a bucket's archive, e.g. `checkout_high.zip`.
    pub fn archive_name(&self, bucket: Bucket) -> String {
        format!("{}_{}.zip", self.module_name, bucket)
    }

    pub fn archive_path(&self, bucket: Bucket) -> PathBuf {
        self.native.join(self.archive_name(bucket))
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer every other layer is merged on top of.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(PackConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `distpack.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist, `Err` if it is not valid TOML.
pub fn load_raw_config(root: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = root.join(CONFIG_FILENAME);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<PackConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: PackConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `distpack.toml` in the project root.
pub fn load_config(root: &Path) -> Result<PackConfig, ConfigError> {
    load_config_with_overrides(root, None)
}

/// Load config with an extra layer (typically built from CLI flags) applied
/// on top of the file.
pub fn load_config_with_overrides(
    root: &Path,
    overrides: Option<toml::Value>,
) -> Result<PackConfig, ConfigError> {
    let base = match load_raw_config(root)? {
        Some(file) => merge_toml(stock_defaults_value(), file),
        None => stock_defaults_value(),
    };
    resolve_config(base, overrides)
}

/// Build the override layer for a `--module-name` flag.
pub fn module_name_override(module_name: Option<&str>) -> Option<toml::Value> {
    module_name.map(|name| {
        let mut table = toml::value::Table::new();
        table.insert(
            "module_name".to_string(),
            toml::Value::String(name.to_string()),
        );
        toml::Value::Table(table)
    })
}

/// Returns a fully-commented stock `distpack.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# distpack configuration
# ======================
# All settings are optional. Values shown below are the defaults.
# Unknown keys will cause an error.

# Prefix for every archive: <module_name>_assets.zip, <module_name>_low.zip,
# <module_name>_high.zip. ASCII letters, digits, '-', '_' and '.' only.
module_name = "module"

# ---------------------------------------------------------------------------
# Directories (relative to this file unless absolute)
# ---------------------------------------------------------------------------
[paths]
# Finished build output. Never modified.
build = "dist"

# Packaging output. Receives web/ (full copy of the build) and native/
# (archives, module.json, zips_content_hash.json).
production = "dist_production"

# Staging area for one archive at a time. Emptied before and after use.
scratch = "tmp"
"##
}
