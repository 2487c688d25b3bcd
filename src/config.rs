//! Configuration module.
//!
//! Handles loading, validating, and merging `picture-gen.toml`. Stock
//! defaults are overridden by whatever the user file specifies; everything
//! else keeps its default.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! static_dir = "static"             # Site's static root; URLs are relative to it
//! output_dir = "static/generated"   # Generated variants, must be inside static_dir
//! max_width = 800                   # Widest layout slot, in CSS pixels
//! max_density = 3                   # Highest device pixel ratio served
//!
//! [breakpoints]
//! base = 400                        # First target width
//! interval = 200                    # Step between target widths
//!
//! [formats]
//! webp = true                       # Also generate a WebP next to each variant
//! quality = 90                      # JPEG encoding quality (1-100)
//!
//! [processing]
//! max_processes = 4                 # Max parallel workers (omit for auto = CPU cores)
//!
//! [remote]
//! enabled = false                   # Resolve variants from an object store
//! bucket = ""
//! prefix = "generated"
//! region = "us-east-1"
//! endpoint = "http://localhost:9000"  # S3-compatible services only
//! max_parallel_requests = 2         # Simultaneous listings, process-wide
//! ```
//!
//! Relative `static_dir` and `output_dir` are resolved against the directory
//! containing the config file. Unknown keys are rejected to catch typos
//! early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Configuration loaded from `picture-gen.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Root of the site's static files.
    pub static_dir: PathBuf,
    /// Where generated variants are written. Must be inside `static_dir`.
    pub output_dir: PathBuf,
    /// Widest slot an image is displayed in, in CSS pixels.
    pub max_width: u32,
    /// Highest device pixel ratio served.
    pub max_density: u32,
    pub breakpoints: BreakpointsConfig,
    pub formats: FormatsConfig,
    pub processing: ProcessingConfig,
    pub remote: RemoteConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            static_dir: PathBuf::from("static"),
            output_dir: PathBuf::from("static/generated"),
            max_width: 800,
            max_density: 3,
            breakpoints: BreakpointsConfig::default(),
            formats: FormatsConfig::default(),
            processing: ProcessingConfig::default(),
            remote: RemoteConfig::default(),
        }
    }
}

impl Config {
    /// Widest variant that is ever generated or referenced.
    pub fn max_size(&self) -> i64 {
        i64::from(self.max_width) * i64::from(self.max_density)
    }

    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_width == 0 || self.max_density == 0 {
            return Err(ConfigError::Validation(
                "max_width and max_density must be non-zero".into(),
            ));
        }
        if self.breakpoints.base == 0 {
            return Err(ConfigError::Validation(
                "breakpoints.base must be non-zero".into(),
            ));
        }
        if self.breakpoints.interval == 0 {
            return Err(ConfigError::Validation(
                "breakpoints.interval must be non-zero".into(),
            ));
        }
        if !(1..=100).contains(&self.formats.quality) {
            return Err(ConfigError::Validation(
                "formats.quality must be 1-100".into(),
            ));
        }
        if self.output_dir == self.static_dir {
            return Err(ConfigError::Validation(format!(
                "output_dir ({}) must be a subdirectory of static_dir, not static_dir itself",
                self.output_dir.display()
            )));
        }
        if !self.output_dir.starts_with(&self.static_dir) {
            return Err(ConfigError::Validation(format!(
                "output_dir ({}) must be inside static_dir ({})",
                self.output_dir.display(),
                self.static_dir.display()
            )));
        }
        if self.remote.enabled && self.remote.bucket.is_empty() {
            return Err(ConfigError::Validation(
                "remote.bucket is required when remote.enabled = true".into(),
            ));
        }
        if self.remote.max_parallel_requests == 0 {
            return Err(ConfigError::Validation(
                "remote.max_parallel_requests must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Make relative directories relative to `base` instead of the CWD.
    fn resolve_paths(&mut self, base: &Path) {
        if self.static_dir.is_relative() {
            self.static_dir = base.join(&self.static_dir);
        }
        if self.output_dir.is_relative() {
            self.output_dir = base.join(&self.output_dir);
        }
    }
}

/// Target width ladder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BreakpointsConfig {
    pub base: u32,
    pub interval: u32,
}

impl Default for BreakpointsConfig {
    fn default() -> Self {
        Self {
            base: 400,
            interval: 200,
        }
    }
}

/// Output encodings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FormatsConfig {
    /// Generate a WebP alongside the original-format variant.
    pub webp: bool,
    /// Lossy encoding quality (1-100).
    pub quality: u32,
}

impl Default for FormatsConfig {
    fn default() -> Self {
        Self {
            webp: true,
            quality: 90,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel image processing workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

/// Object store holding uploaded variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RemoteConfig {
    /// Resolve from the object store instead of the local output tree.
    pub enabled: bool,
    pub bucket: String,
    /// Key prefix the variant directories live under.
    pub prefix: String,
    pub region: String,
    /// Custom endpoint for S3-compatible services (path-style addressing).
    pub endpoint: Option<String>,
    /// Simultaneous listings allowed across the whole process.
    pub max_parallel_requests: usize,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bucket: String::new(),
            prefix: "generated".to_string(),
            region: "us-east-1".to_string(),
            endpoint: None,
            max_parallel_requests: 2,
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged on top of.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(Config::default())?)
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

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<Config, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: Config = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the config file at `path`.
///
/// A missing file yields the defaults. Relative directories are resolved
/// against the file's parent directory.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(path)?;
    let mut config = resolve_config(base, overlay)?;
    if let Some(dir) = path.parent() {
        config.resolve_paths(dir);
    }
    Ok(config)
}

/// Returns a fully-commented stock `picture-gen.toml` with all keys and
/// explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# picture-gen configuration
# ========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
# Unknown keys will cause an error.

# Root of the site's static files. Variant URLs are built relative to it.
static_dir = "static"

# Where generated variants are written, one directory per source image:
#   <output_dir>/<name>.<hash>/<width>.<ext>
# Must be inside static_dir.
output_dir = "static/generated"

# Widest slot an image is displayed in (CSS pixels) and the highest device
# pixel ratio served. Nothing wider than max_width * max_density is ever
# generated or referenced.
max_width = 800
max_density = 3

# ---------------------------------------------------------------------------
# Breakpoints
# ---------------------------------------------------------------------------
# Target widths are base, base + interval, ... below the image's own width,
# plus the image's own width (capped at max_width * max_density).
[breakpoints]
base = 400
interval = 200

# ---------------------------------------------------------------------------
# Output formats
# ---------------------------------------------------------------------------
[formats]
# Every variant is written in the source's own format. Also write WebP?
webp = true

# JPEG encoding quality (1 = worst, 100 = best). WebP output is lossless.
quality = 90

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel image-processing workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4

# ---------------------------------------------------------------------------
# Remote variants
# ---------------------------------------------------------------------------
# Resolve variants from an S3-compatible object store instead of the local
# output directory. Objects are expected at <prefix>/<name>.<hash>/<width>.<ext>.
[remote]
enabled = false
bucket = ""
prefix = "generated"
region = "us-east-1"

# Custom endpoint for S3-compatible services such as MinIO.
# endpoint = "http://localhost:9000"

# Simultaneous listing requests allowed across the whole process.
max_parallel_requests = 2
"##
}
