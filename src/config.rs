//! Pipeline configuration.
//!
//! Handles loading, validating and merging `manipulate.toml`. Stock defaults
//! are overridden by whatever the user file specifies; the file is optional.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [output]
//! default_quality = 75              # Used when a request sets no quality
//!
//! [watermark]
//! path = "assets/watermark.png"     # Relative paths resolve against the config file
//! opacity = 30                      # Dissolve percentage
//! min_height_percent = 20           # Overlay height, % of the normalized image height
//! small_image_height_percent = 45   # ...for images shorter than the threshold
//! small_image_threshold = 300       # px
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{OverlayConfig, Quality, WatermarkRules};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name looked up by [`find_config`].
pub const CONFIG_FILE_NAME: &str = "manipulate.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Pipeline configuration loaded from `manipulate.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ManipulateConfig {
    /// Encoding defaults.
    pub output: OutputConfig,
    /// Watermark asset and sizing rules.
    pub watermark: WatermarkConfig,
}

impl ManipulateConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let w = &self.watermark;
        if w.path.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "watermark.path must not be empty".into(),
            ));
        }
        for (key, value) in [
            ("watermark.opacity", w.opacity),
            ("watermark.min_height_percent", w.min_height_percent),
            (
                "watermark.small_image_height_percent",
                w.small_image_height_percent,
            ),
        ] {
            if !(1..=100).contains(&value) {
                return Err(ConfigError::Validation(format!("{key} must be 1-100")));
            }
        }
        if w.small_image_threshold == 0 {
            return Err(ConfigError::Validation(
                "watermark.small_image_threshold must be non-zero".into(),
            ));
        }
        Ok(())
    }

    /// The overlay settings handed to [`plan_watermark`](crate::imaging::plan_watermark).
    pub fn overlay(&self) -> OverlayConfig<'_> {
        OverlayConfig {
            asset: &self.watermark.path,
            dissolve: self.watermark.opacity,
            rules: self.watermark.rules(),
            quality: self.output.quality(),
        }
    }
}

/// Encoding defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// Quality used when a request does not set one. Passed through unvalidated.
    pub default_quality: u32,
}

impl OutputConfig {
    pub fn quality(&self) -> Quality {
        Quality::new(self.default_quality)
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            default_quality: Quality::default().value(),
        }
    }
}

/// Watermark asset and sizing rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WatermarkConfig {
    /// Overlay image. Relative paths are resolved against the config file's directory.
    pub path: PathBuf,
    /// Dissolve opacity in percent.
    pub opacity: u32,
    pub min_height_percent: u32,
    pub small_image_height_percent: u32,
    /// Images shorter than this (px) use `small_image_height_percent`.
    pub small_image_threshold: u32,
}

impl WatermarkConfig {
    pub fn rules(&self) -> WatermarkRules {
        WatermarkRules {
            min_height_percent: self.min_height_percent,
            small_image_height_percent: self.small_image_height_percent,
            small_image_threshold: self.small_image_threshold,
        }
    }
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        let rules = WatermarkRules::default();
        Self {
            path: PathBuf::from("assets/watermark.png"),
            opacity: 30,
            min_height_percent: rules.min_height_percent,
            small_image_height_percent: rules.small_image_height_percent,
            small_image_threshold: rules.small_image_threshold,
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(ManipulateConfig::default()).expect("default config must serialize")
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

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<ManipulateConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: ManipulateConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load a config file, merging it over the stock defaults.
///
/// A relative `watermark.path` is made absolute against the file's directory.
pub fn load_config(path: &Path) -> Result<ManipulateConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let overlay: toml::Value = toml::from_str(&content)?;
    let mut config = resolve_config(stock_defaults_value(), Some(overlay))?;
    if config.watermark.path.is_relative() {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        config.watermark.path = dir.join(&config.watermark.path);
    }
    Ok(config)
}

/// Look for `manipulate.toml` in `dir`.
pub fn find_config(dir: &Path) -> Option<PathBuf> {
    let candidate = dir.join(CONFIG_FILE_NAME);
    candidate.is_file().then_some(candidate)
}

/// Load the given config file, or `manipulate.toml` in `fallback_dir` if it
/// exists, or the stock defaults.
pub fn load_or_default(
    explicit: Option<&Path>,
    fallback_dir: &Path,
) -> Result<ManipulateConfig, ConfigError> {
    match explicit.map(Path::to_path_buf).or_else(|| find_config(fallback_dir)) {
        Some(path) => load_config(&path),
        None => Ok(ManipulateConfig::default()),
    }
}

/// Returns a fully-commented stock `manipulate.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# image-manipulate configuration
# ==============================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Output encoding
# ---------------------------------------------------------------------------
[output]
# Quality used when a request does not specify one.
# Not range-checked here; encoders clamp to what they support.
default_quality = 75

# ---------------------------------------------------------------------------
# Watermark overlay (applied when a request sets `watermark`)
# ---------------------------------------------------------------------------
[watermark]
# Overlay image. Relative paths resolve against this file's directory.
path = "assets/watermark.png"

# Dissolve opacity of the overlay, in percent.
opacity = 30

# Overlay height as a percentage of the image height rounded down to 100px.
min_height_percent = 20

# Percentage used instead for images shorter than small_image_threshold.
small_image_height_percent = 45

# Height in px below which the small-image percentage applies.
small_image_threshold = 300
"##
}
