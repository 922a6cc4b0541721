//! The image descriptor handed to the pipeline.
//!
//! An [`ImageRequest`] is built by the caller with its [`Options`] and the
//! original dimensions already filled in. The pipeline only ever writes
//! [`ImageRequest::size`], and only on success.
//!
//! Options use the camelCase names of the upload API on the wire:
//!
//! ```json
//! {
//!   "action": "square",
//!   "width": 640,
//!   "height": 640,
//!   "quality": 80,
//!   "blur": true, "blurRadius": 0, "blurSigma": 2,
//!   "watermark": true
//! }
//! ```

use crate::imaging::{Color, Dimensions};
use image::ImageFormat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("unknown action {0:?} (expected resize, fit, fill, square or crop)")]
    UnknownAction(String),
}

/// The geometry action to run. Exactly one runs per request, or none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Resize,
    Fit,
    Fill,
    Square,
    Crop,
}

impl Action {
    pub const ALL: [Action; 5] = [
        Action::Resize,
        Action::Fit,
        Action::Fill,
        Action::Square,
        Action::Crop,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Action::Resize => "resize",
            Action::Fit => "fit",
            Action::Fill => "fill",
            Action::Square => "square",
            Action::Crop => "crop",
        }
    }
}

impl FromStr for Action {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|a| a.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| RequestError::UnknownAction(s.to_string()))
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User-supplied transform options.
///
/// Numeric effect parameters are passed to the engine unvalidated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Options {
    /// `None` applies no geometry at all; effects and encoding still run.
    pub action: Option<Action>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub crop_x: Option<u32>,
    pub crop_y: Option<u32>,
    /// Background for `fill` (hex, without `#`).
    pub bgcolor: Option<Color>,
    pub quality: Option<u32>,
    pub blur: bool,
    pub blur_radius: Option<f32>,
    pub blur_sigma: Option<f32>,
    pub modulate: bool,
    pub modulate_brightness: Option<f32>,
    pub modulate_saturation: Option<f32>,
    pub modulate_hue: Option<f32>,
    pub watermark: bool,
}

/// Descriptor for one image moving through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRequest {
    /// Where the working artifact is written (and rewritten).
    pub tmp_file: PathBuf,
    /// Original upload name; its extension hints the decode format.
    pub filename: String,
    /// Dimensions probed before any transform.
    pub orig_dims: Dimensions,
    pub options: Options,
    /// Output byte count, set only when the pipeline succeeds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl ImageRequest {
    pub fn new(
        tmp_file: impl Into<PathBuf>,
        filename: impl Into<String>,
        orig_dims: Dimensions,
        options: Options,
    ) -> Self {
        Self {
            tmp_file: tmp_file.into(),
            filename: filename.into(),
            orig_dims,
            options,
            size: None,
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Decode format suggested by the filename's extension.
    pub fn format_hint(&self) -> Option<ImageFormat> {
        Path::new(&self.filename)
            .extension()
            .and_then(|e| e.to_str())
            .and_then(ImageFormat::from_extension)
    }
}
