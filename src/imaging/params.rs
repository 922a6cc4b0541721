//! Parameter types for image operations.
//!
//! These types describe *what* to do, not *how* to do it. They are the
//! interface between the high-level [`operations`](super::operations) module
//! (which turns request options into a plan) and the
//! [`backend`](super::backend) (which does the actual pixel work). This
//! separation allows swapping backends (e.g. for testing with a mock) without
//! changing operation logic.
//!
//! ## Types
//!
//! - [`Quality`]: Encoding quality, stored verbatim (default 75).
//! - [`GeometryOp`]: One sizing/placement step of an action.
//! - [`Effect`]: Optional blur/modulate applied after all geometry.
//! - [`TransformPlan`]: Ordered geometry steps, then effects, then encoding settings.
//! - [`RenderParams`]: A plan bound to source bytes and an output path.
//! - [`CompositeParams`]: Watermark overlay onto an already written image.

use super::color::Color;
use image::ImageFormat;
use std::path::PathBuf;

/// Quality setting for lossy image encoding.
///
/// The value is kept exactly as requested. Codecs clamp it to the range they
/// accept through [`Quality::encoder_value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value)
    }

    pub fn value(self) -> u32 {
        self.0
    }

    /// The quality clamped to 1-100 for encoders that take a `u8`.
    pub fn encoder_value(self) -> u8 {
        self.0.clamp(1, 100) as u8
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(75)
    }
}

/// How a resize step treats the target box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeMode {
    /// Fit inside the box, preserving aspect ratio.
    Fit,
    /// Cover the whole box, preserving aspect ratio (`^`).
    Cover,
    /// Fit inside the box, but only if the source is larger (`>`).
    ShrinkOnly,
}

/// Placement anchor for extent and compositing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Gravity {
    #[default]
    NorthWest,
    Center,
}

/// A single geometry step. Steps run in plan order.
#[derive(Debug, Clone, PartialEq)]
pub enum GeometryOp {
    Resize {
        width: Option<u32>,
        height: Option<u32>,
        mode: ResizeMode,
    },
    /// Color used for any area uncovered by a later extent.
    Background(Color),
    Gravity(Gravity),
    /// Pad or crop to exactly `width x height`, anchored by the current gravity.
    Extent { width: u32, height: u32 },
    /// Drawing fill color. Only drawing primitives read it.
    Fill(Color),
    Crop {
        width: u32,
        height: u32,
        x: u32,
        y: u32,
    },
}

/// Optional effect applied after all geometry steps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Effect {
    Blur { radius: f32, sigma: f32 },
    /// Brightness, saturation and hue in percent (100 = unchanged).
    Modulate {
        brightness: f32,
        saturation: f32,
        hue: f32,
    },
}

/// Everything the engine needs to turn a decoded source into the output file.
///
/// The field order is the application order: geometry, then effects, then
/// encoding. Embedded metadata (EXIF, ICC profiles, comments) never reaches
/// the output because engines encode pixels only.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformPlan {
    pub geometry: Vec<GeometryOp>,
    pub effects: Vec<Effect>,
    pub quality: Quality,
    /// Output format override; `None` picks it from the output path.
    pub format: Option<ImageFormat>,
}

impl TransformPlan {
    pub fn new(quality: Quality) -> Self {
        Self {
            geometry: Vec::new(),
            effects: Vec::new(),
            quality,
            format: None,
        }
    }

    pub fn then(mut self, op: GeometryOp) -> Self {
        self.geometry.push(op);
        self
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_format(mut self, format: ImageFormat) -> Self {
        self.format = Some(format);
        self
    }
}

/// Parameters for rendering a plan onto source bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderParams {
    /// Encoded source image.
    pub source: Vec<u8>,
    /// Decode hint, used when the bytes carry no recognizable signature.
    pub format_hint: Option<ImageFormat>,
    pub plan: TransformPlan,
    pub output: PathBuf,
}

/// Parameters for compositing an overlay onto an image file in place.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeParams {
    /// Image the overlay is placed on.
    pub base: PathBuf,
    pub overlay: PathBuf,
    pub output: PathBuf,
    /// Overlay opacity in percent.
    pub dissolve: u32,
    pub gravity: Gravity,
    /// Box the overlay is scaled to fit, as `(width, height)`.
    pub geometry: (u32, u32),
    pub quality: Quality,
}
