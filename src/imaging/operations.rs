//! High-level image operations.
//!
//! These functions turn request options into engine parameters. They are pure
//! apart from [`get_dimensions`], so the action table can be tested without
//! decoding a single pixel.

use super::backend::{BackendError, Dimensions, RasterEngine};
use super::calculations::{
    WatermarkBox, WatermarkRules, calculate_square_geometry, calculate_watermark_box,
    resolve_quality,
};
use super::color::Color;
use super::params::{
    CompositeParams, Effect, GeometryOp, Gravity, Quality, ResizeMode, TransformPlan,
};
use crate::request::{Action, Options};
use image::ImageFormat;
use std::path::Path;

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Get image dimensions using the engine.
pub fn get_dimensions(engine: &impl RasterEngine, path: &Path) -> Result<Dimensions> {
    engine.identify(path)
}

/// Build the full transform plan for a request.
///
/// Geometry comes from [`plan_geometry`]; blur and modulate are appended as
/// effects when their flags are set.
pub fn plan_transform(
    options: &Options,
    original: Dimensions,
    default_quality: Quality,
) -> TransformPlan {
    let mut plan = plan_geometry(options, original, default_quality);

    if options.blur {
        plan = plan.with_effect(Effect::Blur {
            radius: options.blur_radius.unwrap_or(0.0),
            sigma: options.blur_sigma.unwrap_or(0.0),
        });
    }

    if options.modulate {
        plan = plan.with_effect(Effect::Modulate {
            brightness: options.modulate_brightness.unwrap_or(100.0),
            saturation: options.modulate_saturation.unwrap_or(100.0),
            hue: options.modulate_hue.unwrap_or(100.0),
        });
    }

    plan
}

/// Map the requested action to its geometry steps.
///
/// | action | steps |
/// |---|---|
/// | resize | resize |
/// | fit | JPEG output, cover resize, center, extent |
/// | fill | background, center, shrink-only resize, extent, fill |
/// | square | one-axis resize, crop to the square |
/// | crop | crop |
///
/// Extent steps need both a width and a height and are skipped otherwise.
/// A crop without a width or height keeps that side of the original.
pub fn plan_geometry(
    options: &Options,
    original: Dimensions,
    default_quality: Quality,
) -> TransformPlan {
    let quality = resolve_quality(options.quality, default_quality);
    let plan = TransformPlan::new(quality);
    let (width, height) = (options.width, options.height);
    let extent = width
        .zip(height)
        .map(|(width, height)| GeometryOp::Extent { width, height });

    let Some(action) = options.action else {
        return plan;
    };

    match action {
        Action::Resize => plan.then(GeometryOp::Resize {
            width,
            height,
            mode: ResizeMode::Fit,
        }),
        Action::Fit => {
            let plan = plan
                .with_format(ImageFormat::Jpeg)
                .then(GeometryOp::Resize {
                    width,
                    height,
                    mode: ResizeMode::Cover,
                })
                .then(GeometryOp::Gravity(Gravity::Center));
            extent.into_iter().fold(plan, TransformPlan::then)
        }
        Action::Fill => {
            let color = options.bgcolor.unwrap_or(Color::WHITE);
            let plan = plan
                .then(GeometryOp::Background(color))
                .then(GeometryOp::Gravity(Gravity::Center))
                .then(GeometryOp::Resize {
                    width,
                    height,
                    mode: ResizeMode::ShrinkOnly,
                });
            extent
                .into_iter()
                .fold(plan, TransformPlan::then)
                .then(GeometryOp::Fill(color))
        }
        Action::Square => {
            let square = calculate_square_geometry(original, width, height);
            plan.then(GeometryOp::Resize {
                width: square.resize_width,
                height: square.resize_height,
                mode: ResizeMode::Fit,
            })
            .then(GeometryOp::Crop {
                width: square.size,
                height: square.size,
                x: square.crop_x,
                y: square.crop_y,
            })
        }
        Action::Crop => plan.then(GeometryOp::Crop {
            width: width.unwrap_or(original.width),
            height: height.unwrap_or(original.height),
            x: options.crop_x.unwrap_or(0),
            y: options.crop_y.unwrap_or(0),
        }),
    }
}

/// Configuration for the watermark overlay.
#[derive(Debug, Clone)]
pub struct OverlayConfig<'a> {
    pub asset: &'a Path,
    /// Overlay opacity in percent.
    pub dissolve: u32,
    pub rules: WatermarkRules,
    pub quality: Quality,
}

/// Plan a watermark composite without executing it.
///
/// `image` is the size of the written (post-geometry) image and `asset` the
/// native size of the watermark. The overlay is centered and written back
/// over `target`.
pub fn plan_watermark(
    target: &Path,
    image: Dimensions,
    asset: Dimensions,
    config: &OverlayConfig<'_>,
) -> (WatermarkBox, CompositeParams) {
    let overlay = calculate_watermark_box(image, asset, &config.rules);
    let params = CompositeParams {
        base: target.to_path_buf(),
        overlay: config.asset.to_path_buf(),
        output: target.to_path_buf(),
        dissolve: config.dissolve,
        gravity: Gravity::Center,
        geometry: overlay.geometry(),
        quality: config.quality,
    };
    (overlay, params)
}
