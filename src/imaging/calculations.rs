//! Pure calculation functions for image geometry.
//!
//! All functions here are pure and testable without any I/O or images.

use super::backend::Dimensions;
use super::params::{Quality, ResizeMode};

/// Resize target and crop box for the `square` action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SquareGeometry {
    /// Width to resize to; `None` lets the engine scale it proportionally.
    pub resize_width: Option<u32>,
    /// Height to resize to; `None` lets the engine scale it proportionally.
    pub resize_height: Option<u32>,
    /// Edge length of the final square.
    pub size: u32,
    pub crop_x: u32,
    pub crop_y: u32,
}

/// Calculate the resize and center-crop that turn an image into a square.
///
/// The shorter side drives the result. Landscape and square originals use
/// `requested_height`, portraits use `requested_width`. The requested size is
/// clamped to the original length of that side so the image is never
/// enlarged, and a missing request means "keep the original length".
///
/// # Examples
/// ```
/// # use image_manipulate::imaging::{Dimensions, calculate_square_geometry};
/// let g = calculate_square_geometry(Dimensions { width: 800, height: 400 }, None, Some(400));
/// assert_eq!((g.size, g.crop_x, g.crop_y), (400, 200, 0));
/// ```
pub fn calculate_square_geometry(
    original: Dimensions,
    requested_width: Option<u32>,
    requested_height: Option<u32>,
) -> SquareGeometry {
    let Dimensions { width, height } = original;

    if width >= height {
        let size = requested_height.map_or(height, |h| h.min(height));
        let scaled_width = scale(size, height, width);
        SquareGeometry {
            resize_width: None,
            resize_height: Some(size),
            size,
            crop_x: centered_offset(scaled_width, size),
            crop_y: 0,
        }
    } else {
        let size = requested_width.map_or(width, |w| w.min(width));
        let scaled_height = scale(size, width, height);
        SquareGeometry {
            resize_width: Some(size),
            resize_height: None,
            size,
            crop_x: 0,
            crop_y: centered_offset(scaled_height, size),
        }
    }
}

/// `target / along * other`, the proportional length of the other side.
fn scale(target: u32, along: u32, other: u32) -> f64 {
    if along == 0 {
        return 0.0;
    }
    target as f64 / along as f64 * other as f64
}

fn centered_offset(scaled: f64, size: u32) -> u32 {
    ((scaled - size as f64) / 2.0).round().max(0.0) as u32
}

/// Calculate the output size of a resize step.
///
/// Mirrors the geometry semantics of the classic raster tools:
/// - [`ResizeMode::Fit`]: largest size that fits inside the box, aspect preserved
/// - [`ResizeMode::Cover`]: smallest size that covers the box, aspect preserved
/// - [`ResizeMode::ShrinkOnly`]: like `Fit`, but only when the source exceeds the box
///
/// A missing (or zero) side is unconstrained; with both missing the source
/// size is returned unchanged.
pub fn calculate_resize_dimensions(
    source: Dimensions,
    width: Option<u32>,
    height: Option<u32>,
    mode: ResizeMode,
) -> Dimensions {
    let width = width.filter(|&w| w > 0);
    let height = height.filter(|&h| h > 0);
    if source.width == 0 || source.height == 0 {
        return source;
    }

    let sx = width.map(|w| w as f64 / source.width as f64);
    let sy = height.map(|h| h as f64 / source.height as f64);

    let factor = match (sx, sy) {
        (None, None) => return source,
        (Some(s), None) | (None, Some(s)) => s,
        (Some(x), Some(y)) => match mode {
            ResizeMode::Cover => x.max(y),
            ResizeMode::Fit | ResizeMode::ShrinkOnly => x.min(y),
        },
    };

    if mode == ResizeMode::ShrinkOnly && factor >= 1.0 {
        return source;
    }

    Dimensions {
        width: ((source.width as f64 * factor).round() as u32).max(1),
        height: ((source.height as f64 * factor).round() as u32).max(1),
    }
}

/// Sizing rules for the watermark overlay, all heights in percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatermarkRules {
    /// Default overlay height relative to the normalized image height.
    pub min_height_percent: u32,
    /// Overlay height used for images shorter than `small_image_threshold`.
    pub small_image_height_percent: u32,
    /// Image height (px) below which `small_image_height_percent` applies.
    pub small_image_threshold: u32,
}

impl Default for WatermarkRules {
    fn default() -> Self {
        Self {
            min_height_percent: 20,
            small_image_height_percent: 45,
            small_image_threshold: 300,
        }
    }
}

/// Computed watermark geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatermarkBox {
    /// Percentage that was selected from [`WatermarkRules`].
    pub height_percent: u32,
    /// Image height rounded down to a multiple of 100.
    pub normalized_height: u32,
    /// Target overlay height (`wh`).
    pub overlay_height: u32,
    /// Overlay width scaled from the asset's aspect ratio (`ww`).
    pub overlay_width: u32,
}

impl WatermarkBox {
    /// The box handed to the compositor as `(box_width, box_height)`.
    ///
    /// This is `overlay_height x overlay_width`: the height-derived value
    /// lands in the width slot. Kept as-is so existing output does not change.
    pub fn geometry(&self) -> (u32, u32) {
        (self.overlay_height, self.overlay_width)
    }

    /// Geometry string in `WxH` form.
    pub fn geometry_string(&self) -> String {
        let (w, h) = self.geometry();
        format!("{w}x{h}")
    }
}

/// Calculate the watermark overlay size for an image of the given size.
///
/// `image` is the size of the already-transformed image, `watermark` the
/// native size of the overlay asset.
pub fn calculate_watermark_box(
    image: Dimensions,
    watermark: Dimensions,
    rules: &WatermarkRules,
) -> WatermarkBox {
    let height_percent = if image.height < rules.small_image_threshold {
        rules.small_image_height_percent
    } else {
        rules.min_height_percent
    };

    let normalized_height = image.height - image.height % 100;
    let overlay_height = normalized_height / 100 * height_percent;
    let overlay_width = if watermark.height == 0 {
        0
    } else {
        (overlay_height as f64 / watermark.height as f64 * watermark.width as f64).round() as u32
    };

    WatermarkBox {
        height_percent,
        normalized_height,
        overlay_height,
        overlay_width,
    }
}

/// Resolve the encoding quality: the requested value verbatim, else the default.
pub fn resolve_quality(requested: Option<u32>, default: Quality) -> Quality {
    requested.map(Quality::new).unwrap_or(default)
}

/// Gaussian sigma for a `radius x sigma` blur request.
///
/// A positive sigma wins. With only a radius the sigma is derived as
/// `radius / 2`; with neither there is nothing to blur.
pub fn effective_blur_sigma(radius: f32, sigma: f32) -> Option<f32> {
    if sigma > 0.0 {
        Some(sigma)
    } else if radius > 0.0 {
        Some(radius / 2.0)
    } else {
        None
    }
}

/// Offset that centers `inner` within `outer` on one axis (negative when larger).
pub fn center_offset(outer: u32, inner: u32) -> i64 {
    (outer as i64 - inner as i64) / 2
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims(width: u32, height: u32) -> Dimensions {
        Dimensions { width, height }
    }

    // =========================================================================
    // calculate_square_geometry tests
    // =========================================================================

    #[test]
    fn square_landscape_center_crops_horizontally() {
        let g = calculate_square_geometry(dims(800, 400), Some(640), Some(400));
        assert_eq!(g.resize_width, None);
        assert_eq!(g.resize_height, Some(400));
        assert_eq!(g.size, 400);
        assert_eq!(g.crop_x, 200);
        assert_eq!(g.crop_y, 0);
    }

    #[test]
    fn square_landscape_downscales_before_crop() {
        // 1600x800 → height 400, width 800 → crop x = 200
        let g = calculate_square_geometry(dims(1600, 800), None, Some(400));
        assert_eq!(g.size, 400);
        assert_eq!(g.crop_x, 200);
    }

    #[test]
    fn square_landscape_clamps_to_original_height() {
        // s=640 for an original height of 318
        let g = calculate_square_geometry(dims(500, 318), Some(640), Some(640));
        assert_eq!(g.size, 318);
        assert_eq!(g.resize_height, Some(318));
        assert_eq!(g.crop_x, 91);
    }

    #[test]
    fn square_portrait_clamps_requested_width() {
        let g = calculate_square_geometry(dims(300, 600), Some(1000), Some(1000));
        assert_eq!(g.resize_width, Some(300));
        assert_eq!(g.resize_height, None);
        assert_eq!(g.size, 300);
        assert_eq!(g.crop_x, 0);
        assert_eq!(g.crop_y, 150);
    }

    #[test]
    fn square_portrait_uses_width_not_height() {
        // Height is ignored for portraits
        let g = calculate_square_geometry(dims(400, 1000), Some(200), Some(50));
        assert_eq!(g.size, 200);
        assert_eq!(g.crop_y, 150); // 200/400*1000 = 500, (500-200)/2
    }

    #[test]
    fn square_equal_sides_take_landscape_branch() {
        let g = calculate_square_geometry(dims(500, 500), Some(100), Some(200));
        assert_eq!(g.resize_height, Some(200));
        assert_eq!(g.resize_width, None);
        assert_eq!((g.crop_x, g.crop_y), (0, 0));
    }

    #[test]
    fn square_rounds_half_pixel_offsets_up() {
        // 201x100 → crop x = round((201 - 100) / 2) = round(50.5)
        let g = calculate_square_geometry(dims(201, 100), None, Some(100));
        assert_eq!(g.crop_x, 51);
    }

    #[test]
    fn square_missing_request_keeps_original_side() {
        let g = calculate_square_geometry(dims(300, 200), None, None);
        assert_eq!(g.size, 200);
        assert_eq!(g.crop_x, 50);
    }

    // =========================================================================
    // calculate_resize_dimensions tests
    // =========================================================================

    #[test]
    fn resize_fit_keeps_aspect_inside_box() {
        let d = calculate_resize_dimensions(dims(800, 600), Some(400), Some(400), ResizeMode::Fit);
        assert_eq!(d, dims(400, 300));
    }

    #[test]
    fn resize_fit_enlarges_small_source() {
        let d = calculate_resize_dimensions(dims(100, 50), Some(400), Some(400), ResizeMode::Fit);
        assert_eq!(d, dims(400, 200));
    }

    #[test]
    fn resize_cover_fills_box() {
        let d =
            calculate_resize_dimensions(dims(800, 600), Some(400), Some(400), ResizeMode::Cover);
        assert_eq!(d, dims(533, 400));
    }

    #[test]
    fn resize_shrink_only_leaves_small_source() {
        let d = calculate_resize_dimensions(
            dims(200, 100),
            Some(400),
            Some(400),
            ResizeMode::ShrinkOnly,
        );
        assert_eq!(d, dims(200, 100));
    }

    #[test]
    fn resize_shrink_only_shrinks_large_source() {
        let d = calculate_resize_dimensions(
            dims(1000, 500),
            Some(400),
            Some(400),
            ResizeMode::ShrinkOnly,
        );
        assert_eq!(d, dims(400, 200));
    }

    #[test]
    fn resize_single_axis_is_proportional() {
        let d = calculate_resize_dimensions(dims(800, 400), None, Some(200), ResizeMode::Fit);
        assert_eq!(d, dims(400, 200));
        let d = calculate_resize_dimensions(dims(300, 600), Some(150), None, ResizeMode::Fit);
        assert_eq!(d, dims(150, 300));
    }

    #[test]
    fn resize_without_box_is_identity() {
        let d = calculate_resize_dimensions(dims(640, 480), None, Some(0), ResizeMode::Fit);
        assert_eq!(d, dims(640, 480));
    }

    // =========================================================================
    // calculate_watermark_box tests
    // =========================================================================

    #[test]
    fn watermark_small_image_uses_larger_percent() {
        let b = calculate_watermark_box(dims(400, 250), dims(200, 100), &WatermarkRules::default());
        assert_eq!(b.height_percent, 45);
        assert_eq!(b.normalized_height, 200);
        assert_eq!(b.overlay_height, 90);
        assert_eq!(b.overlay_width, 180);
    }

    #[test]
    fn watermark_threshold_is_exclusive() {
        let b = calculate_watermark_box(dims(400, 300), dims(200, 100), &WatermarkRules::default());
        assert_eq!(b.height_percent, 20);
        assert_eq!(b.overlay_height, 60);
    }

    #[test]
    fn watermark_normalizes_height_down_to_hundreds() {
        let b = calculate_watermark_box(dims(1200, 799), dims(300, 100), &WatermarkRules::default());
        assert_eq!(b.normalized_height, 700);
        assert_eq!(b.overlay_height, 140);
        assert_eq!(b.overlay_width, 420);
    }

    #[test]
    fn watermark_geometry_puts_height_in_width_slot() {
        let b = calculate_watermark_box(dims(1000, 1000), dims(400, 100), &WatermarkRules::default());
        assert_eq!(b.overlay_height, 200);
        assert_eq!(b.overlay_width, 800);
        assert_eq!(b.geometry(), (200, 800));
        assert_eq!(b.geometry_string(), "200x800");
    }

    #[test]
    fn watermark_tiny_image_collapses_to_zero_box() {
        let b = calculate_watermark_box(dims(90, 90), dims(200, 100), &WatermarkRules::default());
        assert_eq!(b.normalized_height, 0);
        assert_eq!(b.geometry(), (0, 0));
    }

    // =========================================================================
    // misc
    // =========================================================================

    #[test]
    fn quality_defaults_when_unset() {
        assert_eq!(resolve_quality(None, Quality::default()).value(), 75);
        assert_eq!(resolve_quality(Some(40), Quality::default()).value(), 40);
    }

    #[test]
    fn quality_passes_out_of_range_through() {
        assert_eq!(resolve_quality(Some(250), Quality::default()).value(), 250);
    }

    #[test]
    fn blur_sigma_selection() {
        assert_eq!(effective_blur_sigma(0.0, 3.0), Some(3.0));
        assert_eq!(effective_blur_sigma(4.0, 0.0), Some(2.0));
        assert_eq!(effective_blur_sigma(0.0, 0.0), None);
    }

    #[test]
    fn center_offset_handles_overflow() {
        assert_eq!(center_offset(400, 300), 50);
        assert_eq!(center_offset(400, 533), -66);
    }
}
