//! Pure Rust raster engine built on the `image` crate.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Identify | `image::ImageReader::open` + `with_guessed_format` |
//! | Decode (JPEG, PNG, TIFF, WebP, GIF) | `image::ImageReader` with guessed format, filename hint as fallback |
//! | Resize | `image::imageops::resize` with `Lanczos3` filter |
//! | Extent | background canvas + `image::imageops::overlay` |
//! | Crop | `image::DynamicImage::crop_imm` |
//! | Blur | `image::imageops::blur` (gaussian) |
//! | Modulate | per-pixel HSL ([`modulate_pixel`]) |
//! | Composite | alpha-scaled overlay + `image::imageops::overlay` |
//! | Encode | `JpegEncoder` / `PngEncoder` / `WebPEncoder` (lossless) / `AvifEncoder` |
//!
//! Only pixels are decoded, so EXIF, ICC profiles and text chunks are dropped
//! on every write.

use super::backend::{BackendError, Dimensions, RasterEngine};
use super::calculations::{calculate_resize_dimensions, center_offset, effective_blur_sigma};
use super::color::{Color, modulate_pixel};
use super::params::{
    CompositeParams, Effect, GeometryOp, Gravity, Quality, RenderParams, ResizeMode,
};
use image::codecs::png::{CompressionType, FilterType as PngFilter};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader, Rgba, RgbaImage};
use std::io::{BufWriter, Cursor};
use std::path::Path;
use std::sync::LazyLock;

const DECODE_CANDIDATES: &[(&str, ImageFormat)] = &[
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("png", ImageFormat::Png),
    ("gif", ImageFormat::Gif),
    ("tif", ImageFormat::Tiff),
    ("tiff", ImageFormat::Tiff),
    ("webp", ImageFormat::WebP),
];

static SUPPORTED_EXTENSIONS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    DECODE_CANDIDATES
        .iter()
        .filter(|(_, fmt)| fmt.reading_enabled())
        .map(|(ext, _)| *ext)
        .collect()
});

/// Returns the set of image file extensions that have working decoders compiled in.
pub fn supported_input_extensions() -> &'static [&'static str] {
    &SUPPORTED_EXTENSIONS
}

/// Raster engine using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustEngine;

impl RustEngine {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode in-memory image bytes.
///
/// The byte signature wins over the hint; the hint only helps formats that
/// cannot be sniffed.
fn decode_bytes(
    bytes: &[u8],
    hint: Option<ImageFormat>,
    what: &str,
) -> Result<DynamicImage, BackendError> {
    let decode_err = |reason: String| BackendError::Decode {
        what: what.to_string(),
        reason,
    };
    let mut reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| decode_err(e.to_string()))?;
    if reader.format().is_none() {
        if let Some(format) = hint {
            reader.set_format(format);
        }
    }
    reader.decode().map_err(|e| decode_err(e.to_string()))
}

/// Load and decode an image from disk, returning the format its bytes are in.
///
/// The extension is only a fallback: written artifacts often have none, or one
/// that disagrees with the encoder that produced them.
fn load_image(path: &Path) -> Result<(DynamicImage, Option<ImageFormat>), BackendError> {
    let bytes = std::fs::read(path).map_err(|e| BackendError::Decode {
        what: path.display().to_string(),
        reason: e.to_string(),
    })?;
    let hint = ImageFormat::from_path(path).ok();
    let format = image::guess_format(&bytes).ok().or(hint);
    let image = decode_bytes(&bytes, hint, &path.display().to_string())?;
    Ok((image, format))
}

/// Mutable state threaded through the geometry steps.
struct Canvas {
    image: DynamicImage,
    background: Color,
    gravity: Gravity,
}

impl Canvas {
    fn new(image: DynamicImage) -> Self {
        Self {
            image,
            background: Color::WHITE,
            gravity: Gravity::default(),
        }
    }

    fn dimensions(&self) -> Dimensions {
        let (width, height) = self.image.dimensions();
        Dimensions { width, height }
    }

    fn apply(&mut self, op: &GeometryOp) {
        match *op {
            GeometryOp::Resize {
                width,
                height,
                mode,
            } => self.resize(width, height, mode),
            GeometryOp::Background(color) => self.background = color,
            GeometryOp::Gravity(gravity) => self.gravity = gravity,
            GeometryOp::Extent { width, height } => self.extent(width, height),
            // only read by drawing primitives, which are never issued here
            GeometryOp::Fill(_) => {}
            GeometryOp::Crop {
                width,
                height,
                x,
                y,
            } => self.image = self.image.crop_imm(x, y, width, height),
        }
    }

    fn resize(&mut self, width: Option<u32>, height: Option<u32>, mode: ResizeMode) {
        let current = self.dimensions();
        let target = calculate_resize_dimensions(current, width, height, mode);
        if target != current {
            self.image = self
                .image
                .resize_exact(target.width, target.height, FilterType::Lanczos3);
        }
    }

    fn extent(&mut self, width: u32, height: u32) {
        let mut canvas = RgbaImage::from_pixel(width, height, Rgba(self.background.to_rgba()));
        let (x, y) = place(self.gravity, (width, height), self.image.dimensions());
        image::imageops::overlay(&mut canvas, &self.image.to_rgba8(), x, y);
        self.image = DynamicImage::ImageRgba8(canvas);
    }

    fn apply_effect(&mut self, effect: &Effect) {
        match *effect {
            Effect::Blur { radius, sigma } => {
                if let Some(sigma) = effective_blur_sigma(radius, sigma) {
                    self.image = self.image.blur(sigma);
                }
            }
            Effect::Modulate {
                brightness,
                saturation,
                hue,
            } => {
                let mut rgba = self.image.to_rgba8();
                for px in rgba.pixels_mut() {
                    let [r, g, b, a] = px.0;
                    let [r, g, b] = modulate_pixel([r, g, b], brightness, saturation, hue);
                    *px = Rgba([r, g, b, a]);
                }
                self.image = DynamicImage::ImageRgba8(rgba);
            }
        }
    }
}

/// Top-left position of `inner` inside `outer` for the given gravity.
fn place(gravity: Gravity, outer: (u32, u32), inner: (u32, u32)) -> (i64, i64) {
    match gravity {
        Gravity::NorthWest => (0, 0),
        Gravity::Center => (
            center_offset(outer.0, inner.0),
            center_offset(outer.1, inner.1),
        ),
    }
}

/// Pick the output format: explicit override, then the output extension,
/// then the decoded source's format, then PNG.
fn output_format(
    explicit: Option<ImageFormat>,
    path: &Path,
    source: Option<ImageFormat>,
) -> ImageFormat {
    explicit
        .or_else(|| ImageFormat::from_path(path).ok())
        .or(source)
        .unwrap_or(ImageFormat::Png)
}

/// PNG zlib effort from the quality tens digit.
fn png_compression(quality: Quality) -> CompressionType {
    match quality.value() / 10 {
        0..=2 => CompressionType::Fast,
        3..=6 => CompressionType::Default,
        _ => CompressionType::Best,
    }
}

/// Encode and save an image in the given format.
fn save_image(
    img: &DynamicImage,
    path: &Path,
    format: ImageFormat,
    quality: Quality,
) -> Result<(), BackendError> {
    let encode_err = |e: image::ImageError| BackendError::Encode {
        path: path.display().to_string(),
        reason: e.to_string(),
    };
    let file = std::fs::File::create(path)?;
    let mut writer = BufWriter::new(file);

    match format {
        ImageFormat::Jpeg => {
            let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(
                &mut writer,
                quality.encoder_value(),
            );
            DynamicImage::ImageRgb8(img.to_rgb8())
                .write_with_encoder(encoder)
                .map_err(encode_err)?;
        }
        ImageFormat::Png => {
            let encoder = image::codecs::png::PngEncoder::new_with_quality(
                &mut writer,
                png_compression(quality),
                PngFilter::Adaptive,
            );
            img.write_with_encoder(encoder).map_err(encode_err)?;
        }
        ImageFormat::WebP => {
            let encoder = image::codecs::webp::WebPEncoder::new_lossless(&mut writer);
            DynamicImage::ImageRgba8(img.to_rgba8())
                .write_with_encoder(encoder)
                .map_err(encode_err)?;
        }
        ImageFormat::Avif => {
            let encoder = image::codecs::avif::AvifEncoder::new_with_speed_quality(
                &mut writer,
                6,
                quality.encoder_value(),
            );
            img.write_with_encoder(encoder).map_err(encode_err)?;
        }
        other => {
            DynamicImage::ImageRgba8(img.to_rgba8())
                .write_to(&mut writer, other)
                .map_err(encode_err)?;
        }
    }

    std::io::Write::flush(&mut writer)?;
    Ok(())
}

/// Scale an overlay's alpha channel by `percent`.
fn dissolve(overlay: &mut RgbaImage, percent: u32) {
    let factor = percent.min(100) as f32 / 100.0;
    for px in overlay.pixels_mut() {
        px.0[3] = (px.0[3] as f32 * factor).round() as u8;
    }
}

impl RasterEngine for RustEngine {
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
        let decode_err = |reason: String| BackendError::Decode {
            what: path.display().to_string(),
            reason,
        };
        let (width, height) = ImageReader::open(path)
            .map_err(|e| decode_err(e.to_string()))?
            .with_guessed_format()
            .map_err(|e| decode_err(e.to_string()))?
            .into_dimensions()
            .map_err(|e| decode_err(e.to_string()))?;
        Ok(Dimensions { width, height })
    }

    fn render(&self, params: &RenderParams) -> Result<(), BackendError> {
        let source = decode_bytes(&params.source, params.format_hint, "source image")?;
        let source_format = image::guess_format(&params.source)
            .ok()
            .or(params.format_hint);

        let mut canvas = Canvas::new(source);
        for op in &params.plan.geometry {
            canvas.apply(op);
        }
        for effect in &params.plan.effects {
            canvas.apply_effect(effect);
        }

        let dims = canvas.dimensions();
        if dims.width == 0 || dims.height == 0 {
            return Err(BackendError::ProcessingFailed(
                "geometry produced an empty image".to_string(),
            ));
        }

        let format = output_format(params.plan.format, &params.output, source_format);
        save_image(&canvas.image, &params.output, format, params.plan.quality)
    }

    fn composite(&self, params: &CompositeParams) -> Result<(), BackendError> {
        let (base, base_format) = load_image(&params.base)?;
        let (overlay, _) = load_image(&params.overlay)?;

        let (box_w, box_h) = params.geometry;
        let (ow, oh) = overlay.dimensions();
        let target = calculate_resize_dimensions(
            Dimensions {
                width: ow,
                height: oh,
            },
            Some(box_w),
            Some(box_h),
            ResizeMode::Fit,
        );
        let mut overlay = if (target.width, target.height) == (ow, oh) {
            overlay.to_rgba8()
        } else {
            image::imageops::resize(
                &overlay.to_rgba8(),
                target.width,
                target.height,
                FilterType::Lanczos3,
            )
        };
        dissolve(&mut overlay, params.dissolve);

        let mut composed = base.to_rgba8();
        let (x, y) = place(
            params.gravity,
            composed.dimensions(),
            overlay.dimensions(),
        );
        image::imageops::overlay(&mut composed, &overlay, x, y);

        // keep whatever encoding render chose, even against the extension
        let format = output_format(base_format, &params.output, None);
        save_image(
            &DynamicImage::ImageRgba8(composed),
            &params.output,
            format,
            params.quality,
        )
    }
}
