//! Image processing in pure Rust, on top of the `image` crate.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image::image_dimensions` |
//! | **Render** | decode → geometry steps → effects → encode |
//! | **Composite** | `image::imageops::overlay` with a dissolved overlay |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for geometry math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Color**: Hex colors and HSL modulation
//! - **Backend**: [`RasterEngine`] trait + [`RustEngine`]
//! - **Operations**: Request options → transform and watermark plans

pub mod backend;
mod calculations;
mod color;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, RasterEngine};
pub use calculations::{
    SquareGeometry, WatermarkBox, WatermarkRules, calculate_resize_dimensions,
    calculate_square_geometry, calculate_watermark_box,
};
pub use color::{Color, ParseColorError};
pub use operations::{OverlayConfig, get_dimensions, plan_transform, plan_watermark};
pub use params::{
    CompositeParams, Effect, GeometryOp, Gravity, Quality, RenderParams, ResizeMode,
    TransformPlan,
};
pub use rust_backend::{RustEngine, supported_input_extensions};
