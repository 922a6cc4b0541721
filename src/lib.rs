//! # Image Manipulate
//!
//! Post-upload image manipulation. A request names one geometry action plus
//! optional effects and a watermark. The pipeline turns that into a single
//! raster plan, writes the result to a temp file and reports its final size.
//!
//! # Architecture: Plan, Render, Settle
//!
//! ```text
//! 1. Plan     Options + original dims  →  TransformPlan   (pure)
//! 2. Render   source bytes + plan       →  tmp_file        (engine, blocking pool)
//! 3. Finish   [watermark] → stat        →  ImageRequest with size
//! ```
//!
//! Planning is pure, so the action table and all geometry math are unit tested
//! without decoding a pixel. Rendering goes through the [`RasterEngine`] trait;
//! tests swap in a recording mock.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`request`] | `ImageRequest`, `Options` and the closed `Action` set |
//! | [`imaging`] | Geometry math, transform plans and the pure-Rust raster engine |
//! | [`manipulate`] | The async pipeline: stages, errors, single settlement |
//! | [`config`] | `manipulate.toml` loading, validation and merging |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Immutable Plans
//!
//! A [`TransformPlan`] holds geometry steps, then effects, then quality and
//! format, in that order. The engine executes it in one call. Metadata is
//! never carried over: the engine decodes pixels only and re-encodes them.
//!
//! ## Pass-Through Without an Action
//!
//! `action: None` skips geometry entirely; effects, the watermark and the stat
//! still run. Unknown action names never get this far: they fail to parse.
//!
//! ## Watermark Sizing From the Written File
//!
//! The overlay is sized from the image as written, not the original, so a
//! resized image gets an overlay proportional to its new height.
//!
//! [`RasterEngine`]: imaging::RasterEngine
//! [`TransformPlan`]: imaging::TransformPlan

pub mod config;
pub mod imaging;
pub mod manipulate;
pub mod output;
pub mod request;

#[cfg(test)]
pub(crate) mod test_helpers;
