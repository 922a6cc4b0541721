//! Raster engine trait and shared types.
//!
//! The [`RasterEngine`] trait defines the three operations the manipulation
//! pipeline needs: identify, render and composite.
//!
//! The production implementation is
//! [`RustEngine`](super::rust_backend::RustEngine), pure Rust, built on the
//! `image` crate.

use super::params::{CompositeParams, RenderParams};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to decode {what}: {reason}")]
    Decode { what: String, reason: String },
    #[error("Failed to encode {path}: {reason}")]
    Encode { path: String, reason: String },
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

impl BackendError {
    /// Whether the error came from reading or decoding input rather than
    /// producing output.
    pub fn is_read_error(&self) -> bool {
        matches!(self, BackendError::Decode { .. })
    }
}

/// Pixel dimensions of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Trait for raster engines.
///
/// Engine calls are blocking; the async pipeline runs them on the blocking
/// thread pool, which is why implementations must be `Send + Sync`.
pub trait RasterEngine: Send + Sync {
    /// Get the dimensions of an image file.
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError>;

    /// Decode the source, apply the plan and write the result to `params.output`.
    fn render(&self, params: &RenderParams) -> Result<(), BackendError>;

    /// Composite an overlay onto an image file and write the result.
    fn composite(&self, params: &CompositeParams) -> Result<(), BackendError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::imaging::params::{Gravity, Quality, TransformPlan};
    use std::sync::Mutex;

    /// Mock engine that records operations instead of touching pixels.
    ///
    /// `render` and `composite` write `output_bytes` to the output path so
    /// that callers which stat the result see a real file. Queued dimensions
    /// are popped from the end of the list.
    #[derive(Default)]
    pub struct MockEngine {
        pub identify_results: Mutex<Vec<Dimensions>>,
        pub operations: Mutex<Vec<RecordedOp>>,
        pub output_bytes: Vec<u8>,
        pub fail_render: bool,
        pub fail_composite: bool,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Identify(String),
        Render {
            output: String,
            plan: TransformPlan,
        },
        Composite {
            base: String,
            overlay: String,
            output: String,
            dissolve: u32,
            gravity: Gravity,
            geometry: (u32, u32),
            quality: Quality,
        },
    }

    impl MockEngine {
        pub fn new() -> Self {
            Self {
                output_bytes: b"mock image bytes".to_vec(),
                ..Self::default()
            }
        }

        pub fn with_dimensions(dims: Vec<Dimensions>) -> Self {
            Self {
                identify_results: Mutex::new(dims),
                ..Self::new()
            }
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }
    }

    impl RasterEngine for MockEngine {
        fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
            self.operations
                .lock()
                .unwrap()
                .push(RecordedOp::Identify(path.to_string_lossy().to_string()));

            self.identify_results
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| BackendError::Decode {
                    what: path.display().to_string(),
                    reason: "No mock dimensions".to_string(),
                })
        }

        fn render(&self, params: &RenderParams) -> Result<(), BackendError> {
            self.operations.lock().unwrap().push(RecordedOp::Render {
                output: params.output.to_string_lossy().to_string(),
                plan: params.plan.clone(),
            });
            if self.fail_render {
                return Err(BackendError::Encode {
                    path: params.output.display().to_string(),
                    reason: "mock render failure".to_string(),
                });
            }
            std::fs::write(&params.output, &self.output_bytes)?;
            Ok(())
        }

        fn composite(&self, params: &CompositeParams) -> Result<(), BackendError> {
            self.operations.lock().unwrap().push(RecordedOp::Composite {
                base: params.base.to_string_lossy().to_string(),
                overlay: params.overlay.to_string_lossy().to_string(),
                output: params.output.to_string_lossy().to_string(),
                dissolve: params.dissolve,
                gravity: params.gravity,
                geometry: params.geometry,
                quality: params.quality,
            });
            if self.fail_composite {
                return Err(BackendError::ProcessingFailed(
                    "mock composite failure".to_string(),
                ));
            }
            let mut bytes = self.output_bytes.clone();
            bytes.extend_from_slice(b"+watermark");
            std::fs::write(&params.output, bytes)?;
            Ok(())
        }
    }

    #[test]
    fn mock_records_identify() {
        let backend = MockEngine::with_dimensions(vec![Dimensions {
            width: 800,
            height: 600,
        }]);

        let result = backend.identify(Path::new("/test/image.jpg")).unwrap();
        assert_eq!(result.width, 800);
        assert_eq!(result.height, 600);

        let ops = backend.get_operations();
        assert_eq!(ops.len(), 1);
        assert!(matches!(&ops[0], RecordedOp::Identify(p) if p == "/test/image.jpg"));
    }

    #[test]
    fn mock_identify_without_dimensions_is_read_error() {
        let backend = MockEngine::new();
        let err = backend.identify(Path::new("/missing.png")).unwrap_err();
        assert!(err.is_read_error());
    }

    #[test]
    fn mock_render_writes_output() {
        let tmp = tempfile::TempDir::new().unwrap();
        let output = tmp.path().join("out.jpg");
        let backend = MockEngine::new();

        backend
            .render(&RenderParams {
                source: Vec::new(),
                format_hint: None,
                plan: TransformPlan::new(Quality::new(90)),
                output: output.clone(),
            })
            .unwrap();

        assert_eq!(std::fs::read(&output).unwrap(), b"mock image bytes");
        assert!(matches!(
            &backend.get_operations()[0],
            RecordedOp::Render { plan, .. } if plan.quality.value() == 90
        ));
    }

    #[test]
    fn encode_error_is_not_read_error() {
        let err = BackendError::Encode {
            path: "/x.jpg".into(),
            reason: "nope".into(),
        };
        assert!(!err.is_read_error());
    }
}
