//! The manipulation pipeline.
//!
//! One invocation takes an [`ImageRequest`] and a byte stream, renders the
//! requested geometry and effects into `tmp_file`, optionally composites the
//! watermark over the written result, stats the file and settles exactly once.
//!
//! ```text
//! Start → GeometryApplied → EffectsApplied → MetadataStripped → Written
//!       → [WatermarkApplied] → Stated → resolved | rejected
//! ```
//!
//! Engine calls are blocking and run on tokio's blocking pool. The geometry,
//! effect and strip stages are carried by a single [`TransformPlan`] and
//! executed by one `render` call; they are logged as separate transitions so a
//! trace still shows the full sequence.
//!
//! Callers that want a handle instead of awaiting inline use
//! [`Manipulator::spawn`], which returns a [`PendingImage`] backed by a
//! oneshot channel.
//!
//! [`TransformPlan`]: crate::imaging::TransformPlan

use crate::config::ManipulateConfig;
use crate::imaging::{
    BackendError, RasterEngine, RenderParams, plan_transform, plan_watermark,
};
use crate::request::ImageRequest;
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Pipeline position. Errors carry the stage that failed to complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    GeometryApplied,
    EffectsApplied,
    MetadataStripped,
    Written,
    WatermarkApplied,
    Stated,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Start => "start",
            Stage::GeometryApplied => "geometry applied",
            Stage::EffectsApplied => "effects applied",
            Stage::MetadataStripped => "metadata stripped",
            Stage::Written => "written",
            Stage::WatermarkApplied => "watermark applied",
            Stage::Stated => "stated",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum ManipulateError {
    /// The source stream, the written file or the watermark asset could not be read.
    #[error("failed to read {what} ({stage}): {source}")]
    SourceRead {
        stage: Stage,
        what: String,
        #[source]
        source: BackendError,
    },
    /// Rendering or compositing did not produce an output file.
    #[error("failed to write {} ({stage}): {source}", path.display())]
    Write {
        stage: Stage,
        path: PathBuf,
        #[source]
        source: BackendError,
    },
    #[error("failed to stat {} ({stage}): {source}", path.display())]
    Stat {
        stage: Stage,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The task driving the pipeline ended without settling.
    #[error("manipulation task ended before settling")]
    Abandoned,
}

impl ManipulateError {
    pub fn stage(&self) -> Option<Stage> {
        match self {
            ManipulateError::SourceRead { stage, .. }
            | ManipulateError::Write { stage, .. }
            | ManipulateError::Stat { stage, .. } => Some(*stage),
            ManipulateError::Abandoned => None,
        }
    }

    /// Engine failures split by direction: decode problems are read errors,
    /// everything else failed to materialize `output`.
    fn from_engine(stage: Stage, what: &str, output: &Path, source: BackendError) -> Self {
        if source.is_read_error() {
            ManipulateError::SourceRead {
                stage,
                what: what.to_string(),
                source,
            }
        } else {
            ManipulateError::Write {
                stage,
                path: output.to_path_buf(),
                source,
            }
        }
    }
}

pub type ManipulateResult = Result<ImageRequest, ManipulateError>;

/// Runs requests through a raster engine with a fixed configuration.
pub struct Manipulator<E> {
    engine: Arc<E>,
    config: Arc<ManipulateConfig>,
}

impl<E> Clone for Manipulator<E> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            config: Arc::clone(&self.config),
        }
    }
}

impl<E: RasterEngine + 'static> Manipulator<E> {
    pub fn new(engine: E, config: ManipulateConfig) -> Self {
        Self {
            engine: Arc::new(engine),
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &ManipulateConfig {
        &self.config
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Run the full pipeline for one request.
    ///
    /// On success the returned request has `size` set to the byte length of
    /// `tmp_file`. On failure nothing is returned; whatever was already
    /// written to `tmp_file` stays on disk.
    pub async fn manipulate<R>(&self, mut img: ImageRequest, source: R) -> ManipulateResult
    where
        R: AsyncRead + Unpin,
    {
        let started = Instant::now();
        debug!(
            tmp_file = %img.tmp_file.display(),
            filename = img.filename(),
            action = ?img.options.action,
            watermark = img.options.watermark,
            "manipulating image"
        );

        match self.run(&img, source).await {
            Ok(size) => {
                img.size = Some(size);
                info!(
                    tmp_file = %img.tmp_file.display(),
                    size,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "image manipulated"
                );
                Ok(img)
            }
            Err(e) => {
                warn!(
                    tmp_file = %img.tmp_file.display(),
                    stage = ?e.stage(),
                    error = %e,
                    "image manipulation failed"
                );
                Err(e)
            }
        }
    }

    /// Run the pipeline on the current runtime and return a handle that
    /// resolves once it settles.
    pub fn spawn<R>(&self, img: ImageRequest, source: R) -> PendingImage
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (completion, pending) = Completion::pair();
        let this = self.clone();
        tokio::spawn(async move {
            let result = this.manipulate(img, source).await;
            completion.settle(result);
        });
        pending
    }

    async fn run<R>(&self, img: &ImageRequest, mut source: R) -> Result<u64, ManipulateError>
    where
        R: AsyncRead + Unpin,
    {
        let tmp_file = img.tmp_file.as_path();

        let mut bytes = Vec::new();
        source
            .read_to_end(&mut bytes)
            .await
            .map_err(|e| ManipulateError::SourceRead {
                stage: Stage::Start,
                what: img.filename.clone(),
                source: BackendError::Io(e),
            })?;

        let plan = plan_transform(&img.options, img.orig_dims, self.config.output.quality());
        debug!(
            tmp_file = %tmp_file.display(),
            geometry_steps = plan.geometry.len(),
            effects = plan.effects.len(),
            quality = plan.quality.value(),
            "transform planned"
        );
        transition(tmp_file, Stage::GeometryApplied);
        transition(tmp_file, Stage::EffectsApplied);
        transition(tmp_file, Stage::MetadataStripped);

        let params = RenderParams {
            source: bytes,
            format_hint: img.format_hint(),
            plan,
            output: tmp_file.to_path_buf(),
        };
        self.blocking(move |engine| engine.render(&params))
            .await
            .map_err(|e| ManipulateError::from_engine(Stage::Written, &img.filename, tmp_file, e))?;
        transition(tmp_file, Stage::Written);

        if img.options.watermark {
            self.watermark(tmp_file).await?;
            transition(tmp_file, Stage::WatermarkApplied);
        }

        let metadata = tokio::fs::metadata(tmp_file)
            .await
            .map_err(|source| ManipulateError::Stat {
                stage: Stage::Stated,
                path: tmp_file.to_path_buf(),
                source,
            })?;
        transition(tmp_file, Stage::Stated);
        Ok(metadata.len())
    }

    /// Size the overlay from the written image, then composite it in place.
    async fn watermark(&self, target: &Path) -> Result<(), ManipulateError> {
        let asset = self.config.watermark.path.clone();

        let probe = target.to_path_buf();
        let image = self
            .blocking(move |engine| engine.identify(&probe))
            .await
            .map_err(watermark_read_error(target))?;
        let probe = asset.clone();
        let overlay = self
            .blocking(move |engine| engine.identify(&probe))
            .await
            .map_err(watermark_read_error(&asset))?;

        let (watermark, params) = plan_watermark(target, image, overlay, &self.config.overlay());
        debug!(
            tmp_file = %target.display(),
            width = image.width,
            height = image.height,
            height_percent = watermark.height_percent,
            geometry = %watermark.geometry_string(),
            "compositing watermark"
        );

        let what = asset.display().to_string();
        self.blocking(move |engine| engine.composite(&params))
            .await
            .map_err(|e| ManipulateError::from_engine(Stage::WatermarkApplied, &what, target, e))
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T, BackendError>
    where
        F: FnOnce(&E) -> Result<T, BackendError> + Send + 'static,
        T: Send + 'static,
    {
        let engine = Arc::clone(&self.engine);
        tokio::task::spawn_blocking(move || f(&engine))
            .await
            .map_err(|e| BackendError::ProcessingFailed(format!("engine task panicked: {e}")))?
    }
}

fn transition(tmp_file: &Path, stage: Stage) {
    debug!(tmp_file = %tmp_file.display(), stage = %stage, "stage reached");
}

fn watermark_read_error(what: &Path) -> impl FnOnce(BackendError) -> ManipulateError {
    let what = what.display().to_string();
    move |source| ManipulateError::SourceRead {
        stage: Stage::WatermarkApplied,
        what,
        source,
    }
}

/// Sending half of a pending manipulation. Consumed by [`settle`](Self::settle),
/// so a result can be delivered at most once.
#[derive(Debug)]
pub struct Completion {
    tx: oneshot::Sender<ManipulateResult>,
}

impl Completion {
    pub fn pair() -> (Completion, PendingImage) {
        let (tx, rx) = oneshot::channel();
        (Completion { tx }, PendingImage { rx })
    }

    pub fn settle(self, result: ManipulateResult) {
        if self.tx.send(result).is_err() {
            debug!("pending image dropped before settlement");
        }
    }
}

/// Resolves to the pipeline result. If the [`Completion`] is dropped without
/// settling, resolves to [`ManipulateError::Abandoned`].
#[derive(Debug)]
pub struct PendingImage {
    rx: oneshot::Receiver<ManipulateResult>,
}

impl Future for PendingImage {
    type Output = ManipulateResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(ManipulateError::Abandoned)))
    }
}
