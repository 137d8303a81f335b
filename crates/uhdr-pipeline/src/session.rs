//! Edit session: the pipe, original image and current result for the
//! one image being edited.
//!
//! Callers keep an [`EditSession`] per selected image instead of global
//! "current image" state. Every edit goes through the session, which
//! re-evaluates incrementally and keeps the last good result if
//! anything fails.

use log::{debug, warn};

use crate::descriptor::PipelineDescriptor;
use crate::executor::IncrementalExecutor;
use crate::image::ColorImage;
use crate::operators::OperatorParams;
use crate::pipe::ProcessPipe;
use crate::types::PipelineError;

/// Editing state for one image.
#[derive(Debug, Clone)]
pub struct EditSession {
    image_id: String,
    pipe: ProcessPipe,
    executor: IncrementalExecutor,
    current: ColorImage,
}

impl EditSession {
    /// Start editing `original`, restoring `stored` edits if given.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidParameterSchema`] if `stored` is
    /// not a canonical eleven-node pipeline.
    pub fn open(
        image_id: impl Into<String>,
        original: ColorImage,
        stored: Option<PipelineDescriptor>,
    ) -> Result<Self, PipelineError> {
        let image_id = image_id.into();
        let mut pipe = match stored {
            Some(descriptor) if descriptor.is_canonical() => ProcessPipe::from_descriptor(descriptor)?,
            Some(descriptor) => {
                warn!(
                    "rejecting stored pipeline for {image_id}: {} nodes, not canonical",
                    descriptor.len()
                );
                return Err(PipelineError::schema(format!(
                    "stored pipeline for {image_id} is not the canonical node list"
                )));
            }
            None => ProcessPipe::default(),
        };
        pipe.set_image(original);
        let mut executor = IncrementalExecutor::new();
        let current = executor.evaluate(&pipe)?;
        debug!("opened edit session for {image_id}");
        Ok(Self {
            image_id,
            pipe,
            executor,
            current,
        })
    }

    /// Replace node `index`'s parameters and re-evaluate.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::IndexOutOfRange`] or
    /// [`PipelineError::InvalidParameterSchema`]; the previous parameters
    /// and current image are kept.
    pub fn edit(&mut self, index: usize, params: OperatorParams) -> Result<&ColorImage, PipelineError> {
        let previous = self.pipe.parameters(index)?;
        self.pipe.set_parameters(index, params)?;
        match self.executor.evaluate(&self.pipe) {
            Ok(image) => {
                self.current = image;
                Ok(&self.current)
            }
            Err(e) => {
                self.pipe.set_parameters(index, previous)?;
                Err(e)
            }
        }
    }

    /// Replace node `index`'s parameters from a plain key/value map.
    ///
    /// # Errors
    ///
    /// As [`edit`](Self::edit).
    pub fn edit_json(
        &mut self,
        index: usize,
        value: serde_json::Value,
    ) -> Result<&ColorImage, PipelineError> {
        let kind = self.pipe.node(index)?.kind();
        self.edit(index, OperatorParams::from_value(kind, value)?)
    }

    /// Enable or disable node `index` and re-evaluate.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::IndexOutOfRange`]; the current image is
    /// kept.
    pub fn set_enabled(&mut self, index: usize, enabled: bool) -> Result<&ColorImage, PipelineError> {
        let previous = self.pipe.is_enabled(index)?;
        self.pipe.set_enabled(index, enabled)?;
        match self.executor.evaluate(&self.pipe) {
            Ok(image) => {
                self.current = image;
                Ok(&self.current)
            }
            Err(e) => {
                self.pipe.set_enabled(index, previous)?;
                Err(e)
            }
        }
    }

    /// Identity of the image being edited.
    #[must_use]
    pub fn image_id(&self) -> &str {
        &self.image_id
    }

    /// Whether this session belongs to `image_id`. Results for other
    /// images are stale and should be dropped.
    #[must_use]
    pub fn is_for(&self, image_id: &str) -> bool {
        self.image_id == image_id
    }

    /// The latest evaluated image.
    #[must_use]
    pub const fn current(&self) -> &ColorImage {
        &self.current
    }

    /// The unedited source image.
    #[must_use]
    pub const fn original(&self) -> Option<&ColorImage> {
        self.pipe.image()
    }

    /// The session's pipe.
    #[must_use]
    pub const fn pipe(&self) -> &ProcessPipe {
        &self.pipe
    }

    /// Snapshot of the edits, for persisting.
    #[must_use]
    pub fn descriptor(&self) -> PipelineDescriptor {
        self.pipe.to_descriptor()
    }
}
