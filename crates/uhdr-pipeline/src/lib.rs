//! uhdr-pipeline: non-destructive HDR/SDR editing pipeline (sans-IO).
//!
//! An image is edited by an ordered chain of eleven parameterized
//! operators:
//! exposure -> contrast -> tone curve -> lightness mask -> saturation ->
//! five color editors -> geometry.
//!
//! The chain is held by a [`ProcessPipe`] and re-evaluated from the
//! original image on every edit, either in full ([`evaluate`]) or reusing
//! unchanged upstream results ([`IncrementalExecutor`]). Its state is
//! persisted as a [`PipelineDescriptor`].
//!
//! This crate has **no I/O dependencies** -- it decodes and encodes
//! in-memory byte slices only. All filesystem interaction lives in
//! `uhdr-io`.

pub mod color;
pub mod descriptor;
pub mod diagnostics;
pub mod downsample;
pub mod executor;
pub mod image;
pub mod operators;
pub mod pipe;
pub mod session;
pub mod types;

pub use crate::descriptor::{CANONICAL_NODES, NodeDescriptor, PipelineDescriptor};
pub use crate::diagnostics::{Clock, EvaluationDiagnostics, NodeDiagnostics};
pub use crate::downsample::DownsampleFilter;
pub use crate::executor::{IncrementalExecutor, evaluate, evaluate_with_diagnostics};
pub use crate::image::{ColorImage, ImageFormat};
pub use crate::operators::{OperatorKind, OperatorParams};
pub use crate::pipe::ProcessPipe;
pub use crate::session::EditSession;
pub use crate::types::{ColorSpace, Dimensions, PipelineError, Rgb32FImage};

/// Apply the edits described by `descriptor` to `source`.
///
/// Builds a pipe from the descriptor, binds the image and evaluates it
/// once. The result carries the descriptor as metadata.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidParameterSchema`] if the descriptor
/// holds invalid parameters or duplicate node names.
pub fn process(
    source: ColorImage,
    descriptor: PipelineDescriptor,
) -> Result<ColorImage, PipelineError> {
    let mut pipe = ProcessPipe::from_descriptor(descriptor)?;
    pipe.set_image(source);
    evaluate(&pipe)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::operators::ExposureParams;

    #[test]
    fn process_applies_descriptor() {
        let mut descriptor = PipelineDescriptor::canonical();
        descriptor.nodes[0].parameters = OperatorParams::Exposure(ExposureParams { ev: 1.0 });
        let source = ColorImage::uniform(16, 9, [0.25; 3], true);
        let out = process(source, descriptor.clone()).unwrap();
        assert!((out.pixel(3, 3)[0] - 0.5).abs() < 1e-6);
        assert_eq!(out.metadata(), Some(&descriptor));
    }

    #[test]
    fn process_rejects_invalid_descriptor() {
        let mut descriptor = PipelineDescriptor::canonical();
        descriptor.nodes[1].name = "exposure".to_owned();
        let err = process(ColorImage::uniform(1, 1, [0.0; 3], false), descriptor).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidParameterSchema(_)));
    }
}
