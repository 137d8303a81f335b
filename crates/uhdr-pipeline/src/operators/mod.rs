//! The operator catalog.
//!
//! Every operator is a pure function from an input [`ColorImage`] and a
//! parameter set to a new image. Inputs are never mutated, no state is
//! carried between calls, and neutral parameters return an exact copy
//! of the input. Final values are clipped to the image's valid range
//! (see [`ColorImage::clip`]).
//!
//! [`OperatorParams`] is the tagged union of every operator's parameter
//! type. It is validated on construction (via [`OperatorParams::validate`]
//! or [`OperatorParams::from_value`]) so evaluation never sees an
//! out-of-domain value.

pub mod color_editor;
pub mod contrast;
pub mod exposure;
pub mod geometry;
pub mod lightness_mask;
pub mod saturation;
pub mod tone_curve;

use std::fmt;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

pub use color_editor::{ColorEdit, ColorEditorParams, ColorSelection};
pub use contrast::ContrastParams;
pub use exposure::ExposureParams;
pub use geometry::GeometryParams;
pub use lightness_mask::LightnessMaskParams;
pub use saturation::{SaturationMethod, SaturationParams};
pub use tone_curve::ToneCurveParams;

use crate::image::{ColorImage, clip_value};
use crate::types::PipelineError;

/// Images with at least this many pixels are processed row-parallel.
///
/// Every operator works per pixel (or per output pixel for geometry), so
/// parallel and sequential evaluation produce identical results.
pub const PARALLEL_THRESHOLD: u64 = 64 * 1024;

/// The closed set of operator kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperatorKind {
    /// Exposure compensation in stops.
    Exposure,
    /// S-curve contrast around mid-gray.
    Contrast,
    /// Luminance tone curve through named control points.
    ToneCurve,
    /// Zone visualization by lightness.
    LightnessMask,
    /// Global HSV saturation.
    Saturation,
    /// Selective color edit by lightness, chroma and hue.
    ColorEditor,
    /// Rotation and aspect-ratio crop.
    Geometry,
}

impl OperatorKind {
    /// All kinds, in canonical pipeline order of first appearance.
    pub const ALL: [Self; 7] = [
        Self::Exposure,
        Self::Contrast,
        Self::ToneCurve,
        Self::LightnessMask,
        Self::Saturation,
        Self::ColorEditor,
        Self::Geometry,
    ];

    /// The serialized (lowercase) name of this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Exposure => "exposure",
            Self::Contrast => "contrast",
            Self::ToneCurve => "tonecurve",
            Self::LightnessMask => "lightnessmask",
            Self::Saturation => "saturation",
            Self::ColorEditor => "coloreditor",
            Self::Geometry => "geometry",
        }
    }
}

impl fmt::Display for OperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Parameters of one node, tagged by operator kind.
#[derive(Debug, Clone, PartialEq)]
pub enum OperatorParams {
    /// See [`ExposureParams`].
    Exposure(ExposureParams),
    /// See [`ContrastParams`].
    Contrast(ContrastParams),
    /// See [`ToneCurveParams`].
    ToneCurve(ToneCurveParams),
    /// See [`LightnessMaskParams`].
    LightnessMask(LightnessMaskParams),
    /// See [`SaturationParams`].
    Saturation(SaturationParams),
    /// See [`ColorEditorParams`].
    ColorEditor(ColorEditorParams),
    /// See [`GeometryParams`].
    Geometry(GeometryParams),
}

impl OperatorParams {
    /// Default parameters for `kind`.
    #[must_use]
    pub fn default_for(kind: OperatorKind) -> Self {
        match kind {
            OperatorKind::Exposure => Self::Exposure(ExposureParams::default()),
            OperatorKind::Contrast => Self::Contrast(ContrastParams::default()),
            OperatorKind::ToneCurve => Self::ToneCurve(ToneCurveParams::default()),
            OperatorKind::LightnessMask => Self::LightnessMask(LightnessMaskParams::default()),
            OperatorKind::Saturation => Self::Saturation(SaturationParams::default()),
            OperatorKind::ColorEditor => Self::ColorEditor(ColorEditorParams::default()),
            OperatorKind::Geometry => Self::Geometry(GeometryParams::default()),
        }
    }

    /// The operator kind these parameters belong to.
    #[must_use]
    pub const fn kind(&self) -> OperatorKind {
        match self {
            Self::Exposure(_) => OperatorKind::Exposure,
            Self::Contrast(_) => OperatorKind::Contrast,
            Self::ToneCurve(_) => OperatorKind::ToneCurve,
            Self::LightnessMask(_) => OperatorKind::LightnessMask,
            Self::Saturation(_) => OperatorKind::Saturation,
            Self::ColorEditor(_) => OperatorKind::ColorEditor,
            Self::Geometry(_) => OperatorKind::Geometry,
        }
    }

    /// Check that every value lies in the operator's domain.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidParameterSchema`] naming the
    /// offending field.
    pub fn validate(&self) -> Result<(), PipelineError> {
        match self {
            Self::Exposure(p) => p.validate(),
            Self::Contrast(p) => p.validate(),
            Self::ToneCurve(p) => p.validate(),
            Self::LightnessMask(_) => Ok(()),
            Self::Saturation(p) => p.validate(),
            Self::ColorEditor(p) => p.validate(),
            Self::Geometry(p) => p.validate(),
        }
    }

    /// Whether applying these parameters is the identity on any image.
    ///
    /// Geometry with an explicit ratio is never reported neutral, since
    /// the crop depends on the image's own aspect.
    #[must_use]
    pub fn is_neutral(&self) -> bool {
        match self {
            Self::Exposure(p) => p.is_neutral(),
            Self::Contrast(p) => p.is_neutral(),
            Self::ToneCurve(p) => p.is_neutral(),
            Self::LightnessMask(p) => p.is_neutral(),
            Self::Saturation(p) => p.is_neutral(),
            Self::ColorEditor(p) => p.is_neutral(),
            Self::Geometry(p) => p.is_neutral(),
        }
    }

    /// Decode a plain key/value map for `kind`, then validate it.
    ///
    /// Unknown keys, missing keys and wrongly typed values are all
    /// rejected.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidParameterSchema`].
    pub fn from_value(kind: OperatorKind, value: serde_json::Value) -> Result<Self, PipelineError> {
        fn decode<T: serde::de::DeserializeOwned>(
            kind: OperatorKind,
            value: serde_json::Value,
        ) -> Result<T, PipelineError> {
            serde_json::from_value(value).map_err(|e| PipelineError::schema(format!("{kind}: {e}")))
        }

        let params = match kind {
            OperatorKind::Exposure => Self::Exposure(decode(kind, value)?),
            OperatorKind::Contrast => Self::Contrast(decode(kind, value)?),
            OperatorKind::ToneCurve => Self::ToneCurve(decode(kind, value)?),
            OperatorKind::LightnessMask => Self::LightnessMask(decode(kind, value)?),
            OperatorKind::Saturation => Self::Saturation(decode(kind, value)?),
            OperatorKind::ColorEditor => Self::ColorEditor(decode(kind, value)?),
            OperatorKind::Geometry => Self::Geometry(decode(kind, value)?),
        };
        params.validate()?;
        Ok(params)
    }

    /// Encode as a plain key/value map.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidParameterSchema`] if serialization
    /// fails.
    pub fn to_value(&self) -> Result<serde_json::Value, PipelineError> {
        serde_json::to_value(self).map_err(|e| PipelineError::schema(e.to_string()))
    }

    /// Apply the operator to `image`, producing a new image.
    #[must_use]
    pub fn compute(&self, image: &ColorImage) -> ColorImage {
        match self {
            Self::Exposure(p) => exposure::apply(image, p),
            Self::Contrast(p) => contrast::apply(image, p),
            Self::ToneCurve(p) => tone_curve::apply(image, p),
            Self::LightnessMask(p) => lightness_mask::apply(image, p),
            Self::Saturation(p) => saturation::apply(image, p),
            Self::ColorEditor(p) => color_editor::apply(image, p),
            Self::Geometry(p) => geometry::apply(image, p),
        }
    }
}

impl Serialize for OperatorParams {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Exposure(p) => p.serialize(serializer),
            Self::Contrast(p) => p.serialize(serializer),
            Self::ToneCurve(p) => p.serialize(serializer),
            Self::LightnessMask(p) => p.serialize(serializer),
            Self::Saturation(p) => p.serialize(serializer),
            Self::ColorEditor(p) => p.serialize(serializer),
            Self::Geometry(p) => p.serialize(serializer),
        }
    }
}

/// Reject non-finite values with a message naming the field.
pub(crate) fn require_finite(field: &str, value: f32) -> Result<(), PipelineError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(PipelineError::schema(format!("{field} must be finite, got {value}")))
    }
}

/// Produce a new image by mapping every pixel through `f` and clipping
/// the result.
///
/// Rows are distributed over the rayon pool for images of at least
/// [`PARALLEL_THRESHOLD`] pixels.
pub(crate) fn map_pixels<F>(image: &ColorImage, f: F) -> ColorImage
where
    F: Fn([f32; 3]) -> [f32; 3] + Sync,
{
    let hdr = image.is_hdr();
    let mut pixels = image.pixels().clone();
    let row_len = pixels.width() as usize * 3;
    if row_len == 0 {
        return image.with_pixels(pixels);
    }

    let map_row = |row: &mut [f32]| {
        for px in row.chunks_exact_mut(3) {
            let out = f([px[0], px[1], px[2]]);
            px[0] = clip_value(out[0], hdr);
            px[1] = clip_value(out[1], hdr);
            px[2] = clip_value(out[2], hdr);
        }
    };

    if image.dimensions().pixel_count() >= PARALLEL_THRESHOLD {
        pixels.par_chunks_mut(row_len).for_each(map_row);
    } else {
        pixels.chunks_mut(row_len).for_each(map_row);
    }
    image.with_pixels(pixels)
}
