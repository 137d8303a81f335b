//! Contrast around mid-gray.

use serde::{Deserialize, Serialize};

use super::{map_pixels, require_finite};
use crate::image::ColorImage;
use crate::types::PipelineError;

/// Lower bound of the contrast domain.
pub const CONTRAST_MIN: f32 = -100.0;
/// Upper bound of the contrast domain.
pub const CONTRAST_MAX: f32 = 100.0;

/// Parameters for [`apply`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContrastParams {
    /// Contrast amount in `[-100, 100]`. Values outside are clamped.
    pub contrast: f32,
}

impl ContrastParams {
    /// Default contrast (no change).
    pub const DEFAULT_CONTRAST: f32 = 0.0;

    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidParameterSchema`] if `contrast` is
    /// not finite.
    pub fn validate(&self) -> Result<(), PipelineError> {
        require_finite("contrast", self.contrast)
    }

    /// Whether these parameters leave every image unchanged.
    #[must_use]
    pub fn is_neutral(&self) -> bool {
        self.contrast == 0.0
    }
}

impl Default for ContrastParams {
    fn default() -> Self {
        Self {
            contrast: Self::DEFAULT_CONTRAST,
        }
    }
}

/// Slope of the contrast line for amount `c`.
///
/// `c` is clamped to `[-100, 100]` first, which keeps the denominator
/// `259 - c` at least 159.
#[must_use]
pub fn contrast_factor(c: f32) -> f32 {
    let c = c.clamp(CONTRAST_MIN, CONTRAST_MAX);
    259.0 * (c + 255.0) / (255.0 * (259.0 - c))
}

/// Apply the contrast line with slope `factor` to one channel value.
#[must_use]
pub fn apply_factor(value: f32, factor: f32) -> f32 {
    factor.mul_add(value - 0.5, 0.5)
}

/// `out = clip(factor * (in - 0.5) + 0.5)` on every channel.
#[must_use]
pub fn apply(image: &ColorImage, params: &ContrastParams) -> ColorImage {
    if params.is_neutral() {
        return image.clone();
    }
    let factor = contrast_factor(params.contrast);
    map_pixels(image, |rgb| rgb.map(|v| apply_factor(v, factor)))
}
