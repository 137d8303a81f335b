//! Exposure compensation.
//!
//! Multiplies linear pixel values by `2^EV`, so one unit is one
//! photographic stop.

use serde::{Deserialize, Serialize};

use super::{map_pixels, require_finite};
use crate::image::ColorImage;
use crate::types::PipelineError;

/// Parameters for [`apply`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExposureParams {
    /// Exposure change in stops.
    #[serde(rename = "EV")]
    pub ev: f32,
}

impl ExposureParams {
    /// Default exposure change (no change).
    pub const DEFAULT_EV: f32 = 0.0;

    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidParameterSchema`] if `ev` is not finite.
    pub fn validate(&self) -> Result<(), PipelineError> {
        require_finite("EV", self.ev)
    }

    /// Whether these parameters leave every image unchanged.
    #[must_use]
    pub fn is_neutral(&self) -> bool {
        self.ev == 0.0
    }
}

impl Default for ExposureParams {
    fn default() -> Self {
        Self {
            ev: Self::DEFAULT_EV,
        }
    }
}

/// Scale every channel by `2^ev`.
///
/// Very large `ev` values saturate: SDR output stays in `[0, 1]`, HDR
/// output stays non-negative, and zero pixels stay zero.
#[must_use]
pub fn apply(image: &ColorImage, params: &ExposureParams) -> ColorImage {
    if params.is_neutral() {
        return image.clone();
    }
    let gain = params.ev.exp2();
    map_pixels(image, |[r, g, b]| [r * gain, g * gain, b * gain])
}
