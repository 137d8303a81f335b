//! Global saturation in HSV space.

use serde::{Deserialize, Serialize};

use super::{map_pixels, require_finite};
use crate::color::{hsv_to_rgb, rgb_to_hsv};
use crate::image::ColorImage;
use crate::types::PipelineError;

/// Lower bound of the saturation domain.
pub const SATURATION_MIN: f32 = -100.0;
/// Upper bound of the saturation domain.
pub const SATURATION_MAX: f32 = 100.0;

/// How the saturation amount maps onto HSV saturation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaturationMethod {
    /// `s' = s^gamma`: weakly saturated colors move the most.
    #[default]
    Gamma,
    /// `s' = s * (1 + v/100)`.
    Linear,
}

/// Parameters for [`apply`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SaturationParams {
    /// Amount in `[-100, 100]`; values outside are clamped.
    pub saturation: f32,
    /// Mapping from amount to saturation change.
    pub method: SaturationMethod,
}

impl SaturationParams {
    /// Default amount (no change).
    pub const DEFAULT_SATURATION: f32 = 0.0;

    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidParameterSchema`] if `saturation`
    /// is not finite.
    pub fn validate(&self) -> Result<(), PipelineError> {
        require_finite("saturation", self.saturation)
    }

    /// Whether these parameters leave every image unchanged.
    #[must_use]
    pub fn is_neutral(&self) -> bool {
        self.saturation == 0.0
    }

    /// Map an HSV saturation value through this setting. The result is
    /// in `[0, 1]`.
    #[must_use]
    pub fn remap(&self, s: f32) -> f32 {
        let v = self.saturation.clamp(SATURATION_MIN, SATURATION_MAX);
        let s = s.clamp(0.0, 1.0);
        let out = match self.method {
            SaturationMethod::Gamma => {
                let gamma = if v >= 0.0 {
                    1.0 / (1.0 + v / 25.0)
                } else {
                    1.0 - v / 25.0
                };
                s.powf(gamma)
            }
            SaturationMethod::Linear => s * (1.0 + v / 100.0),
        };
        out.clamp(0.0, 1.0)
    }
}

impl Default for SaturationParams {
    fn default() -> Self {
        Self {
            saturation: Self::DEFAULT_SATURATION,
            method: SaturationMethod::default(),
        }
    }
}

/// Rescale HSV saturation; hue and value are kept.
#[must_use]
pub fn apply(image: &ColorImage, params: &SaturationParams) -> ColorImage {
    if params.is_neutral() {
        return image.clone();
    }
    map_pixels(image, |rgb| {
        let [h, s, v] = rgb_to_hsv(rgb);
        hsv_to_rgb([h, params.remap(s), v])
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn params(saturation: f32, method: SaturationMethod) -> SaturationParams {
        SaturationParams { saturation, method }
    }

    #[test]
    fn method_serializes_lowercase() {
        let json = serde_json::to_value(SaturationParams::default()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "saturation": 0.0, "method": "gamma" })
        );
    }

    #[test]
    fn gamma_boosts_and_cuts() {
        let up = params(25.0, SaturationMethod::Gamma);
        assert!((up.remap(0.25) - 0.5).abs() < 1e-6);
        let down = params(-25.0, SaturationMethod::Gamma);
        assert!((down.remap(0.5) - 0.25).abs() < 1e-6);
        assert!((up.remap(0.0)).abs() < 1e-6);
        assert!((up.remap(1.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn linear_scales_and_clamps() {
        let p = params(50.0, SaturationMethod::Linear);
        assert!((p.remap(0.4) - 0.6).abs() < 1e-6);
        assert!((p.remap(0.9) - 1.0).abs() < 1e-6);
        let off = params(-100.0, SaturationMethod::Linear);
        assert!(off.remap(0.7).abs() < 1e-6);
    }

    #[test]
    fn full_desaturation_gives_gray_with_same_value() {
        let img = ColorImage::uniform(2, 2, [0.8, 0.4, 0.2], false);
        let out = apply(&img, &params(-100.0, SaturationMethod::Linear));
        let [r, g, b] = out.pixel(1, 1);
        assert!((r - 0.8).abs() < 1e-6);
        assert!((g - 0.8).abs() < 1e-6);
        assert!((b - 0.8).abs() < 1e-6);
    }

    #[test]
    fn hdr_value_channel_is_preserved() {
        let img = ColorImage::uniform(1, 1, [4.0, 2.0, 1.0], true);
        let out = apply(&img, &params(40.0, SaturationMethod::Gamma));
        let [r, g, b] = out.pixel(0, 0);
        assert!((r - 4.0).abs() < 1e-5);
        assert!(b < 1.0 && g < 2.0);
    }

    #[test]
    fn neutral_returns_exact_copy() {
        let img = ColorImage::uniform(2, 2, [0.3, 0.6, 0.9], false);
        assert_eq!(apply(&img, &SaturationParams::default()), img);
    }
}
