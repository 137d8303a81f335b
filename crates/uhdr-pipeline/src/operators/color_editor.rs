//! Selective color editing.
//!
//! A pixel is selected by its lightness, chroma and hue (all three
//! must match). Each test gives a weight of 1 inside its range that
//! falls linearly to 0 across a feather band outside it; the selection
//! weight is the product of the three. The edit (hue shift, saturation,
//! exposure, contrast) is blended in by that weight, which keeps
//! selection borders soft.

use serde::{Deserialize, Serialize};

use super::contrast::{apply_factor, contrast_factor};
use super::{map_pixels, require_finite};
use crate::color::{hsv_to_rgb, luminance, rgb_to_hsv, rgb_to_lch};
use crate::image::ColorImage;
use crate::types::PipelineError;

/// Upper end of the lightness domain.
pub const LIGHTNESS_MAX: f32 = 100.0;
/// Upper end of the chroma domain.
pub const CHROMA_MAX: f32 = 200.0;
/// Full hue circle in degrees.
pub const HUE_MAX: f32 = 360.0;

/// Feather width of the lightness test, in `L*` units.
pub const LIGHTNESS_FEATHER: f32 = 5.0;
/// Feather width of the chroma test.
pub const CHROMA_FEATHER: f32 = 5.0;
/// Feather width of the hue test, in degrees.
pub const HUE_FEATHER: f32 = 10.0;

/// Which pixels an editor acts on. Each range is `[lo, hi]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColorSelection {
    /// `L*` range within `[0, 100]`.
    pub lightness: [f32; 2],
    /// Chroma range within `[0, 200]`.
    pub chroma: [f32; 2],
    /// Hue range in degrees. `lo > hi` wraps through 0; a span of 360
    /// or more selects every hue.
    pub hue: [f32; 2],
}

impl ColorSelection {
    /// Default lightness range (everything).
    pub const DEFAULT_LIGHTNESS: [f32; 2] = [0.0, LIGHTNESS_MAX];
    /// Default chroma range (everything).
    pub const DEFAULT_CHROMA: [f32; 2] = [0.0, CHROMA_MAX];
    /// Default hue range (everything).
    pub const DEFAULT_HUE: [f32; 2] = [0.0, HUE_MAX];

    fn validate(&self) -> Result<(), PipelineError> {
        for (name, [lo, hi]) in [
            ("selection.lightness", self.lightness),
            ("selection.chroma", self.chroma),
            ("selection.hue", self.hue),
        ] {
            require_finite(name, lo)?;
            require_finite(name, hi)?;
        }
        for (name, [lo, hi]) in [
            ("selection.lightness", self.lightness),
            ("selection.chroma", self.chroma),
        ] {
            if lo > hi {
                return Err(PipelineError::schema(format!(
                    "{name}: lower bound {lo} exceeds upper bound {hi}"
                )));
            }
        }
        Ok(())
    }

    /// Selection weight in `[0, 1]` for a pixel with the given LCh.
    #[must_use]
    pub fn weight(&self, lch: [f32; 3]) -> f32 {
        let [l, c, h] = lch;
        let wl = range_weight(
            l.clamp(0.0, LIGHTNESS_MAX),
            self.lightness,
            LIGHTNESS_FEATHER,
        );
        if wl <= 0.0 {
            return 0.0;
        }
        let wc = range_weight(c.clamp(0.0, CHROMA_MAX), self.chroma, CHROMA_FEATHER);
        if wc <= 0.0 {
            return 0.0;
        }
        wl * wc * hue_weight(h, self.hue, HUE_FEATHER) * self.hue_confidence(c)
    }

    /// Hue is meaningless for achromatic pixels, so a partial hue range
    /// fades out as chroma drops below [`CHROMA_FEATHER`].
    fn hue_confidence(&self, chroma: f32) -> f32 {
        let [lo, hi] = self.hue;
        if hi - lo >= HUE_MAX {
            1.0
        } else {
            (chroma / CHROMA_FEATHER).clamp(0.0, 1.0)
        }
    }
}

impl Default for ColorSelection {
    fn default() -> Self {
        Self {
            lightness: Self::DEFAULT_LIGHTNESS,
            chroma: Self::DEFAULT_CHROMA,
            hue: Self::DEFAULT_HUE,
        }
    }
}

/// The change applied to selected pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColorEdit {
    /// Hue rotation in degrees.
    pub hue: f32,
    /// Exposure change in stops.
    pub exposure: f32,
    /// Contrast amount in `[-100, 100]`.
    pub contrast: f32,
    /// Relative saturation change: `s' = s * (1 + saturation)`.
    pub saturation: f32,
}

impl ColorEdit {
    fn validate(&self) -> Result<(), PipelineError> {
        require_finite("edit.hue", self.hue)?;
        require_finite("edit.exposure", self.exposure)?;
        require_finite("edit.contrast", self.contrast)?;
        require_finite("edit.saturation", self.saturation)
    }

    /// All deltas are zero.
    #[must_use]
    pub fn is_neutral(&self) -> bool {
        self.hue == 0.0 && self.exposure == 0.0 && self.contrast == 0.0 && self.saturation == 0.0
    }

    /// Apply the edit to one pixel, without clipping.
    #[must_use]
    pub fn edit_pixel(&self, rgb: [f32; 3]) -> [f32; 3] {
        let mut out = rgb;
        if self.hue != 0.0 || self.saturation != 0.0 {
            let [h, s, v] = rgb_to_hsv(out);
            let s = (s * (1.0 + self.saturation)).clamp(0.0, 1.0);
            out = hsv_to_rgb([h + self.hue, s, v]);
        }
        if self.exposure != 0.0 {
            let gain = self.exposure.exp2();
            out = out.map(|c| c * gain);
        }
        if self.contrast != 0.0 {
            let factor = contrast_factor(self.contrast);
            out = out.map(|c| apply_factor(c, factor));
        }
        out
    }
}

/// Parameters for [`apply`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColorEditorParams {
    /// Which pixels are edited.
    pub selection: ColorSelection,
    /// What is done to them.
    pub edit: ColorEdit,
    /// Show unselected areas as gray so the selection is visible.
    pub mask: bool,
}

impl ColorEditorParams {
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidParameterSchema`] for non-finite
    /// values or inverted lightness/chroma ranges.
    pub fn validate(&self) -> Result<(), PipelineError> {
        self.selection.validate()?;
        self.edit.validate()
    }

    /// No edit and no mask.
    #[must_use]
    pub fn is_neutral(&self) -> bool {
        !self.mask && self.edit.is_neutral()
    }
}

/// Weight of `v` against `[lo, hi]` with a linear feather of `feather`.
fn range_weight(v: f32, [lo, hi]: [f32; 2], feather: f32) -> f32 {
    let distance = if v < lo {
        lo - v
    } else if v > hi {
        v - hi
    } else {
        return 1.0;
    };
    (1.0 - distance / feather).max(0.0)
}

/// Weight of hue `h` against a possibly wrapping hue range.
fn hue_weight(h: f32, [lo, hi]: [f32; 2], feather: f32) -> f32 {
    if hi - lo >= HUE_MAX {
        return 1.0;
    }
    let width = (hi - lo).rem_euclid(HUE_MAX);
    let offset = (h - lo).rem_euclid(HUE_MAX);
    if offset <= width {
        return 1.0;
    }
    let distance = (offset - width).min(HUE_MAX - offset);
    (1.0 - distance / feather).max(0.0)
}

/// Blend the edit into selected pixels.
#[must_use]
pub fn apply(image: &ColorImage, params: &ColorEditorParams) -> ColorImage {
    if params.is_neutral() {
        return image.clone();
    }
    map_pixels(image, |rgb| {
        let w = params.selection.weight(rgb_to_lch(rgb));
        if params.mask {
            let gray = luminance(rgb);
            let edited = if w > 0.0 { params.edit.edit_pixel(rgb) } else { rgb };
            std::array::from_fn(|c| w.mul_add(edited[c], (1.0 - w) * gray))
        } else if w <= 0.0 {
            rgb
        } else {
            let edited = params.edit.edit_pixel(rgb);
            std::array::from_fn(|c| w.mul_add(edited[c] - rgb[c], rgb[c]))
        }
    })
}
