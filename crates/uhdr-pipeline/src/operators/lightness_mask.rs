//! Lightness zone visualization.
//!
//! Paints every pixel that falls in a flagged lightness zone with the
//! zone's display color. This is a viewing aid for tuning the tone
//! curve; it is not meant to be saved into exported images.

use serde::{Deserialize, Serialize};

use super::map_pixels;
use crate::color::lightness;
use crate::image::ColorImage;

/// Upper `L*` bound (exclusive) of each zone except the last, which is
/// open-ended.
const ZONE_BOUNDS: [f32; 4] = [20.0, 40.0, 60.0, 80.0];

/// Display color of each zone, darkest first.
const ZONE_COLORS: [[f32; 3]; 5] = [
    [0.0, 0.0, 1.0],
    [0.0, 1.0, 1.0],
    [0.0, 1.0, 0.0],
    [1.0, 1.0, 0.0],
    [1.0, 0.0, 0.0],
];

/// Parameters for [`apply`]: one flag per zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LightnessMaskParams {
    /// `L*` in `[0, 20)`, painted blue.
    pub shadows: bool,
    /// `L*` in `[20, 40)`, painted cyan.
    pub blacks: bool,
    /// `L*` in `[40, 60)`, painted green.
    pub mediums: bool,
    /// `L*` in `[60, 80)`, painted yellow.
    pub whites: bool,
    /// `L*` of 80 and above, painted red.
    pub highlights: bool,
}

impl LightnessMaskParams {
    const fn flags(&self) -> [bool; 5] {
        [
            self.shadows,
            self.blacks,
            self.mediums,
            self.whites,
            self.highlights,
        ]
    }

    /// No zone is flagged.
    #[must_use]
    pub const fn is_neutral(&self) -> bool {
        !(self.shadows || self.blacks || self.mediums || self.whites || self.highlights)
    }
}

/// Index of the zone containing lightness `l`.
#[must_use]
pub fn zone_of(l: f32) -> usize {
    ZONE_BOUNDS.iter().take_while(|&&bound| l >= bound).count()
}

/// Paint flagged zones; other pixels pass through.
#[must_use]
pub fn apply(image: &ColorImage, params: &LightnessMaskParams) -> ColorImage {
    if params.is_neutral() {
        return image.clone();
    }
    let flags = params.flags();
    map_pixels(image, |rgb| {
        let zone = zone_of(lightness(rgb));
        if flags[zone] { ZONE_COLORS[zone] } else { rgb }
    })
}
