//! Uniform downscaling of floating-point images.
//!
//! Reduces an image so its longest axis is at most a given number of
//! pixels. Used to build gallery thumbnails and fast working previews.
//!
//! If the image is already at or below the target size, an independent
//! copy is returned unchanged.

use std::fmt;

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::types::Rgb32FImage;

/// Resampling filter used when downsampling.
///
/// Ordered from fastest/lowest-quality to slowest/highest-quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DownsampleFilter {
    /// Nearest-neighbor: fastest, blocky artifacts.
    Nearest,
    /// Bilinear interpolation: fast, decent quality.
    #[default]
    Triangle,
    /// Bicubic (Catmull-Rom): moderate speed, good quality.
    CatmullRom,
    /// Gaussian: moderate speed, smooth output.
    Gaussian,
    /// Lanczos with 3 lobes: slowest, sharpest.
    Lanczos3,
}

impl DownsampleFilter {
    /// Convert to the `image` crate's `FilterType`.
    const fn to_image_filter(self) -> image::imageops::FilterType {
        match self {
            Self::Nearest => image::imageops::FilterType::Nearest,
            Self::Triangle => image::imageops::FilterType::Triangle,
            Self::CatmullRom => image::imageops::FilterType::CatmullRom,
            Self::Gaussian => image::imageops::FilterType::Gaussian,
            Self::Lanczos3 => image::imageops::FilterType::Lanczos3,
        }
    }
}

impl fmt::Display for DownsampleFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nearest => f.write_str("Nearest"),
            Self::Triangle => f.write_str("Triangle"),
            Self::CatmullRom => f.write_str("CatmullRom"),
            Self::Gaussian => f.write_str("Gaussian"),
            Self::Lanczos3 => f.write_str("Lanczos3"),
        }
    }
}

/// Downsample `pixels` so the longest axis is at most `max_dimension`
/// pixels, preserving the aspect ratio.
///
/// A `max_dimension` of zero is treated as one. Returns the (possibly
/// unchanged) buffer and whether downsampling was actually applied.
#[must_use]
pub fn downsample(
    pixels: &Rgb32FImage,
    max_dimension: u32,
    filter: DownsampleFilter,
) -> (Rgb32FImage, bool) {
    let max_dimension = max_dimension.max(1);
    let long_axis = pixels.width().max(pixels.height());

    if long_axis <= max_dimension {
        return (pixels.clone(), false);
    }

    let resized = DynamicImage::ImageRgb32F(pixels.clone()).resize(
        max_dimension,
        max_dimension,
        filter.to_image_filter(),
    );
    (resized.into_rgb32f(), true)
}
