//! Rotation and aspect-ratio crop.
//!
//! The image is first rotated about its center with bilinear sampling,
//! zoomed just enough that the rotated content covers the whole frame.
//! When a ratio is set, the largest centered window with that aspect is
//! then cut out, shifted vertically by `up` percent of the free margin.
//! Without a ratio the source aspect is kept and nothing is cropped.
//!
//! This is the only operator that changes image dimensions.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::{PARALLEL_THRESHOLD, require_finite};
use crate::image::ColorImage;
use crate::types::{PipelineError, Rgb32FImage};

/// Parameters for [`apply`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeometryParams {
    /// Target aspect ratio as `[width, height]`, or `None` to keep the
    /// source aspect.
    #[serde(default)]
    pub ratio: Option<[f32; 2]>,
    /// Vertical placement of the crop in `[-100, 100]`: 100 keeps the
    /// top edge, -100 keeps the bottom edge, 0 centers.
    pub up: i32,
    /// Rotation in degrees, counter-clockwise.
    pub rotation: f32,
}

impl GeometryParams {
    /// Default aspect ratio: keep the source's.
    pub const DEFAULT_RATIO: Option<[f32; 2]> = None;
    /// Widescreen crop preset.
    pub const SIXTEEN_BY_NINE: [f32; 2] = [16.0, 9.0];
    /// Default vertical placement (centered).
    pub const DEFAULT_UP: i32 = 0;
    /// Default rotation.
    pub const DEFAULT_ROTATION: f32 = 0.0;

    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidParameterSchema`] for a non-positive
    /// or non-finite ratio, `up` outside `[-100, 100]`, or a non-finite
    /// rotation.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if let Some([w, h]) = self.ratio {
            require_finite("ratio", w)?;
            require_finite("ratio", h)?;
            if w <= 0.0 || h <= 0.0 {
                return Err(PipelineError::schema(format!(
                    "ratio must be positive, got [{w}, {h}]"
                )));
            }
        }
        if !(-100..=100).contains(&self.up) {
            return Err(PipelineError::schema(format!(
                "up must be in [-100, 100], got {}",
                self.up
            )));
        }
        require_finite("rotation", self.rotation)
    }

    /// Output size of the crop for a `width` x `height` input.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn crop_size(&self, width: u32, height: u32) -> (u32, u32) {
        let Some([rw, rh]) = self.ratio else {
            return (width, height);
        };
        let aspect = f64::from(rw) / f64::from(rh);
        let (w, h) = (f64::from(width), f64::from(height));
        if w / h > aspect {
            let cw = ((h * aspect).round() as u32).clamp(1, width);
            (cw, height)
        } else {
            let ch = ((w / aspect).round() as u32).clamp(1, height);
            (width, ch)
        }
    }

    /// Whether the node leaves every image unchanged.
    #[must_use]
    pub fn is_neutral(&self) -> bool {
        self.ratio.is_none() && self.rotation == 0.0
    }

    /// Whether the node leaves an image of this size unchanged.
    #[must_use]
    pub fn is_identity_for(&self, width: u32, height: u32) -> bool {
        self.rotation == 0.0 && self.crop_size(width, height) == (width, height)
    }
}

impl Default for GeometryParams {
    fn default() -> Self {
        Self {
            ratio: Self::DEFAULT_RATIO,
            up: Self::DEFAULT_UP,
            rotation: Self::DEFAULT_ROTATION,
        }
    }
}

/// Zoom factor so a `w` x `h` frame rotated by `angle` has no empty
/// corners.
fn cover_scale(w: f32, h: f32, angle: f32) -> f32 {
    let (sin, cos) = angle.sin_cos();
    let (sin, cos) = (sin.abs(), cos.abs());
    let sx = w.mul_add(cos, h * sin) / w;
    let sy = w.mul_add(sin, h * cos) / h;
    sx.max(sy)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn sample_bilinear(src: &Rgb32FImage, x: f32, y: f32) -> [f32; 3] {
    let max_x = (src.width() - 1) as f32;
    let max_y = (src.height() - 1) as f32;
    let x = x.clamp(0.0, max_x);
    let y = y.clamp(0.0, max_y);
    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(src.width() - 1);
    let y1 = (y0 + 1).min(src.height() - 1);
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = src.get_pixel(x0, y0).0;
    let p10 = src.get_pixel(x1, y0).0;
    let p01 = src.get_pixel(x0, y1).0;
    let p11 = src.get_pixel(x1, y1).0;
    std::array::from_fn(|c| {
        let top = fx.mul_add(p10[c] - p00[c], p00[c]);
        let bottom = fx.mul_add(p11[c] - p01[c], p01[c]);
        fy.mul_add(bottom - top, top)
    })
}

/// Rotate by `degrees` counter-clockwise, zoomed to cover the frame.
/// Dimensions are unchanged.
#[allow(clippy::cast_precision_loss)]
fn rotate(image: &ColorImage, degrees: f32) -> ColorImage {
    let src = image.pixels();
    let (width, height) = src.dimensions();
    if width == 0 || height == 0 {
        return image.clone();
    }
    let (w, h) = (width as f32, height as f32);
    let angle = degrees.to_radians();
    let scale = cover_scale(w, h, angle);
    let (sin, cos) = angle.sin_cos();
    let (cx, cy) = (w / 2.0, h / 2.0);

    let mut out = Rgb32FImage::new(width, height);
    let row_len = width as usize * 3;
    let render_row = |(y, row): (usize, &mut [f32])| {
        let v = (y as f32 + 0.5 - cy) / scale;
        for (x, px) in row.chunks_exact_mut(3).enumerate() {
            let u = (x as f32 + 0.5 - cx) / scale;
            // Inverse rotation maps the output pixel back into the source.
            let sx = u.mul_add(cos, -v * sin) + cx - 0.5;
            let sy = u.mul_add(sin, v * cos) + cy - 0.5;
            px.copy_from_slice(&sample_bilinear(src, sx, sy));
        }
    };
    if image.dimensions().pixel_count() >= PARALLEL_THRESHOLD {
        out.par_chunks_mut(row_len).enumerate().for_each(render_row);
    } else {
        out.chunks_mut(row_len).enumerate().for_each(render_row);
    }
    image.with_pixels(out)
}

/// Rotate, then crop to the target aspect ratio.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap
)]
pub fn apply(image: &ColorImage, params: &GeometryParams) -> ColorImage {
    let (width, height) = (image.width(), image.height());
    if width == 0 || height == 0 || params.is_identity_for(width, height) {
        return image.clone();
    }

    let rotated = if params.rotation == 0.0 {
        image.clone()
    } else {
        rotate(image, params.rotation)
    };

    let (cw, ch) = params.crop_size(width, height);
    if (cw, ch) == (width, height) {
        return rotated;
    }
    let x0 = (width - cw) / 2;
    let free = height - ch;
    let up = f64::from(params.up.clamp(-100, 100)) / 100.0;
    let half = f64::from(free) / 2.0;
    let y0 = (up.mul_add(-half, half).round() as i64).clamp(0, i64::from(free)) as u32;

    let cropped = image::imageops::crop_imm(rotated.pixels(), x0, y0, cw, ch).to_image();
    rotated.with_pixels(cropped)
}
