//! Luminance tone curve.
//!
//! Seven named control points map an input lightness percentage to an
//! output lightness percentage. The curve is a monotone cubic
//! (Fritsch-Carlson) through the points, evaluated on CIE `L*`. Each
//! pixel's luminance is remapped through it and the RGB triple is scaled
//! by the luminance ratio, so hue and saturation are kept.

use serde::{Deserialize, Serialize};

use super::{map_pixels, require_finite};
use crate::color::{luminance, lstar_to_y, y_to_lstar};
use crate::image::ColorImage;
use crate::types::PipelineError;

/// Below this luminance a pixel is treated as black and replaced by the
/// gray level of the curve output.
const BLACK_LUMINANCE: f32 = 1e-6;

/// Parameters for [`apply`]: `[input %, output %]` per control point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToneCurveParams {
    /// Black point.
    pub start: [f32; 2],
    /// Deep shadows.
    pub shadows: [f32; 2],
    /// Blacks.
    pub blacks: [f32; 2],
    /// Mid-tones.
    pub mediums: [f32; 2],
    /// Whites.
    pub whites: [f32; 2],
    /// Highlights.
    pub highlights: [f32; 2],
    /// White point.
    pub end: [f32; 2],
}

impl ToneCurveParams {
    /// Default black point.
    pub const DEFAULT_START: [f32; 2] = [0.0, 0.0];
    /// Default shadows point.
    pub const DEFAULT_SHADOWS: [f32; 2] = [10.0, 10.0];
    /// Default blacks point.
    pub const DEFAULT_BLACKS: [f32; 2] = [30.0, 30.0];
    /// Default mid-tones point.
    pub const DEFAULT_MEDIUMS: [f32; 2] = [50.0, 50.0];
    /// Default whites point.
    pub const DEFAULT_WHITES: [f32; 2] = [70.0, 70.0];
    /// Default highlights point.
    pub const DEFAULT_HIGHLIGHTS: [f32; 2] = [90.0, 90.0];
    /// Default white point.
    pub const DEFAULT_END: [f32; 2] = [100.0, 100.0];

    /// The control points in declaration order, with their field names.
    #[must_use]
    pub const fn named_points(&self) -> [(&'static str, [f32; 2]); 7] {
        [
            ("start", self.start),
            ("shadows", self.shadows),
            ("blacks", self.blacks),
            ("mediums", self.mediums),
            ("whites", self.whites),
            ("highlights", self.highlights),
            ("end", self.end),
        ]
    }

    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidParameterSchema`] if any coordinate
    /// is not finite.
    pub fn validate(&self) -> Result<(), PipelineError> {
        for (name, [x, y]) in self.named_points() {
            require_finite(name, x)?;
            require_finite(name, y)?;
        }
        Ok(())
    }

    /// A curve is neutral when every point lies on the diagonal.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn is_neutral(&self) -> bool {
        self.named_points().iter().all(|(_, [x, y])| x == y)
    }
}

impl Default for ToneCurveParams {
    fn default() -> Self {
        Self {
            start: Self::DEFAULT_START,
            shadows: Self::DEFAULT_SHADOWS,
            blacks: Self::DEFAULT_BLACKS,
            mediums: Self::DEFAULT_MEDIUMS,
            whites: Self::DEFAULT_WHITES,
            highlights: Self::DEFAULT_HIGHLIGHTS,
            end: Self::DEFAULT_END,
        }
    }
}

/// Monotone piecewise cubic Hermite interpolant.
#[derive(Debug, Clone)]
pub struct MonotoneCurve {
    xs: Vec<f32>,
    ys: Vec<f32>,
    slopes: Vec<f32>,
}

impl MonotoneCurve {
    /// Build the curve from tone-curve parameters.
    ///
    /// Inputs and outputs are clamped to `[0, 100]`, points are sorted by
    /// input, and points sharing an input with an earlier one are
    /// dropped.
    #[must_use]
    pub fn from_params(params: &ToneCurveParams) -> Self {
        let mut points: Vec<(f32, f32)> = params
            .named_points()
            .iter()
            .map(|(_, [x, y])| (x.clamp(0.0, 100.0), y.clamp(0.0, 100.0)))
            .collect();
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        points.dedup_by(|later, earlier| later.0 == earlier.0);
        Self::new(&points)
    }

    /// Build the interpolant through `points`, which must be sorted by
    /// strictly increasing `x` and non-empty.
    #[must_use]
    pub fn new(points: &[(f32, f32)]) -> Self {
        let xs: Vec<f32> = points.iter().map(|p| p.0).collect();
        let ys: Vec<f32> = points.iter().map(|p| p.1).collect();
        let n = xs.len();
        if n < 2 {
            return Self {
                xs,
                ys,
                slopes: vec![0.0; n],
            };
        }

        let secants: Vec<f32> = (0..n - 1)
            .map(|k| (ys[k + 1] - ys[k]) / (xs[k + 1] - xs[k]))
            .collect();

        let mut slopes = vec![0.0; n];
        slopes[0] = secants[0];
        slopes[n - 1] = secants[n - 2];
        for k in 1..n - 1 {
            slopes[k] = if secants[k - 1] * secants[k] <= 0.0 {
                0.0
            } else {
                (secants[k - 1] + secants[k]) / 2.0
            };
        }

        for (k, &d) in secants.iter().enumerate() {
            if d == 0.0 {
                slopes[k] = 0.0;
                slopes[k + 1] = 0.0;
                continue;
            }
            let a = slopes[k] / d;
            let b = slopes[k + 1] / d;
            let s = a.mul_add(a, b * b);
            if s > 9.0 {
                let t = 3.0 / s.sqrt();
                slopes[k] = t * a * d;
                slopes[k + 1] = t * b * d;
            }
        }

        Self { xs, ys, slopes }
    }

    /// Evaluate at `x`.
    ///
    /// Below the first point the curve is flat; beyond the last point it
    /// continues along the end slope, so HDR lightness above 100 keeps
    /// its ordering.
    #[must_use]
    pub fn eval(&self, x: f32) -> f32 {
        let n = self.xs.len();
        if n == 0 {
            return x;
        }
        if x <= self.xs[0] {
            return self.ys[0];
        }
        let last = n - 1;
        if x >= self.xs[last] {
            return self.slopes[last].mul_add(x - self.xs[last], self.ys[last]);
        }

        let k = self.xs.partition_point(|&xk| xk <= x) - 1;
        let h = self.xs[k + 1] - self.xs[k];
        let t = (x - self.xs[k]) / h;
        let t2 = t * t;
        let t3 = t2 * t;
        let h00 = 2.0f32.mul_add(t3, -3.0 * t2) + 1.0;
        let h10 = t3 - 2.0 * t2 + t;
        let h01 = (-2.0f32).mul_add(t3, 3.0 * t2);
        let h11 = t3 - t2;
        h00 * self.ys[k]
            + h10 * h * self.slopes[k]
            + h01 * self.ys[k + 1]
            + h11 * h * self.slopes[k + 1]
    }
}

/// Remap each pixel's lightness through the curve.
#[must_use]
pub fn apply(image: &ColorImage, params: &ToneCurveParams) -> ColorImage {
    if params.is_neutral() {
        return image.clone();
    }
    let curve = MonotoneCurve::from_params(params);
    map_pixels(image, |rgb| {
        let y = luminance(rgb);
        let mapped = lstar_to_y(curve.eval(y_to_lstar(y)).max(0.0));
        if y > BLACK_LUMINANCE {
            let ratio = mapped / y;
            rgb.map(|v| v * ratio)
        } else {
            [mapped; 3]
        }
    })
}
