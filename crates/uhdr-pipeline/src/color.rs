//! Color math shared by the operators.
//!
//! All conversions take linear-light RGB with sRGB primaries and a D65
//! white point. Lightness (`L*`) and chroma follow CIE 1976 L\*a\*b\*;
//! hue for selection is the LCh angle in degrees. Hue shifting and
//! saturation editing use HSV, which keeps the operation cheap and
//! reversible.

/// Rec. 709 luminance weights.
pub const LUMA_R: f32 = 0.2126;
/// Rec. 709 luminance weight for green.
pub const LUMA_G: f32 = 0.7152;
/// Rec. 709 luminance weight for blue.
pub const LUMA_B: f32 = 0.0722;

/// D65 reference white in XYZ.
const WHITE_X: f32 = 0.950_47;
const WHITE_Y: f32 = 1.0;
const WHITE_Z: f32 = 1.088_83;

/// `(6/29)^3`
const EPSILON: f32 = 216.0 / 24389.0;
/// `(29/3)^3`
const KAPPA: f32 = 24389.0 / 27.0;

/// Relative luminance `Y` of a linear RGB triple.
#[must_use]
pub fn luminance(rgb: [f32; 3]) -> f32 {
    LUMA_R.mul_add(rgb[0], LUMA_G.mul_add(rgb[1], LUMA_B * rgb[2]))
}

/// CIE `L*` (0..100 for `Y` in 0..1, above 100 for HDR) from luminance.
#[must_use]
pub fn y_to_lstar(y: f32) -> f32 {
    if y <= EPSILON {
        y * KAPPA
    } else {
        116.0f32.mul_add(y.cbrt(), -16.0)
    }
}

/// Inverse of [`y_to_lstar`].
#[must_use]
pub fn lstar_to_y(lstar: f32) -> f32 {
    if lstar <= 8.0 {
        lstar / KAPPA
    } else {
        ((lstar + 16.0) / 116.0).powi(3)
    }
}

/// `L*` of a linear RGB triple.
#[must_use]
pub fn lightness(rgb: [f32; 3]) -> f32 {
    y_to_lstar(luminance(rgb))
}

fn lab_f(t: f32) -> f32 {
    if t > EPSILON {
        t.cbrt()
    } else {
        KAPPA.mul_add(t, 16.0) / 116.0
    }
}

/// Linear sRGB to CIE XYZ (D65).
#[must_use]
pub fn rgb_to_xyz(rgb: [f32; 3]) -> [f32; 3] {
    let [r, g, b] = rgb;
    [
        0.412_456_4f32.mul_add(r, 0.357_576_1f32.mul_add(g, 0.180_437_5 * b)),
        LUMA_R.mul_add(r, LUMA_G.mul_add(g, LUMA_B * b)),
        0.019_333_9f32.mul_add(r, 0.119_192f32.mul_add(g, 0.950_304_1 * b)),
    ]
}

/// Linear sRGB to CIE L\*a\*b\*.
#[must_use]
pub fn rgb_to_lab(rgb: [f32; 3]) -> [f32; 3] {
    let [x, y, z] = rgb_to_xyz(rgb);
    let fx = lab_f(x / WHITE_X);
    let fy = lab_f(y / WHITE_Y);
    let fz = lab_f(z / WHITE_Z);
    [
        116.0f32.mul_add(fy, -16.0),
        500.0 * (fx - fy),
        200.0 * (fy - fz),
    ]
}

/// Linear sRGB to LCh: lightness, chroma, hue in degrees `[0, 360)`.
#[must_use]
pub fn rgb_to_lch(rgb: [f32; 3]) -> [f32; 3] {
    let [l, a, b] = rgb_to_lab(rgb);
    let c = a.hypot(b);
    let h = b.atan2(a).to_degrees().rem_euclid(360.0);
    [l, c, h]
}

/// RGB to HSV with hue in degrees `[0, 360)`.
///
/// Saturation is in `[0, 1]` for non-negative input; value is the
/// channel maximum and may exceed 1 for HDR pixels.
#[must_use]
pub fn rgb_to_hsv(rgb: [f32; 3]) -> [f32; 3] {
    let [r, g, b] = rgb;
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let h = if delta <= f32::EPSILON {
        0.0
    } else if (max - r).abs() <= f32::EPSILON {
        60.0 * ((g - b) / delta).rem_euclid(6.0)
    } else if (max - g).abs() <= f32::EPSILON {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };
    let s = if max > 0.0 { delta / max } else { 0.0 };
    [h.rem_euclid(360.0), s, max]
}

/// HSV (hue in degrees) back to RGB.
#[must_use]
pub fn hsv_to_rgb(hsv: [f32; 3]) -> [f32; 3] {
    let [h, s, v] = hsv;
    let h = h.rem_euclid(360.0) / 60.0;
    let c = v * s;
    let x = c * (1.0 - (h.rem_euclid(2.0) - 1.0).abs());
    let m = v - c;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let sector = h.floor() as u32;
    let (r, g, b) = match sector {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    [r + m, g + m, b + m]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32, tol: f32) -> bool {
        (a - b).abs() <= tol
    }

    #[test]
    fn luminance_weights_sum_to_one() {
        assert!(close(luminance([1.0, 1.0, 1.0]), 1.0, 1e-6));
        assert!(close(luminance([1.0, 0.0, 0.0]), LUMA_R, 1e-7));
    }

    #[test]
    fn lstar_endpoints() {
        assert!(close(y_to_lstar(0.0), 0.0, 1e-6));
        assert!(close(y_to_lstar(1.0), 100.0, 1e-3));
        assert!(close(y_to_lstar(0.184), 50.0, 0.1));
    }

    #[test]
    fn lstar_round_trips_across_threshold() {
        for y in [0.0, 0.001, 0.008, 0.009, 0.18, 0.5, 1.0, 4.0] {
            let back = lstar_to_y(y_to_lstar(y));
            assert!(close(back, y, 1e-4 * y.max(1.0)), "y={y} back={back}");
        }
    }

    #[test]
    fn white_lab_is_neutral() {
        let [l, a, b] = rgb_to_lab([1.0, 1.0, 1.0]);
        assert!(close(l, 100.0, 0.01));
        assert!(close(a, 0.0, 0.05));
        assert!(close(b, 0.0, 0.05));
    }

    #[test]
    fn gray_has_no_chroma() {
        let [_, c, _] = rgb_to_lch([0.3, 0.3, 0.3]);
        assert!(c < 0.05);
    }

    #[test]
    fn red_hue_is_near_forty_degrees() {
        let [_, c, h] = rgb_to_lch([1.0, 0.0, 0.0]);
        assert!(c > 90.0);
        assert!(h > 30.0 && h < 50.0, "h={h}");
    }

    #[test]
    fn hsv_primaries() {
        assert_eq!(rgb_to_hsv([1.0, 0.0, 0.0]), [0.0, 1.0, 1.0]);
        let [h, s, v] = rgb_to_hsv([0.0, 0.5, 0.0]);
        assert!(close(h, 120.0, 1e-4));
        assert!(close(s, 1.0, 1e-6));
        assert!(close(v, 0.5, 1e-6));
        let [h, _, _] = rgb_to_hsv([0.0, 0.0, 1.0]);
        assert!(close(h, 240.0, 1e-4));
    }

    #[test]
    fn hsv_round_trip() {
        for rgb in [
            [0.2, 0.4, 0.6],
            [0.9, 0.1, 0.3],
            [0.5, 0.5, 0.5],
            [0.0, 0.0, 0.0],
            [2.5, 1.0, 0.5],
        ] {
            let back = hsv_to_rgb(rgb_to_hsv(rgb));
            for c in 0..3 {
                assert!(close(back[c], rgb[c], 1e-5), "{rgb:?} -> {back:?}");
            }
        }
    }
}
