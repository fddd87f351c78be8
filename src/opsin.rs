//! Pixel mapping between sRGB and the opsin-dynamics colorspace.
//!
//! The codec core quantizes coefficients of an XYB-style opponent colorspace
//! derived from cone absorbance: a 3x3 absorbance matrix, a bias, and a
//! signed cube-root transfer function. These are pure per-pixel mappings;
//! nothing here depends on codec state.

use crate::image::{Image3B, Image3F, Image3U};

const OPSIN_ABSORBANCE_MATRIX: [f32; 9] = [
    0.30, 0.622, 0.078,
    0.23, 0.692, 0.078,
    0.243_422_69, 0.204_767_44, 0.551_809_87,
];

const OPSIN_ABSORBANCE_BIAS: f32 = 0.003_793_073_3;

const INV_OPSIN_MATRIX: [f32; 9] = [
    11.031_567, -9.866_944, -0.164_623,
    -3.254_147, 4.418_77, -0.164_623,
    -3.658_851, 2.712_923, 1.945_928,
];

/// sRGB gamma decoding (sRGB to linear).
#[inline]
pub fn srgb_to_linear(v: f32) -> f32 {
    if v <= 0.04045 {
        v / 12.92
    } else {
        ((v + 0.055) / 1.055).powf(2.4)
    }
}

/// sRGB gamma encoding (linear to sRGB).
#[inline]
pub fn linear_to_srgb(v: f32) -> f32 {
    if v <= 0.003_130_8 {
        v * 12.92
    } else {
        1.055 * v.powf(1.0 / 2.4) - 0.055
    }
}

#[inline]
fn mixed_cbrt(v: f32) -> f32 {
    if v < 0.0 { -((-v).cbrt()) } else { v.cbrt() }
}

#[inline]
fn mixed_cube(v: f32) -> f32 {
    if v < 0.0 { -((-v).powi(3)) } else { v.powi(3) }
}

/// Linear RGB in [0, 1] to one opsin pixel.
#[inline]
pub fn linear_to_opsin(r: f32, g: f32, b: f32) -> (f32, f32, f32) {
    let m = &OPSIN_ABSORBANCE_MATRIX;
    let lr = mixed_cbrt(m[0] * r + m[1] * g + m[2] * b + OPSIN_ABSORBANCE_BIAS);
    let lg = mixed_cbrt(m[3] * r + m[4] * g + m[5] * b + OPSIN_ABSORBANCE_BIAS);
    let lb = mixed_cbrt(m[6] * r + m[7] * g + m[8] * b + OPSIN_ABSORBANCE_BIAS);
    // Opponent axes: X = red-green difference, Y = sum, B = blue.
    (0.5 * (lr - lg), 0.5 * (lr + lg), lb)
}

/// One opsin pixel back to linear RGB, clamped to [0, 1].
#[inline]
pub fn opsin_to_linear(x: f32, y: f32, b: f32) -> (f32, f32, f32) {
    let gamma_r = mixed_cube(y + x) - OPSIN_ABSORBANCE_BIAS;
    let gamma_g = mixed_cube(y - x) - OPSIN_ABSORBANCE_BIAS;
    let gamma_b = mixed_cube(b) - OPSIN_ABSORBANCE_BIAS;
    let m = &INV_OPSIN_MATRIX;
    let r = m[0] * gamma_r + m[1] * gamma_g + m[2] * gamma_b;
    let g = m[3] * gamma_r + m[4] * gamma_g + m[5] * gamma_b;
    let b = m[6] * gamma_r + m[7] * gamma_g + m[8] * gamma_b;
    (r.clamp(0.0, 1.0), g.clamp(0.0, 1.0), b.clamp(0.0, 1.0))
}

/// Transforms an 8-bit sRGB image into its opsin-dynamics representation.
pub fn opsin_dynamics_image(srgb: &Image3B) -> Image3F {
    let xsize = srgb.xsize();
    let ysize = srgb.ysize();
    let mut opsin = Image3F::new(xsize, ysize);
    for py in 0..ysize {
        for px in 0..xsize {
            let r = srgb_to_linear(f32::from(srgb.plane(0).get(px, py)) / 255.0);
            let g = srgb_to_linear(f32::from(srgb.plane(1).get(px, py)) / 255.0);
            let b = srgb_to_linear(f32::from(srgb.plane(2).get(px, py)) / 255.0);
            let (x, y, bl) = linear_to_opsin(r, g, b);
            opsin.plane_mut(0).set(px, py, x);
            opsin.plane_mut(1).set(px, py, y);
            opsin.plane_mut(2).set(px, py, bl);
        }
    }
    opsin
}

/// Transforms a linear RGB image (samples in [0, 1]) into opsin dynamics.
pub fn opsin_dynamics_image_linear(linear: &Image3F) -> Image3F {
    let xsize = linear.xsize();
    let ysize = linear.ysize();
    let mut opsin = Image3F::new(xsize, ysize);
    for py in 0..ysize {
        for px in 0..xsize {
            let (x, y, b) = linear_to_opsin(
                linear.plane(0).get(px, py),
                linear.plane(1).get(px, py),
                linear.plane(2).get(px, py),
            );
            opsin.plane_mut(0).set(px, py, x);
            opsin.plane_mut(1).set(px, py, y);
            opsin.plane_mut(2).set(px, py, b);
        }
    }
    opsin
}

/// Sample format descriptor for reconstruction; picks the output scaling and
/// gamma handling once, at the boundary, instead of duplicating the block
/// loop per pixel type.
pub trait SampleFormat {
    type Sample: Copy + Default;
    fn from_linear(v: f32) -> Self::Sample;
}

pub struct Srgb8;
pub struct Srgb16;
pub struct Linear;

impl SampleFormat for Srgb8 {
    type Sample = u8;
    fn from_linear(v: f32) -> u8 {
        (linear_to_srgb(v.clamp(0.0, 1.0)) * 255.0).round() as u8
    }
}

impl SampleFormat for Srgb16 {
    type Sample = u16;
    fn from_linear(v: f32) -> u16 {
        (linear_to_srgb(v.clamp(0.0, 1.0)) * 65535.0).round() as u16
    }
}

impl SampleFormat for Linear {
    type Sample = f32;
    fn from_linear(v: f32) -> f32 {
        v
    }
}

// Type-level wiring for `SampleFormat` outputs.
pub type Srgb8Image = Image3B;
pub type Srgb16Image = Image3U;

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_opsin_linear_roundtrip() {
        for &(r, g, b) in &[(0.5f32, 0.5, 0.5), (0.9, 0.1, 0.3), (0.0, 0.0, 0.0), (1.0, 1.0, 1.0)] {
            let (x, y, bl) = linear_to_opsin(r, g, b);
            let (r2, g2, b2) = opsin_to_linear(x, y, bl);
            assert_abs_diff_eq!(r, r2, epsilon = 2e-3);
            assert_abs_diff_eq!(g, g2, epsilon = 2e-3);
            assert_abs_diff_eq!(b, b2, epsilon = 2e-3);
        }
    }

    #[test]
    fn test_srgb_gamma_roundtrip() {
        for i in 0..=255u32 {
            let v = i as f32 / 255.0;
            let back = linear_to_srgb(srgb_to_linear(v));
            assert_abs_diff_eq!(v, back, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_gray_has_no_opponent_signal() {
        let (x, _, _) = linear_to_opsin(0.4, 0.4, 0.4);
        // Equal absorbance rows 0/1 differ, so X is small but nonzero; it
        // must stay well below the luma signal for grays.
        assert!(x.abs() < 0.05);
    }
}
