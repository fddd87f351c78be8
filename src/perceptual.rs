//! Perceptual distance oracle used by the quality-targeted search.
//!
//! Compares a candidate reconstruction against the reference it was built
//! from, in the opsin domain: channel-weighted squared error, smoothed over
//! a small neighborhood, reported as a per-pixel map plus a max-norm scalar.
//! Values around 1.0 mark the threshold of visibility. Deterministic for a
//! fixed reference.

use crate::image::{Image3B, Image3F, ImageF};
use crate::opsin::opsin_dynamics_image;

/// Relative visibility of errors per opsin channel; the opponent X axis
/// carries little numeric range but high perceptual weight.
const CHANNEL_WEIGHTS: [f32; 3] = [8.0, 1.0, 0.25];
/// Maps smoothed opsin-domain error onto the ~1.0 visibility scale.
const DISTANCE_SCALE: f32 = 170.0;

pub struct PerceptualComparator {
    reference: Image3F,
    distance: f32,
    distmap: ImageF,
}

impl PerceptualComparator {
    /// `reference` is the opsin-dynamics image the encoder is compressing.
    pub fn new(reference: &Image3F) -> Self {
        let distmap = ImageF::new(reference.xsize(), reference.ysize());
        Self {
            reference: reference.clone(),
            distance: 0.0,
            distmap,
        }
    }

    /// Evaluates an 8-bit sRGB candidate, updating `distance` and `distmap`.
    pub fn compare(&mut self, candidate: &Image3B) {
        debug_assert!(candidate.xsize() == self.reference.xsize());
        debug_assert!(candidate.ysize() == self.reference.ysize());
        let candidate_opsin = opsin_dynamics_image(candidate);
        let xsize = self.reference.xsize();
        let ysize = self.reference.ysize();

        let mut squared = ImageF::new(xsize, ysize);
        for py in 0..ysize {
            let out = squared.row_mut(py);
            for px in 0..xsize {
                let mut sum = 0.0f32;
                for c in 0..3 {
                    let d = candidate_opsin.plane(c).get(px, py)
                        - self.reference.plane(c).get(px, py);
                    sum += CHANNEL_WEIGHTS[c] * d * d;
                }
                out[px] = sum;
            }
        }

        // 3x3 smoothing: isolated single-pixel errors matter less than
        // clustered ones.
        let mut max_dist = 0.0f32;
        for py in 0..ysize {
            for px in 0..xsize {
                let y0 = py.saturating_sub(1);
                let y1 = (py + 2).min(ysize);
                let x0 = px.saturating_sub(1);
                let x1 = (px + 2).min(xsize);
                let mut sum = 0.0f32;
                let mut count = 0;
                for y in y0..y1 {
                    let row = squared.row(y);
                    for x in x0..x1 {
                        sum += row[x];
                        count += 1;
                    }
                }
                let dist = DISTANCE_SCALE * (sum / count as f32).sqrt();
                self.distmap.set(px, py, dist);
                max_dist = max_dist.max(dist);
            }
        }
        self.distance = max_dist;
    }

    pub fn distance(&self) -> f32 {
        self.distance
    }

    pub fn distmap(&self) -> &ImageF {
        &self.distmap
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opsin::{linear_to_srgb, opsin_to_linear};

    fn srgb_from_opsin(opsin: &Image3F) -> Image3B {
        let mut out = Image3B::new(opsin.xsize(), opsin.ysize());
        for py in 0..opsin.ysize() {
            for px in 0..opsin.xsize() {
                let (r, g, b) = opsin_to_linear(
                    opsin.plane(0).get(px, py),
                    opsin.plane(1).get(px, py),
                    opsin.plane(2).get(px, py),
                );
                out.plane_mut(0).set(px, py, (linear_to_srgb(r) * 255.0).round() as u8);
                out.plane_mut(1).set(px, py, (linear_to_srgb(g) * 255.0).round() as u8);
                out.plane_mut(2).set(px, py, (linear_to_srgb(b) * 255.0).round() as u8);
            }
        }
        out
    }

    #[test]
    fn test_identical_images_have_small_distance() {
        let mut opsin = Image3F::new(8, 8);
        for py in 0..8 {
            for px in 0..8 {
                opsin.plane_mut(1).set(px, py, 0.5);
                opsin.plane_mut(2).set(px, py, 0.5);
            }
        }
        let candidate = srgb_from_opsin(&opsin);
        // Rebuild the reference from the 8-bit rendering so only 8-bit
        // rounding separates the two.
        let reference = opsin_dynamics_image(&candidate);
        let mut comparator = PerceptualComparator::new(&reference);
        comparator.compare(&candidate);
        assert!(comparator.distance() < 0.5, "distance = {}", comparator.distance());
    }

    #[test]
    fn test_distance_grows_with_error() {
        let mut opsin = Image3F::new(8, 8);
        for py in 0..8 {
            for px in 0..8 {
                opsin.plane_mut(1).set(px, py, 0.5);
                opsin.plane_mut(2).set(px, py, 0.5);
            }
        }
        let mut comparator = PerceptualComparator::new(&opsin);

        let mut small = opsin.clone();
        small.plane_mut(1).set(4, 4, 0.52);
        comparator.compare(&srgb_from_opsin(&small));
        let small_dist = comparator.distance();

        let mut large = opsin.clone();
        large.plane_mut(1).set(4, 4, 0.6);
        comparator.compare(&srgb_from_opsin(&large));
        let large_dist = comparator.distance();

        assert!(large_dist > small_dist);
        assert!(comparator.distmap().get(4, 4) >= comparator.distmap().get(0, 0));
    }
}
