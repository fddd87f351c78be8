//! Chroma-from-luma search: picks the Y-to-B correlation factors (one
//! global DC value, one AC value per tile) that minimize the estimated
//! entropy-coded size.
//!
//! Two phases. The global phase re-quantizes the whole image per candidate
//! and prices every stream. The per-tile phase only re-quantizes the
//! tile's blocks and maintains the B-channel AC histogram incrementally,
//! pricing everything else as a frozen constant.

use log::debug;

use crate::constants::{TILE_TO_BLOCK_RATIO, YTOB_SEED};
use crate::compressed_image::CompressedImage;
use crate::entropy::{ac_block_tokens, Histogram};

trait CorrelationEval {
    /// Moves the image to `ytob` and returns the estimated stream bits.
    fn eval(&mut self, img: &mut CompressedImage, ytob: i32) -> u64;
}

/// Coarse-to-fine scan over [0, 255]: full range at step 16, then the
/// winner's neighborhood at steps 4 and 1. `best_cost` is shared state so
/// a caller can carry the incumbent cost across phases; the image is left
/// in the winning configuration.
fn optimize<E: CorrelationEval>(
    eval: &mut E,
    img: &mut CompressedImage,
    seed: i32,
    best_cost: &mut u64,
) -> i32 {
    let mut best_val = seed;
    let mut start = 0i32;
    let mut end = 255i32;
    let mut resolution = 16i32;
    loop {
        let mut val = start;
        while val <= end {
            let cost = eval.eval(img, val);
            if cost < *best_cost {
                *best_cost = cost;
                best_val = val;
            }
            val += resolution;
        }
        if resolution == 1 {
            break;
        }
        start = (best_val - resolution + 1).max(0);
        end = (best_val + resolution - 1).min(255);
        resolution /= 4;
    }
    eval.eval(img, best_val);
    best_val
}

struct GlobalEval;

impl CorrelationEval for GlobalEval {
    fn eval(&mut self, img: &mut CompressedImage, ytob: i32) -> u64 {
        img.set_ytob_dc(ytob);
        for tile_y in 0..img.tile_ysize() {
            for tile_x in 0..img.tile_xsize() {
                img.set_ytob_ac(tile_x, tile_y, ytob);
            }
        }
        img.quantize();
        let mut bits = 0u64;
        for c in 0..3 {
            let mut histogram = Histogram::new();
            img.for_each_dc_token(c, |token, nbits, _| histogram.add(token, nbits, 1));
            bits += histogram.encoded_bits();
            let mut histogram = Histogram::new();
            img.for_each_ac_token(c, |token, nbits, _| histogram.add(token, nbits, 1));
            bits += histogram.encoded_bits();
        }
        bits
    }
}

/// Prices one tile's candidate without touching the rest of the image.
/// Only the B-channel AC tokens of this tile depend on the candidate, so
/// the histogram is patched with weight -1/+1 around the re-quantization.
struct TileEval {
    tile_x: usize,
    tile_y: usize,
    frozen_bits: u64,
    b_ac: Histogram,
    last: i32,
}

impl TileEval {
    fn block_range(&self, img: &CompressedImage) -> (usize, usize, usize, usize) {
        let bx0 = self.tile_x * TILE_TO_BLOCK_RATIO;
        let by0 = self.tile_y * TILE_TO_BLOCK_RATIO;
        let bx1 = img.block_xsize().min(bx0 + TILE_TO_BLOCK_RATIO);
        let by1 = img.block_ysize().min(by0 + TILE_TO_BLOCK_RATIO);
        (bx0, by0, bx1, by1)
    }

    fn accumulate(&mut self, img: &CompressedImage, weight: i64) {
        let (bx0, by0, bx1, by1) = self.block_range(img);
        for by in by0..by1 {
            for bx in bx0..bx1 {
                let histogram = &mut self.b_ac;
                ac_block_tokens(img.block(2, bx, by), |token, nbits, _| {
                    histogram.add(token, nbits, weight)
                });
            }
        }
    }
}

impl CorrelationEval for TileEval {
    fn eval(&mut self, img: &mut CompressedImage, ytob: i32) -> u64 {
        if ytob != self.last {
            self.accumulate(img, -1);
            img.set_ytob_ac(self.tile_x, self.tile_y, ytob);
            let (bx0, by0, bx1, by1) = self.block_range(img);
            for by in by0..by1 {
                for bx in bx0..bx1 {
                    img.quantize_block(bx, by);
                }
            }
            self.accumulate(img, 1);
            self.last = ytob;
        }
        self.frozen_bits + self.b_ac.encoded_bits()
    }
}

/// Finds the Y-to-B factors for `img` and leaves it quantized with them.
pub fn find_best_ytob_correlation(img: &mut CompressedImage) {
    let mut global_eval = GlobalEval;
    let mut best_cost = global_eval.eval(img, YTOB_SEED);
    let global = optimize(&mut global_eval, img, YTOB_SEED, &mut best_cost);
    debug!("global ytob {} ({} bits)", global, best_cost);

    // Streams the per-tile value cannot change: all DC plus X and Y AC.
    let mut frozen_bits = 0u64;
    for c in 0..3 {
        let mut histogram = Histogram::new();
        img.for_each_dc_token(c, |token, nbits, _| histogram.add(token, nbits, 1));
        frozen_bits += histogram.encoded_bits();
    }
    for c in 0..2 {
        let mut histogram = Histogram::new();
        img.for_each_ac_token(c, |token, nbits, _| histogram.add(token, nbits, 1));
        frozen_bits += histogram.encoded_bits();
    }
    let mut b_ac = Histogram::new();
    img.for_each_ac_token(2, |token, nbits, _| b_ac.add(token, nbits, 1));

    for tile_y in 0..img.tile_ysize() {
        for tile_x in 0..img.tile_xsize() {
            let mut eval = TileEval {
                tile_x,
                tile_y,
                frozen_bits,
                b_ac,
                last: global,
            };
            let tile_ytob = optimize(&mut eval, img, global, &mut best_cost);
            if tile_ytob != global {
                debug!("tile ({}, {}) ytob {}", tile_x, tile_y, tile_ytob);
            }
            b_ac = eval.b_ac;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::Image3B;
    use crate::opsin::opsin_dynamics_image;

    fn correlated_srgb(xsize: usize, ysize: usize) -> Image3B {
        // Blue tracks green strongly so a nonzero correlation pays off.
        let mut srgb = Image3B::new(xsize, ysize);
        for py in 0..ysize {
            for px in 0..xsize {
                let v = ((px * 7 + py * 13) % 180 + 40) as u8;
                srgb.plane_mut(0).set(px, py, v / 2);
                srgb.plane_mut(1).set(px, py, v);
                srgb.plane_mut(2).set(px, py, v.saturating_sub(10));
            }
        }
        srgb
    }

    fn quantized_image(xsize: usize, ysize: usize) -> CompressedImage {
        let opsin = opsin_dynamics_image(&correlated_srgb(xsize, ysize));
        let mut img = CompressedImage::from_opsin(&opsin);
        img.quantize();
        img
    }

    struct CountingEval {
        calls: u32,
    }

    impl CorrelationEval for CountingEval {
        fn eval(&mut self, _img: &mut CompressedImage, ytob: i32) -> u64 {
            self.calls += 1;
            // Convex in the candidate, minimum at 200.
            (ytob - 200).unsigned_abs() as u64
        }
    }

    #[test]
    fn test_optimize_finds_convex_minimum() {
        let mut img = quantized_image(8, 8);
        let mut eval = CountingEval { calls: 0 };
        let mut best_cost = u64::MAX;
        let best = optimize(&mut eval, &mut img, YTOB_SEED, &mut best_cost);
        assert_eq!(best, 200);
        assert_eq!(best_cost, 0);
        // Far fewer probes than an exhaustive 256-point scan.
        assert!(eval.calls < 40);
    }

    #[test]
    fn test_search_is_deterministic_and_near_optimal() {
        let mut img = quantized_image(24, 24);
        let seeded = img.encode().len();
        find_best_ytob_correlation(&mut img);
        let searched = img.encode().len();
        // Estimated bits never exceed the seed's; actual bytes can differ
        // by per-stream rounding.
        assert!(searched <= seeded + 4);
        find_best_ytob_correlation(&mut img);
        assert_eq!(img.encode().len(), searched);
    }

    #[test]
    fn test_search_state_survives_roundtrip() {
        let mut img = quantized_image(24, 24);
        find_best_ytob_correlation(&mut img);
        let encoded = img.encode();
        let mut decoded = CompressedImage::new(24, 24);
        let consumed = decoded.decode(&encoded).unwrap();
        assert_eq!(consumed, encoded.len());
        assert_eq!(decoded.ytob_dc(), img.ytob_dc());
        for tile_y in 0..img.tile_ysize() {
            for tile_x in 0..img.tile_xsize() {
                assert_eq!(decoded.ytob_ac(tile_x, tile_y), img.ytob_ac(tile_x, tile_y));
            }
        }
    }
}
