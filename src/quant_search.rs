//! Quality-targeted rate control: iteratively tightens the per-block
//! quantization field until the perceptual distance meets the target or the
//! iteration budgets run out.
//!
//! Feedback path per evaluation: reconstruct pixels, ask the oracle for a
//! distance map, reduce it to one max per tile, locate the bad peaks, then
//! tighten quantization around them with a damped inverse-step update. The
//! loop never fails; it always leaves a usable field behind.

use log::debug;

use crate::constants::{
    BLOCK_EDGE, INITIAL_QUANT_AC, INITIAL_QUANT_DC, MAX_OUTER_ITERS, PEAK_WEIGHT,
    QUANT_ADJUST_SPEED, QUANT_MAX_LIMIT, QUANT_MAX_RELAX, QUANT_MAX_START, QUANT_RESCALE,
};
use crate::compressed_image::CompressedImage;
use crate::image::{Image3F, ImageF};
use crate::perceptual::PerceptualComparator;
use crate::EncoderStats;

/// Reduces a pixel-level distance map to one maximum per tile.
pub fn tile_dist_map(distmap: &ImageF, tile_size: usize) -> ImageF {
    let tile_xsize = distmap.xsize().div_ceil(tile_size);
    let tile_ysize = distmap.ysize().div_ceil(tile_size);
    let mut tiles = ImageF::new(tile_xsize, tile_ysize);
    for tile_y in 0..tile_ysize {
        for tile_x in 0..tile_xsize {
            let x_max = distmap.xsize().min(tile_size * (tile_x + 1));
            let y_max = distmap.ysize().min(tile_size * (tile_y + 1));
            let mut max_dist = 0.0f32;
            for y in tile_size * tile_y..y_max {
                let row = distmap.row(y);
                for x in tile_size * tile_x..x_max {
                    max_dist = max_dist.max(row[x]);
                }
            }
            tiles.set(tile_x, tile_y, max_dist);
        }
    }
    tiles
}

/// For every tile, the Chebyshev distance to the nearest local peak within
/// `local_radius`, or -1.0 where no peak is in range. A tile is a peak when
/// it reaches a `peak_weight` blend of the floor and the local maximum.
pub fn dist_to_peak_map(
    field: &ImageF,
    peak_min: f32,
    local_radius: usize,
    peak_weight: f32,
) -> ImageF {
    let mut result = ImageF::with_value(field.xsize(), field.ysize(), -1.0);
    for y0 in 0..field.ysize() {
        for x0 in 0..field.xsize() {
            let x_min = x0.saturating_sub(local_radius);
            let y_min = y0.saturating_sub(local_radius);
            let x_max = field.xsize().min(x0 + 1 + local_radius);
            let y_max = field.ysize().min(y0 + 1 + local_radius);
            let mut local_max = peak_min;
            for y in y_min..y_max {
                let row = field.row(y);
                for x in x_min..x_max {
                    local_max = local_max.max(row[x]);
                }
            }
            if field.get(x0, y0) > (1.0 - peak_weight) * peak_min + peak_weight * local_max {
                for y in y_min..y_max {
                    for x in x_min..x_max {
                        let dist = (y.abs_diff(y0)).max(x.abs_diff(x0)) as f32;
                        let current = result.get(x, y);
                        if current < 0.0 || current > dist {
                            result.set(x, y, dist);
                        }
                    }
                }
            }
        }
    }
    result
}

/// Damped inverse-step tightening of one AC strength. Returns false when
/// the value is already saturated at `quant_max`.
pub fn adjust_quant_val(q: &mut f32, dist_to_peak: f32, factor: f32, quant_max: f32) -> bool {
    if *q >= 0.999 * quant_max {
        return false;
    }
    let inv_q = 1.0 / *q;
    let adjusted_inv_q = inv_q - factor / (dist_to_peak + 1.0);
    *q = 1.0 / adjusted_inv_q.max(1.0 / quant_max);
    true
}

/// Finds a quantization field whose reconstruction stays within
/// `target_distance`, spending at most `max_distance_evals` oracle calls
/// and `MAX_OUTER_ITERS` outer iterations.
pub fn find_best_quantization(
    opsin_orig: &Image3F,
    target_distance: f32,
    max_distance_evals: u32,
    img: &mut CompressedImage,
    mut stats: Option<&mut EncoderStats>,
    verbose: bool,
) {
    let mut comparator = PerceptualComparator::new(opsin_orig);
    let initial_quant_dc = INITIAL_QUANT_DC / target_distance;
    let initial_quant_ac = INITIAL_QUANT_AC / target_distance;
    let mut quant_field =
        ImageF::with_value(img.block_xsize(), img.block_ysize(), initial_quant_ac);
    let mut tile_distmap = ImageF::new(img.block_xsize(), img.block_ysize());
    let mut outer_iter = 0;
    let mut distance_evals = 0u32;
    let mut quant_max = QUANT_MAX_START;

    loop {
        if img.quantizer_mut().set_quant_field(initial_quant_dc, &quant_field) {
            img.quantize();
            if distance_evals >= max_distance_evals {
                break;
            }
            let srgb = img.to_srgb();
            comparator.compare(&srgb);
            tile_distmap = tile_dist_map(comparator.distmap(), BLOCK_EDGE);
            distance_evals += 1;
            if let Some(stats) = stats.as_deref_mut() {
                stats.num_distance_evals += 1;
            }
            if verbose {
                debug!(
                    "distance eval {}: distance {:.4}, target {:.4}, quant_max {:.2}",
                    distance_evals,
                    comparator.distance(),
                    target_distance,
                    quant_max
                );
            }
            if comparator.distance() <= target_distance {
                break;
            }
        }

        let mut changed = false;
        while !changed && comparator.distance() > target_distance {
            for radius in 1..=4usize {
                let dist_to_peak =
                    dist_to_peak_map(&tile_distmap, target_distance, radius, PEAK_WEIGHT);
                for y in 0..img.block_ysize() {
                    for x in 0..img.block_xsize() {
                        let peak_dist = dist_to_peak.get(x, y);
                        if peak_dist >= 0.0 {
                            let factor = QUANT_ADJUST_SPEED[outer_iter] * tile_distmap.get(x, y);
                            let q = &mut quant_field.row_mut(y)[x];
                            if adjust_quant_val(q, peak_dist, factor, quant_max) {
                                changed = true;
                            }
                        }
                    }
                }
                if changed {
                    break;
                }
            }
            if quant_max >= QUANT_MAX_LIMIT {
                break;
            }
            if !changed {
                quant_max += QUANT_MAX_RELAX;
            }
        }
        if !changed {
            outer_iter += 1;
            if outer_iter == MAX_OUTER_ITERS {
                break;
            }
            let rescale = QUANT_RESCALE[outer_iter];
            for y in 0..img.block_ysize() {
                for q in quant_field.row_mut(y) {
                    *q *= rescale;
                }
            }
        }
    }
}
