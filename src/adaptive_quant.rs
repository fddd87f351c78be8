//! Content-adaptive quantization multipliers for the low-latency path.
//!
//! Busy regions mask coding error, so their blocks can take a coarser step;
//! flat regions show banding first and get a finer one. The map is built
//! from a smoothed gradient-activity measure of the luma plane only.

use crate::image::ImageF;

const ACTIVITY_CUTOFF: f32 = 0.25;
const SMOOTH_SIGMA: f32 = 3.0;
const MULTIPLIER_FLAT: f32 = 1.3;
const MULTIPLIER_BUSY: f32 = 0.7;
const ACTIVITY_SLOPE: f32 = 24.0;

fn gaussian_kernel(sigma: f32) -> Vec<f32> {
    let radius = (2.0 * sigma + 0.5) as usize;
    let mut kernel = vec![0.0f32; 2 * radius + 1];
    let mut sum = 0.0f32;
    for (i, slot) in kernel.iter_mut().enumerate() {
        let d = i as f32 - radius as f32;
        *slot = (-d * d / (2.0 * sigma * sigma)).exp();
        sum += *slot;
    }
    for v in &mut kernel {
        *v /= sum;
    }
    kernel
}

/// Capped gradient magnitude per pixel. The cap keeps hard edges from
/// dominating the block average the way a raw gradient would.
fn diff_precompute(plane: &ImageF) -> ImageF {
    let xsize = plane.xsize();
    let ysize = plane.ysize();
    let mut diffs = ImageF::new(xsize, ysize);
    for y in 0..ysize {
        let row = plane.row(y);
        let row_below = plane.row((y + 1).min(ysize - 1));
        for x in 0..xsize {
            let right = row[(x + 1).min(xsize - 1)];
            let dx = (right - row[x]).abs();
            let dy = (row_below[x] - row[x]).abs();
            diffs.set(x, y, (dx + dy).min(ACTIVITY_CUTOFF));
        }
    }
    diffs
}

/// Separable clamp-at-edge convolution.
fn smooth(plane: &ImageF, kernel: &[f32]) -> ImageF {
    let xsize = plane.xsize();
    let ysize = plane.ysize();
    let radius = kernel.len() / 2;
    let mut horizontal = ImageF::new(xsize, ysize);
    for y in 0..ysize {
        let row = plane.row(y);
        for x in 0..xsize {
            let mut sum = 0.0f32;
            for (i, &w) in kernel.iter().enumerate() {
                let sx = (x + i).saturating_sub(radius).min(xsize - 1);
                sum += row[sx] * w;
            }
            horizontal.set(x, y, sum);
        }
    }
    let mut out = ImageF::new(xsize, ysize);
    for y in 0..ysize {
        for x in 0..xsize {
            let mut sum = 0.0f32;
            for (i, &w) in kernel.iter().enumerate() {
                let sy = (y + i).saturating_sub(radius).min(ysize - 1);
                sum += horizontal.get(x, sy) * w;
            }
            out.set(x, y, sum);
        }
    }
    out
}

/// Per-block strength multiplier from the luma plane. Flat blocks map to
/// `MULTIPLIER_FLAT`, saturated activity to `MULTIPLIER_BUSY`; output
/// dimensions are the block grid of the input.
pub fn adaptive_quantization_map(luma: &ImageF, block_edge: usize) -> ImageF {
    let out_xsize = luma.xsize().div_ceil(block_edge);
    let out_ysize = luma.ysize().div_ceil(block_edge);
    if luma.xsize() <= 1 || luma.ysize() <= 1 {
        return ImageF::with_value(out_xsize, out_ysize, 1.0);
    }
    let activity = smooth(&diff_precompute(luma), &gaussian_kernel(SMOOTH_SIGMA));
    let mut map = ImageF::new(out_xsize, out_ysize);
    for block_y in 0..out_ysize {
        for block_x in 0..out_xsize {
            let x_max = luma.xsize().min(block_edge * (block_x + 1));
            let y_max = luma.ysize().min(block_edge * (block_y + 1));
            let mut sum = 0.0f32;
            let mut n = 0usize;
            for y in block_edge * block_y..y_max {
                let row = activity.row(y);
                for x in block_edge * block_x..x_max {
                    sum += row[x];
                    n += 1;
                }
            }
            let mean = sum / n as f32;
            let t = (ACTIVITY_SLOPE * mean).min(1.0);
            map.set(
                block_x,
                block_y,
                MULTIPLIER_FLAT + t * (MULTIPLIER_BUSY - MULTIPLIER_FLAT),
            );
        }
    }
    map
}
