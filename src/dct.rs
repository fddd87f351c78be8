//! 8x8 floating-point DCT pair used by the block transform.

use std::f32::consts::PI;

use crate::constants::{BLOCK_EDGE, BLOCK_SIZE};

pub fn fdct_8x8(input: &[f32; BLOCK_SIZE], output: &mut [f32; BLOCK_SIZE]) {
    for u in 0..BLOCK_EDGE {
        for v in 0..BLOCK_EDGE {
            let mut sum = 0.0f32;
            for x in 0..BLOCK_EDGE {
                for y in 0..BLOCK_EDGE {
                    let cos_x = (((2 * x + 1) * u) as f32 * PI) / 16.0;
                    let cos_y = (((2 * y + 1) * v) as f32 * PI) / 16.0;
                    sum += input[x * BLOCK_EDGE + y] * cos_x.cos() * cos_y.cos();
                }
            }
            let cu = if u == 0 { 1.0 / 2.0f32.sqrt() } else { 1.0 };
            let cv = if v == 0 { 1.0 / 2.0f32.sqrt() } else { 1.0 };
            output[u * BLOCK_EDGE + v] = 0.25 * cu * cv * sum;
        }
    }
}

pub fn idct_8x8(input: &[f32; BLOCK_SIZE], output: &mut [f32; BLOCK_SIZE]) {
    for x in 0..BLOCK_EDGE {
        for y in 0..BLOCK_EDGE {
            let mut sum = 0.0f32;
            for u in 0..BLOCK_EDGE {
                for v in 0..BLOCK_EDGE {
                    let cu = if u == 0 { 1.0 / 2.0f32.sqrt() } else { 1.0 };
                    let cv = if v == 0 { 1.0 / 2.0f32.sqrt() } else { 1.0 };
                    let cos_x = (((2 * x + 1) * u) as f32 * PI) / 16.0;
                    let cos_y = (((2 * y + 1) * v) as f32 * PI) / 16.0;
                    sum += cu * cv * input[u * BLOCK_EDGE + v] * cos_x.cos() * cos_y.cos();
                }
            }
            output[x * BLOCK_EDGE + y] = 0.25 * sum;
        }
    }
}
