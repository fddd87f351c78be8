//! End-to-end compress/decompress scenarios across the encoder modes.

use pik_rs::{
    compress, decompress, decompress16, decompress_linear, CompressParams, DecompressParams,
    EncoderStats, Image3B,
};

fn gradient_image(xsize: usize, ysize: usize) -> Image3B {
    let mut image = Image3B::new(xsize, ysize);
    for y in 0..ysize {
        for x in 0..xsize {
            let v = ((x * 9 + y * 3) % 160 + 48) as u8;
            image.plane_mut(0).set(x, y, v);
            image.plane_mut(1).set(x, y, v.wrapping_add(12));
            image.plane_mut(2).set(x, y, v / 2 + 60);
        }
    }
    image
}

fn solid_image(xsize: usize, ysize: usize, value: u8) -> Image3B {
    let mut image = Image3B::new(xsize, ysize);
    for c in 0..3 {
        image.plane_mut(c).fill(value);
    }
    image
}

fn max_channel_error(a: &Image3B, b: &Image3B) -> i32 {
    let mut max_err = 0;
    for c in 0..3 {
        for y in 0..a.ysize() {
            for x in 0..a.xsize() {
                let d = (i32::from(a.plane(c).get(x, y)) - i32::from(b.plane(c).get(x, y))).abs();
                max_err = max_err.max(d);
            }
        }
    }
    max_err
}

#[test]
fn test_distance_mode_roundtrip() {
    let image = gradient_image(16, 16);
    let compressed = compress(&image, &CompressParams::default(), None).unwrap();
    let decoded = decompress(&compressed, &DecompressParams::default(), None).unwrap();
    assert_eq!(decoded.xsize(), 16);
    assert_eq!(decoded.ysize(), 16);
    assert!(max_channel_error(&image, &decoded) <= 48);
}

#[test]
fn test_solid_gray_reconstructs_closely() {
    let image = solid_image(16, 16, 128);
    let compressed = compress(&image, &CompressParams::default(), None).unwrap();
    let decoded = decompress(&compressed, &DecompressParams::default(), None).unwrap();
    assert!(max_channel_error(&image, &decoded) <= 4);
}

#[test]
fn test_fast_mode_roundtrip() {
    let params = CompressParams {
        butteraugli_distance: -1.0,
        fast_mode: true,
        ..CompressParams::default()
    };
    let image = gradient_image(24, 17);
    let compressed = compress(&image, &params, None).unwrap();
    let decoded = decompress(&compressed, &DecompressParams::default(), None).unwrap();
    assert_eq!(decoded.xsize(), 24);
    assert_eq!(decoded.ysize(), 17);
    assert!(max_channel_error(&image, &decoded) <= 64);
}

#[test]
fn test_uniform_mode_roundtrip() {
    let params = CompressParams {
        butteraugli_distance: -1.0,
        uniform_quant: 1.5,
        ..CompressParams::default()
    };
    let image = gradient_image(16, 16);
    let compressed = compress(&image, &params, None).unwrap();
    let decoded = decompress(&compressed, &DecompressParams::default(), None).unwrap();
    assert!(max_channel_error(&image, &decoded) <= 48);
}

#[test]
fn test_bitrate_mode_respects_budget() {
    let params = CompressParams {
        butteraugli_distance: -1.0,
        target_bitrate: 2.0,
        ..CompressParams::default()
    };
    let image = solid_image(32, 32, 90);
    let target_size = (32.0 * 32.0 * 2.0 / 8.0) as usize;
    let compressed = compress(&image, &params, None).unwrap();
    // Header plus payload; the budget applies to the payload.
    assert!(compressed.len() <= target_size + 10);
    let decoded = decompress(&compressed, &DecompressParams::default(), None).unwrap();
    assert_eq!(decoded.xsize(), 32);
}

#[test]
fn test_stats_never_change_output() {
    let image = gradient_image(16, 16);
    let params = CompressParams::default();
    let without = compress(&image, &params, None).unwrap();
    let mut stats = EncoderStats::default();
    let with = compress(&image, &params, Some(&mut stats)).unwrap();
    assert_eq!(without, with);
    assert_eq!(stats.compressed_size, with.len());
    assert!(stats.num_distance_evals >= 1);
    assert!(stats.num_distance_evals <= params.max_butteraugli_iters);
}

#[test]
fn test_strict_size_check_accepts_exact_stream() {
    let image = gradient_image(16, 16);
    let compressed = compress(&image, &CompressParams::default(), None).unwrap();
    let params = DecompressParams {
        check_decompressed_size: true,
        ..DecompressParams::default()
    };
    let mut stats = EncoderStats::default();
    decompress(&compressed, &params, Some(&mut stats)).unwrap();
    assert_eq!(stats.decoded_size, compressed.len());
}

#[test]
fn test_wide_sample_outputs_agree_on_shape() {
    let image = gradient_image(20, 12);
    let compressed = compress(&image, &CompressParams::default(), None).unwrap();
    let params = DecompressParams::default();
    let u8_out = decompress(&compressed, &params, None).unwrap();
    let u16_out = decompress16(&compressed, &params, None).unwrap();
    let linear_out = decompress_linear(&compressed, &params, None).unwrap();
    assert_eq!(u16_out.xsize(), u8_out.xsize());
    assert_eq!(u16_out.ysize(), u8_out.ysize());
    assert_eq!(linear_out.xsize(), u8_out.xsize());
    assert_eq!(linear_out.ysize(), u8_out.ysize());
    // 16-bit samples collapse to the same 8-bit values.
    for y in 0..u8_out.ysize() {
        for x in 0..u8_out.xsize() {
            let wide = u16_out.plane(1).get(x, y);
            let narrow = u8_out.plane(1).get(x, y);
            let diff = (i32::from(wide >> 8) - i32::from(narrow)).abs();
            assert!(diff <= 1);
        }
    }
}
