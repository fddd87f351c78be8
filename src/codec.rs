//! Top-level compress/decompress entry points and their parameter types.

use log::debug;

use crate::adaptive_quant::adaptive_quantization_map;
use crate::constants::{
    BLOCK_EDGE, DEFAULT_MAX_NUM_PIXELS, FAST_QUANT_AC, FAST_QUANT_DC, MAX_IMAGE_WIDTH,
};
use crate::compressed_image::CompressedImage;
use crate::correlation_search::find_best_ytob_correlation;
use crate::error::PikError;
use crate::header::{FormatCode, Header};
use crate::image::{scale_image, Image3B, Image3F, Image3U};
use crate::opsin::{opsin_dynamics_image, opsin_dynamics_image_linear};
use crate::quant_search::find_best_quantization;
use crate::size_search::compress_to_target_size;
use crate::EncoderStats;

/// Encoder settings. The first applicable mode wins: perceptual distance,
/// then target bitrate, then uniform quantization, then fast mode. With
/// every mode disabled compression fails rather than guessing.
#[derive(Debug, Clone, Copy)]
pub struct CompressParams {
    /// Maximum perceptual distance of the reconstruction; negative
    /// disables the quality-targeted mode.
    pub butteraugli_distance: f32,
    /// Bits per pixel; positive enables the size-targeted mode.
    pub target_bitrate: f32,
    /// Fixed quantization strength; positive enables the uniform mode.
    pub uniform_quant: f32,
    /// One-pass encoding with a content-adaptive field, no search.
    pub fast_mode: bool,
    /// Budget of perceptual-oracle evaluations for the quality search.
    pub max_butteraugli_iters: u32,
    pub alpha_channel: bool,
    /// Emit per-iteration search traces through `log`.
    pub verbose: bool,
}

impl Default for CompressParams {
    fn default() -> Self {
        Self {
            butteraugli_distance: 1.0,
            target_bitrate: 0.0,
            uniform_quant: 0.0,
            fast_mode: false,
            max_butteraugli_iters: 7,
            alpha_channel: false,
            verbose: false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DecompressParams {
    /// Decode-side allocation guard, checked against the header before
    /// the coefficient grid is allocated.
    pub max_num_pixels: u64,
    /// Require the stream to contain nothing but one image.
    pub check_decompressed_size: bool,
}

impl Default for DecompressParams {
    fn default() -> Self {
        Self {
            max_num_pixels: DEFAULT_MAX_NUM_PIXELS,
            check_decompressed_size: false,
        }
    }
}

/// Compresses an 8-bit sRGB image.
pub fn compress(
    image: &Image3B,
    params: &CompressParams,
    stats: Option<&mut EncoderStats>,
) -> Result<Vec<u8>, PikError> {
    if image.xsize() == 0 || image.ysize() == 0 {
        return Err(PikError::EmptyImage);
    }
    if params.alpha_channel {
        return Err(PikError::AlphaNotSupported);
    }
    compress_opsin(&opsin_dynamics_image(image), params, stats)
}

/// Compresses an image already in linear RGB.
pub fn compress_linear(
    image: &Image3F,
    params: &CompressParams,
    stats: Option<&mut EncoderStats>,
) -> Result<Vec<u8>, PikError> {
    if image.xsize() == 0 || image.ysize() == 0 {
        return Err(PikError::EmptyImage);
    }
    if params.alpha_channel {
        return Err(PikError::AlphaNotSupported);
    }
    compress_opsin(&opsin_dynamics_image_linear(image), params, stats)
}

/// Compresses an image already in the opsin dynamics colorspace. Entry
/// point for callers that run the color transform themselves.
pub fn compress_opsin(
    opsin: &Image3F,
    params: &CompressParams,
    mut stats: Option<&mut EncoderStats>,
) -> Result<Vec<u8>, PikError> {
    let xsize = opsin.xsize();
    let ysize = opsin.ysize();
    if xsize == 0 || ysize == 0 {
        return Err(PikError::EmptyImage);
    }
    // Checked before the coefficient grid is allocated.
    if xsize > MAX_IMAGE_WIDTH as usize {
        return Err(PikError::ImageTooWide);
    }

    let payload = if params.butteraugli_distance >= 0.0 {
        debug!(
            "compressing to distance {:.3}",
            params.butteraugli_distance
        );
        let mut img = quality_searched_image(opsin, params, stats.as_deref_mut());
        img.encode()
    } else if params.target_bitrate > 0.0 {
        let target_size =
            (xsize as f32 * ysize as f32 * params.target_bitrate / 8.0) as usize;
        debug!("compressing to {} bytes", target_size);
        let base_params = CompressParams {
            butteraugli_distance: 1.0,
            ..*params
        };
        let mut img = quality_searched_image(opsin, &base_params, stats.as_deref_mut());
        let mut payload = Vec::new();
        compress_to_target_size(target_size, false, &mut img, &mut payload);
        payload
    } else if params.uniform_quant > 0.0 {
        let mut img = CompressedImage::from_opsin(opsin);
        img.quantizer_mut().set_quant(params.uniform_quant);
        img.quantize();
        img.encode()
    } else if params.fast_mode {
        let mut img = CompressedImage::from_opsin(opsin);
        let field = adaptive_quantization_map(opsin.plane(1), BLOCK_EDGE);
        img.quantizer_mut()
            .set_quant_field(FAST_QUANT_DC, &scale_image(FAST_QUANT_AC, &field));
        img.quantize();
        img.encode_fast()
    } else {
        return Err(PikError::NotImplemented);
    };

    let header = Header {
        xsize: xsize as u32,
        ysize: ysize as u32,
        flags: 0,
    };
    let mut compressed = Vec::with_capacity(crate::header::HEADER_SIZE + payload.len());
    header.store(FormatCode::Opsin, &mut compressed);
    let header_size = compressed.len();
    compressed.extend_from_slice(&payload);
    if let Some(stats) = stats.as_deref_mut() {
        stats.header_size = header_size;
        stats.compressed_size = compressed.len();
    }
    Ok(compressed)
}

/// Shared front half of the distance and bitrate modes.
fn quality_searched_image(
    opsin: &Image3F,
    params: &CompressParams,
    stats: Option<&mut EncoderStats>,
) -> CompressedImage {
    let mut img = CompressedImage::from_opsin(opsin);
    img.quantizer_mut().set_quant(1.0);
    img.quantize();
    find_best_ytob_correlation(&mut img);
    find_best_quantization(
        opsin,
        params.butteraugli_distance,
        params.max_butteraugli_iters,
        &mut img,
        stats,
        params.verbose,
    );
    img
}

fn decode_store(
    compressed: &[u8],
    params: &DecompressParams,
    stats: Option<&mut EncoderStats>,
) -> Result<CompressedImage, PikError> {
    if compressed.is_empty() {
        return Err(PikError::TruncatedHeader);
    }
    let (header, code, header_size) = Header::load(compressed)?;
    if code == FormatCode::LosslessReserved {
        return Err(PikError::InvalidFormatCode);
    }
    if header.xsize == 0 || header.ysize == 0 {
        return Err(PikError::EmptyImage);
    }
    if header.xsize > MAX_IMAGE_WIDTH {
        return Err(PikError::ImageTooWide);
    }
    if header.num_pixels() > params.max_num_pixels {
        return Err(PikError::ImageTooBig);
    }
    if header.has_alpha() {
        return Err(PikError::AlphaNotSupported);
    }
    let mut img = CompressedImage::new(header.xsize as usize, header.ysize as usize);
    let payload_read = img.decode(&compressed[header_size..])?;
    let decoded_size = header_size + payload_read;
    if params.check_decompressed_size && decoded_size != compressed.len() {
        return Err(PikError::SizeMismatch);
    }
    if let Some(stats) = stats {
        stats.decoded_size = decoded_size;
    }
    Ok(img)
}

/// Decompresses to 8-bit sRGB.
pub fn decompress(
    compressed: &[u8],
    params: &DecompressParams,
    stats: Option<&mut EncoderStats>,
) -> Result<Image3B, PikError> {
    Ok(decode_store(compressed, params, stats)?.to_srgb())
}

/// Decompresses to 16-bit sRGB.
pub fn decompress16(
    compressed: &[u8],
    params: &DecompressParams,
    stats: Option<&mut EncoderStats>,
) -> Result<Image3U, PikError> {
    Ok(decode_store(compressed, params, stats)?.to_srgb16())
}

/// Decompresses to linear RGB.
pub fn decompress_linear(
    compressed: &[u8],
    params: &DecompressParams,
    stats: Option<&mut EncoderStats>,
) -> Result<Image3F, PikError> {
    Ok(decode_store(compressed, params, stats)?.to_linear())
}
