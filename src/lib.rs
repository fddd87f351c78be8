pub mod constants;
pub mod error;

pub use codec::{
    compress, compress_linear, compress_opsin, decompress, decompress16, decompress_linear,
    CompressParams, DecompressParams,
};
pub use compressed_image::CompressedImage;
pub use error::PikError;
pub use header::{FormatCode, Header};
pub use image::{Image, Image3, Image3B, Image3F, Image3U, ImageB, ImageF};
pub use quantizer::Quantizer;

/// Write-only encoder diagnostics. Passing one never changes the
/// compressed output, it only records what the encoder did.
#[derive(Debug, Clone, Copy, Default)]
pub struct EncoderStats {
    /// Perceptual-oracle evaluations spent by the quality search.
    pub num_distance_evals: u32,
    /// Total output size, header included.
    pub compressed_size: usize,
    pub header_size: usize,
    /// Bytes consumed from the stream by the last decode.
    pub decoded_size: usize,
}

pub mod adaptive_quant;
pub mod bitio;
pub mod codec;
pub mod compressed_image;
pub mod correlation_search;
pub mod dct;
pub mod entropy;
pub mod header;
pub mod image;
pub mod opsin;
pub mod perceptual;
pub mod quant_search;
pub mod quantizer;
pub mod size_search;
