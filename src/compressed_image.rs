//! The compressed-image representation shared by encoder and decoder.
//!
//! Owns the quantized coefficient grid, the quantization field and the
//! Y-to-B correlation state. On the encoder side it additionally keeps the
//! float transform of the source image so the grid can be re-quantized
//! cheaply as the searches mutate the field.

use crate::constants::{
    BLOCK_EDGE, BLOCK_SIZE, QUANT_WEIGHTS, TILE_TO_BLOCK_RATIO,
};
use crate::bitio::{BitReader, BitWriter};
use crate::dct::{fdct_8x8, idct_8x8};
use crate::entropy::{
    ac_block_tokens, dc_token, decode_ac_block, decode_dc_value, rice_write, Histogram,
};
use crate::error::PikError;
use crate::image::{Image, Image3, Image3B, Image3F, Image3U, Image3W, ImageB};
use crate::opsin::{self, Linear, SampleFormat, Srgb16, Srgb8};
use crate::quantizer::Quantizer;

/// Fixed Rice parameters used by `encode_fast`.
const FAST_RICE_DC: u32 = 3;
const FAST_RICE_AC: u32 = 2;
const MAX_RICE_PARAM: u8 = 7;

pub struct CompressedImage {
    xsize: usize,
    ysize: usize,
    block_xsize: usize,
    block_ysize: usize,
    tile_xsize: usize,
    tile_ysize: usize,
    quantizer: Quantizer,
    /// Quantized coefficients, 64 per block position per channel.
    dct_coeffs: Image3W,
    /// Float transform of the padded source; encoder side only.
    opsin_dct: Option<Image3F>,
    ytob_dc: u8,
    ytob_ac: ImageB,
}

impl CompressedImage {
    /// An empty store of the given pixel dimensions; the coefficient grid is
    /// all zeros until `decode` fills it.
    pub fn new(xsize: usize, ysize: usize) -> Self {
        let block_xsize = xsize.div_ceil(BLOCK_EDGE);
        let block_ysize = ysize.div_ceil(BLOCK_EDGE);
        let tile_xsize = block_xsize.div_ceil(TILE_TO_BLOCK_RATIO);
        let tile_ysize = block_ysize.div_ceil(TILE_TO_BLOCK_RATIO);
        Self {
            xsize,
            ysize,
            block_xsize,
            block_ysize,
            tile_xsize,
            tile_ysize,
            quantizer: Quantizer::new(block_xsize, block_ysize),
            dct_coeffs: Image3W::new(block_xsize * BLOCK_SIZE, block_ysize),
            opsin_dct: None,
            ytob_dc: 120,
            ytob_ac: ImageB::with_value(tile_xsize, tile_ysize, 120),
        }
    }

    /// Builds a store from an opsin-dynamics image: pads to whole blocks by
    /// edge replication and runs the forward transform on every block. The
    /// coefficient grid is undefined until `quantize` is called.
    pub fn from_opsin(opsin: &Image3F) -> Self {
        let mut img = Self::new(opsin.xsize(), opsin.ysize());
        let mut opsin_dct = Image3F::new(img.block_xsize * BLOCK_SIZE, img.block_ysize);
        let mut pixels = [0.0f32; BLOCK_SIZE];
        let mut coeffs = [0.0f32; BLOCK_SIZE];
        for c in 0..3 {
            let plane = opsin.plane(c);
            for by in 0..img.block_ysize {
                for bx in 0..img.block_xsize {
                    for iy in 0..BLOCK_EDGE {
                        let py = (by * BLOCK_EDGE + iy).min(img.ysize - 1);
                        for ix in 0..BLOCK_EDGE {
                            let px = (bx * BLOCK_EDGE + ix).min(img.xsize - 1);
                            pixels[iy * BLOCK_EDGE + ix] = plane.get(px, py);
                        }
                    }
                    fdct_8x8(&pixels, &mut coeffs);
                    let row = opsin_dct.plane_mut(c).row_mut(by);
                    row[bx * BLOCK_SIZE..(bx + 1) * BLOCK_SIZE].copy_from_slice(&coeffs);
                }
            }
        }
        img.opsin_dct = Some(opsin_dct);
        img
    }

    pub fn xsize(&self) -> usize {
        self.xsize
    }

    pub fn ysize(&self) -> usize {
        self.ysize
    }

    pub fn block_xsize(&self) -> usize {
        self.block_xsize
    }

    pub fn block_ysize(&self) -> usize {
        self.block_ysize
    }

    pub fn tile_xsize(&self) -> usize {
        self.tile_xsize
    }

    pub fn tile_ysize(&self) -> usize {
        self.tile_ysize
    }

    pub fn quantizer(&self) -> &Quantizer {
        &self.quantizer
    }

    pub fn quantizer_mut(&mut self) -> &mut Quantizer {
        &mut self.quantizer
    }

    pub fn coeffs(&self) -> &Image3W {
        &self.dct_coeffs
    }

    pub fn ytob_dc(&self) -> i32 {
        i32::from(self.ytob_dc)
    }

    pub fn ytob_ac(&self, tile_x: usize, tile_y: usize) -> i32 {
        i32::from(self.ytob_ac.get(tile_x, tile_y))
    }

    pub fn set_ytob_dc(&mut self, ytob: i32) {
        debug_assert!((0..=255).contains(&ytob));
        self.ytob_dc = ytob as u8;
    }

    pub fn set_ytob_ac(&mut self, tile_x: usize, tile_y: usize, ytob: i32) {
        debug_assert!((0..=255).contains(&ytob));
        self.ytob_ac.set(tile_x, tile_y, ytob as u8);
    }

    /// One block's quantized coefficients for a channel.
    pub fn block(&self, c: usize, block_x: usize, block_y: usize) -> &[i32] {
        let offset = block_x * BLOCK_SIZE;
        &self.dct_coeffs.plane(c).row(block_y)[offset..offset + BLOCK_SIZE]
    }

    /// DC residual against the left (first column: above) neighbor.
    pub fn dc_residual(&self, c: usize, block_x: usize, block_y: usize) -> i32 {
        let plane = self.dct_coeffs.plane(c);
        let dc = plane.row(block_y)[block_x * BLOCK_SIZE];
        let predicted = if block_x > 0 {
            plane.row(block_y)[(block_x - 1) * BLOCK_SIZE]
        } else if block_y > 0 {
            plane.row(block_y - 1)[block_x * BLOCK_SIZE]
        } else {
            0
        };
        dc - predicted
    }

    /// Re-quantizes every block from the current field and Y-to-B state.
    /// Idempotent while the field is unchanged.
    pub fn quantize(&mut self) {
        for by in 0..self.block_ysize {
            for bx in 0..self.block_xsize {
                self.quantize_block(bx, by);
            }
        }
    }

    /// Re-quantizes a single block. The B channel is coded as a residual
    /// against the *reconstructed* Y coefficient so encoder and decoder see
    /// the same prediction.
    pub fn quantize_block(&mut self, block_x: usize, block_y: usize) {
        let opsin_dct = self
            .opsin_dct
            .as_ref()
            .expect("quantize requires a source image");
        let quant_dc = self.quantizer.quant_dc();
        let quant_ac = self.quantizer.quant_ac(block_x, block_y);
        let ytob_dc = f32::from(self.ytob_dc) / 128.0;
        let ytob_ac = f32::from(
            self.ytob_ac
                .get(block_x / TILE_TO_BLOCK_RATIO, block_y / TILE_TO_BLOCK_RATIO),
        ) / 128.0;
        let offset = block_x * BLOCK_SIZE;

        for k in 0..BLOCK_SIZE {
            let quant = if k == 0 { quant_dc } else { quant_ac };
            let ytob = if k == 0 { ytob_dc } else { ytob_ac };
            let x_f = opsin_dct.plane(0).row(block_y)[offset + k];
            let y_f = opsin_dct.plane(1).row(block_y)[offset + k];
            let b_f = opsin_dct.plane(2).row(block_y)[offset + k];

            let x_q = (x_f * quant * QUANT_WEIGHTS[0]).round() as i32;
            let y_q = (y_f * quant * QUANT_WEIGHTS[1]).round() as i32;
            let y_rec = y_q as f32 / (quant * QUANT_WEIGHTS[1]);
            let b_q = ((b_f - ytob * y_rec) * quant * QUANT_WEIGHTS[2]).round() as i32;

            self.dct_coeffs.plane_mut(0).row_mut(block_y)[offset + k] = x_q;
            self.dct_coeffs.plane_mut(1).row_mut(block_y)[offset + k] = y_q;
            self.dct_coeffs.plane_mut(2).row_mut(block_y)[offset + k] = b_q;
        }
    }

    /// Real-valued coefficients of one block, Y-to-B prediction restored.
    pub fn dequantize_block(
        &self,
        block_x: usize,
        block_y: usize,
        out: &mut [[f32; BLOCK_SIZE]; 3],
    ) {
        let quant_dc = self.quantizer.quant_dc();
        let quant_ac = self.quantizer.quant_ac(block_x, block_y);
        let ytob_dc = f32::from(self.ytob_dc) / 128.0;
        let ytob_ac = f32::from(
            self.ytob_ac
                .get(block_x / TILE_TO_BLOCK_RATIO, block_y / TILE_TO_BLOCK_RATIO),
        ) / 128.0;
        let offset = block_x * BLOCK_SIZE;

        for k in 0..BLOCK_SIZE {
            let quant = if k == 0 { quant_dc } else { quant_ac };
            let ytob = if k == 0 { ytob_dc } else { ytob_ac };
            let x_q = self.dct_coeffs.plane(0).row(block_y)[offset + k];
            let y_q = self.dct_coeffs.plane(1).row(block_y)[offset + k];
            let b_q = self.dct_coeffs.plane(2).row(block_y)[offset + k];

            let y = y_q as f32 / (quant * QUANT_WEIGHTS[1]);
            out[0][k] = x_q as f32 / (quant * QUANT_WEIGHTS[0]);
            out[1][k] = y;
            out[2][k] = b_q as f32 / (quant * QUANT_WEIGHTS[2]) + ytob * y;
        }
    }

    fn reconstruct<F: SampleFormat>(&self) -> Image3<F::Sample> {
        let mut out = Image3::<F::Sample>::new(self.xsize, self.ysize);
        let mut coeffs = [[0.0f32; BLOCK_SIZE]; 3];
        let mut pixels = [[0.0f32; BLOCK_SIZE]; 3];
        for by in 0..self.block_ysize {
            for bx in 0..self.block_xsize {
                self.dequantize_block(bx, by, &mut coeffs);
                for c in 0..3 {
                    idct_8x8(&coeffs[c], &mut pixels[c]);
                }
                for iy in 0..BLOCK_EDGE {
                    let py = by * BLOCK_EDGE + iy;
                    if py >= self.ysize {
                        break;
                    }
                    for ix in 0..BLOCK_EDGE {
                        let px = bx * BLOCK_EDGE + ix;
                        if px >= self.xsize {
                            break;
                        }
                        let k = iy * BLOCK_EDGE + ix;
                        let (r, g, b) =
                            opsin::opsin_to_linear(pixels[0][k], pixels[1][k], pixels[2][k]);
                        out.plane_mut(0).set(px, py, F::from_linear(r));
                        out.plane_mut(1).set(px, py, F::from_linear(g));
                        out.plane_mut(2).set(px, py, F::from_linear(b));
                    }
                }
            }
        }
        out
    }

    /// 8-bit sRGB reconstruction of the current quantized state.
    pub fn to_srgb(&self) -> Image3B {
        self.reconstruct::<Srgb8>()
    }

    /// 16-bit sRGB reconstruction.
    pub fn to_srgb16(&self) -> Image3U {
        self.reconstruct::<Srgb16>()
    }

    /// Linear (gamma-expanded) reconstruction.
    pub fn to_linear(&self) -> Image3F {
        self.reconstruct::<Linear>()
    }

    /// Entropy-codes the full store state. Pure; repeated calls on
    /// unchanged state produce identical bytes.
    pub fn encode(&self) -> Vec<u8> {
        self.encode_with(true)
    }

    /// Non-adaptive variant for low-latency paths: fixed Rice parameters,
    /// no histogram pass. Decodes with the same decoder.
    pub fn encode_fast(&self) -> Vec<u8> {
        self.encode_with(false)
    }

    fn encode_with(&self, adaptive: bool) -> Vec<u8> {
        let mut out = Vec::new();
        self.quantizer.encode_to(&mut out);
        out.push(self.ytob_dc);
        for ty in 0..self.tile_ysize {
            out.extend_from_slice(self.ytob_ac.row(ty));
        }

        // Per-channel DC streams, then per-channel AC streams; each stream
        // carries its Rice parameter and is byte aligned.
        for c in 0..3 {
            let k = if adaptive {
                let mut histogram = Histogram::new();
                self.for_each_dc_token(c, |token, nbits, _| histogram.add(token, nbits, 1));
                histogram.best_rice().0
            } else {
                FAST_RICE_DC
            };
            out.push(k as u8);
            let mut writer = BitWriter::new();
            self.for_each_dc_token(c, |token, nbits, bits| {
                rice_write(&mut writer, k, token);
                writer.write_bits(bits, nbits);
            });
            out.extend_from_slice(&writer.finalize());
        }
        for c in 0..3 {
            let k = if adaptive {
                let mut histogram = Histogram::new();
                self.for_each_ac_token(c, |token, nbits, _| histogram.add(token, nbits, 1));
                histogram.best_rice().0
            } else {
                FAST_RICE_AC
            };
            out.push(k as u8);
            let mut writer = BitWriter::new();
            self.for_each_ac_token(c, |token, nbits, bits| {
                rice_write(&mut writer, k, token);
                writer.write_bits(bits, nbits);
            });
            out.extend_from_slice(&writer.finalize());
        }
        out
    }

    pub fn for_each_dc_token(&self, c: usize, mut sink: impl FnMut(u32, u32, u32)) {
        for by in 0..self.block_ysize {
            for bx in 0..self.block_xsize {
                dc_token(self.dc_residual(c, bx, by), &mut sink);
            }
        }
    }

    pub fn for_each_ac_token(&self, c: usize, mut sink: impl FnMut(u32, u32, u32)) {
        for by in 0..self.block_ysize {
            for bx in 0..self.block_xsize {
                ac_block_tokens(self.block(c, bx, by), &mut sink);
            }
        }
    }

    /// Populates the store from an encoded byte string and returns the
    /// number of bytes consumed.
    pub fn decode(&mut self, data: &[u8]) -> Result<usize, PikError> {
        let mut pos = self.quantizer.decode_from(data)?;

        let ytob_bytes = 1 + self.tile_xsize * self.tile_ysize;
        if data.len() < pos + ytob_bytes {
            return Err(PikError::TruncatedStream);
        }
        self.ytob_dc = data[pos];
        pos += 1;
        for ty in 0..self.tile_ysize {
            let row = self.ytob_ac.row_mut(ty);
            row.copy_from_slice(&data[pos..pos + self.tile_xsize]);
            pos += self.tile_xsize;
        }

        self.dct_coeffs = Image3W::new(self.block_xsize * BLOCK_SIZE, self.block_ysize);

        for c in 0..3 {
            let k = self.read_rice_param(data, &mut pos)?;
            let mut reader = BitReader::new(&data[pos..]);
            for by in 0..self.block_ysize {
                for bx in 0..self.block_xsize {
                    let residual = decode_dc_value(&mut reader, k)?;
                    let predicted = if bx > 0 {
                        self.dct_coeffs.plane(c).row(by)[(bx - 1) * BLOCK_SIZE]
                    } else if by > 0 {
                        self.dct_coeffs.plane(c).row(by - 1)[bx * BLOCK_SIZE]
                    } else {
                        0
                    };
                    self.dct_coeffs.plane_mut(c).row_mut(by)[bx * BLOCK_SIZE] =
                        predicted + residual;
                }
            }
            reader.align_to_byte();
            pos += reader.bytes_consumed();
        }
        for c in 0..3 {
            let k = self.read_rice_param(data, &mut pos)?;
            let mut reader = BitReader::new(&data[pos..]);
            let mut block = [0i32; BLOCK_SIZE];
            for by in 0..self.block_ysize {
                for bx in 0..self.block_xsize {
                    block.fill(0);
                    decode_ac_block(&mut reader, k, &mut block)?;
                    let offset = bx * BLOCK_SIZE;
                    let row = self.dct_coeffs.plane_mut(c).row_mut(by);
                    // Position 0 holds the DC value decoded above.
                    row[offset + 1..offset + BLOCK_SIZE].copy_from_slice(&block[1..]);
                }
            }
            reader.align_to_byte();
            pos += reader.bytes_consumed();
        }
        Ok(pos)
    }

    fn read_rice_param(&self, data: &[u8], pos: &mut usize) -> Result<u32, PikError> {
        if *pos >= data.len() {
            return Err(PikError::TruncatedStream);
        }
        let k = data[*pos];
        if k > MAX_RICE_PARAM {
            return Err(PikError::InvalidFormatCode);
        }
        *pos += 1;
        Ok(u32::from(k))
    }
}
