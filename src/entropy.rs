//! Token model, bit-cost estimation and entropy coding of coefficients.
//!
//! Values are split JPEG-style into a category token plus raw extra bits;
//! AC coefficients additionally carry a zero-run in the token's high nibble,
//! with end-of-block and zero-run-length escape tokens. Token streams are
//! Rice-coded with one parameter per context; the parameter travels in the
//! stream, so the adaptive and the fast encoder share one decoder.
//!
//! `Histogram::encoded_bits` prices a token population under the best Rice
//! parameter with the exact cost model the encoder uses, which makes it a
//! cheap, monotone stand-in for a real encode inside the search loops.

use crate::bitio::{BitReader, BitWriter};
use crate::constants::{BLOCK_SIZE, ZIGZAG_ORDER};
use crate::error::PikError;

/// End-of-block: the rest of the block is zero.
pub const TOKEN_EOB: u32 = 0x00;
/// A run of sixteen zero coefficients.
pub const TOKEN_ZRL: u32 = 0xF0;

const TOKEN_ALPHABET: usize = 256;
const MAX_RICE_PARAM: u32 = 7;

/// Number of bits needed for |v|; zero for zero.
#[inline]
pub fn category_of(v: i32) -> u32 {
    32 - v.unsigned_abs().leading_zeros()
}

/// JPEG-style mantissa: negative values are stored offset so the top bit
/// distinguishes sign.
#[inline]
pub fn extra_bits_value(v: i32, category: u32) -> u32 {
    if v < 0 {
        (v + ((1 << category) - 1)) as u32
    } else {
        v as u32
    }
}

#[inline]
pub fn value_from_extra(bits: u32, category: u32) -> i32 {
    if bits < (1 << (category - 1)) {
        bits as i32 - ((1 << category) - 1)
    } else {
        bits as i32
    }
}

/// Walks one block's AC coefficients in zigzag order, emitting
/// `(token, extra_len, extra_bits)` triples.
pub fn ac_block_tokens(coeffs: &[i32], mut sink: impl FnMut(u32, u32, u32)) {
    debug_assert!(coeffs.len() == BLOCK_SIZE);
    let mut run = 0u32;
    for &zz in ZIGZAG_ORDER.iter().skip(1) {
        let v = coeffs[zz];
        if v == 0 {
            run += 1;
            continue;
        }
        while run > 15 {
            sink(TOKEN_ZRL, 0, 0);
            run -= 16;
        }
        let category = category_of(v);
        debug_assert!(category <= 15);
        sink((run << 4) | category, category, extra_bits_value(v, category));
        run = 0;
    }
    if run > 0 {
        sink(TOKEN_EOB, 0, 0);
    }
}

/// Emits one DC residual as `(token, extra_len, extra_bits)`.
pub fn dc_token(residual: i32, mut sink: impl FnMut(u32, u32, u32)) {
    let category = category_of(residual);
    sink(category, category, extra_bits_value(residual, category));
}

#[derive(Debug, Clone)]
pub struct Histogram {
    counts: [i64; TOKEN_ALPHABET],
    extra_bits: i64,
}

impl Histogram {
    pub fn new() -> Self {
        Self {
            counts: [0; TOKEN_ALPHABET],
            extra_bits: 0,
        }
    }

    pub fn add(&mut self, token: u32, extra_len: u32, weight: i64) {
        self.counts[token as usize] += weight;
        self.extra_bits += weight * i64::from(extra_len);
    }

    /// Best Rice parameter and the exact bit cost of this population under
    /// it, extra bits included.
    pub fn best_rice(&self) -> (u32, u64) {
        let mut best_k = 0;
        let mut best_bits = u64::MAX;
        for k in 0..=MAX_RICE_PARAM {
            let mut bits = 0i64;
            for (symbol, &count) in self.counts.iter().enumerate() {
                if count != 0 {
                    bits += count * i64::from((symbol as u32 >> k) + 1 + k);
                }
            }
            let bits = bits.max(0) as u64;
            if bits < best_bits {
                best_bits = bits;
                best_k = k;
            }
        }
        (best_k, best_bits + self.extra_bits.max(0) as u64)
    }

    pub fn encoded_bits(&self) -> u64 {
        // One byte per context for the Rice parameter.
        self.best_rice().1 + 8
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

/// One histogram per color channel plus the shared extra-bit tally.
#[derive(Debug, Clone, Default)]
pub struct HistogramSet {
    pub histograms: [Histogram; 3],
}

impl HistogramSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn encoded_bits(&self) -> u64 {
        self.histograms.iter().map(Histogram::encoded_bits).sum()
    }
}

pub fn rice_write(writer: &mut BitWriter, k: u32, value: u32) {
    writer.write_unary(value >> k);
    if k > 0 {
        writer.write_bits(value & ((1 << k) - 1), k);
    }
}

pub fn rice_read(reader: &mut BitReader<'_>, k: u32) -> Result<u32, PikError> {
    let quotient = reader.read_unary()?;
    if quotient >= TOKEN_ALPHABET as u32 {
        return Err(PikError::TruncatedStream);
    }
    Ok((quotient << k) | reader.read_bits(k)?)
}

/// Decodes one AC block written by `ac_block_tokens` + `rice_write`.
pub fn decode_ac_block(
    reader: &mut BitReader<'_>,
    k: u32,
    coeffs: &mut [i32],
) -> Result<(), PikError> {
    debug_assert!(coeffs.len() == BLOCK_SIZE);
    let mut index = 1;
    while index < BLOCK_SIZE {
        let token = rice_read(reader, k)?;
        if token == TOKEN_EOB {
            break;
        }
        if token == TOKEN_ZRL {
            index += 16;
            continue;
        }
        if token >= TOKEN_ALPHABET as u32 {
            return Err(PikError::TruncatedStream);
        }
        let run = (token >> 4) as usize;
        let category = token & 0xF;
        index += run;
        if category == 0 || index >= BLOCK_SIZE {
            return Err(PikError::TruncatedStream);
        }
        let bits = reader.read_bits(category)?;
        coeffs[ZIGZAG_ORDER[index]] = value_from_extra(bits, category);
        index += 1;
    }
    Ok(())
}

pub fn decode_dc_value(reader: &mut BitReader<'_>, k: u32) -> Result<i32, PikError> {
    let category = rice_read(reader, k)?;
    if category > 17 {
        return Err(PikError::TruncatedStream);
    }
    if category == 0 {
        return Ok(0);
    }
    let bits = reader.read_bits(category)?;
    Ok(value_from_extra(bits, category))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_and_extra_bits() {
        for v in [-1000i32, -17, -1, 0, 1, 5, 255, 16384] {
            let cat = category_of(v);
            if v == 0 {
                assert_eq!(cat, 0);
                continue;
            }
            let bits = extra_bits_value(v, cat);
            assert_eq!(value_from_extra(bits, cat), v);
        }
    }

    #[test]
    fn test_ac_block_roundtrip() {
        let mut coeffs = [0i32; BLOCK_SIZE];
        coeffs[ZIGZAG_ORDER[1]] = -3;
        coeffs[ZIGZAG_ORDER[20]] = 7;
        coeffs[ZIGZAG_ORDER[63]] = 1;

        for k in 0..=3 {
            let mut writer = BitWriter::new();
            ac_block_tokens(&coeffs, |token, nbits, bits| {
                rice_write(&mut writer, k, token);
                writer.write_bits(bits, nbits);
            });
            let bytes = writer.finalize();

            let mut reader = BitReader::new(&bytes);
            let mut decoded = [0i32; BLOCK_SIZE];
            decode_ac_block(&mut reader, k, &mut decoded).unwrap();
            assert_eq!(decoded, coeffs, "k = {k}");
        }
    }

    #[test]
    fn test_ac_all_zero_is_single_eob() {
        let coeffs = [0i32; BLOCK_SIZE];
        let mut tokens = Vec::new();
        ac_block_tokens(&coeffs, |token, _, _| tokens.push(token));
        assert_eq!(tokens, vec![TOKEN_EOB]);
    }

    #[test]
    fn test_histogram_cost_tracks_population() {
        let mut small = Histogram::new();
        let mut large = Histogram::new();
        for _ in 0..100 {
            small.add(1, 1, 1);
            large.add(200, 14, 1);
        }
        assert!(small.encoded_bits() < large.encoded_bits());
    }

    #[test]
    fn test_histogram_weight_cancellation() {
        let mut histogram = Histogram::new();
        histogram.add(5, 3, 1);
        histogram.add(7, 2, 1);
        let before = histogram.encoded_bits();
        histogram.add(9, 4, 1);
        histogram.add(9, 4, -1);
        assert_eq!(histogram.encoded_bits(), before);
    }

    #[test]
    fn test_truncated_ac_block_fails() {
        let mut reader = BitReader::new(&[]);
        let mut coeffs = [0i32; BLOCK_SIZE];
        assert_eq!(
            decode_ac_block(&mut reader, 2, &mut coeffs),
            Err(PikError::TruncatedStream)
        );
    }
}
