//! The two-resolution quantization field.
//!
//! One global strength for the DC band and one strength per transform block
//! for the AC band. Strengths are the *inverse* of the quantization step:
//! larger means finer steps and higher quality. All values are snapped to a
//! 1/64 fixed-point grid so that change detection, serialization and
//! re-quantization agree bit-exactly between encoder and decoder.

use crate::constants::{MAX_QUANT, QUANT_FIXED_POINT};
use crate::error::PikError;
use crate::image::{Image, ImageF};

/// Smallest representable strength, one fixed-point unit.
const MIN_QUANT_UNITS: u16 = 1;

fn snap(value: f32) -> u16 {
    let units = (value * QUANT_FIXED_POINT).round();
    let max_units = MAX_QUANT * QUANT_FIXED_POINT;
    units.clamp(MIN_QUANT_UNITS as f32, max_units) as u16
}

#[derive(Debug, Clone, PartialEq)]
pub struct Quantizer {
    quant_dc: u16,
    quant_ac: Image<u16>,
}

impl Quantizer {
    pub fn new(block_xsize: usize, block_ysize: usize) -> Self {
        Self {
            quant_dc: snap(1.0),
            quant_ac: Image::with_value(block_xsize, block_ysize, snap(1.0)),
        }
    }

    pub fn block_xsize(&self) -> usize {
        self.quant_ac.xsize()
    }

    pub fn block_ysize(&self) -> usize {
        self.quant_ac.ysize()
    }

    /// Replaces the whole field. Returns whether anything actually changed
    /// after snapping and clamping; a false return means subsequent
    /// `quantize()` calls would be no-ops.
    pub fn set_quant_field(&mut self, quant_dc: f32, quant_ac: &ImageF) -> bool {
        debug_assert!(quant_ac.xsize() == self.quant_ac.xsize());
        debug_assert!(quant_ac.ysize() == self.quant_ac.ysize());
        let mut changed = false;
        let new_dc = snap(quant_dc);
        if new_dc != self.quant_dc {
            self.quant_dc = new_dc;
            changed = true;
        }
        for y in 0..self.quant_ac.ysize() {
            let src = quant_ac.row(y);
            let dst = self.quant_ac.row_mut(y);
            for x in 0..src.len() {
                let new_ac = snap(src[x]);
                if new_ac != dst[x] {
                    dst[x] = new_ac;
                    changed = true;
                }
            }
        }
        changed
    }

    /// Uniform strength for DC and every AC block.
    pub fn set_quant(&mut self, quant: f32) -> bool {
        let uniform = ImageF::with_value(self.quant_ac.xsize(), self.quant_ac.ysize(), quant);
        self.set_quant_field(quant, &uniform)
    }

    /// Current field as real-valued strengths.
    pub fn get_quant_field(&self) -> (f32, ImageF) {
        let dc = self.quant_dc as f32 / QUANT_FIXED_POINT;
        let mut ac = ImageF::new(self.quant_ac.xsize(), self.quant_ac.ysize());
        for y in 0..ac.ysize() {
            let src = self.quant_ac.row(y);
            let dst = ac.row_mut(y);
            for x in 0..src.len() {
                dst[x] = src[x] as f32 / QUANT_FIXED_POINT;
            }
        }
        (dc, ac)
    }

    pub fn quant_dc(&self) -> f32 {
        self.quant_dc as f32 / QUANT_FIXED_POINT
    }

    pub fn quant_ac(&self, block_x: usize, block_y: usize) -> f32 {
        self.quant_ac.get(block_x, block_y) as f32 / QUANT_FIXED_POINT
    }

    /// Serialized size in bytes.
    pub fn encoded_size(&self) -> usize {
        2 + 2 * self.quant_ac.xsize() * self.quant_ac.ysize()
    }

    /// Appends the fixed-point field, DC first then row-major AC.
    pub fn encode_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.quant_dc.to_le_bytes());
        for y in 0..self.quant_ac.ysize() {
            for &v in self.quant_ac.row(y) {
                out.extend_from_slice(&v.to_le_bytes());
            }
        }
    }

    /// Reads back a field written by `encode_to`. Returns bytes consumed.
    pub fn decode_from(&mut self, data: &[u8]) -> Result<usize, PikError> {
        let needed = self.encoded_size();
        if data.len() < needed {
            return Err(PikError::TruncatedStream);
        }
        let max_units = (MAX_QUANT * QUANT_FIXED_POINT) as u16;
        let read_u16 = |pos: usize| u16::from_le_bytes([data[pos], data[pos + 1]]);
        let dc = read_u16(0);
        if dc < MIN_QUANT_UNITS || dc > max_units {
            return Err(PikError::InvalidQuantField);
        }
        self.quant_dc = dc;
        let mut pos = 2;
        for y in 0..self.quant_ac.ysize() {
            for x in 0..self.quant_ac.xsize() {
                let v = read_u16(pos);
                pos += 2;
                if v < MIN_QUANT_UNITS || v > max_units {
                    return Err(PikError::InvalidQuantField);
                }
                self.quant_ac.set(x, y, v);
            }
        }
        Ok(needed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_quant_field_reports_change() {
        let mut quantizer = Quantizer::new(2, 2);
        let field = ImageF::with_value(2, 2, 1.5);
        assert!(quantizer.set_quant_field(2.0, &field));
        // Identical field is a no-op.
        assert!(!quantizer.set_quant_field(2.0, &field));
        // Sub-fixed-point nudges snap away.
        let nudged = ImageF::with_value(2, 2, 1.5 + 1.0 / 1024.0);
        assert!(!quantizer.set_quant_field(2.0, &nudged));
    }

    #[test]
    fn test_clamped_above_max_is_noop() {
        let mut quantizer = Quantizer::new(1, 1);
        quantizer.set_quant(MAX_QUANT);
        // Exceeding the maximum clamps back to it and reports no change.
        assert!(!quantizer.set_quant(MAX_QUANT + 5.0));
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let mut quantizer = Quantizer::new(3, 2);
        let mut field = ImageF::new(3, 2);
        for y in 0..2 {
            for x in 0..3 {
                field.set(x, y, 0.5 + 0.25 * (y * 3 + x) as f32);
            }
        }
        quantizer.set_quant_field(1.25, &field);

        let mut bytes = Vec::new();
        quantizer.encode_to(&mut bytes);

        let mut decoded = Quantizer::new(3, 2);
        let consumed = decoded.decode_from(&bytes).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(decoded, quantizer);
    }

    #[test]
    fn test_decode_rejects_truncation_and_zero() {
        let mut quantizer = Quantizer::new(2, 1);
        assert_eq!(quantizer.decode_from(&[1, 0]), Err(PikError::TruncatedStream));
        // A zero strength is structurally invalid.
        let bytes = [0u8, 0, 64, 0, 64, 0];
        assert_eq!(quantizer.decode_from(&bytes), Err(PikError::InvalidQuantField));
    }
}
