//! Bit-granular writer and reader for the coefficient payload.
//!
//! The writer grows a `Vec<u8>`; the reader walks a borrowed slice and fails
//! with `TruncatedStream` instead of reading past the end. MSB-first within
//! each byte.

use crate::error::PikError;

pub struct BitWriter {
    destination: Vec<u8>,
    bit_buffer: u64,
    bits_in_buffer: u32,
}

impl BitWriter {
    pub fn new() -> Self {
        Self {
            destination: Vec::new(),
            bit_buffer: 0,
            bits_in_buffer: 0,
        }
    }

    pub fn write_bits(&mut self, value: u32, length: u32) {
        if length == 0 {
            return;
        }
        debug_assert!(length <= 32);
        let mask = if length == 32 {
            u32::MAX
        } else {
            (1u32 << length) - 1
        };
        self.bit_buffer = (self.bit_buffer << length) | u64::from(value & mask);
        self.bits_in_buffer += length;

        while self.bits_in_buffer >= 8 {
            let shift = self.bits_in_buffer - 8;
            self.destination.push(((self.bit_buffer >> shift) & 0xFF) as u8);
            self.bits_in_buffer = shift;
            if shift > 0 {
                self.bit_buffer &= (1u64 << shift) - 1;
            } else {
                self.bit_buffer = 0;
            }
        }
    }

    /// Unary-coded quotient: `count` one bits followed by a terminating zero.
    pub fn write_unary(&mut self, mut count: u32) {
        while count >= 16 {
            self.write_bits(0xFFFF, 16);
            count -= 16;
        }
        // count ones then the zero terminator
        self.write_bits((1u32 << (count + 1)) - 2, count + 1);
    }

    /// Pads the current byte with zero bits.
    pub fn align_to_byte(&mut self) {
        if self.bits_in_buffer > 0 {
            let pad = 8 - self.bits_in_buffer;
            self.write_bits(0, pad);
        }
    }

    pub fn finalize(mut self) -> Vec<u8> {
        self.align_to_byte();
        self.destination
    }
}

pub struct BitReader<'a> {
    source: &'a [u8],
    position: usize,
    bit_buffer: u64,
    bits_in_buffer: u32,
}

impl<'a> BitReader<'a> {
    pub fn new(source: &'a [u8]) -> Self {
        Self {
            source,
            position: 0,
            bit_buffer: 0,
            bits_in_buffer: 0,
        }
    }

    pub fn read_bits(&mut self, length: u32) -> Result<u32, PikError> {
        if length == 0 {
            return Ok(0);
        }
        debug_assert!(length <= 32);
        while self.bits_in_buffer < length {
            if self.position >= self.source.len() {
                return Err(PikError::TruncatedStream);
            }
            self.bit_buffer = (self.bit_buffer << 8) | u64::from(self.source[self.position]);
            self.position += 1;
            self.bits_in_buffer += 8;
        }
        let shift = self.bits_in_buffer - length;
        let value = ((self.bit_buffer >> shift) & ((1u64 << length) - 1)) as u32;
        self.bits_in_buffer = shift;
        if shift > 0 {
            self.bit_buffer &= (1u64 << shift) - 1;
        } else {
            self.bit_buffer = 0;
        }
        Ok(value)
    }

    pub fn read_unary(&mut self) -> Result<u32, PikError> {
        let mut count = 0;
        while self.read_bits(1)? == 1 {
            count += 1;
            // A unary run longer than the source is a corrupt stream, not a
            // long value.
            if count > 8 * self.source.len() as u32 {
                return Err(PikError::TruncatedStream);
            }
        }
        Ok(count)
    }

    /// Drops the remainder of the current byte.
    pub fn align_to_byte(&mut self) {
        self.bits_in_buffer -= self.bits_in_buffer % 8;
        if self.bits_in_buffer == 0 {
            self.bit_buffer = 0;
        } else {
            self.bit_buffer &= (1u64 << self.bits_in_buffer) - 1;
        }
    }

    /// Bytes consumed from the source, counting the byte currently buffered.
    pub fn bytes_consumed(&self) -> usize {
        self.position - (self.bits_in_buffer / 8) as usize
    }
}
