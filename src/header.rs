//! Container header: a format code byte, a flag byte and the image
//! dimensions. Ten bytes, fixed layout, little-endian u32 sizes.

use num_enum::TryFromPrimitive;

use crate::error::PikError;

pub const HEADER_SIZE: usize = 10;

/// First byte of every stream. `LosslessReserved` is claimed by the
/// container but carries no payload definition yet; decoders must reject
/// it rather than guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum FormatCode {
    Opsin = 0x50,
    LosslessReserved = 0x4c,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Header {
    pub xsize: u32,
    pub ysize: u32,
    pub flags: u8,
}

impl Header {
    pub const FLAG_ALPHA: u8 = 1;

    pub fn has_alpha(&self) -> bool {
        self.flags & Self::FLAG_ALPHA != 0
    }

    pub fn num_pixels(&self) -> u64 {
        u64::from(self.xsize) * u64::from(self.ysize)
    }

    pub fn store(&self, code: FormatCode, out: &mut Vec<u8>) {
        out.push(code as u8);
        out.push(self.flags);
        out.extend_from_slice(&self.xsize.to_le_bytes());
        out.extend_from_slice(&self.ysize.to_le_bytes());
    }

    /// Reads a header, returning it with the format code and the number of
    /// bytes consumed. Validates nothing about the payload.
    pub fn load(data: &[u8]) -> Result<(Self, FormatCode, usize), PikError> {
        if data.len() < HEADER_SIZE {
            return Err(PikError::TruncatedHeader);
        }
        let code =
            FormatCode::try_from(data[0]).map_err(|_| PikError::InvalidFormatCode)?;
        let flags = data[1];
        let xsize = u32::from_le_bytes([data[2], data[3], data[4], data[5]]);
        let ysize = u32::from_le_bytes([data[6], data[7], data[8], data[9]]);
        Ok((Self { xsize, ysize, flags }, code, HEADER_SIZE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_load_roundtrip() {
        let header = Header {
            xsize: 1920,
            ysize: 1080,
            flags: Header::FLAG_ALPHA,
        };
        let mut bytes = Vec::new();
        header.store(FormatCode::Opsin, &mut bytes);
        assert_eq!(bytes.len(), HEADER_SIZE);
        let (loaded, code, consumed) = Header::load(&bytes).unwrap();
        assert_eq!(loaded, header);
        assert_eq!(code, FormatCode::Opsin);
        assert_eq!(consumed, HEADER_SIZE);
        assert!(loaded.has_alpha());
    }

    #[test]
    fn test_truncated_header_is_rejected() {
        let header = Header {
            xsize: 8,
            ysize: 8,
            flags: 0,
        };
        let mut bytes = Vec::new();
        header.store(FormatCode::Opsin, &mut bytes);
        for len in 0..HEADER_SIZE {
            assert_eq!(
                Header::load(&bytes[..len]).unwrap_err(),
                PikError::TruncatedHeader
            );
        }
    }

    #[test]
    fn test_unknown_format_code_is_rejected() {
        let bytes = [0xffu8, 0, 8, 0, 0, 0, 8, 0, 0, 0];
        assert_eq!(Header::load(&bytes).unwrap_err(), PikError::InvalidFormatCode);
    }
}
