use byteordered::Endianness;
use bytes::Buf;

/// Reads multi-byte primitives from a [`Buf`] in a byte order chosen at
/// runtime (bbi files can be written in either).
///
/// Like the methods on `Buf`, these panic if there are not enough bytes
/// remaining, so callers check lengths first.
pub trait EndianBuf: Buf {
    fn get_u16_endian(&mut self, endianness: Endianness) -> u16 {
        match endianness {
            Endianness::Big => self.get_u16(),
            Endianness::Little => self.get_u16_le(),
        }
    }

    fn get_u32_endian(&mut self, endianness: Endianness) -> u32 {
        match endianness {
            Endianness::Big => self.get_u32(),
            Endianness::Little => self.get_u32_le(),
        }
    }

    fn get_u64_endian(&mut self, endianness: Endianness) -> u64 {
        match endianness {
            Endianness::Big => self.get_u64(),
            Endianness::Little => self.get_u64_le(),
        }
    }

    fn get_f32_endian(&mut self, endianness: Endianness) -> f32 {
        match endianness {
            Endianness::Big => self.get_f32(),
            Endianness::Little => self.get_f32_le(),
        }
    }

    fn get_f64_endian(&mut self, endianness: Endianness) -> f64 {
        match endianness {
            Endianness::Big => self.get_f64(),
            Endianness::Little => self.get_f64_le(),
        }
    }
}

impl<B: Buf + ?Sized> EndianBuf for B {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_both_orders() {
        let mut data: &[u8] = &[0x00, 0x00, 0x01, 0x02, 0x02, 0x01, 0x00, 0x00];
        assert_eq!(data.get_u32_endian(Endianness::Big), 0x0102);
        assert_eq!(data.get_u32_endian(Endianness::Little), 0x0102);

        let be = 1.5f64.to_be_bytes();
        let le = 1.5f64.to_le_bytes();
        assert_eq!((&be[..]).get_f64_endian(Endianness::Big), 1.5);
        assert_eq!((&le[..]).get_f64_endian(Endianness::Little), 1.5);
        assert_ne!((&le[..]).get_f64_endian(Endianness::Big), 1.5);
    }
}
