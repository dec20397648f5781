//! Bank header: 2 words, `[length:32][tag:16|type:8|num:8]`.

use super::Header;
use crate::datatype::DataType;
use crate::error::{EvioError, Result};
use crate::primitive::order::{get_u32, put_u32};
use crate::primitive::ByteOrder;

/// A bank header: 16-bit tag, 8-bit num, 6-bit data type code plus a 2-bit
/// padding count, and a 32-bit length in words excluding the length word
/// itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BankHeader {
    /// Length in 32-bit words, excluding this length word.
    pub length: u32,
    pub tag: u16,
    pub num: u8,
    /// Raw 6-bit data type code, preserved exactly as read (ALSOBANK stays
    /// ALSOBANK rather than being normalized to BANK).
    data_type_code: u8,
    /// Padding byte count (0..=3), meaningful only for byte/short leaves.
    pub padding: u8,
}

impl BankHeader {
    /// Builds a new bank header. `padding` must be `0..=3`.
    pub fn new(tag: u16, num: u8, data_type: DataType, padding: u8, length: u32) -> Result<Self> {
        if padding > 3 {
            return Err(EvioError::Format(format!(
                "bank padding {padding} out of range 0..=3"
            )));
        }
        Ok(BankHeader {
            length,
            tag,
            num,
            data_type_code: data_type.code(),
            padding,
        })
    }

    /// The data type, preserving the raw code (including ALSOBANK/ALSOSEGMENT
    /// aliases) exactly as last set or decoded.
    pub fn data_type(&self) -> DataType {
        DataType::from_code(self.data_type_code)
    }

    /// Sets the data type, re-packing padding unchanged.
    pub fn set_data_type(&mut self, data_type: DataType) {
        self.data_type_code = data_type.code();
    }

    fn type_byte(&self) -> u8 {
        (self.padding << 6) | (self.data_type_code & 0x3f)
    }
}

impl Header for BankHeader {
    const HEADER_WORDS: usize = 2;

    fn encode(&self, dst: &mut [u8], order: ByteOrder) -> Result<usize> {
        put_u32(dst, 0, self.length, order)?;
        let word1 = ((self.tag as u32) << 16) | ((self.type_byte() as u32) << 8) | self.num as u32;
        put_u32(dst, 4, word1, order)?;
        Ok(8)
    }

    fn decode(src: &[u8], order: ByteOrder) -> Result<(Self, usize)> {
        let length = get_u32(src, 0, order)?;
        let word1 = get_u32(src, 4, order)?;
        let tag = ((word1 >> 16) & 0xffff) as u16;
        let type_byte = ((word1 >> 8) & 0xff) as u8;
        let num = (word1 & 0xff) as u8;
        let header = BankHeader {
            length,
            tag,
            num,
            data_type_code: type_byte & 0x3f,
            padding: type_byte >> 6,
        };
        Ok((header, 8))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_big_endian() {
        let h = BankHeader::new(0x1234, 0x56, DataType::Uint32, 2, 10).unwrap();
        let mut buf = [0u8; 8];
        let n = h.encode(&mut buf, ByteOrder::BigEndian).unwrap();
        assert_eq!(n, 8);
        let (decoded, next) = BankHeader::decode(&buf, ByteOrder::BigEndian).unwrap();
        assert_eq!(next, 8);
        assert_eq!(decoded, h);
    }

    #[test]
    fn also_bank_round_trips_raw_code() {
        let h = BankHeader::new(1, 2, DataType::AlsoBank, 0, 3).unwrap();
        let mut buf = [0u8; 8];
        h.encode(&mut buf, ByteOrder::LittleEndian).unwrap();
        let (decoded, _) = BankHeader::decode(&buf, ByteOrder::LittleEndian).unwrap();
        assert_eq!(decoded.data_type(), DataType::AlsoBank);
        assert!(decoded.data_type().is_bank());
    }

    #[test]
    fn padding_bits_round_trip() {
        let h = BankHeader::new(0, 0, DataType::Char8, 3, 0).unwrap();
        let mut buf = [0u8; 8];
        h.encode(&mut buf, ByteOrder::BigEndian).unwrap();
        let (decoded, _) = BankHeader::decode(&buf, ByteOrder::BigEndian).unwrap();
        assert_eq!(decoded.padding, 3);
        assert_eq!(decoded.data_type(), DataType::Char8);
    }

    #[test]
    fn rejects_out_of_range_padding() {
        assert!(BankHeader::new(0, 0, DataType::Char8, 4, 0).is_err());
    }
}
