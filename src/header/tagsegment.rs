//! TagSegment header: 1 word, `[tag:12|type:4|length:16]`. No num, no padding
//! bits — the type nibble has no spare bits to carry padding in, so
//! byte/short payloads under a tagsegment are assumed already word-aligned.

use super::Header;
use crate::datatype::DataType;
use crate::error::{EvioError, Result};
use crate::primitive::order::{get_u32, put_u32};
use crate::primitive::ByteOrder;

/// A tagsegment header: 12-bit tag, 4-bit data type code, 16-bit length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagSegmentHeader {
    pub tag: u16,
    data_type_code: u8,
    pub length: u16,
}

impl TagSegmentHeader {
    /// Builds a new tagsegment header. `tag` must fit in 12 bits.
    pub fn new(tag: u16, data_type: DataType, length: u16) -> Result<Self> {
        if tag > 0xfff {
            return Err(EvioError::Format(format!(
                "tagsegment tag {tag:#x} does not fit in 12 bits"
            )));
        }
        Ok(TagSegmentHeader {
            tag,
            data_type_code: data_type.code() & 0xf,
            length,
        })
    }

    pub fn data_type(&self) -> DataType {
        DataType::from_code(self.data_type_code)
    }

    pub fn set_data_type(&mut self, data_type: DataType) {
        self.data_type_code = data_type.code() & 0xf;
    }
}

impl Header for TagSegmentHeader {
    const HEADER_WORDS: usize = 1;

    fn encode(&self, dst: &mut [u8], order: ByteOrder) -> Result<usize> {
        let word = ((self.tag as u32) << 20)
            | ((self.data_type_code as u32 & 0xf) << 16)
            | (self.length as u32);
        put_u32(dst, 0, word, order)?;
        Ok(4)
    }

    fn decode(src: &[u8], order: ByteOrder) -> Result<(Self, usize)> {
        let word = get_u32(src, 0, order)?;
        let tag = ((word >> 20) & 0xfff) as u16;
        let data_type_code = ((word >> 16) & 0xf) as u8;
        let length = (word & 0xffff) as u16;
        Ok((
            TagSegmentHeader {
                tag,
                data_type_code,
                length,
            },
            4,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_big_endian() {
        let h = TagSegmentHeader::new(0xABC, DataType::Short16, 7).unwrap();
        let mut buf = [0u8; 4];
        h.encode(&mut buf, ByteOrder::BigEndian).unwrap();
        let (decoded, next) = TagSegmentHeader::decode(&buf, ByteOrder::BigEndian).unwrap();
        assert_eq!(next, 4);
        assert_eq!(decoded, h);
    }

    #[test]
    fn rejects_tag_over_12_bits() {
        assert!(TagSegmentHeader::new(0x1000, DataType::Int32, 0).is_err());
    }

    #[test]
    fn data_type_masked_to_4_bits() {
        let h = TagSegmentHeader::new(1, DataType::Composite, 0).unwrap();
        assert_eq!(h.data_type(), DataType::Composite);
    }
}
