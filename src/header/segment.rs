//! Segment header: 1 word, `[tag:8|type:8|length:16]`.

use super::Header;
use crate::datatype::DataType;
use crate::error::{EvioError, Result};
use crate::primitive::order::{get_u32, put_u32};
use crate::primitive::ByteOrder;

/// A segment header: 8-bit tag, 6-bit data type code plus 2-bit padding, and
/// a 16-bit length in words (data words only — segments have no "self" word).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentHeader {
    pub tag: u8,
    data_type_code: u8,
    pub padding: u8,
    pub length: u16,
}

impl SegmentHeader {
    pub fn new(tag: u8, data_type: DataType, padding: u8, length: u16) -> Result<Self> {
        if padding > 3 {
            return Err(EvioError::Format(format!(
                "segment padding {padding} out of range 0..=3"
            )));
        }
        Ok(SegmentHeader {
            tag,
            data_type_code: data_type.code(),
            padding,
            length,
        })
    }

    pub fn data_type(&self) -> DataType {
        DataType::from_code(self.data_type_code)
    }

    pub fn set_data_type(&mut self, data_type: DataType) {
        self.data_type_code = data_type.code();
    }

    fn type_byte(&self) -> u8 {
        (self.padding << 6) | (self.data_type_code & 0x3f)
    }
}

impl Header for SegmentHeader {
    const HEADER_WORDS: usize = 1;

    fn encode(&self, dst: &mut [u8], order: ByteOrder) -> Result<usize> {
        let word = ((self.tag as u32) << 24)
            | ((self.type_byte() as u32) << 16)
            | (self.length as u32);
        put_u32(dst, 0, word, order)?;
        Ok(4)
    }

    fn decode(src: &[u8], order: ByteOrder) -> Result<(Self, usize)> {
        let word = get_u32(src, 0, order)?;
        let tag = ((word >> 24) & 0xff) as u8;
        let type_byte = ((word >> 16) & 0xff) as u8;
        let length = (word & 0xffff) as u16;
        let header = SegmentHeader {
            tag,
            data_type_code: type_byte & 0x3f,
            padding: type_byte >> 6,
            length,
        };
        Ok((header, 4))
    }
}
