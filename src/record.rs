//! Record codec (component C6): the record header (14 words), event index
//! array, optional user header, and compressed payload (spec.md section 4.6
//! / section 6).

use crate::bitinfo::{BitInfo, HeaderType};
use crate::compression::{compress, decompress, CompressionType};
use crate::config::{EVIO_MAGIC, RECORD_HEADER_WORDS};
use crate::error::{EvioError, Result};
use crate::primitive::array::{get_u32_array, put_u32_array};
use crate::primitive::order::{get_u32, get_u64, pad, put_u32, put_u64};
use crate::primitive::ByteOrder;

/// The 14-word record (or trailer) header, decoded into its named fields
/// (spec.md section 6).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordHeader {
    pub length_words: u32,
    pub record_number: u32,
    pub header_words: u32,
    pub event_count: u32,
    pub index_bytes: u32,
    pub bit_info: BitInfo,
    pub user_header_bytes: u32,
    pub uncompressed_data_bytes: u32,
    pub compression_type: CompressionType,
    pub compressed_data_words: u32,
    pub user_register1: u64,
    pub user_register2: u64,
}

impl RecordHeader {
    pub fn encode(&self, dst: &mut [u8], order: ByteOrder) -> Result<()> {
        if dst.len() < RECORD_HEADER_WORDS as usize * 4 {
            return Err(EvioError::Bounds("record header buffer too small".into()));
        }
        put_u32(dst, 0, self.length_words, order)?;
        put_u32(dst, 4, self.record_number, order)?;
        put_u32(dst, 8, self.header_words, order)?;
        put_u32(dst, 12, self.event_count, order)?;
        put_u32(dst, 16, self.index_bytes, order)?;
        put_u32(dst, 20, self.bit_info.encode()?, order)?;
        put_u32(dst, 24, self.user_header_bytes, order)?;
        put_u32(dst, 28, EVIO_MAGIC, order)?;
        put_u32(dst, 32, self.uncompressed_data_bytes, order)?;
        if self.compressed_data_words > 0x0fff_ffff {
            return Err(EvioError::Format("compressed data word count overflows 28 bits".into()));
        }
        let word = ((self.compression_type.code() as u32 & 0xf) << 28) | self.compressed_data_words;
        put_u32(dst, 36, word, order)?;
        put_u64(dst, 40, self.user_register1, order)?;
        put_u64(dst, 48, self.user_register2, order)?;
        Ok(())
    }

    pub fn decode(src: &[u8], order: ByteOrder) -> Result<Self> {
        if src.len() < RECORD_HEADER_WORDS as usize * 4 {
            return Err(EvioError::Truncated("record header shorter than 14 words".into()));
        }
        let magic = get_u32(src, 28, order)?;
        if magic != EVIO_MAGIC {
            return Err(EvioError::Format(format!(
                "record header magic word {magic:#x} does not match {EVIO_MAGIC:#x}"
            )));
        }
        let comp_word = get_u32(src, 36, order)?;
        Ok(RecordHeader {
            length_words: get_u32(src, 0, order)?,
            record_number: get_u32(src, 4, order)?,
            header_words: get_u32(src, 8, order)?,
            event_count: get_u32(src, 12, order)?,
            index_bytes: get_u32(src, 16, order)?,
            bit_info: BitInfo::decode(get_u32(src, 20, order)?),
            user_header_bytes: get_u32(src, 24, order)?,
            uncompressed_data_bytes: get_u32(src, 32, order)?,
            compression_type: CompressionType::from_code((comp_word >> 28) as u8)?,
            compressed_data_words: comp_word & 0x0fff_ffff,
            user_register1: get_u64(src, 40, order)?,
            user_register2: get_u64(src, 48, order)?,
        })
    }

    pub fn is_trailer(&self) -> bool {
        self.bit_info.header_type.is_trailer()
    }
}

/// A record, built in memory: events plus an optional user header, ready to
/// be compressed and written.
pub struct RecordBuilder {
    events: Vec<Vec<u8>>,
    user_header: Vec<u8>,
    record_number: u32,
    compression: CompressionType,
}

impl RecordBuilder {
    pub fn new(record_number: u32, compression: CompressionType) -> Self {
        RecordBuilder {
            events: Vec::new(),
            user_header: Vec::new(),
            record_number,
            compression,
        }
    }

    pub fn add_event(&mut self, event: Vec<u8>) {
        self.events.push(event);
    }

    pub fn set_user_header(&mut self, user_header: Vec<u8>) {
        self.user_header = user_header;
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    pub fn uncompressed_bytes(&self) -> usize {
        self.events.iter().map(|e| e.len()).sum()
    }

    /// Builds the wire bytes: header followed by the (possibly compressed)
    /// `[index | user-header | payload]` body, per spec.md section 4.6.
    pub fn build(&self, order: ByteOrder) -> Result<Vec<u8>> {
        let mut index = Vec::with_capacity(self.events.len() * 4);
        for event in &self.events {
            let mut buf = [0u8; 4];
            put_u32(&mut buf, 0, event.len() as u32, order)?;
            index.extend_from_slice(&buf);
        }

        let user_header_padded_len = self.user_header.len() + pad(self.user_header.len());
        let mut body = Vec::with_capacity(
            index.len() + user_header_padded_len + self.uncompressed_bytes(),
        );
        body.extend_from_slice(&index);
        body.extend_from_slice(&self.user_header);
        body.extend(std::iter::repeat(0u8).take(pad(self.user_header.len())));
        for event in &self.events {
            body.extend_from_slice(event);
        }

        let uncompressed_data_bytes = body.len() as u32;
        let compressed = compress(self.compression, &body)?;
        let compressed_padded_len = compressed.len() + pad(compressed.len());
        let compressed_data_words = (compressed_padded_len / 4) as u32;

        let header_words = RECORD_HEADER_WORDS;
        let length_words = header_words + compressed_data_words;

        let header = RecordHeader {
            length_words,
            record_number: self.record_number,
            header_words,
            event_count: self.events.len() as u32,
            index_bytes: index.len() as u32,
            bit_info: BitInfo {
                version: 6,
                header_type: HeaderType::EvioRecord,
                ..Default::default()
            },
            user_header_bytes: self.user_header.len() as u32,
            uncompressed_data_bytes,
            compression_type: self.compression,
            compressed_data_words,
            user_register1: 0,
            user_register2: 0,
        };

        let mut out = vec![0u8; header_words as usize * 4];
        header.encode(&mut out, order)?;
        out.extend_from_slice(&compressed);
        out.extend(std::iter::repeat(0u8).take(pad(compressed.len())));
        Ok(out)
    }

    /// Builds the trailer record variant: the last-record bit set and,
    /// optionally, an index payload of `(record_length_bytes, event_count)`
    /// pairs covering every preceding record (spec.md section 4.6, 4.7).
    pub fn build_trailer(
        record_number: u32,
        record_sizes: &[(u32, u32)],
        order: ByteOrder,
    ) -> Result<Vec<u8>> {
        let mut payload = Vec::with_capacity(record_sizes.len() * 8);
        for &(len, count) in record_sizes {
            let mut buf = [0u8; 8];
            put_u32(&mut buf, 0, len, order)?;
            put_u32(&mut buf, 4, count, order)?;
            payload.extend_from_slice(&buf);
        }
        let header_words = RECORD_HEADER_WORDS;
        let length_words = header_words + (payload.len() / 4) as u32;
        let header = RecordHeader {
            length_words,
            record_number,
            header_words,
            event_count: 0,
            index_bytes: payload.len() as u32,
            bit_info: BitInfo {
                version: 6,
                has_first_event_or_last_record: true,
                trailer_with_index: !record_sizes.is_empty(),
                header_type: HeaderType::EvioTrailer,
                ..Default::default()
            },
            user_header_bytes: 0,
            uncompressed_data_bytes: payload.len() as u32,
            compression_type: CompressionType::None,
            compressed_data_words: (payload.len() / 4) as u32,
            user_register1: 0,
            user_register2: 0,
        };
        let mut out = vec![0u8; header_words as usize * 4];
        header.encode(&mut out, order)?;
        out.extend_from_slice(&payload);
        Ok(out)
    }
}

/// A decoded record: header plus access to its index, user header, and
/// individual events.
pub struct RecordReader {
    pub header: RecordHeader,
    body: Vec<u8>,
    event_offsets: Vec<(usize, usize)>,
}

impl RecordReader {
    /// Parses a record starting at `src[0..]`. `src` must contain at least
    /// `header.length_words * 4` bytes.
    pub fn parse(src: &[u8], order: ByteOrder) -> Result<Self> {
        let header = RecordHeader::decode(src, order)?;
        let total_bytes = header.length_words as usize * 4;
        if src.len() < total_bytes {
            return Err(EvioError::Truncated(format!(
                "record claims {total_bytes} bytes, only {} available",
                src.len()
            )));
        }
        let compressed_start = header.header_words as usize * 4;
        let compressed_bytes = header.compressed_data_words as usize * 4;
        let compressed = &src[compressed_start..compressed_start + compressed_bytes];

        let body = decompress(
            header.compression_type,
            compressed,
            header.uncompressed_data_bytes as usize,
        )?;

        if body.len() < header.index_bytes as usize {
            return Err(EvioError::Format("decompressed record shorter than its own index".into()));
        }
        let index_words = get_u32_array(&body, 0, header.index_bytes as usize / 4, order)?;
        let payload_start = header.index_bytes as usize
            + header.user_header_bytes as usize
            + pad(header.user_header_bytes as usize);
        let mut event_offsets = Vec::with_capacity(index_words.len());
        let mut pos = payload_start;
        for &len in &index_words {
            event_offsets.push((pos, len as usize));
            pos += len as usize;
        }
        Ok(RecordReader {
            header,
            body,
            event_offsets,
        })
    }

    pub fn event_count(&self) -> usize {
        self.event_offsets.len()
    }

    pub fn user_header(&self) -> &[u8] {
        let start = self.header.index_bytes as usize;
        &self.body[start..start + self.header.user_header_bytes as usize]
    }

    /// Returns event `i`'s bytes, copied out of the decompressed body.
    pub fn event(&self, i: usize) -> Result<&[u8]> {
        let (start, len) = *self
            .event_offsets
            .get(i)
            .ok_or_else(|| EvioError::Bounds(format!("no event at index {i} in this record")))?;
        Ok(&self.body[start..start + len])
    }

    /// Returns this record's dictionary event (its first event) when the
    /// record's bit-info marks one present (SPEC_FULL.md section 3
    /// supplement), or `None` otherwise. The caller is responsible for
    /// parsing the returned bytes as an XML dictionary; this crate does not.
    pub fn dictionary_event(&self) -> Result<Option<&[u8]>> {
        if !self.header.bit_info.has_dictionary || self.event_offsets.is_empty() {
            return Ok(None);
        }
        self.event(0).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Scenario E4 from spec.md section 8.
    #[test]
    fn scenario_e4_two_event_record_no_compression() {
        let mut builder = RecordBuilder::new(1, CompressionType::None);
        builder.add_event(vec![0xAAu8; 24]);
        builder.add_event(vec![0xBBu8; 40]);
        let bytes = builder.build(ByteOrder::BigEndian).unwrap();

        let reader = RecordReader::parse(&bytes, ByteOrder::BigEndian).unwrap();
        assert_eq!(reader.header.length_words, 14 + 2 + 16);
        assert_eq!(reader.event_count(), 2);
        assert_eq!(reader.event(0).unwrap().len(), 24);
        assert_eq!(reader.event(1).unwrap().len(), 40);
        assert_eq!(reader.event(0).unwrap(), vec![0xAAu8; 24]);
        assert_eq!(reader.event(1).unwrap(), vec![0xBBu8; 40]);
    }

    #[test]
    fn record_round_trips_with_lz4_fast_and_user_header() {
        let mut builder = RecordBuilder::new(5, CompressionType::Lz4Fast);
        builder.set_user_header(vec![1, 2, 3]);
        builder.add_event(b"hello world, this compresses reasonably well".to_vec());
        builder.add_event(b"a second event with some repeated repeated text".to_vec());
        let bytes = builder.build(ByteOrder::LittleEndian).unwrap();

        let reader = RecordReader::parse(&bytes, ByteOrder::LittleEndian).unwrap();
        assert_eq!(reader.header.record_number, 5);
        assert_eq!(reader.user_header(), &[1, 2, 3]);
        assert_eq!(reader.event(0).unwrap(), b"hello world, this compresses reasonably well");
        assert_eq!(
            reader.event(1).unwrap(),
            b"a second event with some repeated repeated text"
        );
    }

    /// Scenario E6 from spec.md section 8.
    #[test]
    fn scenario_e6_trailer_index_round_trips() {
        let sizes = vec![(120, 3), (200, 5), (160, 2)];
        let bytes = RecordBuilder::build_trailer(99, &sizes, ByteOrder::BigEndian).unwrap();
        let header = RecordHeader::decode(&bytes, ByteOrder::BigEndian).unwrap();
        assert!(header.is_trailer());
        assert!(header.bit_info.trailer_with_index);

        let payload = &bytes[56..];
        let words = get_u32_array(payload, 0, 6, ByteOrder::BigEndian).unwrap();
        assert_eq!(words, vec![120, 3, 200, 5, 160, 2]);
    }

    #[test]
    fn bad_magic_is_format_error() {
        let mut bytes = vec![0u8; 56];
        put_u32(&mut bytes, 28, 0xdead_beef, ByteOrder::BigEndian).unwrap();
        assert!(matches!(
            RecordHeader::decode(&bytes, ByteOrder::BigEndian),
            Err(EvioError::Format(_))
        ));
    }
}
