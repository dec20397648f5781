//! File/buffer layout (component C7): the file header, record stream, and
//! version-dispatching reader/writer (spec.md section 4.7, 6).
//!
//! Grounded on `original_source/installation/Linux-x86_64/include/FileHeader.h`
//! (word layout) and `BlockHeaderV4.h` (legacy 8-word block header, versions
//! 1-4). Writing only ever emits the current (v6) layout; reading dispatches
//! on the version nibble recovered from the bit-info word, per spec.md
//! section 4.7.

use crate::bitinfo::{BitInfo, HeaderType};
use crate::compression::CompressionType;
use crate::config::{EVIO_FILE_ID, FILE_HEADER_WORDS, HIPO_FILE_ID};
use crate::error::{EvioError, Result};
use crate::primitive::order::{get_u32, get_u64, put_u32, put_u64};
use crate::primitive::ByteOrder;
use crate::record::{RecordBuilder, RecordHeader, RecordReader};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// The 14-word file header (spec.md section 6).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FileHeader {
    pub unique_id: u32,
    pub file_number: u32,
    pub header_words: u32,
    pub record_count: u32,
    pub index_bytes: u32,
    pub bit_info: BitInfo,
    pub user_header_bytes: u32,
    pub user_register: u64,
    pub trailer_position: u64,
    pub user_int1: u32,
    pub user_int2: u32,
}

impl FileHeader {
    pub fn encode(&self, dst: &mut [u8], order: ByteOrder) -> Result<()> {
        if dst.len() < FILE_HEADER_WORDS as usize * 4 {
            return Err(EvioError::Bounds("file header buffer too small".into()));
        }
        put_u32(dst, 0, self.unique_id, order)?;
        put_u32(dst, 4, self.file_number, order)?;
        put_u32(dst, 8, self.header_words, order)?;
        put_u32(dst, 12, self.record_count, order)?;
        put_u32(dst, 16, self.index_bytes, order)?;
        put_u32(dst, 20, self.bit_info.encode()?, order)?;
        put_u32(dst, 24, self.user_header_bytes, order)?;
        put_u32(dst, 28, self.unique_id_magic(), order)?;
        put_u64(dst, 32, self.user_register, order)?;
        put_u64(dst, 40, self.trailer_position, order)?;
        put_u32(dst, 48, self.user_int1, order)?;
        put_u32(dst, 52, self.user_int2, order)?;
        Ok(())
    }

    /// Word 8 is the byte-order magic, not the file id (that's word 1) — see
    /// `FileHeader.h`'s `MAGIC_OFFSET`, distinct from `FILE_ID_OFFSET`.
    fn unique_id_magic(&self) -> u32 {
        crate::config::EVIO_MAGIC
    }

    pub fn decode(src: &[u8], order: ByteOrder) -> Result<Self> {
        if src.len() < FILE_HEADER_WORDS as usize * 4 {
            return Err(EvioError::Truncated("file header shorter than 14 words".into()));
        }
        let magic = get_u32(src, 28, order)?;
        if magic != crate::config::EVIO_MAGIC {
            return Err(EvioError::Format(format!(
                "file header magic word {magic:#x} does not match {:#x}",
                crate::config::EVIO_MAGIC
            )));
        }
        Ok(FileHeader {
            unique_id: get_u32(src, 0, order)?,
            file_number: get_u32(src, 4, order)?,
            header_words: get_u32(src, 8, order)?,
            record_count: get_u32(src, 12, order)?,
            index_bytes: get_u32(src, 16, order)?,
            bit_info: BitInfo::decode(get_u32(src, 20, order)?),
            user_header_bytes: get_u32(src, 24, order)?,
            user_register: get_u64(src, 32, order)?,
            trailer_position: get_u64(src, 40, order)?,
            user_int1: get_u32(src, 48, order)?,
            user_int2: get_u32(src, 52, order)?,
        })
    }

    pub fn is_hipo(&self) -> bool {
        self.unique_id == HIPO_FILE_ID
    }
}

/// Legacy (version 1-4) 8-word block header. Read-only: this crate never
/// writes the legacy layout. Grounded on `BlockHeaderV4.h`.
#[derive(Debug, Clone, Copy)]
pub struct LegacyBlockHeader {
    pub block_length_words: u32,
    pub block_number: u32,
    pub header_length_words: u32,
    pub event_count: u32,
    pub bit_info: BitInfo,
}

impl LegacyBlockHeader {
    pub const HEADER_WORDS: u32 = 8;

    pub fn decode(src: &[u8], order: ByteOrder) -> Result<Self> {
        if src.len() < Self::HEADER_WORDS as usize * 4 {
            return Err(EvioError::Truncated("legacy block header shorter than 8 words".into()));
        }
        let magic = get_u32(src, 28, order)?;
        if magic != crate::config::EVIO_MAGIC {
            return Err(EvioError::Format(format!(
                "legacy block header magic word {magic:#x} does not match {:#x}",
                crate::config::EVIO_MAGIC
            )));
        }
        Ok(LegacyBlockHeader {
            block_length_words: get_u32(src, 0, order)?,
            block_number: get_u32(src, 4, order)?,
            header_length_words: get_u32(src, 8, order)?,
            event_count: get_u32(src, 12, order)?,
            bit_info: BitInfo::decode(get_u32(src, 20, order)?),
        })
    }
}

/// Expands a file-naming pattern (spec.md section 6): up to three C-style
/// integer conversion specifiers filled, in order, from `(run, stream,
/// split)`, plus `$(NAME)` environment-variable references expanded at open
/// time.
pub fn expand_file_name(pattern: &str, run: i32, stream: i32, split: i32) -> Result<String> {
    let env_expanded = expand_env_refs(pattern)?;
    let values = [run, stream, split];
    let mut out = String::with_capacity(env_expanded.len());
    let mut chars = env_expanded.chars().peekable();
    let mut next_spec = 0usize;
    while let Some(c) = chars.next() {
        if c == '%' {
            let mut spec = String::from("%");
            while let Some(&n) = chars.peek() {
                spec.push(n);
                chars.next();
                if n.is_ascii_alphabetic() {
                    break;
                }
            }
            if spec.ends_with(['d', 'x', 'X', 'o']) {
                if next_spec >= values.len() {
                    return Err(EvioError::Format(
                        "file naming pattern has more than three integer specifiers".into(),
                    ));
                }
                let v = values[next_spec];
                next_spec += 1;
                out.push_str(&format_c_spec(&spec, v));
            } else {
                out.push_str(&spec);
            }
        } else {
            out.push(c);
        }
    }
    Ok(out)
}

fn format_c_spec(spec: &str, value: i32) -> String {
    let conv = spec.chars().last().unwrap_or('d');
    let width_str: String = spec[1..spec.len() - 1].chars().take_while(|c| c.is_ascii_digit() || *c == '0').collect();
    let zero_pad = width_str.starts_with('0');
    let width: usize = width_str.trim_start_matches('0').parse().unwrap_or(0);
    let body = match conv {
        'x' => format!("{value:x}"),
        'X' => format!("{value:X}"),
        'o' => format!("{value:o}"),
        _ => format!("{value}"),
    };
    if width > body.len() {
        let pad = width - body.len();
        if zero_pad {
            format!("{}{}", "0".repeat(pad), body)
        } else {
            format!("{}{}", " ".repeat(pad), body)
        }
    } else {
        body
    }
}

fn expand_env_refs(pattern: &str) -> Result<String> {
    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'(') {
            chars.next();
            let mut name = String::new();
            let mut closed = false;
            for n in chars.by_ref() {
                if n == ')' {
                    closed = true;
                    break;
                }
                name.push(n);
            }
            if !closed {
                return Err(EvioError::Format(format!(
                    "unterminated environment reference in file name pattern: $({name}"
                )));
            }
            let value = std::env::var(&name).map_err(|_| {
                EvioError::Format(format!("environment variable {name} is not set"))
            })?;
            out.push_str(&value);
        } else {
            out.push(c);
        }
    }
    Ok(out)
}

/// Writer-side configuration, replacing the source's global mutable statics
/// (spec.md section 9 REDESIGN FLAG).
#[derive(Clone)]
pub struct WriterConfig {
    pub order: ByteOrder,
    pub compression: CompressionType,
    pub split_bytes: Option<u64>,
    pub run_number: i32,
    pub stream_id: i32,
    pub user_header: Vec<u8>,
    pub trailer_with_index: bool,
}

impl Default for WriterConfig {
    fn default() -> Self {
        WriterConfig {
            order: ByteOrder::native(),
            compression: CompressionType::None,
            split_bytes: None,
            run_number: 0,
            stream_id: 0,
            user_header: Vec::new(),
            trailer_with_index: true,
        }
    }
}

/// Writes a sequence of records to a (possibly split) output file, per
/// spec.md section 4.7.
pub struct FileWriter {
    file: File,
    path: PathBuf,
    base_pattern: String,
    config: WriterConfig,
    bytes_written: u64,
    record_count: u32,
    record_number: u32,
    split_number: i32,
    record_sizes: Vec<(u32, u32)>,
    first_event: Option<Vec<u8>>,
    closed: bool,
}

impl FileWriter {
    /// Opens the first split for writing, staging a file header with
    /// placeholder trailer-position/record-count fields to be patched on
    /// `close()`.
    pub fn create(base_pattern: &str, config: WriterConfig) -> Result<Self> {
        let path = expand_file_name(base_pattern, config.run_number, config.stream_id, 0)?;
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;
        let mut writer = FileWriter {
            file,
            path: PathBuf::from(&path),
            base_pattern: base_pattern.to_string(),
            config,
            bytes_written: 0,
            record_count: 0,
            record_number: 1,
            split_number: 0,
            record_sizes: Vec::new(),
            first_event: None,
            closed: false,
        };
        writer.write_header_placeholder()?;
        log::debug!("opened evio file {} for writing", writer.path.display());
        Ok(writer)
    }

    fn write_header_placeholder(&mut self) -> Result<()> {
        let header = FileHeader {
            unique_id: EVIO_FILE_ID,
            file_number: self.split_number.max(0) as u32,
            header_words: FILE_HEADER_WORDS,
            record_count: 0,
            index_bytes: 0,
            bit_info: BitInfo {
                version: 6,
                header_type: HeaderType::EvioFile,
                has_first_event_or_last_record: self.first_event.is_some(),
                ..Default::default()
            },
            user_header_bytes: self.config.user_header.len() as u32,
            user_register: 0,
            trailer_position: 0,
            user_int1: 0,
            user_int2: 0,
        };
        let mut buf = vec![0u8; FILE_HEADER_WORDS as usize * 4];
        header.encode(&mut buf, self.config.order)?;
        buf.extend_from_slice(&self.config.user_header);
        let pad = crate::primitive::pad(self.config.user_header.len());
        buf.extend(std::iter::repeat(0u8).take(pad));
        self.file.write_all(&buf)?;
        self.bytes_written += buf.len() as u64;
        Ok(())
    }

    /// Sets the "first event" re-emitted at the start of this file and every
    /// subsequent split, per SPEC_FULL.md section 4.7's supplement.
    pub fn set_first_event(&mut self, event: Vec<u8>) {
        self.first_event = Some(event);
    }

    /// Builds and appends one record from `events`, rotating to the next
    /// split first if the record would push the file past the configured
    /// byte threshold.
    pub fn write_events(&mut self, mut events: Vec<Vec<u8>>) -> Result<()> {
        if let Some(first) = &self.first_event {
            if self.record_count == 0 {
                events.insert(0, first.clone());
            }
        }
        let mut builder = RecordBuilder::new(self.record_number, self.config.compression);
        let event_count = events.len() as u32;
        for event in events {
            builder.add_event(event);
        }
        let bytes = builder.build(self.config.order)?;
        self.record_number += 1;
        self.append_record_bytes(bytes, event_count, false)
    }

    /// Appends an already-built, already-compressed record verbatim,
    /// rotating to the next split first if configured (or if `force_split`
    /// is set, rotating *after* this record is written). This is the seam
    /// the MT write pipeline (`pipeline`) uses: its compressor threads build
    /// complete record byte blobs off the calling thread, so the writer side
    /// here only ever does the file-level bookkeeping (split, trailer index,
    /// byte counters), never record encoding.
    pub(crate) fn append_record_bytes(&mut self, bytes: Vec<u8>, event_count: u32, force_split: bool) -> Result<()> {
        if let Some(threshold) = self.config.split_bytes {
            if self.bytes_written + bytes.len() as u64 > threshold && self.record_count > 0 {
                self.split()?;
            }
        }

        self.file.write_all(&bytes)?;
        self.bytes_written += bytes.len() as u64;
        self.record_sizes.push((bytes.len() as u32, event_count));
        self.record_count += 1;
        if force_split {
            self.split()?;
        }
        Ok(())
    }

    fn split(&mut self) -> Result<()> {
        self.finish_current_file()?;
        self.split_number += 1;
        let path =
            expand_file_name(&self.base_pattern, self.config.run_number, self.config.stream_id, self.split_number)?;
        self.file = OpenOptions::new().write(true).create(true).truncate(true).open(&path)?;
        self.path = PathBuf::from(path);
        self.bytes_written = 0;
        self.record_count = 0;
        self.record_sizes.clear();
        self.write_header_placeholder()?;
        log::debug!("split to new evio file {}", self.path.display());
        Ok(())
    }

    fn finish_current_file(&mut self) -> Result<()> {
        let trailer_position = self.bytes_written;
        let sizes: &[(u32, u32)] = if self.config.trailer_with_index { &self.record_sizes } else { &[] };
        let trailer = RecordBuilder::build_trailer(self.record_number, sizes, self.config.order)?;
        self.file.write_all(&trailer)?;
        self.record_number += 1;

        self.file.seek(SeekFrom::Start(0))?;
        let header = FileHeader {
            unique_id: EVIO_FILE_ID,
            file_number: self.split_number.max(0) as u32,
            header_words: FILE_HEADER_WORDS,
            record_count: self.record_count,
            index_bytes: 0,
            bit_info: BitInfo {
                version: 6,
                header_type: HeaderType::EvioFile,
                trailer_with_index: self.config.trailer_with_index,
                has_first_event_or_last_record: self.first_event.is_some(),
                ..Default::default()
            },
            user_header_bytes: self.config.user_header.len() as u32,
            user_register: 0,
            trailer_position,
            user_int1: 0,
            user_int2: 0,
        };
        let mut buf = vec![0u8; FILE_HEADER_WORDS as usize * 4];
        header.encode(&mut buf, self.config.order)?;
        self.file.write_all(&buf)?;
        self.file.flush()?;
        Ok(())
    }

    /// Writes the trailer and patches the file header in place. Idempotent:
    /// calling `close()` twice is a no-op on the second call.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.finish_current_file()?;
        self.closed = true;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Lets an external caller (the MT write pipeline, which assigns its own
    /// monotonic record numbers at publish time) keep this writer's internal
    /// counter in sync, so the trailer it emits on `close()` continues that
    /// sequence instead of restarting from 1.
    pub(crate) fn set_next_record_number(&mut self, n: u32) {
        self.record_number = n;
    }
}

impl Drop for FileWriter {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.close() {
                log::error!("error closing evio file on drop: {e}");
            }
        }
    }
}

/// A record position within an opened file: byte offset of the record
/// header plus the number of events it carries.
#[derive(Debug, Clone, Copy)]
struct RecordPosition {
    offset: u64,
    event_count: u32,
}

/// One decoded legacy (pre-v6) event location: a flat byte range, since
/// versions 1-4 have no record index to seek through.
#[derive(Debug, Clone, Copy)]
struct LegacyEventPosition {
    offset: u64,
    len: u32,
}

enum ReadLayout {
    Modern { records: Vec<RecordPosition> },
    Legacy { events: Vec<LegacyEventPosition> },
}

/// Opens an EVIO file for sequential or random-access reading, dispatching
/// on format version per spec.md section 4.7.
pub struct FileReader {
    file: File,
    order: ByteOrder,
    pub header: Option<FileHeader>,
    layout: ReadLayout,
}

impl FileReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut file = File::open(path)?;
        let mut first = [0u8; 56];
        file.read_exact(&mut first)?;
        let magic_bytes: [u8; 4] = first[28..32].try_into().unwrap();
        let order = ByteOrder::detect(&magic_bytes)?;
        let bit_info = BitInfo::decode(get_u32(&first, 20, order)?);

        if bit_info.version >= 6 {
            let header = FileHeader::decode(&first, order)?;
            let user_header_len = header.user_header_bytes as usize;
            let data_start =
                FILE_HEADER_WORDS as u64 * 4 + user_header_len as u64 + crate::primitive::pad(user_header_len) as u64;

            let records = if header.trailer_position != 0 {
                Self::scan_from_trailer(&mut file, order, header.trailer_position, data_start)?
            } else {
                Self::scan_records(&mut file, order, data_start)?
            };

            Ok(FileReader {
                file,
                order,
                header: Some(header),
                layout: ReadLayout::Modern { records },
            })
        } else {
            let events = Self::scan_legacy(&mut file, order, &first, bit_info)?;
            Ok(FileReader {
                file,
                order,
                header: None,
                layout: ReadLayout::Legacy { events },
            })
        }
    }

    /// Follows the trailer-position offset to read the index directly,
    /// rather than scanning every record (spec.md section 4.7's v6 fast
    /// path). The index gives record byte-lengths, from which each record's
    /// absolute offset is reconstructed by prefix sum.
    fn scan_from_trailer(
        file: &mut File,
        order: ByteOrder,
        trailer_position: u64,
        data_start: u64,
    ) -> Result<Vec<RecordPosition>> {
        file.seek(SeekFrom::Start(trailer_position))?;
        let mut header_buf = [0u8; 56];
        file.read_exact(&mut header_buf)?;
        let trailer_header = RecordHeader::decode(&header_buf, order)?;
        let total_trailer_bytes = trailer_header.length_words as usize * 4;
        let mut rest = vec![0u8; total_trailer_bytes - 56];
        file.read_exact(&mut rest)?;
        let mut full = header_buf.to_vec();
        full.extend_from_slice(&rest);

        if !trailer_header.bit_info.trailer_with_index {
            return Self::scan_records(file, order, data_start);
        }
        // The trailer carries no events; its decompressed body is the index
        // array itself, so `RecordReader::event()` isn't applicable here —
        // the body is read directly via a zero-event-index parse.
        let index_bytes = trailer_header.index_bytes as usize;
        let index_words = index_bytes / 4;
        let payload_start = trailer_header.header_words as usize * 4;
        let payload = match trailer_header.compression_type {
            CompressionType::None => full[payload_start..payload_start + index_bytes].to_vec(),
            other => crate::compression::decompress(
                other,
                &full[payload_start..],
                trailer_header.uncompressed_data_bytes as usize,
            )?,
        };
        let pairs = crate::primitive::array::get_u32_array(&payload, 0, index_words, order)?;

        let mut records = Vec::with_capacity(pairs.len() / 2);
        let mut offset = data_start;
        for pair in pairs.chunks_exact(2) {
            let (len, event_count) = (pair[0], pair[1]);
            records.push(RecordPosition { offset, event_count });
            offset += len as u64;
        }
        Ok(records)
    }

    fn scan_records(file: &mut File, order: ByteOrder, data_start: u64) -> Result<Vec<RecordPosition>> {
        let mut records = Vec::new();
        let mut offset = data_start;
        loop {
            file.seek(SeekFrom::Start(offset))?;
            let mut header_buf = [0u8; 56];
            if file.read_exact(&mut header_buf).is_err() {
                break;
            }
            let header = match RecordHeader::decode(&header_buf, order) {
                Ok(h) => h,
                Err(_) => break,
            };
            if header.is_trailer() {
                break;
            }
            records.push(RecordPosition {
                offset,
                event_count: header.event_count,
            });
            offset += header.length_words as u64 * 4;
        }
        Ok(records)
    }

    /// Scans a legacy (version 1-4) file as a sequence of 8-word block
    /// headers, each followed by a tight run of whole bank events (spec.md
    /// section 4.7's "reader synthesizes a record position table by
    /// scanning").
    fn scan_legacy(
        file: &mut File,
        order: ByteOrder,
        first_block: &[u8],
        _bit_info: BitInfo,
    ) -> Result<Vec<LegacyEventPosition>> {
        let mut events = Vec::new();
        let mut block = LegacyBlockHeader::decode(first_block, order)?;
        let mut block_offset: u64 = 0;

        loop {
            let header_bytes = LegacyBlockHeader::HEADER_WORDS as u64 * 4;
            let data_bytes = (block.block_length_words as u64 - block.header_length_words as u64) * 4;
            let mut pos = block_offset + header_bytes;
            let data_end = pos + data_bytes;

            while pos < data_end {
                file.seek(SeekFrom::Start(pos))?;
                let mut len_buf = [0u8; 4];
                if file.read_exact(&mut len_buf).is_err() {
                    break;
                }
                let length_words = get_u32(&len_buf, 0, order)?;
                let event_bytes = (length_words as u64 + 1) * 4;
                events.push(LegacyEventPosition {
                    offset: pos,
                    len: event_bytes as u32,
                });
                pos += event_bytes;
            }

            let next_block_offset = block_offset + block.block_length_words as u64 * 4;
            file.seek(SeekFrom::Start(next_block_offset))?;
            let mut next_header = vec![0u8; LegacyBlockHeader::HEADER_WORDS as usize * 4];
            if file.read_exact(&mut next_header).is_err() {
                break;
            }
            block = match LegacyBlockHeader::decode(&next_header, order) {
                Ok(b) => b,
                Err(_) => break,
            };
            block_offset = next_block_offset;
        }
        Ok(events)
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.order
    }

    pub fn event_count(&self) -> usize {
        match &self.layout {
            ReadLayout::Modern { records } => records.iter().map(|r| r.event_count as usize).sum(),
            ReadLayout::Legacy { events } => events.len(),
        }
    }

    pub fn record_count(&self) -> usize {
        match &self.layout {
            ReadLayout::Modern { records } => records.len(),
            ReadLayout::Legacy { .. } => 0,
        }
    }

    /// Reads event `i` (0-based across the whole file) into an owned buffer.
    pub fn get_event(&mut self, i: usize) -> Result<Vec<u8>> {
        match &self.layout {
            ReadLayout::Legacy { events } => {
                let pos = events
                    .get(i)
                    .ok_or_else(|| EvioError::Bounds(format!("no event at index {i}")))?;
                self.file.seek(SeekFrom::Start(pos.offset))?;
                let mut buf = vec![0u8; pos.len as usize];
                self.file.read_exact(&mut buf)?;
                Ok(buf)
            }
            ReadLayout::Modern { records } => {
                let mut remaining = i;
                for rec in records {
                    if remaining < rec.event_count as usize {
                        self.file.seek(SeekFrom::Start(rec.offset))?;
                        let mut header_buf = [0u8; 56];
                        self.file.read_exact(&mut header_buf)?;
                        let header = RecordHeader::decode(&header_buf, self.order)?;
                        let total = header.length_words as usize * 4;
                        let mut rest = vec![0u8; total - 56];
                        self.file.read_exact(&mut rest)?;
                        let mut full = header_buf.to_vec();
                        full.extend_from_slice(&rest);
                        let reader = RecordReader::parse(&full, self.order)?;
                        return Ok(reader.event(remaining)?.to_vec());
                    }
                    remaining -= rec.event_count as usize;
                }
                Err(EvioError::Bounds(format!("no event at index {i}")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_pattern_fills_run_stream_split() {
        let name = expand_file_name("run%03d.stream%d.split%d.ev", 7, 2, 5).unwrap();
        assert_eq!(name, "run007.stream2.split5.ev");
    }

    #[test]
    fn file_name_pattern_expands_env_var() {
        std::env::set_var("EVIO_TEST_DIR", "/tmp/evio-out");
        let name = expand_file_name("$(EVIO_TEST_DIR)/run%d.ev", 3, 0, 0).unwrap();
        assert_eq!(name, "/tmp/evio-out/run3.ev");
    }

    #[test]
    fn write_then_read_round_trips_events() {
        let dir = tempfile::tempdir().unwrap();
        let pattern = dir.path().join("test%d.ev").to_string_lossy().to_string();
        let mut writer = FileWriter::create(&pattern, WriterConfig::default()).unwrap();
        writer.write_events(vec![vec![1u8; 8], vec![2u8; 16]]).unwrap();
        writer.write_events(vec![vec![3u8; 24]]).unwrap();
        let path = writer.path().to_path_buf();
        writer.close().unwrap();

        let mut reader = FileReader::open(&path).unwrap();
        assert_eq!(reader.event_count(), 3);
        assert_eq!(reader.get_event(0).unwrap(), vec![1u8; 8]);
        assert_eq!(reader.get_event(1).unwrap(), vec![2u8; 16]);
        assert_eq!(reader.get_event(2).unwrap(), vec![3u8; 24]);
    }

    /// Scenario E6 from spec.md section 8: trailer records record sizes and
    /// the file header's trailer position points at the trailer's first byte.
    #[test]
    fn scenario_e6_trailer_position_points_at_trailer() {
        let dir = tempfile::tempdir().unwrap();
        let pattern = dir.path().join("trailer_test.ev").to_string_lossy().to_string();
        let mut writer = FileWriter::create(&pattern, WriterConfig::default()).unwrap();
        writer.write_events(vec![vec![0u8; 10]]).unwrap();
        let expected_trailer_pos = writer.bytes_written();
        let path = writer.path().to_path_buf();
        writer.close().unwrap();

        let mut file = File::open(&path).unwrap();
        let mut buf = [0u8; 56];
        file.read_exact(&mut buf).unwrap();
        let order = ByteOrder::detect(&buf[28..32].try_into().unwrap()).unwrap();
        let header = FileHeader::decode(&buf, order).unwrap();
        assert_eq!(header.trailer_position, expected_trailer_pos);
    }

    #[test]
    fn split_rotates_to_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let pattern = dir.path().join("split%d.ev").to_string_lossy().to_string();
        let mut config = WriterConfig::default();
        config.split_bytes = Some(80);
        let mut writer = FileWriter::create(&pattern, config).unwrap();
        writer.write_events(vec![vec![9u8; 40]]).unwrap();
        writer.write_events(vec![vec![9u8; 40]]).unwrap();
        writer.close().unwrap();

        let split0 = dir.path().join("split0.ev");
        let split1 = dir.path().join("split1.ev");
        assert!(split0.exists());
        assert!(split1.exists());
    }
}
