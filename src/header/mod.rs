//! Container headers (component C2): Bank, Segment, and TagSegment.
//!
//! Each variant encodes/decodes a fixed-width header word group and exposes
//! the padding count packed into the top bits of its type byte (spec.md
//! section 3, invariant 3). `data_type` is stored as the *raw* 6-bit (or
//! 4-bit, for tagsegment) code exactly as read, so that ALSOBANK/ALSOSEGMENT
//! round-trip byte-for-byte through decode/encode even though callers doing
//! structural recursion treat them as BANK/SEGMENT via
//! [`crate::datatype::DataType::is_bank`]/[`crate::datatype::DataType::is_segment`].

mod bank;
mod segment;
mod tagsegment;

pub use bank::BankHeader;
pub use segment::SegmentHeader;
pub use tagsegment::TagSegmentHeader;

use crate::primitive::ByteOrder;

/// Common shape shared by the three header variants.
pub trait Header: Sized {
    /// Header length in 32-bit words (2 for Bank, 1 for Segment/TagSegment).
    const HEADER_WORDS: usize;

    /// Encodes this header at `dst[0..]`, returning the number of bytes written.
    fn encode(&self, dst: &mut [u8], order: ByteOrder) -> crate::error::Result<usize>;

    /// Decodes a header from `src[0..]`, returning the header and the byte
    /// offset immediately following it.
    fn decode(src: &[u8], order: ByteOrder) -> crate::error::Result<(Self, usize)>;
}
