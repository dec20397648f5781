//! The EVIO 6-bit data type code (spec.md section 3), shared by container
//! headers (C2), composite-data leaf tokens (C3), and the event tree's typed
//! views (C4).
//!
//! Values match the closed enumeration used by the original EVIO 6.0 C++
//! library (`DataType.h`): a dense run `0x0..=0x10` for the primitive and
//! container codes, then `BANK=0x10`, a deliberate gap, `SEGMENT=0x20`, and
//! four composite-only pseudo-types `0x21..=0x24` that are never transported
//! independently (`HOLLERIT`/`N`/`n`/`m`) — used only inside composite format
//! programs (C3) to mark inline repetition-count reads.

use crate::error::{EvioError, Result};

/// The 6-bit EVIO data type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Unknown32,
    Uint32,
    Float32,
    CharStar8,
    Short16,
    Ushort16,
    Char8,
    Uchar8,
    Double64,
    Long64,
    Ulong64,
    Int32,
    TagSegment,
    AlsoSegment,
    AlsoBank,
    Composite,
    Bank,
    Segment,
    /// Composite-only: a Hollerith (4-char packed) value.
    Hollerit,
    /// Composite-only: inline 32-bit repetition count ('N').
    NValue,
    /// Composite-only: inline 16-bit repetition count ('n').
    SmallNValue,
    /// Composite-only: inline 8-bit repetition count ('m').
    MValue,
}

impl DataType {
    /// The raw 6-bit code, per the original library's numbering.
    pub const fn code(self) -> u8 {
        match self {
            DataType::Unknown32 => 0x0,
            DataType::Uint32 => 0x1,
            DataType::Float32 => 0x2,
            DataType::CharStar8 => 0x3,
            DataType::Short16 => 0x4,
            DataType::Ushort16 => 0x5,
            DataType::Char8 => 0x6,
            DataType::Uchar8 => 0x7,
            DataType::Double64 => 0x8,
            DataType::Long64 => 0x9,
            DataType::Ulong64 => 0xa,
            DataType::Int32 => 0xb,
            DataType::TagSegment => 0xc,
            DataType::AlsoSegment => 0xd,
            DataType::AlsoBank => 0xe,
            DataType::Composite => 0xf,
            DataType::Bank => 0x10,
            DataType::Segment => 0x20,
            DataType::Hollerit => 0x21,
            DataType::NValue => 0x22,
            DataType::SmallNValue => 0x23,
            DataType::MValue => 0x24,
        }
    }

    /// Decodes a raw 6-bit code. Codes in `0x11..=0x1f` (between `BANK` and
    /// `SEGMENT`) and codes above `0x24` are not assigned and decode to
    /// `Unknown32`, matching `DataType::getDataType`'s gap handling.
    pub fn from_code(code: u8) -> DataType {
        match code {
            0x0 => DataType::Unknown32,
            0x1 => DataType::Uint32,
            0x2 => DataType::Float32,
            0x3 => DataType::CharStar8,
            0x4 => DataType::Short16,
            0x5 => DataType::Ushort16,
            0x6 => DataType::Char8,
            0x7 => DataType::Uchar8,
            0x8 => DataType::Double64,
            0x9 => DataType::Long64,
            0xa => DataType::Ulong64,
            0xb => DataType::Int32,
            0xc => DataType::TagSegment,
            0xd => DataType::AlsoSegment,
            0xe => DataType::AlsoBank,
            0xf => DataType::Composite,
            0x10 => DataType::Bank,
            0x20 => DataType::Segment,
            0x21 => DataType::Hollerit,
            0x22 => DataType::NValue,
            0x23 => DataType::SmallNValue,
            0x24 => DataType::MValue,
            _ => DataType::Unknown32,
        }
    }

    /// Decodes a raw code, rejecting anything outside the 6-bit range.
    pub fn try_from_code(code: u8) -> Result<DataType> {
        if code > 0x3f {
            return Err(EvioError::Format(format!(
                "data type code {code:#x} does not fit in 6 bits"
            )));
        }
        Ok(DataType::from_code(code))
    }

    /// `true` for the five container flavors: BANK, ALSOBANK, SEGMENT,
    /// ALSOSEGMENT, TAGSEGMENT.
    pub const fn is_container(self) -> bool {
        matches!(
            self,
            DataType::Bank
                | DataType::AlsoBank
                | DataType::Segment
                | DataType::AlsoSegment
                | DataType::TagSegment
        )
    }

    /// `true` for BANK or its legacy alias ALSOBANK.
    pub const fn is_bank(self) -> bool {
        matches!(self, DataType::Bank | DataType::AlsoBank)
    }

    /// `true` for SEGMENT or its legacy alias ALSOSEGMENT.
    pub const fn is_segment(self) -> bool {
        matches!(self, DataType::Segment | DataType::AlsoSegment)
    }

    /// `true` for byte/short leaf types, which carry the padding-in-type-byte
    /// convention (spec.md section 3, invariant 3).
    pub const fn is_padded_leaf(self) -> bool {
        matches!(
            self,
            DataType::Char8 | DataType::Uchar8 | DataType::Short16 | DataType::Ushort16
        )
    }

    /// Fixed element width in bytes, or `None` for variable-width/container
    /// types (strings, composite, containers).
    pub const fn fixed_width(self) -> Option<usize> {
        match self {
            DataType::Char8 | DataType::Uchar8 => Some(1),
            DataType::Short16 | DataType::Ushort16 => Some(2),
            DataType::Uint32 | DataType::Float32 | DataType::Int32 => Some(4),
            DataType::Double64 | DataType::Long64 | DataType::Ulong64 => Some(8),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_round_trips() {
        let all = [
            DataType::Unknown32,
            DataType::Uint32,
            DataType::Float32,
            DataType::CharStar8,
            DataType::Short16,
            DataType::Ushort16,
            DataType::Char8,
            DataType::Uchar8,
            DataType::Double64,
            DataType::Long64,
            DataType::Ulong64,
            DataType::Int32,
            DataType::TagSegment,
            DataType::AlsoSegment,
            DataType::AlsoBank,
            DataType::Composite,
            DataType::Bank,
            DataType::Segment,
        ];
        for dt in all {
            assert_eq!(DataType::from_code(dt.code()), dt);
        }
    }

    #[test]
    fn gap_codes_decode_unknown() {
        for code in 0x11u8..0x20 {
            assert_eq!(DataType::from_code(code), DataType::Unknown32);
        }
        assert_eq!(DataType::from_code(0x30), DataType::Unknown32);
    }

    #[test]
    fn container_classification() {
        assert!(DataType::Bank.is_container());
        assert!(DataType::AlsoBank.is_container());
        assert!(DataType::Segment.is_container());
        assert!(DataType::AlsoSegment.is_container());
        assert!(DataType::TagSegment.is_container());
        assert!(!DataType::Int32.is_container());
    }

    #[test]
    fn padded_leaf_classification() {
        assert!(DataType::Char8.is_padded_leaf());
        assert!(DataType::Uchar8.is_padded_leaf());
        assert!(DataType::Short16.is_padded_leaf());
        assert!(DataType::Ushort16.is_padded_leaf());
        assert!(!DataType::Int32.is_padded_leaf());
        assert!(!DataType::Bank.is_padded_leaf());
    }
}
