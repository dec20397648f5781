//! Packed string arrays (spec.md section 3, testable property 7, scenario E3).
//!
//! A packed string array is a concatenation of NUL-terminated strings padded
//! with `0x04` bytes so the whole blob ends on a 4-byte boundary AND contains
//! at least one trailing `0x04`. A single NUL-terminated string with no
//! trailing `0x04` is accepted as a legacy form.

use super::order::pad;
use crate::error::{EvioError, Result};

/// Packs `strings` into the EVIO wire format: each string NUL-terminated,
/// the whole blob padded with `0x04` bytes to a 4-byte boundary, with at
/// least one trailing `0x04` always present (even if the raw length is
/// already a multiple of 4 — an extra 4-byte `0x04` pad is appended in that
/// case, matching the "ends in at least one 0x04" rule).
pub fn pack_strings(strings: &[impl AsRef<str>]) -> Vec<u8> {
    let mut raw = Vec::new();
    for s in strings {
        raw.extend_from_slice(s.as_ref().as_bytes());
        raw.push(0u8);
    }
    let pad_len = {
        let p = pad(raw.len());
        if p == 0 {
            4
        } else {
            p
        }
    };
    raw.extend(std::iter::repeat(0x04u8).take(pad_len));
    raw
}

/// Parses a packed string array back into its component strings.
///
/// Stops at the first `0x04` byte. A single NUL-terminated string with no
/// trailing `0x04` at all is accepted as the legacy single-string form.
pub fn unpack_strings(data: &[u8]) -> Result<Vec<String>> {
    let end = data.iter().position(|&b| b == 0x04).unwrap_or(data.len());
    let body = &data[..end];

    if body.is_empty() {
        return Ok(Vec::new());
    }

    let mut strings = Vec::new();
    let mut start = 0;
    for (i, &b) in body.iter().enumerate() {
        if b == 0 {
            let s = std::str::from_utf8(&body[start..i])
                .map_err(|e| EvioError::Format(format!("non-UTF-8 packed string: {e}")))?;
            strings.push(s.to_string());
            start = i + 1;
        }
    }

    // Legacy single-string form: no NUL terminator found at all (and, since
    // we stopped at the first 0x04 above, no trailing 0x04 either).
    if start == 0 && !body.is_empty() {
        let s = std::str::from_utf8(body)
            .map_err(|e| EvioError::Format(format!("non-UTF-8 packed string: {e}")))?;
        return Ok(vec![s.to_string()]);
    }

    Ok(strings)
}
