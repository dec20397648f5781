//! Error taxonomy for the EVIO codec.
//!
//! One flat enum covers every collaborator (primitive codec, header decoders,
//! record/file codecs, compact-node mutation, the MT write pipeline). This
//! mirrors the teacher's `Lz4FError` (`frame/types.rs`): a manual enum with a
//! hand-written `Display` + `std::error::Error` impl rather than a derive
//! macro, since the crate does not otherwise depend on `thiserror`.

use core::fmt;

/// Errors surfaced by the EVIO codec, per the taxonomy in spec section 7.
#[derive(Debug)]
pub enum EvioError {
    /// A header field or structural invariant is violated: bad magic word,
    /// wrong header-word count, a length relation that doesn't hold, a type
    /// code out of range, or a 16-bit tag that overflows a 12-bit tag-segment
    /// field at encode time.
    Format(String),
    /// A decode was requested that runs past the bytes actually available.
    /// Distinct from `Bounds`: this means "the input is short", not "the
    /// caller passed a bad offset".
    Truncated(String),
    /// A requested offset or length lies outside the buffer's extent.
    /// Distinct from `Truncated`: this is a caller/programmer error against
    /// an otherwise complete buffer (see SPEC_FULL.md section 7).
    Bounds(String),
    /// A known but unimplemented compression type or file/record version.
    Unsupported(String),
    /// A handle refers to a node that has been removed or to a reader/writer
    /// that has been closed.
    Obsolete(String),
    /// Underlying I/O failure.
    Io(std::io::Error),
}

impl fmt::Display for EvioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvioError::Format(msg) => write!(f, "format error: {msg}"),
            EvioError::Truncated(msg) => write!(f, "truncated data: {msg}"),
            EvioError::Bounds(msg) => write!(f, "out of bounds: {msg}"),
            EvioError::Unsupported(msg) => write!(f, "unsupported: {msg}"),
            EvioError::Obsolete(msg) => write!(f, "obsolete handle: {msg}"),
            EvioError::Io(err) => write!(f, "I/O error: {err}"),
        }
    }
}

impl std::error::Error for EvioError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EvioError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for EvioError {
    fn from(err: std::io::Error) -> Self {
        EvioError::Io(err)
    }
}

/// Convenience result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, EvioError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_are_tagged() {
        assert!(EvioError::Format("bad magic".into()).to_string().starts_with("format error"));
        assert!(EvioError::Truncated("short read".into()).to_string().starts_with("truncated"));
        assert!(EvioError::Bounds("offset".into()).to_string().starts_with("out of bounds"));
        assert!(EvioError::Unsupported("v99".into()).to_string().starts_with("unsupported"));
        assert!(EvioError::Obsolete("node".into()).to_string().starts_with("obsolete"));
    }

    #[test]
    fn io_error_round_trips_source() {
        let io_err = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        let err: EvioError = io_err.into();
        use std::error::Error;
        assert!(err.source().is_some());
    }
}
