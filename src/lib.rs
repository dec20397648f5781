//! EVIO: self-describing hierarchical binary event format for nuclear-physics
//! DAQ data (banks, segments, tag-segments; composite data; compressed
//! records; multi-record files).
//!
//! Submodules map onto the format's layers:
//! - [`primitive`] — endian-aware scalar/array/string codec.
//! - [`datatype`], [`bitinfo`] — the `DataType` code space and record/file
//!   bit-info words.
//! - [`header`] — Bank/Segment/TagSegment container headers.
//! - [`composite`] — format-string bytecode and `N(...)` composite data.
//! - [`tree`] — in-memory structural tree over a decoded event.
//! - [`compact`] — zero-copy scan/splice over an event's raw bytes.
//! - [`record`] — compressed record header/builder/reader.
//! - [`file`] — multi-record file header, writer, and reader.
//! - [`pipeline`] — multithreaded write pipeline (feature `multithread`).
//! - [`reader`] — sequential and compact-mode convenience readers.
//! - [`block`], [`hc`] — the LZ4 block codec backing `CompressionType::Lz4Fast`/`Lz4Best`.
//! - [`compression`] — per-record compression dispatch (none/LZ4/gzip).
//! - [`config`] — format constants and pipeline defaults.
//! - [`error`] — the crate's error taxonomy.
//! - [`util`] — small host-environment helpers (core count, sleeps).

pub mod bitinfo;
pub mod block;
pub mod compact;
pub mod composite;
pub mod compression;
pub mod config;
pub mod datatype;
pub mod error;
pub mod file;
pub mod hc;
pub mod header;
#[cfg(feature = "multithread")]
pub mod pipeline;
pub mod primitive;
pub mod reader;
pub mod record;
pub mod tree;
pub mod util;

// ─────────────────────────────────────────────────────────────────────────────
// Top-level convenience re-exports for the most common API entry points.
// ─────────────────────────────────────────────────────────────────────────────

pub use bitinfo::{BitInfo, HeaderType};
pub use compact::{CompactBuffer, CompactNode, NodeHandle};
pub use composite::{Composite, CompositeFormat, CompositeValue};
pub use compression::{compress, decompress, CompressionType};
pub use datatype::DataType;
pub use error::{EvioError, Result};
pub use file::{FileHeader, FileReader, FileWriter, WriterConfig};
pub use header::{BankHeader, Header, SegmentHeader, TagSegmentHeader};
#[cfg(feature = "multithread")]
pub use pipeline::{Pipeline, PipelineConfig};
pub use primitive::ByteOrder;
pub use reader::{CompactReader, SequentialReader};
pub use record::{RecordBuilder, RecordHeader, RecordReader};
pub use tree::{Node, NodeId, StructureHeader, Tree, TypedView};

/// Magic word that marks the start of every EVIO/HIPO file header, used to
/// detect a reader-vs-file byte-order mismatch (spec.md section 3).
pub use config::EVIO_MAGIC;
