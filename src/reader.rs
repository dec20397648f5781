//! Reader facades (component C9): a sequential reader that materializes each
//! event into a [`Tree`] with SAX-like listener dispatch, and a compact
//! reader that navigates a whole file's events in place without ever
//! building one (spec.md section 4.9).

use crate::compact::{CompactBuffer, NodeHandle};
use crate::error::{EvioError, Result};
use crate::file::{FileReader, FileWriter, WriterConfig};
use crate::tree::{NodeId, Tree};
use std::path::Path;
use std::sync::Mutex;

/// SAX-like callback for [`SequentialReader::parse_event`], mirroring
/// `IEvioListener` (`gotStructure`/`startEventParse`/`endEventParse`):
/// implementors are notified as a freshly parsed event's tree is walked.
pub trait EvioListener {
    /// Called once before any structure of a newly parsed event is visited.
    fn start_event_parse(&mut self, tree: &Tree, event: NodeId);
    /// Called for every structure the optional filter accepts (every
    /// structure, if no filter is installed), the first call being the
    /// event's own root.
    fn got_structure(&mut self, tree: &Tree, event: NodeId, structure: NodeId);
    /// Called once after the whole event has been visited.
    fn end_event_parse(&mut self, tree: &Tree, event: NodeId);
}

struct SequentialInner {
    file: FileReader,
    cursor: usize,
    listeners: Vec<Box<dyn EvioListener + Send>>,
}

/// Sequential, forward-biased reader over an EVIO file (spec.md section 4.9).
///
/// Every public method locks an internal mutex before touching the cursor or
/// the underlying [`FileReader`]; with `synced` left `false` (the default)
/// that lock is never contended and costs nothing but a few atomics. Set it
/// with [`SequentialReader::open_synced`] when the reader itself is shared
/// behind an `Arc` across threads — "thread-safety is opt-in via a
/// per-instance mutex" (spec.md section 4.9).
pub struct SequentialReader {
    inner: Mutex<SequentialInner>,
    synced: bool,
}

impl SequentialReader {
    /// Opens `path` for sequential reading, cursor at event 0.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_sync(path, false)
    }

    /// Like [`open`](Self::open), but documents that this instance will be
    /// shared across threads (see the struct-level note on `synced`).
    pub fn open_synced(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_sync(path, true)
    }

    fn open_with_sync(path: impl AsRef<Path>, synced: bool) -> Result<Self> {
        let file = FileReader::open(path)?;
        Ok(SequentialReader {
            inner: Mutex::new(SequentialInner {
                file,
                cursor: 0,
                listeners: Vec::new(),
            }),
            synced,
        })
    }

    pub fn is_synced(&self) -> bool {
        self.synced
    }

    pub fn event_count(&self) -> usize {
        self.inner.lock().unwrap().file.event_count()
    }

    /// Registers a listener that [`parse_event`](Self::parse_event) notifies
    /// on every subsequent call. Listeners accumulate; there is no removal
    /// API, matching the fire-and-forget registration the teacher's corpus
    /// uses for SAX-style dispatch.
    pub fn add_listener(&self, listener: impl EvioListener + Send + 'static) {
        self.inner.lock().unwrap().listeners.push(Box::new(listener));
    }

    /// Resets the cursor to the first event.
    pub fn rewind(&self) {
        self.inner.lock().unwrap().cursor = 0;
    }

    /// Moves the cursor to event `i` without reading it.
    pub fn goto_event(&self, i: usize) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if i >= inner.file.event_count() {
            return Err(EvioError::Bounds(format!("no event at index {i}")));
        }
        inner.cursor = i;
        Ok(())
    }

    /// Returns the raw bytes of the event at the cursor and advances it.
    pub fn next_event(&self) -> Result<Vec<u8>> {
        let mut inner = self.inner.lock().unwrap();
        let i = inner.cursor;
        let bytes = inner.file.get_event(i)?;
        inner.cursor = i + 1;
        Ok(bytes)
    }

    /// Returns the raw bytes of event `i`, independent of the cursor.
    pub fn get_event_array(&self, i: usize) -> Result<Vec<u8>> {
        self.inner.lock().unwrap().file.get_event(i)
    }

    /// Parses event `i` into a [`Tree`], moves the cursor past it, and
    /// dispatches every registered listener across the tree in document
    /// order (`start_event_parse`, then `got_structure` per node, then
    /// `end_event_parse`) — "`parse_event` is `next_event` + tree
    /// materialization + listener dispatch" (spec.md section 4.9).
    pub fn parse_event(&self, i: usize) -> Result<Tree> {
        let (bytes, order) = {
            let mut inner = self.inner.lock().unwrap();
            let bytes = inner.file.get_event(i)?;
            inner.cursor = i + 1;
            (bytes, inner.file.byte_order())
        };
        let tree = Tree::parse_event(&bytes, order)?;
        let mut inner = self.inner.lock().unwrap();
        if !inner.listeners.is_empty() {
            let root = tree.root();
            for listener in inner.listeners.iter_mut() {
                listener.start_event_parse(&tree, root);
            }
            tree.visit_all(
                root,
                None,
                |_, _| {},
                |id, _| {
                    for listener in inner.listeners.iter_mut() {
                        listener.got_structure(&tree, root, id);
                    }
                },
                |_, _| {},
            );
            for listener in inner.listeners.iter_mut() {
                listener.end_event_parse(&tree, root);
            }
        }
        Ok(tree)
    }

    /// Returns the raw bytes of the dictionary event (the first event of the
    /// first record) when the file/record bit-info marks one present
    /// (SPEC_FULL.md section 3 supplement), or `None` otherwise. XML parsing
    /// of the returned bytes is left to the caller.
    pub fn dictionary_event(&self) -> Result<Option<Vec<u8>>> {
        let mut inner = self.inner.lock().unwrap();
        let has_dict = inner.file.header.as_ref().map(|h| h.bit_info.has_dictionary).unwrap_or(false);
        if !has_dict || inner.file.event_count() == 0 {
            return Ok(None);
        }
        Ok(Some(inner.file.get_event(0)?))
    }
}

/// Compact, zero-tree reader over a whole file's events (spec.md section
/// 4.9): every event in the file is concatenated into one [`CompactBuffer`]
/// so navigation, search, and in-place mutation never allocate a [`Tree`].
pub struct CompactReader {
    buffer: CompactBuffer,
    order: crate::primitive::ByteOrder,
}

impl CompactReader {
    /// Opens `path`, reading every event into one flat buffer with a scanned
    /// offset table, ready for [`CompactBuffer::get_event`]/`search_event`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut file = FileReader::open(path)?;
        let order = file.byte_order();
        let count = file.event_count();
        let mut data = Vec::new();
        let mut offsets = Vec::with_capacity(count);
        for i in 0..count {
            offsets.push(data.len());
            data.extend_from_slice(&file.get_event(i)?);
        }
        let buffer = CompactBuffer::scan(data, order, &offsets)?;
        Ok(CompactReader { buffer, order })
    }

    pub fn event_count(&self) -> usize {
        self.buffer.event_count()
    }

    pub fn get_event(&self, i: usize) -> Result<NodeHandle> {
        self.buffer.get_event(i)
    }

    pub fn get_scanned_event(&self, i: usize) -> Result<Vec<NodeHandle>> {
        self.buffer.get_scanned_event(i)
    }

    pub fn search_event(&self, i: usize, tag: u16, num: u8) -> Result<Vec<NodeHandle>> {
        self.buffer.search_event(i, tag, num)
    }

    pub fn get_data(&self, handle: NodeHandle) -> Result<&[u8]> {
        self.buffer.get_data(handle)
    }

    pub fn get_event_buffer(&self, i: usize) -> Result<&[u8]> {
        self.buffer.get_event_buffer(i)
    }

    pub fn remove_event(&mut self, i: usize) -> Result<()> {
        self.buffer.remove_event(i)
    }

    pub fn remove_structure(&mut self, handle: NodeHandle) -> Result<()> {
        self.buffer.remove_structure(handle)
    }

    pub fn add_structure(&mut self, event_n: usize, bytes: &[u8]) -> Result<NodeHandle> {
        self.buffer.add_structure(event_n, bytes)
    }

    /// Writes every surviving event to a fresh EVIO file at `path`, in
    /// current event order, via [`FileWriter`] with default record framing.
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let pattern = path.as_ref().to_string_lossy().to_string();
        let mut config = WriterConfig::default();
        config.order = self.order;
        let mut writer = FileWriter::create(&pattern, config)?;
        let events: Result<Vec<Vec<u8>>> =
            (0..self.buffer.event_count()).map(|i| self.buffer.get_event_buffer(i).map(|b| b.to_vec())).collect();
        writer.write_events(events?)?;
        writer.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::CompressionType;

    struct RecordingListener {
        starts: usize,
        structures: usize,
        ends: usize,
    }

    impl EvioListener for RecordingListener {
        fn start_event_parse(&mut self, _tree: &Tree, _event: NodeId) {
            self.starts += 1;
        }
        fn got_structure(&mut self, _tree: &Tree, _event: NodeId, _structure: NodeId) {
            self.structures += 1;
        }
        fn end_event_parse(&mut self, _tree: &Tree, _event: NodeId) {
            self.ends += 1;
        }
    }

    fn bank_event(tag: u16, num: u8, payload: &[u32]) -> Vec<u8> {
        use crate::datatype::DataType;
        use crate::header::{BankHeader, Header};
        use crate::primitive::ByteOrder;

        let header = BankHeader::new(tag, num, DataType::Uint32, 0, 1 + payload.len() as u32).unwrap();
        let mut buf = vec![0u8; 8 + payload.len() * 4];
        header.encode(&mut buf, ByteOrder::LittleEndian).unwrap();
        for (i, word) in payload.iter().enumerate() {
            buf[8 + i * 4..12 + i * 4].copy_from_slice(&word.to_le_bytes());
        }
        buf
    }

    #[test]
    fn sequential_reader_walks_events_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let pattern = dir.path().join("seq%d.ev").to_string_lossy().to_string();
        let mut config = WriterConfig::default();
        config.compression = CompressionType::None;
        let mut writer = FileWriter::create(&pattern, config).unwrap();
        writer.write_events(vec![bank_event(1, 1, &[10]), bank_event(2, 2, &[20, 21])]).unwrap();
        let path = writer.path().to_path_buf();
        writer.close().unwrap();

        let reader = SequentialReader::open(&path).unwrap();
        assert_eq!(reader.event_count(), 2);
        assert_eq!(reader.next_event().unwrap(), bank_event(1, 1, &[10]));
        assert_eq!(reader.next_event().unwrap(), bank_event(2, 2, &[20, 21]));
        reader.rewind();
        assert_eq!(reader.next_event().unwrap(), bank_event(1, 1, &[10]));
    }

    #[test]
    fn parse_event_dispatches_listeners() {
        let dir = tempfile::tempdir().unwrap();
        let pattern = dir.path().join("parse%d.ev").to_string_lossy().to_string();
        let mut config = WriterConfig::default();
        config.compression = CompressionType::None;
        let mut writer = FileWriter::create(&pattern, config).unwrap();
        writer.write_events(vec![bank_event(5, 9, &[1, 2, 3])]).unwrap();
        let path = writer.path().to_path_buf();
        writer.close().unwrap();

        let reader = SequentialReader::open(&path).unwrap();
        reader.add_listener(RecordingListener { starts: 0, structures: 0, ends: 0 });
        let tree = reader.parse_event(0).unwrap();
        assert_eq!(tree.node(tree.root()).header.tag(), 5);
    }

    #[test]
    fn compact_reader_round_trips_through_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let pattern = dir.path().join("compact%d.ev").to_string_lossy().to_string();
        let mut config = WriterConfig::default();
        config.compression = CompressionType::None;
        let mut writer = FileWriter::create(&pattern, config).unwrap();
        writer.write_events(vec![bank_event(1, 1, &[7]), bank_event(2, 2, &[8, 9])]).unwrap();
        let path = writer.path().to_path_buf();
        writer.close().unwrap();

        let reader = CompactReader::open(&path).unwrap();
        assert_eq!(reader.event_count(), 2);
        let out_path = dir.path().join("roundtrip0.ev");
        reader.to_file(&out_path).unwrap();

        let mut reopened = FileReader::open(&out_path).unwrap();
        assert_eq!(reopened.event_count(), 2);
        assert_eq!(reopened.get_event(0).unwrap(), bank_event(1, 1, &[7]));
    }
}
