//! Compact node (component C5): a zero-copy index over a buffer, used by
//! the compact reader (C9) to navigate and mutate events without
//! materializing a [`crate::tree::Tree`] (spec.md section 4.5).
//!
//! Every compact node records `(tag, num, type, pos, data_pos, len_words,
//! data_len_words)` plus parent/child links into a flat per-event arena.
//! Mutation (`remove_event`, `remove_structure`, `add_structure`) edits the
//! backing buffer directly (copy the tail to close/open a gap) and then
//! re-scans the touched event to rebuild its node arena — simpler than
//! incremental position arithmetic across every descendant, and still
//! produces the exact position/length invariants spec.md section 8 (test
//! property 4) requires, since a re-scan can only ever agree with the
//! buffer it just read. Every successful mutation bumps that event's
//! generation counter; any [`NodeHandle`] older than the event's current
//! generation is stale and every accessor rejects it with
//! `EvioError::Obsolete`, matching "obsolete nodes must not be dereferenced"
//! (spec.md section 4.5).

use crate::datatype::DataType;
use crate::error::{EvioError, Result};
use crate::header::{BankHeader, Header, SegmentHeader, TagSegmentHeader};
use crate::primitive::ByteOrder;

/// One structure's location and shape within the owning [`CompactBuffer`].
#[derive(Debug, Clone)]
pub struct CompactNode {
    pub tag: u16,
    pub num: u8,
    pub pad: u8,
    pub data_type: DataType,
    /// Byte offset of this structure's header.
    pub pos: usize,
    /// Byte offset of this structure's payload (just past its header).
    pub data_pos: usize,
    /// Total size of this structure in 32-bit words, header included.
    pub len_words: u32,
    /// Payload size in 32-bit words.
    pub data_len_words: u32,
    pub is_event: bool,
    header_words: u32,
    parent: Option<usize>,
    children: Vec<usize>,
}

impl CompactNode {
    pub fn is_container(&self) -> bool {
        self.data_type.is_container()
    }
}

struct EventIndex {
    /// Flattened DFS order, index 0 is always the event root.
    nodes: Vec<CompactNode>,
    /// Byte offset of the event root's header within the buffer.
    offset: usize,
    generation: u64,
}

/// A handle to a [`CompactNode`] inside a [`CompactBuffer`]. Becomes stale
/// (and every accessor rejects it with `EvioError::Obsolete`) once the
/// owning event is mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeHandle {
    event: usize,
    node: usize,
    generation: u64,
}

/// A zero-parse index over a buffer of concatenated events (spec.md section
/// 4.5). The buffer is owned; construction scans header words only — no
/// payload bytes are copied out.
pub struct CompactBuffer {
    buf: Vec<u8>,
    order: ByteOrder,
    events: Vec<EventIndex>,
}

impl CompactBuffer {
    /// Scans `buf` into a compact index. `event_offsets` gives the byte
    /// offset of each event's outermost bank header within `buf`, in order.
    pub fn scan(buf: Vec<u8>, order: ByteOrder, event_offsets: &[usize]) -> Result<Self> {
        let mut events = Vec::with_capacity(event_offsets.len());
        for &offset in event_offsets {
            events.push(scan_event(&buf, offset, order)?);
        }
        Ok(CompactBuffer { buf, order, events })
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    pub fn buffer(&self) -> &[u8] {
        &self.buf
    }

    /// Returns a handle to event `i`'s root node.
    pub fn get_event(&self, i: usize) -> Result<NodeHandle> {
        let ev = self
            .events
            .get(i)
            .ok_or_else(|| EvioError::Bounds(format!("no event at index {i}")))?;
        Ok(NodeHandle {
            event: i,
            node: 0,
            generation: ev.generation,
        })
    }

    /// Returns every node of event `i` (the whole flattened DFS), each as a
    /// fresh handle, matching the "scanned event" facade in C9.
    pub fn get_scanned_event(&self, i: usize) -> Result<Vec<NodeHandle>> {
        let ev = self
            .events
            .get(i)
            .ok_or_else(|| EvioError::Bounds(format!("no event at index {i}")))?;
        Ok((0..ev.nodes.len())
            .map(|node| NodeHandle {
                event: i,
                node,
                generation: ev.generation,
            })
            .collect())
    }

    /// Searches event `i` for every node whose `(tag, num)` matches.
    pub fn search_event(&self, i: usize, tag: u16, num: u8) -> Result<Vec<NodeHandle>> {
        let ev = self
            .events
            .get(i)
            .ok_or_else(|| EvioError::Bounds(format!("no event at index {i}")))?;
        Ok(ev
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.tag == tag && n.num == num)
            .map(|(idx, _)| NodeHandle {
                event: i,
                node: idx,
                generation: ev.generation,
            })
            .collect())
    }

    fn resolve(&self, handle: NodeHandle) -> Result<&CompactNode> {
        let ev = self
            .events
            .get(handle.event)
            .ok_or_else(|| EvioError::Bounds(format!("no event at index {}", handle.event)))?;
        if ev.generation != handle.generation {
            return Err(EvioError::Obsolete(
                "node handle refers to a mutation-superseded event".into(),
            ));
        }
        ev.nodes
            .get(handle.node)
            .ok_or_else(|| EvioError::Obsolete("node handle out of range after mutation".into()))
    }

    /// Borrows the resolved node's fields (copy, since `CompactNode` is
    /// small and plain data).
    pub fn node(&self, handle: NodeHandle) -> Result<CompactNode> {
        self.resolve(handle).map(|n| CompactNode {
            children: n.children.clone(),
            ..clone_node(n)
        })
    }

    /// The raw payload bytes of the resolved node — a borrowed view, not a
    /// copy.
    pub fn get_data(&self, handle: NodeHandle) -> Result<&[u8]> {
        let n = self.resolve(handle)?;
        Ok(&self.buf[n.data_pos..n.data_pos + n.data_len_words as usize * 4])
    }

    /// The full encoded bytes (header + payload) of event `i`.
    pub fn get_event_buffer(&self, i: usize) -> Result<&[u8]> {
        let ev = self
            .events
            .get(i)
            .ok_or_else(|| EvioError::Bounds(format!("no event at index {i}")))?;
        let root = &ev.nodes[0];
        Ok(&self.buf[root.pos..root.pos + root.len_words as usize * 4])
    }

    /// Removes event `i` entirely: splices its bytes out of the buffer,
    /// shifts every later event's recorded offset left, and invalidates all
    /// handles into it.
    pub fn remove_event(&mut self, i: usize) -> Result<()> {
        if i >= self.events.len() {
            return Err(EvioError::Bounds(format!("no event at index {i}")));
        }
        let root = &self.events[i].nodes[0];
        let start = root.pos;
        let removed = root.len_words as usize * 4;
        self.buf.drain(start..start + removed);
        self.events.remove(i);
        for ev in self.events.iter_mut().skip(i) {
            ev.offset -= removed;
        }
        // Re-scan every event from i onward: their absolute byte offsets
        // just moved, so their node tables (built from absolute positions)
        // are stale even though nothing about their own bytes changed.
        for idx in i..self.events.len() {
            let offset = self.events[idx].offset;
            let generation = self.events[idx].generation + 1;
            let mut rescanned = scan_event(&self.buf, offset, self.order)?;
            rescanned.generation = generation;
            self.events[idx] = rescanned;
        }
        Ok(())
    }

    /// Removes a single structure from the buffer, propagating the length
    /// delta up the ancestor chain and re-scanning the owning event.
    pub fn remove_structure(&mut self, handle: NodeHandle) -> Result<()> {
        let (event_idx, parent_idx, removed_start, removed_bytes) = {
            let n = self.resolve(handle)?;
            let parent_idx = n
                .parent
                .ok_or_else(|| EvioError::Format(
                    "cannot remove an event's root structure; use remove_event instead".into(),
                ))?;
            (handle.event, parent_idx, n.pos, n.len_words as usize * 4)
        };
        self.splice_and_rescan(event_idx, Some(parent_idx), removed_start, removed_bytes, 0, &[])
    }

    /// Appends `bytes` (a fully-encoded structure, header included) as the
    /// new last child of event `event_n`'s top-level bank.
    pub fn add_structure(&mut self, event_n: usize, bytes: &[u8]) -> Result<NodeHandle> {
        let ev = self
            .events
            .get(event_n)
            .ok_or_else(|| EvioError::Bounds(format!("no event at index {event_n}")))?;
        let root = &ev.nodes[0];
        if !root.is_container() {
            return Err(EvioError::Format(
                "event root is not a container; cannot add a child structure".into(),
            ));
        }
        let insert_at = root.data_pos + root.data_len_words as usize * 4;
        self.splice_and_rescan(event_n, Some(0), insert_at, 0, bytes.len(), bytes)?;
        let new_ev = &self.events[event_n];
        // The newly added structure is always the last node appended during
        // re-scan's DFS walk of the (now one-larger) top-level child list.
        let new_root = &new_ev.nodes[0];
        let new_child = *new_root
            .children
            .last()
            .ok_or_else(|| EvioError::Format("re-scan after add_structure found no children".into()))?;
        Ok(NodeHandle {
            event: event_n,
            node: new_child,
            generation: new_ev.generation,
        })
    }

    /// Splices `remove_bytes` bytes out starting at `at` and/or
    /// `insert_bytes` in at `at`, adjusts every container from
    /// `start_node_idx` up to the root's length field in place in the
    /// buffer, shifts later events' offsets, and re-scans the touched
    /// event. `start_node_idx` is `None` only when there is no ancestor to
    /// patch (never the case in practice: removal always has a parent,
    /// addition always starts from the root).
    fn splice_and_rescan(
        &mut self,
        event_idx: usize,
        start_node_idx: Option<usize>,
        at: usize,
        remove_bytes: usize,
        insert_len: usize,
        insert_bytes: &[u8],
    ) -> Result<()> {
        let delta_words = insert_len as i64 / 4 - remove_bytes as i64 / 4;

        // Collect the ancestor chain's (pos, header_words, new_len_words)
        // first, since patching the buffer needs `&mut self` while this
        // walk only needs a read of the still-valid (pre-splice) node table.
        if let Some(mut node_idx) = start_node_idx {
            let mut chain = Vec::new();
            {
                let ev = &self.events[event_idx];
                loop {
                    let n = &ev.nodes[node_idx];
                    let new_len_words = (n.len_words as i64 + delta_words) as u32;
                    chain.push((n.pos, n.header_words, new_len_words));
                    match n.parent {
                        Some(p) => node_idx = p,
                        None => break,
                    }
                }
            }
            for (pos, header_words, new_len_words) in chain {
                self.patch_length_field(pos, header_words, new_len_words)?;
            }
        }

        if remove_bytes > 0 {
            self.buf.drain(at..at + remove_bytes);
        }
        if insert_len > 0 {
            self.buf.splice(at..at, insert_bytes.iter().copied());
        }

        let byte_delta = insert_len as i64 - remove_bytes as i64;
        for ev in self.events.iter_mut().skip(event_idx + 1) {
            ev.offset = (ev.offset as i64 + byte_delta) as usize;
        }

        let offset = self.events[event_idx].offset;
        let generation = self.events[event_idx].generation + 1;
        let mut rescanned = scan_event(&self.buf, offset, self.order)?;
        rescanned.generation = generation;
        self.events[event_idx] = rescanned;
        Ok(())
    }

    /// Overwrites a container's length field directly in the buffer bytes.
    fn patch_length_field(&mut self, pos: usize, header_words: u32, new_len_words: u32) -> Result<()> {
        match header_words {
            2 => {
                let (mut header, _) = BankHeader::decode(&self.buf[pos..], self.order)?;
                header.length = new_len_words;
                header.encode(&mut self.buf[pos..pos + 8], self.order)?;
            }
            1 => {
                // Could be Segment or TagSegment; both pack `length` in the
                // low 16 bits of the same word, so try Segment's decode and
                // fall back to TagSegment only to preserve the other fields.
                if new_len_words > 0xffff {
                    return Err(EvioError::Format(format!(
                        "structure at offset {pos} would overflow its 16-bit length field"
                    )));
                }
                let word = crate::primitive::order::get_u32(&self.buf, pos, self.order)?;
                let data_type_code = ((word >> 16) & 0x3f) as u8;
                if DataType::from_code(data_type_code) == DataType::TagSegment {
                    let (mut header, _) = TagSegmentHeader::decode(&self.buf[pos..], self.order)?;
                    header.length = new_len_words as u16;
                    header.encode(&mut self.buf[pos..pos + 4], self.order)?;
                } else {
                    let (mut header, _) = SegmentHeader::decode(&self.buf[pos..], self.order)?;
                    header.length = new_len_words as u16;
                    header.encode(&mut self.buf[pos..pos + 4], self.order)?;
                }
            }
            other => {
                return Err(EvioError::Format(format!(
                    "unexpected header word count {other} while patching length"
                )))
            }
        }
        Ok(())
    }
}

fn clone_node(n: &CompactNode) -> CompactNode {
    CompactNode {
        tag: n.tag,
        num: n.num,
        pad: n.pad,
        data_type: n.data_type,
        pos: n.pos,
        data_pos: n.data_pos,
        len_words: n.len_words,
        data_len_words: n.data_len_words,
        is_event: n.is_event,
        header_words: n.header_words,
        parent: n.parent,
        children: Vec::new(),
    }
}

fn scan_event(buf: &[u8], offset: usize, order: ByteOrder) -> Result<EventIndex> {
    let mut nodes = Vec::new();
    scan_bank(buf, offset, order, &mut nodes, None, true)?;
    Ok(EventIndex {
        nodes,
        offset,
        generation: 0,
    })
}

fn scan_bank(
    buf: &[u8],
    offset: usize,
    order: ByteOrder,
    nodes: &mut Vec<CompactNode>,
    parent: Option<usize>,
    is_event: bool,
) -> Result<usize> {
    if offset + 8 > buf.len() {
        return Err(EvioError::Truncated("bank header past end of buffer".into()));
    }
    let (header, _) = BankHeader::decode(&buf[offset..], order)?;
    let len_words = header.length + 1;
    let total_bytes = len_words as usize * 4;
    if offset + total_bytes > buf.len() {
        return Err(EvioError::Truncated("bank payload past end of buffer".into()));
    }
    let data_pos = offset + 8;
    let data_len_words = header.length - 1;
    let idx = nodes.len();
    nodes.push(CompactNode {
        tag: header.tag,
        num: header.num,
        pad: header.padding,
        data_type: header.data_type(),
        pos: offset,
        data_pos,
        len_words,
        data_len_words,
        is_event,
        header_words: 2,
        parent,
        children: Vec::new(),
    });
    scan_children(buf, data_pos, data_len_words as usize * 4, header.data_type(), order, nodes, idx)?;
    Ok(idx)
}

fn scan_segment(
    buf: &[u8],
    offset: usize,
    order: ByteOrder,
    nodes: &mut Vec<CompactNode>,
    parent: Option<usize>,
) -> Result<usize> {
    if offset + 4 > buf.len() {
        return Err(EvioError::Truncated("segment header past end of buffer".into()));
    }
    let (header, _) = SegmentHeader::decode(&buf[offset..], order)?;
    let len_words = header.length as u32 + 1;
    let total_bytes = len_words as usize * 4;
    if offset + total_bytes > buf.len() {
        return Err(EvioError::Truncated("segment payload past end of buffer".into()));
    }
    let data_pos = offset + 4;
    let idx = nodes.len();
    nodes.push(CompactNode {
        tag: header.tag as u16,
        num: 0,
        pad: header.padding,
        data_type: header.data_type(),
        pos: offset,
        data_pos,
        len_words,
        data_len_words: header.length as u32,
        is_event: false,
        header_words: 1,
        parent,
        children: Vec::new(),
    });
    scan_children(buf, data_pos, header.length as usize * 4, header.data_type(), order, nodes, idx)?;
    Ok(idx)
}

fn scan_tagsegment(
    buf: &[u8],
    offset: usize,
    order: ByteOrder,
    nodes: &mut Vec<CompactNode>,
    parent: Option<usize>,
) -> Result<usize> {
    if offset + 4 > buf.len() {
        return Err(EvioError::Truncated("tagsegment header past end of buffer".into()));
    }
    let (header, _) = TagSegmentHeader::decode(&buf[offset..], order)?;
    let len_words = header.length as u32 + 1;
    let total_bytes = len_words as usize * 4;
    if offset + total_bytes > buf.len() {
        return Err(EvioError::Truncated("tagsegment payload past end of buffer".into()));
    }
    let data_pos = offset + 4;
    let idx = nodes.len();
    nodes.push(CompactNode {
        tag: header.tag,
        num: 0,
        pad: 0,
        data_type: header.data_type(),
        pos: offset,
        data_pos,
        len_words,
        data_len_words: header.length as u32,
        is_event: false,
        header_words: 1,
        parent,
        children: Vec::new(),
    });
    scan_children(buf, data_pos, header.length as usize * 4, header.data_type(), order, nodes, idx)?;
    Ok(idx)
}

fn scan_children(
    buf: &[u8],
    start: usize,
    len: usize,
    parent_type: DataType,
    order: ByteOrder,
    nodes: &mut Vec<CompactNode>,
    parent_idx: usize,
) -> Result<()> {
    if !parent_type.is_container() {
        return Ok(());
    }
    let end = start + len;
    let mut pos = start;
    while pos < end {
        let child_idx = if parent_type.is_bank() {
            scan_bank(buf, pos, order, nodes, Some(parent_idx), false)?
        } else if parent_type.is_segment() {
            scan_segment(buf, pos, order, nodes, Some(parent_idx))?
        } else {
            scan_tagsegment(buf, pos, order, nodes, Some(parent_idx))?
        };
        let consumed = nodes[child_idx].len_words as usize * 4;
        pos += consumed;
        nodes[parent_idx].children.push(child_idx);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::Header;
    use crate::primitive::order::put_u32;

    fn build_simple_event() -> Vec<u8> {
        // Bank(tag=1,num=0,type=BANK) { Bank(tag=7,num=3,type=Int32){1,2} }
        let mut inner_data = vec![0u8; 8];
        put_u32(&mut inner_data, 0, 1, ByteOrder::BigEndian).unwrap();
        put_u32(&mut inner_data, 4, 2, ByteOrder::BigEndian).unwrap();
        let inner_header = BankHeader::new(7, 3, DataType::Int32, 0, 3).unwrap();
        let mut inner = vec![0u8; 8];
        inner_header.encode(&mut inner, ByteOrder::BigEndian).unwrap();
        inner.extend_from_slice(&inner_data);

        let outer_header = BankHeader::new(1, 0, DataType::Bank, 0, 1 + (inner.len() as u32 / 4)).unwrap();
        let mut outer = vec![0u8; 8];
        outer_header.encode(&mut outer, ByteOrder::BigEndian).unwrap();
        outer.extend_from_slice(&inner);
        outer
    }

    #[test]
    fn scan_reports_correct_positions() {
        let event = build_simple_event();
        let cb = CompactBuffer::scan(event.clone(), ByteOrder::BigEndian, &[0]).unwrap();
        let root = cb.get_event(0).unwrap();
        let node = cb.node(root).unwrap();
        assert_eq!(node.tag, 1);
        assert_eq!(node.pos, 0);
        assert_eq!(node.data_pos, 8);

        let children = cb.get_scanned_event(0).unwrap();
        assert_eq!(children.len(), 2);
        let child = cb.node(children[1]).unwrap();
        assert_eq!(child.tag, 7);
        assert_eq!(child.num, 3);
        assert_eq!(cb.get_data(children[1]).unwrap().len(), 8);
    }

    #[test]
    fn search_event_finds_matching_tag_num() {
        let event = build_simple_event();
        let cb = CompactBuffer::scan(event, ByteOrder::BigEndian, &[0]).unwrap();
        let found = cb.search_event(0, 7, 3).unwrap();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn remove_structure_shrinks_buffer_and_updates_root_length() {
        let event = build_simple_event();
        let original_len = event.len();
        let mut cb = CompactBuffer::scan(event, ByteOrder::BigEndian, &[0]).unwrap();
        let children = cb.get_scanned_event(0).unwrap();
        let inner = children[1];
        cb.remove_structure(inner).unwrap();

        assert_eq!(cb.buffer().len(), original_len - 16);
        let root = cb.get_event(0).unwrap();
        let node = cb.node(root).unwrap();
        assert_eq!(node.len_words as usize * 4, cb.buffer().len());
        assert_eq!(node.data_len_words, 0);

        // Stale handle now fails.
        assert!(matches!(cb.node(inner), Err(EvioError::Obsolete(_))));
    }

    #[test]
    fn add_structure_grows_buffer_and_is_reachable() {
        let event = build_simple_event();
        let mut cb = CompactBuffer::scan(event, ByteOrder::BigEndian, &[0]).unwrap();

        let new_header = BankHeader::new(42, 1, DataType::Float32, 0, 2).unwrap();
        let mut new_bytes = vec![0u8; 8];
        new_header.encode(&mut new_bytes, ByteOrder::BigEndian).unwrap();
        new_bytes.extend_from_slice(&[0u8; 4]);

        let handle = cb.add_structure(0, &new_bytes).unwrap();
        let node = cb.node(handle).unwrap();
        assert_eq!(node.tag, 42);

        let children = cb.get_scanned_event(0).unwrap();
        assert_eq!(children.len(), 3);
    }

    #[test]
    fn remove_event_shifts_subsequent_events() {
        let event_a = build_simple_event();
        let event_b = build_simple_event();
        let mut buf = event_a.clone();
        let offset_b = buf.len();
        buf.extend_from_slice(&event_b);

        let mut cb = CompactBuffer::scan(buf, ByteOrder::BigEndian, &[0, offset_b]).unwrap();
        cb.remove_event(0).unwrap();
        assert_eq!(cb.event_count(), 1);
        let remaining = cb.get_event(0).unwrap();
        let node = cb.node(remaining).unwrap();
        assert_eq!(node.pos, 0);
    }
}
