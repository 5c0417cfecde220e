//! The scanning engine: element reading, selective section loading, and
//! semantic cooking.
//!
//! A scan walks the stream top-down. Level-1 Segment children outside the
//! requested section set are recorded as skipped stubs without reading
//! their payloads; the first such skip engages the seek logic, which
//! prefers SeekHead directions, falls back to a bounded backward tail scan,
//! and only walks Clusters sequentially when `exhaustive_search` permits.

use crate::ebml;
use crate::elements::{self, DefaultValue, ElementDef, ElementKind};
use crate::error::{MkvError, Result};
use crate::io::SourceReader;
use crate::options::{CallbackAction, ScanOptions, Sections};
use crate::time::{date_from_mkv_ns, TimeSpan};
use crate::tree::{Children, Document, Element, NodeId, RawValue, Value};

use std::collections::{HashMap, HashSet};
use std::io::{ErrorKind, Read, Seek};

use tracing::{debug, trace, warn};

/// Maximum container nesting depth.
const MAX_DEPTH: u32 = 64;
/// Tail-scan chunk size.
const TAIL_SCAN_STEP: u64 = 4096;
/// Tail-scan total budget per Segment.
const TAIL_SCAN_BUDGET: u64 = 1 << 20;
/// Longest printable-ASCII preview recorded for unknown elements.
const PREVIEW_LIMIT: usize = 32;
/// Timecode scale in effect until Info says otherwise (1 ms).
const DEFAULT_TIMECODE_SCALE: u64 = 1_000_000;

/// Element IDs the tail scan recognizes as level-1 candidates.
const TAIL_SCAN_IDS: [u32; 8] = [
    elements::TAGS,
    elements::SEEK_HEAD,
    elements::CLUSTER,
    elements::CUES,
    elements::CHAPTERS,
    elements::ATTACHMENTS,
    elements::TRACKS,
    elements::INFO,
];

/// Matroska tree scanner over a seekable byte source.
///
/// The scanner retains the source after [`read_document`] returns, so
/// binary payloads that were capped during the scan can be re-read with
/// [`read_payload`] (attachment extraction); [`into_inner`] releases the
/// source.
///
/// [`read_document`]: MkvScanner::read_document
/// [`read_payload`]: MkvScanner::read_payload
/// [`into_inner`]: MkvScanner::into_inner
pub struct MkvScanner<R: Read + Seek> {
    src: SourceReader<R>,
    options: ScanOptions,
}

impl<R: Read + Seek> MkvScanner<R> {
    /// Create a scanner with default options.
    pub fn new(reader: R) -> Result<Self> {
        Self::with_options(reader, ScanOptions::default())
    }

    /// Create a scanner with the given options.
    pub fn with_options(reader: R, options: ScanOptions) -> Result<Self> {
        Ok(Self { src: SourceReader::new(reader)?, options })
    }

    /// The options this scanner was built with.
    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// Scan the stream into a document tree.
    pub fn read_document(&mut self) -> Result<Document> {
        self.read_document_with(|_| CallbackAction::Continue)
    }

    /// Scan the stream, invoking `callback` once per element: for
    /// containers right after their header is read, for leaves right after
    /// their value is decoded and cooked. Returning
    /// [`CallbackAction::Stop`] terminates the scan promptly; the tree
    /// built so far is returned.
    pub fn read_document_with<F>(&mut self, callback: F) -> Result<Document>
    where
        F: FnMut(&Element) -> CallbackAction,
    {
        let walk = Walk {
            src: &mut self.src,
            options: &self.options,
            doc: Document::new(),
            callback,
            stopped: false,
            timecode_scale: DEFAULT_TIMECODE_SCALE,
        };
        walk.run()
    }

    /// Re-read an element's payload in full, regardless of the binary size
    /// limit the scan applied. Seeks to `element.datapos` and reads
    /// `element.size` bytes.
    pub fn read_payload(&mut self, element: &Element) -> Result<Vec<u8>> {
        let size = usize::try_from(element.size)
            .map_err(|_| std::io::Error::new(ErrorKind::InvalidInput, "payload exceeds memory"))?;
        self.src.seek_to(element.datapos);
        let mut data = vec![0u8; size];
        self.src.read_exact(&mut data)?;
        Ok(data)
    }

    /// Release the underlying byte source.
    pub fn into_inner(self) -> R {
        self.src.into_inner()
    }
}

/// An element header, read but not yet acted on.
struct Header {
    pos: u64,
    id: u32,
    size: Option<u64>,
    datapos: u64,
    def: Option<&'static ElementDef>,
}

enum Step {
    Consumed,
    End,
}

/// One traversal of the stream; owns the document until the scan finishes.
struct Walk<'a, R: Read + Seek, F> {
    src: &'a mut SourceReader<R>,
    options: &'a ScanOptions,
    doc: Document,
    callback: F,
    stopped: bool,
    timecode_scale: u64,
}

impl<R, F> Walk<'_, R, F>
where
    R: Read + Seek,
    F: FnMut(&Element) -> CallbackAction,
{
    fn run(mut self) -> Result<Document> {
        let mut found_any = false;

        while !self.stopped {
            let Some(root_id) = self.next_root(found_any)? else { break };
            found_any = true;

            let pos = self.src.position();
            let (id, _) = ebml::read_element_id(self.src, pos)?;
            debug_assert_eq!(id, root_id);
            let (size, _) = ebml::read_element_size(self.src, self.src.position())?;
            let datapos = self.src.position();

            let size = match size {
                Some(s) if datapos + s > self.src.len() => {
                    warn!(
                        offset = pos,
                        declared = s,
                        "top-level element extends past end of stream; clamping"
                    );
                    Some(self.src.len() - datapos)
                }
                other => other,
            };

            let def = elements::lookup(id).expect("root magic is in the schema");
            let node = self.doc.push(Element {
                name: def.name,
                kind: def.kind,
                id,
                pos,
                datapos,
                size: size.unwrap_or(0),
                level: 0,
                path: format!("/{}/", def.name),
                parent: None,
                root: None,
                value: Value::Master(Children::new()),
                raw: None,
                display: None,
                skipped: false,
            });
            self.doc.get_mut(node).root = Some(node);
            self.doc.register_root(node);
            self.invoke(node);
            if self.stopped {
                break;
            }

            let end = size.map(|s| datapos + s);
            let outcome = if id == elements::EBML {
                self.read_ebml_root(node, end)
            } else {
                self.read_segment(node, end)
            };

            match outcome {
                Ok(()) => {
                    // A segment that stopped early (all requested sections
                    // consumed) leaves the cursor mid-stream; the next root
                    // can only start at the declared end.
                    if let Some(end) = end {
                        self.src.seek_to(end);
                    }
                }
                Err(err @ (MkvError::TruncatedElement { .. } | MkvError::RecursionLimit { .. })) => {
                    // Fatal for this Segment only; a concatenated stream may
                    // still carry further readable documents.
                    warn!(error = %err, "abandoning damaged top-level element");
                    match end {
                        Some(end) if end <= self.src.len() => self.src.seek_to(end),
                        _ => break,
                    }
                }
                Err(err) => return Err(err),
            }
        }

        if !found_any {
            return Err(MkvError::NotAMatroskaFile);
        }
        debug!(elements = self.doc.len(), "scan complete");
        Ok(self.doc)
    }

    /// Position the stream at the next EBML or Segment magic at or after
    /// the current position. Emits a diagnostic when bytes are skipped.
    fn next_root(&mut self, resync: bool) -> Result<Option<u32>> {
        let start = self.src.position();
        let len = self.src.len();
        let mut chunk = vec![0u8; TAIL_SCAN_STEP as usize + 3];
        let mut pos = start;

        while pos + 4 <= len {
            let n = chunk.len().min((len - pos) as usize);
            self.src.seek_to(pos);
            self.src.read_exact(&mut chunk[..n])?;

            for i in 0..=(n - 4) {
                let word = u32::from_be_bytes([chunk[i], chunk[i + 1], chunk[i + 2], chunk[i + 3]]);
                if word == elements::EBML || word == elements::SEGMENT {
                    let at = pos + i as u64;
                    if at != start {
                        warn!(
                            offset = at,
                            skipped = at - start,
                            resync,
                            "located root element past unrecognized bytes"
                        );
                    }
                    self.src.seek_to(at);
                    return Ok(Some(word));
                }
            }
            pos += (n - 3) as u64;
        }

        self.src.seek_to(len);
        Ok(None)
    }

    /// Read the EBML header document and remember its DocType.
    fn read_ebml_root(&mut self, node: NodeId, end: Option<u64>) -> Result<()> {
        self.read_children(node, end, 1)?;
        if let Some(doc_type) = self
            .doc
            .child(node, "DocType")
            .and_then(|e| e.value.as_str())
            .map(str::to_owned)
        {
            if doc_type != "matroska" && doc_type != "webm" {
                debug!(doc_type, "unfamiliar DocType; scanning anyway");
            }
            self.doc.set_doc_type(doc_type);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Generic container traversal
    // ------------------------------------------------------------------

    /// Read children of `parent` until `end`, or, when `end` is `None`
    /// (unknown-size container), until the first header that is not a
    /// legal child.
    fn read_children(&mut self, parent: NodeId, end: Option<u64>, depth: u32) -> Result<()> {
        if depth > MAX_DEPTH {
            return Err(MkvError::RecursionLimit { depth });
        }

        loop {
            if self.stopped {
                break;
            }
            let pos = self.src.position();
            match end {
                Some(end) if pos >= end => break,
                None if self.src.remaining() < 2 => break,
                _ => {}
            }
            match self.read_child(parent, end, depth)? {
                Step::Consumed => {}
                Step::End => break,
            }
        }

        if end.is_none() {
            // Resolve the extent of an unknown-size container now that its
            // end has been located.
            let pos = self.src.position();
            let parent = self.doc.get_mut(parent);
            parent.size = pos.saturating_sub(parent.datapos);
        }
        Ok(())
    }

    fn read_child(&mut self, parent: NodeId, parent_end: Option<u64>, depth: u32) -> Result<Step> {
        match self.read_header(parent, parent_end)? {
            Some(header) => self.materialize(parent, &header, parent_end, depth),
            None => Ok(Step::End),
        }
    }

    /// Read one element header under `parent`, resolving its schema entry.
    ///
    /// Returns `None` when the container ends here: end of stream, an
    /// unreadable header (after skipping to the container boundary), or,
    /// for unknown-size containers, a header that is not a legal child
    /// (left unconsumed for the outer loop).
    fn read_header(&mut self, parent: NodeId, parent_end: Option<u64>) -> Result<Option<Header>> {
        let parent_id = self.doc.get(parent).id;
        let pos = self.src.position();

        let id = match ebml::read_element_id(self.src, pos) {
            Ok((id, _)) => id,
            Err(MkvError::InvalidElementId { offset } | MkvError::InvalidVint { offset }) => {
                warn!(offset, "unreadable element ID; abandoning rest of container");
                if let Some(end) = parent_end {
                    self.src.seek_to(end);
                }
                return Ok(None);
            }
            Err(MkvError::Io(e)) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e),
        };

        let def = elements::child_def(parent_id, id);
        if parent_end.is_none() && def.is_none() {
            // Unknown-size container: the first non-child ID ends it.
            self.src.seek_to(pos);
            return Ok(None);
        }
        if let Some(end) = parent_end {
            if self.src.position() > end {
                warn!(offset = pos, "element ID straddles container end");
                self.src.seek_to(end);
                return Ok(None);
            }
        }

        let size = match ebml::read_element_size(self.src, self.src.position()) {
            Ok((size, _)) => size,
            Err(MkvError::InvalidVint { offset } | MkvError::VintOverflow { offset }) => {
                warn!(offset, "unreadable element size; abandoning rest of container");
                if let Some(end) = parent_end {
                    self.src.seek_to(end);
                }
                return Ok(None);
            }
            Err(MkvError::Io(e)) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e),
        };
        let datapos = self.src.position();

        let boundary = parent_end.unwrap_or(self.src.len()).min(self.src.len());
        if let Some(size) = size {
            if datapos + size > boundary {
                return Err(MkvError::TruncatedElement { offset: pos, size, boundary });
            }
        }

        Ok(Some(Header { pos, id, size, datapos, def }))
    }

    /// Build the tree node for an already-read header and consume its
    /// payload: recurse for containers, decode and cook for leaves, skip
    /// with a preview for unknown IDs.
    fn materialize(
        &mut self,
        parent: NodeId,
        header: &Header,
        parent_end: Option<u64>,
        depth: u32,
    ) -> Result<Step> {
        let node = self.push_node(parent, header);

        match header.def {
            None => {
                self.skip_unknown(node, header);
                self.invoke(node);
            }
            Some(def) if def.is_master() => {
                self.invoke(node);
                if !self.stopped {
                    let end = header.size.map(|s| header.datapos + s);
                    self.read_children(node, end, depth + 1)?;
                }
            }
            Some(def) => {
                match header.size {
                    Some(size) => self.decode_leaf(node, def, size)?,
                    None => {
                        // A leaf cannot be unknown-sized; treat the rest of
                        // the container as its (unread) payload.
                        warn!(offset = header.pos, name = def.name, "unknown-size leaf");
                        let el = self.doc.get_mut(node);
                        el.skipped = true;
                        if let Some(end) = parent_end {
                            self.src.seek_to(end);
                        } else {
                            let len = self.src.len();
                            self.src.seek_to(len);
                        }
                    }
                }
                self.cook(node);
                self.invoke(node);
            }
        }
        Ok(Step::Consumed)
    }

    /// Create the node for a header and link it under its parent, with
    /// list promotion per the schema or on an observed duplicate.
    fn push_node(&mut self, parent: NodeId, header: &Header) -> NodeId {
        let (name, kind, multiple) = match header.def {
            Some(def) => (def.name, def.kind, def.is_multiple()),
            None => ("?", ElementKind::Unknown, true),
        };

        let parent_el = self.doc.get(parent);
        let level = parent_el.level + 1;
        let root = parent_el.root;
        let mut path = parent_el.path.clone();
        path.push_str(name);
        let is_master = header.def.is_some_and(ElementDef::is_master);
        if is_master {
            path.push('/');
        }

        let node = self.doc.push(Element {
            name,
            kind,
            id: header.id,
            pos: header.pos,
            datapos: header.datapos,
            size: header.size.unwrap_or(0),
            level,
            path,
            parent: Some(parent),
            root,
            value: if is_master { Value::Master(Children::new()) } else { Value::Empty },
            raw: None,
            display: None,
            skipped: false,
        });

        if let Value::Master(children) = &mut self.doc.get_mut(parent).value {
            children.insert(name, node, multiple);
        }
        node
    }

    /// Skip an unknown element, recording a printable-ASCII preview when
    /// the payload starts with text. Useful when diagnosing mis-framed
    /// streams.
    fn skip_unknown(&mut self, node: NodeId, header: &Header) {
        trace!("unknown element 0x{:X} at offset {}", header.id, header.pos);
        let size = header.size.unwrap_or(0);
        let mut preview = None;

        let peek = size.min(PREVIEW_LIMIT as u64) as usize;
        if peek >= 4 {
            let mut buf = vec![0u8; peek];
            if self.src.read_exact(&mut buf).is_ok() {
                let printable = buf.iter().take_while(|b| (0x20..0x7F).contains(*b)).count();
                if printable >= 4 {
                    let mut text = String::from_utf8_lossy(&buf[..printable]).into_owned();
                    if printable as u64 != size {
                        text.push('…');
                    }
                    preview = Some(text);
                }
            }
        }

        let end = header.datapos + size;
        self.src.seek_to(end);
        let el = self.doc.get_mut(node);
        el.skipped = true;
        el.display = preview;
    }

    /// Decode a leaf payload of known size into a typed value.
    fn decode_leaf(&mut self, node: NodeId, def: &'static ElementDef, size: u64) -> Result<()> {
        let value = if size == 0 {
            default_value(def)
        } else {
            match def.kind {
                ElementKind::Unsigned | ElementKind::Signed if size > 8 => {
                    warn!(name = def.name, size, "integer element wider than 8 octets");
                    self.skip_payload(node, size);
                    default_value(def)
                }
                ElementKind::Unsigned => {
                    Value::Unsigned(ebml::read_unsigned(&self.read_payload_bytes(size)?))
                }
                ElementKind::Signed => {
                    Value::Signed(ebml::read_signed(&self.read_payload_bytes(size)?))
                }
                ElementKind::Float if !matches!(size, 4 | 8 | 10) => {
                    warn!(name = def.name, size, "unexpected float size; substituting zero");
                    self.skip_payload(node, size);
                    Value::Float(0.0)
                }
                ElementKind::Float => {
                    let data = self.read_payload_bytes(size)?;
                    Value::Float(ebml::read_float(&data).unwrap_or(0.0))
                }
                ElementKind::Date if size != 8 => {
                    warn!(name = def.name, size, "unexpected date size; substituting epoch");
                    self.skip_payload(node, size);
                    default_value(def)
                }
                ElementKind::Date => {
                    let ns = ebml::read_date(&self.read_payload_bytes(size)?).unwrap_or(0);
                    match date_from_mkv_ns(ns) {
                        Some(date) => Value::Date(date),
                        None => Value::Signed(ns),
                    }
                }
                ElementKind::String => {
                    Value::String(ebml::read_string(&self.read_payload_bytes(size)?))
                }
                ElementKind::Binary => self.decode_binary(node, def, size)?,
                ElementKind::Master | ElementKind::Unknown => unreachable!("not a leaf kind"),
            }
        };

        self.doc.get_mut(node).value = value;
        Ok(())
    }

    /// Read a binary payload, honoring the size limit. `SeekID` is exempt:
    /// the seek logic needs it whole.
    fn decode_binary(&mut self, node: NodeId, def: &'static ElementDef, size: u64) -> Result<Value> {
        let cap = if def.id == elements::SEEK_ID { None } else { self.options.binary_size_limit };
        match cap {
            Some(cap) if size > cap as u64 => {
                let prefix = self.read_payload_bytes(cap as u64)?;
                self.doc.get_mut(node).skipped = true;
                let end = self.doc.get(node).datapos + size;
                self.src.seek_to(end);
                trace!(name = def.name, size, kept = cap, "binary payload capped");
                Ok(Value::Binary(prefix))
            }
            _ => Ok(Value::Binary(self.read_payload_bytes(size)?)),
        }
    }

    fn read_payload_bytes(&mut self, size: u64) -> Result<Vec<u8>> {
        let mut data = vec![0u8; size as usize];
        self.src.read_exact(&mut data)?;
        Ok(data)
    }

    fn skip_payload(&mut self, node: NodeId, size: u64) {
        let end = self.doc.get(node).datapos + size;
        self.src.seek_to(end);
        self.doc.get_mut(node).skipped = true;
    }

    fn invoke(&mut self, node: NodeId) {
        if self.stopped {
            return;
        }
        if (self.callback)(self.doc.get(node)) == CallbackAction::Stop {
            debug!(path = %self.doc.get(node).path, "callback requested stop");
            self.stopped = true;
        }
    }

    // ------------------------------------------------------------------
    // Segment traversal: the selective-read controller
    // ------------------------------------------------------------------

    fn read_segment(&mut self, segment: NodeId, end: Option<u64>) -> Result<()> {
        self.timecode_scale = DEFAULT_TIMECODE_SCALE;

        let seg_datapos = self.doc.get(segment).datapos;
        let seg_end = end.unwrap_or_else(|| self.src.len());
        let wanted = self.options.sections.seek_targets();
        let read_all_clusters = self.options.sections.contains(Sections::CLUSTER);

        let mut found = Sections::empty();
        let mut seek_index: HashMap<u32, u64> = HashMap::new();
        let mut indexed_heads: HashSet<u64> = HashSet::new();
        let mut attempted_targets: HashSet<u64> = HashSet::new();
        let mut skip_seen = false;
        let mut redirected = false;
        let mut tail_scanned = false;

        loop {
            if self.stopped {
                break;
            }
            let pos = self.src.position();
            if pos >= seg_end || self.src.remaining() < 2 {
                break;
            }

            let Some(header) = self.read_header(segment, end)? else { break };

            if header.id == elements::SEEK_HEAD {
                if indexed_heads.insert(header.pos) {
                    if let Err(err) =
                        self.index_seek_head(&mut seek_index, &mut indexed_heads, header.pos, seg_datapos)
                    {
                        warn!(error = %err, offset = header.pos, "unreadable SeekHead; ignoring");
                    }
                }
                if self.options.sections.contains(Sections::SEEK_HEAD) {
                    self.src.seek_to(header.pos);
                    self.read_child(segment, end, 1)?;
                } else {
                    self.stub_section(segment, &header)?;
                }
                // A SeekHead discovered after sections were skipped may be
                // the first chance to locate them.
                if skip_seen {
                    let missing = wanted - found;
                    if !missing.is_empty()
                        && self.redirect(&seek_index, &mut attempted_targets, missing, seg_datapos)
                    {
                        redirected = true;
                        continue;
                    }
                }
                continue;
            }

            let section = Sections::for_id(header.id);
            match section {
                Some(sec) if self.options.sections.contains(sec) => {
                    if redirected && found.contains(sec) && wanted.contains(sec) {
                        // Seek-directed reading may revisit an already
                        // consumed singleton section; keep the first copy.
                        self.stub_section(segment, &header)?;
                        continue;
                    }
                    self.src.seek_to(header.pos);
                    self.read_child(segment, end, 1)?;
                    found |= sec;
                    if !read_all_clusters && !wanted.is_empty() && (wanted - found).is_empty() {
                        debug!("all requested sections consumed; stopping segment");
                        break;
                    }
                }
                Some(_) => {
                    self.stub_section(segment, &header)?;
                    skip_seen = true;

                    let missing = wanted - found;
                    if missing.is_empty() {
                        if !read_all_clusters && !wanted.is_empty() {
                            break;
                        }
                        continue;
                    }
                    if self.redirect(&seek_index, &mut attempted_targets, missing, seg_datapos) {
                        redirected = true;
                        continue;
                    }
                    if !tail_scanned {
                        tail_scanned = true;
                        if let Some((hit_pos, hit_id)) = self.tail_scan(seg_datapos, seg_end, missing)? {
                            if hit_id == elements::SEEK_HEAD {
                                if indexed_heads.insert(hit_pos) {
                                    if let Err(err) = self.index_seek_head(
                                        &mut seek_index,
                                        &mut indexed_heads,
                                        hit_pos,
                                        seg_datapos,
                                    ) {
                                        warn!(error = %err, "unreadable trailing SeekHead");
                                    }
                                }
                                if self.redirect(&seek_index, &mut attempted_targets, missing, seg_datapos) {
                                    redirected = true;
                                    self.src.seek_to(self.src.position().min(seg_end));
                                    continue;
                                }
                            } else {
                                debug!(offset = hit_pos, "tail scan located a wanted section");
                                self.src.seek_to(hit_pos);
                                continue;
                            }
                        }
                    }
                    if self.options.exhaustive_search {
                        continue;
                    }
                    debug!(?missing, "requested sections not locatable without exhaustive search");
                    break;
                }
                None => {
                    // Globals and unknown IDs take the ordinary path.
                    self.src.seek_to(header.pos);
                    self.read_child(segment, end, 1)?;
                }
            }
        }

        if end.is_none() {
            let pos = self.src.position();
            let seg = self.doc.get_mut(segment);
            seg.size = pos.saturating_sub(seg.datapos);
        }
        Ok(())
    }

    /// Record a level-1 section the scan does not materialize: a stub node
    /// flagged skipped, payload never read.
    fn stub_section(&mut self, segment: NodeId, header: &Header) -> Result<()> {
        let node = self.push_node(segment, header);
        self.doc.get_mut(node).skipped = true;
        self.invoke(node);

        match header.size {
            Some(size) => self.src.seek_to(header.datapos + size),
            None => {
                // Unknown-size section (live-captured Cluster): walk child
                // headers without materializing until a foreign ID.
                let end = self.skim_unknown_size(header.id)?;
                let el = self.doc.get_mut(node);
                el.size = end.saturating_sub(el.datapos);
            }
        }
        Ok(())
    }

    /// Advance past an unknown-size container by header-walking its legal
    /// children. Returns the end position.
    fn skim_unknown_size(&mut self, container_id: u32) -> Result<u64> {
        loop {
            let pos = self.src.position();
            if self.src.remaining() < 2 {
                return Ok(self.src.position());
            }
            let id = match ebml::read_element_id(self.src, pos) {
                Ok((id, _)) => id,
                Err(_) => {
                    self.src.seek_to(pos);
                    return Ok(pos);
                }
            };
            if elements::child_def(container_id, id).is_none() {
                self.src.seek_to(pos);
                return Ok(pos);
            }
            match ebml::read_element_size(self.src, self.src.position()) {
                Ok((Some(size), _)) => {
                    let next = self.src.position() + size;
                    if next > self.src.len() {
                        let len = self.src.len();
                        self.src.seek_to(len);
                        return Ok(len);
                    }
                    self.src.seek_to(next);
                }
                _ => {
                    // Nested unknown-size child; give up and end here.
                    self.src.seek_to(pos);
                    return Ok(pos);
                }
            }
        }
    }

    /// Merge a SeekHead (and any SeekHeads it references) into the index
    /// of absolute section offsets.
    fn index_seek_head(
        &mut self,
        index: &mut HashMap<u32, u64>,
        visited: &mut HashSet<u64>,
        pos: u64,
        seg_datapos: u64,
    ) -> Result<()> {
        self.src.seek_to(pos);
        let (id, _) = ebml::read_element_id(self.src, pos)?;
        if id != elements::SEEK_HEAD {
            return Ok(());
        }
        let (size, _) = ebml::read_element_size(self.src, self.src.position())?;
        let end = self.src.position() + size.unwrap_or(0);
        let mut nested: Vec<u64> = Vec::new();

        while self.src.position() < end {
            let at = self.src.position();
            let (child, _) = ebml::read_element_id(self.src, at)?;
            let (child_size, _) = ebml::read_element_size(self.src, self.src.position())?;
            let child_size = child_size.unwrap_or(0);
            let child_end = self.src.position() + child_size;

            if child == elements::SEEK {
                let mut seek_id: Option<u32> = None;
                let mut seek_pos: Option<u64> = None;
                while self.src.position() < child_end {
                    let at = self.src.position();
                    let (field, _) = ebml::read_element_id(self.src, at)?;
                    let (field_size, _) = ebml::read_element_size(self.src, self.src.position())?;
                    let field_size = field_size.unwrap_or(0);
                    match field {
                        elements::SEEK_ID if field_size <= 8 => {
                            let data = self.read_payload_bytes(field_size)?;
                            seek_id = Some(ebml::read_unsigned(&data) as u32);
                        }
                        elements::SEEK_POSITION if field_size <= 8 => {
                            let data = self.read_payload_bytes(field_size)?;
                            seek_pos = Some(ebml::read_unsigned(&data));
                        }
                        _ => {
                            let next = self.src.position() + field_size;
                            self.src.seek_to(next);
                        }
                    }
                }
                if let (Some(sid), Some(off)) = (seek_id, seek_pos) {
                    trace!("seek entry 0x{sid:X} -> offset {off}");
                    if sid == elements::SEEK_HEAD {
                        nested.push(seg_datapos + off);
                    } else {
                        index.entry(sid).or_insert(off);
                    }
                }
            }
            self.src.seek_to(child_end);
        }

        for head in nested {
            if visited.insert(head) && head < self.src.len() {
                self.index_seek_head(index, visited, head, seg_datapos)?;
            }
        }
        Ok(())
    }

    /// Seek to the nearest indexed offset of a missing section. Each
    /// target is attempted once so a stale index cannot loop the scan.
    fn redirect(
        &mut self,
        index: &HashMap<u32, u64>,
        attempted: &mut HashSet<u64>,
        missing: Sections,
        seg_datapos: u64,
    ) -> bool {
        let target = index
            .iter()
            .filter(|(id, _)| Sections::for_id(**id).is_some_and(|s| missing.contains(s)))
            .map(|(_, &off)| seg_datapos + off)
            .filter(|abs| !attempted.contains(abs))
            .min();

        match target {
            Some(abs) if abs < self.src.len() => {
                attempted.insert(abs);
                debug!(offset = abs, "seek-directed jump");
                self.src.seek_to(abs);
                true
            }
            Some(abs) => {
                attempted.insert(abs);
                warn!(offset = abs, "seek entry points past end of stream");
                false
            }
            None => false,
        }
    }

    /// Step backward from the Segment end looking for a trailing run of
    /// verifiable level-1 elements; return the start of the nearest one
    /// whose section is still missing (or a SeekHead, which can direct the
    /// scan further). Candidates verify by `pos + header + size` landing
    /// exactly on the previously verified boundary.
    fn tail_scan(
        &mut self,
        seg_datapos: u64,
        seg_end: u64,
        missing: Sections,
    ) -> Result<Option<(u64, u32)>> {
        let scan_floor = seg_end.saturating_sub(TAIL_SCAN_BUDGET).max(seg_datapos);
        if seg_end <= scan_floor {
            return Ok(None);
        }
        debug!(floor = scan_floor, end = seg_end, "tail scan");

        let mut candidates: Vec<(u64, u32)> = Vec::new();
        let mut chunk_end = seg_end;
        let mut chunk = vec![0u8; TAIL_SCAN_STEP as usize + 3];
        while chunk_end > scan_floor {
            let chunk_start = chunk_end.saturating_sub(TAIL_SCAN_STEP).max(scan_floor);
            let n = ((chunk_end - chunk_start) as usize + 3).min((seg_end - chunk_start) as usize);
            self.src.seek_to(chunk_start);
            self.src.read_exact(&mut chunk[..n])?;

            for i in 0..n.saturating_sub(3) {
                if !(0x10..0x20).contains(&chunk[i]) {
                    continue;
                }
                let word = u32::from_be_bytes([chunk[i], chunk[i + 1], chunk[i + 2], chunk[i + 3]]);
                if TAIL_SCAN_IDS.contains(&word) {
                    candidates.push((chunk_start + i as u64, word));
                }
            }
            chunk_end = chunk_start;
        }

        candidates.sort_unstable_by(|a, b| b.0.cmp(&a.0));
        candidates.dedup();

        let mut boundary = seg_end;
        for (pos, id) in candidates {
            if pos + 5 > boundary {
                continue;
            }
            self.src.seek_to(pos + 4);
            let Ok((size, _)) = ebml::read_element_size(self.src, pos + 4) else { continue };
            let Some(size) = size else { continue };
            let Some(end) = self.src.position().checked_add(size) else { continue };
            if end != boundary {
                continue;
            }
            boundary = pos;
            let wanted_here = Sections::for_id(id).is_some_and(|s| missing.contains(s));
            if wanted_here || id == elements::SEEK_HEAD {
                return Ok(Some((pos, id)));
            }
        }
        Ok(None)
    }

    // ------------------------------------------------------------------
    // Cooking
    // ------------------------------------------------------------------

    /// Apply semantic post-processing to a freshly decoded leaf. Cooking
    /// never fails; a missing dependency leaves the raw value in place and
    /// the rule re-runs when the dependency arrives.
    fn cook(&mut self, node: NodeId) {
        let el = self.doc.get(node);
        let parent_id = el.parent.map_or(0, |p| self.doc.get(p).id);

        match (el.id, parent_id) {
            (elements::TIMECODE_SCALE, elements::INFO) => {
                if let Some(scale) = el.value.as_unsigned() {
                    if scale > 0 {
                        self.timecode_scale = scale;
                        debug!(scale, "timecode scale");
                    }
                    // The EBML order permits Duration before TimecodeScale;
                    // rewrite a sibling that was cooked with the old scale.
                    if let Some(parent) = el.parent {
                        if let Some(duration) = self.doc.child_id(parent, "Duration") {
                            self.cook_segment_duration(duration);
                        }
                    }
                }
            }
            (elements::DURATION, elements::INFO) => self.cook_segment_duration(node),
            (elements::TIMECODE, elements::CLUSTER)
            | (elements::CUE_TIME, elements::CUE_POINT) => self.cook_scaled_time(node),
            (elements::CHAPTER_TIME_START | elements::CHAPTER_TIME_END, elements::CHAPTER_ATOM) => {
                self.cook_nanosecond_time(node)
            }
            (elements::CUE_DURATION, elements::CUE_TRACK_POSITIONS)
            | (elements::BLOCK_DURATION, elements::BLOCK_GROUP) => self.cook_scaled_millis(node),
            (
                elements::DEFAULT_DURATION | elements::DEFAULT_DECODED_FIELD_DURATION,
                elements::TRACK_ENTRY,
            ) => self.cook_default_duration(node),
            (elements::TRACK_TYPE, elements::TRACK_ENTRY) => self.cook_track_type(node),
            _ => {}
        }
    }

    /// Info/Duration: a raw float counted in TimecodeScale units.
    fn cook_segment_duration(&mut self, node: NodeId) {
        let el = self.doc.get(node);
        let raw = match el.raw {
            Some(RawValue::Float(f)) => f,
            _ => match el.value.as_float() {
                Some(f) => f,
                None => return,
            },
        };
        let span = TimeSpan::from_nanos((raw * self.timecode_scale as f64).max(0.0) as u64);
        let el = self.doc.get_mut(node);
        if el.raw.is_none() {
            el.raw = Some(RawValue::Float(raw));
        }
        el.value = Value::Span(span);
        el.display = Some(span.to_string());
    }

    fn raw_unsigned(&self, node: NodeId) -> Option<u64> {
        let el = self.doc.get(node);
        match el.raw {
            Some(RawValue::Unsigned(v)) => Some(v),
            Some(RawValue::Float(_)) => None,
            None => el.value.as_unsigned(),
        }
    }

    /// Cluster/Timecode and CuePoint/CueTime: unsigned ticks scaled by
    /// TimecodeScale.
    fn cook_scaled_time(&mut self, node: NodeId) {
        let Some(ticks) = self.raw_unsigned(node) else { return };
        let span = TimeSpan::from_scaled(ticks, self.timecode_scale);
        self.replace_with_span(node, ticks, span, span.to_string());
    }

    /// Chapter times: already nanoseconds, no scaling.
    fn cook_nanosecond_time(&mut self, node: NodeId) {
        let Some(ns) = self.raw_unsigned(node) else { return };
        let span = TimeSpan::from_nanos(ns);
        self.replace_with_span(node, ns, span, span.to_string());
    }

    /// Cue and block durations: scaled ticks, shown in milliseconds.
    fn cook_scaled_millis(&mut self, node: NodeId) {
        let Some(ticks) = self.raw_unsigned(node) else { return };
        let span = TimeSpan::from_scaled(ticks, self.timecode_scale);
        self.replace_with_span(node, ticks, span, span.display_millis());
    }

    /// TrackEntry default durations: nanoseconds, shown in milliseconds;
    /// video tracks also get the derived frame rate.
    fn cook_default_duration(&mut self, node: NodeId) {
        let Some(ns) = self.raw_unsigned(node) else { return };
        let is_video = self
            .doc
            .get(node)
            .parent
            .and_then(|entry| self.doc.child_id(entry, "TrackType"))
            .is_some_and(|t| self.raw_unsigned(t) == Some(1));

        let span = TimeSpan::from_nanos(ns);
        let display = if is_video && ns > 0 {
            format!("{} ({:.3} fps)", span.display_millis(), 1e9 / ns as f64)
        } else {
            span.display_millis()
        };
        self.replace_with_span(node, ns, span, display);
    }

    fn replace_with_span(&mut self, node: NodeId, raw: u64, span: TimeSpan, display: String) {
        let el = self.doc.get_mut(node);
        if el.raw.is_none() {
            el.raw = Some(RawValue::Unsigned(raw));
        }
        el.value = Value::Span(span);
        el.display = Some(display);
    }

    /// TrackType: numeric code to symbolic name, plus the parent-level
    /// index that lets callers enumerate tracks by kind.
    fn cook_track_type(&mut self, node: NodeId) {
        let Some(code) = self.raw_unsigned(node) else { return };
        let Some(name) = elements::track_type_name(code) else {
            trace!(code, "unmapped track type");
            return;
        };

        let el = self.doc.get_mut(node);
        if el.raw.is_none() {
            el.raw = Some(RawValue::Unsigned(code));
        }
        el.value = Value::Label(name);

        let Some(entry) = self.doc.get(node).parent else { return };
        if let Some(tracks) = self.doc.get(entry).parent {
            if self.doc.get(tracks).id == elements::TRACKS {
                let duplicate = self
                    .doc
                    .get(tracks)
                    .children()
                    .is_some_and(|c| c.get_all(name).contains(&entry));
                if !duplicate {
                    if let Value::Master(children) = &mut self.doc.get_mut(tracks).value {
                        children.insert(name, entry, true);
                    }
                }
            }
        }

        // A default duration decoded before the track type now has its
        // video dependency satisfied.
        for sibling in ["DefaultDuration", "DefaultDecodedFieldDuration"] {
            if let Some(dur) = self.doc.child_id(entry, sibling) {
                self.cook_default_duration(dur);
            }
        }
    }
}

/// The value of an element present with zero size: the schema default if
/// one is declared, else a type-appropriate zero.
fn default_value(def: &ElementDef) -> Value {
    match def.default {
        Some(DefaultValue::Unsigned(v)) => Value::Unsigned(v),
        Some(DefaultValue::Float(v)) => Value::Float(v),
        Some(DefaultValue::Str(s)) => Value::String(s.to_owned()),
        None => match def.kind {
            ElementKind::Unsigned => Value::Unsigned(0),
            ElementKind::Signed => Value::Signed(0),
            ElementKind::Float => Value::Float(0.0),
            ElementKind::Date => match date_from_mkv_ns(0) {
                Some(epoch) => Value::Date(epoch),
                None => Value::Signed(0),
            },
            ElementKind::String => Value::String(String::new()),
            ElementKind::Binary => Value::Binary(Vec::new()),
            ElementKind::Master | ElementKind::Unknown => Value::Empty,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values_follow_schema() {
        let scale = elements::lookup(elements::TIMECODE_SCALE).unwrap();
        assert_eq!(default_value(scale), Value::Unsigned(1_000_000));

        let language = elements::child_def(elements::TRACK_ENTRY, 0x22B5_9C).unwrap();
        assert_eq!(default_value(language), Value::String("eng".into()));

        let duration = elements::lookup(elements::DURATION).unwrap();
        assert_eq!(default_value(duration), Value::Float(0.0));
    }

    #[test]
    fn tail_scan_ids_are_level_one() {
        for id in TAIL_SCAN_IDS {
            let def = elements::lookup(id).unwrap();
            assert_eq!(def.parent, elements::SEGMENT, "{}", def.name);
            // The byte-signature prefilter relies on the leading byte.
            assert!((0x10..0x20).contains(&((id >> 24) as u8)), "{}", def.name);
        }
    }
}
