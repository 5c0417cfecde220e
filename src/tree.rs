//! The parsed element tree.
//!
//! Elements live in a single arena owned by [`Document`]; parent and root
//! links are arena indices, never owning references, so the tree can be
//! traversed in both directions without reference cycles. Container
//! payloads are insertion-ordered mappings from child name to one element
//! or a list of elements, matching the on-disk order.

use crate::elements::ElementKind;
use crate::time::TimeSpan;
use chrono::{DateTime, Utc};
use std::fmt;

/// Index of an element in the document arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) u32);

/// The decoded value of an element.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Unsigned integer.
    Unsigned(u64),
    /// Signed integer.
    Signed(i64),
    /// Float.
    Float(f64),
    /// Wall-clock date.
    Date(DateTime<Utc>),
    /// UTF-8 string.
    String(String),
    /// Opaque bytes, possibly truncated to the binary size limit.
    Binary(Vec<u8>),
    /// A cooked duration or point in stream time.
    Span(TimeSpan),
    /// A cooked symbolic name, e.g. a track type.
    Label(&'static str),
    /// Ordered children of a container.
    Master(Children),
    /// No payload was read (skipped element or empty binary).
    Empty,
}

impl Value {
    /// The unsigned value, if this is one.
    pub fn as_unsigned(&self) -> Option<u64> {
        match self {
            Self::Unsigned(v) => Some(*v),
            _ => None,
        }
    }

    /// The float value, if this is one.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// The string value, if this is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            Self::Label(s) => Some(s),
            _ => None,
        }
    }

    /// The cooked time span, if this is one.
    pub fn as_span(&self) -> Option<TimeSpan> {
        match self {
            Self::Span(s) => Some(*s),
            _ => None,
        }
    }

    /// The binary payload, if this is one.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Binary(b) => Some(b),
            _ => None,
        }
    }

    /// Container children, if this is a container.
    pub fn children(&self) -> Option<&Children> {
        match self {
            Self::Master(c) => Some(c),
            _ => None,
        }
    }
}

/// The numeric value an element held before cooking replaced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawValue {
    /// Raw unsigned integer (timecodes, durations, track types).
    Unsigned(u64),
    /// Raw float (segment duration).
    Float(f64),
}

/// One parsed element with its metadata.
#[derive(Debug)]
pub struct Element {
    /// Schema name, or `"?"` for elements unknown to the schema.
    pub name: &'static str,
    /// Data type.
    pub kind: ElementKind,
    /// EBML ID.
    pub id: u32,
    /// Byte offset of the element header.
    pub pos: u64,
    /// Byte offset of the payload.
    pub datapos: u64,
    /// Payload size in bytes. For an unknown-size container this is the
    /// resolved extent once its end has been located.
    pub size: u64,
    /// Depth below the virtual root; top-level EBML and Segment are 0.
    pub level: u32,
    /// Canonical path, `/`-joined ancestor names with a trailing `/` for
    /// containers.
    pub path: String,
    /// Owning container, absent for top-level elements.
    pub parent: Option<NodeId>,
    /// The top-level EBML or Segment element this node belongs to.
    pub root: Option<NodeId>,
    /// Decoded (and possibly cooked) value.
    pub value: Value,
    /// The pre-cooking numeric value, set once when cooking replaces the
    /// visible value.
    pub raw: Option<RawValue>,
    /// Pre-formatted human form, when one exists.
    pub display: Option<String>,
    /// Whether the payload was intentionally not read.
    pub skipped: bool,
}

impl Element {
    /// Whether this element is a container.
    pub fn is_master(&self) -> bool {
        matches!(self.value, Value::Master(_))
    }

    /// Container children; empty for leaves.
    pub fn children(&self) -> Option<&Children> {
        self.value.children()
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.kind.as_str())?;
        if let Some(display) = &self.display {
            return write!(f, " = {display}");
        }
        match &self.value {
            Value::Unsigned(v) => write!(f, " = {v}"),
            Value::Signed(v) => write!(f, " = {v}"),
            Value::Float(v) => write!(f, " = {v}"),
            Value::Date(v) => write!(f, " = {v}"),
            Value::String(v) => write!(f, " = {v:?}"),
            Value::Label(v) => write!(f, " = {v}"),
            Value::Span(v) => write!(f, " = {v}"),
            Value::Binary(b) => write!(f, " = {} bytes", b.len()),
            Value::Master(c) => write!(f, " [{} children]", c.len()),
            Value::Empty => Ok(()),
        }
    }
}

/// Insertion-ordered mapping from child name to one or many elements.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Children {
    slots: Vec<Slot>,
}

#[derive(Debug, Clone, PartialEq)]
struct Slot {
    name: &'static str,
    /// Whether this name holds a list (declared multiple, or promoted on an
    /// observed duplicate).
    list: bool,
    nodes: Vec<NodeId>,
}

impl Children {
    /// New empty child map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a child under `name`. A second occurrence of a name promotes
    /// the slot to a list even when the schema declared it singular.
    pub fn insert(&mut self, name: &'static str, node: NodeId, multiple: bool) {
        if let Some(slot) = self.slots.iter_mut().find(|s| s.name == name) {
            slot.list = true;
            slot.nodes.push(node);
        } else {
            self.slots.push(Slot { name, list: multiple, nodes: vec![node] });
        }
    }

    /// First child stored under `name`.
    pub fn get(&self, name: &str) -> Option<NodeId> {
        self.slots.iter().find(|s| s.name == name).map(|s| s.nodes[0])
    }

    /// All children stored under `name`, in on-disk order.
    pub fn get_all(&self, name: &str) -> &[NodeId] {
        self.slots.iter().find(|s| s.name == name).map(|s| s.nodes.as_slice()).unwrap_or(&[])
    }

    /// Whether `name` holds a list.
    pub fn is_list(&self, name: &str) -> bool {
        self.slots.iter().find(|s| s.name == name).is_some_and(|s| s.list)
    }

    /// Iterate `(name, elements)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &[NodeId])> {
        self.slots.iter().map(|s| (s.name, s.nodes.as_slice()))
    }

    /// All children in document order, ignoring the name grouping.
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        // Slots are keyed by first occurrence; re-sort by arena index, which
        // follows creation order.
        let mut all: Vec<NodeId> = self.slots.iter().flat_map(|s| s.nodes.iter().copied()).collect();
        all.sort_by_key(|n| n.0);
        all.into_iter()
    }

    /// Number of distinct child names.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the container is empty.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// A parsed Matroska document: a virtual root over the top-level EBML
/// headers and Segments of the stream (the format permits concatenation).
#[derive(Debug, Default)]
pub struct Document {
    nodes: Vec<Element>,
    ebml: Vec<NodeId>,
    segments: Vec<NodeId>,
    doc_type: Option<String>,
}

impl Document {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, element: Element) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(element);
        id
    }

    pub(crate) fn register_root(&mut self, node: NodeId) {
        let is_segment = self.get(node).id == crate::elements::SEGMENT;
        if is_segment {
            self.segments.push(node);
        } else {
            self.ebml.push(node);
        }
    }

    pub(crate) fn set_doc_type(&mut self, doc_type: String) {
        self.doc_type = Some(doc_type);
    }

    /// The element behind a node index.
    pub fn get(&self, node: NodeId) -> &Element {
        &self.nodes[node.0 as usize]
    }

    pub(crate) fn get_mut(&mut self, node: NodeId) -> &mut Element {
        &mut self.nodes[node.0 as usize]
    }

    /// Number of elements in the document.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the document holds no elements.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// DocType from the EBML header, when one was present.
    pub fn doc_type(&self) -> Option<&str> {
        self.doc_type.as_deref()
    }

    /// Whether the stream declared itself WebM.
    pub fn is_webm(&self) -> bool {
        self.doc_type() == Some("webm")
    }

    /// Top-level EBML headers in stream order.
    pub fn ebml_headers(&self) -> impl Iterator<Item = &Element> {
        self.ebml.iter().map(|&n| self.get(n))
    }

    /// Top-level Segments in stream order.
    pub fn segment_ids(&self) -> &[NodeId] {
        &self.segments
    }

    /// Top-level Segments in stream order.
    pub fn segments(&self) -> impl Iterator<Item = &Element> {
        self.segments.iter().map(|&n| self.get(n))
    }

    /// The `index`-th Segment.
    pub fn segment(&self, index: usize) -> Option<&Element> {
        self.segments.get(index).map(|&n| self.get(n))
    }

    /// First child of `node` stored under `name`.
    pub fn child(&self, node: NodeId, name: &str) -> Option<&Element> {
        self.child_id(node, name).map(|n| self.get(n))
    }

    /// Index of the first child of `node` stored under `name`.
    pub fn child_id(&self, node: NodeId, name: &str) -> Option<NodeId> {
        self.get(node).children()?.get(name)
    }

    /// All children of `node` stored under `name`, in on-disk order.
    pub fn children_named(&self, node: NodeId, name: &str) -> Vec<&Element> {
        match self.get(node).children() {
            Some(children) => children.get_all(name).iter().map(|&n| self.get(n)).collect(),
            None => Vec::new(),
        }
    }

    /// Walk a `/`-separated path of child names starting at `node`.
    pub fn descend(&self, node: NodeId, path: &str) -> Option<&Element> {
        let mut current = node;
        for name in path.split('/').filter(|s| !s.is_empty()) {
            current = self.child_id(current, name)?;
        }
        Some(self.get(current))
    }

    /// All elements named `name`, in document order.
    pub fn find(&self, name: &str) -> Vec<NodeId> {
        self.find_by(|e| e.name == name)
    }

    /// All elements matching a predicate, in document order.
    pub fn find_by(&self, mut predicate: impl FnMut(&Element) -> bool) -> Vec<NodeId> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, e)| predicate(e))
            .map(|(i, _)| NodeId(i as u32))
            .collect()
    }

    /// Walk parent links upward from `node` (inclusive) to the first
    /// element named `name`.
    pub fn closest(&self, node: NodeId, name: &str) -> Option<NodeId> {
        let mut current = Some(node);
        while let Some(n) = current {
            if self.get(n).name == name {
                return Some(n);
            }
            current = self.get(n).parent;
        }
        None
    }
}
