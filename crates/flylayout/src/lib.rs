//! # Flylayout
//!
//! Decoder for the layout blobs guests push through `state_changed`, and the
//! host's map of managed elements built from them.
//!
//! ## Format
//!
//! ```text
//! element  := id:i32 type_len:i32 type:utf8 prop_count:i32 property* child_count:i32 element*
//! property := tag:u8 value
//! ```
//!
//! | Tag | Property | Value |
//! |-----|----------|-------|
//! | 0 | Null    | (none) |
//! | 1 | Int32   | `i32` |
//! | 2 | Float32 | `f32` |
//! | 3 | Float64 | `f64` |
//! | 4 | Bool    | `u8`, zero is false |
//! | 5 | Byte    | `u8` |
//! | 6 | String  | `len:i32` then UTF-8 |
//! | 7 | Struct  | `name_len:i32`, name, `size:i32`, raw bytes |
//!
//! All integers are Little-Endian. Lengths are signed on the wire; a negative
//! one is an error, never a wrap-around.

use std::collections::HashMap;


/// Elements nested deeper than this are rejected instead of recursing further.
pub const MAX_DEPTH: usize = 256;

/// Layout decoding and registration errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Blob exhausted while reading.
    UnexpectedEnd,
    /// Byte does not correspond to a known `PropertyTag`.
    InvalidTag(u8),
    /// A control type, string property or struct name is not valid UTF-8.
    InvalidUtf8,
    /// A length or count field was negative.
    NegativeLength(i32),
    /// An element id is already managed and the tactic is `Reject`.
    DuplicateId(i32),
    /// Element nesting exceeds `MAX_DEPTH`.
    TooDeep,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::UnexpectedEnd => write!(f, "Layout blob ended unexpectedly"),
            Error::InvalidTag(b) => write!(f, "Invalid property tag: {:#04x}", b),
            Error::InvalidUtf8 => write!(f, "Layout text is not valid UTF-8"),
            Error::NegativeLength(n) => write!(f, "Negative length field: {}", n),
            Error::DuplicateId(id) => write!(f, "Element id {} is already managed", id),
            Error::TooDeep => write!(f, "Layout nested deeper than {} elements", MAX_DEPTH),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

/// Identifies the type of an encoded property.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyTag {
    Null = 0,
    Int32 = 1,
    Float32 = 2,
    Float64 = 3,
    Bool = 4,
    Byte = 5,
    String = 6,
    Struct = 7,
}

impl PropertyTag {
    pub fn from_u8(b: u8) -> Option<Self> {
        Some(match b {
            0 => Self::Null,
            1 => Self::Int32,
            2 => Self::Float32,
            3 => Self::Float64,
            4 => Self::Bool,
            5 => Self::Byte,
            6 => Self::String,
            7 => Self::Struct,
            _ => return None,
        })
    }
}

/// One positional property of an element.
#[derive(Debug, Clone, PartialEq)]
pub enum Property {
    Null,
    Int32(i32),
    Float32(f32),
    Float64(f64),
    Bool(bool),
    Byte(u8),
    String(String),
    /// A well-known struct, left serialized. Interpreting it is the
    /// rendering layer's business.
    Struct { name: String, bytes: Vec<u8> },
}

impl Property {
    pub fn tag(&self) -> PropertyTag {
        match self {
            Property::Null => PropertyTag::Null,
            Property::Int32(_) => PropertyTag::Int32,
            Property::Float32(_) => PropertyTag::Float32,
            Property::Float64(_) => PropertyTag::Float64,
            Property::Bool(_) => PropertyTag::Bool,
            Property::Byte(_) => PropertyTag::Byte,
            Property::String(_) => PropertyTag::String,
            Property::Struct { .. } => PropertyTag::Struct,
        }
    }
}

/// A decoded element and its subtree.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub id: i32,
    /// Control type, e.g. `Layout` or `Button`.
    pub control: String,
    pub properties: Vec<Property>,
    pub children: Vec<Element>,
}

impl Element {
    /// Decodes one element tree from the front of `blob`.
    ///
    /// Trailing bytes are ignored.
    pub fn decode(blob: &[u8]) -> Result<Self> {
        let mut dec = Decoder::new(blob);
        dec.element(0)
    }

    /// Number of elements in this subtree, itself included.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(Element::count).sum::<usize>()
    }

    /// Ids of this subtree in pre-order.
    pub fn ids(&self) -> Vec<i32> {
        let mut ids = Vec::new();
        let mut stack = vec![self];
        while let Some(element) = stack.pop() {
            ids.push(element.id);
            stack.extend(element.children.iter().rev());
        }
        ids
    }
}

/// A bounds-checked cursor over a layout blob.
struct Decoder<'a> {
    buf: &'a [u8],
}

impl<'a> Decoder<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.buf.len() { return Err(Error::UnexpectedEnd); }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    fn i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    fn len(&mut self) -> Result<usize> {
        let n = self.i32()?;
        usize::try_from(n).map_err(|_| Error::NegativeLength(n))
    }

    fn str(&mut self) -> Result<String> {
        let len = self.len()?;
        let bytes = self.read_bytes(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| Error::InvalidUtf8)
    }

    fn property(&mut self) -> Result<Property> {
        let b = self.u8()?;
        let tag = PropertyTag::from_u8(b).ok_or(Error::InvalidTag(b))?;
        Ok(match tag {
            PropertyTag::Null => Property::Null,
            PropertyTag::Int32 => Property::Int32(self.i32()?),
            PropertyTag::Float32 => Property::Float32(f32::from_le_bytes(self.read_array()?)),
            PropertyTag::Float64 => Property::Float64(f64::from_le_bytes(self.read_array()?)),
            PropertyTag::Bool => Property::Bool(self.u8()? != 0),
            PropertyTag::Byte => Property::Byte(self.u8()?),
            PropertyTag::String => Property::String(self.str()?),
            PropertyTag::Struct => {
                let name = self.str()?;
                let size = self.len()?;
                let bytes = self.read_bytes(size)?.to_vec();
                Property::Struct { name, bytes }
            }
        })
    }

    fn element(&mut self, depth: usize) -> Result<Element> {
        if depth >= MAX_DEPTH { return Err(Error::TooDeep); }

        let id = self.i32()?;
        let control = self.str()?;

        // Counts are not trusted for preallocation; a short blob fails on read.
        let prop_count = self.len()?;
        let mut properties = Vec::new();
        for _ in 0..prop_count {
            properties.push(self.property()?);
        }

        let child_count = self.len()?;
        let mut children = Vec::new();
        for _ in 0..child_count {
            children.push(self.element(depth + 1)?);
        }

        Ok(Element { id, control, properties, children })
    }
}

/// What to do when an incoming element reuses a managed id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicateResolution {
    /// Fail with `DuplicateId`.
    #[default]
    Reject,
    /// Replace the managed element, forgetting its old descendants first.
    Replace,
}

/// A managed element: its own data plus the ids of its direct children.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub control: String,
    pub properties: Vec<Property>,
    pub children: Vec<i32>,
}

/// Every element the host currently manages, by id.
#[derive(Debug, Default)]
pub struct LayoutTree {
    elements: HashMap<i32, Node>,
}

impl LayoutTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes `blob` and registers every element in it.
    ///
    /// Returns the decoded root. On any error the tree is left unchanged.
    pub fn apply(&mut self, blob: &[u8], tactic: DuplicateResolution) -> Result<Element> {
        let root = Element::decode(blob)?;

        if tactic == DuplicateResolution::Reject {
            let mut seen = std::collections::HashSet::new();
            for id in root.ids() {
                if self.elements.contains_key(&id) || !seen.insert(id) {
                    return Err(Error::DuplicateId(id));
                }
            }
        }

        self.register(&root);
        Ok(root)
    }

    /// Pre-order, so a replaced element sheds its old subtree before its
    /// new children are registered. A child that already lived under some
    /// other parent is moved: only its new parent keeps listing it.
    fn register(&mut self, root: &Element) {
        let mut stack = vec![(root, None)];
        while let Some((element, parent)) = stack.pop() {
            if self.elements.contains_key(&element.id) {
                self.forget_descendants(element.id);
                if let Some(parent) = parent {
                    self.unlink(element.id, Some(parent));
                }
            }
            self.elements.insert(
                element.id,
                Node {
                    control: element.control.clone(),
                    properties: element.properties.clone(),
                    children: element.children.iter().map(|c| c.id).collect(),
                },
            );
            stack.extend(element.children.iter().rev().map(|c| (c, Some(element.id))));
        }
    }

    /// Drops `id` from every children list except `keep`'s.
    fn unlink(&mut self, id: i32, keep: Option<i32>) {
        for (owner, node) in self.elements.iter_mut() {
            if Some(*owner) != keep {
                node.children.retain(|child| *child != id);
            }
        }
    }

    fn forget_descendants(&mut self, id: i32) -> Vec<i32> {
        let mut removed = Vec::new();
        let mut stack = match self.elements.get(&id) {
            Some(node) => node.children.clone(),
            None => return removed,
        };
        while let Some(child) = stack.pop() {
            if child == id { continue; }
            if let Some(node) = self.elements.remove(&child) {
                removed.push(child);
                stack.extend(node.children);
            }
        }
        removed
    }

    /// Removes an element and its subtree. Returns every id that was dropped.
    pub fn remove(&mut self, id: i32) -> Vec<i32> {
        let mut removed = self.forget_descendants(id);
        if self.elements.remove(&id).is_some() {
            removed.insert(0, id);
        }
        self.unlink(id, None);
        removed
    }

    pub fn get(&self, id: i32) -> Option<&Node> {
        self.elements.get(&id)
    }

    pub fn contains(&self, id: i32) -> bool {
        self.elements.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Managed ids, ascending.
    pub fn ids(&self) -> Vec<i32> {
        let mut ids: Vec<_> = self.elements.keys().copied().collect();
        ids.sort();
        ids
    }
}
