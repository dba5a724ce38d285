//! Element Tree
//!
//! The in-memory model of a container: a tree of storages whose children
//! are either storages or streams, sharing one name space per directory.
//!
//! Nodes are plain values. Snapshots, transactions and deep copies are all
//! `Clone`; the committed tree is exactly what gets serialized into the
//! container payload.
//!
//! ```text
//! StorageNode ("Root Entry")
//!   ├── children: NameKey → Element
//!   │     ├── Storage(StorageNode "Orders")
//!   │     │     └── Stream(StreamNode "Invoice-1")
//!   │     └── Stream(StreamNode "Notes")
//!   └── property_sets: FormatId → PropertySetData
//! ```

mod name;
pub(crate) mod timestamp;

use std::collections::BTreeMap;
use std::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, StrataError};
use crate::mode::AccessMode;
use crate::property::PropertySetData;
use crate::stats::ElementStatistics;

pub use name::{validate_name, NameKey, MAX_NAME_LEN};

/// Name given to the root storage of every container
pub const ROOT_NAME: &str = "Root Entry";

/// 128-bit class identifier tag carried by storages and property sets
pub type ClassId = Uuid;

/// 128-bit identifier of a property set's schema
pub type FormatId = Uuid;

/// The two kinds of directory entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementKind {
    Storage,
    Stream,
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementKind::Storage => f.write_str("storage"),
            ElementKind::Stream => f.write_str("stream"),
        }
    }
}

/// Created / accessed / modified instants; `None` means unset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementTimes {
    #[serde(with = "timestamp::option")]
    pub created: Option<SystemTime>,
    #[serde(with = "timestamp::option")]
    pub accessed: Option<SystemTime>,
    #[serde(with = "timestamp::option")]
    pub modified: Option<SystemTime>,
}

impl ElementTimes {
    pub(crate) fn created_now() -> Self {
        let now = SystemTime::now();
        Self {
            created: Some(now),
            accessed: None,
            modified: Some(now),
        }
    }

    pub(crate) fn touch(&mut self) {
        self.modified = Some(SystemTime::now());
    }

    /// Apply each `Some` field, leaving `None` fields unchanged
    pub(crate) fn update(&mut self, changes: ElementTimes) {
        if let Some(t) = changes.created {
            self.created = Some(t);
        }
        if let Some(t) = changes.accessed {
            self.accessed = Some(t);
        }
        if let Some(t) = changes.modified {
            self.modified = Some(t);
        }
    }
}

/// A directory node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct StorageNode {
    pub name: String,
    pub class_id: ClassId,
    pub state_bits: u32,
    pub times: ElementTimes,
    pub children: BTreeMap<NameKey, Element>,
    pub property_sets: BTreeMap<FormatId, PropertySetData>,
}

/// A byte-content leaf
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct StreamNode {
    pub name: String,
    pub times: ElementTimes,
    pub data: Vec<u8>,
}

/// A child of a storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) enum Element {
    Storage(StorageNode),
    Stream(StreamNode),
}

impl StorageNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            class_id: Uuid::nil(),
            state_bits: 0,
            times: ElementTimes::created_now(),
            children: BTreeMap::new(),
            property_sets: BTreeMap::new(),
        }
    }

    /// Walk `path` down from this node; every step must name a storage
    pub fn descend(&self, path: &[NameKey]) -> Result<&StorageNode> {
        let mut node = self;
        for key in path {
            node = match node.children.get(key) {
                Some(Element::Storage(child)) => child,
                Some(Element::Stream(stream)) => {
                    return Err(wrong_kind(&stream.name, ElementKind::Storage))
                }
                None => return Err(StrataError::NotFound(format!("storage {}", key))),
            };
        }
        Ok(node)
    }

    pub fn descend_mut(&mut self, path: &[NameKey]) -> Result<&mut StorageNode> {
        let mut node = self;
        for key in path {
            node = match node.children.get_mut(key) {
                Some(Element::Storage(child)) => child,
                Some(Element::Stream(stream)) => {
                    return Err(wrong_kind(&stream.name, ElementKind::Storage))
                }
                None => return Err(StrataError::NotFound(format!("storage {}", key))),
            };
        }
        Ok(node)
    }

    pub fn element(&self, name: &str, key: &NameKey) -> Result<&Element> {
        self.children
            .get(key)
            .ok_or_else(|| StrataError::NotFound(format!("element {:?}", name)))
    }

    pub fn stream(&self, name: &str, key: &NameKey) -> Result<&StreamNode> {
        match self.element(name, key)? {
            Element::Stream(stream) => Ok(stream),
            Element::Storage(_) => Err(wrong_kind(name, ElementKind::Stream)),
        }
    }

    pub fn stream_mut(&mut self, name: &str, key: &NameKey) -> Result<&mut StreamNode> {
        match self.children.get_mut(key) {
            Some(Element::Stream(stream)) => Ok(stream),
            Some(Element::Storage(_)) => Err(wrong_kind(name, ElementKind::Stream)),
            None => Err(StrataError::NotFound(format!("stream {:?}", name))),
        }
    }

    pub fn property_set(&self, format_id: &FormatId) -> Result<&PropertySetData> {
        self.property_sets
            .get(format_id)
            .ok_or_else(|| StrataError::NotFound(format!("property set {}", format_id)))
    }

    pub fn property_set_mut(&mut self, format_id: &FormatId) -> Result<&mut PropertySetData> {
        self.property_sets
            .get_mut(format_id)
            .ok_or_else(|| StrataError::NotFound(format!("property set {}", format_id)))
    }

    /// Merge `source` into this node: class id, children and property sets
    /// are copied over, replacing same-named entries
    pub fn absorb(&mut self, source: &StorageNode) {
        self.class_id = source.class_id;
        for (key, element) in &source.children {
            self.children.insert(key.clone(), element.clone());
        }
        for (format_id, set) in &source.property_sets {
            self.property_sets.insert(*format_id, set.clone());
        }
        self.times.touch();
    }

    /// Number of elements in this subtree, this node excluded
    pub fn descendant_count(&self) -> usize {
        self.children
            .values()
            .map(|child| match child {
                Element::Storage(node) => 1 + node.descendant_count(),
                Element::Stream(_) => 1,
            })
            .sum()
    }
}

impl StreamNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            times: ElementTimes::created_now(),
            data: Vec::new(),
        }
    }
}

impl Element {
    pub fn name(&self) -> &str {
        match self {
            Element::Storage(node) => &node.name,
            Element::Stream(node) => &node.name,
        }
    }

    pub fn kind(&self) -> ElementKind {
        match self {
            Element::Storage(_) => ElementKind::Storage,
            Element::Stream(_) => ElementKind::Stream,
        }
    }

    pub fn rename(&mut self, name: &str) {
        match self {
            Element::Storage(node) => node.name = name.to_string(),
            Element::Stream(node) => node.name = name.to_string(),
        }
    }

    pub fn times_mut(&mut self) -> &mut ElementTimes {
        match self {
            Element::Storage(node) => &mut node.times,
            Element::Stream(node) => &mut node.times,
        }
    }

    /// Snapshot this entry's metadata
    pub fn stats(&self, mode: Option<AccessMode>) -> ElementStatistics {
        match self {
            Element::Storage(node) => ElementStatistics::of_storage(node, mode),
            Element::Stream(node) => ElementStatistics::of_stream(node, mode),
        }
    }
}

pub(crate) fn wrong_kind(name: &str, expected: ElementKind) -> StrataError {
    let found = match expected {
        ElementKind::Storage => ElementKind::Stream,
        ElementKind::Stream => ElementKind::Storage,
    };
    StrataError::WrongElementKind {
        name: name.to_string(),
        expected,
        found,
    }
}
