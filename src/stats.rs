//! Statistics Snapshots
//!
//! Immutable records produced by enumeration and by `stat()` calls. A
//! snapshot never refreshes itself; fetch a new one to observe live state.

use std::time::SystemTime;

use crate::mode::AccessMode;
use crate::property::{PropertyKey, PropertySetData, PropertySetFlags, ValueKind};
use crate::tree::{ClassId, ElementKind, ElementTimes, FormatId, StorageNode, StreamNode};

/// Snapshot of one directory entry
#[derive(Debug, Clone, PartialEq)]
pub struct ElementStatistics {
    name: String,
    kind: ElementKind,
    size: u64,
    class_id: ClassId,
    state_bits: u32,
    times: ElementTimes,
    mode: Option<AccessMode>,
}

impl ElementStatistics {
    pub(crate) fn of_storage(node: &StorageNode, mode: Option<AccessMode>) -> Self {
        Self {
            name: node.name.clone(),
            kind: ElementKind::Storage,
            size: 0,
            class_id: node.class_id,
            state_bits: node.state_bits,
            times: node.times,
            mode,
        }
    }

    pub(crate) fn of_stream(node: &StreamNode, mode: Option<AccessMode>) -> Self {
        Self {
            name: node.name.clone(),
            kind: ElementKind::Stream,
            size: node.data.len() as u64,
            class_id: ClassId::nil(),
            state_bits: 0,
            times: node.times,
            mode,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    pub fn is_storage(&self) -> bool {
        self.kind == ElementKind::Storage
    }

    pub fn is_stream(&self) -> bool {
        self.kind == ElementKind::Stream
    }

    /// Content length in bytes; always 0 for storages
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn class_id(&self) -> ClassId {
        self.class_id
    }

    pub fn state_bits(&self) -> u32 {
        self.state_bits
    }

    pub fn created(&self) -> Option<SystemTime> {
        self.times.created
    }

    pub fn accessed(&self) -> Option<SystemTime> {
        self.times.accessed
    }

    pub fn modified(&self) -> Option<SystemTime> {
        self.times.modified
    }

    /// Mode of the handle the snapshot was taken through; `None` for
    /// entries produced by enumeration
    pub fn mode(&self) -> Option<AccessMode> {
        self.mode
    }
}

/// Snapshot of one property set attached to a storage
#[derive(Debug, Clone, PartialEq)]
pub struct PropertySetStatistics {
    format_id: FormatId,
    class_id: ClassId,
    flags: PropertySetFlags,
    times: ElementTimes,
    property_count: usize,
}

impl PropertySetStatistics {
    pub(crate) fn of(set: &PropertySetData) -> Self {
        Self {
            format_id: set.format_id,
            class_id: set.class_id,
            flags: set.flags,
            times: set.times,
            property_count: set.len(),
        }
    }

    pub fn format_id(&self) -> FormatId {
        self.format_id
    }

    pub fn class_id(&self) -> ClassId {
        self.class_id
    }

    pub fn flags(&self) -> PropertySetFlags {
        self.flags
    }

    pub fn created(&self) -> Option<SystemTime> {
        self.times.created
    }

    pub fn accessed(&self) -> Option<SystemTime> {
        self.times.accessed
    }

    pub fn modified(&self) -> Option<SystemTime> {
        self.times.modified
    }

    pub fn property_count(&self) -> usize {
        self.property_count
    }
}

/// Key and type tag of one property
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyStatistics {
    pub key: PropertyKey,
    pub kind: ValueKind,
}
