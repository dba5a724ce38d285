//! Property Set Enumeration

use std::ops::Bound;

use tracing::trace;

use crate::enumerate::{Batched, Enumerator};
use crate::error::Result;
use crate::stats::PropertySetStatistics;
use crate::storage::SharedLayer;
use crate::tree::{FormatId, NameKey};

/// Lazy sequence of the property sets attached to a storage
pub type PropertySets = Batched<PropertySetEnumerator>;

/// Paged enumerator over the property sets of one storage, in format id order
pub struct PropertySetEnumerator {
    layer: SharedLayer,
    path: Vec<NameKey>,
    cursor: Option<FormatId>,
}

impl PropertySetEnumerator {
    pub(crate) fn new(layer: SharedLayer, path: Vec<NameKey>) -> Self {
        Self {
            layer,
            path,
            cursor: None,
        }
    }
}

impl Enumerator for PropertySetEnumerator {
    type Item = PropertySetStatistics;

    fn next_batch(&mut self, max_count: usize) -> Result<Vec<PropertySetStatistics>> {
        let layer = self.layer.lock();
        let node = layer.tree()?.descend(&self.path)?;

        let lower = match &self.cursor {
            Some(format_id) => Bound::Excluded(format_id),
            None => Bound::Unbounded,
        };
        let batch: Vec<PropertySetStatistics> = node
            .property_sets
            .range((lower, Bound::Unbounded))
            .take(max_count)
            .map(|(_, set)| PropertySetStatistics::of(set))
            .collect();

        if let Some(last) = batch.last() {
            self.cursor = Some(last.format_id());
        }
        trace!(count = batch.len(), "property set batch");
        Ok(batch)
    }

    fn reset(&mut self) {
        self.cursor = None;
    }
}
