//! Element Enumeration
//!
//! Walks the children of one storage in name-key order.

use std::ops::Bound;

use tracing::trace;

use crate::enumerate::{Batched, Enumerator};
use crate::error::Result;
use crate::stats::ElementStatistics;
use crate::tree::NameKey;

use super::SharedLayer;

/// Lazy sequence of a storage's children
pub type Elements = Batched<ElementEnumerator>;

/// Paged enumerator over the children of a storage
///
/// Reads the live working view of the storage at each batch; the cursor is
/// the last key handed out.
pub struct ElementEnumerator {
    layer: SharedLayer,
    path: Vec<NameKey>,
    cursor: Option<NameKey>,
}

impl ElementEnumerator {
    pub(crate) fn new(layer: SharedLayer, path: Vec<NameKey>) -> Self {
        Self {
            layer,
            path,
            cursor: None,
        }
    }
}

impl Enumerator for ElementEnumerator {
    type Item = ElementStatistics;

    fn next_batch(&mut self, max_count: usize) -> Result<Vec<ElementStatistics>> {
        let layer = self.layer.lock();
        let node = layer.tree()?.descend(&self.path)?;

        let lower = match &self.cursor {
            Some(key) => Bound::Excluded(key),
            None => Bound::Unbounded,
        };
        let batch: Vec<(NameKey, ElementStatistics)> = node
            .children
            .range((lower, Bound::Unbounded))
            .take(max_count)
            .map(|(key, element)| (key.clone(), element.stats(None)))
            .collect();

        if let Some((last, _)) = batch.last() {
            self.cursor = Some(last.clone());
        }
        trace!(count = batch.len(), "element batch");
        Ok(batch.into_iter().map(|(_, stats)| stats).collect())
    }

    fn reset(&mut self) {
        self.cursor = None;
    }
}

impl std::fmt::Debug for ElementEnumerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElementEnumerator")
            .field("path", &self.path)
            .field("cursor", &self.cursor)
            .finish()
    }
}
