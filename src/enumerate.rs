//! Paged Enumeration
//!
//! Enumerators hand out snapshots in batches and remember where they
//! stopped by key, not by index. Elements added or removed between batches
//! never make an enumerator fail: keys after the cursor that still exist are
//! returned, in order, exactly once.

use std::collections::VecDeque;

use crate::error::Result;

/// A resumable, restartable source of snapshot batches
pub trait Enumerator {
    type Item;

    /// Up to `max_count` further items; an empty batch means exhausted
    fn next_batch(&mut self, max_count: usize) -> Result<Vec<Self::Item>>;

    /// Skip up to `count` items, returning how many were skipped
    fn skip(&mut self, count: usize) -> Result<usize> {
        Ok(self.next_batch(count)?.len())
    }

    /// Restart from the first item
    fn reset(&mut self);
}

/// Lazy iterator over an [`Enumerator`], fetching one batch at a time
///
/// A failed fetch is yielded once and ends the sequence.
pub struct Batched<E: Enumerator> {
    enumerator: E,
    buffer: VecDeque<E::Item>,
    batch_size: usize,
    done: bool,
}

impl<E: Enumerator> Batched<E> {
    pub(crate) fn new(enumerator: E, batch_size: usize) -> Self {
        Self {
            enumerator,
            buffer: VecDeque::new(),
            batch_size: batch_size.max(1),
            done: false,
        }
    }

    /// Start over from the first item
    pub fn restart(&mut self) {
        self.enumerator.reset();
        self.buffer.clear();
        self.done = false;
    }

    pub fn into_inner(self) -> E {
        self.enumerator
    }
}

impl<E: Enumerator> Iterator for Batched<E> {
    type Item = Result<E::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.buffer.pop_front() {
                return Some(Ok(item));
            }
            if self.done {
                return None;
            }
            match self.enumerator.next_batch(self.batch_size) {
                Ok(batch) if batch.is_empty() => self.done = true,
                Ok(batch) => self.buffer.extend(batch),
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}
