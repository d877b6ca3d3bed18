//! Bounded FIFO of batches awaiting acknowledgement.

use std::collections::VecDeque;

use crate::record::Record;

/// Records flushed together in one request. Never mutated after creation.
#[derive(Clone, Debug, PartialEq)]
pub struct Batch {
    records: Vec<Record>,
}

impl Batch {
    pub(crate) fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Overflow cache of undelivered batches.
///
/// Pushing never fails. Callers restore the capacity bound with
/// [`evict_overflow`](OverflowCache::evict_overflow), which discards from the
/// head so the oldest data is lost first.
#[derive(Debug)]
pub(crate) struct OverflowCache {
    batches: VecDeque<Batch>,
    capacity: usize,
}

impl OverflowCache {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            batches: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.batches.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    pub(crate) fn push_back(&mut self, batch: Batch) {
        self.batches.push_back(batch);
    }

    pub(crate) fn front(&self) -> Option<&Batch> {
        self.batches.front()
    }

    pub(crate) fn pop_front(&mut self) -> Option<Batch> {
        self.batches.pop_front()
    }

    /// Drop the oldest batches until the cache fits its capacity.
    ///
    /// Returns the evicted batches, oldest first.
    pub(crate) fn evict_overflow(&mut self) -> Vec<Batch> {
        let excess = self.batches.len().saturating_sub(self.capacity);
        self.batches.drain(..excess).collect()
    }
}
