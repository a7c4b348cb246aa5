//! Fixed-capacity pool that keeps the newest edits offered to it.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use crate::models::EditRecord;

/// Orders edits by timestamp, then wiki id, then revision id.
#[derive(Debug)]
struct Ranked(EditRecord);

impl Ranked {
    fn key(&self) -> (chrono::DateTime<chrono::Utc>, &str, u64) {
        (self.0.timestamp, self.0.system_id.as_str(), self.0.revision_id)
    }
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Ranked {}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

/// Holds at most `capacity` edits. Once full, a newer edit evicts the oldest one held.
#[derive(Debug)]
pub struct EditCollector {
    capacity: usize,
    // Min-heap: the oldest retained edit sits on top
    heap: BinaryHeap<Reverse<Ranked>>,
}

impl EditCollector {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            heap: BinaryHeap::with_capacity(capacity.saturating_add(1)),
        }
    }

    pub fn is_full(&self) -> bool {
        self.heap.len() >= self.capacity
    }

    /// Offer an edit; returns whether it is retained.
    pub fn offer(&mut self, edit: EditRecord) -> bool {
        if self.capacity == 0 {
            return false;
        }
        let candidate = Ranked(edit);
        if !self.is_full() {
            self.heap.push(Reverse(candidate));
            return true;
        }
        match self.heap.peek() {
            Some(Reverse(oldest)) if candidate > *oldest => {
                self.heap.pop();
                self.heap.push(Reverse(candidate));
                true
            }
            _ => false,
        }
    }

    /// Retained edits, newest first, never more than `capacity`.
    pub fn into_sorted(self) -> Vec<EditRecord> {
        let capacity = self.capacity;
        // Ascending in `Reverse` order is descending by timestamp
        let mut edits: Vec<EditRecord> = self
            .heap
            .into_sorted_vec()
            .into_iter()
            .map(|Reverse(ranked)| ranked.0)
            .collect();
        edits.truncate(capacity);
        edits
    }
}
