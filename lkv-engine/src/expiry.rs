//! # Expiry Index
//!
//! A binary min-heap of `(key, deadline)` records ordered by deadline, paired
//! with a key-to-heap-index table so an arbitrary record can be removed in
//! O(log n). Positional removal is what makes EXPIRE re-arming cheap; a plain
//! priority queue would only expose the root.
//!
//! Deadlines are wall-clock (`SystemTime`) so a snapshot carries absolute
//! instants across process restarts.
//!
//! Invariants, holding between calls:
//! - every position entry points at a heap slot holding its own key;
//! - every heap slot is indexed by exactly one position entry;
//! - the heap satisfies the min-heap property on deadline;
//! - a key has at most one record (arming again replaces the old record).

use std::time::SystemTime;

use ahash::RandomState;
use serde::{Deserialize, Serialize};

type Positions = hashbrown::HashMap<String, usize, RandomState>;

/// A pending expiration: the key and the absolute instant it lapses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpiryRecord {
    pub key: String,
    pub deadline: SystemTime,
}

/// Min-heap of expiry records with positional cancellation.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ExpiryIndex {
    heap: Vec<ExpiryRecord>,
    positions: Positions,
}

impl ExpiryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Returns the armed deadline for a key, if any.
    pub fn deadline_of(&self, key: &str) -> Option<SystemTime> {
        self.positions.get(key).map(|&idx| self.heap[idx].deadline)
    }

    /// Arms (or re-arms) an expiration for `key` at `deadline`.
    ///
    /// An existing record for the key is replaced, never duplicated.
    pub fn arm(&mut self, key: &str, deadline: SystemTime) {
        if let Some(&idx) = self.positions.get(key) {
            self.remove_at(idx);
        }
        self.heap.push(ExpiryRecord {
            key: key.to_string(),
            deadline,
        });
        let idx = self.heap.len() - 1;
        self.positions.insert(key.to_string(), idx);
        self.sift_up(idx);
    }

    /// Cancels the expiration for `key`. Returns false if none was armed.
    pub fn cancel(&mut self, key: &str) -> bool {
        match self.positions.get(key) {
            Some(&idx) => {
                self.remove_at(idx);
                true
            }
            None => false,
        }
    }

    /// Pops the earliest record if its deadline is at or before `now`.
    pub fn pop_due(&mut self, now: SystemTime) -> Option<ExpiryRecord> {
        if self.heap.first()?.deadline > now {
            return None;
        }
        Some(self.remove_at(0))
    }

    /// Removes the record at `idx`, restoring heap order for the element
    /// swapped into the freed slot.
    fn remove_at(&mut self, idx: usize) -> ExpiryRecord {
        let record = self.heap.swap_remove(idx);
        self.positions.remove(&record.key);
        if idx < self.heap.len() {
            self.positions.insert(self.heap[idx].key.clone(), idx);
            // The moved element may violate order in either direction.
            self.sift_down(idx);
            self.sift_up(idx);
        }
        record
    }

    fn sift_up(&mut self, mut idx: usize) {
        while idx > 0 {
            let parent = (idx - 1) / 2;
            if self.heap[idx].deadline >= self.heap[parent].deadline {
                break;
            }
            self.swap_entries(idx, parent);
            idx = parent;
        }
    }

    fn sift_down(&mut self, mut idx: usize) {
        loop {
            let left = 2 * idx + 1;
            if left >= self.heap.len() {
                break;
            }
            let mut child = left;
            let right = left + 1;
            if right < self.heap.len() && self.heap[right].deadline < self.heap[left].deadline {
                child = right;
            }
            if self.heap[idx].deadline <= self.heap[child].deadline {
                break;
            }
            self.swap_entries(idx, child);
            idx = child;
        }
    }

    fn swap_entries(&mut self, a: usize, b: usize) {
        self.heap.swap(a, b);
        self.positions.insert(self.heap[a].key.clone(), a);
        self.positions.insert(self.heap[b].key.clone(), b);
    }
}
