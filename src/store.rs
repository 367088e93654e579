//! Bounded, concurrency-safe record retention.
//!
//! [`RecordStore`] keeps the most recent `capacity` entries in insertion order and evicts
//! the oldest first. Entries are reference counted, so [`RecordStore::snapshot`] copies
//! pointers under the lock and readers traverse the result without holding it.

use serde::{Serialize, Serializer};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Fixed-capacity FIFO store shared by every connection.
#[derive(Debug)]
pub struct RecordStore<T> {
    entries: Mutex<VecDeque<Arc<T>>>,
    capacity: usize,
}

impl<T> RecordStore<T> {
    /// Create an empty store. A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { entries: Mutex::new(VecDeque::with_capacity(capacity)), capacity }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Arc<T>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append an entry, evicting the oldest when full. Returns the shared entry.
    pub fn append(&self, entry: T) -> Arc<T> {
        let entry = Arc::new(entry);
        let mut entries = self.lock();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(Arc::clone(&entry));
        entry
    }

    /// Point-in-time copy of the retained entries, oldest first.
    pub fn snapshot(&self) -> Snapshot<T> {
        Snapshot { entries: self.lock().iter().cloned().collect() }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Immutable view of a [`RecordStore`] at one instant.
#[derive(Debug)]
pub struct Snapshot<T> {
    entries: Vec<Arc<T>>,
}

impl<T> Clone for Snapshot<T> {
    fn clone(&self) -> Self {
        Self { entries: self.entries.clone() }
    }
}

impl<T> Snapshot<T> {
    /// Entries in insertion order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.entries.iter().map(|entry| entry.as_ref())
    }

    /// Entries with the most recent first.
    pub fn newest_first(&self) -> impl Iterator<Item = &T> {
        self.iter().rev()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn first(&self) -> Option<&T> {
        self.entries.first().map(|entry| entry.as_ref())
    }

    pub fn last(&self) -> Option<&T> {
        self.entries.last().map(|entry| entry.as_ref())
    }
}

impl<T: Serialize> Serialize for Snapshot<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}
