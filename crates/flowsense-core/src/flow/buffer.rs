//! Bounded event buffers.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// A typing-pattern sample: either an accepted keystroke or an inactivity
/// marker recorded while the session was not running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingPattern {
    pub timestamp_ms: i64,
    pub is_keystroke: bool,
    pub file: Option<String>,
}

/// A change of the file being worked on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    pub timestamp_ms: i64,
    pub file: String,
}

/// Sample with a millisecond timestamp.
pub trait Timestamped {
    fn timestamp_ms(&self) -> i64;
}

impl Timestamped for TypingPattern {
    fn timestamp_ms(&self) -> i64 {
        self.timestamp_ms
    }
}

impl Timestamped for FileChange {
    fn timestamp_ms(&self) -> i64 {
        self.timestamp_ms
    }
}

/// FIFO buffer keeping only the most recent `capacity` entries.
#[derive(Debug, Clone)]
pub struct BoundedBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> BoundedBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append, evicting the oldest entries past capacity.
    pub fn push(&mut self, item: T) {
        self.items.push_back(item);
        while self.items.len() > self.capacity {
            self.items.pop_front();
        }
    }

    pub fn last(&self) -> Option<&T> {
        self.items.back()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}

impl<T: Timestamped> BoundedBuffer<T> {
    /// Entries with `from_ms <= timestamp <= to_ms`, oldest first.
    pub fn within(&self, from_ms: i64, to_ms: i64) -> impl Iterator<Item = &T> {
        self.items.iter().filter(move |item| {
            let ts = item.timestamp_ms();
            ts >= from_ms && ts <= to_ms
        })
    }
}
