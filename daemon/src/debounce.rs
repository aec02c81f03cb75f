use std::collections::VecDeque;

use crate::config::{MAX_DEBOUNCE_DEPTH, MIN_DEBOUNCE_DEPTH};
use crate::phase::Phase;

/// Sliding window of the most recent raw phase observations.
///
/// Holds at most `capacity` labels (the debounce depth, clamped to
/// [`MIN_DEBOUNCE_DEPTH`]–[`MAX_DEBOUNCE_DEPTH`]).  When full, the oldest
/// observation is evicted to make room for the newest.
#[derive(Debug)]
pub struct DetectionWindow {
    labels: VecDeque<Phase>,
    capacity: usize,
}

impl DetectionWindow {
    pub fn new(depth: usize) -> Self {
        let capacity = depth.clamp(MIN_DEBOUNCE_DEPTH, MAX_DEBOUNCE_DEPTH);
        Self {
            labels: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends an observation, evicting the oldest if the window is at capacity.
    pub fn push(&mut self, label: Phase) {
        if self.labels.len() == self.capacity {
            self.labels.pop_front();
        }
        self.labels.push_back(label);
    }

    /// The label shared by every entry, once the window is full and unanimous.
    pub fn stable(&self) -> Option<&Phase> {
        if self.labels.len() < self.capacity {
            return None;
        }
        let first = self.labels.front()?;
        self.labels.iter().all(|l| l == first).then_some(first)
    }

    pub fn clear(&mut self) {
        self.labels.clear();
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
