//! A max-heap over keys `0..n` ordered by floating point activity, as used for VSIDS branching.
//!
//! Keys can be taken out of the heap (when their variable gets assigned) and put back (on
//! backtracking) while keeping their activity. Bumping uses an increment that grows
//! geometrically; once an activity exceeds [`RESCALE_THRESHOLD`] all activities and the increment
//! are scaled down together, which preserves the order.
use super::KeyedVec;
use super::StorageKey;
use crate::stationpack_assert_moderate;

const RESCALE_THRESHOLD: f64 = 1e100;

#[derive(Debug)]
pub(crate) struct ActivityHeap<Key> {
    activities: KeyedVec<Key, f64>,
    /// `positions[key]` is the index of `key` in `heap`; keys at index `>= size` are removed.
    positions: KeyedVec<Key, usize>,
    heap: Vec<Key>,
    size: usize,
    increment: f64,
    decay: f64,
}

impl<Key: StorageKey> ActivityHeap<Key> {
    /// `decay` is the factor in `(0, 1]` by which older bumps lose weight after every conflict.
    pub(crate) fn new(decay: f64) -> Self {
        ActivityHeap {
            activities: KeyedVec::default(),
            positions: KeyedVec::default(),
            heap: Vec::new(),
            size: 0,
            increment: 1.0,
            decay,
        }
    }

    /// Adds a new key, which must be the next unused index, with the given initial activity.
    pub(crate) fn grow(&mut self, key: Key, activity: f64) {
        stationpack_assert_moderate!(key.index() == self.heap.len());

        let _ = self.activities.push(activity);
        let _ = self.positions.push(self.heap.len());
        self.heap.push(key);

        let last = self.heap.len() - 1;
        self.swap(self.size, last);
        self.size += 1;
        self.sift_up(self.size - 1);
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub(crate) fn contains(&self, key: Key) -> bool {
        self.positions[key] < self.size
    }

    pub(crate) fn pop_max(&mut self) -> Option<Key> {
        if self.is_empty() {
            return None;
        }

        let best = self.heap[0];
        self.remove(best);
        Some(best)
    }

    /// Temporarily removes `key`; its activity is kept for when it is restored.
    pub(crate) fn remove(&mut self, key: Key) {
        if !self.contains(key) {
            return;
        }

        let position = self.positions[key];
        self.swap(position, self.size - 1);
        self.size -= 1;
        if position < self.size {
            self.sift_down(position);
            self.sift_up(position);
        }
    }

    pub(crate) fn restore(&mut self, key: Key) {
        if self.contains(key) {
            return;
        }

        let position = self.positions[key];
        self.swap(position, self.size);
        self.size += 1;
        self.sift_up(self.size - 1);
    }

    /// Bumps the activity of `key` by the current increment.
    pub(crate) fn bump(&mut self, key: Key) {
        self.activities[key] += self.increment;

        if self.activities[key] > RESCALE_THRESHOLD {
            for key in self.activities.keys().collect::<Vec<_>>() {
                self.activities[key] /= RESCALE_THRESHOLD;
            }
            self.increment /= RESCALE_THRESHOLD;
        }

        if self.contains(key) {
            self.sift_up(self.positions[key]);
        }
    }

    /// Makes all past bumps relatively less important than future ones.
    pub(crate) fn decay(&mut self) {
        self.increment /= self.decay;
    }

    fn swap(&mut self, a: usize, b: usize) {
        let key_a = self.heap[a];
        let key_b = self.heap[b];
        self.heap.swap(a, b);
        self.positions[key_a] = b;
        self.positions[key_b] = a;
    }

    fn value_at(&self, position: usize) -> f64 {
        self.activities[self.heap[position]]
    }

    fn sift_up(&mut self, mut position: usize) {
        while position > 0 {
            let parent = (position - 1) / 2;
            if self.value_at(parent) >= self.value_at(position) {
                break;
            }
            self.swap(parent, position);
            position = parent;
        }
    }

    fn sift_down(&mut self, mut position: usize) {
        loop {
            let left = 2 * position + 1;
            let right = left + 1;
            let mut largest = position;

            if left < self.size && self.value_at(left) > self.value_at(largest) {
                largest = left;
            }
            if right < self.size && self.value_at(right) > self.value_at(largest) {
                largest = right;
            }
            if largest == position {
                break;
            }

            self.swap(position, largest);
            position = largest;
        }
    }
}
