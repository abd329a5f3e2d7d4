//! Priority queue for scheduled tasks.

use std::mem;

/// A binary min-heap keyed by a totally ordered, unique key.
///
/// The scheduler keys every entry by `(target tick, sequence number)`, and
/// sequence numbers are unique across the clock's lifetime, so no two entries
/// ever compare equal: the pop order is fully determined by the keys alone.
///
/// Only insertion and removal-of-minimum are supported. Cancellation of a
/// scheduled task does not remove its entry from the heap; the entry carries
/// a cancelled flag that the drain loop checks when the entry is popped in
/// its natural order. This trades a little queue residency for O(1)
/// cancellation, a good fit for a tick-bounded simulation where tasks are
/// rarely scheduled far into the future.
pub(crate) struct PriorityQueue<K, V>
where
    K: Copy + Ord,
{
    heap: Vec<(K, V)>,
}

impl<K: Copy + Ord, V> PriorityQueue<K, V> {
    /// Creates an empty `PriorityQueue`.
    pub(crate) fn new() -> Self {
        Self { heap: Vec::new() }
    }

    /// Returns the number of entries in the queue.
    #[allow(unused)]
    pub(crate) fn len(&self) -> usize {
        self.heap.len()
    }

    /// Whether the queue holds no entries.
    pub(crate) fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Inserts a new key-value pair.
    ///
    /// This operation has *O*(log(*N*)) worst-case theoretical complexity.
    pub(crate) fn insert(&mut self, key: K, value: V) {
        self.heap.push((key, value));
        self.sift_up(self.heap.len() - 1);
    }

    /// Removes and returns the entry with the smallest key.
    ///
    /// This operation has *O*(log(*N*)) theoretical complexity.
    pub(crate) fn pull(&mut self) -> Option<(K, V)> {
        let last = self.heap.pop()?;
        if self.heap.is_empty() {
            return Some(last);
        }

        let top = mem::replace(&mut self.heap[0], last);
        self.sift_down(0);

        Some(top)
    }

    /// Returns a reference to the smallest key, leaving its entry in the
    /// queue.
    pub(crate) fn peek_key(&self) -> Option<&K> {
        self.heap.first().map(|(key, _)| key)
    }

    /// Starting at `idx`, moves the entry up the heap while its parent has a
    /// larger key.
    fn sift_up(&mut self, mut idx: usize) {
        while idx != 0 {
            let parent = (idx - 1) / 2;
            if self.heap[parent].0 <= self.heap[idx].0 {
                break;
            }

            self.heap.swap(parent, idx);
            idx = parent;
        }
    }

    /// Starting at `idx`, moves the entry down the heap while a child has a
    /// smaller key.
    fn sift_down(&mut self, mut idx: usize) {
        loop {
            let mut child = 2 * idx + 1;
            if child >= self.heap.len() {
                break;
            }

            // Prefer the sibling when it carries the smaller key.
            if child + 1 < self.heap.len() && self.heap[child + 1].0 < self.heap[child].0 {
                child += 1;
            }

            if self.heap[idx].0 <= self.heap[child].0 {
                break;
            }

            self.heap.swap(idx, child);
            idx = child;
        }
    }
}
