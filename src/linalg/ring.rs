/// Fixed-capacity history ring with overwrite-oldest semantics
///
/// Entry `k` (counting every push since creation) lives in slot `k mod capacity`.
/// Once full, each push silently replaces the oldest entry. Iteration order
/// over [`HistoryRing::window`] is slot order, not chronological order, which
/// is all that order-independent consumers (Anderson mixing) need.
#[derive(Debug, Clone)]
pub struct HistoryRing<T> {
    capacity: usize,
    slots: Vec<T>,
    pushed: usize,
}

impl<T> HistoryRing<T> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "history capacity must be positive");
        Self {
            capacity,
            slots: Vec::with_capacity(capacity),
            pushed: 0,
        }
    }

    /// Store `value` at slot `index mod capacity`
    ///
    /// `index` must be the next push index, i.e. [`HistoryRing::pushed`].
    pub fn store(&mut self, index: usize, value: T) {
        debug_assert_eq!(index, self.pushed, "history entries must be stored in order");
        let slot = index % self.capacity;
        if slot < self.slots.len() {
            self.slots[slot] = value;
        } else {
            self.slots.push(value);
        }
        self.pushed = index + 1;
    }

    /// Append the next entry
    pub fn push(&mut self, value: T) {
        let index = self.pushed;
        self.store(index, value);
    }

    /// Occupied slots (at most `capacity`), in slot order
    pub fn window(&self) -> &[T] {
        &self.slots
    }

    /// Most recently stored entry
    pub fn latest(&self) -> Option<&T> {
        if self.pushed == 0 {
            None
        } else {
            self.slots.get((self.pushed - 1) % self.capacity)
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total number of entries ever stored
    pub fn pushed(&self) -> usize {
        self.pushed
    }
}
