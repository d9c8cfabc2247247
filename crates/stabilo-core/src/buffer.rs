//! Fixed-capacity circular buffer used for every streaming window.
//!
//! Storage is allocated once at construction; pushing into a full buffer
//! overwrites the oldest element.

/// Circular buffer with head/length indices over a boxed slice
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    storage: Box<[T]>,
    /// Next write position
    head: usize,
    len: usize,
}

impl<T: Copy + Default> RingBuffer<T> {
    /// Create a buffer holding at most `capacity` elements
    ///
    /// # Panics
    /// If `capacity` is zero.
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "Ring buffer capacity must be non-zero");
        Self {
            storage: vec![T::default(); capacity].into_boxed_slice(),
            head: 0,
            len: 0,
        }
    }

    /// Append a value, returning the evicted oldest value when full
    pub fn push(&mut self, value: T) -> Option<T> {
        let capacity = self.capacity();
        let evicted = if self.len == capacity {
            Some(self.storage[self.head])
        } else {
            self.len += 1;
            None
        };
        self.storage[self.head] = value;
        self.head = (self.head + 1) % capacity;
        evicted
    }

    pub fn extend_from_slice(&mut self, values: &[T]) {
        for &v in values {
            self.push(v);
        }
    }

    /// Element `index` positions after the oldest one
    pub fn get(&self, index: usize) -> Option<T> {
        if index >= self.len {
            return None;
        }
        Some(self.storage[(self.oldest_index() + index) % self.capacity()])
    }

    pub fn latest(&self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        Some(self.storage[(self.head + self.capacity() - 1) % self.capacity()])
    }

    pub fn oldest(&self) -> Option<T> {
        self.get(0)
    }

    /// Iterate from oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        let start = self.oldest_index();
        let capacity = self.capacity();
        (0..self.len).map(move |i| self.storage[(start + i) % capacity])
    }

    /// The `n` most recent elements, oldest first
    pub fn recent(&self, n: usize) -> Vec<T> {
        let skip = self.len.saturating_sub(n);
        self.iter().skip(skip).collect()
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.iter().collect()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Forget all elements without releasing storage
    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }

    fn oldest_index(&self) -> usize {
        (self.head + self.capacity() - self.len) % self.capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_and_wrap() {
        let mut buffer = RingBuffer::with_capacity(3);
        assert!(buffer.is_empty());

        assert_eq!(buffer.push(1), None);
        assert_eq!(buffer.push(2), None);
        assert_eq!(buffer.push(3), None);
        assert!(buffer.is_full());

        // Oldest element is evicted
        assert_eq!(buffer.push(4), Some(1));
        assert_eq!(buffer.to_vec(), vec![2, 3, 4]);
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.oldest(), Some(2));
        assert_eq!(buffer.latest(), Some(4));
    }

    #[test]
    fn test_recent_window() {
        let mut buffer = RingBuffer::with_capacity(5);
        buffer.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7]);

        assert_eq!(buffer.recent(2), vec![6, 7]);
        assert_eq!(buffer.recent(10), vec![3, 4, 5, 6, 7]);
        assert_eq!(buffer.get(0), Some(3));
        assert_eq!(buffer.get(5), None);
    }

    #[test]
    fn test_clear_keeps_capacity() {
        let mut buffer = RingBuffer::<f64>::with_capacity(4);
        buffer.extend_from_slice(&[1.0, 2.0]);
        buffer.clear();

        assert!(buffer.is_empty());
        assert_eq!(buffer.capacity(), 4);
        assert_eq!(buffer.latest(), None);
    }

    #[test]
    #[should_panic]
    fn test_zero_capacity_panics() {
        let _ = RingBuffer::<u8>::with_capacity(0);
    }
}
