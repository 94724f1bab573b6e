//! Bounded write buffer used to group records into batch flushes.

/// A fixed-capacity buffer that is drained into a writer whenever it fills up.
///
/// The allocation is reused across flushes, so peak memory is bounded by `capacity` items no
/// matter how many items pass through.
#[derive(Debug)]
pub struct BatchBuffer<T> {
    items: Vec<T>,
    capacity: usize,
}

impl<T> BatchBuffer<T> {
    /// Create an empty buffer holding at most `capacity` items.
    ///
    /// # Panics
    ///
    /// Panics if `capacity == 0`.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "batch capacity must be > 0");
        Self {
            items: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an item. Returns `true` if the buffer is now full and should be flushed.
    pub fn push(&mut self, item: T) -> bool {
        debug_assert!(!self.is_full(), "push into a full batch buffer");
        self.items.push(item);
        self.is_full()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
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

    /// Buffered items, oldest first.
    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    /// Hand the buffered items to `write` as one batch, then clear the buffer.
    ///
    /// The buffer is cleared whether or not `write` succeeds; on failure the buffered items are
    /// dropped. Returns the number of items written. Flushing an empty buffer does not call
    /// `write` and returns `Ok(0)`.
    pub fn flush_with<E, F>(&mut self, write: F) -> Result<usize, E>
    where
        F: FnOnce(&[T]) -> Result<(), E>,
    {
        if self.items.is_empty() {
            return Ok(0);
        }
        let n = self.items.len();
        let result = write(&self.items);
        self.items.clear();
        result.map(|()| n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_reports_full_at_capacity() {
        let mut buf = BatchBuffer::new(3);
        assert!(!buf.push(1));
        assert!(!buf.push(2));
        assert!(buf.push(3));
        assert!(buf.is_full());
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn flush_clears_and_returns_len() {
        let mut buf = BatchBuffer::new(2);
        buf.push("a");
        buf.push("b");

        let mut seen = Vec::new();
        let n = buf
            .flush_with(|items| {
                seen.extend_from_slice(items);
                Ok::<(), ()>(())
            })
            .unwrap();

        assert_eq!(n, 2);
        assert_eq!(seen, vec!["a", "b"]);
        assert!(buf.is_empty());
        assert_eq!(buf.capacity(), 2);
    }

    #[test]
    fn flush_of_empty_buffer_skips_writer() {
        let mut buf: BatchBuffer<u8> = BatchBuffer::new(4);
        let n = buf
            .flush_with(|_| -> Result<(), ()> { panic!("writer must not run") })
            .unwrap();
        assert_eq!(n, 0);
    }

    #[test]
    fn failed_flush_drops_buffered_items() {
        let mut buf = BatchBuffer::new(4);
        buf.push(1);
        buf.push(2);

        let err = buf.flush_with(|_| Err("disk full")).unwrap_err();
        assert_eq!(err, "disk full");
        assert!(buf.is_empty());
    }

    #[test]
    #[should_panic(expected = "batch capacity must be > 0")]
    fn zero_capacity_panics() {
        let _ = BatchBuffer::<u8>::new(0);
    }
}
