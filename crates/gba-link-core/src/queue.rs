use crate::settings::LINK_NO_DATA;

/// Fixed-capacity FIFO of 16-bit link messages.
///
/// Storage is allocated once in [`MessageQueue::new`] and never grows. This
/// queue is *lossy* when full: a push evicts the oldest message to make room.
#[derive(Clone, Debug)]
pub struct MessageQueue {
    buf: Box<[u16]>,
    head: usize,
    len: usize,
}

impl MessageQueue {
    /// Creates a queue holding up to `capacity` messages (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buf: vec![LINK_NO_DATA; capacity].into_boxed_slice(),
            head: 0,
            len: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    #[inline]
    fn wrap(&self, idx: usize) -> usize {
        if idx >= self.capacity() {
            idx - self.capacity()
        } else {
            idx
        }
    }

    /// Appends `value`. When full, the oldest message is dropped first.
    pub fn push(&mut self, value: u16) {
        if self.is_full() {
            // Full: drop oldest.
            self.head = self.wrap(self.head + 1);
            self.len -= 1;
        }
        let tail = self.wrap(self.head + self.len);
        self.buf[tail] = value;
        self.len += 1;
    }

    /// Removes and returns the oldest message, or [`LINK_NO_DATA`] when empty.
    pub fn pop(&mut self) -> u16 {
        if self.is_empty() {
            return LINK_NO_DATA;
        }
        let value = self.buf[self.head];
        self.head = self.wrap(self.head + 1);
        self.len -= 1;
        value
    }

    #[inline]
    pub fn peek(&self) -> Option<u16> {
        if self.is_empty() {
            None
        } else {
            Some(self.buf[self.head])
        }
    }

    pub fn clear(&mut self) {
        while !self.is_empty() {
            self.pop();
        }
        self.head = 0;
    }
}
