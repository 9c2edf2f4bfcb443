use std::collections::VecDeque;
use std::sync::Mutex;

/// A small locking queue of byte chunks. The channel read loop pushes chunks in from its thread
/// while session operations pop them out, so all access goes through the internal mutex.
pub struct ByteQueue {
    chunks: Mutex<VecDeque<Vec<u8>>>,
}

impl Default for ByteQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl ByteQueue {
    /// Return an initialized, empty `ByteQueue`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            chunks: Mutex::new(VecDeque::new()),
        }
    }

    /// Push a chunk to the *front* of the queue -- used to hand back bytes that were read during
    /// authentication but belong to the session proper.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[allow(clippy::expect_used)]
    pub fn push_front(
        &self,
        b: Vec<u8>,
    ) {
        self.chunks
            .lock()
            .expect("byte queue lock poisoned")
            .push_front(b);
    }

    /// Push a chunk to the back of the queue.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[allow(clippy::expect_used)]
    pub fn push(
        &self,
        b: Vec<u8>,
    ) {
        self.chunks
            .lock()
            .expect("byte queue lock poisoned")
            .push_back(b);
    }

    /// Pop the oldest chunk, or an empty vec when the queue is empty.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[allow(clippy::expect_used)]
    pub fn pop(&self) -> Vec<u8> {
        self.chunks
            .lock()
            .expect("byte queue lock poisoned")
            .pop_front()
            .unwrap_or_default()
    }

    /// Returns the current number of queued chunks.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[allow(clippy::expect_used)]
    pub fn depth(&self) -> usize {
        self.chunks.lock().expect("byte queue lock poisoned").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_order() {
        let q = ByteQueue::new();
        q.push(b"one".to_vec());
        q.push(b"two".to_vec());

        assert_eq!(q.depth(), 2);
        assert_eq!(q.pop(), b"one".to_vec());
        assert_eq!(q.pop(), b"two".to_vec());
        assert_eq!(q.pop(), Vec::<u8>::new());
    }

    #[test]
    fn push_front_jumps_the_line() {
        let q = ByteQueue::new();
        q.push(b"later".to_vec());
        q.push_front(b"first".to_vec());

        assert_eq!(q.pop(), b"first".to_vec());
    }
}
