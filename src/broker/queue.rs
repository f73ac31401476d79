use parking_lot::Mutex;
use std::collections::VecDeque;

/// The broker's single FIFO queue of opaque tokens.
///
/// Push and pop each hold the lock for their whole duration, so the
/// emptiness check and the removal in `pop` can never interleave with
/// another connection. The lock is never held across an await point.
#[derive(Debug, Default)]
pub struct MessageQueue {
    tokens: Mutex<VecDeque<String>>,
}

impl MessageQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a token to the tail
    pub fn push(&self, token: String) {
        self.tokens.lock().push_back(token);
    }

    /// Remove and return the head token, or `None` if the queue is empty.
    ///
    /// Never waits for a token to arrive.
    pub fn pop(&self) -> Option<String> {
        self.tokens.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.tokens.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.lock().is_empty()
    }
}
