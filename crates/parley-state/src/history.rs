//! Bounded message history.
//!
//! A FIFO ring: once full, every push evicts the oldest message regardless of
//! how recently it was read or edited.

use std::collections::VecDeque;

use parley_core::Message;

/// Capacity used when none is configured or the configured one is too small.
pub const DEFAULT_CAPACITY: usize = 5000;

/// Smallest capacity honoured as configured.
pub const MIN_CAPACITY: usize = 100;

/// Resolve a configured capacity to the one actually used.
pub fn effective_capacity(configured: Option<usize>) -> usize {
    match configured {
        Some(n) if n >= MIN_CAPACITY => n,
        _ => DEFAULT_CAPACITY,
    }
}

/// Capacity-bounded, insertion-ordered message store.
#[derive(Clone, Debug)]
pub struct MessageHistory {
    messages: VecDeque<Message>,
    capacity: usize,
}

impl MessageHistory {
    /// Create a history; see [`effective_capacity`] for how `configured` is
    /// interpreted.
    pub fn new(configured: Option<usize>) -> Self {
        let capacity = effective_capacity(configured);
        Self {
            messages: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Append a message, returning the evicted one if the ring was full.
    pub fn push(&mut self, message: Message) -> Option<Message> {
        let evicted = if self.messages.len() >= self.capacity {
            self.messages.pop_front()
        } else {
            None
        };
        self.messages.push_back(message);
        evicted
    }

    /// Remove a message by id.
    pub fn remove(&mut self, message_id: &str) -> Option<Message> {
        let idx = self.messages.iter().position(|m| m.id == message_id)?;
        self.messages.remove(idx)
    }

    /// Find a message by id.
    pub fn get(&self, message_id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == message_id)
    }

    /// Find a message by id for mutation.
    pub fn find_mut(&mut self, message_id: &str) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == message_id)
    }

    /// Oldest-first iteration.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Message> + ExactSizeIterator {
        self.messages.iter()
    }

    /// Number of stored messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether no message is stored.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Maximum number of stored messages.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for MessageHistory {
    fn default() -> Self {
        Self::new(None)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
