//! Per-room chat history.
//!
//! A bounded FIFO: once full, every new message evicts exactly one, the
//! oldest. Replay hands a new member the buffer as it stands.

use std::collections::VecDeque;

use crate::protocol::ChatMessage;

/// Bounded chat history owned by a single room.
#[derive(Debug, Clone)]
pub struct ChatHistory {
    messages: VecDeque<ChatMessage>,
    capacity: usize,
}

impl ChatHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            messages: VecDeque::with_capacity(capacity.min(128)),
            capacity,
        }
    }

    /// Append a message, evicting the oldest one if the cap is exceeded.
    pub fn record(&mut self, message: ChatMessage) {
        self.messages.push_back(message);
        if self.messages.len() > self.capacity {
            self.messages.pop_front();
        }
    }

    /// The current buffer, oldest first.
    pub fn replay(&self) -> Vec<ChatMessage> {
        self.messages.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
