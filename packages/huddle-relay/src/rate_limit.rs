//! Per-connection chat rate limiting.
//!
//! Fixed windows: the counter resets wholesale once a window has elapsed,
//! it does not slide. Denials past the cap leave the window untouched, so a
//! throttled client hammering the relay does not extend its own penalty.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::protocol::ConnectionId;

/// Counter for one connection's current window.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitState {
    pub count: u32,
    pub window_start: Instant,
}

/// Fixed-window limiter keyed by connection.
#[derive(Debug)]
pub struct RateLimiter {
    window: Duration,
    max_per_window: u32,
    states: HashMap<ConnectionId, RateLimitState>,
}

impl RateLimiter {
    pub fn new(window: Duration, max_per_window: u32) -> Self {
        Self {
            window,
            max_per_window,
            states: HashMap::new(),
        }
    }

    /// Check and consume one unit of quota. Returns false if throttled.
    pub fn admit(&mut self, connection: &str) -> bool {
        self.admit_at(connection, Instant::now())
    }

    /// `admit` with an explicit clock reading.
    pub fn admit_at(&mut self, connection: &str, now: Instant) -> bool {
        match self.states.get_mut(connection) {
            Some(state) if now.duration_since(state.window_start) <= self.window => {
                if state.count >= self.max_per_window {
                    return false;
                }
                state.count += 1;
                true
            }
            _ => {
                // No state yet, or the window elapsed
                self.states.insert(
                    connection.to_string(),
                    RateLimitState {
                        count: 1,
                        window_start: now,
                    },
                );
                true
            }
        }
    }

    /// Drop all state for a connection.
    pub fn release(&mut self, connection: &str) {
        self.states.remove(connection);
    }

    /// Number of connections with live state.
    pub fn tracked(&self) -> usize {
        self.states.len()
    }

    #[cfg(test)]
    pub(crate) fn state(&self, connection: &str) -> Option<RateLimitState> {
        self.states.get(connection).copied()
    }
}
