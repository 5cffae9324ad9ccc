//! Server state management.
//!
//! Tracks connected clients and the session store (room membership, chat
//! history, rate limits). Client sender channels live in a DashMap; the
//! session store sits behind a single mutex so that every event mutates it
//! and computes its broadcast against one consistent snapshot.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::{Mutex, MutexGuard};
use tokio::sync::mpsc;

use crate::protocol::{ConnectionId, ServerMessage};
use crate::rate_limit::RateLimiter;
use crate::registry::SessionRegistry;

/// Default maximum members per room. Every pair of members holds a direct
/// link, so this cap is the scaling boundary of a meeting.
const DEFAULT_MAX_ROOM_SIZE: usize = 10;

/// Default maximum chat body length, in characters.
const DEFAULT_MAX_MESSAGE_LENGTH: usize = 500;

/// Default chat history kept per room.
const DEFAULT_MAX_MESSAGES_STORED: usize = 100;

/// Default rate-limit window in milliseconds.
const DEFAULT_RATE_LIMIT_WINDOW_MS: u64 = 1000;

/// Default chat messages allowed per window.
const DEFAULT_RATE_LIMIT_MAX_MSGS: u32 = 5;

/// Default idle cutoff in seconds.
const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 60;

/// Default keepalive ping interval in seconds.
const DEFAULT_KEEPALIVE_INTERVAL_SECS: u64 = 25;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub port: u16,
    pub max_room_size: usize,
    pub max_message_length: usize,
    pub max_messages_stored: usize,
    pub rate_limit_window: Duration,
    pub rate_limit_max_msgs: u32,
    /// Allowed CORS origin, `*` for any
    pub cors_origin: String,
    /// Close connections that send nothing for this long
    pub idle_timeout: Duration,
    /// How often the relay pings each connection. Must be shorter than
    /// `idle_timeout` so a live client's pong keeps it open.
    pub keepalive_interval: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            max_room_size: DEFAULT_MAX_ROOM_SIZE,
            max_message_length: DEFAULT_MAX_MESSAGE_LENGTH,
            max_messages_stored: DEFAULT_MAX_MESSAGES_STORED,
            rate_limit_window: Duration::from_millis(DEFAULT_RATE_LIMIT_WINDOW_MS),
            rate_limit_max_msgs: DEFAULT_RATE_LIMIT_MAX_MSGS,
            cors_origin: "*".to_string(),
            idle_timeout: Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS),
            keepalive_interval: Duration::from_secs(DEFAULT_KEEPALIVE_INTERVAL_SECS),
        }
    }
}

/// A connected client's sender channel.
pub type ClientSender = mpsc::UnboundedSender<ServerMessage>;

/// A connected client.
#[derive(Debug, Clone)]
pub struct Client {
    pub sender: ClientSender,
    pub connected_at: Instant,
}

/// Everything one relay event may mutate.
#[derive(Debug)]
pub struct SessionStore {
    pub registry: SessionRegistry,
    pub limiter: RateLimiter,
}

/// Shared server state.
#[derive(Clone)]
pub struct RelayState {
    /// Connection ID → client.
    /// Inserted when the socket is accepted, removed when it closes.
    pub clients: Arc<DashMap<ConnectionId, Client>>,

    /// Rooms, histories and rate limits, mutated one event at a time.
    sessions: Arc<Mutex<SessionStore>>,

    /// Server configuration.
    pub config: RelayConfig,
}

impl RelayState {
    /// Create a new relay state with the given configuration.
    pub fn new(config: RelayConfig) -> Self {
        let sessions = SessionStore {
            registry: SessionRegistry::new(config.max_room_size, config.max_messages_stored),
            limiter: RateLimiter::new(config.rate_limit_window, config.rate_limit_max_msgs),
        };

        Self {
            clients: Arc::new(DashMap::new()),
            sessions: Arc::new(Mutex::new(sessions)),
            config,
        }
    }

    /// Lock the session store for one event.
    pub fn sessions(&self) -> MutexGuard<'_, SessionStore> {
        self.sessions.lock()
    }

    // ── Client Management ─────────────────────────────────────────────────

    /// Register a freshly accepted connection and return its new id.
    pub fn register_client(&self, sender: ClientSender) -> ConnectionId {
        let id = uuid::Uuid::new_v4().to_string();
        self.clients.insert(
            id.clone(),
            Client {
                sender,
                connected_at: Instant::now(),
            },
        );
        tracing::info!(connection = id.as_str(), "Client connected");
        id
    }

    /// Forget a connection's sender channel. Returns how long it was online.
    pub fn unregister_client(&self, id: &str) -> Option<Duration> {
        self.clients
            .remove(id)
            .map(|(_, client)| client.connected_at.elapsed())
    }

    /// Send a message to a connected client. Returns true if it was queued.
    pub fn send_to_client(&self, id: &str, message: ServerMessage) -> bool {
        if let Some(client) = self.clients.get(id) {
            client.sender.send(message).is_ok()
        } else {
            false
        }
    }

    /// Send the same message to each listed connection.
    pub fn broadcast<'a>(
        &self,
        recipients: impl IntoIterator<Item = &'a ConnectionId>,
        message: &ServerMessage,
    ) {
        for id in recipients {
            self.send_to_client(id, message.clone());
        }
    }

    /// Get the number of currently connected clients.
    pub fn online_count(&self) -> usize {
        self.clients.len()
    }

    /// Get the number of live rooms.
    pub fn room_count(&self) -> usize {
        self.sessions().registry.room_count()
    }

    /// Get the number of connections currently in a room.
    pub fn room_member_count(&self) -> usize {
        self.sessions().registry.member_count()
    }
}
