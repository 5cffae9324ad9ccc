//! Room membership.
//!
//! The registry is the only place membership is mutated. It keeps the
//! room → members map and the connection → room reverse index in step, and a
//! room's chat history lives and dies with the room.

use std::collections::HashMap;

use crate::history::ChatHistory;
use crate::protocol::{ChatMessage, ConnectionId};
use crate::sanitize::RoomId;

/// Why a join was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinError {
    /// The connection already belongs to a room (this one or another).
    AlreadyInRoom,
    /// The room is at its member cap.
    RoomFull,
}

/// A meeting room: ordered members plus the chat history they share.
#[derive(Debug)]
pub struct Room {
    /// Members in join order
    pub members: Vec<ConnectionId>,
    /// Chat history, destroyed with the room
    pub history: ChatHistory,
}

/// Authoritative room table and reverse index.
#[derive(Debug)]
pub struct SessionRegistry {
    rooms: HashMap<RoomId, Room>,
    index: HashMap<ConnectionId, RoomId>,
    max_room_size: usize,
    max_history: usize,
}

impl SessionRegistry {
    pub fn new(max_room_size: usize, max_history: usize) -> Self {
        Self {
            rooms: HashMap::new(),
            index: HashMap::new(),
            max_room_size,
            max_history,
        }
    }

    /// Which room a connection is in, if any.
    pub fn find_room(&self, connection: &str) -> Option<&RoomId> {
        self.index.get(connection)
    }

    /// Add a connection to a room, creating the room on first join.
    pub fn join(&mut self, room_id: &RoomId, connection: &str) -> Result<(), JoinError> {
        if self.index.contains_key(connection) {
            return Err(JoinError::AlreadyInRoom);
        }

        if let Some(room) = self.rooms.get(room_id) {
            if room.members.len() >= self.max_room_size {
                return Err(JoinError::RoomFull);
            }
        }

        let max_history = self.max_history;
        let room = self.rooms.entry(room_id.clone()).or_insert_with(|| {
            tracing::debug!(room = room_id.as_str(), "Created room");
            Room {
                members: Vec::new(),
                history: ChatHistory::new(max_history),
            }
        });
        room.members.push(connection.to_string());
        self.index.insert(connection.to_string(), room_id.clone());

        Ok(())
    }

    /// Remove a connection from its room. Deletes the room, history
    /// included, when it empties. Returns the room the connection was in.
    pub fn leave(&mut self, connection: &str) -> Option<RoomId> {
        let room_id = self.index.remove(connection)?;

        let now_empty = match self.rooms.get_mut(&room_id) {
            Some(room) => {
                room.members.retain(|member| member != connection);
                room.members.is_empty()
            }
            None => false,
        };

        if now_empty {
            self.rooms.remove(&room_id);
            tracing::debug!(room = room_id.as_str(), "Removed empty room");
        }

        Some(room_id)
    }

    /// Members of a room in join order. Empty if the room does not exist.
    pub fn members(&self, room_id: &RoomId) -> &[ConnectionId] {
        self.rooms
            .get(room_id)
            .map(|room| room.members.as_slice())
            .unwrap_or(&[])
    }

    /// Append a chat message to a room's history. No-op for unknown rooms.
    pub fn record(&mut self, room_id: &RoomId, message: ChatMessage) {
        if let Some(room) = self.rooms.get_mut(room_id) {
            room.history.record(message);
        }
    }

    /// A room's chat history, oldest first.
    pub fn replay(&self, room_id: &RoomId) -> Vec<ChatMessage> {
        self.rooms
            .get(room_id)
            .map(|room| room.history.replay())
            .unwrap_or_default()
    }

    #[cfg(test)]
    pub(crate) fn room(&self, room_id: &RoomId) -> Option<&Room> {
        self.rooms.get(room_id)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Total members across all rooms.
    pub fn member_count(&self) -> usize {
        self.index.len()
    }
}
