//! Message relay: the coordination core.
//!
//! Each handler runs one inbound event to completion while holding the
//! session store lock, so the membership it mutates and the broadcast it
//! computes are the same snapshot. Outbound frames are queued on unbounded
//! per-connection channels; nothing here waits on a socket.

use chrono::Utc;

use crate::error::RelayError;
use crate::protocol::{ChatMessage, ClientMessage, ServerMessage};
use crate::sanitize::{sanitize_body, sanitize_name, RoomId};
use crate::state::{RelayState, SessionStore};

/// Route one parsed client message. Rejections go back to the sender only.
pub fn dispatch(state: &RelayState, connection: &str, msg: ClientMessage) {
    let result = match msg {
        ClientMessage::Join { room_id } => handle_join(state, connection, &room_id),
        ClientMessage::Signal { to, payload } => {
            handle_signal(state, connection, &to, payload);
            Ok(())
        }
        ClientMessage::Chat { body, sender } => handle_chat(state, connection, &body, &sender),
        ClientMessage::Leave => {
            handle_leave(state, connection);
            Ok(())
        }
        ClientMessage::Ping => {
            state.send_to_client(connection, ServerMessage::Pong);
            Ok(())
        }
    };

    if let Err(err) = result {
        tracing::warn!(connection = connection, error = %err, "Rejected client message");
        state.send_to_client(
            connection,
            ServerMessage::Error {
                message: err.to_string(),
            },
        );
    }
}

// ── Message Handlers ──────────────────────────────────────────────────────────

/// Admit a connection to a room, send the full member list to everyone in
/// it, then replay the room's chat history to the joiner.
pub fn handle_join(state: &RelayState, connection: &str, raw_room_id: &str) -> Result<(), RelayError> {
    let room_id = RoomId::parse(raw_room_id).ok_or(RelayError::InvalidRoomId)?;

    let mut sessions = state.sessions();

    // Joins are not idempotent: leave first, then rejoin
    if sessions.registry.find_room(connection).is_some() {
        return Err(RelayError::AlreadyInMeeting);
    }
    sessions.registry.join(&room_id, connection)?;

    let members = sessions.registry.members(&room_id).to_vec();
    state.broadcast(
        &members,
        &ServerMessage::Membership {
            joiner: connection.to_string(),
            members: members.clone(),
        },
    );

    for message in sessions.registry.replay(&room_id) {
        state.send_to_client(connection, ServerMessage::Chat(message));
    }

    tracing::info!(
        connection = connection,
        room = room_id.as_str(),
        members = members.len(),
        max = state.config.max_room_size,
        "Joined room"
    );

    Ok(())
}

/// Forward a negotiation envelope if sender and target share a room.
/// Anything else is a stale target and is dropped without an error.
pub fn handle_signal(state: &RelayState, from: &str, to: &str, payload: String) {
    let sessions = state.sessions();

    let same_room = match (
        sessions.registry.find_room(from),
        sessions.registry.find_room(to),
    ) {
        (Some(sender_room), Some(target_room)) => sender_room == target_room,
        _ => false,
    };

    if !same_room {
        tracing::debug!(from = from, to = to, "Dropping signal for target outside sender's room");
        return;
    }

    tracing::debug!(from = from, to = to, "Forwarding signal");
    state.send_to_client(
        to,
        ServerMessage::Signal {
            from: from.to_string(),
            payload,
        },
    );
}

/// Rate-limit, sanitize, record and broadcast a chat message. The sender is
/// included in the broadcast; that copy is its delivery confirmation.
pub fn handle_chat(
    state: &RelayState,
    connection: &str,
    raw_body: &str,
    raw_sender: &str,
) -> Result<(), RelayError> {
    let mut sessions = state.sessions();

    if !sessions.limiter.admit(connection) {
        return Err(RelayError::TooFast);
    }

    let Some(room_id) = sessions.registry.find_room(connection).cloned() else {
        tracing::debug!(connection = connection, "Chat from connection outside any room");
        return Ok(());
    };

    let body = sanitize_body(raw_body, state.config.max_message_length);
    if body.is_empty() {
        return Ok(());
    }

    let message = ChatMessage {
        sender: sanitize_name(raw_sender),
        body,
        from: connection.to_string(),
        sent_at: Utc::now().timestamp_millis(),
    };

    tracing::debug!(
        room = room_id.as_str(),
        sender = message.sender.as_str(),
        "Chat message"
    );

    sessions.registry.record(&room_id, message.clone());
    state.broadcast(
        sessions.registry.members(&room_id),
        &ServerMessage::Chat(message),
    );

    Ok(())
}

/// Leave the current room but keep the connection open.
pub fn handle_leave(state: &RelayState, connection: &str) {
    let mut sessions = state.sessions();
    depart(state, &mut sessions, connection);
}

/// Tear down everything the relay holds for a closed connection.
pub fn handle_disconnect(state: &RelayState, connection: &str, reason: &str) {
    {
        let mut sessions = state.sessions();
        depart(state, &mut sessions, connection);
        sessions.limiter.release(connection);
    }

    let online = state.unregister_client(connection).unwrap_or_default();
    tracing::info!(
        connection = connection,
        reason = reason,
        online_secs = online.as_secs(),
        "Client disconnected"
    );
}

/// Notify the rest of the room, then remove the connection from it.
///
/// The notice is queued before the membership changes so it can never be
/// overtaken by a membership broadcast that already omits the leaver.
fn depart(state: &RelayState, sessions: &mut SessionStore, connection: &str) {
    let Some(room_id) = sessions.registry.find_room(connection).cloned() else {
        return;
    };

    let notice = ServerMessage::MemberLeft {
        id: connection.to_string(),
    };
    state.broadcast(
        sessions
            .registry
            .members(&room_id)
            .iter()
            .filter(|member| member.as_str() != connection),
        &notice,
    );

    sessions.registry.leave(connection);

    tracing::info!(
        connection = connection,
        room = room_id.as_str(),
        remaining = sessions.registry.members(&room_id).len(),
        "Left room"
    );
}
