//! WebSocket connection handler.
//!
//! Manages individual WebSocket connections: assigning the connection id,
//! parsing client messages, handing them to the relay, and cleaning up
//! when the socket goes away.

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::protocol::{ClientMessage, ServerMessage};
use crate::relay;
use crate::state::RelayState;

/// Handle a single WebSocket connection.
///
/// This function runs for the lifetime of the connection:
/// 1. Registers the connection and tells the client its id
/// 2. Spawns a sender task to forward outbound messages and keepalive pings
/// 3. Processes incoming messages until the connection closes or idles out
/// 4. Runs the relay's disconnect handling
pub async fn handle_websocket(socket: WebSocket, state: RelayState) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Create the outbound channel for this client
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    // ── Step 1: Register Client ───────────────────────────────────────────

    let connection_id = state.register_client(tx);
    state.send_to_client(
        &connection_id,
        ServerMessage::Welcome {
            connection_id: connection_id.clone(),
        },
    );

    // ── Step 2: Spawn Sender Task ─────────────────────────────────────────

    // The sender task also pings the client on a fixed interval; the pong
    // it answers with counts as inbound traffic for the idle cutoff.
    // interval() rejects a zero period
    let keepalive_interval = state.config.keepalive_interval.max(Duration::from_millis(10));
    let sender_task = tokio::spawn(async move {
        let mut keepalive = tokio::time::interval(keepalive_interval);
        keepalive.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        keepalive.tick().await;

        loop {
            let frame = tokio::select! {
                msg = rx.recv() => match msg {
                    Some(msg) => match serde_json::to_string(&msg) {
                        Ok(json) => Message::Text(json),
                        Err(e) => {
                            tracing::error!("Failed to serialize server message: {}", e);
                            continue;
                        }
                    },
                    None => break,
                },
                _ = keepalive.tick() => Message::Ping(Vec::new()),
            };

            if ws_sender.send(frame).await.is_err() {
                break; // Connection closed
            }
        }
    });

    // ── Step 3: Process Messages ──────────────────────────────────────────

    let idle_timeout = state.config.idle_timeout;
    let reason = loop {
        let next = match tokio::time::timeout(idle_timeout, ws_receiver.next()).await {
            Ok(next) => next,
            Err(_) => break "idle timeout",
        };

        match next {
            Some(Ok(Message::Text(text))) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(client_msg) => relay::dispatch(&state, &connection_id, client_msg),
                Err(e) => {
                    tracing::warn!(
                        connection = connection_id.as_str(),
                        error = %e,
                        "Failed to parse client message"
                    );
                    state.send_to_client(
                        &connection_id,
                        ServerMessage::Error {
                            message: format!("Invalid message format: {}", e),
                        },
                    );
                }
            },
            Some(Ok(Message::Ping(_data))) => {
                // Axum answers protocol pings itself; mirror it at the
                // application level for clients that only read text frames.
                state.send_to_client(&connection_id, ServerMessage::Pong);
            }
            Some(Ok(Message::Close(_))) => break "client close",
            Some(Err(e)) => {
                tracing::warn!(
                    connection = connection_id.as_str(),
                    error = %e,
                    "WebSocket error"
                );
                break "transport error";
            }
            None => break "transport close",
            Some(Ok(_)) => {} // Binary, Pong: ignore
        }
    };

    // ── Step 4: Cleanup ───────────────────────────────────────────────────

    relay::handle_disconnect(&state, &connection_id, reason);
    sender_task.abort();
}
