//! Huddle Relay
//!
//! A WebSocket relay that coordinates multi-party meetings:
//!
//! 1. **Room membership**: parties join a room by a shared id; every join
//!    sends the full member list to the whole room so each client can work
//!    out which peer links it must initiate.
//!
//! 2. **Signaling relay**: SDP offers/answers and ICE candidates are
//!    forwarded between members of the same room. Payloads are opaque.
//!
//! 3. **Chat**: rate-limited, sanitized, kept in a bounded per-room history
//!    that is replayed to late joiners.
//!
//! All state is in memory and disappears with the process. One relay
//! instance is the whole deployment; there is no cross-instance fan-out.

pub mod error;
pub mod handler;
pub mod history;
pub mod protocol;
pub mod rate_limit;
pub mod registry;
pub mod relay;
pub mod sanitize;
pub mod state;

use axum::{
    extract::{State, WebSocketUpgrade},
    http::{HeaderValue, Method},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::{RelayConfig, RelayState};

/// Build the relay's HTTP router.
pub fn router(state: RelayState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(cors_origin(&state.config.cors_origin))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_origin(origin: &str) -> AllowOrigin {
    if origin == "*" {
        return AllowOrigin::from(Any);
    }
    match origin.parse::<HeaderValue>() {
        Ok(value) => AllowOrigin::exact(value),
        Err(e) => {
            tracing::warn!(origin = origin, error = %e, "Invalid CORS origin, allowing any");
            AllowOrigin::from(Any)
        }
    }
}

// ── Route Handlers ────────────────────────────────────────────────────────────

/// WebSocket upgrade handler for client connections.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<RelayState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handler::handle_websocket(socket, state))
}

/// Health check endpoint.
async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "huddle-relay",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Statistics endpoint.
async fn stats_handler(State(state): State<RelayState>) -> impl IntoResponse {
    Json(json!({
        "online_clients": state.online_count(),
        "active_rooms": state.room_count(),
        "room_members": state.room_member_count(),
    }))
}
