//! Huddle Relay Server binary.

use std::time::Duration;

use clap::Parser;

use huddle_relay::{router, RelayConfig, RelayState};

// ── CLI Arguments ─────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "huddle-relay", version, about = "Huddle meeting relay server")]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value_t = 3000, env = "RELAY_PORT")]
    port: u16,

    /// Maximum members per room
    #[arg(long, default_value_t = 10, env = "MAX_ROOM_SIZE")]
    max_room_size: usize,

    /// Maximum chat message length in characters
    #[arg(long, default_value_t = 500, env = "MAX_MESSAGE_LENGTH")]
    max_message_length: usize,

    /// Chat messages kept per room for late joiners
    #[arg(long, default_value_t = 100, env = "MAX_MESSAGES_STORED")]
    max_messages_stored: usize,

    /// Chat rate-limit window in milliseconds
    #[arg(long, default_value_t = 1000, env = "RATE_LIMIT_WINDOW_MS")]
    rate_limit_window_ms: u64,

    /// Chat messages allowed per connection per window
    #[arg(long, default_value_t = 5, env = "RATE_LIMIT_MAX_MSGS")]
    rate_limit_max_msgs: u32,

    /// Allowed CORS origin ("*" for any)
    #[arg(long, default_value = "*", env = "CORS_ORIGIN")]
    cors_origin: String,

    /// Close connections idle for this many seconds
    #[arg(long, default_value_t = 60, env = "IDLE_TIMEOUT_SECS")]
    idle_timeout_secs: u64,

    /// Ping each connection this often, in seconds
    #[arg(long, default_value_t = 25, env = "KEEPALIVE_INTERVAL_SECS")]
    keepalive_interval_secs: u64,
}

impl From<Args> for RelayConfig {
    fn from(args: Args) -> Self {
        Self {
            port: args.port,
            max_room_size: args.max_room_size,
            max_message_length: args.max_message_length,
            max_messages_stored: args.max_messages_stored,
            rate_limit_window: Duration::from_millis(args.rate_limit_window_ms),
            rate_limit_max_msgs: args.rate_limit_max_msgs,
            cors_origin: args.cors_origin,
            idle_timeout: Duration::from_secs(args.idle_timeout_secs),
            keepalive_interval: Duration::from_secs(args.keepalive_interval_secs),
        }
    }
}

// ── Entry Point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "huddle_relay=info,tower_http=info".into()),
        )
        .init();

    let config = RelayConfig::from(Args::parse());
    tracing::info!(
        max_room_size = config.max_room_size,
        max_messages_stored = config.max_messages_stored,
        rate_limit_max_msgs = config.rate_limit_max_msgs,
        rate_limit_window_ms = config.rate_limit_window.as_millis() as u64,
        "Relay configured"
    );

    let addr = format!("0.0.0.0:{}", config.port);
    let app = router(RelayState::new(config));

    tracing::info!("Huddle relay server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await
}
