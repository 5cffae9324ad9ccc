//! # Error Handling
//!
//! Error types for Huddle Core.
//!
//! ```text
//! Error
//! ├── Relay
//! │   ├── NotConnected        - No relay connection / no connection id yet
//! │   └── RelayClosed         - Outbound channel to the relay is gone
//! ├── Negotiation
//! │   ├── InvalidPayload      - Envelope is not an SDP or ICE message
//! │   ├── UnknownPeer         - No peer link for that connection id
//! │   └── Transport           - The media transport rejected an operation
//! └── Media
//!     └── DeviceUnavailable   - Camera / microphone / display not available
//! ```
//!
//! Nothing here is retried. A failed negotiation step tears the peer link
//! down; a later membership update builds a fresh one.

use thiserror::Error;

/// Result type alias for Huddle Core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Huddle Core
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Relay Errors
    // ========================================================================

    /// The relay has not assigned us a connection id yet
    #[error("Not connected to the relay.")]
    NotConnected,

    /// The outbound channel to the relay has been closed
    #[error("Relay connection closed.")]
    RelayClosed,

    // ========================================================================
    // Negotiation Errors
    // ========================================================================

    /// A negotiation envelope could not be parsed
    #[error("Invalid negotiation payload: {0}")]
    InvalidPayload(String),

    /// No peer link exists for the given connection id
    #[error("Unknown peer: {0}")]
    UnknownPeer(String),

    /// The underlying peer connection failed
    #[error("Peer connection error: {0}")]
    Transport(String),

    // ========================================================================
    // Media Errors
    // ========================================================================

    /// A capture device could not be opened
    #[error("Media device unavailable: {0}")]
    DeviceUnavailable(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::InvalidPayload(err.to_string())
    }
}
