//! # Huddle Core
//!
//! Client side of a Huddle meeting: turns relay events into a full mesh of
//! peer links and keeps the local media tracks in sync with them.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                          MeetingSession                           │
//! │                                                                   │
//! │   relay events ──► ┌──────────────────────────┐ ──► signals       │
//! │                    │  NegotiationCoordinator  │                   │
//! │                    │  - one PeerLink per peer │                   │
//! │                    │  - tie-break initiator   │                   │
//! │                    │  - pending ICE queue     │                   │
//! │                    └────────────┬─────────────┘                   │
//! │                                 │ connected links                 │
//! │                    ┌────────────┴─────────────┐                   │
//! │   UI toggles ────► │       TrackManager       │                   │
//! │                    │  - mic / camera / screen │                   │
//! │                    └──────────────────────────┘                   │
//! └───────────────────────────────────────────────────────────────────┘
//!            │                                    │
//!   PeerConnectionFactory                    MediaDevices
//!   (platform WebRTC)                        (platform capture)
//! ```
//!
//! ## Module Hierarchy
//!
//! - [`error`] - Error type and `Result` alias
//! - [`protocol`] - Relay frames and negotiation envelopes
//! - [`transport`] - Traits the platform media stack implements
//! - [`negotiation`] - Peer link lifecycle and offer/answer ordering
//! - [`tracks`] - Local track set and push to peers
//! - [`session`] - Glue from relay events to the above, plus chat state
//!
//! The relay connection itself is not owned here: outgoing frames go to an
//! unbounded channel the application drains into its WebSocket, and incoming
//! frames are fed to [`MeetingSession::handle`].

pub mod error;
pub mod negotiation;
pub mod protocol;
pub mod session;
pub mod tracks;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{Error, Result};
pub use negotiation::{NegotiationCoordinator, PeerLinkState};
pub use session::{MeetingEvent, MeetingSession};
pub use tracks::TrackManager;
pub use transport::{MediaDevices, MediaTrack, PeerConnection, PeerConnectionFactory, TrackKind};
