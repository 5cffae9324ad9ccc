//! # Meeting Session
//!
//! The client-side view of one meeting. Consumes relay events, drives the
//! negotiation coordinator and the track manager, and keeps the state a UI
//! renders: chat log, unread counter, participant count.
//!
//! ```text
//! relay ──► handle() ──► NegotiationCoordinator ──► signal ──► relay
//!              │
//!              └──► MeetingEvent ──► UI
//! ```

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::negotiation::NegotiationCoordinator;
use crate::protocol::{
    ChatMessageData, ConnectionId, IceCandidate, RelayClientMessage, RelayServerMessage,
};
use crate::tracks::TrackManager;
use crate::transport::{LocalTracks, MediaDevices, PeerConnectionFactory, TrackKind};

/// What the UI needs to hear about.
#[derive(Debug, Clone, PartialEq)]
pub enum MeetingEvent {
    /// The relay assigned us an id
    Connected { connection_id: ConnectionId },
    /// Someone joined; `count` includes us
    ParticipantsChanged { count: usize },
    /// A participant left
    PeerLeft { id: ConnectionId, count: usize },
    /// A chat message arrived (live or replayed)
    ChatReceived(ChatMessageData),
    /// The relay rejected something we sent
    Rejected { message: String },
}

pub struct MeetingSession {
    coordinator: NegotiationCoordinator,
    tracks: TrackManager,
    outbound: mpsc::UnboundedSender<RelayClientMessage>,
    display_name: String,
    chat_log: Vec<ChatMessageData>,
    chat_open: bool,
    unread: usize,
    participant_count: usize,
}

impl MeetingSession {
    pub fn new(
        factory: Arc<dyn PeerConnectionFactory>,
        devices: Arc<dyn MediaDevices>,
        outbound: mpsc::UnboundedSender<RelayClientMessage>,
        display_name: impl Into<String>,
    ) -> Self {
        let local_tracks = Arc::new(RwLock::new(LocalTracks::default()));
        Self {
            coordinator: NegotiationCoordinator::new(factory, local_tracks.clone(), outbound.clone()),
            tracks: TrackManager::new(devices, local_tracks),
            outbound,
            display_name: display_name.into(),
            chat_log: Vec::new(),
            chat_open: false,
            unread: 0,
            participant_count: 1,
        }
    }

    // ========================================================================
    // Outgoing
    // ========================================================================

    pub fn join(&self, room_id: &str) -> Result<()> {
        info!(room = %room_id, "Joining meeting");
        self.send(RelayClientMessage::Join {
            room_id: room_id.to_string(),
        })
    }

    /// Send a chat message. Blank bodies are not sent; returns whether the
    /// message went out.
    pub fn send_chat(&self, body: &str) -> Result<bool> {
        if body.trim().is_empty() {
            return Ok(false);
        }
        self.send(RelayClientMessage::Chat {
            body: body.to_string(),
            sender: self.display_name.clone(),
        })?;
        Ok(true)
    }

    /// Forward a candidate gathered by the local transport for `remote`.
    pub fn send_ice_candidate(&self, remote: &str, candidate: IceCandidate) -> Result<()> {
        self.coordinator.send_ice_candidate(remote, candidate)
    }

    pub fn ping(&self) -> Result<()> {
        self.send(RelayClientMessage::Ping)
    }

    /// Close every link, stop every local track and leave the room.
    pub fn hang_up(&mut self) -> Result<()> {
        self.coordinator.close_all();
        self.tracks.stop_all();
        self.participant_count = 1;
        info!("Left meeting");
        self.send(RelayClientMessage::Leave)
    }

    // ========================================================================
    // Incoming
    // ========================================================================

    /// Apply one relay event.
    pub async fn handle(&mut self, msg: RelayServerMessage) -> Option<MeetingEvent> {
        match msg {
            RelayServerMessage::Welcome { connection_id } => {
                debug!(id = %connection_id, "Welcome from relay");
                self.coordinator.set_local_id(connection_id.clone());
                Some(MeetingEvent::Connected { connection_id })
            }

            RelayServerMessage::Membership { joiner, members } => {
                debug!(joiner = %joiner, count = members.len(), "Membership update");
                self.participant_count = members.len();
                self.coordinator.on_membership(&members).await;
                Some(MeetingEvent::ParticipantsChanged {
                    count: self.participant_count,
                })
            }

            RelayServerMessage::MemberLeft { id } => {
                self.coordinator.on_member_left(&id);
                self.participant_count = self.participant_count.saturating_sub(1).max(1);
                Some(MeetingEvent::PeerLeft {
                    id,
                    count: self.participant_count,
                })
            }

            RelayServerMessage::Signal { from, payload } => {
                self.coordinator.on_signal(&from, &payload).await;
                None
            }

            RelayServerMessage::Chat(message) => {
                if !self.chat_open {
                    self.unread += 1;
                }
                self.chat_log.push(message.clone());
                Some(MeetingEvent::ChatReceived(message))
            }

            RelayServerMessage::Error { message } => {
                warn!(message = %message, "Relay rejected request");
                Some(MeetingEvent::Rejected { message })
            }

            RelayServerMessage::Pong => None,
        }
    }

    // ========================================================================
    // Media
    // ========================================================================

    pub async fn set_media(&mut self, kind: TrackKind, enabled: bool) -> Result<()> {
        if enabled {
            self.tracks.enable(kind, &mut self.coordinator).await
        } else {
            self.tracks.disable(kind, &mut self.coordinator).await
        }
    }

    pub async fn set_screen_share(&mut self, enabled: bool) -> Result<()> {
        if enabled {
            self.tracks.start_screen_share(&mut self.coordinator).await
        } else {
            self.tracks.stop_screen_share(&mut self.coordinator).await
        }
    }

    // ========================================================================
    // Chat panel
    // ========================================================================

    pub fn open_chat(&mut self) {
        self.chat_open = true;
        self.unread = 0;
    }

    pub fn close_chat(&mut self) {
        self.chat_open = false;
    }

    pub fn unread(&self) -> usize {
        self.unread
    }

    pub fn chat_log(&self) -> &[ChatMessageData] {
        &self.chat_log
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn participant_count(&self) -> usize {
        self.participant_count
    }

    pub fn coordinator(&self) -> &NegotiationCoordinator {
        &self.coordinator
    }

    pub fn tracks(&self) -> &TrackManager {
        &self.tracks
    }

    fn send(&self, msg: RelayClientMessage) -> Result<()> {
        self.outbound.send(msg).map_err(|_| Error::RelayClosed)
    }
}
