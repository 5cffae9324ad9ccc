//! # Peer Negotiation
//!
//! One [`PeerLink`] per remote participant, full mesh. The relay only
//! forwards opaque envelopes; everything about offer/answer ordering lives
//! here.
//!
//! ## Link Lifecycle
//!
//! ```text
//!            offer sent                  answer applied
//!   Idle ──────────────► Offering ──► AwaitingAnswer ──────────► Connected
//!    │                                                              ▲  │
//!    └──────────── remote offer applied, answer sent ───────────────┘  │
//!                                                                      │
//!   any state ── member left / transport failure ──► Closed (discarded)│
//!                                                                      │
//!   Connected ── renegotiate ──► Offering ──► AwaitingAnswer ──► ──────┘
//! ```
//!
//! Exactly one side of each pair offers: the one whose connection id sorts
//! first. ICE candidates that arrive before the remote description are held
//! on the link and applied, in arrival order, right after it.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::protocol::{
    ConnectionId, IceCandidate, NegotiationPayload, RelayClientMessage, SdpType,
    SessionDescription,
};
use crate::transport::{PeerConnection, PeerConnectionFactory, SharedTracks};

/// Tie-break rule: the lexicographically smaller id creates the offer.
pub fn should_initiate(local_id: &str, remote_id: &str) -> bool {
    local_id < remote_id
}

/// Negotiation state of one link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerLinkState {
    Idle,
    Offering,
    AwaitingAnswer,
    Connected,
    Closed,
}

/// Negotiation state plus transport handle for one remote participant.
pub struct PeerLink {
    pub remote_id: ConnectionId,
    pub state: PeerLinkState,
    connection: Arc<dyn PeerConnection>,
    pending_candidates: Vec<IceCandidate>,
    remote_description_set: bool,
    renegotiation_pending: bool,
}

impl PeerLink {
    fn new(remote_id: &str, connection: Arc<dyn PeerConnection>) -> Self {
        Self {
            remote_id: remote_id.to_string(),
            state: PeerLinkState::Idle,
            connection,
            pending_candidates: Vec::new(),
            remote_description_set: false,
            renegotiation_pending: false,
        }
    }

    pub fn connection(&self) -> &Arc<dyn PeerConnection> {
        &self.connection
    }

    pub fn pending_candidates(&self) -> usize {
        self.pending_candidates.len()
    }

    fn close(&mut self) {
        self.connection.close();
        self.pending_candidates.clear();
        self.state = PeerLinkState::Closed;
    }
}

/// Owns every peer link of the local participant and drives negotiation
/// from relay events.
pub struct NegotiationCoordinator {
    local_id: Option<ConnectionId>,
    links: HashMap<ConnectionId, PeerLink>,
    factory: Arc<dyn PeerConnectionFactory>,
    tracks: SharedTracks,
    outbound: mpsc::UnboundedSender<RelayClientMessage>,
}

impl NegotiationCoordinator {
    pub fn new(
        factory: Arc<dyn PeerConnectionFactory>,
        tracks: SharedTracks,
        outbound: mpsc::UnboundedSender<RelayClientMessage>,
    ) -> Self {
        Self {
            local_id: None,
            links: HashMap::new(),
            factory,
            tracks,
            outbound,
        }
    }

    /// Record the connection id the relay assigned us.
    pub fn set_local_id(&mut self, id: ConnectionId) {
        self.local_id = Some(id);
    }

    pub fn local_id(&self) -> Option<&str> {
        self.local_id.as_deref()
    }

    // ========================================================================
    // Relay events
    // ========================================================================

    /// Create links for members we have no link to yet and send offers on
    /// the ones we initiate. Offers run concurrently.
    pub async fn on_membership(&mut self, members: &[ConnectionId]) {
        let Some(local_id) = self.local_id.clone() else {
            warn!("Membership update before welcome, ignoring");
            return;
        };

        let mut offers = Vec::new();
        for remote in members {
            if *remote == local_id || self.links.contains_key(remote) {
                continue;
            }
            match self.open_link(remote).await {
                Ok(connection) => {
                    if should_initiate(&local_id, remote) {
                        self.set_state(remote, PeerLinkState::Offering);
                        offers.push((remote.clone(), connection));
                    }
                }
                Err(e) => warn!(peer = %remote, error = %e, "Failed to open peer link"),
            }
        }

        let results = join_all(offers.into_iter().map(|(remote, connection)| async move {
            let offer = connection.create_offer().await;
            (remote, offer)
        }))
        .await;

        for (remote, offer) in results {
            match offer.and_then(|offer| self.send_description(&remote, offer)) {
                Ok(()) => {
                    self.set_state(&remote, PeerLinkState::AwaitingAnswer);
                    debug!(peer = %remote, "Offer sent");
                }
                Err(e) => self.fail_link(&remote, e),
            }
        }
    }

    /// Apply a negotiation envelope relayed from `from`.
    pub async fn on_signal(&mut self, from: &str, payload: &str) {
        if !self.links.contains_key(from) {
            debug!(peer = %from, "Signal for unknown peer, ignoring");
            return;
        }

        let payload = match NegotiationPayload::parse(payload) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(peer = %from, error = %e, "Malformed negotiation payload");
                return;
            }
        };

        let result = match payload {
            NegotiationPayload::Sdp(description) => match description.sdp_type {
                SdpType::Offer => self.accept_offer(from, description).await,
                SdpType::Answer => self.accept_answer(from, description).await,
                other => {
                    debug!(peer = %from, sdp_type = ?other, "Unsupported description type");
                    Ok(())
                }
            },
            NegotiationPayload::Ice(candidate) => self.accept_candidate(from, candidate).await,
        };

        if let Err(e) = result {
            self.fail_link(from, e);
        }
    }

    /// Close and discard the link to a departed member, whatever its state.
    pub fn on_member_left(&mut self, id: &str) {
        if self.teardown(id).is_some() {
            info!(peer = %id, "Peer left, link closed");
        }
    }

    /// Offer again on a connected link whose senders changed. Links still
    /// negotiating re-offer as soon as they reach `Connected`.
    pub async fn renegotiate(&mut self, remote: &str) {
        let Some(link) = self.links.get_mut(remote) else {
            debug!(peer = %remote, "Renegotiation for unknown peer, ignoring");
            return;
        };
        if link.state != PeerLinkState::Connected {
            link.renegotiation_pending = true;
            debug!(peer = %remote, state = ?link.state, "Renegotiation deferred");
            return;
        }
        if let Err(e) = self.offer(remote).await {
            self.fail_link(remote, e);
        }
    }

    /// Forward a locally gathered ICE candidate to `remote`.
    pub fn send_ice_candidate(&self, remote: &str, candidate: IceCandidate) -> Result<()> {
        if self.local_id.is_none() {
            return Err(Error::NotConnected);
        }
        if !self.links.contains_key(remote) {
            return Err(Error::UnknownPeer(remote.to_string()));
        }
        self.send_signal(remote, NegotiationPayload::Ice(candidate))
    }

    /// Close every link. Used on hang-up.
    pub fn close_all(&mut self) {
        for (_, mut link) in self.links.drain() {
            link.close();
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn link_state(&self, id: &str) -> Option<PeerLinkState> {
        self.links.get(id).map(|link| link.state)
    }

    pub fn link(&self, id: &str) -> Option<&PeerLink> {
        self.links.get(id)
    }

    pub fn connected_peers(&self) -> Vec<ConnectionId> {
        let mut peers: Vec<_> = self
            .links
            .values()
            .filter(|link| link.state == PeerLinkState::Connected)
            .map(|link| link.remote_id.clone())
            .collect();
        peers.sort();
        peers
    }

    /// Everyone we hold a link to, plus ourselves.
    pub fn participant_count(&self) -> usize {
        self.links.len() + 1
    }

    /// Every live link, whatever its negotiation state.
    pub(crate) fn link_handles(&self) -> Vec<(ConnectionId, Arc<dyn PeerConnection>)> {
        self.links
            .values()
            .map(|link| (link.remote_id.clone(), link.connection.clone()))
            .collect()
    }

    /// Tear a link down after a transport failure. There is no partial repair.
    pub(crate) fn fail_link(&mut self, remote: &str, err: Error) {
        warn!(peer = %remote, error = %err, "Negotiation failed, closing link");
        self.teardown(remote);
    }

    // ========================================================================
    // Internals
    // ========================================================================

    async fn open_link(&mut self, remote: &str) -> Result<Arc<dyn PeerConnection>> {
        self.teardown(remote);

        let connection = self.factory.create(remote).await?;
        if let Err(e) = self.attach_local_tracks(connection.as_ref()).await {
            connection.close();
            return Err(e);
        }

        self.links
            .insert(remote.to_string(), PeerLink::new(remote, connection.clone()));
        info!(peer = %remote, "Peer link created");
        Ok(connection)
    }

    /// Add every current local track to a fresh connection.
    async fn attach_local_tracks(&self, connection: &dyn PeerConnection) -> Result<()> {
        let tracks = self.tracks.read().all();
        for track in &tracks {
            connection.add_track(track).await?;
        }
        Ok(())
    }

    async fn accept_offer(&mut self, from: &str, description: SessionDescription) -> Result<()> {
        let Some(link) = self.links.get_mut(from) else {
            return Ok(());
        };
        let polite = self
            .local_id
            .as_deref()
            .is_some_and(|local| !should_initiate(local, from));

        match link.state {
            PeerLinkState::Idle | PeerLinkState::Connected => {}
            // Offer collision: the side that would not initiate yields and
            // re-offers its own changes once connected.
            PeerLinkState::Offering | PeerLinkState::AwaitingAnswer if polite => {
                link.renegotiation_pending = true;
            }
            state => {
                warn!(peer = %from, state = ?state, "Ignoring offer in this state");
                return Ok(());
            }
        }

        let connection = link.connection.clone();
        connection.set_remote_description(description).await?;
        self.flush_candidates(from).await?;
        let answer = connection.create_answer().await?;
        self.send_description(from, answer)?;
        self.become_connected(from).await
    }

    async fn accept_answer(&mut self, from: &str, description: SessionDescription) -> Result<()> {
        let Some(link) = self.links.get(from) else {
            return Ok(());
        };
        if link.state != PeerLinkState::AwaitingAnswer {
            warn!(peer = %from, state = ?link.state, "Ignoring unexpected answer");
            return Ok(());
        }

        let connection = link.connection.clone();
        connection.set_remote_description(description).await?;
        self.flush_candidates(from).await?;
        self.become_connected(from).await
    }

    async fn accept_candidate(&mut self, from: &str, candidate: IceCandidate) -> Result<()> {
        let Some(link) = self.links.get_mut(from) else {
            return Ok(());
        };
        if !link.remote_description_set {
            debug!(peer = %from, "Queueing early ICE candidate");
            link.pending_candidates.push(candidate);
            return Ok(());
        }
        let connection = link.connection.clone();
        connection.add_ice_candidate(candidate).await
    }

    /// Mark the remote description applied and drain the candidate queue.
    async fn flush_candidates(&mut self, remote: &str) -> Result<()> {
        let Some(link) = self.links.get_mut(remote) else {
            return Ok(());
        };
        link.remote_description_set = true;
        let pending = std::mem::take(&mut link.pending_candidates);
        let connection = link.connection.clone();

        if !pending.is_empty() {
            debug!(peer = %remote, count = pending.len(), "Flushing queued ICE candidates");
        }
        for candidate in pending {
            connection.add_ice_candidate(candidate).await?;
        }
        Ok(())
    }

    async fn become_connected(&mut self, remote: &str) -> Result<()> {
        let Some(link) = self.links.get_mut(remote) else {
            return Ok(());
        };
        if link.state != PeerLinkState::Connected {
            info!(peer = %remote, "Peer link connected");
        }
        link.state = PeerLinkState::Connected;

        if std::mem::take(&mut link.renegotiation_pending) {
            self.offer(remote).await?;
        }
        Ok(())
    }

    async fn offer(&mut self, remote: &str) -> Result<()> {
        let Some(link) = self.links.get_mut(remote) else {
            return Ok(());
        };
        link.state = PeerLinkState::Offering;
        let connection = link.connection.clone();

        let offer = connection.create_offer().await?;
        self.send_description(remote, offer)?;
        self.set_state(remote, PeerLinkState::AwaitingAnswer);
        debug!(peer = %remote, "Offer sent");
        Ok(())
    }

    fn teardown(&mut self, remote: &str) -> Option<PeerLink> {
        let mut link = self.links.remove(remote)?;
        link.close();
        Some(link)
    }

    fn set_state(&mut self, remote: &str, state: PeerLinkState) {
        if let Some(link) = self.links.get_mut(remote) {
            link.state = state;
        }
    }

    fn send_description(&self, to: &str, description: SessionDescription) -> Result<()> {
        self.send_signal(to, NegotiationPayload::Sdp(description))
    }

    fn send_signal(&self, to: &str, payload: NegotiationPayload) -> Result<()> {
        let payload = payload.encode()?;
        self.outbound
            .send(RelayClientMessage::Signal {
                to: to.to_string(),
                payload,
            })
            .map_err(|_| Error::RelayClosed)
    }
}
