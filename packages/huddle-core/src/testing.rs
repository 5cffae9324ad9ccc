//! In-memory fakes of the transport traits, for unit tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::protocol::{
    IceCandidate, NegotiationPayload, RelayClientMessage, SdpType, SessionDescription,
};
use crate::transport::{
    MediaDevices, MediaTrack, PeerConnection, PeerConnectionFactory, TrackKind, TrackSource,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CreateOffer,
    CreateAnswer,
    SetRemote(SdpType),
    AddCandidate(String),
    AddTrack(TrackSource),
    ReplaceTrack(TrackKind, Option<TrackSource>),
    Close,
}

#[derive(Default)]
pub struct FakePeerConnection {
    calls: Mutex<Vec<Call>>,
    senders: Mutex<HashSet<TrackKind>>,
    pub fail_remote: AtomicBool,
}

impl FakePeerConnection {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.calls.lock().contains(&Call::Close)
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl PeerConnection for FakePeerConnection {
    async fn create_offer(&self) -> Result<SessionDescription> {
        self.record(Call::CreateOffer);
        Ok(SessionDescription::offer("v=0 offer"))
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        self.record(Call::CreateAnswer);
        Ok(SessionDescription::answer("v=0 answer"))
    }

    async fn set_remote_description(&self, description: SessionDescription) -> Result<()> {
        self.record(Call::SetRemote(description.sdp_type));
        if self.fail_remote.load(Ordering::SeqCst) {
            return Err(Error::Transport("remote description rejected".to_string()));
        }
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        self.record(Call::AddCandidate(candidate.candidate));
        Ok(())
    }

    async fn add_track(&self, track: &MediaTrack) -> Result<()> {
        self.record(Call::AddTrack(track.source));
        self.senders.lock().insert(track.kind());
        Ok(())
    }

    async fn replace_track(&self, kind: TrackKind, track: Option<&MediaTrack>) -> Result<()> {
        self.record(Call::ReplaceTrack(kind, track.map(|t| t.source)));
        Ok(())
    }

    fn has_sender(&self, kind: TrackKind) -> bool {
        self.senders.lock().contains(&kind)
    }

    fn close(&self) {
        self.record(Call::Close);
    }
}

/// Hands out `FakePeerConnection`s and remembers every one it built.
#[derive(Default)]
pub struct FakeFactory {
    created: Mutex<Vec<(String, Arc<FakePeerConnection>)>>,
}

impl FakeFactory {
    /// The most recent connection built for `remote`.
    pub fn connection(&self, remote: &str) -> Arc<FakePeerConnection> {
        self.created
            .lock()
            .iter()
            .rev()
            .find(|(id, _)| id == remote)
            .map(|(_, pc)| pc.clone())
            .expect("no connection for remote")
    }

    pub fn created_count(&self) -> usize {
        self.created.lock().len()
    }
}

#[async_trait]
impl PeerConnectionFactory for FakeFactory {
    async fn create(&self, remote_id: &str) -> Result<Arc<dyn PeerConnection>> {
        let pc = Arc::new(FakePeerConnection::default());
        self.created.lock().push((remote_id.to_string(), pc.clone()));
        Ok(pc)
    }
}

#[derive(Default)]
pub struct FakeDevices {
    pub unavailable: Mutex<HashSet<TrackSource>>,
    acquired: Mutex<Vec<MediaTrack>>,
    stopped: Mutex<Vec<MediaTrack>>,
}

impl FakeDevices {
    pub fn acquired(&self) -> Vec<MediaTrack> {
        self.acquired.lock().clone()
    }

    pub fn stopped(&self) -> Vec<MediaTrack> {
        self.stopped.lock().clone()
    }
}

#[async_trait]
impl MediaDevices for FakeDevices {
    async fn acquire(&self, source: TrackSource) -> Result<MediaTrack> {
        if self.unavailable.lock().contains(&source) {
            return Err(Error::DeviceUnavailable(format!("{:?}", source)));
        }
        let track = MediaTrack::new(source);
        self.acquired.lock().push(track.clone());
        Ok(track)
    }

    fn stop(&self, track: &MediaTrack) {
        self.stopped.lock().push(track.clone());
    }
}

/// Drain everything queued for the relay, decoding signal payloads.
pub fn drain_signals(
    rx: &mut mpsc::UnboundedReceiver<RelayClientMessage>,
) -> Vec<(String, NegotiationPayload)> {
    let mut out = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        if let RelayClientMessage::Signal { to, payload } = msg {
            out.push((to, NegotiationPayload::parse(&payload).unwrap()));
        }
    }
    out
}

pub fn offer_payload() -> String {
    NegotiationPayload::Sdp(SessionDescription::offer("remote offer"))
        .encode()
        .unwrap()
}

pub fn answer_payload() -> String {
    NegotiationPayload::Sdp(SessionDescription::answer("remote answer"))
        .encode()
        .unwrap()
}

pub fn ice_payload(candidate: &str) -> String {
    NegotiationPayload::Ice(IceCandidate {
        candidate: candidate.to_string(),
        sdp_mid: Some("0".to_string()),
        sdp_m_line_index: Some(0),
    })
    .encode()
    .unwrap()
}
