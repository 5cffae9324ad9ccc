//! # Media Transport Seam
//!
//! The coordinator and the track manager never talk to a WebRTC stack
//! directly. They see a peer connection, a factory for peer connections and a
//! source of capture devices, all behind `async_trait` traits so the platform
//! layer (browser bindings, native WebRTC, or a test fake) plugs in from
//! outside.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::Result;
use crate::protocol::{IceCandidate, SessionDescription};

/// What a track carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Audio,
    Video,
}

/// Where a track was captured from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackSource {
    Microphone,
    Camera,
    Screen,
}

impl TrackSource {
    pub fn kind(self) -> TrackKind {
        match self {
            TrackSource::Microphone => TrackKind::Audio,
            TrackSource::Camera | TrackSource::Screen => TrackKind::Video,
        }
    }

    /// The capture device that provides tracks of `kind` by default.
    pub fn default_for(kind: TrackKind) -> Self {
        match kind {
            TrackKind::Audio => TrackSource::Microphone,
            TrackKind::Video => TrackSource::Camera,
        }
    }
}

/// A locally captured media track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaTrack {
    pub id: String,
    pub source: TrackSource,
}

impl MediaTrack {
    pub fn new(source: TrackSource) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            source,
        }
    }

    pub fn kind(&self) -> TrackKind {
        self.source.kind()
    }
}

/// One peer connection to one remote participant.
///
/// `create_offer` and `create_answer` also install the description they
/// return as the local description.
#[async_trait]
pub trait PeerConnection: Send + Sync {
    async fn create_offer(&self) -> Result<SessionDescription>;

    async fn create_answer(&self) -> Result<SessionDescription>;

    async fn set_remote_description(&self, description: SessionDescription) -> Result<()>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()>;

    /// Attach a new outgoing track. Needs renegotiation to take effect.
    async fn add_track(&self, track: &MediaTrack) -> Result<()>;

    /// Swap the track on the existing sender of `kind` in place, without
    /// renegotiation. `None` detaches the sender's track.
    async fn replace_track(&self, kind: TrackKind, track: Option<&MediaTrack>) -> Result<()>;

    /// Whether a sender for `kind` exists on this connection.
    fn has_sender(&self, kind: TrackKind) -> bool;

    fn close(&self);
}

/// Builds peer connections for new links.
#[async_trait]
pub trait PeerConnectionFactory: Send + Sync {
    async fn create(&self, remote_id: &str) -> Result<Arc<dyn PeerConnection>>;
}

/// Capture devices: microphone, camera and the display picker.
#[async_trait]
pub trait MediaDevices: Send + Sync {
    async fn acquire(&self, source: TrackSource) -> Result<MediaTrack>;

    /// Stop capturing. The track must not be used afterwards.
    fn stop(&self, track: &MediaTrack);
}

// ── Local Track Set ───────────────────────────────────────────────────────────

/// The current local tracks, at most one per kind. The video slot holds
/// either the camera or the screen share.
#[derive(Debug, Default, Clone)]
pub struct LocalTracks {
    audio: Option<MediaTrack>,
    video: Option<MediaTrack>,
}

/// Shared handle to the local track set. Written by the track manager only.
pub type SharedTracks = Arc<RwLock<LocalTracks>>;

impl LocalTracks {
    pub fn get(&self, kind: TrackKind) -> Option<&MediaTrack> {
        match kind {
            TrackKind::Audio => self.audio.as_ref(),
            TrackKind::Video => self.video.as_ref(),
        }
    }

    /// Store `track` in its kind's slot, returning whatever was there.
    pub fn set(&mut self, track: MediaTrack) -> Option<MediaTrack> {
        let slot = self.slot(track.kind());
        slot.replace(track)
    }

    pub fn take(&mut self, kind: TrackKind) -> Option<MediaTrack> {
        self.slot(kind).take()
    }

    pub fn all(&self) -> Vec<MediaTrack> {
        self.audio.iter().chain(self.video.iter()).cloned().collect()
    }

    pub fn is_screen_sharing(&self) -> bool {
        matches!(&self.video, Some(track) if track.source == TrackSource::Screen)
    }

    fn slot(&mut self, kind: TrackKind) -> &mut Option<MediaTrack> {
        match kind {
            TrackKind::Audio => &mut self.audio,
            TrackKind::Video => &mut self.video,
        }
    }
}
