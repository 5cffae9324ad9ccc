//! # Local Track Management
//!
//! Keeps the local audio and video tracks and pushes every change to every
//! peer link. A kind that already has a sender on a link is swapped in
//! place; a kind without one is added and the link renegotiated. Links still
//! negotiating get the track now and re-offer once they connect.
//!
//! Screen sharing takes over the video slot. Audio is never touched by it.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info};

use crate::error::Result;
use crate::negotiation::NegotiationCoordinator;
use crate::transport::{MediaDevices, MediaTrack, SharedTracks, TrackKind, TrackSource};

pub struct TrackManager {
    devices: Arc<dyn MediaDevices>,
    tracks: SharedTracks,
    /// Whether the user wants the camera on. Survives a screen share so the
    /// camera comes back when sharing stops.
    camera_wanted: bool,
}

impl TrackManager {
    pub fn new(devices: Arc<dyn MediaDevices>, tracks: SharedTracks) -> Self {
        Self {
            devices,
            tracks,
            camera_wanted: false,
        }
    }

    pub fn tracks(&self) -> &SharedTracks {
        &self.tracks
    }

    pub fn is_enabled(&self, kind: TrackKind) -> bool {
        match kind {
            TrackKind::Audio => self.tracks.read().get(TrackKind::Audio).is_some(),
            TrackKind::Video => self.camera_wanted,
        }
    }

    pub fn is_screen_sharing(&self) -> bool {
        self.tracks.read().is_screen_sharing()
    }

    /// Turn on the microphone or camera and push the new track to every link.
    pub async fn enable(
        &mut self,
        kind: TrackKind,
        coordinator: &mut NegotiationCoordinator,
    ) -> Result<()> {
        if kind == TrackKind::Video && self.is_screen_sharing() {
            debug!("Camera requested during screen share, deferred");
            self.camera_wanted = true;
            return Ok(());
        }
        if self.tracks.read().get(kind).is_some() {
            self.camera_wanted |= kind == TrackKind::Video;
            return Ok(());
        }

        let track = self.devices.acquire(TrackSource::default_for(kind)).await?;
        self.camera_wanted |= kind == TrackKind::Video;
        self.tracks.write().set(track.clone());
        info!(kind = ?kind, track = %track.id, "Local track enabled");

        self.push(coordinator, &track).await;
        Ok(())
    }

    /// Stop the track of `kind` and detach it from every link.
    pub async fn disable(
        &mut self,
        kind: TrackKind,
        coordinator: &mut NegotiationCoordinator,
    ) -> Result<()> {
        if kind == TrackKind::Video {
            self.camera_wanted = false;
            if self.is_screen_sharing() {
                return Ok(());
            }
        }

        let Some(track) = self.tracks.write().take(kind) else {
            return Ok(());
        };
        self.devices.stop(&track);
        info!(kind = ?kind, track = %track.id, "Local track disabled");

        self.detach(coordinator, kind).await;
        Ok(())
    }

    pub async fn start_screen_share(&mut self, coordinator: &mut NegotiationCoordinator) -> Result<()> {
        if self.is_screen_sharing() {
            return Ok(());
        }

        let screen = self.devices.acquire(TrackSource::Screen).await?;
        let camera = self.tracks.write().set(screen.clone());
        if let Some(camera) = camera {
            self.devices.stop(&camera);
        }
        info!(track = %screen.id, "Screen share started");

        self.push(coordinator, &screen).await;
        Ok(())
    }

    /// Also the handler for the display source ending on its own.
    pub async fn stop_screen_share(&mut self, coordinator: &mut NegotiationCoordinator) -> Result<()> {
        if !self.is_screen_sharing() {
            return Ok(());
        }

        let screen = self.tracks.write().take(TrackKind::Video);
        if let Some(screen) = screen {
            self.devices.stop(&screen);
        }
        info!(restore_camera = self.camera_wanted, "Screen share stopped");

        if self.camera_wanted {
            match self.devices.acquire(TrackSource::Camera).await {
                Ok(camera) => {
                    self.tracks.write().set(camera.clone());
                    self.push(coordinator, &camera).await;
                    return Ok(());
                }
                Err(e) => {
                    self.camera_wanted = false;
                    self.detach(coordinator, TrackKind::Video).await;
                    return Err(e);
                }
            }
        }

        self.detach(coordinator, TrackKind::Video).await;
        Ok(())
    }

    /// Stop every local track. Used on hang-up.
    pub fn stop_all(&mut self) {
        let mut tracks = self.tracks.write();
        for kind in [TrackKind::Audio, TrackKind::Video] {
            if let Some(track) = tracks.take(kind) {
                self.devices.stop(&track);
            }
        }
        self.camera_wanted = false;
    }

    /// Replace in place where a sender exists, otherwise add and renegotiate.
    async fn push(&self, coordinator: &mut NegotiationCoordinator, track: &MediaTrack) {
        let kind = track.kind();
        let results = join_all(coordinator.link_handles().into_iter().map(
            |(remote, connection)| async move {
                let added = if connection.has_sender(kind) {
                    connection.replace_track(kind, Some(track)).await.map(|()| false)
                } else {
                    connection.add_track(track).await.map(|()| true)
                };
                (remote, added)
            },
        ))
        .await;

        for (remote, added) in results {
            match added {
                Ok(true) => coordinator.renegotiate(&remote).await,
                Ok(false) => debug!(peer = %remote, kind = ?kind, "Track replaced"),
                Err(e) => coordinator.fail_link(&remote, e),
            }
        }
    }

    async fn detach(&self, coordinator: &mut NegotiationCoordinator, kind: TrackKind) {
        let results = join_all(
            coordinator
                .link_handles()
                .into_iter()
                .filter(|(_, connection)| connection.has_sender(kind))
                .map(|(remote, connection)| async move {
                    (remote, connection.replace_track(kind, None).await)
                }),
        )
        .await;

        for (remote, result) in results {
            if let Err(e) = result {
                coordinator.fail_link(&remote, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::negotiation::PeerLinkState;
    use crate::protocol::{ConnectionId, RelayClientMessage};
    use crate::testing::*;
    use crate::transport::LocalTracks;
    use parking_lot::RwLock;
    use tokio::sync::mpsc;

    struct Harness {
        manager: TrackManager,
        coordinator: NegotiationCoordinator,
        devices: Arc<FakeDevices>,
        factory: Arc<FakeFactory>,
        rx: mpsc::UnboundedReceiver<RelayClientMessage>,
    }

    fn harness() -> Harness {
        let tracks: SharedTracks = Arc::new(RwLock::new(LocalTracks::default()));
        let devices = Arc::new(FakeDevices::default());
        let factory = Arc::new(FakeFactory::default());
        let (tx, rx) = mpsc::unbounded_channel();
        let mut coordinator = NegotiationCoordinator::new(factory.clone(), tracks.clone(), tx);
        coordinator.set_local_id("b".to_string());
        Harness {
            manager: TrackManager::new(devices.clone(), tracks),
            coordinator,
            devices,
            factory,
            rx,
        }
    }

    /// Bring up a connected link to "a" (we are "b", so "a" offers).
    async fn connect_peer(h: &mut Harness) {
        let members: Vec<ConnectionId> = vec!["a".to_string(), "b".to_string()];
        h.coordinator.on_membership(&members).await;
        h.coordinator.on_signal("a", &offer_payload()).await;
        assert_eq!(h.coordinator.link_state("a"), Some(PeerLinkState::Connected));
        drain_signals(&mut h.rx);
    }

    fn replace_calls(h: &Harness) -> Vec<Call> {
        h.factory
            .connection("a")
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::ReplaceTrack(..) | Call::AddTrack(_)))
            .collect()
    }

    #[tokio::test]
    async fn test_enable_without_links_stores_track() {
        let mut h = harness();
        h.manager.enable(TrackKind::Audio, &mut h.coordinator).await.unwrap();

        assert!(h.manager.is_enabled(TrackKind::Audio));
        let stored = h.manager.tracks().read().get(TrackKind::Audio).cloned();
        assert_eq!(stored, h.devices.acquired().first().cloned());
    }

    #[tokio::test]
    async fn test_enable_adds_and_renegotiates_without_sender() {
        let mut h = harness();
        connect_peer(&mut h).await;

        h.manager.enable(TrackKind::Video, &mut h.coordinator).await.unwrap();

        assert_eq!(replace_calls(&h), vec![Call::AddTrack(TrackSource::Camera)]);
        assert_eq!(
            h.coordinator.link_state("a"),
            Some(PeerLinkState::AwaitingAnswer)
        );
        assert_eq!(drain_signals(&mut h.rx).len(), 1);
    }

    #[tokio::test]
    async fn test_enable_replaces_in_place_with_sender() {
        let mut h = harness();
        h.manager.enable(TrackKind::Audio, &mut h.coordinator).await.unwrap();
        connect_peer(&mut h).await;
        h.manager.disable(TrackKind::Audio, &mut h.coordinator).await.unwrap();

        h.manager.enable(TrackKind::Audio, &mut h.coordinator).await.unwrap();

        assert_eq!(
            replace_calls(&h),
            vec![
                Call::AddTrack(TrackSource::Microphone),
                Call::ReplaceTrack(TrackKind::Audio, None),
                Call::ReplaceTrack(TrackKind::Audio, Some(TrackSource::Microphone)),
            ]
        );
        assert_eq!(h.coordinator.link_state("a"), Some(PeerLinkState::Connected));
        assert!(drain_signals(&mut h.rx).is_empty());
    }

    #[tokio::test]
    async fn test_disable_stops_and_detaches() {
        let mut h = harness();
        h.manager.enable(TrackKind::Video, &mut h.coordinator).await.unwrap();
        connect_peer(&mut h).await;

        h.manager.disable(TrackKind::Video, &mut h.coordinator).await.unwrap();

        assert!(!h.manager.is_enabled(TrackKind::Video));
        assert_eq!(h.devices.stopped().len(), 1);
        assert_eq!(
            h.factory.connection("a").calls().last(),
            Some(&Call::ReplaceTrack(TrackKind::Video, None))
        );
        assert!(drain_signals(&mut h.rx).is_empty());
    }

    #[tokio::test]
    async fn test_screen_share_replaces_camera_and_restores_it() {
        let mut h = harness();
        h.manager.enable(TrackKind::Audio, &mut h.coordinator).await.unwrap();
        h.manager.enable(TrackKind::Video, &mut h.coordinator).await.unwrap();
        connect_peer(&mut h).await;

        h.manager.start_screen_share(&mut h.coordinator).await.unwrap();
        assert!(h.manager.is_screen_sharing());
        assert_eq!(h.devices.stopped()[0].source, TrackSource::Camera);
        assert!(h.manager.tracks().read().get(TrackKind::Audio).is_some());

        h.manager.stop_screen_share(&mut h.coordinator).await.unwrap();
        assert!(!h.manager.is_screen_sharing());
        assert_eq!(h.devices.stopped()[1].source, TrackSource::Screen);
        assert_eq!(
            h.manager.tracks().read().get(TrackKind::Video).map(|t| t.source),
            Some(TrackSource::Camera)
        );

        assert_eq!(
            replace_calls(&h),
            vec![
                Call::AddTrack(TrackSource::Microphone),
                Call::AddTrack(TrackSource::Camera),
                Call::ReplaceTrack(TrackKind::Video, Some(TrackSource::Screen)),
                Call::ReplaceTrack(TrackKind::Video, Some(TrackSource::Camera)),
            ]
        );
    }

    #[tokio::test]
    async fn test_stop_share_without_camera_detaches_video() {
        let mut h = harness();
        connect_peer(&mut h).await;

        h.manager.start_screen_share(&mut h.coordinator).await.unwrap();
        // No video sender yet: added and renegotiated
        assert_eq!(replace_calls(&h), vec![Call::AddTrack(TrackSource::Screen)]);
        h.coordinator.on_signal("a", &answer_payload()).await;

        h.manager.stop_screen_share(&mut h.coordinator).await.unwrap();
        assert!(h.manager.tracks().read().get(TrackKind::Video).is_none());
        assert_eq!(
            replace_calls(&h).last(),
            Some(&Call::ReplaceTrack(TrackKind::Video, None))
        );
    }

    #[tokio::test]
    async fn test_camera_toggled_during_share_applies_after() {
        let mut h = harness();
        h.manager.start_screen_share(&mut h.coordinator).await.unwrap();
        h.manager.enable(TrackKind::Video, &mut h.coordinator).await.unwrap();
        assert!(h.manager.is_screen_sharing());

        h.manager.stop_screen_share(&mut h.coordinator).await.unwrap();
        assert_eq!(
            h.manager.tracks().read().get(TrackKind::Video).map(|t| t.source),
            Some(TrackSource::Camera)
        );
    }

    #[tokio::test]
    async fn test_unavailable_device_changes_nothing() {
        let mut h = harness();
        h.devices.unavailable.lock().insert(TrackSource::Camera);

        let result = h.manager.enable(TrackKind::Video, &mut h.coordinator).await;
        assert!(matches!(result, Err(crate::Error::DeviceUnavailable(_))));
        assert!(!h.manager.is_enabled(TrackKind::Video));
        assert!(h.manager.tracks().read().all().is_empty());
    }

    #[tokio::test]
    async fn test_track_enabled_during_negotiation_reaches_peer() {
        let mut h = harness();
        h.coordinator.set_local_id("a".to_string());
        let members: Vec<ConnectionId> = vec!["a".to_string(), "b".to_string()];
        h.coordinator.on_membership(&members).await;
        assert_eq!(
            h.coordinator.link_state("b"),
            Some(PeerLinkState::AwaitingAnswer)
        );
        drain_signals(&mut h.rx);

        h.manager.enable(TrackKind::Audio, &mut h.coordinator).await.unwrap();
        // No second offer while the first is outstanding
        assert!(drain_signals(&mut h.rx).is_empty());

        h.coordinator.on_signal("b", &answer_payload()).await;

        assert_eq!(
            h.factory.connection("b").calls(),
            vec![
                Call::CreateOffer,
                Call::AddTrack(TrackSource::Microphone),
                Call::SetRemote(crate::protocol::SdpType::Answer),
                Call::CreateOffer,
            ]
        );
        assert_eq!(
            h.coordinator.link_state("b"),
            Some(PeerLinkState::AwaitingAnswer)
        );
        assert_eq!(drain_signals(&mut h.rx).len(), 1);
    }

    #[tokio::test]
    async fn test_track_enabled_on_idle_link_reaches_peer() {
        let mut h = harness();
        let members: Vec<ConnectionId> = vec!["a".to_string(), "b".to_string()];
        h.coordinator.on_membership(&members).await;

        h.manager.enable(TrackKind::Audio, &mut h.coordinator).await.unwrap();
        assert_eq!(
            h.factory.connection("a").calls(),
            vec![Call::AddTrack(TrackSource::Microphone)]
        );

        // Answering the remote offer connects the link, then our change is offered
        h.coordinator.on_signal("a", &offer_payload()).await;
        let signals = drain_signals(&mut h.rx);
        assert_eq!(signals.len(), 2);
        assert_eq!(
            h.coordinator.link_state("a"),
            Some(PeerLinkState::AwaitingAnswer)
        );
    }

    #[tokio::test]
    async fn test_stop_all() {
        let mut h = harness();
        h.manager.enable(TrackKind::Audio, &mut h.coordinator).await.unwrap();
        h.manager.enable(TrackKind::Video, &mut h.coordinator).await.unwrap();

        h.manager.stop_all();
        assert_eq!(h.devices.stopped().len(), 2);
        assert!(h.manager.tracks().read().all().is_empty());
        assert!(!h.manager.is_enabled(TrackKind::Video));
    }
}
