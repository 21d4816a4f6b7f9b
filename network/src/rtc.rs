//! Real-time transport seam
//!
//! The negotiator talks to the RTC stack only through these traits, so the
//! state machine can run against `webrtc` in production and against mocks in
//! tests. Callbacks from the stack are posted as [`PeerEvent`]s tagged with
//! the player and transport generation they belong to.

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use voice_core::{Error, PlayerId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Pranswer,
    Answer,
    Rollback,
}

/// Browser-compatible session description (`{type, sdp}`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub sdp_type: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Answer,
            sdp: sdp.into(),
        }
    }
}

/// Browser-compatible ICE candidate
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(rename = "sdpMid", default)]
    pub sdp_mid: Option<String>,
    #[serde(rename = "sdpMLineIndex", default)]
    pub sdp_mline_index: Option<u16>,
    #[serde(rename = "usernameFragment", default)]
    pub username_fragment: Option<String>,
}

/// Connection state reported by the RTC stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerConnectionState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

/// A stream of encoded audio frames from a remote player.
#[async_trait]
pub trait MediaSource: Send {
    /// Next frame, or `None` once the stream has ended
    async fn read_frame(&mut self) -> Result<Option<Bytes>, Error>;
}

/// Media source fed from a channel, for bridging audio produced elsewhere
pub struct ChannelMediaSource {
    frames: mpsc::UnboundedReceiver<Bytes>,
}

impl ChannelMediaSource {
    pub fn channel() -> (mpsc::UnboundedSender<Bytes>, Self) {
        let (tx, frames) = mpsc::unbounded_channel();
        (tx, Self { frames })
    }
}

#[async_trait]
impl MediaSource for ChannelMediaSource {
    async fn read_frame(&mut self) -> Result<Option<Bytes>, Error> {
        Ok(self.frames.recv().await)
    }
}

pub enum PeerEventKind {
    /// Locally gathered candidate to forward to the remote player
    IceCandidate(IceCandidate),
    StateChanged(PeerConnectionState),
    /// Inbound audio arrived
    MediaAttached(Box<dyn MediaSource>),
}

impl fmt::Debug for PeerEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeerEventKind::IceCandidate(c) => f.debug_tuple("IceCandidate").field(c).finish(),
            PeerEventKind::StateChanged(s) => f.debug_tuple("StateChanged").field(s).finish(),
            PeerEventKind::MediaAttached(_) => f.write_str("MediaAttached"),
        }
    }
}

/// Callback from the RTC stack, tagged with the transport it came from
#[derive(Debug)]
pub struct PeerEvent {
    pub player_id: PlayerId,
    pub generation: u64,
    pub kind: PeerEventKind,
}

pub type PeerEventSender = mpsc::UnboundedSender<PeerEvent>;

/// Posts events for one transport
#[derive(Clone)]
pub struct PeerEventSink {
    player_id: PlayerId,
    generation: u64,
    events: PeerEventSender,
}

impl PeerEventSink {
    pub fn new(player_id: PlayerId, generation: u64, events: PeerEventSender) -> Self {
        Self {
            player_id,
            generation,
            events,
        }
    }

    pub fn player_id(&self) -> &PlayerId {
        &self.player_id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Post an event. Returns `false` once the receiving loop is gone.
    pub fn post(&self, kind: PeerEventKind) -> bool {
        self.events
            .send(PeerEvent {
                player_id: self.player_id.clone(),
                generation: self.generation,
                kind,
            })
            .is_ok()
    }
}

/// One peer connection.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RtcConnection: Send + Sync {
    async fn create_offer(&self) -> Result<SessionDescription, Error>;
    async fn create_answer(&self) -> Result<SessionDescription, Error>;
    async fn set_local_description(&self, description: SessionDescription) -> Result<(), Error>;
    async fn set_remote_description(&self, description: SessionDescription) -> Result<(), Error>;
    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), Error>;
    async fn close(&self) -> Result<(), Error>;
}

/// Factory for peer connections.
#[async_trait]
pub trait RtcBackend: Send + Sync {
    /// Build a connection to `events.player_id()` with the local audio
    /// source attached (or a receive-only transceiver when there is none)
    async fn create_connection(
        &self,
        events: PeerEventSink,
    ) -> Result<Box<dyn RtcConnection>, Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn channel_source_ends_with_sender() {
        let (tx, mut source) = ChannelMediaSource::channel();
        tx.send(Bytes::from_static(b"frame")).unwrap();
        drop(tx);

        assert_eq!(source.read_frame().await.unwrap(), Some(Bytes::from_static(b"frame")));
        assert_eq!(source.read_frame().await.unwrap(), None);
    }

    #[test]
    fn event_sink_tags_events() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = PeerEventSink::new(PlayerId::from("p1"), 7, tx);

        assert!(sink.post(PeerEventKind::StateChanged(PeerConnectionState::Connected)));
        let event = rx.try_recv().unwrap();
        assert_eq!(event.player_id, PlayerId::from("p1"));
        assert_eq!(event.generation, 7);
        assert!(matches!(
            event.kind,
            PeerEventKind::StateChanged(PeerConnectionState::Connected)
        ));

        drop(rx);
        assert!(!sink.post(PeerEventKind::StateChanged(PeerConnectionState::Closed)));
    }
}
