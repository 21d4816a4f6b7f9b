//! In-process RTC stack for tests
//!
//! [`FakeRtcBackend`] hands out connections that record every call and
//! produce canned descriptions. Each connection is mirrored by a
//! [`FakePeer`] handle so a test can play the RTC library's part: gather
//! candidates, report state changes and attach inbound media.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;
use voice_core::{Error, PlayerId};

use crate::rtc::{
    ChannelMediaSource, IceCandidate, PeerConnectionState, PeerEventKind, PeerEventSink,
    RtcBackend, RtcConnection, SessionDescription,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A call made on a fake connection
#[derive(Debug, Clone, PartialEq)]
pub enum RtcCall {
    CreateOffer,
    CreateAnswer,
    SetLocal(SessionDescription),
    SetRemote(SessionDescription),
    AddIce(IceCandidate),
    Close,
}

/// Test-side handle to one fake connection
#[derive(Clone)]
pub struct FakePeer {
    sink: PeerEventSink,
    calls: Arc<Mutex<Vec<RtcCall>>>,
    closed: Arc<AtomicBool>,
}

impl FakePeer {
    pub fn player_id(&self) -> &PlayerId {
        self.sink.player_id()
    }

    pub fn generation(&self) -> u64 {
        self.sink.generation()
    }

    pub fn calls(&self) -> Vec<RtcCall> {
        lock(&self.calls).clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Post a locally gathered candidate, as the RTC stack would
    pub fn gather_ice(&self, candidate: IceCandidate) -> bool {
        self.sink.post(PeerEventKind::IceCandidate(candidate))
    }

    pub fn report_state(&self, state: PeerConnectionState) -> bool {
        self.sink.post(PeerEventKind::StateChanged(state))
    }

    /// Attach inbound media; frames sent on the returned channel reach the peer transport
    pub fn attach_media(&self) -> mpsc::UnboundedSender<Bytes> {
        let (frames, source) = ChannelMediaSource::channel();
        self.sink.post(PeerEventKind::MediaAttached(Box::new(source)));
        frames
    }
}

/// Backend producing [`FakeConnection`]s
#[derive(Default)]
pub struct FakeRtcBackend {
    peers: Mutex<Vec<FakePeer>>,
    fail_offers: AtomicBool,
}

impl FakeRtcBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later `create_offer` fail
    pub fn fail_offers(&self, fail: bool) {
        self.fail_offers.store(fail, Ordering::SeqCst);
    }

    /// Every connection created so far, oldest first
    pub fn peers(&self) -> Vec<FakePeer> {
        lock(&self.peers).clone()
    }

    /// Most recent connection for `player_id`
    pub fn peer(&self, player_id: &str) -> Option<FakePeer> {
        lock(&self.peers)
            .iter()
            .rev()
            .find(|peer| peer.player_id().as_str() == player_id)
            .cloned()
    }

    pub fn connection_count(&self) -> usize {
        lock(&self.peers).len()
    }
}

#[async_trait]
impl RtcBackend for FakeRtcBackend {
    async fn create_connection(
        &self,
        events: PeerEventSink,
    ) -> Result<Box<dyn RtcConnection>, Error> {
        let peer = FakePeer {
            sink: events,
            calls: Arc::new(Mutex::new(Vec::new())),
            closed: Arc::new(AtomicBool::new(false)),
        };
        let connection = FakeConnection {
            label: format!("{}#{}", peer.player_id(), peer.generation()),
            calls: Arc::clone(&peer.calls),
            closed: Arc::clone(&peer.closed),
            fail_offers: self.fail_offers.load(Ordering::SeqCst),
        };
        lock(&self.peers).push(peer);
        Ok(Box::new(connection))
    }
}

/// Connection that records calls and returns `v=0` descriptions
pub struct FakeConnection {
    label: String,
    calls: Arc<Mutex<Vec<RtcCall>>>,
    closed: Arc<AtomicBool>,
    fail_offers: bool,
}

impl FakeConnection {
    fn record(&self, call: RtcCall) {
        lock(&self.calls).push(call);
    }
}

#[async_trait]
impl RtcConnection for FakeConnection {
    async fn create_offer(&self) -> Result<SessionDescription, Error> {
        self.record(RtcCall::CreateOffer);
        if self.fail_offers {
            return Err(Error::Negotiation(format!(
                "Offer refused for {}",
                self.label
            )));
        }
        Ok(SessionDescription::offer(format!("v=0 offer {}", self.label)))
    }

    async fn create_answer(&self) -> Result<SessionDescription, Error> {
        self.record(RtcCall::CreateAnswer);
        Ok(SessionDescription::answer(format!("v=0 answer {}", self.label)))
    }

    async fn set_local_description(&self, description: SessionDescription) -> Result<(), Error> {
        self.record(RtcCall::SetLocal(description));
        Ok(())
    }

    async fn set_remote_description(&self, description: SessionDescription) -> Result<(), Error> {
        self.record(RtcCall::SetRemote(description));
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), Error> {
        self.record(RtcCall::AddIce(candidate));
        Ok(())
    }

    async fn close(&self) -> Result<(), Error> {
        self.record(RtcCall::Close);
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fake_connection_records_calls() {
        let (events, mut received) = mpsc::unbounded_channel();
        let backend = FakeRtcBackend::new();
        let connection = backend
            .create_connection(PeerEventSink::new(PlayerId::from("p1"), 3, events))
            .await
            .unwrap();

        let offer = connection.create_offer().await.unwrap();
        assert_eq!(offer.sdp, "v=0 offer p1#3");
        connection.close().await.unwrap();

        let peer = backend.peer("p1").unwrap();
        assert_eq!(peer.generation(), 3);
        assert_eq!(peer.calls(), vec![RtcCall::CreateOffer, RtcCall::Close]);
        assert!(peer.is_closed());

        assert!(peer.report_state(PeerConnectionState::Connected));
        let event = received.recv().await.unwrap();
        assert_eq!(event.generation, 3);
        assert!(matches!(
            event.kind,
            PeerEventKind::StateChanged(PeerConnectionState::Connected)
        ));
    }
}
