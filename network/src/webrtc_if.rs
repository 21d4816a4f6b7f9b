use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use log::{debug, error, info, warn};
use voice_core::Error;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::{APIBuilder, API};
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::rtp_transceiver::RTCRtpTransceiverInit;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

use crate::environment::AudioEnvironment;
use crate::rtc::{
    IceCandidate, MediaSource, PeerConnectionState, PeerEventKind, PeerEventSink, RtcBackend,
    RtcConnection, SdpType, SessionDescription,
};

/// `webrtc`-backed peer connection factory
pub struct WebRtcBackend {
    /// WebRTC API instance
    api: API,
    /// Configuration used for every peer connection
    rtc_config: RTCConfiguration,
    /// Local audio sent to every peer, if any
    microphone: Option<Arc<TrackLocalStaticSample>>,
}

impl WebRtcBackend {
    pub fn new(ice_servers: &[String], environment: &AudioEnvironment) -> Result<Self, Error> {
        let rtc_config = RTCConfiguration {
            ice_servers: ice_servers
                .iter()
                .map(|url| RTCIceServer {
                    urls: vec![url.clone()],
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        };

        let mut media_engine = MediaEngine::default();
        media_engine
            .register_default_codecs()
            .map_err(|e| Error::Network(format!("Failed to register codecs: {}", e)))?;
        let registry = register_default_interceptors(Registry::new(), &mut media_engine)
            .map_err(|e| Error::Network(format!("Failed to register interceptors: {}", e)))?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        Ok(Self {
            api,
            rtc_config,
            microphone: environment.microphone(),
        })
    }

    pub fn ice_server_count(&self) -> usize {
        self.rtc_config.ice_servers.len()
    }
}

#[async_trait]
impl RtcBackend for WebRtcBackend {
    async fn create_connection(
        &self,
        events: PeerEventSink,
    ) -> Result<Box<dyn RtcConnection>, Error> {
        let player_id = events.player_id().clone();
        debug!("Creating peer connection for {}", player_id);

        let pc = self
            .api
            .new_peer_connection(self.rtc_config.clone())
            .await
            .map_err(|e| Error::Negotiation(format!("Failed to create peer connection: {}", e)))?;

        // Set up ICE candidate handler
        let sink = events.clone();
        pc.on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
            let sink = sink.clone();
            Box::pin(async move {
                let Some(candidate) = candidate else {
                    debug!("ICE gathering complete for {}", sink.player_id());
                    return;
                };
                match candidate.to_json() {
                    Ok(init) => {
                        sink.post(PeerEventKind::IceCandidate(from_candidate_init(init)));
                    }
                    Err(e) => warn!("Failed to serialize ICE candidate: {}", e),
                }
            })
        }));

        // Set up connection state change handler
        let sink = events.clone();
        pc.on_peer_connection_state_change(Box::new(move |state: RTCPeerConnectionState| {
            let sink = sink.clone();
            Box::pin(async move {
                debug!("Peer connection state change for {}: {}", sink.player_id(), state);
                sink.post(PeerEventKind::StateChanged(map_state(state)));
            })
        }));

        // Set up track handler
        let sink = events;
        pc.on_track(Box::new(move |track, _receiver, _transceiver| {
            let sink = sink.clone();
            Box::pin(async move {
                let kind = track.kind();
                debug!(
                    "Track received for {}: id={}, kind={}",
                    sink.player_id(),
                    track.id(),
                    kind
                );
                if kind != RTPCodecType::Audio {
                    return;
                }
                sink.post(PeerEventKind::MediaAttached(Box::new(RemoteTrackSource { track })));
            })
        }));

        match &self.microphone {
            Some(track) => {
                let sender = pc
                    .add_track(Arc::clone(track) as Arc<dyn TrackLocal + Send + Sync>)
                    .await
                    .map_err(|e| Error::Negotiation(format!("Failed to add track: {}", e)))?;

                // RTCP has to be drained for the interceptors to work
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 1500];
                    while sender.read(&mut buf).await.is_ok() {}
                });
            }
            None => {
                warn!(
                    "No local audio source, negotiating receive-only audio with {}",
                    player_id
                );
                pc.add_transceiver_from_kind(
                    RTPCodecType::Audio,
                    Some(RTCRtpTransceiverInit {
                        direction: RTCRtpTransceiverDirection::Recvonly,
                        send_encodings: vec![],
                    }),
                )
                .await
                .map_err(|e| Error::Negotiation(format!("Failed to add transceiver: {}", e)))?;
            }
        }

        Ok(Box::new(WebRtcConnection { pc: Arc::new(pc) }))
    }
}

/// A `webrtc` peer connection
pub struct WebRtcConnection {
    pc: Arc<RTCPeerConnection>,
}

#[async_trait]
impl RtcConnection for WebRtcConnection {
    async fn create_offer(&self) -> Result<SessionDescription, Error> {
        let offer = self
            .pc
            .create_offer(None)
            .await
            .map_err(|e| Error::Negotiation(format!("Failed to create offer: {}", e)))?;
        from_rtc_description(offer)
    }

    async fn create_answer(&self) -> Result<SessionDescription, Error> {
        let answer = self
            .pc
            .create_answer(None)
            .await
            .map_err(|e| Error::Negotiation(format!("Failed to create answer: {}", e)))?;
        from_rtc_description(answer)
    }

    async fn set_local_description(&self, description: SessionDescription) -> Result<(), Error> {
        self.pc
            .set_local_description(to_rtc_description(description)?)
            .await
            .map_err(|e| Error::Negotiation(format!("Failed to set local description: {}", e)))
    }

    async fn set_remote_description(&self, description: SessionDescription) -> Result<(), Error> {
        self.pc
            .set_remote_description(to_rtc_description(description)?)
            .await
            .map_err(|e| Error::Negotiation(format!("Failed to set remote description: {}", e)))
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), Error> {
        self.pc
            .add_ice_candidate(RTCIceCandidateInit {
                candidate: candidate.candidate,
                sdp_mid: candidate.sdp_mid,
                sdp_mline_index: candidate.sdp_mline_index,
                username_fragment: candidate.username_fragment,
            })
            .await
            .map_err(|e| Error::Negotiation(format!("Failed to add ICE candidate: {}", e)))
    }

    async fn close(&self) -> Result<(), Error> {
        self.pc
            .close()
            .await
            .map_err(|e| Error::Network(format!("Failed to close peer connection: {}", e)))
    }
}

/// Inbound audio track
struct RemoteTrackSource {
    track: Arc<TrackRemote>,
}

#[async_trait]
impl MediaSource for RemoteTrackSource {
    async fn read_frame(&mut self) -> Result<Option<Bytes>, Error> {
        match self.track.read_rtp().await {
            Ok((packet, _attributes)) => Ok(Some(packet.payload)),
            Err(err) => {
                if err.to_string().contains("EOF") {
                    // Track has ended
                    info!("Audio track {} ended", self.track.id());
                    Ok(None)
                } else {
                    error!("Error reading from audio track: {}", err);
                    Err(Error::Network(format!("Failed to read audio track: {}", err)))
                }
            }
        }
    }
}

fn from_candidate_init(init: RTCIceCandidateInit) -> IceCandidate {
    IceCandidate {
        candidate: init.candidate,
        sdp_mid: init.sdp_mid,
        sdp_mline_index: init.sdp_mline_index,
        username_fragment: init.username_fragment,
    }
}

fn map_state(state: RTCPeerConnectionState) -> PeerConnectionState {
    match state {
        RTCPeerConnectionState::Connecting => PeerConnectionState::Connecting,
        RTCPeerConnectionState::Connected => PeerConnectionState::Connected,
        RTCPeerConnectionState::Disconnected => PeerConnectionState::Disconnected,
        RTCPeerConnectionState::Failed => PeerConnectionState::Failed,
        RTCPeerConnectionState::Closed => PeerConnectionState::Closed,
        _ => PeerConnectionState::New,
    }
}

fn from_rtc_description(description: RTCSessionDescription) -> Result<SessionDescription, Error> {
    let sdp_type = match description.sdp_type {
        RTCSdpType::Offer => SdpType::Offer,
        RTCSdpType::Pranswer => SdpType::Pranswer,
        RTCSdpType::Answer => SdpType::Answer,
        RTCSdpType::Rollback => SdpType::Rollback,
        RTCSdpType::Unspecified => {
            return Err(Error::Negotiation(
                "Session description has no type".to_string(),
            ))
        }
    };
    Ok(SessionDescription {
        sdp_type,
        sdp: description.sdp,
    })
}

fn to_rtc_description(description: SessionDescription) -> Result<RTCSessionDescription, Error> {
    let parsed = match description.sdp_type {
        SdpType::Offer => RTCSessionDescription::offer(description.sdp),
        SdpType::Answer => RTCSessionDescription::answer(description.sdp),
        SdpType::Pranswer => RTCSessionDescription::pranswer(description.sdp),
        SdpType::Rollback => {
            return Err(Error::Negotiation(
                "Rollback descriptions are not supported".to_string(),
            ))
        }
    };
    parsed.map_err(|e| Error::Negotiation(format!("Invalid session description: {}", e)))
}
