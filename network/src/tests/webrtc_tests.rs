use crate::environment::AudioEnvironment;
use crate::peer::{NegotiationState, PeerTransport};
use crate::rtc::{PeerEventSink, RtcBackend, SdpType};
use crate::webrtc_if::WebRtcBackend;
use log::debug;
use spatial::AudioGraph;
use tokio::sync::mpsc;
use voice_core::PlayerId;

#[tokio::test]
async fn test_receive_only_offer() {
    let (environment, _frames) = AudioEnvironment::receive_only();
    let backend = WebRtcBackend::new(&[], &environment).unwrap();
    let (events_tx, _events_rx) = mpsc::unbounded_channel();

    let connection = backend
        .create_connection(PeerEventSink::new(PlayerId::from("p1"), 1, events_tx))
        .await
        .unwrap();

    let offer = connection.create_offer().await.unwrap();
    assert_eq!(offer.sdp_type, SdpType::Offer);
    // Verify that the offer looks like an SDP (starts with v=0)
    assert!(offer.sdp.starts_with("v=0"));
    assert!(offer.sdp.contains("m=audio"));
    assert!(offer.sdp.contains("a=recvonly"));
    debug!("Received valid SDP offer: {}", offer.sdp);

    connection.close().await.unwrap();
}

#[tokio::test]
async fn test_negotiation_between_backends() {
    let (caller_env, _caller_frames) = AudioEnvironment::new(Some(AudioEnvironment::opus_track()));
    let (callee_env, _callee_frames) = AudioEnvironment::receive_only();
    let caller_backend = WebRtcBackend::new(&[], &caller_env).unwrap();
    let callee_backend = WebRtcBackend::new(&[], &callee_env).unwrap();
    let (events_tx, _events_rx) = mpsc::unbounded_channel();

    let mut caller = PeerTransport::open(
        &caller_backend,
        &caller_env,
        PeerEventSink::new(PlayerId::from("callee"), 1, events_tx.clone()),
        AudioGraph::default(),
    )
    .await
    .unwrap();
    let mut callee = PeerTransport::open(
        &callee_backend,
        &callee_env,
        PeerEventSink::new(PlayerId::from("caller"), 2, events_tx),
        AudioGraph::default(),
    )
    .await
    .unwrap();

    let offer = caller.create_offer().await.unwrap();
    assert!(offer.sdp.contains("opus"));

    let answer = callee.create_answer(offer).await.unwrap();
    assert_eq!(answer.sdp_type, SdpType::Answer);
    assert_eq!(callee.state(), NegotiationState::AnswerPending);

    caller.accept_answer(answer).await.unwrap();
    assert_eq!(caller.state(), NegotiationState::Connected);

    caller.disconnect().await;
    callee.disconnect().await;
    assert_eq!(callee.state(), NegotiationState::Disconnected);
}
