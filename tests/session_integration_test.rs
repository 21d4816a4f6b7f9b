use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use network::testing::{FakeRtcBackend, RtcCall};
use network::{AudioEnvironment, IceCandidate, PeerConnectionState, RtcBackend};
use serde_json::{json, Value};
use spatial_voice::{ConnectionStatus, PlayerId, Session, SessionOptions};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use voice_core::DisconnectInfo;

type ServerSocket = WebSocketStream<TcpStream>;

async fn send(server: &mut ServerSocket, name: &str, payload: Value) {
    server
        .send(Message::Text(format!("{};{}", name, payload).into()))
        .await
        .unwrap();
}

async fn next_packet(server: &mut ServerSocket) -> (String, Value) {
    loop {
        match timeout(Duration::from_secs(2), server.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => {
                let (name, payload) = text.as_str().split_once(';').unwrap();
                if name == "keepAlive" {
                    continue;
                }
                return (name.to_string(), serde_json::from_str(payload).unwrap());
            }
            Ok(Some(Ok(_))) => continue,
            other => panic!("Expected a packet, got {:?}", other),
        }
    }
}

async fn wait_until<F: Fn() -> bool>(what: &str, condition: F) {
    let waited = timeout(Duration::from_secs(2), async {
        while !condition() {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "Timed out waiting for {}", what);
}

/// Accept one websocket client, reporting the request URI it asked for
async fn accept_one(listener: TcpListener) -> (ServerSocket, String) {
    let (stream, _) = listener.accept().await.unwrap();
    let (uri_tx, uri_rx) = oneshot::channel();
    let callback = move |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        let _ = uri_tx.send(request.uri().to_string());
        Ok(response)
    };
    let ws = tokio_tungstenite::accept_hdr_async(stream, callback)
        .await
        .unwrap();
    (ws, uri_rx.await.unwrap())
}

#[test_log::test(tokio::test)]
async fn test_full_session_over_tcp() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    let accepted = tokio::spawn(accept_one(listener));

    let (environment, mut frames) = AudioEnvironment::receive_only();
    let backend = Arc::new(FakeRtcBackend::new());
    let mut session = Session::new(
        &format!("http://{}", address),
        "room-42",
        Arc::new(environment),
        Arc::clone(&backend) as Arc<dyn RtcBackend>,
        SessionOptions::default(),
    )
    .unwrap();
    assert_eq!(session.endpoint().scheme(), "ws");

    let (disconnect_tx, mut disconnects) = mpsc::unbounded_channel::<DisconnectInfo>();
    session.on_disconnect().add_listener(move |info| {
        let _ = disconnect_tx.send(info.clone());
    });

    session.connect().await.unwrap();
    let (mut server, uri) = accepted.await.unwrap();
    assert_eq!(uri, "/connect?id=room-42");
    assert_eq!(session.status(), ConnectionStatus::Open);

    // Identity, roster and a position for the soon-to-be remote player
    send(&mut server, "localPlayerInfo", json!({"playerID": "p1"})).await;
    send(
        &mut server,
        "setPlayerEntries",
        json!({"p2": {"name": "Bob", "avatar": "https://example.org/bob.png"}}),
    )
    .await;
    send(
        &mut server,
        "updateTransform",
        json!({"playerID": "p2", "pos": [-2, 0, 0]}),
    )
    .await;
    send(&mut server, "requestOffer", json!({"playerID": "p2"})).await;

    let (name, payload) = next_packet(&mut server).await;
    assert_eq!(name, "returnOffer");
    assert_eq!(payload["playerID"], "p2");
    assert_eq!(payload["payload"]["type"], "offer");

    assert_eq!(session.local_id(), PlayerId::from("p1"));
    assert_eq!(
        session.roster().entry(&PlayerId::from("p2")).unwrap().name,
        "Bob"
    );

    send(
        &mut server,
        "handAnswer",
        json!({"playerID": "p2", "payload": {"type": "answer", "sdp": "v=0 remote"}}),
    )
    .await;
    let peer = backend.peer("p2").unwrap();
    wait_until("remote description", || {
        peer.calls()
            .iter()
            .any(|call| matches!(call, RtcCall::SetRemote(_)))
    })
    .await;

    // Locally gathered candidates go back to the server
    peer.report_state(PeerConnectionState::Connected);
    peer.gather_ice(IceCandidate {
        candidate: "candidate:1 1 udp 2122260223 10.0.0.2 50000 typ host".to_string(),
        sdp_mid: Some("0".to_string()),
        sdp_mline_index: Some(0),
        username_fragment: None,
    });
    let (name, payload) = next_packet(&mut server).await;
    assert_eq!(name, "returnIce");
    assert_eq!(payload["playerID"], "p2");
    assert_eq!(payload["payload"]["sdpMid"], "0");

    // Inbound audio is rendered from the left
    let media = peer.attach_media();
    media.send(Bytes::from_static(b"opus")).unwrap();
    let frame = timeout(Duration::from_secs(2), frames.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(frame.player_id, PlayerId::from("p2"));
    assert_eq!(frame.payload, Bytes::from_static(b"opus"));
    assert!(frame.gains.left > frame.gains.right);

    assert_eq!(
        session.set_volume(PlayerId::from("p2"), 5.0).await.unwrap(),
        2.0
    );

    send(&mut server, "disconnectRTC", json!({"playerID": "p2"})).await;
    wait_until("peer teardown", || peer.is_closed()).await;

    server
        .close(Some(CloseFrame {
            code: CloseCode::Normal,
            reason: "server going away".into(),
        }))
        .await
        .unwrap();

    let info = timeout(Duration::from_secs(2), disconnects.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(info, DisconnectInfo::clean("server going away"));
    wait_until("closed status", || {
        session.status() == ConnectionStatus::Closed
    })
    .await;

    session.shutdown().await;
    assert!(session.participants().iter().all(|p| p.id.as_str() == "p1"));
}

#[tokio::test]
async fn test_unreachable_server_reports_disconnect() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    drop(listener);

    let (environment, _frames) = AudioEnvironment::receive_only();
    let mut session = Session::new(
        &format!("ws://{}", address),
        "room",
        Arc::new(environment),
        Arc::new(FakeRtcBackend::new()) as Arc<dyn RtcBackend>,
        SessionOptions::default(),
    )
    .unwrap();

    let (disconnect_tx, mut disconnects) = mpsc::unbounded_channel::<DisconnectInfo>();
    session.on_disconnect().add_listener(move |info| {
        let _ = disconnect_tx.send(info.clone());
    });

    assert!(session.connect().await.is_err());
    assert_eq!(session.status(), ConnectionStatus::Closed);
    assert!(disconnects.try_recv().unwrap().errored);
}
