//! Websocket signaling transport
//!
//! One connection task owns the socket. It writes queued outbound frames,
//! forwards inbound text frames, and emits the keep-alive packet on a fixed
//! interval; the three stop together when the socket closes.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, trace, warn};
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use url::Url;
use voice_core::{ConnectionStatus, DisconnectInfo, Error, Event, Observable};

use crate::packet::{encode_frame, validate_name, Payload};
use crate::protocol::{names, KeepAlive};

pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(15);

const UNKNOWN_ERROR: &str = "An unknown error has occurred.";

/// Frames received from the server, in order. Non-text frames arrive as
/// framing errors.
pub type Inbound = mpsc::UnboundedReceiver<Result<String, Error>>;

enum Outbound {
    Frame(String),
    Close,
}

struct Inner {
    endpoint: Url,
    keep_alive: Duration,
    status: Observable<ConnectionStatus>,
    on_disconnect: Event<DisconnectInfo>,
    outbound: Mutex<Option<mpsc::UnboundedSender<Outbound>>>,
}

impl Inner {
    fn outbound(&self) -> MutexGuard<'_, Option<mpsc::UnboundedSender<Outbound>>> {
        self.outbound.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Build `<server>/connect?id=<session>`, mapping http(s) to ws(s)
pub fn connect_url(server: &str, session_id: &str) -> Result<Url, Error> {
    let mut url = Url::parse(server)
        .map_err(|e| Error::Config(format!("Invalid server address '{}': {}", server, e)))?;

    let scheme = match url.scheme() {
        "http" => Some("ws"),
        "https" => Some("wss"),
        "ws" | "wss" => None,
        other => {
            return Err(Error::Config(format!(
                "Unsupported server scheme '{}'",
                other
            )))
        }
    };
    if let Some(scheme) = scheme {
        url.set_scheme(scheme)
            .map_err(|_| Error::Config(format!("Cannot use scheme {} for {}", scheme, server)))?;
    }

    url.path_segments_mut()
        .map_err(|_| Error::Config(format!("Server address '{}' cannot be a base", server)))?
        .pop_if_empty()
        .push("connect");
    url.query_pairs_mut().clear().append_pair("id", session_id);
    Ok(url)
}

/// Packet-framed signaling connection to one server.
///
/// Cloning yields another handle to the same connection.
#[derive(Clone)]
pub struct PacketTransport {
    inner: Arc<Inner>,
}

impl PacketTransport {
    pub fn new(endpoint: Url) -> Self {
        Self::with_keep_alive(endpoint, DEFAULT_KEEP_ALIVE)
    }

    pub fn with_keep_alive(endpoint: Url, keep_alive: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                endpoint,
                keep_alive,
                status: Observable::new(ConnectionStatus::Closed),
                on_disconnect: Event::new(),
                outbound: Mutex::new(None),
            }),
        }
    }

    pub fn endpoint(&self) -> &Url {
        &self.inner.endpoint
    }

    pub fn status(&self) -> ConnectionStatus {
        self.inner.status.get()
    }

    /// Status change notifications
    pub fn status_observable(&self) -> &Observable<ConnectionStatus> {
        &self.inner.status
    }

    /// Fired once per connection when the socket goes away
    pub fn on_disconnect(&self) -> &Event<DisconnectInfo> {
        &self.inner.on_disconnect
    }

    /// Open the websocket to the configured endpoint
    pub async fn connect(&self) -> Result<Inbound, Error> {
        self.begin_connect()?;
        info!("Connecting to {}", self.inner.endpoint);

        match tokio_tungstenite::connect_async(self.inner.endpoint.as_str()).await {
            Ok((ws, _response)) => self.attach(ws),
            Err(e) => {
                error!("Failed to connect to {}: {}", self.inner.endpoint, e);
                self.inner.status.set_if_changed(ConnectionStatus::Closed);
                self.inner
                    .on_disconnect
                    .dispatch(&DisconnectInfo::errored(format!("{} {}", UNKNOWN_ERROR, e)));
                Err(Error::Network(format!("Failed to connect: {}", e)))
            }
        }
    }

    /// Run the transport over an already established websocket
    pub fn connect_stream<S>(&self, ws: WebSocketStream<S>) -> Result<Inbound, Error>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        self.begin_connect()?;
        self.attach(ws)
    }

    fn begin_connect(&self) -> Result<(), Error> {
        let status = self.status();
        if status != ConnectionStatus::Closed || self.inner.outbound().is_some() {
            return Err(Error::InvalidState(format!(
                "Transport is already {}",
                status
            )));
        }
        self.inner.status.set_if_changed(ConnectionStatus::Connecting);
        Ok(())
    }

    fn attach<S>(&self, ws: WebSocketStream<S>) -> Result<Inbound, Error>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        *self.inner.outbound() = Some(outbound_tx);
        self.inner.status.set_if_changed(ConnectionStatus::Open);
        info!("Signaling connection open");

        tokio::spawn(run_connection(
            ws,
            outbound_rx,
            inbound_tx,
            Arc::clone(&self.inner),
        ));
        Ok(inbound_rx)
    }

    /// Queue a packet. The name is validated before anything else.
    pub fn send(&self, name: &str, payload: impl Into<Payload>) -> Result<(), Error> {
        validate_name(name)?;
        if self.status() != ConnectionStatus::Open {
            return Err(Error::InvalidState(format!(
                "Cannot send '{}': socket is {}",
                name,
                self.status()
            )));
        }

        let frame = encode_frame(name, &payload.into().into_text()?)?;
        trace!("Queueing frame {}", frame);

        let outbound = self.inner.outbound();
        let sender = outbound
            .as_ref()
            .ok_or_else(|| Error::Network("Connection task is not running".to_string()))?;
        sender
            .send(Outbound::Frame(frame))
            .map_err(|_| Error::Network("Connection task has stopped".to_string()))
    }

    /// Serialize `payload` as JSON and send it
    pub fn send_json<T: Serialize + ?Sized>(&self, name: &str, payload: &T) -> Result<(), Error> {
        validate_name(name)?;
        self.send(name, Payload::json(payload)?)
    }

    /// Close the connection. Calling this on a closed transport does nothing.
    pub fn disconnect(&self) {
        match self.status() {
            ConnectionStatus::Closing | ConnectionStatus::Closed => return,
            _ => {}
        }

        let outbound = self.inner.outbound().clone();
        if let Some(sender) = outbound {
            self.inner.status.set_if_changed(ConnectionStatus::Closing);
            if sender.send(Outbound::Close).is_err() {
                debug!("Connection task already stopped");
            }
        }
    }
}

fn keep_alive_frame() -> Result<String, Error> {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default();
    let payload = serde_json::to_string(&KeepAlive { timestamp })?;
    encode_frame(names::KEEP_ALIVE, &payload)
}

async fn run_connection<S>(
    ws: WebSocketStream<S>,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    inbound: mpsc::UnboundedSender<Result<String, Error>>,
    inner: Arc<Inner>,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut sink, mut stream) = ws.split();

    let period = inner.keep_alive;
    let mut keep_alive = time::interval_at(Instant::now() + period, period);
    keep_alive.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let info = loop {
        tokio::select! {
            command = outbound.recv() => match command {
                Some(Outbound::Frame(frame)) => {
                    if let Err(e) = sink.send(Message::Text(frame.into())).await {
                        error!("Failed to write frame: {}", e);
                        break DisconnectInfo::errored(format!("{} {}", UNKNOWN_ERROR, e));
                    }
                }
                Some(Outbound::Close) | None => {
                    debug!("Closing signaling connection");
                    if let Err(e) = sink.close().await {
                        debug!("Error while closing websocket: {}", e);
                    }
                    break DisconnectInfo::clean("Connection closed by client");
                }
            },

            message = stream.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    trace!("Received frame {}", text.as_str());
                    let _ = inbound.send(Ok(text.as_str().to_owned()));
                }
                Some(Ok(Message::Binary(data))) => {
                    warn!("Received binary frame of {} bytes", data.len());
                    let _ = inbound.send(Err(Error::Framing(format!(
                        "binary frame of {} bytes",
                        data.len()
                    ))));
                }
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame
                        .map(|f| f.reason.as_str().to_owned())
                        .unwrap_or_default();
                    info!("Server closed the connection: {}", reason);
                    break DisconnectInfo::clean(reason);
                }
                // Ping and pong are answered by tungstenite
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("Websocket error: {}", e);
                    break DisconnectInfo::errored(format!("{} {}", UNKNOWN_ERROR, e));
                }
                None => break DisconnectInfo::clean(""),
            },

            _ = keep_alive.tick() => {
                match keep_alive_frame() {
                    Ok(frame) => {
                        if let Err(e) = sink.send(Message::Text(frame.into())).await {
                            warn!("Failed to send keep-alive: {}", e);
                            break DisconnectInfo::errored(format!("{} {}", UNKNOWN_ERROR, e));
                        }
                    }
                    Err(e) => error!("Failed to encode keep-alive: {}", e),
                }
            }
        }
    };

    inner.outbound().take();
    inner.status.set_if_changed(ConnectionStatus::Closed);
    info!("Signaling connection closed (errored: {})", info.errored);
    inner.on_disconnect.dispatch(&info);
}
