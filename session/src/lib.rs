//! Session management for the spatial voice client
//!
//! A [`Session`] is one connection to a signaling server. It owns the packet
//! transport and, while connected, a handler task that owns the participant
//! registry. Collaborators read snapshots and issue commands through the
//! facade; they never touch the registry directly.

use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use network::dispatch::PacketFilter;
use network::transport::DEFAULT_KEEP_ALIVE;
use network::{connect_url, AudioEnvironment, Inbound, PacketTransport, RtcBackend};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::WebSocketStream;
use url::Url;
use voice_core::{
    ConnectionStatus, DisconnectInfo, Error, ErrorReport, Event, Observable, PlayerId,
};

pub mod handler;
pub mod packets;
pub mod participant;
pub mod registry;
pub mod roster;

pub use handler::{SessionCommand, SessionHandler, SessionState};
pub use packets::ServerPacket;
pub use participant::{Participant, ParticipantKind, ParticipantSnapshot, Role};
pub use registry::{SessionRegistry, VolumeLimits};
pub use roster::PlayerList;

/// Tunables for a session
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionOptions {
    /// Interval between `keepAlive` packets
    pub keep_alive: Duration,
    pub volume: VolumeLimits,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            keep_alive: DEFAULT_KEEP_ALIVE,
            volume: VolumeLimits::default(),
        }
    }
}

/// One connection attempt to a signaling server.
///
/// A session connects at most once; create a new one to retry.
pub struct Session {
    transport: PacketTransport,
    environment: Arc<AudioEnvironment>,
    backend: Arc<dyn RtcBackend>,
    options: SessionOptions,
    state: SessionState,
    packet_filter: Option<PacketFilter>,
    started: bool,
    commands: Option<mpsc::Sender<SessionCommand>>,
    handler: Option<JoinHandle<()>>,
}

impl Session {
    /// Session for `<server_address>/connect?id=<session_id>`
    pub fn new(
        server_address: &str,
        session_id: &str,
        environment: Arc<AudioEnvironment>,
        backend: Arc<dyn RtcBackend>,
        options: SessionOptions,
    ) -> Result<Self, Error> {
        let endpoint = connect_url(server_address, session_id)?;
        Ok(Self::with_endpoint(endpoint, environment, backend, options))
    }

    pub fn with_endpoint(
        endpoint: Url,
        environment: Arc<AudioEnvironment>,
        backend: Arc<dyn RtcBackend>,
        options: SessionOptions,
    ) -> Self {
        Self {
            transport: PacketTransport::with_keep_alive(endpoint, options.keep_alive),
            environment,
            backend,
            options,
            state: SessionState::default(),
            packet_filter: None,
            started: false,
            commands: None,
            handler: None,
        }
    }

    /// Open the signaling connection and start handling packets
    pub async fn connect(&mut self) -> Result<(), Error> {
        self.ensure_not_started()?;
        let inbound = self.transport.connect().await?;
        self.start(inbound);
        Ok(())
    }

    /// Like [`connect`](Self::connect), over an already open websocket
    pub fn connect_stream<S>(&mut self, ws: WebSocketStream<S>) -> Result<(), Error>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        self.ensure_not_started()?;
        let inbound = self.transport.connect_stream(ws)?;
        self.start(inbound);
        Ok(())
    }

    fn ensure_not_started(&self) -> Result<(), Error> {
        if self.started {
            return Err(Error::InvalidState(
                "Session was already connected; create a new session to reconnect".to_string(),
            ));
        }
        Ok(())
    }

    fn start(&mut self, inbound: Inbound) {
        let (peer_events_tx, peer_events_rx) = mpsc::unbounded_channel();
        let (commands_tx, commands_rx) = mpsc::channel(32);

        let registry = SessionRegistry::new(
            Arc::clone(&self.environment),
            Arc::clone(&self.backend),
            peer_events_tx,
            self.options.volume,
        );
        let mut handler = SessionHandler::new(
            registry,
            self.transport.clone(),
            self.state.clone(),
            inbound,
            peer_events_rx,
            commands_rx,
        );
        if let Some(filter) = self.packet_filter.take() {
            handler.set_packet_filter(filter);
        }

        self.started = true;
        self.commands = Some(commands_tx);
        self.handler = Some(tokio::spawn(handler.run()));
        info!("Session started for {}", self.transport.endpoint());
    }

    /// Install a filter that sees every `(name, payload)` before dispatch;
    /// returning `false` drops the frame. Must be set before connecting.
    pub fn set_packet_filter<F>(&mut self, filter: F) -> Result<(), Error>
    where
        F: Fn(&str, &str) -> bool + Send + Sync + 'static,
    {
        if self.started {
            return Err(Error::InvalidState(
                "Packet filter must be set before connecting".to_string(),
            ));
        }
        self.packet_filter = Some(Box::new(filter));
        Ok(())
    }

    /// Close the connection and tear down every peer transport. Idempotent.
    pub async fn shutdown(&mut self) {
        if let Some(commands) = self.commands.take() {
            let (done, finished) = oneshot::channel();
            if commands
                .send(SessionCommand::Shutdown { done })
                .await
                .is_ok()
            {
                let _ = finished.await;
            }
        }
        self.transport.disconnect();

        if let Some(handler) = self.handler.take() {
            if let Err(e) = handler.await {
                warn!("Session handler ended abnormally: {}", e);
            }
        }
    }

    /// Set a participant's master volume. Returns the value applied after clamping.
    pub async fn set_volume(&self, player_id: PlayerId, volume: f32) -> Result<f32, Error> {
        let commands = self
            .commands
            .as_ref()
            .ok_or_else(|| Error::InvalidState("Session is not connected".to_string()))?;

        let (reply, applied) = oneshot::channel();
        commands
            .send(SessionCommand::SetVolume {
                player_id,
                volume,
                reply,
            })
            .await
            .map_err(|_| Error::InvalidState("Session handler has stopped".to_string()))?;
        applied
            .await
            .map_err(|_| Error::InvalidState("Session handler has stopped".to_string()))
    }

    pub fn endpoint(&self) -> &Url {
        self.transport.endpoint()
    }

    pub fn environment(&self) -> &Arc<AudioEnvironment> {
        &self.environment
    }

    pub fn status(&self) -> ConnectionStatus {
        self.transport.status()
    }

    pub fn status_observable(&self) -> &Observable<ConnectionStatus> {
        self.transport.status_observable()
    }

    /// Fired once when the signaling connection goes away
    pub fn on_disconnect(&self) -> &Event<DisconnectInfo> {
        self.transport.on_disconnect()
    }

    /// Every recovered error: bad frames, unknown packets, failed negotiations,
    /// requests naming a player without a connection
    pub fn on_error(&self) -> &Event<ErrorReport> {
        &self.state.on_error
    }

    /// Identifier the server assigned to us; empty until `localPlayerInfo`
    pub fn local_id(&self) -> PlayerId {
        self.state.local_id.get()
    }

    pub fn local_id_observable(&self) -> &Observable<PlayerId> {
        &self.state.local_id
    }

    pub fn participants(&self) -> Vec<ParticipantSnapshot> {
        self.state.participants.get()
    }

    pub fn participants_observable(&self) -> &Observable<Vec<ParticipantSnapshot>> {
        &self.state.participants
    }

    pub fn roster(&self) -> &PlayerList {
        &self.state.roster
    }
}

#[cfg(test)]
mod tests {
    mod session_tests;
}
