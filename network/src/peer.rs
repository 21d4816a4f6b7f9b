//! Per-participant negotiation state machine
//!
//! ```text
//! Idle ──create_offer──> OfferPending ──accept_answer──> Connected
//!   └───create_answer──> AnswerPending ──media/connected─┘
//! any ──disconnect──> Disconnected
//! ```
//!
//! A transport is never reused after `Disconnected`; re-negotiating builds a
//! new one with a new generation.

use std::fmt;

use log::{debug, info, trace, warn};
use serde::Serialize;
use spatial::AudioGraph;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use voice_core::{Error, PlayerId, Transform};

use crate::environment::{AudioEnvironment, RenderedFrame};
use crate::rtc::{
    IceCandidate, MediaSource, PeerConnectionState, PeerEventSink, RtcBackend, RtcConnection,
    SessionDescription,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum NegotiationState {
    Idle,
    OfferPending,
    AnswerPending,
    Connected,
    Disconnected,
}

impl fmt::Display for NegotiationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// The real-time audio transport to one remote participant.
pub struct PeerTransport {
    player_id: PlayerId,
    generation: u64,
    state: NegotiationState,
    connection: Box<dyn RtcConnection>,
    route: watch::Sender<AudioGraph>,
    listener: watch::Receiver<Transform>,
    output: mpsc::UnboundedSender<RenderedFrame>,
    pump: Option<JoinHandle<()>>,
}

impl PeerTransport {
    /// Build the RTC connection and wrap it in an idle transport
    pub async fn open(
        backend: &dyn RtcBackend,
        environment: &AudioEnvironment,
        events: PeerEventSink,
        graph: AudioGraph,
    ) -> Result<Self, Error> {
        let player_id = events.player_id().clone();
        let generation = events.generation();
        let connection = backend.create_connection(events).await?;
        Ok(Self::new(connection, environment, player_id, generation, graph))
    }

    pub fn new(
        connection: Box<dyn RtcConnection>,
        environment: &AudioEnvironment,
        player_id: PlayerId,
        generation: u64,
        graph: AudioGraph,
    ) -> Self {
        let (route, _) = watch::channel(graph);
        debug!("Peer transport for {} created (generation {})", player_id, generation);
        Self {
            player_id,
            generation,
            state: NegotiationState::Idle,
            connection,
            route,
            listener: environment.watch_listener(),
            output: environment.output(),
            pump: None,
        }
    }

    pub fn player_id(&self) -> &PlayerId {
        &self.player_id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn state(&self) -> NegotiationState {
        self.state
    }

    /// Whether inbound media is being pumped to the output
    pub fn has_media(&self) -> bool {
        self.pump.as_ref().is_some_and(|pump| !pump.is_finished())
    }

    /// Current routing parameters
    pub fn graph(&self) -> AudioGraph {
        *self.route.borrow()
    }

    /// Change routing parameters; the media pump sees the change on its next frame
    pub fn update_graph<F: FnOnce(&mut AudioGraph)>(&self, f: F) {
        self.route.send_modify(f);
    }

    fn expect_state(&self, expected: NegotiationState, action: &str) -> Result<(), Error> {
        if self.state == expected {
            return Ok(());
        }
        if self.state == NegotiationState::Disconnected {
            return Err(Error::InvalidState(format!(
                "Cannot {} for {}: transport is disconnected",
                action, self.player_id
            )));
        }
        Err(Error::Protocol(format!(
            "Cannot {} for {} in state {}",
            action, self.player_id, self.state
        )))
    }

    /// Generate an offer and set it as the local description
    pub async fn create_offer(&mut self) -> Result<SessionDescription, Error> {
        self.expect_state(NegotiationState::Idle, "create an offer")?;

        let offer = self.connection.create_offer().await?;
        self.connection.set_local_description(offer.clone()).await?;
        self.state = NegotiationState::OfferPending;
        debug!("Offer created for {}", self.player_id);
        Ok(offer)
    }

    /// Apply a remote offer, then generate and set the answer
    pub async fn create_answer(
        &mut self,
        offer: SessionDescription,
    ) -> Result<SessionDescription, Error> {
        self.expect_state(NegotiationState::Idle, "answer an offer")?;

        self.connection.set_remote_description(offer).await?;
        let answer = self.connection.create_answer().await?;
        self.connection.set_local_description(answer.clone()).await?;
        self.state = NegotiationState::AnswerPending;
        debug!("Answer created for {}", self.player_id);
        Ok(answer)
    }

    /// Apply the answer to our outstanding offer
    pub async fn accept_answer(&mut self, answer: SessionDescription) -> Result<(), Error> {
        self.expect_state(
            NegotiationState::OfferPending,
            "accept an answer without an outstanding offer",
        )?;

        self.connection.set_remote_description(answer).await?;
        self.state = NegotiationState::Connected;
        info!("Negotiation with {} complete", self.player_id);
        Ok(())
    }

    pub async fn add_ice_candidate(&mut self, candidate: IceCandidate) -> Result<(), Error> {
        if self.state == NegotiationState::Disconnected {
            return Err(Error::InvalidState(format!(
                "Cannot add ICE candidate for {}: transport is disconnected",
                self.player_id
            )));
        }
        trace!("Adding ICE candidate for {}: {}", self.player_id, candidate.candidate);
        self.connection.add_ice_candidate(candidate).await
    }

    /// React to a connection state reported by the RTC stack
    pub fn on_connection_state(&mut self, state: PeerConnectionState) {
        debug!("Peer connection state for {}: {:?}", self.player_id, state);
        match state {
            PeerConnectionState::Connected => self.mark_connected(),
            PeerConnectionState::Failed => {
                warn!("Peer connection to {} failed", self.player_id)
            }
            _ => {}
        }
    }

    fn mark_connected(&mut self) {
        if self.state == NegotiationState::AnswerPending {
            self.state = NegotiationState::Connected;
            info!("Negotiation with {} complete", self.player_id);
        }
    }

    /// Route inbound media through the audio graph to the output
    pub fn attach_media(&mut self, source: Box<dyn MediaSource>) {
        if self.state == NegotiationState::Disconnected {
            debug!("Ignoring media for disconnected transport {}", self.player_id);
            return;
        }
        if let Some(previous) = self.pump.take() {
            debug!("Replacing media stream for {}", self.player_id);
            previous.abort();
        }

        info!("Media attached for {}", self.player_id);
        self.pump = Some(tokio::spawn(pump_media(
            self.player_id.clone(),
            source,
            self.route.subscribe(),
            self.listener.clone(),
            self.output.clone(),
        )));
        self.mark_connected();
    }

    /// Close the connection and stop the media pump. Idempotent.
    pub async fn disconnect(&mut self) {
        if self.state == NegotiationState::Disconnected {
            return;
        }
        self.state = NegotiationState::Disconnected;

        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
        if let Err(e) = self.connection.close().await {
            warn!("Error closing connection to {}: {}", self.player_id, e);
        }
        info!("Peer transport for {} disconnected", self.player_id);
    }
}

impl Drop for PeerTransport {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

async fn pump_media(
    player_id: PlayerId,
    mut source: Box<dyn MediaSource>,
    route: watch::Receiver<AudioGraph>,
    listener: watch::Receiver<Transform>,
    output: mpsc::UnboundedSender<RenderedFrame>,
) {
    loop {
        let payload = match source.read_frame().await {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                debug!("Media stream from {} ended", player_id);
                break;
            }
            Err(e) => {
                warn!("Error reading media from {}: {}", player_id, e);
                break;
            }
        };

        let gains = {
            let listener = *listener.borrow();
            route.borrow().render(&listener)
        };
        let Some(gains) = gains else {
            trace!("Dropping frame from muted {}", player_id);
            continue;
        };

        let frame = RenderedFrame {
            player_id: player_id.clone(),
            payload,
            gains,
        };
        if output.send(frame).is_err() {
            debug!("Audio output closed, stopping media from {}", player_id);
            break;
        }
    }
}
