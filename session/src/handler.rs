use log::{debug, error, info, warn};
use network::dispatch::PacketFilter;
use network::protocol::{names, Relay};
use network::{IceCandidate, Inbound, PacketDispatcher, PacketTransport, PeerEvent};
use tokio::sync::{mpsc, oneshot};
use voice_core::{Error, ErrorReport, Event, Observable, PlayerId};

use crate::packets::{self, ServerPacket};
use crate::participant::ParticipantSnapshot;
use crate::registry::SessionRegistry;
use crate::roster::PlayerList;

/// Commands from the [`Session`](crate::Session) facade
#[derive(Debug)]
pub enum SessionCommand {
    SetVolume {
        player_id: PlayerId,
        volume: f32,
        reply: oneshot::Sender<f32>,
    },
    Shutdown {
        done: oneshot::Sender<()>,
    },
}

/// State the handler publishes for collaborators
#[derive(Clone)]
pub struct SessionState {
    pub local_id: Observable<PlayerId>,
    pub participants: Observable<Vec<ParticipantSnapshot>>,
    pub roster: PlayerList,
    pub on_error: Event<ErrorReport>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            local_id: Observable::new(PlayerId::default()),
            participants: Observable::new(Vec::new()),
            roster: PlayerList::new(),
            on_error: Event::new(),
        }
    }
}

/// The session actor: applies server packets, RTC callbacks and commands one at a time
pub struct SessionHandler {
    registry: SessionRegistry,
    dispatcher: PacketDispatcher<ServerPacket>,
    transport: PacketTransport,
    state: SessionState,
    inbound: Inbound,
    peer_events: mpsc::UnboundedReceiver<PeerEvent>,
    commands: mpsc::Receiver<SessionCommand>,
}

impl SessionHandler {
    pub fn new(
        registry: SessionRegistry,
        transport: PacketTransport,
        state: SessionState,
        inbound: Inbound,
        peer_events: mpsc::UnboundedReceiver<PeerEvent>,
        commands: mpsc::Receiver<SessionCommand>,
    ) -> Self {
        Self {
            registry,
            dispatcher: packets::dispatcher(),
            transport,
            state,
            inbound,
            peer_events,
            commands,
        }
    }

    /// Drop frames before dispatch when `filter` returns `false`
    pub fn set_packet_filter(&mut self, filter: PacketFilter) {
        self.dispatcher.set_filter(filter);
    }

    /// Run until the connection closes, a shutdown arrives or the facade is dropped
    pub async fn run(mut self) {
        self.publish();
        loop {
            tokio::select! {
                // Frames from the signaling server
                frame = self.inbound.recv() => match frame {
                    Some(Ok(frame)) => self.handle_frame(&frame).await,
                    Some(Err(e)) => self.report(ErrorReport::from_error(&e)),
                    None => {
                        info!("Signaling connection closed, stopping session handler");
                        break;
                    }
                },

                // Callbacks from the RTC stack
                Some(event) = self.peer_events.recv() => {
                    let player_id = event.player_id.clone();
                    if let Some(candidate) = self.registry.handle_peer_event(event) {
                        self.send_ice(player_id, candidate);
                    }
                    self.publish();
                }

                command = self.commands.recv() => match command {
                    Some(SessionCommand::Shutdown { done }) => {
                        info!("Received shutdown command, exiting handler");
                        self.close().await;
                        let _ = done.send(());
                        return;
                    }
                    Some(command) => self.handle_command(command),
                    None => {
                        debug!("Session dropped, stopping session handler");
                        break;
                    }
                },
            }
        }
        self.close().await;
    }

    async fn close(&mut self) {
        self.transport.disconnect();
        self.registry.shutdown().await;
        self.publish();
    }

    async fn handle_frame(&mut self, frame: &str) {
        let packet = match self.dispatcher.dispatch(frame) {
            Ok(Some(packet)) => packet,
            Ok(None) => return,
            Err(report) => {
                self.report(report);
                return;
            }
        };

        if let Err(e) = self.handle_packet(packet).await {
            warn!("Error handling frame '{}': {}", frame, e);
            self.report(ErrorReport::from_error(&e).with_frame(frame));
        }
        self.publish();
    }

    async fn handle_packet(&mut self, packet: ServerPacket) -> Result<(), Error> {
        match packet {
            ServerPacket::LocalPlayerInfo(info) => {
                self.registry.set_local_identity(info.player_id).await;
                self.state
                    .local_id
                    .set_if_changed(self.registry.local_id().clone());
            }

            ServerPacket::UpdateTransform(update) => {
                self.registry
                    .apply_transform_update(&update.player_id, &update.transform);
            }

            ServerPacket::SetPannerOptions(options) => {
                self.registry.set_default_panner(&options);
            }

            ServerPacket::SetAudioModifier(packet) => {
                self.registry
                    .apply_audio_modifier(&packet.player_id, &packet.modifier);
            }

            ServerPacket::SetAudioParams(params) => {
                self.registry.apply_audio_params(&params);
            }

            ServerPacket::RequestOffer(target) => {
                info!("Server requested an offer for {}", target.player_id);
                let offer = self.registry.request_offer(&target.player_id).await?;
                self.transport
                    .send_json(names::RETURN_OFFER, &Relay::new(target.player_id, offer))?;
            }

            ServerPacket::HandOffer(relay) => {
                info!("Received offer from {}", relay.player_id);
                let answer = self
                    .registry
                    .answer_offer(&relay.player_id, relay.payload)
                    .await?;
                self.transport
                    .send_json(names::RETURN_ANSWER, &Relay::new(relay.player_id, answer))?;
            }

            ServerPacket::HandAnswer(relay) => {
                info!("Received answer from {}", relay.player_id);
                self.registry
                    .complete_negotiation(&relay.player_id, relay.payload)
                    .await?;
            }

            ServerPacket::HandIce(relay) => {
                self.registry
                    .add_ice_candidate(&relay.player_id, relay.payload)
                    .await?;
            }

            ServerPacket::DisconnectRtc(target) => {
                // Nothing changes for an unknown id; the report is informational
                if !self.registry.remove_participant(&target.player_id).await {
                    return Err(Error::NotFound(format!(
                        "No RTC connection to disconnect for player {}",
                        target.player_id
                    )));
                }
            }

            ServerPacket::SetPlayerEntries(entries) => {
                self.state.roster.set_entries(entries);
            }

            ServerPacket::RemovePlayerEntries(ids) => {
                self.state.roster.remove_entries(&ids);
                self.registry.discard_shadows(&ids);
            }
        }

        Ok(())
    }

    fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::SetVolume {
                player_id,
                volume,
                reply,
            } => {
                let applied = self.registry.set_volume(&player_id, volume);
                debug!("Volume of {} set to {}", player_id, applied);
                self.publish();
                let _ = reply.send(applied);
            }

            SessionCommand::Shutdown { .. } => {
                // Handled in `run` before we get here
                error!("Shutdown reached the command handler");
            }
        }
    }

    fn send_ice(&self, player_id: PlayerId, candidate: IceCandidate) {
        let relay = Relay::new(player_id, candidate);
        if let Err(e) = self.transport.send_json(names::RETURN_ICE, &relay) {
            warn!("Failed to forward ICE candidate for {}: {}", relay.player_id, e);
            self.report(ErrorReport::from_error(&e));
        }
    }

    fn report(&self, report: ErrorReport) {
        self.state.on_error.dispatch(&report);
    }

    fn publish(&self) {
        self.state.participants.set_if_changed(self.registry.snapshot());
    }
}
