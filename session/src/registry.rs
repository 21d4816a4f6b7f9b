//! Participant table for one session
//!
//! Holds the local participant plus every remote or shadow participant keyed
//! by id. Updates for ids that are not live yet are folded into a shadow;
//! creating the real entry consumes the shadow and keeps what it buffered.

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, info, trace, warn};
use network::protocol::SetAudioParams;
use network::{
    AudioEnvironment, IceCandidate, NegotiationState, PeerEvent, PeerEventKind, PeerEventSender,
    PeerEventSink, PeerTransport, RtcBackend, SessionDescription,
};
use voice_core::{
    AudioModifierUpdate, Error, PannerOptions, PannerOverride, PlayerId, TransformUpdate,
};

use crate::participant::{Participant, ParticipantKind, ParticipantSnapshot};

/// Volume bounds for participants
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeLimits {
    /// Volume of newly seen participants
    pub default: f32,
    /// Upper bound for `set_volume`
    pub max: f32,
}

impl Default for VolumeLimits {
    fn default() -> Self {
        Self {
            default: 1.0,
            max: 2.0,
        }
    }
}

pub struct SessionRegistry {
    local: Participant,
    others: HashMap<PlayerId, Participant>,
    /// Last generation handed to a peer transport
    generation: u64,
    default_panner: PannerOptions,
    volume: VolumeLimits,
    environment: Arc<AudioEnvironment>,
    backend: Arc<dyn RtcBackend>,
    events: PeerEventSender,
}

impl SessionRegistry {
    pub fn new(
        environment: Arc<AudioEnvironment>,
        backend: Arc<dyn RtcBackend>,
        events: PeerEventSender,
        volume: VolumeLimits,
    ) -> Self {
        Self {
            local: Participant::local(PlayerId::default(), volume.default),
            others: HashMap::new(),
            generation: 0,
            default_panner: PannerOptions::default(),
            volume,
            environment,
            backend,
            events,
        }
    }

    pub fn local(&self) -> &Participant {
        &self.local
    }

    pub fn local_id(&self) -> &PlayerId {
        self.local.id()
    }

    pub fn default_panner(&self) -> &PannerOptions {
        &self.default_panner
    }

    /// Look up a participant without creating anything
    pub fn participant(&self, id: &PlayerId) -> Option<&Participant> {
        if self.local.id() == id {
            return Some(&self.local);
        }
        self.others.get(id)
    }

    /// Number of remote and shadow participants
    pub fn len(&self) -> usize {
        self.others.len()
    }

    pub fn is_empty(&self) -> bool {
        self.others.is_empty()
    }

    /// Find a participant, creating a shadow for unknown ids when asked
    pub fn resolve_participant(
        &mut self,
        id: &PlayerId,
        create_shadow_if_missing: bool,
    ) -> Option<&mut Participant> {
        if create_shadow_if_missing {
            return Some(self.entry(id));
        }
        if self.local.id() == id {
            return Some(&mut self.local);
        }
        self.others.get_mut(id)
    }

    fn entry(&mut self, id: &PlayerId) -> &mut Participant {
        if self.local.id() == id {
            return &mut self.local;
        }
        let volume = self.volume.default;
        self.others.entry(id.clone()).or_insert_with(|| {
            debug!("Buffering updates for unknown player {}", id);
            Participant::shadow(id.clone(), volume)
        })
    }

    /// Become `new_id`, taking over whatever was known about that id
    pub async fn set_local_identity(&mut self, new_id: PlayerId) {
        if *self.local.id() == new_id {
            return;
        }

        if let Some(mut donor) = self.others.remove(&new_id) {
            info!(
                "Local player takes over the {:?} entry for {}",
                donor.role(),
                new_id
            );
            self.local.absorb(&donor);
            if let Some(transport) = donor.transport_mut() {
                transport.disconnect().await;
            }
        }

        let previous = self.local.set_id(new_id);
        info!(
            "Local player ID changed from '{}' to '{}'",
            previous,
            self.local.id()
        );
        self.environment.set_listener(self.local.transform);
    }

    pub fn apply_transform_update(&mut self, id: &PlayerId, update: &TransformUpdate) {
        let defaults = self.default_panner;
        let participant = self.entry(id);
        update.apply_to(&mut participant.transform);
        trace!("Transform of {} is now {:?}", id, participant.transform);

        let listener = match participant.kind() {
            ParticipantKind::Local => Some(participant.transform),
            _ => {
                participant.refresh_graph(&defaults);
                None
            }
        };
        if let Some(listener) = listener {
            self.environment.set_listener(listener);
        }
    }

    pub fn apply_audio_modifier(&mut self, id: &PlayerId, update: &AudioModifierUpdate) {
        let defaults = self.default_panner;
        let participant = self.entry(id);
        update.apply_to(&mut participant.modifier);
        debug!("Audio modifier of {} is now {:?}", id, participant.modifier);
        participant.refresh_graph(&defaults);
    }

    /// Spatialize, mute and panner override in one step
    pub fn apply_audio_params(&mut self, params: &SetAudioParams) {
        let defaults = self.default_panner;
        let participant = self.entry(&params.player_id);

        if let Some(spatialize) = params.spatialize {
            participant.modifier.spatialized = spatialize;
        }
        if let Some(mute) = params.mute {
            participant.modifier.muted = mute;
        }
        match (params.override_panner, params.panner_options) {
            (Some(true), Some(options)) => participant.panner_override = Some(options),
            (Some(false), _) => participant.panner_override = None,
            _ => {}
        }
        debug!(
            "Audio params of {}: {:?}, override set: {}",
            params.player_id,
            participant.modifier,
            participant.panner_override.is_some()
        );
        participant.refresh_graph(&defaults);
    }

    /// Merge `update` into the session defaults and re-resolve every graph
    pub fn set_default_panner(&mut self, update: &PannerOverride) {
        self.default_panner = update.resolve(&self.default_panner);
        debug!("Default panner options: {:?}", self.default_panner);
        for participant in self.others.values() {
            participant.refresh_graph(&self.default_panner);
        }
    }

    /// Set a participant's volume, clamped to the configured range. Returns the applied value.
    pub fn set_volume(&mut self, id: &PlayerId, volume: f32) -> f32 {
        let volume = if volume.is_nan() {
            0.0
        } else {
            volume.clamp(0.0, self.volume.max)
        };
        let defaults = self.default_panner;
        let participant = self.entry(id);
        participant.volume = volume;
        participant.refresh_graph(&defaults);
        volume
    }

    /// Create the peer transport for `id`, consuming its shadow if any.
    ///
    /// An existing transport for `id` is torn down and replaced.
    pub async fn begin_negotiation(&mut self, id: &PlayerId) -> Result<&mut PeerTransport, Error> {
        if self.local.id() == id {
            return Err(Error::Protocol(format!(
                "Cannot negotiate with the local player {}",
                id
            )));
        }

        let mut participant = match self.others.remove(id) {
            Some(mut existing) => {
                if let Some(transport) = existing.transport_mut() {
                    warn!("Player {} already has an RTC connection, replacing it", id);
                    transport.disconnect().await;
                }
                existing.kind = ParticipantKind::Shadow;
                existing
            }
            None => Participant::shadow(id.clone(), self.volume.default),
        };

        self.generation += 1;
        let events = PeerEventSink::new(id.clone(), self.generation, self.events.clone());
        let graph = participant.graph(&self.default_panner);
        match PeerTransport::open(self.backend.as_ref(), &self.environment, events, graph).await {
            Ok(transport) => participant.kind = ParticipantKind::Remote(transport),
            Err(e) => {
                self.others.insert(id.clone(), participant);
                return Err(e);
            }
        }

        info!("Player {} is now remote (generation {})", id, self.generation);
        self.others
            .entry(id.clone())
            .or_insert(participant)
            .transport_mut()
            .ok_or_else(|| Error::InvalidState(format!("No transport for {}", id)))
    }

    /// Start negotiation as the offering side
    pub async fn request_offer(&mut self, id: &PlayerId) -> Result<SessionDescription, Error> {
        let transport = self.begin_negotiation(id).await?;
        transport.create_offer().await
    }

    /// Start negotiation as the answering side
    pub async fn answer_offer(
        &mut self,
        id: &PlayerId,
        offer: SessionDescription,
    ) -> Result<SessionDescription, Error> {
        let transport = self.begin_negotiation(id).await?;
        transport.create_answer(offer).await
    }

    /// Apply the answer to our outstanding offer
    pub async fn complete_negotiation(
        &mut self,
        id: &PlayerId,
        answer: SessionDescription,
    ) -> Result<(), Error> {
        self.live_transport(id)?.accept_answer(answer).await
    }

    pub async fn add_ice_candidate(
        &mut self,
        id: &PlayerId,
        candidate: IceCandidate,
    ) -> Result<(), Error> {
        self.live_transport(id)?.add_ice_candidate(candidate).await
    }

    fn live_transport(&mut self, id: &PlayerId) -> Result<&mut PeerTransport, Error> {
        self.others
            .get_mut(id)
            .and_then(|participant| participant.transport_mut())
            .ok_or_else(|| Error::Protocol(format!("No RTC connection for player {}", id)))
    }

    /// Drop a remote or shadow participant. Returns whether it existed.
    pub async fn remove_participant(&mut self, id: &PlayerId) -> bool {
        let Some(mut participant) = self.others.remove(id) else {
            return false;
        };
        if let Some(transport) = participant.transport_mut() {
            transport.disconnect().await;
        }
        info!("Removed {:?} participant {}", participant.role(), id);
        true
    }

    /// Drop buffered shadows for players that left the session.
    /// Live participants are untouched. Returns how many were dropped.
    pub fn discard_shadows(&mut self, ids: &[PlayerId]) -> usize {
        let mut dropped = 0;
        for id in ids {
            if matches!(
                self.others.get(id).map(Participant::kind),
                Some(ParticipantKind::Shadow)
            ) {
                self.others.remove(id);
                debug!("Discarded buffered updates for {}", id);
                dropped += 1;
            }
        }
        dropped
    }

    /// Apply an RTC callback. Returns a candidate to forward to the server.
    ///
    /// Events for unknown players or older generations are dropped.
    pub fn handle_peer_event(&mut self, event: PeerEvent) -> Option<IceCandidate> {
        let PeerEvent {
            player_id,
            generation,
            kind,
        } = event;

        let Some(transport) = self
            .others
            .get_mut(&player_id)
            .and_then(|participant| participant.transport_mut())
        else {
            debug!("Dropping {:?} for unknown player {}", kind, player_id);
            return None;
        };
        if transport.generation() != generation {
            debug!(
                "Dropping {:?} for {} from stale generation {} (current {})",
                kind,
                player_id,
                generation,
                transport.generation()
            );
            return None;
        }

        match kind {
            PeerEventKind::IceCandidate(candidate) => {
                (transport.state() != NegotiationState::Disconnected).then_some(candidate)
            }
            PeerEventKind::StateChanged(state) => {
                transport.on_connection_state(state);
                None
            }
            PeerEventKind::MediaAttached(source) => {
                transport.attach_media(source);
                None
            }
        }
    }

    /// Every participant, local first, then by id
    pub fn snapshot(&self) -> Vec<ParticipantSnapshot> {
        let mut others: Vec<&Participant> = self.others.values().collect();
        others.sort_by(|a, b| a.id().cmp(b.id()));

        std::iter::once(&self.local)
            .chain(others)
            .map(Participant::snapshot)
            .collect()
    }

    /// Tear down every peer transport and forget every remote participant
    pub async fn shutdown(&mut self) {
        for (id, participant) in self.others.iter_mut() {
            if let Some(transport) = participant.transport_mut() {
                debug!("Closing RTC connection to {}", id);
                transport.disconnect().await;
            }
        }
        self.others.clear();
    }
}
