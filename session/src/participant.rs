//! Participant records
//!
//! Local, remote and shadow participants share one record. Only a remote
//! participant owns a [`PeerTransport`]; a shadow only holds metadata that
//! arrived before its participant was known.

use network::{NegotiationState, PeerTransport};
use serde::Serialize;
use spatial::AudioGraph;
use voice_core::{resolve_panner, AudioModifier, PannerOptions, PannerOverride, PlayerId, Transform};

pub enum ParticipantKind {
    /// This client
    Local,
    /// Another client with a live audio transport
    Remote(PeerTransport),
    /// Buffered metadata for a participant not negotiated yet
    Shadow,
}

/// [`ParticipantKind`] without the transport, for snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Local,
    Remote,
    Shadow,
}

pub struct Participant {
    id: PlayerId,
    pub transform: Transform,
    pub modifier: AudioModifier,
    pub panner_override: Option<PannerOverride>,
    /// Master gain
    pub volume: f32,
    pub(crate) kind: ParticipantKind,
}

impl Participant {
    fn with_kind(id: PlayerId, volume: f32, kind: ParticipantKind) -> Self {
        Self {
            id,
            transform: Transform::default(),
            modifier: AudioModifier::default(),
            panner_override: None,
            volume,
            kind,
        }
    }

    pub fn local(id: PlayerId, volume: f32) -> Self {
        Self::with_kind(id, volume, ParticipantKind::Local)
    }

    pub fn shadow(id: PlayerId, volume: f32) -> Self {
        Self::with_kind(id, volume, ParticipantKind::Shadow)
    }

    pub fn id(&self) -> &PlayerId {
        &self.id
    }

    pub(crate) fn set_id(&mut self, id: PlayerId) -> PlayerId {
        std::mem::replace(&mut self.id, id)
    }

    pub fn kind(&self) -> &ParticipantKind {
        &self.kind
    }

    pub fn role(&self) -> Role {
        match self.kind {
            ParticipantKind::Local => Role::Local,
            ParticipantKind::Remote(_) => Role::Remote,
            ParticipantKind::Shadow => Role::Shadow,
        }
    }

    pub fn transport(&self) -> Option<&PeerTransport> {
        match &self.kind {
            ParticipantKind::Remote(transport) => Some(transport),
            _ => None,
        }
    }

    pub fn transport_mut(&mut self) -> Option<&mut PeerTransport> {
        match &mut self.kind {
            ParticipantKind::Remote(transport) => Some(transport),
            _ => None,
        }
    }

    /// Routing graph for this participant's current metadata
    pub fn graph(&self, defaults: &PannerOptions) -> AudioGraph {
        AudioGraph::new(
            self.modifier,
            resolve_panner(defaults, self.panner_override.as_ref()),
            self.volume,
            self.transform,
        )
    }

    /// Push the current metadata into the live graph, if there is one
    pub(crate) fn refresh_graph(&self, defaults: &PannerOptions) {
        if let ParticipantKind::Remote(transport) = &self.kind {
            let graph = self.graph(defaults);
            transport.update_graph(|current| *current = graph);
        }
    }

    /// Copy buffered metadata from `donor`
    pub(crate) fn absorb(&mut self, donor: &Participant) {
        self.transform = donor.transform;
        self.modifier = donor.modifier;
        self.panner_override = donor.panner_override;
        self.volume = donor.volume;
    }

    pub fn snapshot(&self) -> ParticipantSnapshot {
        ParticipantSnapshot {
            id: self.id.clone(),
            role: self.role(),
            transform: self.transform,
            modifier: self.modifier,
            panner_override: self.panner_override,
            volume: self.volume,
            negotiation: self.transport().map(|transport| transport.state()),
        }
    }
}

/// Read-only view of a participant
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantSnapshot {
    pub id: PlayerId,
    pub role: Role,
    pub transform: Transform,
    pub modifier: AudioModifier,
    pub panner_override: Option<PannerOverride>,
    pub volume: f32,
    /// Present for remote participants only
    pub negotiation: Option<NegotiationState>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use spatial::Branch;
    use voice_core::Vec3;

    #[test]
    fn shadow_defaults() {
        let shadow = Participant::shadow(PlayerId::from("p2"), 1.0);
        assert_eq!(shadow.role(), Role::Shadow);
        assert!(shadow.transport().is_none());
        assert_eq!(shadow.transform, Transform::default());
        assert_eq!(shadow.modifier, AudioModifier::default());

        let snapshot = shadow.snapshot();
        assert_eq!(snapshot.negotiation, None);
        assert_eq!(snapshot.volume, 1.0);
    }

    #[test]
    fn graph_uses_buffered_metadata() {
        let mut shadow = Participant::shadow(PlayerId::from("p3"), 0.5);
        shadow.transform.position = Vec3::new(1.0, 2.0, 3.0);
        shadow.modifier.spatialized = false;
        shadow.panner_override = Some(PannerOverride {
            max_distance: Some(5.0),
            ..Default::default()
        });

        let graph = shadow.graph(&PannerOptions::default());
        assert_eq!(graph.source().position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(graph.active_branch(), Branch::Direct);
        assert_eq!(graph.master_gain(), 0.5);
        assert_eq!(graph.panner().max_distance, 5.0);
        assert_eq!(
            graph.panner().ref_distance,
            PannerOptions::default().ref_distance
        );
    }

    #[test]
    fn absorb_copies_metadata() {
        let mut donor = Participant::shadow(PlayerId::from("p1"), 1.5);
        donor.transform.up = Vec3::new(0.0, 0.0, 1.0);
        donor.modifier.muted = true;

        let mut local = Participant::local(PlayerId::from("me"), 1.0);
        local.absorb(&donor);
        assert_eq!(local.transform, donor.transform);
        assert!(local.modifier.muted);
        assert_eq!(local.volume, 1.5);
        assert_eq!(local.role(), Role::Local);
    }
}
