//! Per-participant audio routing graph
//!
//! Inbound audio flows source → {spatial branch, direct branch} → master →
//! output. Exactly one branch is open at a time, selected by the
//! participant's `spatialized` flag. `muted` disables the source track, so
//! nothing reaches either branch.

use log::trace;
use voice_core::{AudioModifier, PannerOptions, Transform};

use crate::panner::{spatial_gains, ChannelGains};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    Spatial,
    Direct,
}

/// Gain stages and panner parameters for one remote participant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioGraph {
    spatial_gain: f32,
    direct_gain: f32,
    master_gain: f32,
    track_enabled: bool,
    panner: PannerOptions,
    source: Transform,
}

impl AudioGraph {
    pub fn new(modifier: AudioModifier, panner: PannerOptions, volume: f32, source: Transform) -> Self {
        let mut graph = Self {
            spatial_gain: 0.0,
            direct_gain: 0.0,
            master_gain: volume.max(0.0),
            track_enabled: true,
            panner,
            source,
        };
        graph.apply_modifier(modifier);
        graph
    }

    /// Switch branches and gate the track according to `modifier`
    pub fn apply_modifier(&mut self, modifier: AudioModifier) {
        let (spatial, direct) = if modifier.spatialized { (1.0, 0.0) } else { (0.0, 1.0) };
        self.spatial_gain = spatial;
        self.direct_gain = direct;
        self.track_enabled = !modifier.muted;
        trace!(
            "graph modifier applied: branch={:?} track_enabled={}",
            self.active_branch(),
            self.track_enabled
        );
    }

    pub fn set_master_gain(&mut self, volume: f32) {
        self.master_gain = volume.max(0.0);
    }

    pub fn set_panner(&mut self, panner: PannerOptions) {
        self.panner = panner;
    }

    pub fn set_source(&mut self, source: Transform) {
        self.source = source;
    }

    pub fn active_branch(&self) -> Branch {
        if self.spatial_gain > 0.0 {
            Branch::Spatial
        } else {
            Branch::Direct
        }
    }

    pub fn track_enabled(&self) -> bool {
        self.track_enabled
    }

    pub fn master_gain(&self) -> f32 {
        self.master_gain
    }

    pub fn panner(&self) -> &PannerOptions {
        &self.panner
    }

    pub fn source(&self) -> &Transform {
        &self.source
    }

    /// Output gains for the current listener pose, or `None` when the track
    /// is disabled and no audio may reach the output.
    pub fn render(&self, listener: &Transform) -> Option<ChannelGains> {
        if !self.track_enabled {
            return None;
        }

        let spatial = spatial_gains(&self.panner, listener, &self.source).scale(self.spatial_gain);
        let direct = ChannelGains::new(self.direct_gain, self.direct_gain);
        let mixed = ChannelGains::new(spatial.left + direct.left, spatial.right + direct.right);
        Some(mixed.scale(self.master_gain))
    }
}

impl Default for AudioGraph {
    fn default() -> Self {
        Self::new(
            AudioModifier::default(),
            PannerOptions::default(),
            1.0,
            Transform::default(),
        )
    }
}
