//! Audio modifier and panner parameter types
//!
//! Field names follow the WebAudio `PannerNode` options so the server can
//! send the same JSON it sends to browser clients.

use serde::{Deserialize, Serialize};

/// Flags controlling how a remote participant's audio is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioModifier {
    /// Route through the panner (true) or the direct path (false)
    pub spatialized: bool,
    /// Disable the participant's inbound tracks
    pub muted: bool,
}

impl Default for AudioModifier {
    fn default() -> Self {
        Self {
            spatialized: true,
            muted: false,
        }
    }
}

/// Partial modifier update; unset flags are left unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AudioModifierUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spatialized: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub muted: Option<bool>,
}

impl AudioModifierUpdate {
    pub fn apply_to(&self, modifier: &mut AudioModifier) {
        if let Some(spatialized) = self.spatialized {
            modifier.spatialized = spatialized;
        }
        if let Some(muted) = self.muted {
            modifier.muted = muted;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PanningModel {
    #[default]
    #[serde(rename = "HRTF")]
    Hrtf,
    #[serde(rename = "equalpower")]
    EqualPower,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceModel {
    Linear,
    #[default]
    Inverse,
    Exponential,
}

/// Spatialization parameters applied to a remote participant's audio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PannerOptions {
    pub panning_model: PanningModel,
    pub distance_model: DistanceModel,
    pub position_x: f32,
    pub position_y: f32,
    pub position_z: f32,
    pub orientation_x: f32,
    pub orientation_y: f32,
    pub orientation_z: f32,
    pub ref_distance: f32,
    pub max_distance: f32,
    pub rolloff_factor: f32,
    pub cone_inner_angle: f32,
    pub cone_outer_angle: f32,
    pub cone_outer_gain: f32,
}

impl Default for PannerOptions {
    fn default() -> Self {
        Self {
            panning_model: PanningModel::Hrtf,
            distance_model: DistanceModel::Inverse,
            position_x: 0.0,
            position_y: 0.0,
            position_z: 0.0,
            orientation_x: 0.0,
            orientation_y: 0.0,
            orientation_z: 0.0,
            ref_distance: 1.0,
            max_distance: 26.0,
            rolloff_factor: 1.0,
            cone_inner_angle: 360.0,
            cone_outer_angle: 0.0,
            cone_outer_gain: 0.0,
        }
    }
}

/// Per-participant panner override. Every field that is set replaces the
/// matching session default; unset fields inherit it.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PannerOverride {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub panning_model: Option<PanningModel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_model: Option<DistanceModel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position_x: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position_y: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position_z: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orientation_x: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orientation_y: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orientation_z: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ref_distance: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_distance: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rolloff_factor: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cone_inner_angle: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cone_outer_angle: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cone_outer_gain: Option<f32>,
}

impl PannerOverride {
    /// Effective options: the override's set fields on top of `defaults`
    pub fn resolve(&self, defaults: &PannerOptions) -> PannerOptions {
        PannerOptions {
            panning_model: self.panning_model.unwrap_or(defaults.panning_model),
            distance_model: self.distance_model.unwrap_or(defaults.distance_model),
            position_x: self.position_x.unwrap_or(defaults.position_x),
            position_y: self.position_y.unwrap_or(defaults.position_y),
            position_z: self.position_z.unwrap_or(defaults.position_z),
            orientation_x: self.orientation_x.unwrap_or(defaults.orientation_x),
            orientation_y: self.orientation_y.unwrap_or(defaults.orientation_y),
            orientation_z: self.orientation_z.unwrap_or(defaults.orientation_z),
            ref_distance: self.ref_distance.unwrap_or(defaults.ref_distance),
            max_distance: self.max_distance.unwrap_or(defaults.max_distance),
            rolloff_factor: self.rolloff_factor.unwrap_or(defaults.rolloff_factor),
            cone_inner_angle: self.cone_inner_angle.unwrap_or(defaults.cone_inner_angle),
            cone_outer_angle: self.cone_outer_angle.unwrap_or(defaults.cone_outer_angle),
            cone_outer_gain: self.cone_outer_gain.unwrap_or(defaults.cone_outer_gain),
        }
    }
}

/// Resolve the effective panner options for a participant.
pub fn resolve_panner(defaults: &PannerOptions, over: Option<&PannerOverride>) -> PannerOptions {
    match over {
        Some(over) => over.resolve(defaults),
        None => *defaults,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_modifier() {
        let modifier = AudioModifier::default();
        assert!(modifier.spatialized);
        assert!(!modifier.muted);
    }

    #[test]
    fn modifier_update_is_field_by_field() {
        let mut modifier = AudioModifier::default();
        let update: AudioModifierUpdate = serde_json::from_str(r#"{"muted": true}"#).unwrap();
        update.apply_to(&mut modifier);
        assert!(modifier.muted);
        assert!(modifier.spatialized);
    }

    #[test]
    fn panner_options_use_webaudio_names() {
        let options: PannerOptions = serde_json::from_str(
            r#"{"panningModel": "equalpower", "distanceModel": "linear", "maxDistance": 40}"#,
        )
        .unwrap();
        assert_eq!(options.panning_model, PanningModel::EqualPower);
        assert_eq!(options.distance_model, DistanceModel::Linear);
        assert_eq!(options.max_distance, 40.0);
        // Missing fields fall back to defaults
        assert_eq!(options.ref_distance, 1.0);
    }

    #[test]
    fn override_takes_precedence_per_field() {
        let defaults = PannerOptions::default();
        let over = PannerOverride {
            max_distance: Some(10.0),
            distance_model: Some(DistanceModel::Exponential),
            ..Default::default()
        };

        let resolved = resolve_panner(&defaults, Some(&over));
        assert_eq!(resolved.max_distance, 10.0);
        assert_eq!(resolved.distance_model, DistanceModel::Exponential);
        assert_eq!(resolved.rolloff_factor, defaults.rolloff_factor);
        assert_eq!(resolved.panning_model, defaults.panning_model);

        assert_eq!(resolve_panner(&defaults, None), defaults);
    }
}
