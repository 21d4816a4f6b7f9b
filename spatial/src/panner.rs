//! Panner math
//!
//! Distance attenuation, sound cones and equal-power panning, using the
//! formulas of the WebAudio `PannerNode` so a participant sounds the same
//! here as in a browser client given the same options.

use std::f32::consts::FRAC_PI_2;

use voice_core::{DistanceModel, PannerOptions, Transform, Vec3};

/// Left/right gain pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelGains {
    pub left: f32,
    pub right: f32,
}

impl ChannelGains {
    pub const SILENT: ChannelGains = ChannelGains {
        left: 0.0,
        right: 0.0,
    };

    pub const fn new(left: f32, right: f32) -> Self {
        Self { left, right }
    }

    pub fn scale(self, gain: f32) -> Self {
        Self::new(self.left * gain, self.right * gain)
    }
}

/// Gain applied for a source `distance` units away from the listener.
pub fn distance_gain(options: &PannerOptions, distance: f32) -> f32 {
    let ref_distance = options.ref_distance.max(0.0);
    let rolloff = options.rolloff_factor.max(0.0);

    match options.distance_model {
        DistanceModel::Linear => {
            let rolloff = rolloff.min(1.0);
            let max_distance = options.max_distance.max(ref_distance);
            let span = max_distance - ref_distance;
            if span <= f32::EPSILON {
                return if distance <= ref_distance { 1.0 } else { 1.0 - rolloff };
            }
            let d = distance.clamp(ref_distance, max_distance);
            1.0 - rolloff * (d - ref_distance) / span
        }
        DistanceModel::Inverse => {
            if ref_distance <= f32::EPSILON {
                return if distance <= f32::EPSILON { 1.0 } else { 0.0 };
            }
            let d = distance.max(ref_distance);
            ref_distance / (ref_distance + rolloff * (d - ref_distance))
        }
        DistanceModel::Exponential => {
            if ref_distance <= f32::EPSILON {
                return if distance <= f32::EPSILON { 1.0 } else { 0.0 };
            }
            let d = distance.max(ref_distance);
            (d / ref_distance).powf(-rolloff)
        }
    }
}

/// Cone attenuation for a source at `source` facing `orientation`.
///
/// A zero orientation or a full 360° inner cone means omnidirectional.
pub fn cone_gain(options: &PannerOptions, source: Vec3, orientation: Vec3, listener: Vec3) -> f32 {
    if options.cone_inner_angle >= 360.0 && options.cone_outer_angle >= 360.0 {
        return 1.0;
    }
    let (Some(facing), Some(to_listener)) = (orientation.normalized(), (listener - source).normalized())
    else {
        return 1.0;
    };

    let angle = to_listener.dot(facing).clamp(-1.0, 1.0).acos().to_degrees();
    let inner = options.cone_inner_angle.abs() / 2.0;
    let outer = options.cone_outer_angle.abs() / 2.0;

    if angle <= inner {
        1.0
    } else if angle >= outer {
        options.cone_outer_gain
    } else {
        let x = (angle - inner) / (outer - inner);
        1.0 + (options.cone_outer_gain - 1.0) * x
    }
}

/// Azimuth of `source` in the listener's frame, in degrees.
///
/// 0 is straight ahead, positive to the right, range `[-180, 180]`.
pub fn azimuth(listener: &Transform, source: Vec3) -> Option<f32> {
    let relative = (source - listener.position).normalized()?;
    let forward = listener.forward.normalized()?;
    let up = listener.up.normalized()?;
    let right = forward.cross(up).normalized()?;

    let x = relative.dot(right);
    let z = relative.dot(forward);
    Some(x.atan2(z).to_degrees())
}

/// Equal-power stereo gains for a source relative to the listener.
///
/// A source behind the listener is folded to the front hemisphere, and a
/// source at the listener's position is centered.
pub fn equal_power_pan(listener: &Transform, source: Vec3) -> ChannelGains {
    let mut azimuth = azimuth(listener, source).unwrap_or(0.0);
    if azimuth > 90.0 {
        azimuth = 180.0 - azimuth;
    } else if azimuth < -90.0 {
        azimuth = -180.0 - azimuth;
    }

    // 0 is full left, 1 is full right
    let pan = (azimuth + 90.0) / 180.0;
    let angle = pan * FRAC_PI_2;
    ChannelGains::new(angle.cos(), angle.sin())
}

/// Full panner output for one source: pan scaled by distance and cone gain.
pub fn spatial_gains(options: &PannerOptions, listener: &Transform, source: &Transform) -> ChannelGains {
    let distance = (source.position - listener.position).length();
    let attenuation = distance_gain(options, distance)
        * cone_gain(options, source.position, source.forward, listener.position);

    // HRTF rendering is not available, both models pan with equal power
    equal_power_pan(listener, source.position).scale(attenuation)
}
