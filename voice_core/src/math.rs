//! 3D vectors and participant transforms

use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Sub};

/// A 3D vector in world space.
///
/// Deserializes from either `[x, y, z]` or `{"x": .., "y": .., "z": ..}`,
/// serializes as an array.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "Vec3Repr", into = "[f32; 3]")]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Vec3Repr {
    Array([f32; 3]),
    Object { x: f32, y: f32, z: f32 },
}

impl From<Vec3Repr> for Vec3 {
    fn from(repr: Vec3Repr) -> Self {
        match repr {
            Vec3Repr::Array([x, y, z]) => Vec3::new(x, y, z),
            Vec3Repr::Object { x, y, z } => Vec3::new(x, y, z),
        }
    }
}

impl From<Vec3> for [f32; 3] {
    fn from(v: Vec3) -> Self {
        [v.x, v.y, v.z]
    }
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3::new(0.0, 0.0, 0.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn dot(self, other: Vec3) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(self, other: Vec3) -> Vec3 {
        Vec3::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    pub fn length(self) -> f32 {
        self.dot(self).sqrt()
    }

    /// Unit vector in the same direction, or `None` for a zero vector
    pub fn normalized(self) -> Option<Vec3> {
        let len = self.length();
        if len <= f32::EPSILON {
            None
        } else {
            Some(self * (1.0 / len))
        }
    }
}

impl Add for Vec3 {
    type Output = Vec3;

    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Vec3;

    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Vec3 {
    type Output = Vec3;

    fn mul(self, rhs: f32) -> Vec3 {
        Vec3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

/// Position and orientation of a participant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub forward: Vec3,
    pub up: Vec3,
}

impl Transform {
    /// Forward and up vectors for a `[pitch, yaw, roll]` rotation in degrees.
    ///
    /// Applied roll first, then pitch about +X, then yaw about +Y, starting
    /// from the default facing. Positive pitch looks up, positive yaw turns left.
    pub fn orientation_from_rotation(rotation: Vec3) -> (Vec3, Vec3) {
        let (sp, cp) = rotation.x.to_radians().sin_cos();
        let (sy, cy) = rotation.y.to_radians().sin_cos();
        let (sr, cr) = rotation.z.to_radians().sin_cos();

        let forward = Vec3::new(-sy * cp, sp, -cy * cp);
        let up = Vec3::new(-sr * cy + cr * sp * sy, cr * cp, sr * sy + cr * sp * cy);
        (forward, up)
    }
}

impl Default for Transform {
    /// Origin, facing -Z with +Y up
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            forward: Vec3::new(0.0, 0.0, -1.0),
            up: Vec3::new(0.0, 1.0, 0.0),
        }
    }
}

/// A partial transform update. Axes left as `None` are unchanged.
///
/// `rot` is pitch, yaw and roll in degrees. Explicit `forward` and `up`
/// win over the orientation derived from it.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TransformUpdate {
    #[serde(default, rename = "pos", skip_serializing_if = "Option::is_none")]
    pub position: Option<Vec3>,
    #[serde(default, rename = "rot", skip_serializing_if = "Option::is_none")]
    pub rotation: Option<Vec3>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forward: Option<Vec3>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub up: Option<Vec3>,
}

impl TransformUpdate {
    pub fn position(position: Vec3) -> Self {
        Self {
            position: Some(position),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.position.is_none()
            && self.rotation.is_none()
            && self.forward.is_none()
            && self.up.is_none()
    }

    /// Apply the set axes onto a transform
    pub fn apply_to(&self, transform: &mut Transform) {
        if let Some(position) = self.position {
            transform.position = position;
        }
        if let Some(rotation) = self.rotation {
            let (forward, up) = Transform::orientation_from_rotation(rotation);
            transform.forward = forward;
            transform.up = up;
        }
        if let Some(forward) = self.forward {
            transform.forward = forward;
        }
        if let Some(up) = self.up {
            transform.up = up;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vec3_parses_array_and_object_forms() {
        let a: Vec3 = serde_json::from_str("[1, 2, 3]").unwrap();
        let b: Vec3 = serde_json::from_str(r#"{"x": 1, "y": 2, "z": 3}"#).unwrap();
        assert_eq!(a, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(a, b);
        assert_eq!(serde_json::to_string(&a).unwrap(), "[1.0,2.0,3.0]");
    }

    #[test]
    fn cross_product_of_axes() {
        let x = Vec3::new(1.0, 0.0, 0.0);
        let y = Vec3::new(0.0, 1.0, 0.0);
        assert_eq!(x.cross(y), Vec3::new(0.0, 0.0, 1.0));
        assert_eq!(Vec3::ZERO.normalized(), None);
    }

    #[test]
    fn partial_update_leaves_other_axes() {
        let mut transform = Transform::default();
        let update: TransformUpdate = serde_json::from_str(r#"{"pos": [1, 2, 3]}"#).unwrap();
        update.apply_to(&mut transform);

        assert_eq!(transform.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(transform.forward, Transform::default().forward);
        assert_eq!(transform.up, Transform::default().up);

        let update = TransformUpdate {
            forward: Some(Vec3::new(1.0, 0.0, 0.0)),
            ..Default::default()
        };
        update.apply_to(&mut transform);
        assert_eq!(transform.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(transform.forward, Vec3::new(1.0, 0.0, 0.0));
    }

    fn assert_close(actual: Vec3, expected: Vec3) {
        assert!(
            (actual - expected).length() < 1e-5,
            "expected {:?}, got {:?}",
            expected,
            actual
        );
    }

    #[test]
    fn rotation_sets_orientation() {
        let (forward, up) = Transform::orientation_from_rotation(Vec3::ZERO);
        assert_close(forward, Transform::default().forward);
        assert_close(up, Transform::default().up);

        // Yaw turns left about +Y
        let (forward, up) = Transform::orientation_from_rotation(Vec3::new(0.0, 90.0, 0.0));
        assert_close(forward, Vec3::new(-1.0, 0.0, 0.0));
        assert_close(up, Vec3::new(0.0, 1.0, 0.0));

        // Looking straight up puts the top of the head towards +Z
        let (forward, up) = Transform::orientation_from_rotation(Vec3::new(90.0, 0.0, 0.0));
        assert_close(forward, Vec3::new(0.0, 1.0, 0.0));
        assert_close(up, Vec3::new(0.0, 0.0, 1.0));

        // Roll tilts up without moving forward
        let (forward, up) = Transform::orientation_from_rotation(Vec3::new(0.0, 0.0, 90.0));
        assert_close(forward, Vec3::new(0.0, 0.0, -1.0));
        assert_close(up, Vec3::new(-1.0, 0.0, 0.0));
    }

    #[test]
    fn explicit_axes_override_rotation() {
        let update: TransformUpdate =
            serde_json::from_str(r#"{"rot": [0, 90, 0], "up": [0, 0, 1]}"#).unwrap();
        assert!(!update.is_empty());

        let mut transform = Transform::default();
        update.apply_to(&mut transform);
        assert_close(transform.forward, Vec3::new(-1.0, 0.0, 0.0));
        assert_eq!(transform.up, Vec3::new(0.0, 0.0, 1.0));
        assert_eq!(transform.position, Vec3::ZERO);
    }
}
