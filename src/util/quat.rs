use serde::{Deserialize, Serialize};
use std::ops::Mul;

use crate::util::vec3::Vec3;

/// Unit quaternion for seat and head orientation.
///
/// Euler conventions follow the engine the seat lives in: degrees, Y up,
/// applied roll (Z) first, then pitch (X), then yaw (Y).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Quat {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Default for Quat {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Quat {
    pub const IDENTITY: Quat = Quat { x: 0.0, y: 0.0, z: 0.0, w: 1.0 };

    /// Rotation of `degrees` around a (not necessarily normalized) axis
    pub fn from_axis_angle(axis: Vec3, degrees: f32) -> Self {
        let axis = axis.normalize();
        let half = degrees.to_radians() * 0.5;
        let (sin, cos) = half.sin_cos();
        Self {
            x: axis.x * sin,
            y: axis.y * sin,
            z: axis.z * sin,
            w: cos,
        }
    }

    /// Yaw-only rotation around the up axis
    #[inline]
    pub fn from_yaw_degrees(degrees: f32) -> Self {
        Self::from_axis_angle(Vec3::UP, degrees)
    }

    /// Build from euler angles in degrees (pitch = X, yaw = Y, roll = Z)
    pub fn from_euler_degrees(pitch: f32, yaw: f32, roll: f32) -> Self {
        Self::from_axis_angle(Vec3::UP, yaw)
            * Self::from_axis_angle(Vec3::RIGHT, pitch)
            * Self::from_axis_angle(Vec3::FORWARD, roll)
    }

    #[inline]
    pub fn length_sq(&self) -> f32 {
        self.x * self.x + self.y * self.y + self.z * self.z + self.w * self.w
    }

    pub fn normalize(&self) -> Self {
        let len = self.length_sq().sqrt();
        if len > 0.0 {
            Self {
                x: self.x / len,
                y: self.y / len,
                z: self.z / len,
                w: self.w / len,
            }
        } else {
            Self::IDENTITY
        }
    }

    /// Inverse rotation. Non-unit inputs are normalized first.
    pub fn inverse(&self) -> Self {
        let n = self.normalize();
        Self {
            x: -n.x,
            y: -n.y,
            z: -n.z,
            w: n.w,
        }
    }

    /// Rotate a vector by this quaternion
    pub fn rotate(&self, v: Vec3) -> Vec3 {
        let u = Vec3::new(self.x, self.y, self.z);
        let t = 2.0 * u.cross(v);
        v + self.w * t + u.cross(t)
    }

    /// Yaw (rotation about the up axis) in degrees, normalized to [0, 360)
    pub fn yaw_degrees(&self) -> f32 {
        let q = self.normalize();
        let sin_term = 2.0 * (q.x * q.z + q.w * q.y);
        let cos_term = 1.0 - 2.0 * (q.x * q.x + q.y * q.y);
        normalize_degrees(sin_term.atan2(cos_term).to_degrees())
    }

    /// Check if two rotations are approximately equal (q and -q are the same rotation)
    pub fn approx_eq(&self, other: Quat, epsilon: f32) -> bool {
        let dot = self.x * other.x + self.y * other.y + self.z * other.z + self.w * other.w;
        (1.0 - dot.abs()) < epsilon
    }
}

/// Wrap an angle in degrees into [0, 360)
pub fn normalize_degrees(degrees: f32) -> f32 {
    let wrapped = degrees.rem_euclid(360.0);
    // rem_euclid can round a tiny negative input up to exactly 360
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

impl Mul for Quat {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        Self {
            x: self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            y: self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            z: self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
            w: self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
        }
    }
}

impl Mul<Vec3> for Quat {
    type Output = Vec3;
    fn mul(self, rhs: Vec3) -> Vec3 {
        self.rotate(rhs)
    }
}
