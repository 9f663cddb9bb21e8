//! Desktop "pseudo-VR" look-around
//!
//! Desktop occupants steer their head freely while seated. The seat turns
//! with the head's heading and slides sideways as the occupant looks behind,
//! which reads as a chair swiveling under them.

use crate::util::quat::Quat;
use crate::util::vec3::Vec3;

/// Heading where the lateral shift starts on either side
const BIAS_START_DEGREES: f32 = 45.0;
/// Heading where the lateral shift reaches its maximum on either side
const BIAS_FULL_DEGREES: f32 = 90.0;

/// Local seat transform produced for one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeatTransform {
    pub rotation: Quat,
    pub offset: Vec3,
}

/// Stateless composer for the desktop seat transform
#[derive(Debug, Clone, Copy)]
pub struct TransformBlender {
    desktop_head_x_offset: f32,
}

impl TransformBlender {
    pub fn new(desktop_head_x_offset: f32) -> Self {
        Self {
            desktop_head_x_offset,
        }
    }

    /// Heading of `head_rotation` relative to `reference_rotation`, in [0, 360)
    pub fn heading(head_rotation: Quat, reference_rotation: Quat) -> f32 {
        (reference_rotation.inverse() * head_rotation).yaw_degrees()
    }

    /// Sideways shift for a heading in [0, 360)
    ///
    /// Zero on [0, 45], {180} and [315, 360). Ramps to `+max` over (45, 90]
    /// and holds until 180; mirrors to `-max` over [270, 315).
    pub fn lateral_bias(&self, heading: f32) -> f32 {
        let right_start = BIAS_START_DEGREES;
        let right_full = BIAS_FULL_DEGREES;
        let left_start = 360.0 - BIAS_START_DEGREES;
        let left_full = 360.0 - BIAS_FULL_DEGREES;

        if heading > right_start && heading < 180.0 {
            remap(right_start, right_full, 0.0, self.desktop_head_x_offset, heading)
        } else if heading > 180.0 && heading < left_start {
            -remap(left_start, left_full, 0.0, self.desktop_head_x_offset, heading)
        } else {
            0.0
        }
    }

    /// Compose the seat's local rotation and offset for this frame.
    ///
    /// Pitch and roll of the head are discarded; only heading turns the seat.
    pub fn compose(&self, head_rotation: Quat, reference_rotation: Quat, base_offset: Vec3) -> SeatTransform {
        let heading = Self::heading(head_rotation, reference_rotation);
        SeatTransform {
            rotation: Quat::from_yaw_degrees(heading),
            offset: base_offset + self.lateral_bias(heading) * Vec3::RIGHT,
        }
    }
}

/// Clamped inverse-lerp of `value` over [in_min, in_max] mapped onto [out_min, out_max]
pub fn remap(in_min: f32, in_max: f32, out_min: f32, out_max: f32, value: f32) -> f32 {
    let t = if in_min != in_max {
        ((value - in_min) / (in_max - in_min)).clamp(0.0, 1.0)
    } else {
        0.0
    };
    out_min + (out_max - out_min) * t
}
