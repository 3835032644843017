//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::{UnitQuaternion, Vector3};
use num_traits::Float;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Vectors shorter than this have no usable direction.
pub const DIRECTION_EPSILON: f64 = 1e-9;

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

pub fn clamp<T>(value: &T, min: &T, max: &T) -> T
where
    T: Float,
{
    let mut ret = *value;

    if ret > *max {
        ret = *max
    }
    if ret < *min {
        ret = *min
    }

    ret
}

/// Move `current` in a straight line towards `target` by at most `max_delta`.
///
/// The target is returned exactly once it is within `max_delta`, so the result never overshoots.
/// A non-positive `max_delta` leaves `current` where it is.
pub fn move_towards(current: &Vector3<f64>, target: &Vector3<f64>, max_delta: f64) -> Vector3<f64> {
    let diff = target - current;
    let dist = diff.norm();

    if dist <= max_delta {
        return *target;
    }
    if max_delta <= 0.0 {
        return *current;
    }

    current + diff * (max_delta / dist)
}

/// The attitude which points the body +Z axis along `dir`, keeping +Y up.
///
/// Returns `None` if `dir` is too short to have a direction. If `dir` is vertical the world +Z
/// axis is used as up instead.
pub fn look_rotation(dir: &Vector3<f64>) -> Option<UnitQuaternion<f64>> {
    let norm = dir.norm();
    if norm < DIRECTION_EPSILON {
        return None;
    }

    let forward = dir / norm;
    let mut up = Vector3::y();
    if forward.cross(&up).norm() < DIRECTION_EPSILON {
        up = Vector3::z();
    }

    Some(UnitQuaternion::face_towards(&forward, &up))
}

/// Spherically interpolate from `current` towards `goal` by the fraction `t`, clamped to [0, 1].
pub fn slerp_towards(
    current: &UnitQuaternion<f64>,
    goal: &UnitQuaternion<f64>,
    t: f64,
) -> UnitQuaternion<f64> {
    let t = clamp(&t, &0.0, &1.0);

    // try_slerp only fails when the two are (almost) the same rotation
    current
        .try_slerp(goal, t, DIRECTION_EPSILON)
        .unwrap_or(*goal)
}
