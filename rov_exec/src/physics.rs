//! # Physics interface
//!
//! The rover body is driven through a [`PhysicsSink`], which accepts velocity changes from remote
//! commands and absolute poses from the navigation controller. [`SimBody`] is the kinematic body
//! used by the executable: it integrates its velocity and has no gravity or collisions.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::{trace, warn};
use nalgebra::{UnitQuaternion, Vector3};

use crate::loc::Pose;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Something that can be moved.
pub trait PhysicsSink {
    /// Apply an instantaneous change in velocity.
    ///
    /// Units: meters/second
    fn apply_impulse(&mut self, delta_v_ms: Vector3<f64>);

    /// Place the body at the given pose.
    fn set_pose(&mut self, position_m: Vector3<f64>, attitude_q: UnitQuaternion<f64>);
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Kinematic rover body.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimBody {
    pose: Pose,

    /// Units: meters/second
    velocity_ms: Vector3<f64>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SimBody {
    pub fn new(pose: Pose) -> Self {
        Self {
            pose,
            velocity_ms: Vector3::zeros(),
        }
    }

    pub fn pose(&self) -> Pose {
        self.pose
    }

    pub fn velocity_ms(&self) -> Vector3<f64> {
        self.velocity_ms
    }

    /// Bring the body to rest.
    pub fn halt(&mut self) {
        self.velocity_ms = Vector3::zeros();
    }

    /// Advance the body by `dt_s` seconds at its current velocity.
    ///
    /// The body stays put if the step would take it to a non-finite position.
    pub fn step(&mut self, dt_s: f64) {
        if dt_s <= 0.0 || !dt_s.is_finite() {
            return;
        }

        let position_m = self.pose.position_m + self.velocity_ms * dt_s;
        if position_m.iter().all(|p| p.is_finite()) {
            self.pose.position_m = position_m;
        }
    }
}

impl PhysicsSink for SimBody {
    /// Impulses which would leave the velocity non-finite are rejected.
    fn apply_impulse(&mut self, delta_v_ms: Vector3<f64>) {
        let velocity_ms = self.velocity_ms + delta_v_ms;

        if velocity_ms.iter().any(|v| !v.is_finite()) {
            warn!("Rejected impulse {:?}, velocity would not be finite", delta_v_ms);
            return;
        }

        self.velocity_ms = velocity_ms;
        trace!("Impulse {:?}, velocity now {:?}", delta_v_ms, self.velocity_ms);
    }

    fn set_pose(&mut self, position_m: Vector3<f64>, attitude_q: UnitQuaternion<f64>) {
        self.pose = Pose::new(position_m, attitude_q);
    }
}
