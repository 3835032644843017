//! # Localisation module
//!
//! The rover's pose in the world frame. The world frame is Y-up, and the rover faces along its
//! body +Z axis.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::{UnitQuaternion, Vector3};
use serde::Serialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The current pose (position and attitude in the world frame) of the rover.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize)]
pub struct Pose {
    /// The position in the world frame
    ///
    /// Units: meters
    pub position_m: Vector3<f64>,

    /// The attitude of the rover in the world frame. This is a quaternion that will rotate an
    /// object from the rover body frame into the world frame.
    pub attitude_q: UnitQuaternion<f64>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Pose {
    pub fn new(position_m: Vector3<f64>, attitude_q: UnitQuaternion<f64>) -> Self {
        Self {
            position_m,
            attitude_q,
        }
    }

    /// Return the heading (rotation about the world +Y axis) of the rover in radians.
    ///
    /// Heading is given in the range (-pi, pi], with 0 facing along world +Z and pi/2 facing
    /// along world +X.
    pub fn get_heading(&self) -> f64 {
        let forward = self.attitude_q * Vector3::z();
        forward.x.atan2(forward.z)
    }
}
