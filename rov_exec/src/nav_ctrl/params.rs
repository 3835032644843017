//! Parameters structure for NavCtrl

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for Navigation control.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Params {
    /// Maximum linear speed of the rover.
    ///
    /// Units: meters/second
    pub speed_ms: f64,

    /// Rate at which the rover turns to face its target. Each tick the rover rotates by this
    /// fraction of the remaining angle per second, clamped to the full remaining angle.
    ///
    /// Units: 1/second
    pub rotate_speed: f64,

    /// Distance to the target at or below which the target has been reached.
    ///
    /// Units: meters
    pub arrival_radius_m: f64,

    /// Time to hold position after reaching a waypoint before moving to the next one. Zero moves
    /// on immediately.
    ///
    /// Units: seconds
    pub arrival_pause_s: f64,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            speed_ms: 2.0,
            rotate_speed: 1.0,
            arrival_radius_m: 0.1,
            arrival_pause_s: 0.5,
        }
    }
}
