//! # Control module
//!
//! Discrete operator actions controlling waypoint recording and replay. Actions are written as
//! JSON, for instance in control scripts:
//!
//! ```text
//! {"action": "record"}
//! {"action": "replay", "mode": "loop", "reload": true}
//! ```

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// An action requested by the operator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ControlAction {
    /// Record the current rover position as a new waypoint.
    Record {
        #[serde(default)]
        status: WaypointStatus,
    },

    /// Persist the recorded waypoints.
    Save,

    /// Replace the in-memory waypoints with the persisted ones.
    Load,

    /// Replay the waypoints autonomously.
    Replay {
        mode: CycleMode,

        /// Load the persisted waypoints before starting.
        #[serde(default)]
        reload: bool,
    },

    /// Stop any replay and return to remote control.
    Abort,
}

/// How a waypoint sequence is traversed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleMode {
    /// Visit each waypoint once, then stop.
    LinearOnce,

    /// Return to the first waypoint after the last, forever.
    Loop,
}

/// Outcome recorded alongside a waypoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaypointStatus {
    Success,
    Failure,
}

/// Which actuation path is allowed to move the rover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlMode {
    /// Remote move commands are applied as impulses.
    RemoteControl,

    /// The navigation controller drives the rover along the waypoints.
    AutonomousReplay,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ControlAction {
    /// Parse an action from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json_str)
    }
}

impl Default for WaypointStatus {
    fn default() -> Self {
        WaypointStatus::Success
    }
}

impl Default for ControlMode {
    fn default() -> Self {
        ControlMode::RemoteControl
    }
}
