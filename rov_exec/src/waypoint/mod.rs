//! # Waypoints
//!
//! Recorded rover positions, their persistence, and the policy for visiting them in turn.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod cycle;
mod store;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use chrono::{NaiveDateTime, Timelike};
use nalgebra::Vector3;

pub use comms_if::ctrl::{CycleMode, WaypointStatus};
pub use cycle::*;
pub use store::*;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Format of the `timestamp` field of persisted waypoints, `yyyy-MM-ddTHH:mm:ss`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A recorded position of the rover.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Waypoint {
    /// Position in the world frame
    ///
    /// Units: meters
    pub position_m: Vector3<f64>,

    pub status: WaypointStatus,

    /// Local time of recording, to the second.
    pub recorded_at: NaiveDateTime,
}

/// An ordered list of waypoints. Insertion order is traversal order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WaypointSequence {
    waypoints: Vec<Waypoint>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Waypoint {
    /// Record a new waypoint.
    ///
    /// The timestamp is truncated to whole seconds, the resolution of the persisted format.
    pub fn record(
        position_m: Vector3<f64>,
        status: WaypointStatus,
        timestamp: NaiveDateTime,
    ) -> Self {
        Self {
            position_m,
            status,
            recorded_at: timestamp.with_nanosecond(0).unwrap_or(timestamp),
        }
    }
}

impl WaypointSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, waypoint: Waypoint) {
        self.waypoints.push(waypoint);
    }

    pub fn get(&self, index: usize) -> Option<&Waypoint> {
        self.waypoints.get(index)
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Waypoint> {
        self.waypoints.iter()
    }
}

impl From<Vec<Waypoint>> for WaypointSequence {
    fn from(waypoints: Vec<Waypoint>) -> Self {
        Self { waypoints }
    }
}

impl std::iter::FromIterator<Waypoint> for WaypointSequence {
    fn from_iter<I: IntoIterator<Item = Waypoint>>(iter: I) -> Self {
        Self {
            waypoints: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_record_truncates_to_seconds() {
        let t = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_milli_opt(14, 5, 7, 950)
            .unwrap();

        let wp = Waypoint::record(Vector3::new(1.0, 2.0, 3.0), WaypointStatus::Success, t);

        assert_eq!(wp.recorded_at.format(TIMESTAMP_FORMAT).to_string(), "2024-03-09T14:05:07");
        assert_eq!(wp.recorded_at.nanosecond(), 0);
    }
}
