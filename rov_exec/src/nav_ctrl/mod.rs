//! # Navigation control module
//!
//! Drives the rover along a [`WaypointSequence`](crate::waypoint::WaypointSequence). Each tick
//! moves the rover towards the current target by at most `speed_ms * dt` and turns it to face the
//! target, detects arrival, and then selects the next target using the
//! [cycle index](crate::waypoint::next_index).
//!
//! ```text
//! Idle --start--> Moving --arrived--> Arrived --pause elapsed--> Moving
//!                    |                   
//!                    +--arrived at last (linear once)--> Complete
//! ```
//!
//! `abort` returns the controller to `Idle` from any state.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

pub use params::*;
pub use state::*;

use util::{archive::ArchiveError, params::LoadError};

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during NavCtrl operation.
#[derive(Debug, thiserror::Error)]
pub enum NavCtrlError {
    #[error("Could not load the NavCtrl parameters: {0}")]
    ParamLoadError(#[from] LoadError),

    #[error("Could not open the NavCtrl archives: {0}")]
    ArchiveError(#[from] ArchiveError),

    #[error("Cannot start navigation with an empty waypoint sequence")]
    EmptySequence,

    #[error("A waypoint sequence is already being followed")]
    SequenceAlreadyLoaded,

    #[error("Invalid time step of {0} s, expected a finite non-negative value")]
    InvalidDeltaTime(f64),
}
