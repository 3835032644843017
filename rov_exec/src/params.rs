//! # Rover Executable Parameters
//!
//! This module provide parameters for the rover executable, loaded from `rov_exec.toml`.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::path::{Path, PathBuf};

use comms_if::ctrl::ControlMode;
use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RovExecParams {
    /// Target period of one cycle.
    ///
    /// Units: seconds
    pub cycle_period_s: f64,

    /// File the waypoints are saved to and loaded from. Relative paths are relative to the
    /// software root.
    pub waypoint_file: PathBuf,

    /// Control mode at startup. `autonomous_replay` loops over the saved waypoints from the
    /// first cycle.
    #[serde(default)]
    pub control_mode: ControlMode,

    /// Number of consecutive cycle overruns after which the executable stops, zero to never stop.
    #[serde(default)]
    pub max_consec_cycle_overruns: u64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl RovExecParams {
    /// Number of cycles per second
    pub fn cycle_frequency_hz(&self) -> f64 {
        1.0 / self.cycle_period_s
    }

    /// The waypoint file, resolved against `root` if it is relative.
    pub fn waypoint_path<P: AsRef<Path>>(&self, root: P) -> PathBuf {
        if self.waypoint_file.is_absolute() {
            self.waypoint_file.clone()
        } else {
            root.as_ref().join(&self.waypoint_file)
        }
    }
}
