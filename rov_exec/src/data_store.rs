//! # Data Store

use comms_if::ctrl::ControlMode;
use log::{info, warn};

use crate::{
    nav_ctrl::{self, MovementStatus, NavCtrl, NavCtrlError},
    physics::{PhysicsSink, SimBody},
    waypoint::{WaypointSequence, WaypointStore},
};
use util::module::State;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Global data store for the executable.
pub struct DataStore {
    // Cycle management
    /// Number of cycles already executed
    pub num_cycles: u128,

    /// True if this cycle falls on a 1Hz boundary
    pub is_1_hz_cycle: bool,

    /// Session elapsed time at the start of the cycle
    pub sim_time_s: f64,

    /// Which actuation path moves the rover
    pub control_mode: ControlMode,

    /// True if the command agent is connected
    pub remote_available: bool,

    // Rover body
    pub body: SimBody,

    // Waypoints
    pub waypoints: WaypointSequence,
    pub waypoint_store: WaypointStore,

    // NavCtrl
    pub nav_ctrl: NavCtrl,
    pub nav_ctrl_output: Option<nav_ctrl::OutputData>,
    pub nav_ctrl_status_rpt: nav_ctrl::StatusReport,

    // Monitoring Counters
    /// Number of consecutive cycle overruns
    pub num_consec_cycle_overruns: u64,

    /// Number of move commands ignored during autonomous replay
    pub num_ignored_cmds: u64,
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl DataStore {
    pub fn new(waypoint_store: WaypointStore, control_mode: ControlMode) -> Self {
        Self {
            num_cycles: 0,
            is_1_hz_cycle: false,
            sim_time_s: 0.0,
            control_mode,
            remote_available: false,
            body: SimBody::default(),
            waypoints: WaypointSequence::new(),
            waypoint_store,
            nav_ctrl: NavCtrl::default(),
            nav_ctrl_output: None,
            nav_ctrl_status_rpt: nav_ctrl::StatusReport::default(),
            num_consec_cycle_overruns: 0,
            num_ignored_cmds: 0,
        }
    }

    /// Switch the actuation path.
    ///
    /// Entering autonomous replay brings the body to rest so that velocity from earlier remote
    /// commands does not resume once replay ends.
    pub fn set_control_mode(&mut self, mode: ControlMode) {
        if mode == self.control_mode {
            return;
        }

        if mode == ControlMode::AutonomousReplay {
            self.body.halt();
        }

        info!("Control mode {:?} -> {:?}", self.control_mode, mode);
        self.control_mode = mode;
    }

    /// Perform actions required at the start of a cycle.
    ///
    /// Clears those items that need clearing at the start of a cycle, and sets the 1Hz cycle flag.
    /// `sim_time_s` is the session elapsed time at the start of the cycle.
    pub fn cycle_start(&mut self, cycle_frequency_hz: f64, sim_time_s: f64) {
        let cycles_per_s = (cycle_frequency_hz.round() as u128).max(1);
        self.is_1_hz_cycle = self.num_cycles % cycles_per_s == 0;

        self.nav_ctrl_output = None;
        self.nav_ctrl_status_rpt = nav_ctrl::StatusReport::default();

        self.sim_time_s = sim_time_s;
    }

    /// Move the rover body by `dt_s` seconds according to the control mode.
    ///
    /// In remote control the body coasts at its current velocity. In autonomous replay NavCtrl
    /// places the body, and the mode returns to remote control once navigation completes or
    /// stops.
    pub fn proc_motion(&mut self, dt_s: f64) -> Result<(), NavCtrlError> {
        match self.control_mode {
            ControlMode::RemoteControl => {
                self.body.step(dt_s);
            }
            ControlMode::AutonomousReplay => {
                let input = nav_ctrl::InputData {
                    dt_s,
                    pose: self.body.pose(),
                };

                let (output, report) = self.nav_ctrl.proc(&input)?;
                self.body
                    .set_pose(output.pose.position_m, output.pose.attitude_q);

                self.nav_ctrl_output = Some(output);
                self.nav_ctrl_status_rpt = report;

                match report.status {
                    MovementStatus::Complete => {
                        info!("Replay complete");
                        self.set_control_mode(ControlMode::RemoteControl);
                    }
                    MovementStatus::Idle => {
                        warn!("NavCtrl is idle during replay, returning to remote control");
                        self.set_control_mode(ControlMode::RemoteControl);
                    }
                    _ => (),
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::waypoint::{CycleMode, JsonSerializer, MemMedium, Waypoint, WaypointStatus};
    use nalgebra::Vector3;

    fn data_store() -> DataStore {
        DataStore::new(
            WaypointStore::new(Box::new(MemMedium::new()), Box::new(JsonSerializer)),
            ControlMode::RemoteControl,
        )
    }

    #[test]
    fn test_remote_control_coasts() {
        let mut ds = data_store();
        ds.body.apply_impulse(Vector3::new(1.0, 0.0, 0.0));

        ds.proc_motion(0.5).unwrap();
        ds.proc_motion(0.5).unwrap();

        assert!((ds.body.pose().position_m - Vector3::new(1.0, 0.0, 0.0)).norm() < 1e-12);
        assert!(ds.nav_ctrl_output.is_none());
    }

    #[test]
    fn test_replay_returns_to_remote_control() {
        let mut ds = data_store();
        ds.nav_ctrl = NavCtrl::new(nav_ctrl::Params {
            arrival_pause_s: 0.0,
            ..Default::default()
        });
        ds.body.apply_impulse(Vector3::new(0.0, 0.0, 3.0));

        let t = util::time::local_now_s();
        ds.waypoints.push(Waypoint::record(
            Vector3::new(1.0, 0.0, 0.0),
            WaypointStatus::Success,
            t,
        ));
        ds.nav_ctrl
            .start(ds.waypoints.clone(), CycleMode::LinearOnce)
            .unwrap();
        ds.set_control_mode(ControlMode::AutonomousReplay);
        assert_eq!(ds.body.velocity_ms(), Vector3::zeros());

        for _ in 0..100 {
            ds.proc_motion(0.05).unwrap();
            if ds.control_mode == ControlMode::RemoteControl {
                break;
            }
        }

        assert_eq!(ds.control_mode, ControlMode::RemoteControl);
        assert_eq!(ds.nav_ctrl.status(), MovementStatus::Complete);
        assert!((ds.body.pose().position_m - Vector3::new(1.0, 0.0, 0.0)).norm() <= 0.1);
    }

    #[test]
    fn test_1_hz_cycle() {
        let mut ds = data_store();
        let mut flags = vec![];
        for i in 0..5 {
            ds.num_cycles = i;
            ds.cycle_start(2.0, i as f64 * 0.5);
            flags.push(ds.is_1_hz_cycle);
        }
        assert_eq!(flags, vec![true, false, true, false, true]);
    }
}
