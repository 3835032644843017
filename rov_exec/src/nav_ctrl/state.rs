//! Implementations for the NavCtrl state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, trace};
use nalgebra::{UnitQuaternion, Vector3};
use serde::Serialize;

// Internal
use super::{NavCtrlError, Params};
use crate::{
    loc::Pose,
    waypoint::{self, CycleMode, WaypointSequence},
};
use util::{
    archive::{ArchiveError, Archived, Archiver},
    maths,
    module::State,
    params,
    session::Session,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Navigation control module state
#[derive(Default)]
pub struct NavCtrl {
    pub(crate) params: Params,

    pub(crate) report: StatusReport,
    arch_report: Archiver,

    status: MovementStatus,

    /// The sequence being followed, `None` while idle.
    route: Option<Route>,

    /// Index of the waypoint currently being driven to.
    target_index: Option<usize>,

    /// Index of the next target, held while pausing at a waypoint.
    pending_index: Option<usize>,

    /// Units: seconds
    pause_remaining_s: f64,

    /// Pose output on the last tick, held once navigation is complete.
    last_pose: Option<Pose>,
}

struct Route {
    sequence: WaypointSequence,
    mode: CycleMode,
}

/// Input data to Navigation Control.
#[derive(Debug, Clone, Copy)]
pub struct InputData {
    /// Time elapsed since the last tick.
    ///
    /// Units: seconds
    pub dt_s: f64,

    /// The current pose of the rover.
    pub pose: Pose,
}

/// Output from NavCtrl, the pose the rover body shall be placed at.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct OutputData {
    pub pose: Pose,

    /// True on the tick the target waypoint was reached.
    pub arrived: bool,
}

/// Status report for NavCtrl processing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StatusReport {
    pub status: MovementStatus,
    pub target_index: Option<usize>,

    /// Units: meters
    pub dist_to_target_m: Option<f64>,

    pub arrived: bool,

    /// Units: seconds
    pub pause_remaining_s: f64,

    /// The rover was already on its target so there was no direction to turn towards.
    pub orientation_held: bool,
}

/// Snapshot of the navigation state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NavigationState {
    pub target_index: Option<usize>,
    pub pose: Option<Pose>,
    pub status: MovementStatus,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MovementStatus {
    /// No sequence loaded.
    Idle,

    /// Driving towards the target waypoint.
    Moving,

    /// Holding position at a reached waypoint before moving on.
    Arrived,

    /// The last waypoint of a linear sequence has been reached.
    Complete,
}

impl Default for MovementStatus {
    fn default() -> Self {
        MovementStatus::Idle
    }
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl NavCtrl {
    pub fn new(params: Params) -> Self {
        Self {
            params,
            ..Default::default()
        }
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn status(&self) -> MovementStatus {
        self.status
    }

    pub fn target_index(&self) -> Option<usize> {
        self.target_index
    }

    /// The traversal mode of the current sequence, `None` if idle.
    pub fn cycle_mode(&self) -> Option<CycleMode> {
        self.route.as_ref().map(|r| r.mode)
    }

    pub fn state(&self) -> NavigationState {
        NavigationState {
            target_index: self.target_index,
            pose: self.last_pose,
            status: self.status,
        }
    }

    /// Start following `sequence` from its first waypoint.
    ///
    /// A finished sequence may be restarted, but a sequence which is still being followed must
    /// be aborted first.
    pub fn start(
        &mut self,
        sequence: WaypointSequence,
        mode: CycleMode,
    ) -> Result<(), NavCtrlError> {
        if matches!(self.status, MovementStatus::Moving | MovementStatus::Arrived) {
            return Err(NavCtrlError::SequenceAlreadyLoaded);
        }

        let first = match waypoint::next_index(sequence.len(), None, mode) {
            Ok(Some(i)) => i,
            _ => return Err(NavCtrlError::EmptySequence),
        };

        info!(
            "Starting navigation over {} waypoints ({:?})",
            sequence.len(),
            mode
        );

        self.route = Some(Route { sequence, mode });
        self.target_index = Some(first);
        self.pending_index = None;
        self.pause_remaining_s = 0.0;
        self.last_pose = None;
        self.status = MovementStatus::Moving;

        Ok(())
    }

    /// Stop navigating and drop the sequence.
    pub fn abort(&mut self) {
        if self.status != MovementStatus::Idle {
            info!("Navigation aborted in {:?}", self.status);
        }

        self.route = None;
        self.target_index = None;
        self.pending_index = None;
        self.pause_remaining_s = 0.0;
        self.last_pose = None;
        self.status = MovementStatus::Idle;
        self.report = StatusReport::default();
    }

    /// Advance navigation by `dt_s` seconds from the given pose.
    ///
    /// Returns the new position, the new orientation, and whether the target was reached on this
    /// tick.
    pub fn tick(
        &mut self,
        dt_s: f64,
        position_m: Vector3<f64>,
        attitude_q: UnitQuaternion<f64>,
    ) -> Result<(Vector3<f64>, UnitQuaternion<f64>, bool), NavCtrlError> {
        let output = self.step(dt_s, Pose::new(position_m, attitude_q))?;

        Ok((output.pose.position_m, output.pose.attitude_q, output.arrived))
    }

    fn step(&mut self, dt_s: f64, pose: Pose) -> Result<OutputData, NavCtrlError> {
        if !dt_s.is_finite() || dt_s < 0.0 {
            return Err(NavCtrlError::InvalidDeltaTime(dt_s));
        }

        // Clear the status report
        self.report = StatusReport::default();

        let output = match self.status {
            MovementStatus::Idle => OutputData {
                pose,
                arrived: false,
            },
            MovementStatus::Complete => OutputData {
                pose: self.last_pose.unwrap_or(pose),
                arrived: false,
            },
            MovementStatus::Arrived => {
                self.hold(dt_s);
                OutputData {
                    pose,
                    arrived: false,
                }
            }
            MovementStatus::Moving => self.drive(dt_s, pose),
        };

        if self.status != MovementStatus::Idle {
            self.last_pose = Some(output.pose);
        }

        self.report.status = self.status;
        self.report.target_index = self.target_index;
        self.report.arrived = output.arrived;
        self.report.pause_remaining_s = self.pause_remaining_s;

        Ok(output)
    }

    /// Count down the pause at a reached waypoint.
    fn hold(&mut self, dt_s: f64) {
        self.pause_remaining_s -= dt_s;

        if self.pause_remaining_s <= 0.0 {
            self.pause_remaining_s = 0.0;
            self.target_index = self.pending_index.take();
            self.status = MovementStatus::Moving;

            debug!("Pause over, heading to waypoint {:?}", self.target_index);
        }
    }

    /// Position and index of the current target, if there is one.
    fn target(&self) -> Option<(Vector3<f64>, usize)> {
        let index = self.target_index?;
        let waypoint = self.route.as_ref()?.sequence.get(index)?;

        Some((waypoint.position_m, index))
    }

    /// Move and turn towards the current target.
    ///
    /// Targets already within the arrival radius are passed through without spending the tick,
    /// so the full `speed_ms * dt_s` goes towards the first target still out of reach.
    fn drive(&mut self, dt_s: f64, pose: Pose) -> OutputData {
        let route_len = self.route.as_ref().map_or(0, |r| r.sequence.len());
        let mut arrived = false;
        let mut num_passed = 0;

        let (target_m, index) = loop {
            let (target_m, index) = match self.target() {
                Some(t) => t,
                None => {
                    // Nothing to drive to
                    self.abort();
                    return OutputData { pose, arrived };
                }
            };

            let dist_m = (target_m - pose.position_m).norm();
            if dist_m > self.params.arrival_radius_m {
                break (target_m, index);
            }

            arrived = true;
            num_passed += 1;
            self.select_next(index);

            // Pausing, finished, or every waypoint of a loop is within reach of this pose
            if self.status != MovementStatus::Moving || num_passed > route_len {
                self.report.dist_to_target_m = Some(dist_m);
                self.report.orientation_held = true;
                return OutputData { pose, arrived };
            }
        };

        let position_m =
            maths::move_towards(&pose.position_m, &target_m, self.params.speed_ms * dt_s);

        let attitude_q = match maths::look_rotation(&(target_m - pose.position_m)) {
            Some(goal_q) => maths::slerp_towards(
                &pose.attitude_q,
                &goal_q,
                self.params.rotate_speed * dt_s,
            ),
            None => {
                self.report.orientation_held = true;
                pose.attitude_q
            }
        };

        let dist_m = (target_m - position_m).norm();
        self.report.dist_to_target_m = Some(dist_m);

        trace!(
            "NavCtrl: target {} at {:.3} m, position {:?}",
            index,
            dist_m,
            position_m
        );

        if dist_m <= self.params.arrival_radius_m {
            arrived = true;
            self.select_next(index);
        }

        OutputData {
            pose: Pose::new(position_m, attitude_q),
            arrived,
        }
    }

    /// Choose what to do after reaching the waypoint at `index`.
    fn select_next(&mut self, index: usize) {
        let next = match &self.route {
            Some(r) => waypoint::next_index(r.sequence.len(), Some(index), r.mode)
                .ok()
                .flatten(),
            None => None,
        };

        match next {
            None => {
                info!("Reached final waypoint {}, navigation complete", index);
                self.target_index = None;
                self.status = MovementStatus::Complete;
            }
            Some(n) if self.params.arrival_pause_s > 0.0 => {
                info!(
                    "Reached waypoint {}, pausing for {} s",
                    index, self.params.arrival_pause_s
                );
                self.pending_index = Some(n);
                self.pause_remaining_s = self.params.arrival_pause_s;
                self.status = MovementStatus::Arrived;
            }
            Some(n) => {
                info!("Reached waypoint {}, heading to waypoint {}", index, n);
                self.target_index = Some(n);
            }
        }
    }
}

impl State for NavCtrl {
    type InitData = &'static str;
    type InitError = NavCtrlError;

    type InputData = InputData;
    type OutputData = OutputData;
    type StatusReport = StatusReport;
    type ProcError = NavCtrlError;

    /// Initialise the NavCtrl module.
    ///
    /// Expected init data is the path to the parameter file
    fn init(&mut self, init_data: Self::InitData, session: &Session) -> Result<(), Self::InitError> {
        self.params = params::load(init_data)?;

        self.arch_report = Archiver::from_path(session, "nav_ctrl/status_report.csv")?;

        Ok(())
    }

    /// Perform one tick of Navigation Control.
    fn proc(
        &mut self,
        input_data: &Self::InputData,
    ) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> {
        let output = self.step(input_data.dt_s, input_data.pose)?;

        Ok((output, self.report))
    }
}

impl Archived for NavCtrl {
    fn write(&mut self) -> Result<(), ArchiveError> {
        self.arch_report.serialise(self.report)
    }
}
