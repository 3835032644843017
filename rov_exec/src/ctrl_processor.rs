//! # Control action processor module
//!
//! Executes operator actions: recording, saving and loading waypoints, and starting or stopping
//! their replay.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::info;

// Internal
use crate::{
    data_store::DataStore,
    nav_ctrl::NavCtrlError,
    waypoint::{StoreError, Waypoint},
};
use comms_if::ctrl::{ControlAction, ControlMode};

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum CtrlError {
    #[error("Waypoint store error: {0}")]
    StoreError(#[from] StoreError),

    #[error("Could not start navigation: {0}")]
    NavCtrlError(#[from] NavCtrlError),
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Execute a control action.
///
/// On error the data store is left as it was before the action, in particular a replay which
/// fails to load its waypoints never starts navigation.
pub fn exec(ds: &mut DataStore, action: &ControlAction) -> Result<(), CtrlError> {
    match *action {
        ControlAction::Record { status } => {
            let waypoint = Waypoint::record(
                ds.body.pose().position_m,
                status,
                util::time::local_now_s(),
            );
            ds.waypoints.push(waypoint);

            info!(
                "Recorded waypoint {} at {:?} ({:?})",
                ds.waypoints.len() - 1,
                waypoint.position_m,
                status
            );
        }
        ControlAction::Save => {
            ds.waypoint_store.save(&ds.waypoints)?;
            info!(
                "Saved {} waypoints to {}",
                ds.waypoints.len(),
                ds.waypoint_store.location()
            );
        }
        ControlAction::Load => {
            ds.waypoints = ds.waypoint_store.load()?;
            info!(
                "Loaded {} waypoints from {}",
                ds.waypoints.len(),
                ds.waypoint_store.location()
            );
        }
        ControlAction::Replay { mode, reload } => {
            // Only replace the recorded waypoints once navigation has accepted the new ones
            let waypoints = if reload {
                ds.waypoint_store.load()?
            } else {
                ds.waypoints.clone()
            };

            ds.nav_ctrl.start(waypoints.clone(), mode)?;

            if reload {
                info!(
                    "Reloaded {} waypoints from {}",
                    waypoints.len(),
                    ds.waypoint_store.location()
                );
                ds.waypoints = waypoints;
            }

            ds.set_control_mode(ControlMode::AutonomousReplay);
        }
        ControlAction::Abort => {
            ds.nav_ctrl.abort();
            ds.set_control_mode(ControlMode::RemoteControl);
        }
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        nav_ctrl::MovementStatus,
        physics::PhysicsSink,
        waypoint::{CycleMode, JsonSerializer, MemMedium, WaypointStatus, WaypointStore},
    };
    use nalgebra::{UnitQuaternion, Vector3};

    fn data_store(mem: &MemMedium) -> DataStore {
        DataStore::new(
            WaypointStore::new(Box::new(mem.clone()), Box::new(JsonSerializer)),
            ControlMode::RemoteControl,
        )
    }

    fn record_at(ds: &mut DataStore, x: f64, status: WaypointStatus) {
        ds.body
            .set_pose(Vector3::new(x, 0.0, 0.0), UnitQuaternion::identity());
        exec(ds, &ControlAction::Record { status }).unwrap();
    }

    #[test]
    fn test_record_save_load() {
        let mem = MemMedium::new();
        let mut ds = data_store(&mem);

        record_at(&mut ds, 1.0, WaypointStatus::Success);
        record_at(&mut ds, 2.0, WaypointStatus::Failure);
        assert_eq!(ds.waypoints.len(), 2);
        assert_eq!(ds.waypoints.get(1).unwrap().status, WaypointStatus::Failure);

        exec(&mut ds, &ControlAction::Save).unwrap();
        assert!(mem.contents().is_some());

        // A fresh data store sharing the medium sees the saved waypoints
        let mut other = data_store(&mem);
        exec(&mut other, &ControlAction::Load).unwrap();
        assert_eq!(other.waypoints, ds.waypoints);
    }

    #[test]
    fn test_replay_missing_file() {
        let mem = MemMedium::new();
        let mut ds = data_store(&mem);

        let result = exec(
            &mut ds,
            &ControlAction::Replay {
                mode: CycleMode::Loop,
                reload: true,
            },
        );

        assert!(matches!(
            result,
            Err(CtrlError::StoreError(StoreError::NotFound(_)))
        ));
        assert_eq!(ds.nav_ctrl.status(), MovementStatus::Idle);
        assert_eq!(ds.control_mode, ControlMode::RemoteControl);
    }

    #[test]
    fn test_failed_reload_keeps_waypoints() {
        let mem = MemMedium::new();
        let mut ds = data_store(&mem);

        // The store holds an empty sequence
        exec(&mut ds, &ControlAction::Save).unwrap();

        record_at(&mut ds, 1.0, WaypointStatus::Success);
        let recorded = ds.waypoints.clone();

        let result = exec(
            &mut ds,
            &ControlAction::Replay {
                mode: CycleMode::LinearOnce,
                reload: true,
            },
        );

        assert!(matches!(
            result,
            Err(CtrlError::NavCtrlError(NavCtrlError::EmptySequence))
        ));
        assert_eq!(ds.waypoints, recorded);
        assert_eq!(ds.nav_ctrl.status(), MovementStatus::Idle);
        assert_eq!(ds.control_mode, ControlMode::RemoteControl);
    }

    #[test]
    fn test_reload_during_replay_keeps_waypoints() {
        let mem = MemMedium::new();
        let mut ds = data_store(&mem);
        record_at(&mut ds, 1.0, WaypointStatus::Success);
        exec(&mut ds, &ControlAction::Save).unwrap();
        record_at(&mut ds, 2.0, WaypointStatus::Success);

        exec(
            &mut ds,
            &ControlAction::Replay {
                mode: CycleMode::Loop,
                reload: false,
            },
        )
        .unwrap();

        assert!(matches!(
            exec(
                &mut ds,
                &ControlAction::Replay {
                    mode: CycleMode::Loop,
                    reload: true
                }
            ),
            Err(CtrlError::NavCtrlError(NavCtrlError::SequenceAlreadyLoaded))
        ));
        assert_eq!(ds.waypoints.len(), 2);
    }

    #[test]
    fn test_load_failure_keeps_waypoints() {
        let mem = MemMedium::with_contents(b"{ not json");
        let mut ds = data_store(&mem);
        record_at(&mut ds, 1.0, WaypointStatus::Success);

        assert!(matches!(
            exec(&mut ds, &ControlAction::Load),
            Err(CtrlError::StoreError(StoreError::ParseError(_)))
        ));
        assert_eq!(ds.waypoints.len(), 1);
    }

    #[test]
    fn test_replay_empty() {
        let mem = MemMedium::new();
        let mut ds = data_store(&mem);

        assert!(matches!(
            exec(
                &mut ds,
                &ControlAction::Replay {
                    mode: CycleMode::LinearOnce,
                    reload: false
                }
            ),
            Err(CtrlError::NavCtrlError(NavCtrlError::EmptySequence))
        ));
        assert_eq!(ds.control_mode, ControlMode::RemoteControl);
    }

    #[test]
    fn test_replay_and_abort() {
        let mem = MemMedium::new();
        let mut ds = data_store(&mem);
        record_at(&mut ds, 1.0, WaypointStatus::Success);

        exec(
            &mut ds,
            &ControlAction::Replay {
                mode: CycleMode::Loop,
                reload: false,
            },
        )
        .unwrap();
        assert_eq!(ds.control_mode, ControlMode::AutonomousReplay);
        assert_eq!(ds.nav_ctrl.status(), MovementStatus::Moving);

        // A second replay is rejected while the first is running
        assert!(exec(
            &mut ds,
            &ControlAction::Replay {
                mode: CycleMode::Loop,
                reload: false
            }
        )
        .is_err());

        exec(&mut ds, &ControlAction::Abort).unwrap();
        assert_eq!(ds.control_mode, ControlMode::RemoteControl);
        assert_eq!(ds.nav_ctrl.status(), MovementStatus::Idle);
    }
}
