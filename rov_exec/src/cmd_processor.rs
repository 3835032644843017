//! # Command processor module
//!
//! Applies move commands from the command agent to the rover body.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, trace};
use nalgebra::Vector3;

// Internal
use crate::{data_store::DataStore, physics::PhysicsSink};
use comms_if::{
    cmd::{CommandKind, CommandMessage},
    ctrl::ControlMode,
};

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Execute the commands recieved this cycle, in order.
///
/// Move commands are only applied in remote control. During autonomous replay they are drained
/// and counted as ignored.
pub fn exec(ds: &mut DataStore, cmds: &[CommandMessage]) {
    match ds.control_mode {
        ControlMode::RemoteControl => {
            apply(&mut ds.body, cmds);
        }
        ControlMode::AutonomousReplay => {
            let num_moves = cmds
                .iter()
                .filter(|c| c.kind() == CommandKind::MoveVector)
                .count();

            if num_moves > 0 {
                ds.num_ignored_cmds += num_moves as u64;
                debug!(
                    "Ignored {} move command(s) during replay ({} in total)",
                    num_moves, ds.num_ignored_cmds
                );
            }
        }
    }
}

/// Apply each move command to `sink` as a velocity change. Returns the number applied.
pub fn apply<S: PhysicsSink>(sink: &mut S, cmds: &[CommandMessage]) -> usize {
    let mut num_applied = 0;

    for cmd in cmds {
        if let Some(v) = cmd.vector() {
            trace!("Applying move command {:?}", v);
            sink.apply_impulse(Vector3::new(v.x, v.y, v.z));
            num_applied += 1;
        }
    }

    num_applied
}
