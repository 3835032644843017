//! # Control script interpreter module
//!
//! This module provides an interpreter for control scripts, allowing operator actions (record,
//! save, load, replay) to be triggered at set times after the start of the session.
//!
//! A script is a list of `time: action;` entries, where the time is in seconds and the action is a
//! JSON [`ControlAction`]:
//!
//! ```text
//! 0.5: {"action": "record"};
//! 4.0: {"action": "save"};
//! 5.0: {"action": "replay", "mode": "loop", "reload": true};
//! ```

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use regex::RegexBuilder;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

// Internal
use crate::session::get_elapsed_seconds;
use comms_if::ctrl::ControlAction;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// An action which is scripted to occur at a specific time.
#[derive(Debug)]
struct ScriptedAction {
    /// The time the action is supposed to execute at
    exec_time_s: f64,

    action: ControlAction,
}

/// A script interpreter.
///
/// After initialising with the path to the script to run use `.get_pending_actions` to
/// acquire a list of actions that need executing.
#[derive(Debug)]
pub struct ScriptInterpreter {
    script_path: Option<PathBuf>,
    actions: VecDeque<ScriptedAction>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("Could not find the script at {0:?}")]
    ScriptNotFound(PathBuf),

    #[error("Could not load the script: {0}")]
    ScriptLoadError(std::io::Error),

    #[error("The script is empty (or is so bad it can't be read)")]
    ScriptEmpty,

    #[error("Script contains an invalid timestamp: {0}. Should be a float (like 1.0)")]
    InvalidTimestamp(String),

    #[error("Script contains an invalid action at {0} s: {1}")]
    InvalidAction(f64, serde_json::Error),
}

#[derive(Debug, PartialEq)]
pub enum PendingActions {
    None,
    Some(Vec<ControlAction>),
    EndOfScript,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ScriptInterpreter {
    /// Create a new interpreter from the given script path.
    pub fn new<P: AsRef<Path>>(script_path: P) -> Result<Self, ScriptError> {
        let path = PathBuf::from(script_path.as_ref());

        if !path.exists() {
            return Err(ScriptError::ScriptNotFound(path));
        }

        let script = fs::read_to_string(&path).map_err(ScriptError::ScriptLoadError)?;

        let mut si = Self::from_script(&script)?;
        si.script_path = Some(path);

        Ok(si)
    }

    /// Create a new interpreter from the text of a script.
    pub fn from_script(script: &str) -> Result<Self, ScriptError> {
        let mut queue: VecDeque<ScriptedAction> = VecDeque::new();

        // Go through the script executing __the magic regex__.
        let re = RegexBuilder::new(r"^\s*(\d+(\.\d+)?)\s*:\s*([^;]*);")
            .multi_line(true)
            .build()
            .expect("Script regex is invalid");

        for cap in re.captures_iter(script) {
            let time_str = cap.get(1).map(|m| m.as_str()).unwrap_or("");
            let exec_time_s: f64 = time_str
                .parse()
                .map_err(|_| ScriptError::InvalidTimestamp(time_str.to_string()))?;

            // The scripts contain JSON only.
            let action = ControlAction::from_json(cap.get(3).map(|m| m.as_str()).unwrap_or(""))
                .map_err(|e| ScriptError::InvalidAction(exec_time_s, e))?;

            queue.push_back(ScriptedAction {
                exec_time_s,
                action,
            });
        }

        if queue.is_empty() {
            return Err(ScriptError::ScriptEmpty);
        }

        Ok(ScriptInterpreter {
            script_path: None,
            actions: queue,
        })
    }

    /// Return the actions due at the current session time.
    pub fn get_pending_actions(&mut self) -> PendingActions {
        self.get_pending_actions_at(get_elapsed_seconds())
    }

    /// Return the actions due at `current_time_s`, in script order.
    pub fn get_pending_actions_at(&mut self, current_time_s: f64) -> PendingActions {
        // If the queue is empty the script is over
        if self.actions.is_empty() {
            return PendingActions::EndOfScript;
        }

        let mut due = vec![];

        while let Some(front) = self.actions.front() {
            if front.exec_time_s >= current_time_s {
                break;
            }

            if let Some(a) = self.actions.pop_front() {
                due.push(a.action);
            }
        }

        if due.is_empty() {
            PendingActions::None
        } else {
            PendingActions::Some(due)
        }
    }

    /// Get the number of actions remaining in the script
    pub fn get_num_actions(&self) -> usize {
        self.actions.len()
    }

    /// Get the length of the script in seconds
    pub fn get_duration(&self) -> f64 {
        match self.actions.back() {
            Some(a) => a.exec_time_s,
            None => 0f64,
        }
    }

    /// The path the script was loaded from, if any.
    pub fn script_path(&self) -> Option<&Path> {
        self.script_path.as_deref()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use comms_if::ctrl::{CycleMode, WaypointStatus};

    const SCRIPT: &str = r#"
        // Record three points then replay them
        0.5: {"action": "record"};
        1.0: {"action": "record", "status": "failure"};
        1.0: {"action": "save"};
        3.25: {"action": "replay", "mode": "linear_once", "reload": true};
    "#;

    #[test]
    fn test_pending_actions() {
        let mut si = ScriptInterpreter::from_script(SCRIPT).unwrap();
        assert_eq!(si.get_num_actions(), 4);
        assert_eq!(si.get_duration(), 3.25);

        assert_eq!(si.get_pending_actions_at(0.1), PendingActions::None);
        assert_eq!(
            si.get_pending_actions_at(0.6),
            PendingActions::Some(vec![ControlAction::Record {
                status: WaypointStatus::Success
            }])
        );
        assert_eq!(
            si.get_pending_actions_at(2.0),
            PendingActions::Some(vec![
                ControlAction::Record {
                    status: WaypointStatus::Failure
                },
                ControlAction::Save
            ])
        );
        assert_eq!(
            si.get_pending_actions_at(10.0),
            PendingActions::Some(vec![ControlAction::Replay {
                mode: CycleMode::LinearOnce,
                reload: true
            }])
        );
        assert_eq!(si.get_pending_actions_at(11.0), PendingActions::EndOfScript);
    }

    #[test]
    fn test_bad_scripts() {
        assert!(matches!(
            ScriptInterpreter::from_script("nothing to see here"),
            Err(ScriptError::ScriptEmpty)
        ));
        assert!(matches!(
            ScriptInterpreter::from_script(r#"1.0: {"action": "jump"};"#),
            Err(ScriptError::InvalidAction(t, _)) if t == 1.0
        ));
        assert!(matches!(
            ScriptInterpreter::new("/definitely/not/a/script.txt"),
            Err(ScriptError::ScriptNotFound(_))
        ));
    }
}
