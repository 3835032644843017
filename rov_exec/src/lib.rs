//! # Rover library.
//!
//! This library allows other crates in the workspace to access items defined inside the rover
//! crate.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Command client - sends requests to and recieves move commands from the command agent
pub mod cmd_client;

/// Command processor - applies move commands to the rover body
pub mod cmd_processor;

/// Control action processor - records, persists and replays waypoints on operator request
pub mod ctrl_processor;

/// Global data store for the executable
pub mod data_store;

/// Localisation module - the rover's pose in the world
pub mod loc;

/// Navigation control module - drives the rover along a sequence of waypoints
pub mod nav_ctrl;

/// Executable parameters
pub mod params;

/// Physics interface and the kinematic rover body
pub mod physics;

/// Waypoints, their persistence, and the order they are visited in
pub mod waypoint;
