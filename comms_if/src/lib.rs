//! # Communications interface crate.
//!
//! Provides all common communications interfaces for the software.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Movement commands recieved from the remote agent and requests sent to it
pub mod cmd;

/// Operator control actions (record, save, load, replay)
pub mod ctrl;

/// Network module
pub mod net;
