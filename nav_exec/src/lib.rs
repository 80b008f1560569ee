//! # Navigation library.
//!
//! This library allows other crates in the workspace, and the scenario tests, to access items
//! defined inside the navigation crate.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Actuation control module - converts steering positions and speeds into device commands
pub mod act_ctrl;

/// Companion client - requests side ranges and encoder distance from the companion
pub mod companion_client;

/// Data store - the context of a run
pub mod data_store;

/// Edge triggered inputs - encoder and start button
pub mod edge;

/// Status indicator vocabulary
pub mod indicator;

/// Localisation module - heading and dead reckoned position
pub mod loc;

/// Mission module - the phase state machine
pub mod mission;

/// Executable parameters
pub mod params;

/// Perception module - detection events and distance reads
pub mod per;

/// PID controller
pub mod pid_ctrl;

/// Vehicle collaborators and the host simulation
pub mod platform;

/// Run supervisor - the control loop and the fail safe shutdown
pub mod supervisor;
