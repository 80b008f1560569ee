//! # Communications interface crate.
//!
//! Provides the interfaces between the navigation controller and its external collaborators: the
//! companion sensor microcontroller, the vision and ranging sensors, and the actuators.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Command, response and capability definitions for equipment (sensors, actuators, companion)
pub mod eqpt;

/// Byte links to equipment, such as the serial line to the companion
pub mod link;
