//! # Equipment Interface
//!
//! This module defines the capabilities the navigation controller consumes from equipment. Each
//! capability is a narrow trait so that target drivers, host simulations and test doubles can be
//! swapped without touching the control code.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

pub mod actuator;
pub mod board;
pub mod companion;
pub mod imu;
pub mod ranging;
pub mod vision;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Error raised by an equipment read or command.
#[derive(Debug, thiserror::Error)]
pub enum EqptError {
    #[error("Equipment I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Equipment did not respond in time")]
    Timeout,

    #[error("Equipment bus error: {0}")]
    Bus(String),

    #[error("Equipment fault: {0}")]
    Fault(String),
}
