//! Actuation control module
//!
//! Converts the abstract steering position and signed speed demanded by the control loop into
//! servo pulse widths and drive motor commands.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

pub use params::*;
pub use state::*;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Lowest abstract steering position, full left.
pub const STEER_POS_MIN: f64 = 0.0;

/// Abstract steering position for straight ahead.
pub const STEER_POS_CENTER: f64 = 240.0;

/// Highest abstract steering position, full right.
pub const STEER_POS_MAX: f64 = 480.0;

/// Abstract speed limit in either direction.
pub const SPEED_LIMIT: f64 = 100.0;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during ActCtrl operation.
#[derive(Debug, thiserror::Error)]
pub enum ActCtrlError {
    #[error("ActCtrl has not been initialised")]
    NotInitialised,

    #[error("Recieved a non-finite demand: steer {0}, speed {1}")]
    NonFiniteDemand(f64, f64),

    #[error("Invalid ActCtrl parameters: {0}")]
    InvalidParams(String),
}
