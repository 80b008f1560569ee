//! # Actuator Interfaces
//!
//! Device level commands for the steering servo and the drive motor. Abstract steering positions
//! and speeds are converted into these commands by `ActCtrl` in the navigation exec.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use super::EqptError;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Command for the drive motor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DriveCmd {
    /// Two independent PWM channels on an H-bridge.
    ///
    /// Both channels at a non-zero duty short the motor terminals, braking the motor.
    Differential {
        /// Duty of the forward channel.
        ///
        /// Units: percent
        fwd_duty_pct: f64,

        /// Duty of the reverse channel.
        ///
        /// Units: percent
        rev_duty_pct: f64,
    },

    /// Single servo style pulse for an electronic speed controller.
    Pulse {
        /// Units: microseconds
        width_us: f64,
    },
}

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Steering servo driven with a pulse width.
pub trait SteeringServo {
    /// Units: microseconds
    fn set_pulse_width_us(&mut self, width_us: f64) -> Result<(), EqptError>;
}

/// Drive motor output stage.
pub trait DriveMotor {
    fn apply(&mut self, cmd: DriveCmd) -> Result<(), EqptError>;
}
