//! Parameters structure for ActCtrl

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

use super::ActCtrlError;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for actuation control, calibrated per vehicle.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Params {
    // ---- STEERING ----
    /// Servo pulse at steering position 0 (full left).
    ///
    /// Units: microseconds
    pub pulse_min_pos_us: f64,

    /// Servo pulse at steering position 240 (straight ahead).
    ///
    /// Units: microseconds
    pub pulse_center_us: f64,

    /// Servo pulse at steering position 480 (full right).
    ///
    /// Units: microseconds
    pub pulse_max_pos_us: f64,

    // ---- DRIVE ----
    /// Largest change in abstract speed allowed in one tick.
    pub max_speed_step: f64,

    /// Motor output stage in use.
    pub drive_style: DriveStyle,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Motor output stage and its calibration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DriveStyle {
    /// Forward and reverse PWM channels of an H-bridge.
    Differential {
        /// Duty applied to both channels at zero speed.
        ///
        /// Units: percent
        brake_duty_pct: f64,
    },

    /// Electronic speed controller driven with a servo pulse.
    Esc {
        /// Units: microseconds
        neutral_us: f64,

        /// Pulse at full forward speed.
        ///
        /// Units: microseconds
        full_fwd_us: f64,

        /// Pulse at full reverse speed.
        ///
        /// Units: microseconds
        full_rev_us: f64,
    },
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Params {
    /// Check the parameters describe a usable vehicle.
    pub fn validate(&self) -> Result<(), ActCtrlError> {
        let pulses = [self.pulse_min_pos_us, self.pulse_center_us, self.pulse_max_pos_us];
        if pulses.iter().any(|p| !p.is_finite() || *p <= 0.0) {
            return Err(ActCtrlError::InvalidParams(format!(
                "steering pulses must be positive, got {:?}",
                pulses
            )));
        }

        if !self.max_speed_step.is_finite() || self.max_speed_step <= 0.0 {
            return Err(ActCtrlError::InvalidParams(format!(
                "max_speed_step must be positive, got {}",
                self.max_speed_step
            )));
        }

        if let DriveStyle::Differential { brake_duty_pct } = self.drive_style {
            if !(0.0..=100.0).contains(&brake_duty_pct) {
                return Err(ActCtrlError::InvalidParams(format!(
                    "brake_duty_pct must be within [0, 100], got {}",
                    brake_duty_pct
                )));
            }
        }

        Ok(())
    }
}
