//! # PID controller module
//!
//! A single PID controller shared by every mission phase. Gains are not part of the controller
//! state: the caller passes the active phase's gains on each step, so a gain schedule can switch
//! between ticks while the integral accumulator carries over. Only [`PidController::reset_integral`]
//! clears the accumulator.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::trace;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Absolute limit of the integral accumulator.
pub const INTEGRAL_LIMIT: f64 = 100.0;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A set of PID gains, one entry of the gain schedule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PidGains {
    /// Proportional gain
    pub kp: f64,

    /// Integral gain
    #[serde(default)]
    pub ki: f64,

    /// Derivative gain
    #[serde(default)]
    pub kd: f64,
}

/// A PID controller evaluated once per control tick.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PidController {
    /// The integral accumulation, always within `[-INTEGRAL_LIMIT, INTEGRAL_LIMIT]`.
    integral: f64,

    /// Error passed to the previous step
    last_error: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PidGains {
    pub fn new(kp: f64, ki: f64, kd: f64) -> Self {
        Self { kp, ki, kd }
    }
}

impl PidController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the output of the controller for the given error and gains.
    ///
    /// The integral term accumulates `error * ki` and is clamped every step. The derivative is
    /// the per-tick difference in error, the loop period being fixed.
    pub fn step(&mut self, error: f64, gains: &PidGains) -> f64 {
        self.integral = util::maths::clamp(
            self.integral + error * gains.ki,
            -INTEGRAL_LIMIT,
            INTEGRAL_LIMIT,
        );

        let deriv = error - self.last_error;
        self.last_error = error;

        let out = error * gains.kp + self.integral + deriv * gains.kd;

        trace!(
            "PID: err = {:.3}, int = {:.3}, deriv = {:.3}, out = {:.3}",
            error,
            self.integral,
            deriv,
            out
        );

        out
    }

    /// Zero the integral accumulator.
    pub fn reset_integral(&mut self) {
        self.integral = 0.0;
    }

    pub fn integral(&self) -> f64 {
        self.integral
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_proportional_and_derivative() {
        let mut pid = PidController::new();
        let gains = PidGains::new(2.0, 0.0, 0.5);

        // First step, derivative from a zero last error
        assert_eq!(pid.step(10.0, &gains), 20.0 + 5.0);
        // No change in error, no derivative contribution
        assert_eq!(pid.step(10.0, &gains), 20.0);
        assert_eq!(pid.step(4.0, &gains), 8.0 - 3.0);
    }

    #[test]
    fn test_integral_clamped_for_any_sequence() {
        let mut pid = PidController::new();

        let errors = [50.0, 75.0, 300.0, -20.0, -900.0, 1e6, 0.0, -1e6, 42.0];
        let kis = [0.0, 0.01, 0.5, 3.0, 100.0];

        for ki in kis.iter() {
            let gains = PidGains::new(1.0, *ki, 0.0);
            for e in errors.iter().cycle().take(200) {
                pid.step(*e, &gains);
                assert!(pid.integral() >= -INTEGRAL_LIMIT && pid.integral() <= INTEGRAL_LIMIT);
            }
        }
    }

    #[test]
    fn test_gain_switch_keeps_accumulator() {
        let mut pid = PidController::new();

        pid.step(10.0, &PidGains::new(0.0, 1.0, 0.0));
        assert_eq!(pid.integral(), 10.0);

        // A schedule with no integral gain does not drain the accumulator
        let out = pid.step(10.0, &PidGains::new(1.0, 0.0, 0.0));
        assert_eq!(pid.integral(), 10.0);
        assert_eq!(out, 20.0);

        pid.reset_integral();
        assert_eq!(pid.integral(), 0.0);
    }
}
