//! # Navigation Executable Parameters
//!
//! This module provides parameters for the navigation executable and its run supervisor.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavExecParams {
    /// Target period of one control cycle.
    ///
    /// Units: seconds
    pub cycle_period_s: f64,

    /// Time after the start press at which the run is ended whatever the mission phase.
    ///
    /// Units: seconds
    pub max_run_s: f64,

    /// Time to wait for the companion's response to a read request.
    ///
    /// Units: seconds
    pub companion_timeout_s: f64,

    /// Number of consecutive companion timeouts after which a warning is raised.
    pub companion_timeout_limit: u64,

    /// Where the distance travelled each tick comes from.
    pub odometry_source: OdometrySource,

    /// Distance travelled per edge of the local encoder.
    ///
    /// Units: millimeters
    pub mm_per_tick: f64,

    /// Wait between stopping and halting after a completed run.
    ///
    /// Units: seconds
    pub settle_complete_s: f64,

    /// Wait between stopping and halting after a fault or timeout.
    ///
    /// Units: seconds
    pub settle_fault_s: f64,

    /// Presses of the start button closer together than this are ignored.
    ///
    /// Units: seconds
    pub start_debounce_s: f64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OdometrySource {
    /// Cumulative encoder distance reported by the companion.
    Companion,

    /// Quadrature edges counted locally.
    LocalEncoder,
}

/// Reasons a parameter set cannot be used.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParamsError {
    #[error("{0} must be positive and finite, found {1}")]
    NotPositive(&'static str, f64),

    #[error("{0} must be zero or more and finite, found {1}")]
    Negative(&'static str, f64),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl NavExecParams {
    /// Check the parameters can be turned into durations and rates.
    pub fn validate(&self) -> Result<(), ParamsError> {
        let positive = [
            ("cycle_period_s", self.cycle_period_s),
            ("max_run_s", self.max_run_s),
            ("mm_per_tick", self.mm_per_tick),
        ];
        for (name, value) in positive.iter() {
            if !(value.is_finite() && *value > 0.0) {
                return Err(ParamsError::NotPositive(name, *value));
            }
        }

        let non_negative = [
            ("companion_timeout_s", self.companion_timeout_s),
            ("settle_complete_s", self.settle_complete_s),
            ("settle_fault_s", self.settle_fault_s),
            ("start_debounce_s", self.start_debounce_s),
        ];
        for (name, value) in non_negative.iter() {
            if !(value.is_finite() && *value >= 0.0) {
                return Err(ParamsError::Negative(name, *value));
            }
        }

        Ok(())
    }
}

impl Default for NavExecParams {
    fn default() -> Self {
        Self {
            cycle_period_s: 0.02,
            max_run_s: 180.0,
            companion_timeout_s: 0.01,
            companion_timeout_limit: 10,
            odometry_source: OdometrySource::Companion,
            mm_per_tick: 0.8333,
            settle_complete_s: 0.5,
            settle_fault_s: 3.0,
            start_debounce_s: 0.05,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_shipped_params_match_defaults() {
        let p: NavExecParams =
            util::params::from_toml_str(include_str!("../../params/nav_exec.toml")).unwrap();
        let d = NavExecParams::default();

        assert_eq!(p.cycle_period_s, d.cycle_period_s);
        assert_eq!(p.max_run_s, d.max_run_s);
        assert_eq!(p.companion_timeout_s, d.companion_timeout_s);
        assert_eq!(p.companion_timeout_limit, d.companion_timeout_limit);
        assert_eq!(p.odometry_source, d.odometry_source);
        assert_eq!(p.mm_per_tick, d.mm_per_tick);
        assert_eq!(p.settle_complete_s, d.settle_complete_s);
        assert_eq!(p.settle_fault_s, d.settle_fault_s);
        assert_eq!(p.start_debounce_s, d.start_debounce_s);
        assert!(p.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_durations() {
        let mut p = NavExecParams::default();
        p.cycle_period_s = 0.0;
        assert_eq!(p.validate(), Err(ParamsError::NotPositive("cycle_period_s", 0.0)));

        let mut p = NavExecParams::default();
        p.settle_fault_s = -1.0;
        assert_eq!(p.validate(), Err(ParamsError::Negative("settle_fault_s", -1.0)));

        let mut p = NavExecParams::default();
        p.max_run_s = f64::NAN;
        assert!(p.validate().is_err());
    }
}
