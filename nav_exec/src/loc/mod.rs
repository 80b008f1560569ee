//! # Localisation module
//!
//! Dead reckoning of the vehicle: the yaw rate gyro is integrated into an unbounded heading, and
//! the odometric distance travelled each tick is projected onto that heading to give a 2D position.
//! Positions are relative to the last odometry reset, so downstream thresholds are measured from
//! the start of the current segment.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod calib;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::debug;
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

pub use calib::{calibrate_gyro, CalibParams, CalibResult};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Localisation parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct LocParams {
    /// Gyro bias calibration
    pub calib: CalibParams,
}

/// Integrated heading of the vehicle.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct HeadingState {
    /// Heading relative to the start of the run, positive counter-clockwise. Not wrapped.
    ///
    /// Units: degrees
    pub angle_deg: f64,

    /// Gyro bias estimated by the calibration pass.
    ///
    /// Units: degrees/second
    pub gyro_zero_offset_dps: f64,
}

/// The current pose estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Pose {
    /// Unbounded heading, positive counter-clockwise.
    ///
    /// Units: degrees
    pub heading_deg: f64,

    /// Position since the last odometry reset, x along the starting heading.
    ///
    /// Units: millimeters
    pub position_mm: Vector2<f64>,
}

/// Localisation manager.
#[derive(Debug, Clone)]
pub struct LocMgr {
    heading: HeadingState,
    position_mm: Vector2<f64>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum LocError {
    #[error("Invalid time step: {0} s")]
    InvalidTimeStep(f64),

    #[error("Non-finite angular rate: {0}")]
    NonFiniteRate(f64),

    #[error("Non-finite encoder delta: {0}")]
    NonFiniteEncoderDelta(f64),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for Pose {
    fn default() -> Self {
        Self {
            heading_deg: 0.0,
            position_mm: Vector2::zeros(),
        }
    }
}

impl Pose {
    /// Straight line distance from the last odometry reset.
    ///
    /// Units: millimeters
    pub fn distance_mm(&self) -> f64 {
        self.position_mm.norm()
    }
}

impl LocMgr {
    /// Create a new manager using the given gyro bias.
    pub fn new(gyro_zero_offset_dps: f64) -> Self {
        Self {
            heading: HeadingState {
                angle_deg: 0.0,
                gyro_zero_offset_dps,
            },
            position_mm: Vector2::zeros(),
        }
    }

    /// Advance the estimate by one tick.
    ///
    /// `raw_rate_dps` is the uncorrected gyro reading and `encoder_delta_mm` the distance
    /// travelled since the previous tick, negative when reversing.
    pub fn update(
        &mut self,
        dt_s: f64,
        raw_rate_dps: f64,
        encoder_delta_mm: f64,
    ) -> Result<Pose, LocError> {
        if !dt_s.is_finite() || dt_s < 0.0 {
            return Err(LocError::InvalidTimeStep(dt_s));
        }
        if !raw_rate_dps.is_finite() {
            return Err(LocError::NonFiniteRate(raw_rate_dps));
        }
        if !encoder_delta_mm.is_finite() {
            return Err(LocError::NonFiniteEncoderDelta(encoder_delta_mm));
        }

        self.heading.angle_deg += (raw_rate_dps - self.heading.gyro_zero_offset_dps) * dt_s;

        let heading_rad = self.heading.angle_deg.to_radians();
        self.position_mm += Vector2::new(heading_rad.cos(), heading_rad.sin()) * encoder_delta_mm;

        Ok(self.pose())
    }

    /// Zero the position at a segment boundary. The heading is kept.
    pub fn reset_odometry(&mut self) {
        debug!(
            "Odometry reset at ({:.1}, {:.1}) mm",
            self.position_mm[0], self.position_mm[1]
        );
        self.position_mm = Vector2::zeros();
    }

    pub fn pose(&self) -> Pose {
        Pose {
            heading_deg: self.heading.angle_deg,
            position_mm: self.position_mm,
        }
    }

    pub fn heading(&self) -> &HeadingState {
        &self.heading
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_heading_integration_removes_bias() {
        let mut loc = LocMgr::new(1.5);

        for _ in 0..100 {
            loc.update(0.01, 1.5 + 90.0, 0.0).unwrap();
        }

        assert!((loc.pose().heading_deg - 90.0).abs() < 1e-9);

        // Heading accumulates past a full turn
        for _ in 0..400 {
            loc.update(0.01, 1.5 + 90.0, 0.0).unwrap();
        }
        assert!((loc.pose().heading_deg - 450.0).abs() < 1e-9);
    }

    #[test]
    fn test_odometry_follows_heading() {
        let mut loc = LocMgr::new(0.0);

        let pose = loc.update(0.02, 0.0, 100.0).unwrap();
        assert!((pose.position_mm[0] - 100.0).abs() < 1e-9);
        assert!(pose.position_mm[1].abs() < 1e-9);

        // Turn to 90 degrees in one tick then drive
        loc.update(1.0, 90.0, 0.0).unwrap();
        let pose = loc.update(0.02, 0.0, 50.0).unwrap();
        assert!((pose.position_mm[0] - 100.0).abs() < 1e-9);
        assert!((pose.position_mm[1] - 50.0).abs() < 1e-9);

        loc.reset_odometry();
        assert_eq!(loc.pose().distance_mm(), 0.0);
        assert!((loc.pose().heading_deg - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_inputs_rejected() {
        let mut loc = LocMgr::new(0.0);
        assert!(matches!(loc.update(-0.1, 0.0, 0.0), Err(LocError::InvalidTimeStep(_))));
        assert!(matches!(loc.update(0.1, f64::NAN, 0.0), Err(LocError::NonFiniteRate(_))));
        assert!(matches!(
            loc.update(0.1, 0.0, f64::INFINITY),
            Err(LocError::NonFiniteEncoderDelta(_))
        ));
        assert_eq!(loc.pose(), Pose::default());
    }
}
