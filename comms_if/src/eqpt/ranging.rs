//! # Ranging Sensor Interface

use super::EqptError;

/// A single beam distance sensor, such as the front facing time of flight sensor.
pub trait RangeSensor {
    /// Read the distance to the nearest target.
    ///
    /// Units: millimeters
    fn read_mm(&mut self) -> Result<f64, EqptError>;
}
