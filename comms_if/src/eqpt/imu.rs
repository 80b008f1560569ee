//! # Inertial Sensor Interface

use super::EqptError;

/// Scale applied to the raw 16 bit gyro register to obtain degrees per second, for the 1000 dps
/// full scale range.
pub const GYRO_DPS_PER_LSB: f64 = 0.035;

/// A single axis rate gyro measuring yaw rate.
///
/// Positive rates are counter-clockwise when viewed from above.
pub trait RateGyro {
    /// Read the current angular rate.
    ///
    /// Units: degrees/second
    fn read_rate_dps(&mut self) -> Result<f64, EqptError>;
}

/// Convert the two register bytes of a gyro axis into a rate in degrees per second.
pub fn raw_to_dps(low: u8, high: u8) -> f64 {
    i16::from_le_bytes([low, high]) as f64 * GYRO_DPS_PER_LSB
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_raw_to_dps() {
        assert_eq!(raw_to_dps(0, 0), 0.0);
        assert!((raw_to_dps(100, 0) - 3.5).abs() < 1e-9);
        // 0xFF9C is -100 in two's complement
        assert!((raw_to_dps(0x9C, 0xFF) + 3.5).abs() < 1e-9);
    }
}
