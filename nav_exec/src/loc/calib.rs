//! Gyro bias calibration

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::time::Duration;

use comms_if::eqpt::imu::RateGyro;
use log::{info, warn};
use serde::Deserialize;
use util::time::Clock;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct CalibParams {
    /// Number of samples after which calibration stops.
    pub max_samples: u32,

    /// Time after which calibration stops, whatever the number of samples.
    ///
    /// Units: seconds
    pub max_duration_s: f64,

    /// Time between two samples.
    ///
    /// Units: seconds
    pub sample_period_s: f64,
}

/// Outcome of a calibration pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibResult {
    /// Units: degrees/second
    pub offset_dps: f64,

    /// Number of samples in the mean, failed reads included.
    pub num_samples: u32,

    /// Number of samples which were failed reads, counted as zero.
    pub num_read_errors: u32,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Estimate the gyro bias while the vehicle is stationary.
///
/// Blocks for up to `params.max_duration_s`. A failed read contributes a zero sample. If no sample
/// could be taken the offset is zero.
pub fn calibrate_gyro(
    gyro: &mut dyn RateGyro,
    clock: &dyn Clock,
    params: &CalibParams,
) -> CalibResult {
    let start_s = clock.now_s();
    let sample_period = Duration::from_secs_f64(params.sample_period_s.max(0.0));

    let mut sum_dps = 0f64;
    let mut num_samples = 0u32;
    let mut num_read_errors = 0u32;

    while num_samples < params.max_samples && clock.now_s() - start_s < params.max_duration_s {
        match gyro.read_rate_dps() {
            Ok(r) if r.is_finite() => sum_dps += r,
            Ok(r) => {
                num_read_errors += 1;
                warn!("Non-finite gyro sample {} during calibration", r);
            }
            Err(e) => {
                num_read_errors += 1;
                warn!("Gyro read failed during calibration: {}", e);
            }
        }
        num_samples += 1;

        clock.sleep(sample_period);
    }

    let offset_dps = match num_samples {
        0 => 0.0,
        n => sum_dps / n as f64,
    };

    info!(
        "Gyro calibration: offset {:.4} dps from {} samples ({} failed) in {:.2} s",
        offset_dps,
        num_samples,
        num_read_errors,
        clock.now_s() - start_s
    );

    CalibResult {
        offset_dps,
        num_samples,
        num_read_errors,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use comms_if::eqpt::EqptError;
    use std::sync::Mutex;

    /// Clock advanced only by sleeping
    struct StepClock(Mutex<f64>);

    impl Clock for StepClock {
        fn now_s(&self) -> f64 {
            *self.0.lock().unwrap()
        }

        fn sleep(&self, duration: Duration) {
            *self.0.lock().unwrap() += duration.as_secs_f64();
        }
    }

    /// Constant bias plus a deterministic zero-mean noise pattern
    struct BiasedGyro {
        bias: f64,
        n: u32,
        fail_every: Option<u32>,
    }

    impl RateGyro for BiasedGyro {
        fn read_rate_dps(&mut self) -> Result<f64, EqptError> {
            self.n += 1;
            if let Some(k) = self.fail_every {
                if self.n % k == 0 {
                    return Err(EqptError::Timeout);
                }
            }
            let noise = if self.n % 2 == 0 { 0.05 } else { -0.05 };
            Ok(self.bias + noise)
        }
    }

    fn params() -> CalibParams {
        CalibParams {
            max_samples: 1000,
            max_duration_s: 10.0,
            sample_period_s: 0.005,
        }
    }

    #[test]
    fn test_converges_to_bias() {
        let clock = StepClock(Mutex::new(0.0));
        let mut gyro = BiasedGyro { bias: -0.42, n: 0, fail_every: None };

        let res = calibrate_gyro(&mut gyro, &clock, &params());

        assert_eq!(res.num_samples, 1000);
        assert_eq!(res.num_read_errors, 0);
        assert!((res.offset_dps + 0.42).abs() < 1e-3);
    }

    #[test]
    fn test_duration_limit() {
        let clock = StepClock(Mutex::new(0.0));
        let mut gyro = BiasedGyro { bias: 1.0, n: 0, fail_every: None };
        let mut p = params();
        p.sample_period_s = 0.02;

        let res = calibrate_gyro(&mut gyro, &clock, &p);

        // 10 s at 50 Hz
        assert!(res.num_samples >= 499 && res.num_samples <= 501);
        assert!(clock.now_s() < 10.1);
    }

    #[test]
    fn test_read_errors_are_zero_samples() {
        let clock = StepClock(Mutex::new(0.0));
        let mut gyro = BiasedGyro { bias: 2.0, n: 0, fail_every: Some(4) };

        let res = calibrate_gyro(&mut gyro, &clock, &params());

        assert_eq!(res.num_read_errors, 250);
        // Three quarters of the samples carry the bias
        assert!((res.offset_dps - 1.5).abs() < 0.02);
    }

    #[test]
    fn test_no_samples_gives_zero_offset() {
        let clock = StepClock(Mutex::new(0.0));
        let mut gyro = BiasedGyro { bias: 2.0, n: 0, fail_every: None };
        let mut p = params();
        p.max_samples = 0;

        let res = calibrate_gyro(&mut gyro, &clock, &p);
        assert_eq!(res.num_samples, 0);
        assert_eq!(res.offset_dps, 0.0);
    }
}
