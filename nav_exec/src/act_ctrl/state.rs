//! Implementations for the ActCtrl state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use comms_if::eqpt::actuator::DriveCmd;
use log::{trace, warn};
use serde::Serialize;

// Internal
use super::{
    ActCtrlError, DriveStyle, Params, SPEED_LIMIT, STEER_POS_CENTER, STEER_POS_MAX, STEER_POS_MIN,
};
use util::{
    maths::{clamp, lin_map, step_towards},
    module::State,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Actuation control module state
#[derive(Debug, Default)]
pub struct ActCtrl {
    pub(crate) params: Option<Params>,

    /// Speed currently commanded, ramping towards the target.
    current_speed: f64,
}

/// Input data to actuation control.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct InputData {
    /// Abstract steering position, 0 full left, 240 straight, 480 full right.
    pub steer_pos: f64,

    /// Abstract signed speed in `[-100, 100]`.
    pub target_speed: f64,
}

/// Device commands produced by ActCtrl.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OutputData {
    /// Steering position after limiting.
    pub steer_pos: f64,

    /// Units: microseconds
    pub servo_pulse_us: f64,

    /// Speed after limiting and ramping.
    pub speed: f64,

    #[serde(skip)]
    pub drive: DriveCmd,
}

/// Status report for ActCtrl processing.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StatusReport {
    pub steer_limited: bool,
    pub speed_limited: bool,

    /// True if the current speed has not yet reached the target.
    pub ramping: bool,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for InputData {
    fn default() -> Self {
        Self {
            steer_pos: STEER_POS_CENTER,
            target_speed: 0.0,
        }
    }
}

impl State for ActCtrl {
    type InitData = Params;
    type InitError = ActCtrlError;

    type InputData = InputData;
    type OutputData = OutputData;
    type StatusReport = StatusReport;
    type ProcError = ActCtrlError;

    /// Initialise the ActCtrl module with the vehicle's calibration.
    fn init(&mut self, init_data: Self::InitData) -> Result<(), Self::InitError> {
        init_data.validate()?;
        self.params = Some(init_data);
        self.current_speed = 0.0;
        Ok(())
    }

    /// Perform cyclic processing of actuation control.
    fn proc(
        &mut self,
        input_data: &Self::InputData,
    ) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> {
        let params = self.params.as_ref().ok_or(ActCtrlError::NotInitialised)?;

        if !input_data.steer_pos.is_finite() || !input_data.target_speed.is_finite() {
            return Err(ActCtrlError::NonFiniteDemand(
                input_data.steer_pos,
                input_data.target_speed,
            ));
        }

        let mut report = StatusReport::default();

        // Steering
        let steer_pos = clamp(input_data.steer_pos, STEER_POS_MIN, STEER_POS_MAX);
        report.steer_limited = steer_pos != input_data.steer_pos;
        let servo_pulse_us = steer_pulse(params, steer_pos);

        // Speed
        let target_speed = clamp(input_data.target_speed, -SPEED_LIMIT, SPEED_LIMIT);
        report.speed_limited = target_speed != input_data.target_speed;

        self.current_speed = step_towards(self.current_speed, target_speed, params.max_speed_step);
        report.ramping = self.current_speed != target_speed;

        let output = OutputData {
            steer_pos,
            servo_pulse_us,
            speed: self.current_speed,
            drive: drive_cmd(&params.drive_style, self.current_speed),
        };

        trace!(
            "ActCtrl output: steer {:.1} ({:.0} us), speed {:.1} -> {:?}",
            output.steer_pos,
            output.servo_pulse_us,
            output.speed,
            output.drive
        );

        Ok((output, report))
    }
}

impl ActCtrl {
    /// Create an initialised instance.
    pub fn new(params: Params) -> Result<Self, ActCtrlError> {
        let mut a = Self::default();
        a.init(params)?;
        Ok(a)
    }

    /// Drop the speed to zero immediately, bypassing the ramp.
    pub fn make_safe(&mut self) {
        if self.current_speed != 0.0 {
            warn!("ActCtrl made safe at speed {:.1}", self.current_speed);
        }
        self.current_speed = 0.0;
    }

    /// The output commanding straight steering and an active brake.
    pub fn safe_output(&self) -> Result<OutputData, ActCtrlError> {
        let params = self.params.as_ref().ok_or(ActCtrlError::NotInitialised)?;

        Ok(OutputData {
            steer_pos: STEER_POS_CENTER,
            servo_pulse_us: params.pulse_center_us,
            speed: 0.0,
            drive: drive_cmd(&params.drive_style, 0.0),
        })
    }

    pub fn current_speed(&self) -> f64 {
        self.current_speed
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Map a limited steering position onto the servo's calibrated pulse widths.
///
/// Each half of the position range maps linearly onto its own half of the pulse range, so that
/// an asymmetric servo linkage still centres exactly.
fn steer_pulse(params: &Params, steer_pos: f64) -> f64 {
    if steer_pos < STEER_POS_CENTER {
        lin_map(
            (STEER_POS_MIN, STEER_POS_CENTER),
            (params.pulse_min_pos_us, params.pulse_center_us),
            steer_pos,
        )
    } else {
        lin_map(
            (STEER_POS_CENTER, STEER_POS_MAX),
            (params.pulse_center_us, params.pulse_max_pos_us),
            steer_pos,
        )
    }
}

/// Drive command for a limited, ramped speed.
///
/// Zero speed is an active brake on the differential stage, both channels at the brake duty.
fn drive_cmd(style: &DriveStyle, speed: f64) -> DriveCmd {
    match *style {
        DriveStyle::Differential { brake_duty_pct } => {
            if speed > 0.0 {
                DriveCmd::Differential {
                    fwd_duty_pct: speed,
                    rev_duty_pct: 0.0,
                }
            } else if speed < 0.0 {
                DriveCmd::Differential {
                    fwd_duty_pct: 0.0,
                    rev_duty_pct: -speed,
                }
            } else {
                DriveCmd::Differential {
                    fwd_duty_pct: brake_duty_pct,
                    rev_duty_pct: brake_duty_pct,
                }
            }
        }
        DriveStyle::Esc {
            neutral_us,
            full_fwd_us,
            full_rev_us,
        } => {
            let width_us = if speed >= 0.0 {
                lin_map((0.0, SPEED_LIMIT), (neutral_us, full_fwd_us), speed)
            } else {
                lin_map((-SPEED_LIMIT, 0.0), (full_rev_us, neutral_us), speed)
            };
            DriveCmd::Pulse { width_us }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn params() -> Params {
        Params {
            pulse_min_pos_us: 2750.0,
            pulse_center_us: 2300.0,
            pulse_max_pos_us: 1850.0,
            max_speed_step: 5.0,
            drive_style: DriveStyle::Differential { brake_duty_pct: 100.0 },
        }
    }

    fn input(steer_pos: f64, target_speed: f64) -> InputData {
        InputData { steer_pos, target_speed }
    }

    #[test]
    fn test_not_initialised() {
        let mut a = ActCtrl::default();
        assert!(matches!(a.proc(&InputData::default()), Err(ActCtrlError::NotInitialised)));
    }

    #[test]
    fn test_steering_map() {
        let mut a = ActCtrl::new(params()).unwrap();

        let (o, r) = a.proc(&input(240.0, 0.0)).unwrap();
        assert_eq!(o.servo_pulse_us, 2300.0);
        assert!(!r.steer_limited);

        assert_eq!(a.proc(&input(0.0, 0.0)).unwrap().0.servo_pulse_us, 2750.0);
        assert_eq!(a.proc(&input(120.0, 0.0)).unwrap().0.servo_pulse_us, 2525.0);
        assert_eq!(a.proc(&input(480.0, 0.0)).unwrap().0.servo_pulse_us, 1850.0);
        assert_eq!(a.proc(&input(360.0, 0.0)).unwrap().0.servo_pulse_us, 2075.0);

        let (o, r) = a.proc(&input(-35.0, 0.0)).unwrap();
        assert_eq!(o.steer_pos, 0.0);
        assert_eq!(o.servo_pulse_us, 2750.0);
        assert!(r.steer_limited);

        let (o, r) = a.proc(&input(900.0, 0.0)).unwrap();
        assert_eq!(o.servo_pulse_us, 1850.0);
        assert!(r.steer_limited);
    }

    #[test]
    fn test_speed_ramp_bounded_without_overshoot() {
        let mut a = ActCtrl::new(params()).unwrap();
        let step = params().max_speed_step;

        for target in [73.0f64, -42.0, 0.0, 250.0, 12.5].iter() {
            let limited = target.max(-SPEED_LIMIT).min(SPEED_LIMIT);
            let mut prev = a.current_speed();
            let start_side = (limited - prev).signum();
            let mut n = 0;

            loop {
                let (o, r) = a.proc(&input(240.0, *target)).unwrap();
                assert!((o.speed - prev).abs() <= step + 1e-12);
                // Never past the target
                assert!((limited - o.speed) * start_side >= 0.0);
                prev = o.speed;
                n += 1;
                if !r.ramping {
                    assert_eq!(o.speed, limited);
                    break;
                }
                assert!(n < 100);
            }
        }
    }

    #[test]
    fn test_zero_speed_is_active_brake() {
        let mut a = ActCtrl::new(params()).unwrap();

        let (o, _) = a.proc(&input(240.0, 0.0)).unwrap();
        assert_eq!(
            o.drive,
            DriveCmd::Differential { fwd_duty_pct: 100.0, rev_duty_pct: 100.0 }
        );

        let (o, _) = a.proc(&input(240.0, 5.0)).unwrap();
        assert_eq!(o.drive, DriveCmd::Differential { fwd_duty_pct: 5.0, rev_duty_pct: 0.0 });

        a.make_safe();
        let (o, _) = a.proc(&input(240.0, -5.0)).unwrap();
        assert_eq!(o.drive, DriveCmd::Differential { fwd_duty_pct: 0.0, rev_duty_pct: 5.0 });

        let safe = a.safe_output().unwrap();
        assert_eq!(safe.servo_pulse_us, 2300.0);
        assert_eq!(
            safe.drive,
            DriveCmd::Differential { fwd_duty_pct: 100.0, rev_duty_pct: 100.0 }
        );
    }

    #[test]
    fn test_esc_style() {
        let mut p = params();
        p.max_speed_step = 200.0;
        p.drive_style = DriveStyle::Esc {
            neutral_us: 1500.0,
            full_fwd_us: 2000.0,
            full_rev_us: 1000.0,
        };
        let mut a = ActCtrl::new(p).unwrap();

        assert_eq!(a.proc(&input(240.0, 0.0)).unwrap().0.drive, DriveCmd::Pulse { width_us: 1500.0 });
        assert_eq!(a.proc(&input(240.0, 50.0)).unwrap().0.drive, DriveCmd::Pulse { width_us: 1750.0 });
        assert_eq!(a.proc(&input(240.0, -100.0)).unwrap().0.drive, DriveCmd::Pulse { width_us: 1000.0 });
    }

    #[test]
    fn test_invalid_params() {
        let mut p = params();
        p.drive_style = DriveStyle::Differential { brake_duty_pct: 120.0 };
        assert!(ActCtrl::new(p).is_err());

        let mut p = params();
        p.max_speed_step = 0.0;
        assert!(ActCtrl::new(p).is_err());
    }
}
