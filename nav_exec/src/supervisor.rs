//! # Run Supervisor
//!
//! Owns the fixed period control loop of a run:
//!
//! 1. Calibrate the gyro bias while the vehicle is stationary.
//! 2. Armed: wait for the start press.
//! 3. Run: once per cycle read the companion, gyro and front range, advance localisation, step the
//!    mission, step the PID, and command the actuators.
//!
//! Whatever ends the run (completion, the forced timeout or a fault) the vehicle is stopped with
//! straight steering, the companion paused, and the board put in its low power halt after a
//! settle delay. This is done by [`ShutdownGuard`] when it is dropped, so it also happens if the
//! loop unwinds.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{sync::Arc, time::Duration};

use comms_if::eqpt::{
    actuator::{DriveMotor, SteeringServo},
    board::{Indicator, PowerCtrl},
    imu::RateGyro,
    ranging::RangeSensor,
    vision::VisionSource,
    EqptError,
};
use log::{error, info, trace, warn};
use serde::Serialize;
use util::{archive::Archiver, module::State, time::Clock};

use crate::{
    act_ctrl::{self, ActCtrl, ActCtrlError, STEER_POS_CENTER},
    companion_client::{CompanionClient, CompanionClientError},
    data_store::DataStore,
    edge::{EncoderCounter, StartLatch},
    indicator::IndicatorState,
    loc::{calibrate_gyro, LocError, LocMgr, LocParams},
    mission::{MissionInput, MissionMgr, MissionProfile, Phase},
    params::{NavExecParams, OdometrySource, ParamsError},
    per::{PerMgr, PerParams, Ranged, VisionObserver},
    platform::Vehicle,
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// All parameters of a run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub exec: NavExecParams,
    pub act_ctrl: act_ctrl::Params,
    pub loc: LocParams,
    pub per: PerParams,
    pub profile: MissionProfile,
}

/// Run supervisor
pub struct Supervisor {
    vehicle: Vehicle,
    config: RunConfig,
    act_ctrl: ActCtrl,
    archiver: Option<Archiver>,
}

/// Summary of a finished run.
#[derive(Debug)]
pub struct RunReport {
    pub outcome: RunOutcome,

    /// The fault which ended the run, if any.
    pub fault: Option<SupervisorError>,

    pub last_phase: Phase,
    pub num_cycles: u64,
    pub corners: u32,

    /// Consecutive cycle overruns at the end of the run.
    pub cycle_overruns: u64,
}

/// Stops and halts the vehicle when dropped.
///
/// Owns everything the vehicle is commanded through, the loop borrows it to issue the cycle's
/// commands.
pub struct ShutdownGuard {
    clock: Arc<dyn Clock>,
    servo: Box<dyn SteeringServo>,
    drive: Box<dyn DriveMotor>,
    indicator: Box<dyn Indicator>,
    power: Box<dyn PowerCtrl>,
    companion: CompanionClient,

    /// Outcome the shutdown is performed for, `Fault` unless set otherwise before the drop.
    outcome: RunOutcome,

    /// Commands giving straight steering and an active brake
    safe_output: act_ctrl::OutputData,

    settle_complete: Duration,
    settle_fault: Duration,
}

/// The inputs of the loop.
struct Sensors {
    clock: Arc<dyn Clock>,
    gyro: Box<dyn RateGyro>,
    front: Option<Box<dyn RangeSensor>>,
    vision: Box<dyn VisionSource>,
    encoder: Arc<EncoderCounter>,
    start: Arc<StartLatch>,
}

/// One archived cycle.
#[derive(Debug, Serialize)]
struct TickRecord {
    time_s: f64,
    phase: String,
    heading_deg: f64,
    x_mm: f64,
    y_mm: f64,
    left_mm: Option<f64>,
    right_mm: Option<f64>,
    front_mm: Option<f64>,
    error: f64,
    pid_output: f64,
    steer_pos: f64,
    speed: f64,
    corners: u32,
    cycle_overruns: u64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunOutcome {
    /// The mission reached its `Complete` phase.
    Completed,

    /// The run was ended by `max_run_s`.
    TimedOut,

    /// The run was ended by a fault.
    Fault,
}

/// Faults which end a run.
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("Invalid exec parameters: {0}")]
    ParamsError(#[from] ParamsError),

    #[error("Companion link failure: {0}")]
    CompanionError(#[from] CompanionClientError),

    #[error("Could not read the gyro: {0}")]
    GyroError(EqptError),

    #[error("Localisation failure: {0}")]
    LocError(#[from] LocError),

    #[error("ActCtrl failure: {0}")]
    ActCtrlError(#[from] ActCtrlError),

    #[error("Could not command the {0}: {1}")]
    ActuatorError(&'static str, EqptError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Supervisor {
    /// Create a supervisor for one run. Tick records are written to `archiver` if given.
    pub fn new(
        vehicle: Vehicle,
        config: RunConfig,
        archiver: Option<Archiver>,
    ) -> Result<Self, SupervisorError> {
        config.exec.validate()?;
        let act_ctrl = ActCtrl::new(config.act_ctrl.clone())?;

        Ok(Self {
            vehicle,
            config,
            act_ctrl,
            archiver,
        })
    }

    /// Execute the run to its end and halt the vehicle.
    pub fn run(self) -> RunReport {
        let Supervisor {
            vehicle,
            config,
            act_ctrl,
            mut archiver,
        } = self;
        let exec = &config.exec;

        // The act_ctrl was initialised in new, so the safe output is always available
        let safe_output = match act_ctrl.safe_output() {
            Ok(o) => o,
            Err(e) => {
                error!("Cannot determine the safe actuator commands: {}", e);
                return RunReport {
                    outcome: RunOutcome::Fault,
                    fault: Some(e.into()),
                    last_phase: Phase::DirectionDiscovery,
                    num_cycles: 0,
                    corners: 0,
                    cycle_overruns: 0,
                };
            }
        };

        let Vehicle {
            clock,
            gyro,
            front,
            vision,
            companion,
            servo,
            drive,
            indicator,
            power,
            encoder,
            start,
        } = vehicle;

        let mut guard = ShutdownGuard {
            clock: clock.clone(),
            servo,
            drive,
            indicator,
            power,
            companion: CompanionClient::new(
                companion,
                Duration::from_secs_f64(exec.companion_timeout_s),
                exec.companion_timeout_limit,
            ),
            outcome: RunOutcome::Fault,
            safe_output,
            settle_complete: Duration::from_secs_f64(exec.settle_complete_s),
            settle_fault: Duration::from_secs_f64(exec.settle_fault_s),
        };

        let mut sensors = Sensors {
            clock,
            gyro,
            front,
            vision,
            encoder,
            start,
        };

        let mut ds = DataStore::new(
            LocMgr::new(0.0),
            PerMgr::new(config.per.clone()),
            MissionMgr::new(config.profile.clone()),
            act_ctrl,
        );

        let result = run_loop(
            &mut guard,
            &mut sensors,
            &mut ds,
            &config,
            archiver.as_mut(),
        );

        let fault = match result {
            Ok(outcome) => {
                info!("Run ended: {:?} after {} cycles", outcome, ds.num_cycles);
                guard.outcome = outcome;
                None
            }
            Err(e) => {
                error!("Fault in {}: {}", ds.mission.phase(), e);
                guard.outcome = RunOutcome::Fault;
                Some(e)
            }
        };

        let report = RunReport {
            outcome: guard.outcome,
            fault,
            last_phase: ds.mission.phase(),
            num_cycles: ds.num_cycles,
            corners: ds.mission.corner_count(),
            cycle_overruns: ds.num_consec_cycle_overruns,
        };

        drop(guard);

        report
    }
}

impl ShutdownGuard {
    fn command(&mut self, output: &act_ctrl::OutputData) -> Result<(), SupervisorError> {
        self.servo
            .set_pulse_width_us(output.servo_pulse_us)
            .map_err(|e| SupervisorError::ActuatorError("steering servo", e))?;
        self.drive
            .apply(output.drive)
            .map_err(|e| SupervisorError::ActuatorError("drive motor", e))
    }

    fn show(&mut self, state: IndicatorState) -> Result<(), SupervisorError> {
        self.indicator
            .set_colour(state.colour())
            .map_err(|e| SupervisorError::ActuatorError("status indicator", e))
    }
}

impl Drop for ShutdownGuard {
    fn drop(&mut self) {
        let faulted = self.outcome != RunOutcome::Completed;
        info!("Shutting down, outcome {:?}", self.outcome);

        if faulted {
            if let Err(e) = self.show(IndicatorState::Fault) {
                error!("{}", e);
            }
        }

        let safe_output = self.safe_output;
        if let Err(e) = self.command(&safe_output) {
            error!("Could not stop the vehicle: {}", e);
        }

        if let Err(e) = self.companion.pause() {
            warn!("{}", e);
        }

        let settle = match faulted {
            true => self.settle_fault,
            false => self.settle_complete,
        };
        self.clock.sleep(settle);

        info!("Entering low power halt");
        if let Err(e) = self.power.standby() {
            error!("Could not halt the board: {}", e);
        }
    }
}

impl TickRecord {
    fn from_ds(ds: &DataStore) -> Self {
        let output = ds.act_ctrl_output;

        Self {
            time_s: ds.run_elapsed_s(),
            phase: ds.mission.phase().to_string(),
            heading_deg: ds.pose.heading_deg,
            x_mm: ds.pose.position_mm[0],
            y_mm: ds.pose.position_mm[1],
            left_mm: ds.companion.left.current(),
            right_mm: ds.companion.right.current(),
            front_mm: ds.front.current(),
            error: ds.demand.error,
            pid_output: ds.pid_output,
            steer_pos: output.map_or(STEER_POS_CENTER, |o| o.steer_pos),
            speed: output.map_or(0.0, |o| o.speed),
            corners: ds.mission.corner_count(),
            cycle_overruns: ds.num_consec_cycle_overruns,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Calibrate, wait for the start, then cycle until the run ends.
fn run_loop(
    guard: &mut ShutdownGuard,
    sensors: &mut Sensors,
    ds: &mut DataStore,
    config: &RunConfig,
    mut archiver: Option<&mut Archiver>,
) -> Result<RunOutcome, SupervisorError> {
    let exec = &config.exec;
    let period = Duration::from_secs_f64(exec.cycle_period_s);

    // ---- CALIBRATION ----

    guard.show(IndicatorState::Idle)?;
    ds.indicator = Some(IndicatorState::Idle);
    let safe_output = guard.safe_output;
    guard.command(&safe_output)?;

    info!("Calibrating the gyro, keep the vehicle still");
    let calib = calibrate_gyro(
        sensors.gyro.as_mut(),
        sensors.clock.as_ref(),
        &config.loc.calib,
    );
    info!(
        "Gyro offset {:.4} deg/s from {} samples ({} failed reads)",
        calib.offset_dps, calib.num_samples, calib.num_read_errors
    );
    ds.loc = LocMgr::new(calib.offset_dps);

    // ---- ARMED ----

    info!("Armed, waiting for the start press");
    while !sensors.start.take() {
        sensors.clock.sleep(period);
    }

    ds.run_start_s = sensors.clock.now_s();
    info!("Start pressed at {:.2} s", ds.run_start_s);

    // Distance covered before the start belongs to no segment
    sensors.encoder.drain();
    guard.companion.reset()?;
    ds.last_encoder_mm = Some(0.0);

    // ---- RUN ----

    loop {
        let dt_s = ds.cycle_start(sensors.clock.now_s());

        let complete = tick(guard, sensors, ds, exec, dt_s)?;

        if let Some(a) = archiver.as_mut() {
            if let Err(e) = a.serialise(&TickRecord::from_ds(ds)) {
                warn!("Could not archive the cycle: {}", e);
            }
        }

        ds.num_cycles += 1;

        if complete {
            return Ok(RunOutcome::Completed);
        }

        if ds.run_elapsed_s() >= exec.max_run_s {
            warn!(
                "Run time limit of {:.1} s reached in {}",
                exec.max_run_s,
                ds.mission.phase()
            );
            return Ok(RunOutcome::TimedOut);
        }

        // ---- CYCLE MANAGEMENT ----

        let cycle_dur_s = sensors.clock.now_s() - ds.cycle_start_s;

        if cycle_dur_s <= exec.cycle_period_s {
            ds.num_consec_cycle_overruns = 0;
            sensors
                .clock
                .sleep(Duration::from_secs_f64(exec.cycle_period_s - cycle_dur_s));
        } else {
            warn!("Cycle overran by {:.06} s", cycle_dur_s - exec.cycle_period_s);
            ds.num_consec_cycle_overruns += 1;
        }
    }
}

/// Process one cycle. Returns true once the mission is complete.
fn tick(
    guard: &mut ShutdownGuard,
    sensors: &mut Sensors,
    ds: &mut DataStore,
    exec: &NavExecParams,
    dt_s: f64,
) -> Result<bool, SupervisorError> {
    // ---- DATA INPUT ----

    ds.companion = guard.companion.poll()?;

    let rate_dps = sensors
        .gyro
        .read_rate_dps()
        .map_err(SupervisorError::GyroError)?;

    ds.front = match sensors.front.as_mut() {
        Some(f) => ds.per.read_front(f.as_mut()),
        None => Ranged::default(),
    };

    // ---- LOCALISATION ----

    let ticks = sensors.encoder.drain();
    let delta_mm = match exec.odometry_source {
        OdometrySource::Companion => match ds.companion.encoder.current() {
            Some(enc_mm) => {
                let d = ds.last_encoder_mm.map_or(0.0, |last| enc_mm - last);
                ds.last_encoder_mm = Some(enc_mm);
                d
            }
            None => 0.0,
        },
        OdometrySource::LocalEncoder => ticks as f64 * exec.mm_per_tick,
    };

    ds.pose = ds.loc.update(dt_s, rate_dps, delta_mm)?;

    // ---- MISSION ----

    let input = MissionInput {
        now_s: ds.cycle_start_s,
        pose: ds.pose,
        front: ds.front,
        left: ds.companion.left,
        right: ds.companion.right,
    };

    let step = {
        let mut obs = VisionObserver {
            per: &ds.per,
            vision: sensors.vision.as_mut(),
        };
        ds.mission.step(&input, &mut obs)
    };
    ds.demand = step.demand;

    // ---- CONTROL ----

    if step.reset_integral {
        ds.pid.reset_integral();
    }
    ds.pid_output = ds.pid.step(step.demand.error, &step.demand.gains);

    // Positive errors turn left, towards position 0
    ds.act_ctrl_input = act_ctrl::InputData {
        steer_pos: STEER_POS_CENTER - ds.pid_output,
        target_speed: step.demand.target_speed,
    };

    // An obstacle stop brakes at once rather than ramping down
    if step.emergency_stop {
        ds.act_ctrl.make_safe();
    }

    let (output, status) = ds.act_ctrl.proc(&ds.act_ctrl_input)?;
    if status.speed_limited || status.steer_limited {
        trace!(
            "Demand limited: steer {:.1}, speed {:.1}",
            ds.act_ctrl_input.steer_pos, ds.act_ctrl_input.target_speed
        );
    }
    guard.command(&output)?;
    ds.act_ctrl_output = Some(output);

    if ds.indicator != Some(step.indicator) {
        guard.show(step.indicator)?;
        ds.indicator = Some(step.indicator);
    }

    trace!(
        "{} hdg {:.1} err {:.2} pid {:.2} steer {:.0} speed {:.1}",
        ds.mission.phase(),
        ds.pose.heading_deg,
        step.demand.error,
        ds.pid_output,
        output.steer_pos,
        output.speed
    );

    // ---- SEGMENT BOUNDARY ----

    if step.reset_odometry {
        ds.loc.reset_odometry();
        guard.companion.reset()?;
        ds.last_encoder_mm = Some(0.0);
    }

    Ok(step.complete)
}
