//! # Simulated platform
//!
//! A kinematic stand-in for the vehicle, used to run the navigation exec on the host and in
//! scenario tests. Time only advances when the control code sleeps on the [`SimClock`], so a run
//! is deterministic and takes no wall clock time.
//!
//! | Collaborator | Simulation |
//! |--------------|------------|
//! | Gyro | true yaw rate plus a constant bias |
//! | Companion | answers `r` with the configured side ranges and the distance travelled, or a garbled line once on request |
//! | Local encoder | one edge per `mm_per_tick` travelled |
//! | Vision | blobs shown and hidden by scheduled events |
//! | Servo, drive | steering and speed fractions feeding the kinematics |
//! | Indicator, power | recorded |
//!
//! Every actuator command, indicator change, sleep and the halt are kept in a [`SimRecord`].

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use comms_if::{
    eqpt::{
        actuator::{DriveCmd, DriveMotor, SteeringServo},
        board::{Indicator, PowerCtrl, Rgb},
        imu::RateGyro,
        ranging::RangeSensor,
        vision::{Blob, ColourClass, Roi, VisionSource},
        EqptError,
    },
    link::{Link, LinkError},
};
use log::{debug, info};
use util::time::Clock;

use super::Vehicle;
use crate::{
    act_ctrl::{self, DriveStyle},
    edge::{EncoderCounter, StartLatch},
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Parameters of the simulated vehicle and course.
#[derive(Debug, Clone)]
pub struct SimParams {
    /// Calibration of the actuators, used to turn commands back into steering and speed.
    pub act: act_ctrl::Params,

    /// Yaw rate at full lock and full speed.
    ///
    /// Units: degrees/second
    pub max_yaw_rate_dps: f64,

    /// Units: millimeters/second
    pub max_speed_mm_s: f64,

    /// Units: degrees/second
    pub gyro_bias_dps: f64,

    /// Units: millimeters
    pub mm_per_tick: f64,

    /// Initial side ranges.
    ///
    /// Units: millimeters
    pub left_mm: f64,
    pub right_mm: f64,

    /// Initial front range, `None` if no front sensor is fitted.
    ///
    /// Units: millimeters
    pub front_mm: Option<f64>,

    /// Units: seconds
    pub start_debounce_s: f64,
}

/// Everything the simulated collaborators were asked to do.
#[derive(Debug, Clone, Default)]
pub struct SimRecord {
    /// Time and width of every servo command
    pub servo_us: Vec<(f64, f64)>,

    /// Time and value of every drive command
    pub drive: Vec<(f64, DriveCmd)>,

    /// Time and colour of every indicator change
    pub indicator: Vec<(f64, Rgb)>,

    /// Time at which each sleep started and its length
    pub sleeps: Vec<(f64, Duration)>,

    /// Bytes sent to the companion
    pub companion_tx: Vec<u8>,

    /// Time of the low power halt
    pub halted_at_s: Option<f64>,
}

/// The simulated world, shared by all simulated collaborators.
#[derive(Clone)]
pub struct SimWorld {
    params: SimParams,
    state: Arc<Mutex<SimState>>,
    encoder: Arc<EncoderCounter>,
    start: Arc<StartLatch>,
}

/// Clock whose time advances only when slept on.
pub struct SimClock {
    world: SimWorld,
}

struct SimState {
    time_s: f64,

    heading_deg: f64,
    yaw_rate_dps: f64,

    /// Steering in [-1, 1], positive to the left
    steer_frac: f64,

    /// Speed in [-1, 1]
    speed_frac: f64,

    /// Distance reported by the companion since its last reset
    encoder_mm: f64,

    /// Distance not yet turned into a local encoder edge
    tick_remainder_mm: f64,

    left_mm: f64,
    right_mm: f64,
    front_mm: Option<f64>,

    blobs: HashMap<ColourClass, Blob>,

    gyro_fault: bool,
    companion_silent: bool,
    companion_paused: bool,
    companion_line: Option<String>,
    companion_garble: bool,

    /// Pending events, ordered by time
    events: Vec<(f64, SimEvent)>,

    record: SimRecord,
}

struct SimGyro(SimWorld);
struct SimRange(SimWorld);
struct SimVision(SimWorld);
struct SimCompanion(SimWorld);
struct SimServo(SimWorld);
struct SimDrive(SimWorld);
struct SimIndicator(SimWorld);
struct SimPower(SimWorld);

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// A change to the world at a given time.
#[derive(Debug, Clone, PartialEq)]
pub enum SimEvent {
    PressStart,

    ShowBlob { class: ColourClass, blob: Blob },
    HideBlob(ColourClass),

    SetSides { left_mm: f64, right_mm: f64 },
    SetFront(f64),

    /// The gyro stops answering for the rest of the run.
    GyroFault,

    /// The companion stops, or resumes, answering read requests.
    CompanionSilent(bool),

    /// The companion's next answer arrives corrupted and is not valid UTF-8.
    CompanionGarble,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SimParams {
    /// A vehicle with the given actuator calibration on a straight, 400 mm wide corridor.
    pub fn new(act: act_ctrl::Params) -> Self {
        Self {
            act,
            max_yaw_rate_dps: 120.0,
            max_speed_mm_s: 1500.0,
            gyro_bias_dps: 0.8,
            mm_per_tick: 0.8333,
            left_mm: 200.0,
            right_mm: 200.0,
            front_mm: Some(2000.0),
            start_debounce_s: 0.05,
        }
    }
}

impl SimWorld {
    pub fn new(params: SimParams) -> Self {
        let state = SimState {
            time_s: 0.0,
            heading_deg: 0.0,
            yaw_rate_dps: 0.0,
            steer_frac: 0.0,
            speed_frac: 0.0,
            encoder_mm: 0.0,
            tick_remainder_mm: 0.0,
            left_mm: params.left_mm,
            right_mm: params.right_mm,
            front_mm: params.front_mm,
            blobs: HashMap::new(),
            gyro_fault: false,
            companion_silent: false,
            companion_paused: false,
            companion_line: None,
            companion_garble: false,
            events: Vec::new(),
            record: SimRecord::default(),
        };

        Self {
            start: Arc::new(StartLatch::new(params.start_debounce_s)),
            encoder: Arc::new(EncoderCounter::new()),
            state: Arc::new(Mutex::new(state)),
            params,
        }
    }

    /// Schedule an event at `at_s` seconds of simulated time.
    pub fn schedule(&self, at_s: f64, event: SimEvent) {
        let mut s = self.lock();
        let idx = s.events.iter().take_while(|(t, _)| *t <= at_s).count();
        s.events.insert(idx, (at_s, event));
    }

    /// Build the collaborators of a run in this world.
    pub fn vehicle(&self) -> Vehicle {
        let front: Option<Box<dyn RangeSensor>> = match self.params.front_mm {
            Some(_) => Some(Box::new(SimRange(self.clone()))),
            None => None,
        };

        Vehicle {
            clock: Arc::new(SimClock { world: self.clone() }),
            gyro: Box::new(SimGyro(self.clone())),
            front,
            vision: Box::new(SimVision(self.clone())),
            companion: Box::new(SimCompanion(self.clone())),
            servo: Box::new(SimServo(self.clone())),
            drive: Box::new(SimDrive(self.clone())),
            indicator: Box::new(SimIndicator(self.clone())),
            power: Box::new(SimPower(self.clone())),
            encoder: self.encoder.clone(),
            start: self.start.clone(),
        }
    }

    /// Copy of everything recorded so far.
    pub fn record(&self) -> SimRecord {
        self.lock().record.clone()
    }

    pub fn time_s(&self) -> f64 {
        self.lock().time_s
    }

    /// True heading of the simulated vehicle.
    pub fn heading_deg(&self) -> f64 {
        self.lock().heading_deg
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        // A panicking test thread must not hide the record from the others
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Move the world forward by `dt_s`.
    fn advance(&self, dt_s: f64) {
        let mut guard = self.lock();
        let s = &mut *guard;

        s.yaw_rate_dps = self.params.max_yaw_rate_dps * s.steer_frac * s.speed_frac;
        s.heading_deg += s.yaw_rate_dps * dt_s;

        let travelled_mm = self.params.max_speed_mm_s * s.speed_frac * dt_s;
        s.encoder_mm += travelled_mm;

        if self.params.mm_per_tick > 0.0 {
            s.tick_remainder_mm += travelled_mm;
            while s.tick_remainder_mm.abs() >= self.params.mm_per_tick {
                let fwd = s.tick_remainder_mm > 0.0;
                self.encoder.on_edge(fwd);
                s.tick_remainder_mm -= self.params.mm_per_tick.copysign(s.tick_remainder_mm);
            }
        }

        s.time_s += dt_s;

        let now_s = s.time_s;
        let due = s.events.iter().take_while(|(t, _)| *t <= now_s).count();
        let fired: Vec<(f64, SimEvent)> = s.events.drain(..due).collect();

        for (_, event) in fired {
            debug!("Sim event at {:.3} s: {:?}", now_s, event);

            match event {
                SimEvent::PressStart => self.start.on_press(now_s),
                SimEvent::ShowBlob { class, blob } => {
                    s.blobs.insert(class, blob);
                }
                SimEvent::HideBlob(class) => {
                    s.blobs.remove(&class);
                }
                SimEvent::SetSides { left_mm, right_mm } => {
                    s.left_mm = left_mm;
                    s.right_mm = right_mm;
                }
                SimEvent::SetFront(mm) => s.front_mm = Some(mm),
                SimEvent::GyroFault => s.gyro_fault = true,
                SimEvent::CompanionSilent(silent) => s.companion_silent = silent,
                SimEvent::CompanionGarble => s.companion_garble = true,
            }
        }
    }

    /// Steering fraction for a servo pulse, positive to the left.
    fn steer_frac(&self, width_us: f64) -> f64 {
        let act = &self.params.act;
        let offset = width_us - act.pulse_center_us;
        let left_span = act.pulse_min_pos_us - act.pulse_center_us;
        let right_span = act.pulse_max_pos_us - act.pulse_center_us;

        if offset * left_span > 0.0 {
            offset / left_span
        } else if offset * right_span > 0.0 {
            -offset / right_span
        } else {
            0.0
        }
    }

    /// Speed fraction for a drive command, the brake being zero.
    fn speed_frac(&self, cmd: DriveCmd) -> f64 {
        match (cmd, &self.params.act.drive_style) {
            (DriveCmd::Differential { fwd_duty_pct, rev_duty_pct }, _) => {
                (fwd_duty_pct - rev_duty_pct) / act_ctrl::SPEED_LIMIT
            }
            (
                DriveCmd::Pulse { width_us },
                DriveStyle::Esc { neutral_us, full_fwd_us, full_rev_us },
            ) => {
                let offset = width_us - neutral_us;
                let fwd_span = full_fwd_us - neutral_us;
                let rev_span = full_rev_us - neutral_us;

                if offset * fwd_span > 0.0 {
                    offset / fwd_span
                } else if offset * rev_span > 0.0 {
                    -offset / rev_span
                } else {
                    0.0
                }
            }
            (DriveCmd::Pulse { .. }, DriveStyle::Differential { .. }) => 0.0,
        }
    }
}

impl Clock for SimClock {
    fn now_s(&self) -> f64 {
        self.world.time_s()
    }

    fn sleep(&self, duration: Duration) {
        {
            let mut s = self.world.lock();
            let now_s = s.time_s;
            s.record.sleeps.push((now_s, duration));
        }
        self.world.advance(duration.as_secs_f64());
    }
}

impl RateGyro for SimGyro {
    fn read_rate_dps(&mut self) -> Result<f64, EqptError> {
        let s = self.0.lock();
        if s.gyro_fault {
            return Err(EqptError::Fault("gyro not responding".into()));
        }
        Ok(s.yaw_rate_dps + self.0.params.gyro_bias_dps)
    }
}

impl RangeSensor for SimRange {
    fn read_mm(&mut self) -> Result<f64, EqptError> {
        self.0.lock().front_mm.ok_or(EqptError::Timeout)
    }
}

impl VisionSource for SimVision {
    fn find_regions(&mut self, class: ColourClass, roi: &Roi) -> Result<Vec<Blob>, EqptError> {
        Ok(self
            .0
            .lock()
            .blobs
            .get(&class)
            .filter(|b| roi.contains_x(b.centroid_x))
            .copied()
            .into_iter()
            .collect())
    }
}

impl Link for SimCompanion {
    fn send(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        let mut guard = self.0.lock();
        let s = &mut *guard;

        for b in bytes {
            s.record.companion_tx.push(*b);

            match b {
                b'r' if !s.companion_silent && !s.companion_paused => {
                    let line = format!("{:.0},{:.0},{:.1}", s.left_mm, s.right_mm, s.encoder_mm);
                    s.companion_line = Some(line);
                }
                b'z' => s.encoder_mm = 0.0,
                b'p' => s.companion_paused = true,
                _ => (),
            }
        }

        Ok(())
    }

    fn read_line(&mut self, _timeout: Duration) -> Result<Option<String>, LinkError> {
        let mut guard = self.0.lock();
        let s = &mut *guard;

        match s.companion_line.take() {
            Some(_) if s.companion_garble => {
                s.companion_garble = false;
                Err(LinkError::NonUtf8Line)
            }
            line => Ok(line),
        }
    }

    fn discard_input(&mut self) -> Result<(), LinkError> {
        self.0.lock().companion_line = None;
        Ok(())
    }
}

impl SteeringServo for SimServo {
    fn set_pulse_width_us(&mut self, width_us: f64) -> Result<(), EqptError> {
        let frac = self.0.steer_frac(width_us);
        let mut s = self.0.lock();
        let now_s = s.time_s;
        s.record.servo_us.push((now_s, width_us));
        s.steer_frac = frac;
        Ok(())
    }
}

impl DriveMotor for SimDrive {
    fn apply(&mut self, cmd: DriveCmd) -> Result<(), EqptError> {
        let frac = self.0.speed_frac(cmd);
        let mut s = self.0.lock();
        let now_s = s.time_s;
        s.record.drive.push((now_s, cmd));
        s.speed_frac = frac;
        Ok(())
    }
}

impl Indicator for SimIndicator {
    fn set_colour(&mut self, colour: Rgb) -> Result<(), EqptError> {
        let mut s = self.0.lock();
        let now_s = s.time_s;
        s.record.indicator.push((now_s, colour));
        Ok(())
    }
}

impl PowerCtrl for SimPower {
    fn standby(&mut self) -> Result<(), EqptError> {
        let mut s = self.0.lock();
        info!("Simulated vehicle halted at {:.2} s", s.time_s);
        s.record.halted_at_s = Some(s.time_s);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn world() -> SimWorld {
        SimWorld::new(SimParams::new(act_ctrl::Params {
            pulse_min_pos_us: 2750.0,
            pulse_center_us: 2300.0,
            pulse_max_pos_us: 1850.0,
            max_speed_step: 2.0,
            drive_style: DriveStyle::Differential { brake_duty_pct: 100.0 },
        }))
    }

    #[test]
    fn test_events_fire_in_order() {
        let w = world();
        let v = w.vehicle();
        w.schedule(0.5, SimEvent::SetSides { left_mm: 100.0, right_mm: 300.0 });
        w.schedule(0.2, SimEvent::SetFront(50.0));

        let mut front = v.front.unwrap();
        v.clock.sleep(Duration::from_millis(300));
        assert_eq!(front.read_mm().unwrap(), 50.0);

        let mut comp = v.companion;
        comp.send(b"r").unwrap();
        assert_eq!(comp.read_line(Duration::from_millis(10)).unwrap().unwrap(), "200,200,0.0");

        v.clock.sleep(Duration::from_millis(300));
        comp.send(b"r").unwrap();
        assert_eq!(comp.read_line(Duration::from_millis(10)).unwrap().unwrap(), "100,300,0.0");
    }

    #[test]
    fn test_left_steer_turns_ccw() {
        let w = world();
        let mut v = w.vehicle();

        v.servo.set_pulse_width_us(2750.0).unwrap();
        v.drive
            .apply(DriveCmd::Differential { fwd_duty_pct: 50.0, rev_duty_pct: 0.0 })
            .unwrap();
        v.clock.sleep(Duration::from_secs(1));

        assert!((w.heading_deg() - 60.0).abs() < 1e-9);
        assert!((v.gyro.read_rate_dps().unwrap() - 60.8).abs() < 1e-9);

        // Local encoder counts the 750 mm travelled
        let ticks = v.encoder.drain();
        assert!((ticks as f64 * 0.8333 - 750.0).abs() < 1.0);

        // Brake stops the turn
        v.drive
            .apply(DriveCmd::Differential { fwd_duty_pct: 100.0, rev_duty_pct: 100.0 })
            .unwrap();
        v.clock.sleep(Duration::from_secs(1));
        assert!((w.heading_deg() - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_companion_pause_and_silence() {
        let w = world();
        let mut v = w.vehicle();
        w.schedule(0.1, SimEvent::CompanionSilent(true));

        v.clock.sleep(Duration::from_millis(200));
        v.companion.send(b"r").unwrap();
        assert_eq!(v.companion.read_line(Duration::from_millis(10)).unwrap(), None);

        v.companion.send(b"p").unwrap();
        assert_eq!(w.record().companion_tx, b"rp".to_vec());
    }

    #[test]
    fn test_companion_garbles_one_answer() {
        let w = world();
        let mut v = w.vehicle();
        w.schedule(0.1, SimEvent::CompanionGarble);
        v.clock.sleep(Duration::from_millis(200));

        v.companion.send(b"r").unwrap();
        assert!(matches!(
            v.companion.read_line(Duration::from_millis(10)),
            Err(LinkError::NonUtf8Line)
        ));

        v.companion.send(b"r").unwrap();
        assert!(v.companion.read_line(Duration::from_millis(10)).unwrap().is_some());
    }
}
