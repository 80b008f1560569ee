//! # Mission module
//!
//! This module implements the [`MissionMgr`] state machine, which decides each tick which error
//! signal the steering controller works on, with which gains, and at what speed. The machine is
//! broken down into phases:
//!
//! - `DirectionDiscovery` - Decide the travel direction from the corner line colour or the side
//!   distances, or fall back on the profile's default after a timeout.
//! - `CoarseAlign` - Steer to a short sequence of heading targets with tightening tolerances.
//! - `CourseFollow` - Follow the course. Pillar profiles track a coloured pillar through the
//!   `NoSignal`, `SignalFollow`, `SignalLost` and `SignalPass` variants, wall profiles centre
//!   between the walls in `WallFollow`. An obstacle close ahead brakes in `ObstacleHold`, backs
//!   away in `ObstacleBackoff` and is then passed through `SignalPass`.
//! - `CornerMark` - Turn onto the heading of the corner just counted.
//! - `TerminalReversal` - Half turn in three stages of tightening tolerance.
//! - `FinalStraight` - Hold the heading for a fixed distance.
//! - `Park` - Run the profile's park steps in order.
//! - `Complete` - Stopped, the run is over.
//!
//! Exactly one phase is active. Transitions depend only on the tick's observations, the elapsed
//! time in the phase and the profile's thresholds.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod corner;
mod discovery;
mod follow;
mod profile;
mod recovery;
mod terminal;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::fmt;

use comms_if::eqpt::vision::{ColourClass, PassSide};
use log::{debug, info};
use serde::Serialize;
use util::maths::shortest_signed_diff_deg;

use crate::{
    indicator::IndicatorState,
    loc::Pose,
    per::{Observer, Ranged},
    pid_ctrl::PidGains,
};

pub use corner::CornerTracker;
pub use profile::*;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Mission manager
pub struct MissionMgr {
    profile: MissionProfile,

    phase: Phase,

    /// Time the current phase was entered, `None` before the first step.
    phase_entry_s: Option<f64>,

    /// Travel direction, `None` until discovery resolves it.
    direction: Option<Direction>,

    corners: CornerTracker,

    /// Heading the course is currently aligned with.
    ///
    /// Units: degrees
    target_heading_deg: f64,

    /// Heading aimed for by the terminal reversal.
    ///
    /// Units: degrees
    reversal_target_deg: f64,

    /// Class seen on consecutive ticks while not following anything.
    candidate: Option<ColourClass>,
    present_streak: u32,
    absent_streak: u32,

    /// Side of the pillar being followed or passed.
    last_colour_side: Option<PassSide>,

    /// Requests raised during the current step.
    pending: Pending,
}

/// Observations the mission works from, besides its own vision queries.
#[derive(Debug, Clone, Copy, Default)]
pub struct MissionInput {
    /// Units: seconds
    pub now_s: f64,

    pub pose: Pose,

    pub front: Ranged,
    pub left: Ranged,
    pub right: Ranged,
}

/// The error signal and schedule the control loop should apply this tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Demand {
    /// Signed error, positive when the vehicle should turn counter-clockwise (left).
    pub error: f64,

    #[serde(skip)]
    pub gains: PidGains,

    /// Abstract target speed
    pub target_speed: f64,
}

/// Output of a mission step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepOutput {
    pub demand: Demand,

    /// The PID integral must be zeroed before this tick's step.
    pub reset_integral: bool,

    /// The odometry must be zeroed after this tick, marking a segment boundary.
    pub reset_odometry: bool,

    pub indicator: IndicatorState,

    /// The vehicle must brake at once instead of ramping down.
    pub emergency_stop: bool,

    /// The mission has finished.
    pub complete: bool,
}

#[derive(Debug, Clone, Copy, Default)]
struct Pending {
    reset_integral: bool,
    reset_odometry: bool,
    emergency_stop: bool,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Phase {
    DirectionDiscovery,
    CoarseAlign { step: usize },
    CourseFollow(FollowVariant),
    CornerMark,
    TerminalReversal(ReversalStage),
    FinalStraight,
    Park { step: usize },
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum FollowVariant {
    NoSignal,
    SignalFollow { class: ColourClass },
    SignalLost { class: ColourClass },
    SignalPass { side: PassSide },
    WallFollow,
    ObstacleHold { side: PassSide },
    ObstacleBackoff { side: PassSide },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReversalStage {
    Aggressive,
    Moderate,
    Precise,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl MissionMgr {
    pub fn new(profile: MissionProfile) -> Self {
        info!("Mission profile \"{}\" loaded", profile.name);

        Self {
            corners: CornerTracker::new(profile.corner_cooldown_s),
            profile,
            phase: Phase::DirectionDiscovery,
            phase_entry_s: None,
            direction: None,
            target_heading_deg: 0.0,
            reversal_target_deg: 0.0,
            candidate: None,
            present_streak: 0,
            absent_streak: 0,
            last_colour_side: None,
            pending: Pending::default(),
        }
    }

    /// Evaluate the active phase for one tick.
    pub fn step(&mut self, input: &MissionInput, obs: &mut dyn Observer) -> StepOutput {
        self.pending = Pending::default();
        self.phase_entry_s.get_or_insert(input.now_s);

        let mut demand = match self.phase {
            Phase::DirectionDiscovery => self.step_discovery(input, obs),
            Phase::CoarseAlign { step } => self.step_align(input, step),
            Phase::CourseFollow(variant) => self.step_follow(input, obs, variant),
            Phase::CornerMark => self.step_corner_mark(input, obs),
            Phase::TerminalReversal(stage) => self.step_reversal(input, stage),
            Phase::FinalStraight => self.step_final_straight(input),
            Phase::Park { step } => self.step_park(input, obs, step),
            Phase::Complete => Demand::stop(),
        };

        // Reversing away from the obstacle is allowed
        if let Some(front_mm) = input.front.current() {
            if front_mm < self.profile.emergency_stop_mm && demand.target_speed > 0.0 {
                debug!("Front range {:.0} mm under the stop distance, braking", front_mm);
                demand.target_speed = 0.0;
                self.pending.emergency_stop = true;
            }
        }

        StepOutput {
            demand,
            reset_integral: self.pending.reset_integral,
            reset_odometry: self.pending.reset_odometry,
            emergency_stop: self.pending.emergency_stop,
            indicator: self.indicator(),
            complete: self.phase == Phase::Complete,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn direction(&self) -> Option<Direction> {
        self.direction
    }

    pub fn corner_count(&self) -> u32 {
        self.corners.count()
    }

    pub fn target_heading_deg(&self) -> f64 {
        self.target_heading_deg
    }

    pub fn profile(&self) -> &MissionProfile {
        &self.profile
    }

    // ---- HELPERS FOR THE PHASES ----

    /// Switch phase. Entering a phase always zeroes the PID integral.
    fn enter(&mut self, phase: Phase, now_s: f64) {
        info!("Mission phase {} -> {} at {:.2} s", self.phase, phase, now_s);

        self.phase = phase;
        self.phase_entry_s = Some(now_s);
        self.pending.reset_integral = true;
    }

    /// Time spent in the current phase.
    fn elapsed_s(&self, now_s: f64) -> f64 {
        now_s - self.phase_entry_s.unwrap_or(now_s)
    }

    /// Resolved direction, or the default while discovery is running.
    fn travel_direction(&self) -> Direction {
        self.direction.unwrap_or(self.profile.default_direction)
    }

    fn indicator(&self) -> IndicatorState {
        match self.phase {
            Phase::CourseFollow(FollowVariant::SignalFollow { .. })
            | Phase::CourseFollow(FollowVariant::SignalLost { .. })
            | Phase::CourseFollow(FollowVariant::SignalPass { .. })
            | Phase::CourseFollow(FollowVariant::ObstacleHold { .. })
            | Phase::CourseFollow(FollowVariant::ObstacleBackoff { .. }) => {
                match self.last_colour_side {
                    Some(PassSide::Left) => IndicatorState::TrackingLeft,
                    Some(PassSide::Right) => IndicatorState::TrackingRight,
                    None => IndicatorState::Idle,
                }
            }
            _ => IndicatorState::Idle,
        }
    }
}

/// Heading error towards `target_deg`, wrapped into (-180, 180].
fn heading_error(pose: &Pose, target_deg: f64) -> f64 {
    shortest_signed_diff_deg(target_deg, pose.heading_deg)
}

impl Demand {
    pub fn stop() -> Self {
        Self {
            error: 0.0,
            gains: PidGains::default(),
            target_speed: 0.0,
        }
    }

    /// Demand from a heading error alone.
    fn heading(tuning: &PhaseTuning, heading_err: f64) -> Self {
        Self {
            error: heading_err,
            gains: tuning.gains,
            target_speed: tuning.speed,
        }
    }

    /// Demand blending a lateral error with the heading error, falling back on the heading error
    /// alone when there is no lateral error this tick.
    fn blend(tuning: &PhaseTuning, lateral_err: Option<f64>, heading_err: f64) -> Self {
        match lateral_err {
            Some(l) => Self {
                error: tuning.lateral_weight * l + tuning.heading_weight * heading_err,
                gains: tuning.gains,
                target_speed: tuning.speed,
            },
            None => Self::heading(tuning, heading_err),
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::DirectionDiscovery => write!(f, "DirectionDiscovery"),
            Phase::CoarseAlign { step } => write!(f, "CoarseAlign[{}]", step),
            Phase::CourseFollow(v) => match v {
                FollowVariant::NoSignal => write!(f, "CourseFollow/NoSignal"),
                FollowVariant::SignalFollow { class } => {
                    write!(f, "CourseFollow/SignalFollow({:?})", class)
                }
                FollowVariant::SignalLost { class } => {
                    write!(f, "CourseFollow/SignalLost({:?})", class)
                }
                FollowVariant::SignalPass { side } => {
                    write!(f, "CourseFollow/SignalPass({:?})", side)
                }
                FollowVariant::WallFollow => write!(f, "CourseFollow/WallFollow"),
                FollowVariant::ObstacleHold { side } => {
                    write!(f, "CourseFollow/ObstacleHold({:?})", side)
                }
                FollowVariant::ObstacleBackoff { side } => {
                    write!(f, "CourseFollow/ObstacleBackoff({:?})", side)
                }
            },
            Phase::CornerMark => write!(f, "CornerMark"),
            Phase::TerminalReversal(s) => write!(f, "TerminalReversal/{:?}", s),
            Phase::FinalStraight => write!(f, "FinalStraight"),
            Phase::Park { step } => write!(f, "Park[{}]", step),
            Phase::Complete => write!(f, "Complete"),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_util {
    use super::*;
    use crate::per::Detection;
    use comms_if::eqpt::vision::Roi;
    use std::collections::HashMap;

    /// Observer reporting fixed detections per class.
    #[derive(Default)]
    pub struct FakeObserver {
        pub seen: HashMap<ColourClass, f64>,
        pub queries: Vec<ColourClass>,
    }

    impl FakeObserver {
        pub fn show(&mut self, class: ColourClass, center_error_px: f64) {
            self.seen.insert(class, center_error_px);
        }

        pub fn hide(&mut self, class: ColourClass) {
            self.seen.remove(&class);
        }
    }

    impl Observer for FakeObserver {
        fn detect(&mut self, class: ColourClass, _: &Roi) -> Detection {
            self.queries.push(class);
            match self.seen.get(&class) {
                Some(e) => Detection { class, center_error_px: *e, present: true },
                None => Detection::absent(class),
            }
        }
    }

    /// Input with both side distances fresh.
    pub fn input(now_s: f64, heading_deg: f64, left_mm: f64, right_mm: f64) -> MissionInput {
        MissionInput {
            now_s,
            pose: Pose { heading_deg, ..Pose::default() },
            front: Ranged::fresh(2000.0),
            left: Ranged::fresh(left_mm),
            right: Ranged::fresh(right_mm),
        }
    }
}
