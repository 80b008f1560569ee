//! # Mission profiles
//!
//! A profile is everything that differs between two course challenges: the follow behaviour, the
//! corner count, the terminal manoeuvre, the park sequence and the per-phase tuning. The engine in
//! [`super::MissionMgr`] is the same for all of them.
//!
//! The built-in profiles mirror `params/profiles/*.toml`.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::eqpt::vision::{ColourClass, Roi};
use serde::{Deserialize, Serialize};

use crate::pid_ctrl::PidGains;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionProfile {
    pub name: String,

    // ---- DISCOVERY ----
    /// Direction used if discovery times out.
    pub default_direction: Direction,

    /// Units: seconds
    pub discovery_timeout_s: f64,

    /// Smallest left/right difference which resolves the direction.
    ///
    /// Units: millimeters
    pub discovery_min_side_diff_mm: f64,

    /// Coarse to fine alignment steps run after discovery, may be empty.
    #[serde(default)]
    pub align_steps: Vec<AlignStep>,

    // ---- COURSE FOLLOW ----
    pub follow_mode: FollowMode,

    /// Pillar classes tracked in [`FollowMode::Pillars`], in priority order.
    #[serde(default)]
    pub pillar_classes: Vec<ColourClass>,

    pub pillar_roi: Roi,

    /// Region searched for corner lines.
    pub line_roi: Roi,

    /// Column offset at which a tracked pillar is held while passing it.
    ///
    /// Units: pixels
    pub pass_offset_px: f64,

    /// Consecutive detections needed to start following a pillar.
    pub follow_enter_ticks: u32,

    /// Consecutive misses after which a followed pillar is considered lost.
    pub lost_ticks: u32,

    /// Consecutive misses after which a lost pillar is assumed alongside and passed.
    pub pass_ticks: u32,

    /// Units: seconds
    pub pass_duration_s: f64,

    /// Heading bias towards the pass side while passing.
    ///
    /// Units: degrees
    pub pass_heading_offset_deg: f64,

    // ---- CORNERS ----
    /// Minimum time between two accepted corner lines.
    ///
    /// Units: seconds
    pub corner_cooldown_s: f64,

    /// Number of corners after which the terminal manoeuvre starts.
    pub corner_target: u32,

    /// Heading error under which a corner turn is complete.
    ///
    /// Units: degrees
    pub corner_exit_tolerance_deg: f64,

    // ---- TERMINAL ----
    pub terminal: TerminalManeuver,

    /// Stage limits for [`TerminalManeuver::Reversal`].
    pub reversal: ReversalLimits,

    /// Length of the final straight for [`TerminalManeuver::FinalStraight`].
    ///
    /// Units: millimeters
    pub final_straight_mm: f64,

    /// Park sequence run after the terminal manoeuvre, may be empty.
    #[serde(default)]
    pub park_steps: Vec<ParkStep>,

    pub park_roi: Roi,

    // ---- SAFETY ----
    /// Front range under which the vehicle brakes whatever the phase.
    ///
    /// Units: millimeters
    pub emergency_stop_mm: f64,

    /// Way round an obstacle met under `emergency_stop_mm` while following the course.
    pub recovery: ObstacleRecovery,

    pub tuning: TuningTable,
}

/// Gains, speed and error blend for one phase.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhaseTuning {
    pub gains: PidGains,

    /// Abstract target speed
    pub speed: f64,

    /// Weight of the lateral (vision or wall) error in the blended error.
    #[serde(default)]
    pub lateral_weight: f64,

    /// Weight of the heading error in the blended error.
    #[serde(default = "one")]
    pub heading_weight: f64,
}

/// Gain schedule of the fixed phases. Park steps carry their own tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuningTable {
    pub discovery: PhaseTuning,
    pub align: PhaseTuning,
    pub no_signal: PhaseTuning,
    pub signal_follow: PhaseTuning,
    pub signal_lost: PhaseTuning,
    pub signal_pass: PhaseTuning,
    pub wall_follow: PhaseTuning,
    pub corner_mark: PhaseTuning,
    pub reversal_aggressive: PhaseTuning,
    pub reversal_moderate: PhaseTuning,
    pub reversal_precise: PhaseTuning,
    pub final_straight: PhaseTuning,
}

/// Brake, back away, then pass the obstacle on one side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObstacleRecovery {
    /// Time spent braked before backing away.
    ///
    /// Units: seconds
    pub hold_s: f64,

    /// Distance reversed before the pass.
    ///
    /// Units: millimeters
    pub reverse_mm: f64,

    /// Units: seconds
    pub reverse_timeout_s: f64,

    /// Heading hold while reversing, `speed` is the magnitude of the reverse speed.
    pub reverse: PhaseTuning,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlignStep {
    /// Target heading, counted positive in the direction of travel.
    ///
    /// Units: degrees
    pub target_deg: f64,

    /// Units: degrees
    pub tolerance_deg: f64,

    /// Units: seconds
    pub timeout_s: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageLimits {
    /// Units: degrees
    pub tolerance_deg: f64,

    /// Units: seconds
    pub timeout_s: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReversalLimits {
    pub aggressive: StageLimits,
    pub moderate: StageLimits,
    pub precise: StageLimits,
}

/// One step of the park sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParkStep {
    pub name: String,

    pub tuning: PhaseTuning,

    /// Heading target relative to the heading held after the terminal manoeuvre, counted
    /// positive in the direction of travel.
    ///
    /// Units: degrees
    #[serde(default)]
    pub heading_offset_deg: f64,

    /// Marker giving the lateral error, if any.
    #[serde(default)]
    pub marker: Option<ColourClass>,

    /// Column offset at which the marker is held.
    ///
    /// Units: pixels
    #[serde(default)]
    pub marker_offset_px: f64,

    /// Zero the odometry on entry to the step.
    #[serde(default)]
    pub reset_odometry: bool,

    pub exit: ParkExit,

    /// Units: seconds
    #[serde(default)]
    pub timeout_s: Option<f64>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Rotational sense of travel around the course, seen from above.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Cw,
    Ccw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowMode {
    /// Track coloured pillars and pass them on their colour's side
    Pillars,

    /// Centre between the side walls
    Wall,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalManeuver {
    /// Three stage half turn
    Reversal,

    /// Heading hold for `final_straight_mm`
    FinalStraight,

    /// Go straight to the park sequence
    Park,
}

/// Exit condition of a park step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParkExit {
    HeadingWithin { tolerance_deg: f64 },
    OdometryBeyond { mm: f64 },
    MarkerLost { ticks: u32 },
    MarkerSeen { class: ColourClass },
    FrontBelow { mm: f64 },
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Direction {
    /// Sign of headings in this direction, headings being positive counter-clockwise.
    pub fn sign(self) -> f64 {
        match self {
            Direction::Cw => -1.0,
            Direction::Ccw => 1.0,
        }
    }

    /// Colour of the corner lines met first in this direction.
    pub fn line_class(self) -> ColourClass {
        match self {
            Direction::Cw => ColourClass::Orange,
            Direction::Ccw => ColourClass::Blue,
        }
    }

    pub fn reversed(self) -> Self {
        match self {
            Direction::Cw => Direction::Ccw,
            Direction::Ccw => Direction::Cw,
        }
    }
}

impl PhaseTuning {
    pub const fn new(gains: PidGains, speed: f64, lateral_weight: f64, heading_weight: f64) -> Self {
        Self { gains, speed, lateral_weight, heading_weight }
    }

    /// Tuning with a heading-only error.
    pub const fn heading(gains: PidGains, speed: f64) -> Self {
        Self::new(gains, speed, 0.0, 1.0)
    }
}

impl MissionProfile {
    /// Pillar avoidance with corner lines, terminal half turn and parking on the magenta bay.
    pub fn obstacle() -> Self {
        Self {
            name: "obstacle".into(),
            default_direction: Direction::Cw,
            discovery_timeout_s: 2.0,
            discovery_min_side_diff_mm: 100.0,
            align_steps: vec![
                AlignStep { target_deg: 10.0, tolerance_deg: 6.0, timeout_s: 2.0 },
                AlignStep { target_deg: 4.0, tolerance_deg: 3.0, timeout_s: 1.5 },
                AlignStep { target_deg: 0.0, tolerance_deg: 1.5, timeout_s: 1.0 },
            ],
            follow_mode: FollowMode::Pillars,
            pillar_classes: vec![ColourClass::Red, ColourClass::Green],
            pillar_roi: Roi::new(0, 60, 320, 120),
            line_roi: Roi::new(60, 180, 200, 60),
            pass_offset_px: 70.0,
            follow_enter_ticks: 2,
            lost_ticks: 2,
            pass_ticks: 6,
            pass_duration_s: 0.6,
            pass_heading_offset_deg: 20.0,
            corner_cooldown_s: 1.5,
            corner_target: 13,
            corner_exit_tolerance_deg: 8.0,
            terminal: TerminalManeuver::Reversal,
            reversal: ReversalLimits {
                aggressive: StageLimits { tolerance_deg: 45.0, timeout_s: 4.0 },
                moderate: StageLimits { tolerance_deg: 10.0, timeout_s: 2.0 },
                precise: StageLimits { tolerance_deg: 3.0, timeout_s: 1.5 },
            },
            final_straight_mm: 0.0,
            park_steps: vec![
                ParkStep {
                    name: "seek".into(),
                    tuning: PhaseTuning::heading(PidGains::new(3.0, 0.0, 1.0), 25.0),
                    heading_offset_deg: 0.0,
                    marker: None,
                    marker_offset_px: 0.0,
                    reset_odometry: false,
                    exit: ParkExit::MarkerSeen { class: ColourClass::Magenta },
                    timeout_s: Some(15.0),
                },
                ParkStep {
                    name: "approach".into(),
                    tuning: PhaseTuning::new(PidGains::new(2.0, 0.01, 1.0), 20.0, 0.3, 1.0),
                    heading_offset_deg: 0.0,
                    marker: Some(ColourClass::Magenta),
                    marker_offset_px: 0.0,
                    reset_odometry: true,
                    exit: ParkExit::OdometryBeyond { mm: 450.0 },
                    timeout_s: Some(5.0),
                },
                ParkStep {
                    name: "turn_in".into(),
                    tuning: PhaseTuning::heading(PidGains::new(4.0, 0.0, 1.5), 18.0),
                    heading_offset_deg: 90.0,
                    marker: None,
                    marker_offset_px: 0.0,
                    reset_odometry: false,
                    exit: ParkExit::HeadingWithin { tolerance_deg: 5.0 },
                    timeout_s: Some(4.0),
                },
                ParkStep {
                    name: "creep".into(),
                    tuning: PhaseTuning::heading(PidGains::new(3.0, 0.0, 1.0), 12.0),
                    heading_offset_deg: 90.0,
                    marker: None,
                    marker_offset_px: 0.0,
                    reset_odometry: true,
                    exit: ParkExit::FrontBelow { mm: 150.0 },
                    timeout_s: Some(4.0),
                },
            ],
            park_roi: Roi::new(0, 40, 320, 200),
            emergency_stop_mm: 100.0,
            recovery: ObstacleRecovery {
                hold_s: 0.5,
                reverse_mm: 50.0,
                reverse_timeout_s: 2.0,
                reverse: PhaseTuning::heading(PidGains::new(3.0, 0.0, 1.0), 20.0),
            },
            tuning: TuningTable {
                discovery: PhaseTuning::heading(PidGains::new(2.0, 0.0, 0.0), 15.0),
                align: PhaseTuning::heading(PidGains::new(4.0, 0.0, 1.0), 20.0),
                no_signal: PhaseTuning::heading(PidGains::new(3.0, 0.01, 1.0), 30.0),
                signal_follow: PhaseTuning::new(PidGains::new(2.0, 0.01, 1.5), 25.0, 0.4, 0.6),
                signal_lost: PhaseTuning::heading(PidGains::new(2.5, 0.0, 1.0), 25.0),
                signal_pass: PhaseTuning::heading(PidGains::new(4.0, 0.0, 1.0), 25.0),
                wall_follow: PhaseTuning::heading(PidGains::new(3.0, 0.01, 1.0), 30.0),
                corner_mark: PhaseTuning::heading(PidGains::new(4.0, 0.0, 2.0), 22.0),
                reversal_aggressive: PhaseTuning::heading(PidGains::new(6.0, 0.0, 0.0), 20.0),
                reversal_moderate: PhaseTuning::heading(PidGains::new(4.0, 0.0, 1.0), 18.0),
                reversal_precise: PhaseTuning::heading(PidGains::new(3.0, 0.02, 1.5), 15.0),
                final_straight: PhaseTuning::heading(PidGains::new(3.0, 0.01, 1.0), 30.0),
            },
        }
    }

    /// Wall following lap count: twelve corners then a final straight.
    pub fn open() -> Self {
        Self {
            name: "open".into(),
            default_direction: Direction::Cw,
            discovery_timeout_s: 3.0,
            discovery_min_side_diff_mm: 150.0,
            align_steps: vec![AlignStep { target_deg: 0.0, tolerance_deg: 3.0, timeout_s: 2.0 }],
            follow_mode: FollowMode::Wall,
            pillar_classes: vec![],
            pillar_roi: Roi::new(0, 60, 320, 120),
            line_roi: Roi::new(60, 180, 200, 60),
            pass_offset_px: 0.0,
            follow_enter_ticks: 2,
            lost_ticks: 2,
            pass_ticks: 6,
            pass_duration_s: 0.0,
            pass_heading_offset_deg: 0.0,
            corner_cooldown_s: 2.0,
            corner_target: 12,
            corner_exit_tolerance_deg: 8.0,
            terminal: TerminalManeuver::FinalStraight,
            reversal: ReversalLimits {
                aggressive: StageLimits { tolerance_deg: 45.0, timeout_s: 4.0 },
                moderate: StageLimits { tolerance_deg: 10.0, timeout_s: 2.0 },
                precise: StageLimits { tolerance_deg: 3.0, timeout_s: 1.5 },
            },
            final_straight_mm: 1300.0,
            park_steps: vec![],
            park_roi: Roi::new(0, 40, 320, 200),
            emergency_stop_mm: 100.0,
            recovery: ObstacleRecovery {
                hold_s: 0.5,
                reverse_mm: 50.0,
                reverse_timeout_s: 2.0,
                reverse: PhaseTuning::heading(PidGains::new(3.0, 0.0, 1.0), 20.0),
            },
            tuning: TuningTable {
                discovery: PhaseTuning::heading(PidGains::new(2.0, 0.0, 0.0), 20.0),
                align: PhaseTuning::heading(PidGains::new(4.0, 0.0, 1.0), 25.0),
                no_signal: PhaseTuning::heading(PidGains::new(3.0, 0.01, 1.0), 30.0),
                signal_follow: PhaseTuning::heading(PidGains::new(3.0, 0.01, 1.0), 30.0),
                signal_lost: PhaseTuning::heading(PidGains::new(3.0, 0.01, 1.0), 30.0),
                signal_pass: PhaseTuning::heading(PidGains::new(3.0, 0.01, 1.0), 30.0),
                wall_follow: PhaseTuning::new(PidGains::new(3.0, 0.01, 1.0), 35.0, 0.05, 1.0),
                corner_mark: PhaseTuning::heading(PidGains::new(4.0, 0.0, 2.0), 28.0),
                reversal_aggressive: PhaseTuning::heading(PidGains::new(6.0, 0.0, 0.0), 20.0),
                reversal_moderate: PhaseTuning::heading(PidGains::new(4.0, 0.0, 1.0), 18.0),
                reversal_precise: PhaseTuning::heading(PidGains::new(3.0, 0.02, 1.5), 15.0),
                final_straight: PhaseTuning::heading(PidGains::new(3.0, 0.01, 1.0), 35.0),
            },
        }
    }
}

fn one() -> f64 {
    1.0
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_shipped_profiles_match_builtins() {
        let obstacle: MissionProfile =
            util::params::from_toml_str(include_str!("../../../params/profiles/obstacle.toml"))
                .unwrap();
        assert_eq!(obstacle, MissionProfile::obstacle());

        let open: MissionProfile =
            util::params::from_toml_str(include_str!("../../../params/profiles/open.toml"))
                .unwrap();
        assert_eq!(open, MissionProfile::open());
    }

    #[test]
    fn test_direction_conventions() {
        assert_eq!(Direction::Ccw.sign(), 1.0);
        assert_eq!(Direction::Cw.sign(), -1.0);
        assert_eq!(Direction::Cw.line_class(), ColourClass::Orange);
        assert_eq!(Direction::Ccw.line_class(), ColourClass::Blue);
        assert_eq!(Direction::Cw.reversed(), Direction::Ccw);
    }
}
