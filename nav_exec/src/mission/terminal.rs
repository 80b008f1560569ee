//! # Terminal manoeuvre and park phases

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{info, warn};

use super::{
    heading_error, Demand, MissionInput, MissionMgr, ParkExit, Phase, ReversalStage,
    TerminalManeuver,
};
use crate::per::Observer;

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl MissionMgr {
    /// Start the profile's terminal manoeuvre once the corner target is reached.
    pub(super) fn enter_terminal(&mut self, now_s: f64) {
        match self.profile.terminal {
            TerminalManeuver::Reversal => {
                self.reversal_target_deg =
                    self.target_heading_deg + self.travel_direction().sign() * 180.0;
                self.enter(Phase::TerminalReversal(ReversalStage::Aggressive), now_s);
            }
            TerminalManeuver::FinalStraight => {
                self.pending.reset_odometry = true;
                self.enter(Phase::FinalStraight, now_s);
            }
            TerminalManeuver::Park => self.enter_park(0, now_s),
        }
    }

    pub(super) fn step_reversal(&mut self, input: &MissionInput, stage: ReversalStage) -> Demand {
        let (limits, tuning) = match stage {
            ReversalStage::Aggressive => (
                self.profile.reversal.aggressive,
                self.profile.tuning.reversal_aggressive,
            ),
            ReversalStage::Moderate => (
                self.profile.reversal.moderate,
                self.profile.tuning.reversal_moderate,
            ),
            ReversalStage::Precise => (
                self.profile.reversal.precise,
                self.profile.tuning.reversal_precise,
            ),
        };

        let diff = heading_error(&input.pose, self.reversal_target_deg);

        // At the start the target is a half turn away either way, the first stage keeps turning
        // in the direction of travel
        let err = match stage {
            ReversalStage::Aggressive => self.travel_direction().sign() * diff.abs(),
            _ => diff,
        };

        let timed_out = self.elapsed_s(input.now_s) >= limits.timeout_s;
        if timed_out {
            warn!(
                "Reversal stage {:?} timed out {:.1} deg from its target",
                stage, diff
            );
        }

        if diff.abs() <= limits.tolerance_deg || timed_out {
            match stage {
                ReversalStage::Aggressive => self.enter(
                    Phase::TerminalReversal(ReversalStage::Moderate),
                    input.now_s,
                ),
                ReversalStage::Moderate => self.enter(
                    Phase::TerminalReversal(ReversalStage::Precise),
                    input.now_s,
                ),
                ReversalStage::Precise => self.finish_reversal(input.now_s),
            }
        }

        Demand::heading(&tuning, err)
    }

    /// Hold the heading until the odometry passes the final distance.
    pub(super) fn step_final_straight(&mut self, input: &MissionInput) -> Demand {
        let err = heading_error(&input.pose, self.target_heading_deg);

        if input.pose.distance_mm() >= self.profile.final_straight_mm {
            info!(
                "Final straight done after {:.0} mm",
                input.pose.distance_mm()
            );
            self.enter(Phase::Complete, input.now_s);
            return Demand::stop();
        }

        Demand::heading(&self.profile.tuning.final_straight, err)
    }

    pub(super) fn step_park(
        &mut self,
        input: &MissionInput,
        obs: &mut dyn Observer,
        step: usize,
    ) -> Demand {
        let ps = match self.profile.park_steps.get(step) {
            Some(s) => s.clone(),
            None => {
                self.enter(Phase::Complete, input.now_s);
                return Demand::stop();
            }
        };
        let roi = self.profile.park_roi;

        let head_err = heading_error(
            &input.pose,
            self.target_heading_deg + self.travel_direction().sign() * ps.heading_offset_deg,
        );

        let marker = ps.marker.map(|class| obs.detect(class, &roi));
        let lat_err = marker
            .filter(|d| d.present)
            .map(|d| ps.marker_offset_px - d.center_error_px);

        let done = match ps.exit {
            ParkExit::HeadingWithin { tolerance_deg } => head_err.abs() <= tolerance_deg,
            ParkExit::OdometryBeyond { mm } => input.pose.distance_mm() >= mm,
            ParkExit::MarkerLost { ticks } => {
                if lat_err.is_some() {
                    self.absent_streak = 0;
                } else {
                    self.absent_streak += 1;
                }
                self.absent_streak >= ticks
            }
            ParkExit::MarkerSeen { class } => match marker {
                Some(d) if d.class == class => d.present,
                _ => obs.detect(class, &roi).present,
            },
            ParkExit::FrontBelow { mm } => input.front.current().map_or(false, |f| f < mm),
        };

        let timed_out = !done
            && ps
                .timeout_s
                .map_or(false, |t| self.elapsed_s(input.now_s) >= t);
        if timed_out {
            warn!("Park step \"{}\" timed out", ps.name);
        }

        if done || timed_out {
            self.enter_park(step + 1, input.now_s);
        }

        Demand::blend(&ps.tuning, lat_err, head_err)
    }

    /// Heading and direction swap once the half turn is done.
    fn finish_reversal(&mut self, now_s: f64) {
        self.target_heading_deg = self.reversal_target_deg;
        self.direction = Some(self.travel_direction().reversed());
        info!(
            "Reversal done, now travelling {:?}",
            self.travel_direction()
        );

        self.enter_park(0, now_s);
    }

    fn enter_park(&mut self, step: usize, now_s: f64) {
        match self.profile.park_steps.get(step) {
            Some(ps) => {
                if ps.reset_odometry {
                    self.pending.reset_odometry = true;
                }
                self.absent_streak = 0;
                self.enter(Phase::Park { step }, now_s);
            }
            None => self.enter(Phase::Complete, now_s),
        }
    }
}
