//! # Obstacle recovery
//!
//! An obstacle met under the stop distance while following the course brakes the vehicle, which
//! then holds still, backs away a short distance on its heading, and passes the obstacle through
//! the `SignalPass` variant before following again.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::eqpt::vision::PassSide;
use log::{info, warn};

use super::{heading_error, Demand, FollowVariant, MissionInput, MissionMgr, Phase};
use crate::per::Observer;

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl MissionMgr {
    /// Start the recovery if a fresh front range is under the stop distance. Returns true if it
    /// started, the vehicle must then brake at once.
    pub(super) fn check_obstacle(&mut self, input: &MissionInput, obs: &mut dyn Observer) -> bool {
        let front_mm = match input.front.current() {
            Some(f) if f < self.profile.emergency_stop_mm => f,
            _ => return false,
        };

        let side = self.obstacle_side(obs);
        info!(
            "Obstacle {:.0} mm ahead, backing off to pass on the {:?}",
            front_mm, side
        );

        self.last_colour_side = Some(side);
        self.pending.emergency_stop = true;
        self.enter(
            Phase::CourseFollow(FollowVariant::ObstacleHold { side }),
            input.now_s,
        );

        true
    }

    /// Pass side from the pillars in view. Conflicting pillars alternate with the corner count,
    /// nothing in view passes on the right.
    fn obstacle_side(&self, obs: &mut dyn Observer) -> PassSide {
        let roi = self.profile.pillar_roi;
        let mut left = false;
        let mut right = false;

        for class in self.profile.pillar_classes.iter() {
            if !obs.detect(*class, &roi).present {
                continue;
            }
            match class.pass_side() {
                Some(PassSide::Left) => left = true,
                Some(PassSide::Right) => right = true,
                None => (),
            }
        }

        match (left, right) {
            (true, true) if self.corners.count() % 2 == 1 => PassSide::Right,
            (true, true) => PassSide::Left,
            (true, false) => PassSide::Left,
            _ => PassSide::Right,
        }
    }

    pub(super) fn step_obstacle_hold(&mut self, input: &MissionInput, side: PassSide) -> Demand {
        if self.elapsed_s(input.now_s) >= self.profile.recovery.hold_s {
            self.pending.reset_odometry = true;
            self.enter(
                Phase::CourseFollow(FollowVariant::ObstacleBackoff { side }),
                input.now_s,
            );
        }

        Demand::stop()
    }

    pub(super) fn step_obstacle_backoff(&mut self, input: &MissionInput, side: PassSide) -> Demand {
        let rec = self.profile.recovery;

        let done = if input.pose.distance_mm() >= rec.reverse_mm {
            true
        } else if self.elapsed_s(input.now_s) >= rec.reverse_timeout_s {
            warn!(
                "Obstacle back off timed out after {:.0} mm",
                input.pose.distance_mm()
            );
            true
        } else {
            false
        };

        if done {
            self.enter(
                Phase::CourseFollow(FollowVariant::SignalPass { side }),
                input.now_s,
            );
            return Demand::stop();
        }

        // Steering acts the other way round when reversing
        let mut demand = Demand::heading(
            &rec.reverse,
            -heading_error(&input.pose, self.target_heading_deg),
        );
        demand.target_speed = -rec.reverse.speed.abs();
        demand
    }
}

#[cfg(test)]
mod test {
    use super::super::{test_util::*, *};
    use crate::{indicator::IndicatorState, per::Ranged};
    use comms_if::eqpt::vision::{ColourClass, PassSide};
    use nalgebra::Vector2;

    fn following() -> (MissionMgr, FakeObserver) {
        let mut profile = MissionProfile::obstacle();
        profile.align_steps.clear();
        let mut m = MissionMgr::new(profile);
        let mut obs = FakeObserver::default();
        m.step(&input(0.0, 0.0, 200.0, 350.0), &mut obs);
        m.step(&input(0.02, 0.0, 200.0, 350.0), &mut obs);
        (m, obs)
    }

    fn blocked(now_s: f64, heading_deg: f64) -> MissionInput {
        let mut i = input(now_s, heading_deg, 200.0, 350.0);
        i.front = Ranged::fresh(60.0);
        i
    }

    fn side_chosen(m: &MissionMgr) -> Option<PassSide> {
        match m.phase() {
            Phase::CourseFollow(FollowVariant::ObstacleHold { side }) => Some(side),
            _ => None,
        }
    }

    #[test]
    fn test_hold_backoff_and_pass() {
        let (mut m, mut obs) = following();
        assert_eq!(m.phase(), Phase::CourseFollow(FollowVariant::NoSignal));
        let rec = m.profile().recovery;

        obs.show(ColourClass::Red, 0.0);
        let out = m.step(&blocked(1.0, 0.0), &mut obs);
        assert_eq!(
            m.phase(),
            Phase::CourseFollow(FollowVariant::ObstacleHold { side: PassSide::Right })
        );
        assert_eq!(out.demand.target_speed, 0.0);
        assert!(out.emergency_stop && out.reset_integral);
        assert_eq!(out.indicator, IndicatorState::TrackingRight);

        // Held still until the hold time is over
        let out = m.step(&blocked(1.0 + rec.hold_s / 2.0, 0.0), &mut obs);
        assert_eq!(out.demand.target_speed, 0.0);
        assert!(!out.reset_odometry);

        let out = m.step(&blocked(1.0 + rec.hold_s, 0.0), &mut obs);
        assert_eq!(
            m.phase(),
            Phase::CourseFollow(FollowVariant::ObstacleBackoff { side: PassSide::Right })
        );
        assert!(out.reset_odometry);

        // Reversing is not cut by the close front range, steering is inverted
        let out = m.step(&blocked(1.6, 5.0), &mut obs);
        assert_eq!(out.demand.target_speed, -rec.reverse.speed);
        assert_eq!(out.demand.error, 5.0);
        assert!(!out.emergency_stop);

        // Backed far enough, pass on the right then follow again
        let mut i = input(1.7, 0.0, 200.0, 350.0);
        i.pose.position_mm = Vector2::new(-(rec.reverse_mm + 5.0), 0.0);
        m.step(&i, &mut obs);
        assert_eq!(
            m.phase(),
            Phase::CourseFollow(FollowVariant::SignalPass { side: PassSide::Right })
        );

        obs.hide(ColourClass::Red);
        let out = m.step(&input(1.72, 0.0, 200.0, 350.0), &mut obs);
        assert_eq!(out.demand.error, -m.profile().pass_heading_offset_deg);
        assert!(out.demand.target_speed > 0.0);

        m.step(&input(3.0, 0.0, 200.0, 350.0), &mut obs);
        assert_eq!(m.phase(), Phase::CourseFollow(FollowVariant::NoSignal));
    }

    #[test]
    fn test_backoff_timeout() {
        let (mut m, mut obs) = following();
        let rec = m.profile().recovery;

        m.step(&blocked(1.0, 0.0), &mut obs);
        m.step(&blocked(1.0 + rec.hold_s, 0.0), &mut obs);

        // Wheels spinning in place never cover the distance
        let t = 1.0 + rec.hold_s + rec.reverse_timeout_s;
        m.step(&input(t, 0.0, 200.0, 350.0), &mut obs);
        assert_eq!(
            m.phase(),
            Phase::CourseFollow(FollowVariant::SignalPass { side: PassSide::Right })
        );
    }

    #[test]
    fn test_pass_side_choice() {
        // Nothing in view
        let (mut m, mut obs) = following();
        m.step(&blocked(1.0, 0.0), &mut obs);
        assert_eq!(side_chosen(&m), Some(PassSide::Right));

        // Green alone
        let (mut m, mut obs) = following();
        obs.show(ColourClass::Green, 0.0);
        m.step(&blocked(1.0, 0.0), &mut obs);
        assert_eq!(side_chosen(&m), Some(PassSide::Left));

        // Both on an even lap go left
        let (mut m, mut obs) = following();
        obs.show(ColourClass::Red, 0.0);
        obs.show(ColourClass::Green, 0.0);
        m.step(&blocked(1.0, 0.0), &mut obs);
        assert_eq!(side_chosen(&m), Some(PassSide::Left));

        // Both after an odd number of corners go right
        let (mut m, mut obs) = following();
        obs.show(ColourClass::Blue, 0.0);
        m.step(&input(1.0, 0.0, 200.0, 350.0), &mut obs);
        assert_eq!(m.corner_count(), 1);
        obs.hide(ColourClass::Blue);
        m.step(&input(1.3, 90.0, 200.0, 350.0), &mut obs);
        assert_eq!(m.phase(), Phase::CourseFollow(FollowVariant::NoSignal));

        obs.show(ColourClass::Red, 0.0);
        obs.show(ColourClass::Green, 0.0);
        m.step(&blocked(1.4, 90.0), &mut obs);
        assert_eq!(side_chosen(&m), Some(PassSide::Right));
    }

    #[test]
    fn test_stale_front_ignored() {
        let (mut m, mut obs) = following();
        let mut i = blocked(1.0, 0.0);
        i.front = i.front.into_stale();
        m.step(&i, &mut obs);
        assert_eq!(m.phase(), Phase::CourseFollow(FollowVariant::NoSignal));
    }
}
