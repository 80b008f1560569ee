//! # Direction discovery and coarse alignment phases

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::eqpt::vision::ColourClass;
use log::{info, warn};

use super::{heading_error, Demand, Direction, FollowMode, FollowVariant, MissionInput, MissionMgr, Phase};
use crate::per::Observer;

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl MissionMgr {
    /// Decide the travel direction.
    ///
    /// A corner line in view decides first: orange is met first clockwise, blue counter-clockwise,
    /// and orange wins if both are visible. Otherwise the nearer side wall gives the sense of the
    /// turns to come. The heading is held meanwhile.
    pub(super) fn step_discovery(&mut self, input: &MissionInput, obs: &mut dyn Observer) -> Demand {
        let orange = obs.detect(ColourClass::Orange, &self.profile.line_roi).present;
        let blue = obs.detect(ColourClass::Blue, &self.profile.line_roi).present;

        let from_lines = match (orange, blue) {
            (true, _) => Some(Direction::Cw),
            (false, true) => Some(Direction::Ccw),
            _ => None,
        };

        let from_sides = match (input.left.current(), input.right.current()) {
            (Some(l), Some(r)) if (l - r).abs() >= self.profile.discovery_min_side_diff_mm => {
                if l < r {
                    Some(Direction::Ccw)
                } else {
                    Some(Direction::Cw)
                }
            }
            _ => None,
        };

        let resolved = from_lines.or(from_sides).or_else(|| {
            if self.elapsed_s(input.now_s) >= self.profile.discovery_timeout_s {
                warn!(
                    "Direction discovery timed out, using the default {:?}",
                    self.profile.default_direction
                );
                Some(self.profile.default_direction)
            } else {
                None
            }
        });

        if let Some(d) = resolved {
            info!(
                "Travel direction {:?} (lines: orange {}, blue {}; sides: {:?} / {:?})",
                d, orange, blue, input.left.mm, input.right.mm
            );
            self.direction = Some(d);
            self.enter_align(0, input.now_s);
        }

        Demand::heading(&self.profile.tuning.discovery, 0.0)
    }

    /// Steer to one alignment target.
    pub(super) fn step_align(&mut self, input: &MissionInput, step: usize) -> Demand {
        let align = match self.profile.align_steps.get(step) {
            Some(a) => *a,
            None => {
                self.enter_follow(input.now_s);
                return Demand::heading(&self.profile.tuning.align, 0.0);
            }
        };

        let target_deg = self.travel_direction().sign() * align.target_deg;
        let err = heading_error(&input.pose, target_deg);

        if err.abs() <= align.tolerance_deg {
            self.enter_align(step + 1, input.now_s);
        } else if self.elapsed_s(input.now_s) >= align.timeout_s {
            warn!(
                "Alignment step {} timed out {:.1} deg from its target",
                step, err
            );
            self.enter_align(step + 1, input.now_s);
        }

        Demand::heading(&self.profile.tuning.align, err)
    }

    fn enter_align(&mut self, step: usize, now_s: f64) {
        if step < self.profile.align_steps.len() {
            self.enter(Phase::CoarseAlign { step }, now_s);
        } else {
            self.enter_follow(now_s);
        }
    }

    /// Enter the profile's initial follow variant with clear streaks.
    pub(super) fn enter_follow(&mut self, now_s: f64) {
        self.candidate = None;
        self.present_streak = 0;
        self.absent_streak = 0;
        self.last_colour_side = None;

        let variant = match self.profile.follow_mode {
            FollowMode::Pillars => FollowVariant::NoSignal,
            FollowMode::Wall => FollowVariant::WallFollow,
        };
        self.enter(Phase::CourseFollow(variant), now_s);
    }
}

#[cfg(test)]
mod test {
    use super::super::{test_util::*, *};
    use comms_if::eqpt::vision::ColourClass;

    fn mgr() -> MissionMgr {
        MissionMgr::new(MissionProfile::obstacle())
    }

    #[test]
    fn test_nearer_left_wall_resolves_ccw() {
        let mut m = mgr();
        let mut obs = FakeObserver::default();

        let out = m.step(&input(0.0, 0.0, 200.0, 350.0), &mut obs);

        assert_eq!(m.direction(), Some(Direction::Ccw));
        assert_eq!(m.phase(), Phase::CoarseAlign { step: 0 });
        assert!(out.reset_integral);
    }

    #[test]
    fn test_nearer_right_wall_resolves_cw() {
        let mut m = mgr();
        let mut obs = FakeObserver::default();
        m.step(&input(0.0, 0.0, 420.0, 180.0), &mut obs);
        assert_eq!(m.direction(), Some(Direction::Cw));
    }

    #[test]
    fn test_lines_take_priority() {
        let mut m = mgr();
        let mut obs = FakeObserver::default();
        obs.show(ColourClass::Blue, 0.0);
        m.step(&input(0.0, 0.0, 420.0, 180.0), &mut obs);
        assert_eq!(m.direction(), Some(Direction::Ccw));

        let mut m = mgr();
        obs.show(ColourClass::Orange, 10.0);
        m.step(&input(0.0, 0.0, 200.0, 350.0), &mut obs);
        assert_eq!(m.direction(), Some(Direction::Cw));
    }

    #[test]
    fn test_undecided_until_timeout() {
        let mut m = mgr();
        let mut obs = FakeObserver::default();
        let timeout = m.profile().discovery_timeout_s;

        // Sides too similar, and stale sides never decide
        m.step(&input(0.0, 0.0, 300.0, 320.0), &mut obs);
        let mut stale = input(0.5, 0.0, 100.0, 900.0);
        stale.left = stale.left.into_stale();
        m.step(&stale, &mut obs);
        assert_eq!(m.direction(), None);
        assert_eq!(m.phase(), Phase::DirectionDiscovery);

        m.step(&input(timeout, 0.0, 300.0, 320.0), &mut obs);
        assert_eq!(m.direction(), Some(m.profile().default_direction));
    }

    #[test]
    fn test_align_steps_tighten() {
        let mut m = mgr();
        let mut obs = FakeObserver::default();
        m.step(&input(0.0, 0.0, 200.0, 350.0), &mut obs);

        // Ccw, first target +10 with 6 deg tolerance
        let out = m.step(&input(0.1, 0.0, 200.0, 350.0), &mut obs);
        assert_eq!(out.demand.error, 10.0);
        assert_eq!(m.phase(), Phase::CoarseAlign { step: 0 });

        m.step(&input(0.2, 5.0, 200.0, 350.0), &mut obs);
        assert_eq!(m.phase(), Phase::CoarseAlign { step: 1 });

        // Second target +4 with 3 deg tolerance, 5 is close enough
        m.step(&input(0.3, 5.0, 200.0, 350.0), &mut obs);
        assert_eq!(m.phase(), Phase::CoarseAlign { step: 2 });

        // Last target 0 with 1.5 deg tolerance
        m.step(&input(0.4, 2.0, 200.0, 350.0), &mut obs);
        assert_eq!(m.phase(), Phase::CoarseAlign { step: 2 });
        m.step(&input(0.5, 1.0, 200.0, 350.0), &mut obs);
        assert_eq!(m.phase(), Phase::CourseFollow(FollowVariant::NoSignal));
    }

    #[test]
    fn test_align_timeout_advances() {
        let mut m = mgr();
        let mut obs = FakeObserver::default();
        m.step(&input(0.0, 0.0, 200.0, 350.0), &mut obs);

        m.step(&input(0.1, -50.0, 200.0, 350.0), &mut obs);
        assert_eq!(m.phase(), Phase::CoarseAlign { step: 0 });
        m.step(&input(2.0, -50.0, 200.0, 350.0), &mut obs);
        assert_eq!(m.phase(), Phase::CoarseAlign { step: 1 });
    }
}
