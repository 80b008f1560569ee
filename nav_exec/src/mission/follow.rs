//! # Course follow and corner phases

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::eqpt::vision::{ColourClass, PassSide};
use log::{debug, info};

use super::{heading_error, Demand, FollowVariant, MissionInput, MissionMgr, Phase};
use crate::per::Observer;

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl MissionMgr {
    pub(super) fn step_follow(
        &mut self,
        input: &MissionInput,
        obs: &mut dyn Observer,
        variant: FollowVariant,
    ) -> Demand {
        match variant {
            FollowVariant::ObstacleHold { side } => return self.step_obstacle_hold(input, side),
            FollowVariant::ObstacleBackoff { side } => {
                return self.step_obstacle_backoff(input, side)
            }
            _ => (),
        }

        if self.check_obstacle(input, obs) {
            return Demand::stop();
        }

        if self.check_corner(input, obs) {
            return self.corner_demand(input);
        }

        let head_err = heading_error(&input.pose, self.target_heading_deg);
        let roi = self.profile.pillar_roi;

        match variant {
            FollowVariant::NoSignal => {
                let seen = self
                    .profile
                    .pillar_classes
                    .iter()
                    .map(|c| obs.detect(*c, &roi))
                    .find(|d| d.present);

                match seen {
                    Some(d) => {
                        if self.candidate == Some(d.class) {
                            self.present_streak += 1;
                        } else {
                            self.candidate = Some(d.class);
                            self.present_streak = 1;
                        }

                        if self.present_streak >= self.profile.follow_enter_ticks {
                            self.last_colour_side = d.class.pass_side();
                            self.absent_streak = 0;
                            self.enter(
                                Phase::CourseFollow(FollowVariant::SignalFollow { class: d.class }),
                                input.now_s,
                            );
                        }
                    }
                    None => {
                        self.candidate = None;
                        self.present_streak = 0;
                    }
                }

                Demand::heading(&self.profile.tuning.no_signal, head_err)
            }

            FollowVariant::SignalFollow { class } => {
                let d = obs.detect(class, &roi);

                if d.present {
                    self.absent_streak = 0;
                    let lat_err = self.pass_lateral_error(class, d.center_error_px);
                    return Demand::blend(&self.profile.tuning.signal_follow, Some(lat_err), head_err);
                }

                self.absent_streak += 1;
                if self.absent_streak >= self.profile.lost_ticks {
                    self.enter(
                        Phase::CourseFollow(FollowVariant::SignalLost { class }),
                        input.now_s,
                    );
                }

                Demand::blend(&self.profile.tuning.signal_follow, None, head_err)
            }

            FollowVariant::SignalLost { class } => {
                let d = obs.detect(class, &roi);

                if d.present {
                    debug!("{:?} pillar reacquired", class);
                    self.absent_streak = 0;
                    self.enter(
                        Phase::CourseFollow(FollowVariant::SignalFollow { class }),
                        input.now_s,
                    );
                    let lat_err = self.pass_lateral_error(class, d.center_error_px);
                    return Demand::blend(&self.profile.tuning.signal_follow, Some(lat_err), head_err);
                }

                self.absent_streak += 1;
                if self.absent_streak >= self.profile.pass_ticks {
                    match class.pass_side() {
                        Some(side) => self.enter(
                            Phase::CourseFollow(FollowVariant::SignalPass { side }),
                            input.now_s,
                        ),
                        None => self.enter_follow(input.now_s),
                    }
                }

                Demand::heading(&self.profile.tuning.signal_lost, head_err)
            }

            FollowVariant::SignalPass { side } => {
                let bias_deg = match side {
                    PassSide::Left => self.profile.pass_heading_offset_deg,
                    PassSide::Right => -self.profile.pass_heading_offset_deg,
                };
                let pass_err = heading_error(&input.pose, self.target_heading_deg + bias_deg);

                if self.elapsed_s(input.now_s) >= self.profile.pass_duration_s {
                    info!("Pillar passed on the {:?}", side);
                    self.enter_follow(input.now_s);
                }

                Demand::heading(&self.profile.tuning.signal_pass, pass_err)
            }

            FollowVariant::WallFollow => {
                // Positive when nearer the right wall, steering back left
                let lat_err = match (input.left.current(), input.right.current()) {
                    (Some(l), Some(r)) => Some((l - r) / 2.0),
                    _ => None,
                };

                Demand::blend(&self.profile.tuning.wall_follow, lat_err, head_err)
            }

            FollowVariant::ObstacleHold { .. } | FollowVariant::ObstacleBackoff { .. } => {
                Demand::stop()
            }
        }
    }

    /// Turn onto the new corner heading, then resume following.
    pub(super) fn step_corner_mark(&mut self, input: &MissionInput, obs: &mut dyn Observer) -> Demand {
        if self.check_corner(input, obs) {
            return self.corner_demand(input);
        }

        let head_err = heading_error(&input.pose, self.target_heading_deg);
        if head_err.abs() <= self.profile.corner_exit_tolerance_deg {
            self.enter_follow(input.now_s);
        }

        Demand::heading(&self.profile.tuning.corner_mark, head_err)
    }

    /// Look for this direction's corner line and count it if the cooldown allows.
    ///
    /// A new corner sets the heading target to `sign * 90 * count`, zeroes the integral, marks a
    /// segment boundary, and either starts the corner turn or the terminal manoeuvre. Returns true
    /// if a corner was counted.
    fn check_corner(&mut self, input: &MissionInput, obs: &mut dyn Observer) -> bool {
        let dir = self.travel_direction();
        let line = obs.detect(dir.line_class(), &self.profile.line_roi);

        if !line.present || !self.corners.try_mark(input.now_s) {
            return false;
        }

        let count = self.corners.count();
        self.target_heading_deg = dir.sign() * 90.0 * count as f64;
        self.pending.reset_integral = true;
        self.pending.reset_odometry = true;

        if count >= self.profile.corner_target {
            info!("Corner target {} reached", self.profile.corner_target);
            self.enter_terminal(input.now_s);
        } else {
            self.enter(Phase::CornerMark, input.now_s);
        }

        true
    }

    fn corner_demand(&self, input: &MissionInput) -> Demand {
        Demand::heading(
            &self.profile.tuning.corner_mark,
            heading_error(&input.pose, self.target_heading_deg),
        )
    }

    /// Lateral error holding a pillar at its pass column.
    ///
    /// A pillar passed on the right is held left of centre and vice versa. Positive errors steer
    /// left.
    fn pass_lateral_error(&self, class: ColourClass, center_error_px: f64) -> f64 {
        let desired_px = match class.pass_side() {
            Some(PassSide::Right) => -self.profile.pass_offset_px,
            Some(PassSide::Left) => self.profile.pass_offset_px,
            None => 0.0,
        };

        desired_px - center_error_px
    }
}

#[cfg(test)]
mod test {
    use super::super::{test_util::*, *};
    use crate::indicator::IndicatorState;
    use comms_if::eqpt::vision::{ColourClass, PassSide};

    /// Manager past discovery and alignment, travelling counter-clockwise
    fn following(profile: MissionProfile) -> (MissionMgr, FakeObserver) {
        let mut profile = profile;
        profile.align_steps.clear();
        let mut m = MissionMgr::new(profile);
        let mut obs = FakeObserver::default();
        m.step(&input(0.0, 0.0, 200.0, 350.0), &mut obs);
        m.step(&input(0.02, 0.0, 200.0, 350.0), &mut obs);
        (m, obs)
    }

    #[test]
    fn test_pillar_streaks() {
        let (mut m, mut obs) = following(MissionProfile::obstacle());
        assert_eq!(m.phase(), Phase::CourseFollow(FollowVariant::NoSignal));

        obs.show(ColourClass::Red, 30.0);
        m.step(&input(0.04, 0.0, 200.0, 350.0), &mut obs);
        assert_eq!(m.phase(), Phase::CourseFollow(FollowVariant::NoSignal));

        let out = m.step(&input(0.06, 0.0, 200.0, 350.0), &mut obs);
        assert_eq!(
            m.phase(),
            Phase::CourseFollow(FollowVariant::SignalFollow { class: ColourClass::Red })
        );
        assert_eq!(out.indicator, IndicatorState::TrackingRight);

        // Red passed on the right: held at -70 px, seen at +30 px, steer right
        let out = m.step(&input(0.08, 0.0, 200.0, 350.0), &mut obs);
        let t = m.profile().tuning.signal_follow;
        assert!((out.demand.error - t.lateral_weight * -100.0).abs() < 1e-9);
        assert_eq!(out.demand.gains, t.gains);

        // Two misses lose it, re-seen brings it back
        obs.hide(ColourClass::Red);
        m.step(&input(0.10, 0.0, 200.0, 350.0), &mut obs);
        m.step(&input(0.12, 0.0, 200.0, 350.0), &mut obs);
        assert_eq!(
            m.phase(),
            Phase::CourseFollow(FollowVariant::SignalLost { class: ColourClass::Red })
        );
        obs.show(ColourClass::Red, -60.0);
        m.step(&input(0.14, 0.0, 200.0, 350.0), &mut obs);
        assert_eq!(
            m.phase(),
            Phase::CourseFollow(FollowVariant::SignalFollow { class: ColourClass::Red })
        );

        // Six misses in a row escalate to the pass
        obs.hide(ColourClass::Red);
        let mut t = 0.16;
        for _ in 0..6 {
            m.step(&input(t, 0.0, 200.0, 350.0), &mut obs);
            t += 0.02;
        }
        assert_eq!(
            m.phase(),
            Phase::CourseFollow(FollowVariant::SignalPass { side: PassSide::Right })
        );

        // Pass biases the heading to the right
        let out = m.step(&input(t, 0.0, 200.0, 350.0), &mut obs);
        assert_eq!(out.demand.error, -m.profile().pass_heading_offset_deg);
        assert_eq!(out.indicator, IndicatorState::TrackingRight);

        m.step(&input(t + 1.0, 0.0, 200.0, 350.0), &mut obs);
        assert_eq!(m.phase(), Phase::CourseFollow(FollowVariant::NoSignal));
    }

    #[test]
    fn test_green_tracked_left() {
        let (mut m, mut obs) = following(MissionProfile::obstacle());
        obs.show(ColourClass::Green, 0.0);
        m.step(&input(0.04, 0.0, 200.0, 350.0), &mut obs);
        let out = m.step(&input(0.06, 0.0, 200.0, 350.0), &mut obs);
        assert_eq!(out.indicator, IndicatorState::TrackingLeft);

        let out = m.step(&input(0.08, 0.0, 200.0, 350.0), &mut obs);
        assert!(out.demand.error > 0.0);
    }

    #[test]
    fn test_corner_marks_and_debounce() {
        let (mut m, mut obs) = following(MissionProfile::obstacle());
        let cooldown = m.profile().corner_cooldown_s;

        // Counter-clockwise meets blue lines
        obs.show(ColourClass::Blue, 0.0);
        let out = m.step(&input(1.0, 0.0, 200.0, 350.0), &mut obs);
        assert_eq!(m.corner_count(), 1);
        assert_eq!(m.phase(), Phase::CornerMark);
        assert_eq!(m.target_heading_deg(), 90.0);
        assert!(out.reset_integral && out.reset_odometry);
        assert_eq!(out.demand.error, 90.0);

        // Still in view while turning, not counted again
        for i in 1..10 {
            m.step(&input(1.0 + i as f64 * 0.02, 45.0, 200.0, 350.0), &mut obs);
        }
        assert_eq!(m.corner_count(), 1);

        obs.hide(ColourClass::Blue);
        m.step(&input(1.3, 85.0, 200.0, 350.0), &mut obs);
        assert_eq!(m.phase(), Phase::CourseFollow(FollowVariant::NoSignal));

        obs.show(ColourClass::Blue, 0.0);
        m.step(&input(1.0 + cooldown + 0.1, 90.0, 200.0, 350.0), &mut obs);
        assert_eq!(m.corner_count(), 2);
        assert_eq!(m.target_heading_deg(), 180.0);
    }

    #[test]
    fn test_orange_ignored_when_ccw() {
        let (mut m, mut obs) = following(MissionProfile::obstacle());
        obs.show(ColourClass::Orange, 0.0);
        m.step(&input(1.0, 0.0, 200.0, 350.0), &mut obs);
        assert_eq!(m.corner_count(), 0);
    }

    #[test]
    fn test_wall_follow_centres() {
        let (mut m, mut obs) = following(MissionProfile::open());
        assert_eq!(m.phase(), Phase::CourseFollow(FollowVariant::WallFollow));

        let t = m.profile().tuning.wall_follow;

        // Nearer the left wall, steer right
        let out = m.step(&input(0.04, 0.0, 200.0, 350.0), &mut obs);
        assert!((out.demand.error - t.lateral_weight * -75.0).abs() < 1e-9);

        // Stale side falls back on heading only
        let mut i = input(0.06, 3.0, 200.0, 350.0);
        i.right = i.right.into_stale();
        let out = m.step(&i, &mut obs);
        assert_eq!(out.demand.error, -3.0);
    }

    #[test]
    fn test_emergency_stop() {
        let (mut m, mut obs) = following(MissionProfile::obstacle());
        let mut i = input(0.04, 0.0, 200.0, 350.0);

        let out = m.step(&i, &mut obs);
        assert!(out.demand.target_speed > 0.0);
        assert!(!out.emergency_stop);

        // A stale close reading does not stop the vehicle
        i.front = crate::per::Ranged::fresh(60.0).into_stale();
        let out = m.step(&i, &mut obs);
        assert!(out.demand.target_speed > 0.0);

        i.front = crate::per::Ranged::fresh(60.0);
        let out = m.step(&i, &mut obs);
        assert_eq!(out.demand.target_speed, 0.0);
        assert!(out.emergency_stop);
    }
}
