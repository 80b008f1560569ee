//! # Status indicator states

use comms_if::eqpt::board::Rgb;
use serde::Serialize;

/// What the status indicator is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IndicatorState {
    /// Waiting for start or not tracking anything
    Idle,

    /// Tracking an obstacle to be passed on the left
    TrackingLeft,

    /// Tracking an obstacle to be passed on the right
    TrackingRight,

    /// The run ended on a fault or a forced timeout
    Fault,
}

impl IndicatorState {
    pub fn colour(self) -> Rgb {
        match self {
            IndicatorState::Idle => Rgb::BLUE,
            IndicatorState::TrackingLeft => Rgb::GREEN,
            IndicatorState::TrackingRight => Rgb::RED,
            IndicatorState::Fault => Rgb { red: true, green: true, blue: false },
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_colours_distinct() {
        let all = [
            IndicatorState::Idle,
            IndicatorState::TrackingLeft,
            IndicatorState::TrackingRight,
            IndicatorState::Fault,
        ];

        for (i, a) in all.iter().enumerate() {
            assert_ne!(a.colour(), Rgb::OFF);
            for b in all.iter().skip(i + 1) {
                assert_ne!(a.colour(), b.colour(), "{:?} and {:?} share a colour", a, b);
            }
        }
    }
}
