//! Debounced corner counting

use log::{debug, info};
use serde::Serialize;

/// Counts corner lines, accepting at most one per cooldown window.
///
/// A single physical line stays in view for several ticks, every one of which reports it present.
#[derive(Debug, Clone, Serialize)]
pub struct CornerTracker {
    count: u32,

    /// Time of the last accepted line.
    last_event_s: Option<f64>,

    cooldown_s: f64,
}

impl CornerTracker {
    pub fn new(cooldown_s: f64) -> Self {
        Self {
            count: 0,
            last_event_s: None,
            cooldown_s,
        }
    }

    /// Report a line seen at `now_s`. Returns true if it was counted as a new corner.
    pub fn try_mark(&mut self, now_s: f64) -> bool {
        let accept = match self.last_event_s {
            Some(t) => now_s - t > self.cooldown_s,
            None => true,
        };

        if accept {
            self.count += 1;
            self.last_event_s = Some(now_s);
            info!("Corner {} marked at {:.2} s", self.count, now_s);
        } else {
            debug!("Corner line at {:.2} s within cooldown, ignored", now_s);
        }

        accept
    }

    pub fn count(&self) -> u32 {
        self.count
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_once_per_cooldown_window() {
        let mut ct = CornerTracker::new(1.0);

        // A line visible for 0.5 s at 50 Hz
        let mut accepted = 0;
        for i in 0..25 {
            if ct.try_mark(10.0 + i as f64 * 0.02) {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 1);
        assert_eq!(ct.count(), 1);

        // Exactly at the cooldown is still inside the window
        assert!(!ct.try_mark(11.0));
        assert!(ct.try_mark(11.01));
        assert_eq!(ct.count(), 2);
    }

    #[test]
    fn test_count_bounded_by_windows() {
        let mut ct = CornerTracker::new(0.5);

        // Line present every tick for 10 s, at most one count per window
        let mut t = 0.0;
        while t < 10.0 {
            ct.try_mark(t);
            t += 0.02;
        }
        assert!(ct.count() <= (10.0 / 0.5) as u32 + 1);
        assert!(ct.count() >= (10.0 / 0.52) as u32);
    }
}
