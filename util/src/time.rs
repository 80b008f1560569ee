//! General time utility functions and the clock abstraction used by control loops.

use chrono;
use std::time::Duration;

/// Number of nanoseconds in a second
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Convert a duration into a number of seconds, or `None` if overflow
pub fn duration_to_seconds(duration: chrono::Duration) -> Option<f64> {
    duration.num_nanoseconds()
        .map(|ns| ns as f64 / NANOS_PER_SECOND as f64)
}

/// Source of monotonic time for control loops.
///
/// Control code never calls `Instant::now` or `thread::sleep` directly, so that a simulated clock
/// can stand in on the host and in tests.
pub trait Clock: Send + Sync {
    /// Seconds elapsed since the clock was created.
    fn now_s(&self) -> f64;

    /// Block the calling thread for the given duration.
    fn sleep(&self, duration: Duration);
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_duration_to_seconds() {
        assert_eq!(duration_to_seconds(chrono::Duration::milliseconds(1500)), Some(1.5));
    }
}
