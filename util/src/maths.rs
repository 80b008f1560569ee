//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

/// Map a value from one range into another.
pub fn lin_map<T>(source_range: (T, T), target_range: (T, T), value: T) -> T
where
    T: Float
{
    target_range.0
        + ((value - source_range.0)
        * (target_range.1 - target_range.0)
        / (source_range.1 - source_range.0))
}

/// Clamp a value between `min` and `max` inclusive.
pub fn clamp<T>(value: T, min: T, max: T) -> T
where
    T: Float
{
    let mut ret = value;

    if ret > max {
        ret = max
    }
    if ret < min {
        ret = min
    }

    ret
}

/// Move `current` towards `target` by no more than `max_step`.
///
/// The result never passes `target`, and is exactly `target` once it is within one step.
pub fn step_towards<T>(current: T, target: T, max_step: T) -> T
where
    T: Float
{
    let step = max_step.abs();
    let delta = target - current;

    if delta.abs() <= step {
        target
    }
    else {
        current + step * delta.signum()
    }
}

/// Wrap an angle in degrees into the range (-180, 180].
pub fn wrap_deg<T>(angle_deg: T) -> T
where
    T: Float
{
    let full: T = T::from(360.0).unwrap_or_else(T::zero);
    let half: T = T::from(180.0).unwrap_or_else(T::zero);

    let r = rem_euclid(angle_deg, full);

    if r > half {
        r - full
    }
    else {
        r
    }
}

/// Get the shortest signed angular distance `a - b` in degrees.
///
/// The result is in the range (-180, 180], so that two unbounded, accumulated headings can be
/// compared against a tolerance. A positive result means `a` lies counter-clockwise of `b`.
pub fn shortest_signed_diff_deg<T>(a: T, b: T) -> T
where
    T: Float
{
    wrap_deg(a - b)
}

/// Calculates the least nonnegative remainder of `lhs (mod rhs)`.
///
/// This function is taken from the std library as num is missing it.
///
/// In particular, the return value `r` satisfies `0.0 <= r < rhs.abs()` in
/// most cases. However, due to a floating point round-off error it can
/// result in `r == rhs.abs()`, violating the mathematical definition, if
/// `self` is much smaller than `rhs.abs()` in magnitude and `self < 0.0`.
/// This result is not an element of the function's codomain, but it is the
/// closest floating point number in the real numbers and thus fulfills the
/// property `self == self.div_euclid(rhs) * rhs + self.rem_euclid(rhs)`
/// approximatively.
pub fn rem_euclid<T>(lhs: T, rhs: T) -> T
where
    T: Float
{
    let r = lhs % rhs;
    if r < T::zero() { r + rhs.abs() } else { r }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_lin_map() {
        assert_eq!(lin_map((0f64, 240f64), (1000f64, 1500f64), 120f64), 1250f64);
        assert_eq!(lin_map((240f64, 480f64), (1500f64, 2000f64), 480f64), 2000f64);
        // Inverted target ranges are fine
        assert_eq!(lin_map((0f64, 10f64), (10f64, 0f64), 2f64), 8f64);
    }

    #[test]
    fn test_clamp() {
        assert_eq!(clamp(150f64, -100f64, 100f64), 100f64);
        assert_eq!(clamp(-150f64, -100f64, 100f64), -100f64);
        assert_eq!(clamp(12.5f64, -100f64, 100f64), 12.5f64);
    }

    #[test]
    fn test_step_towards() {
        assert_eq!(step_towards(0f64, 30f64, 4f64), 4f64);
        assert_eq!(step_towards(28f64, 30f64, 4f64), 30f64);
        assert_eq!(step_towards(30f64, -30f64, 4f64), 26f64);
        assert_eq!(step_towards(-2f64, 0f64, 4f64), 0f64);

        // Ramp a full sequence and check the step and overshoot bounds
        let mut current = -40f64;
        let target = 35f64;
        let mut n = 0;
        while current != target {
            let next = step_towards(current, target, 3f64);
            assert!((next - current).abs() <= 3f64);
            assert!(next <= target);
            current = next;
            n += 1;
            assert!(n < 100);
        }
    }

    #[test]
    fn test_shortest_signed_diff_deg() {
        assert_eq!(shortest_signed_diff_deg(10f64, 0f64), 10f64);
        assert_eq!(shortest_signed_diff_deg(0f64, 10f64), -10f64);
        assert_eq!(shortest_signed_diff_deg(370f64, 0f64), 10f64);
        assert_eq!(shortest_signed_diff_deg(-90f64, 630f64), 0f64);
        assert_eq!(shortest_signed_diff_deg(180f64, 0f64), 180f64);
        assert_eq!(shortest_signed_diff_deg(0f64, 180f64), 180f64);
        assert_eq!(shortest_signed_diff_deg(-170f64, 170f64), 20f64);
        assert_eq!(shortest_signed_diff_deg(170f64, -170f64), -20f64);
    }

    #[test]
    fn test_shortest_signed_diff_deg_range() {
        let mut a = -1234.5f64;
        while a < 1234.5 {
            let mut b = -987.25f64;
            while b < 987.25 {
                let d = shortest_signed_diff_deg(a, b);
                assert!(d > -180.0 && d <= 180.0, "diff({}, {}) = {}", a, b, d);
                b += 37.75;
            }
            assert_eq!(shortest_signed_diff_deg(a, a), 0f64);
            a += 13.5;
        }
    }
}
