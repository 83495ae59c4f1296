//! General time utility functions

use chrono;

/// Number of nanoseconds in a second
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Convert a duration into a number of seconds, or `None` if overflow
pub fn duration_to_seconds(duration: chrono::Duration) -> Option<f64> {
    duration
        .num_nanoseconds()
        .map(|ns| ns as f64 / NANOS_PER_SECOND as f64)
}

/// Convert a number of milliseconds into a whole number of periods of `period_ms`.
///
/// A zero period yields zero cycles rather than dividing by zero.
pub fn millis_to_cycles(millis: u32, period_ms: u32) -> u32 {
    if period_ms == 0 {
        0
    } else {
        millis / period_ms
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_duration_to_seconds() {
        assert_eq!(
            duration_to_seconds(chrono::Duration::milliseconds(1500)),
            Some(1.5)
        );
    }

    #[test]
    fn test_millis_to_cycles() {
        assert_eq!(millis_to_cycles(1000, 20), 50);
        assert_eq!(millis_to_cycles(30, 20), 1);
        assert_eq!(millis_to_cycles(100, 0), 0);
    }
}
