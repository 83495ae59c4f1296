//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::{Float, FloatConst};

/// Map a value from one range into another.
pub fn lin_map<T>(source_range: (T, T), target_range: (T, T), value: T) -> T
where
    T: Float,
{
    target_range.0
        + ((value - source_range.0) * (target_range.1 - target_range.0)
            / (source_range.1 - source_range.0))
}

/// Clamp a value into `[min, max]`.
pub fn clamp<T>(value: T, min: T, max: T) -> T
where
    T: Float,
{
    value.max(min).min(max)
}

/// Clamp a value into the symmetric range `[-limit, limit]`.
///
/// A negative limit is treated as its absolute value.
pub fn clamp_sym<T>(value: T, limit: T) -> T
where
    T: Float,
{
    let limit = limit.abs();
    clamp(value, -limit, limit)
}

/// Calculates the least nonnegative remainder of `lhs (mod rhs)`.
///
/// This function is taken from the std library as num is missing it.
///
/// In particular, the return value `r` satisfies `0.0 <= r < rhs.abs()` in
/// most cases. However, due to a floating point round-off error it can
/// result in `r == rhs.abs()` if `lhs` is much smaller than `rhs.abs()` in
/// magnitude and `lhs < 0.0`.
pub fn rem_euclid<T>(lhs: T, rhs: T) -> T
where
    T: Float,
{
    let r = lhs % rhs;
    if r < T::zero() {
        r + rhs.abs()
    } else {
        r
    }
}

/// Normalise an angle into the half-open range [-pi, pi).
pub fn norm_angle<T>(angle: T) -> T
where
    T: Float + FloatConst,
{
    let mut wrapped = rem_euclid(angle + T::PI(), T::TAU());

    // rem_euclid can round up to exactly tau
    if wrapped >= T::TAU() {
        wrapped = wrapped - T::TAU();
    }

    wrapped - T::PI()
}

/// Normalise an angle in degrees into the half-open range [0, 360).
pub fn norm_angle_deg_360<T>(angle_deg: T) -> T
where
    T: Float,
{
    let full = T::from(360.0).unwrap_or_else(T::max_value);
    let wrapped = rem_euclid(angle_deg, full);

    if wrapped >= full {
        wrapped - full
    } else {
        wrapped
    }
}

/// Get the signed angular distance from `a` to `b`, accounting for wrapping.
///
/// The result is in the range [-pi, pi).
pub fn get_ang_dist<T>(a: T, b: T) -> T
where
    T: Float + FloatConst,
{
    norm_angle(b - a)
}

/// Return true if two values are equal within `epsilon`.
pub fn approx_eq<T>(a: T, b: T, epsilon: T) -> bool
where
    T: Float,
{
    (a - b).abs() <= epsilon
}
