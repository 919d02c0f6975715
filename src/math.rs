//! Scalar helpers shared by the deflection, intensity and station models.

/// Extents or scales at or below this magnitude are treated as degenerate.
pub const DEGENERATE_EPSILON: f64 = 1.0e-6;

/// Smallest radius accepted before dividing by it.
pub const RADIUS_FLOOR: f64 = 1.0e-4;

/// Clamp a value into `[0, 1]`. NaN collapses to zero.
#[must_use]
pub fn clamp01(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Linear interpolation with `t` clamped to `[0, 1]`.
#[must_use]
pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * clamp01(t)
}

/// Position of `value` within `[a, b]`, clamped to `[0, 1]`.
///
/// A degenerate range returns zero instead of dividing by zero.
///
/// # Examples
/// ```
/// use beamtwin::math::inverse_lerp;
///
/// assert_eq!(inverse_lerp(2.0, 4.0, 3.0), 0.5);
/// assert_eq!(inverse_lerp(1.0, 1.0, 7.0), 0.0);
/// ```
#[must_use]
pub fn inverse_lerp(a: f64, b: f64, value: f64) -> f64 {
    let span = b - a;
    if span.abs() <= DEGENERATE_EPSILON {
        return 0.0;
    }
    clamp01((value - a) / span)
}

/// Hermite step between two edges.
#[must_use]
pub fn smoothstep(edge0: f64, edge1: f64, x: f64) -> f64 {
    let t = inverse_lerp(edge0, edge1, x);
    t * t * (3.0 - 2.0 * t)
}

/// Parabolic bending profile: 1 at midspan, 0 at both ends.
///
/// `normalized_pos` is the position along the beam in `[0, 1]`.
///
/// # Examples
/// ```
/// use beamtwin::math::bend_shape;
///
/// assert_eq!(bend_shape(0.5), 1.0);
/// assert_eq!(bend_shape(0.0), 0.0);
/// assert_eq!(bend_shape(1.0), 0.0);
/// ```
#[must_use]
pub fn bend_shape(normalized_pos: f64) -> f64 {
    let centered = (normalized_pos - 0.5) * 2.0;
    (1.0 - centered * centered).max(0.0)
}
