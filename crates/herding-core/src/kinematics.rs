//! Planar vector helpers shared by the steering rules and the integrator.
//!
//! Every function here is total: degenerate input (zero-length vectors,
//! non-finite angles) resolves to a defined value instead of NaN.

use crate::constants::EPSILON;
use glam::DVec2;
use std::f64::consts::{PI, TAU};

/// Displacement covered in `dt` seconds moving at `speed` along `heading`.
#[inline]
pub fn displacement(heading: f64, speed: f64, dt: f64) -> DVec2 {
    unit(heading) * (speed * dt)
}

/// One explicit Euler step of a heading/speed body.
#[inline]
pub fn integrate(position: DVec2, heading: f64, speed: f64, dt: f64) -> DVec2 {
    position + displacement(heading, speed, dt)
}

/// Unit vector pointing along `heading`.
#[inline]
pub fn unit(heading: f64) -> DVec2 {
    let (sin, cos) = heading.sin_cos();
    DVec2::new(cos, sin)
}

/// Heading of `v` in `[0, 2π)`. Zero-length or non-finite vectors map to 0.
pub fn heading_of(v: DVec2) -> f64 {
    if !v.is_finite() || v.length_squared() < EPSILON * EPSILON {
        return 0.0;
    }
    normalize_angle(v.y.atan2(v.x))
}

#[inline]
pub fn distance(a: DVec2, b: DVec2) -> f64 {
    a.distance(b)
}

/// Unit vector from `from` toward `to`; zero when the points coincide.
pub fn direction(from: DVec2, to: DVec2) -> DVec2 {
    let delta = to - from;
    let len = delta.length();
    if len < EPSILON || !len.is_finite() {
        DVec2::ZERO
    } else {
        delta / len
    }
}

/// Wrap an angle into `[0, 2π)`.
pub fn normalize_angle(angle: f64) -> f64 {
    if !angle.is_finite() {
        return 0.0;
    }
    let wrapped = angle.rem_euclid(TAU);
    // rem_euclid can round up to exactly TAU for tiny negative inputs.
    if wrapped >= TAU {
        0.0
    } else {
        wrapped
    }
}

/// Shortest signed rotation taking `from` to `to`, in `(-π, π]`.
pub fn angle_delta(from: f64, to: f64) -> f64 {
    let delta = normalize_angle(to - from);
    if delta > PI {
        delta - TAU
    } else {
        delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const TOL: f64 = 1e-12;

    #[test]
    fn displacement_matches_closed_form() {
        let d = displacement(PI / 3.0, 2.0, 0.5);
        assert!((d.x - 2.0 * (PI / 3.0).cos() * 0.5).abs() < TOL);
        assert!((d.y - 2.0 * (PI / 3.0).sin() * 0.5).abs() < TOL);
    }

    #[test]
    fn heading_of_zero_vector_is_zero() {
        assert_eq!(heading_of(DVec2::ZERO), 0.0);
        assert_eq!(heading_of(DVec2::new(f64::NAN, 1.0)), 0.0);
    }

    #[test]
    fn heading_of_negative_y_wraps_into_range() {
        let h = heading_of(DVec2::new(0.0, -1.0));
        assert!((h - 1.5 * PI).abs() < TOL);
    }

    #[test]
    fn direction_of_coincident_points_is_zero() {
        let p = DVec2::new(3.0, 4.0);
        assert_eq!(direction(p, p), DVec2::ZERO);
    }

    #[test]
    fn direction_is_unit_length() {
        let d = direction(DVec2::new(1.0, 1.0), DVec2::new(4.0, 5.0));
        assert!((d.length() - 1.0).abs() < TOL);
        assert!((distance(DVec2::new(1.0, 1.0), DVec2::new(4.0, 5.0)) - 5.0).abs() < TOL);
    }

    #[test]
    fn angle_delta_takes_short_way_round() {
        let d = angle_delta(0.1, TAU - 0.1);
        assert!((d + 0.2).abs() < 1e-9);
        let d = angle_delta(TAU - 0.1, 0.1);
        assert!((d - 0.2).abs() < 1e-9);
    }

    #[test]
    fn angle_delta_of_opposite_headings_is_positive_pi() {
        assert!((angle_delta(0.0, PI) - PI).abs() < TOL);
    }

    proptest! {
        #[test]
        fn proptest_normalize_angle_stays_in_range(angle in -1.0e6f64..1.0e6f64) {
            let a = normalize_angle(angle);
            prop_assert!((0.0..TAU).contains(&a));
        }

        #[test]
        fn proptest_angle_delta_in_half_open_range(a in -100.0f64..100.0, b in -100.0f64..100.0) {
            let d = angle_delta(a, b);
            prop_assert!(d > -PI - 1e-12 && d <= PI + 1e-12);
            let rotated = normalize_angle(a + d);
            let target = normalize_angle(b);
            prop_assert!(angle_delta(rotated, target).abs() < 1e-6);
        }
    }
}
