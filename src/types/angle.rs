//! Angle normalization
//!
//! Heading and bearing residuals must be wrapped before they enter any
//! covariance sum; a raw difference across ±π reads as a ~2π error.

use nalgebra::{RealField, SVector};
use num_traits::Float;

/// Per-component flags marking which entries of a vector are angles.
pub type AngularMask<const N: usize> = [bool; N];

/// Wraps an angle into the half-open interval (-π, π].
///
/// Values already inside the interval are returned unchanged, so the
/// function is idempotent. Non-finite input is passed through.
pub fn normalize_angle<T: RealField + Float + Copy>(angle: T) -> T {
    let pi = T::pi();
    if angle > -pi && angle <= pi {
        return angle;
    }
    if !Float::is_finite(angle) {
        return angle;
    }

    let two_pi = T::two_pi();
    let mut wrapped = angle - two_pi * Float::ceil((angle - pi) / two_pi);

    // Round-off can leave the result a hair outside the interval
    if wrapped <= -pi {
        wrapped += two_pi;
    } else if wrapped > pi {
        wrapped -= two_pi;
    }
    wrapped
}

/// Wraps every component of `v` flagged in `mask`.
#[inline]
pub fn wrap_components<T: RealField + Float + Copy, const N: usize>(
    mut v: SVector<T, N>,
    mask: &AngularMask<N>,
) -> SVector<T, N> {
    for (i, angular) in mask.iter().enumerate() {
        if *angular {
            v[i] = normalize_angle(v[i]);
        }
    }
    v
}
