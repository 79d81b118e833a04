//! CTRV (constant turn rate and velocity magnitude) motion model
//!
//! State layout: `[px, py, v, yaw, yaw_rate]`. The augmented state appends
//! the longitudinal acceleration noise `nu_a` and the yaw acceleration noise
//! `nu_yawdd`.

use nalgebra::{RealField, SMatrix};
use num_traits::Float;

use crate::config::ProcessNoise;
use crate::types::angle::AngularMask;
use crate::types::spaces::{AugmentedVector, StateVector};

/// Dimension of the CTRV state.
pub const STATE_DIM: usize = 5;

/// Dimension of the state augmented with the two process-noise variables.
pub const AUGMENTED_DIM: usize = 7;

/// Number of sigma points drawn from the augmented distribution (2·7 + 1).
pub const SIGMA_POINT_COUNT: usize = 2 * AUGMENTED_DIM + 1;

/// Index of the heading (yaw) in the state vector.
pub const HEADING_INDEX: usize = 3;

/// Marks the heading as the only angular state component.
pub const STATE_ANGULAR_MASK: AngularMask<STATE_DIM> = [false, false, false, true, false];

/// Below this turn rate the straight-line limit is used.
pub const YAW_RATE_EPSILON: f64 = 1e-3;

/// Constant turn rate and velocity model in 2D.
///
/// The nonlinear dynamics for a point `[px, py, v, ψ, ψ̇]` over Δt are:
/// - px' = px + (v/ψ̇)[sin(ψ + ψ̇Δt) - sin(ψ)]
/// - py' = py + (v/ψ̇)[cos(ψ) - cos(ψ + ψ̇Δt)]
/// - v' = v, ψ' = ψ + ψ̇Δt, ψ̇' = ψ̇
///
/// and in the limit ψ̇ → 0 the straight-line motion
/// `px' = px + vΔt·cos(ψ)`, `py' = py + vΔt·sin(ψ)`.
///
/// Process noise enters through the augmented components rather than an
/// additive covariance, so the noise gains are themselves propagated by the
/// unscented transform.
#[derive(Debug, Clone)]
pub struct CtrvModel<T: RealField> {
    /// Longitudinal acceleration noise standard deviation
    pub std_a: T,
    /// Yaw acceleration noise standard deviation
    pub std_yawdd: T,
}

impl<T: RealField + Float + Copy> CtrvModel<T> {
    /// Creates a new CTRV model.
    ///
    /// # Panics
    /// Panics if either standard deviation is negative.
    pub fn new(std_a: T, std_yawdd: T) -> Self {
        assert!(std_a >= T::zero(), "Process noise std_a must be non-negative");
        assert!(
            std_yawdd >= T::zero(),
            "Process noise std_yawdd must be non-negative"
        );
        Self { std_a, std_yawdd }
    }

    /// Creates a model from a validated noise configuration.
    pub fn from_noise(noise: &ProcessNoise<T>) -> Self {
        Self::new(noise.std_a, noise.std_yawdd)
    }

    /// Covariance of the `[nu_a, nu_yawdd]` block of the augmented state.
    pub fn noise_covariance(&self) -> SMatrix<T, 2, 2> {
        let zero = T::zero();
        nalgebra::matrix![
            self.std_a * self.std_a, zero;
            zero, self.std_yawdd * self.std_yawdd
        ]
    }

    /// Propagates one augmented sigma point forward by `dt` seconds.
    ///
    /// `dt` may be zero, in which case the state part is returned unchanged.
    pub fn propagate(
        &self,
        point: &AugmentedVector<T, AUGMENTED_DIM>,
        dt: T,
    ) -> StateVector<T, STATE_DIM> {
        debug_assert!(dt >= T::zero(), "Time step dt must be non-negative");

        let px = *point.index(0);
        let py = *point.index(1);
        let v = *point.index(2);
        let yaw = *point.index(3);
        let yaw_rate = *point.index(4);
        let nu_a = *point.index(5);
        let nu_yawdd = *point.index(6);

        let sin_yaw = Float::sin(yaw);
        let cos_yaw = Float::cos(yaw);
        let epsilon: T = nalgebra::convert(YAW_RATE_EPSILON);

        let (mut px_p, mut py_p) = if Float::abs(yaw_rate) > epsilon {
            let yaw_end = yaw + yaw_rate * dt;
            let radius = v / yaw_rate;
            (
                px + radius * (Float::sin(yaw_end) - sin_yaw),
                py + radius * (cos_yaw - Float::cos(yaw_end)),
            )
        } else {
            // Straight-line limit; the closed form divides by the turn rate
            (px + v * dt * cos_yaw, py + v * dt * sin_yaw)
        };

        let mut v_p = v;
        let mut yaw_p = yaw + yaw_rate * dt;
        let mut yaw_rate_p = yaw_rate;

        let half: T = nalgebra::convert(0.5);
        let half_dt_sq = half * dt * dt;

        px_p += half_dt_sq * nu_a * cos_yaw;
        py_p += half_dt_sq * nu_a * sin_yaw;
        v_p += nu_a * dt;
        yaw_p += half_dt_sq * nu_yawdd;
        yaw_rate_p += nu_yawdd * dt;

        StateVector::from_array([px_p, py_p, v_p, yaw_p, yaw_rate_p])
    }
}
