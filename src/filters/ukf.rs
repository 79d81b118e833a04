//! Unscented Kalman Filter (UKF) for the CTRV motion model
//!
//! The UKF propagates a fixed set of sigma points through the nonlinear
//! motion and sensor models and recovers the output statistics, so neither
//! model needs a Jacobian.
//!
//! # Algorithm
//!
//! Prediction:
//! 1. Augment the state with the process-noise variables and draw 15 sigma points
//! 2. Propagate every point through the CTRV model
//! 3. Recover the predicted mean and covariance (heading residuals wrapped)
//!
//! Update (shared by every sensor through [`MeasurementModel`]):
//! 1. Map the predicted sigma points into measurement space
//! 2. Recover the predicted measurement, innovation covariance S and
//!    state/measurement cross-covariance T
//! 3. K = T·S⁻¹, x ← x + K·y, P ← P - K·S·Kᵀ
//!
//! The update reuses the sigma points of the prediction rather than redrawing
//! them from the predicted covariance.
//!
//! # Example
//!
//! ```
//! use ctrv_fusion::filters::ukf::{CtrvUkf, UkfState};
//! use ctrv_fusion::models::{CartesianSensor, CtrvModel};
//! use ctrv_fusion::types::spaces::{Measurement, StateCovariance, StateVector};
//!
//! let ukf = CtrvUkf::new(CtrvModel::new(0.5, 1.0), 6);
//! let sensor = CartesianSensor::new(0.15, 0.15);
//!
//! // [px, py, v, yaw, yaw_rate]
//! let state = UkfState::new(
//!     StateVector::from_array([0.0, 0.0, 2.0, 0.0, 0.0]),
//!     StateCovariance::identity(),
//! );
//!
//! let prediction = ukf.predict(&state, 0.1).unwrap();
//! let correction = ukf
//!     .update(&prediction, &sensor, &Measurement::from_array([0.21, 0.01]))
//!     .unwrap();
//!
//! assert!(correction.nis >= 0.0);
//! ```

use nalgebra::{RealField, SMatrix};
use num_traits::Float;
use tracing::trace;

use super::sigma::{AugmentedSigmaPoints, SigmaWeights};
use crate::models::{
    CtrvModel, MeasurementModel, HEADING_INDEX, SIGMA_POINT_COUNT, STATE_ANGULAR_MASK, STATE_DIM,
};
use crate::types::angle::normalize_angle;
use crate::types::spaces::{
    ComputeInnovation, Innovation, Measurement, MeasurementCovariance, StateCovariance,
    StateVector,
};
use crate::types::transforms::KalmanGain;
use crate::{FusionError, Result};

// ============================================================================
// Filter State
// ============================================================================

/// Gaussian state estimate: mean and covariance.
///
/// # Type Parameters
///
/// - `T`: Scalar type (typically `f32` or `f64`)
/// - `N`: State dimension (compile-time constant)
#[derive(Debug, Clone, PartialEq)]
pub struct UkfState<T: RealField, const N: usize> {
    /// State estimate mean
    pub mean: StateVector<T, N>,
    /// State estimate covariance
    pub covariance: StateCovariance<T, N>,
}

impl<T: RealField + Copy, const N: usize> UkfState<T, N> {
    /// Creates a new state estimate.
    #[inline]
    pub fn new(mean: StateVector<T, N>, covariance: StateCovariance<T, N>) -> Self {
        Self { mean, covariance }
    }

    /// Creates a state with identity covariance.
    #[inline]
    pub fn with_identity_covariance(mean: StateVector<T, N>) -> Self {
        Self {
            mean,
            covariance: StateCovariance::identity(),
        }
    }

    /// Total uncertainty (trace of the covariance).
    #[inline]
    pub fn uncertainty(&self) -> T {
        self.covariance.trace()
    }
}

impl<T: RealField + Float + Copy, const N: usize> UkfState<T, N> {
    /// Returns true if neither the mean nor the covariance holds NaN or infinity.
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.mean.is_finite() && self.covariance.is_finite()
    }
}

impl<T: RealField + Float + Copy> UkfState<T, STATE_DIM> {
    /// Position `[px, py]`.
    #[inline]
    pub fn position(&self) -> [T; 2] {
        [*self.mean.index(0), *self.mean.index(1)]
    }

    /// Speed along the heading.
    #[inline]
    pub fn speed(&self) -> T {
        *self.mean.index(2)
    }

    /// Heading wrapped into (-π, π].
    #[inline]
    pub fn heading(&self) -> T {
        normalize_angle(*self.mean.index(HEADING_INDEX))
    }

    /// Turn rate.
    #[inline]
    pub fn yaw_rate(&self) -> T {
        *self.mean.index(4)
    }

    /// Cartesian velocity `[vx, vy]`.
    #[inline]
    pub fn velocity(&self) -> [T; 2] {
        let v = self.speed();
        let yaw = *self.mean.index(HEADING_INDEX);
        [v * Float::cos(yaw), v * Float::sin(yaw)]
    }
}

// ============================================================================
// Step Results
// ============================================================================

/// Result of a prediction step.
///
/// Carries the propagated sigma points so that the following update can
/// reuse them.
#[derive(Debug, Clone)]
pub struct Prediction<T: RealField> {
    /// Predicted state estimate
    pub state: UkfState<T, STATE_DIM>,
    /// Predicted sigma points, one per column
    pub sigma_points: SMatrix<T, STATE_DIM, SIGMA_POINT_COUNT>,
    /// Time step the prediction covered (seconds)
    pub dt: T,
}

/// Result of an unscented update.
#[derive(Debug, Clone)]
pub struct UnscentedCorrection<T: RealField, const M: usize> {
    /// Posterior state estimate
    pub state: UkfState<T, STATE_DIM>,
    /// Predicted measurement ẑ
    pub predicted_measurement: Measurement<T, M>,
    /// Innovation y = z - ẑ (angular components wrapped)
    pub innovation: Innovation<T, M>,
    /// Innovation covariance S
    pub innovation_covariance: MeasurementCovariance<T, M>,
    /// Normalized innovation squared yᵀ·S⁻¹·y
    pub nis: T,
}

// ============================================================================
// CTRV Unscented Kalman Filter
// ============================================================================

/// Unscented Kalman filter over the CTRV state.
///
/// Holds no estimate; every step takes a state and returns a new one, so a
/// failed step never leaves a partially updated estimate behind.
#[derive(Debug, Clone)]
pub struct CtrvUkf<T: RealField> {
    /// Motion model with its process noise
    pub model: CtrvModel<T>,
    /// Unscented weights
    pub weights: SigmaWeights<T>,
    /// Diagonal-jitter retries for the sigma-point factorization
    pub max_regularization_attempts: u32,
}

impl<T: RealField + Float + Copy> CtrvUkf<T> {
    /// Creates a filter for the given motion model.
    #[inline]
    pub fn new(model: CtrvModel<T>, max_regularization_attempts: u32) -> Self {
        Self {
            model,
            weights: SigmaWeights::new(),
            max_regularization_attempts,
        }
    }

    /// Performs the prediction step over `dt` seconds.
    ///
    /// # Errors
    /// - [`FusionError::NotPositiveDefinite`] if the augmented covariance
    ///   cannot be factored
    /// - [`FusionError::NumericalInstability`] if the prediction is not finite
    pub fn predict(&self, state: &UkfState<T, STATE_DIM>, dt: T) -> Result<Prediction<T>> {
        let augmented = AugmentedSigmaPoints::generate(
            state,
            &self.model,
            &self.weights,
            self.max_regularization_attempts,
        )?;

        let mut sigma_points = SMatrix::<T, STATE_DIM, SIGMA_POINT_COUNT>::zeros();
        for i in 0..SIGMA_POINT_COUNT {
            let propagated = self.model.propagate(&augmented.point(i), dt);
            sigma_points.set_column(i, propagated.as_svector());
        }

        let mean = self
            .weights
            .recover_mean(&sigma_points, &STATE_ANGULAR_MASK);
        let covariance =
            self.weights
                .recover_covariance(&sigma_points, &mean, &STATE_ANGULAR_MASK);

        let predicted = UkfState::new(
            StateVector::from_svector(mean),
            StateCovariance::from_matrix(covariance).symmetrize(),
        );

        if !predicted.is_finite() {
            return Err(FusionError::NumericalInstability);
        }

        trace!(
            dt = ?dt,
            uncertainty = ?predicted.uncertainty(),
            "predicted CTRV state"
        );

        Ok(Prediction {
            state: predicted,
            sigma_points,
            dt,
        })
    }

    /// Performs the update step with one sensor's measurement.
    pub fn update<S, const M: usize>(
        &self,
        prediction: &Prediction<T>,
        sensor: &S,
        measurement: &Measurement<T, M>,
    ) -> Result<UnscentedCorrection<T, M>>
    where
        S: MeasurementModel<T, M>,
    {
        unscented_update(prediction, &self.weights, sensor, measurement)
    }
}

/// Unscented measurement update shared by all sensor models.
///
/// Angular measurement components are wrapped in every residual and the
/// heading is wrapped in every state residual.
///
/// # Errors
/// - [`FusionError::SingularInnovation`] if S cannot be inverted
/// - [`FusionError::NumericalInstability`] if the posterior is not finite
pub fn unscented_update<T, S, const M: usize>(
    prediction: &Prediction<T>,
    weights: &SigmaWeights<T>,
    sensor: &S,
    measurement: &Measurement<T, M>,
) -> Result<UnscentedCorrection<T, M>>
where
    T: RealField + Float + Copy,
    S: MeasurementModel<T, M>,
{
    let mask = sensor.angular_components();

    let mut z_sigma = SMatrix::<T, M, SIGMA_POINT_COUNT>::zeros();
    for i in 0..SIGMA_POINT_COUNT {
        let point = StateVector::from_svector(prediction.sigma_points.column(i).into_owned());
        z_sigma.set_column(i, sensor.observe(&point).as_svector());
    }

    let z_mean = weights.recover_mean(&z_sigma, &mask);
    let innovation_covariance =
        MeasurementCovariance::from_matrix(weights.recover_covariance(&z_sigma, &z_mean, &mask))
            + sensor.measurement_noise();

    let cross = weights.cross_covariance(
        &prediction.sigma_points,
        prediction.state.mean.as_svector(),
        &STATE_ANGULAR_MASK,
        &z_sigma,
        &z_mean,
        &mask,
    );

    // Kalman gain: K = T * S^{-1}
    let s_inv = innovation_covariance
        .try_inverse()
        .ok_or(FusionError::SingularInnovation)?;
    let gain = KalmanGain::from_matrix(cross * s_inv.as_matrix());

    let predicted_measurement = Measurement::from_svector(z_mean);
    let innovation = measurement.innovation(&predicted_measurement, &mask);

    let mean = prediction.state.mean + gain.correct(&innovation);
    let covariance = StateCovariance::from_matrix(
        prediction.state.covariance.as_matrix()
            - gain.covariance_reduction(&innovation_covariance).as_matrix(),
    )
    .symmetrize();

    let nis =
        (innovation.as_svector().transpose() * s_inv.as_matrix() * innovation.as_svector())[(0, 0)];

    let state = UkfState::new(mean, covariance);
    if !state.is_finite() || !Float::is_finite(nis) {
        return Err(FusionError::NumericalInstability);
    }

    trace!(nis = ?nis, "applied unscented update");

    Ok(UnscentedCorrection {
        state,
        predicted_measurement,
        innovation,
        innovation_covariance,
        nis,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CartesianSensor, PolarSensor};
    use core::f64::consts::PI;

    fn test_ukf() -> CtrvUkf<f64> {
        CtrvUkf::new(CtrvModel::new(0.5, 1.0), 6)
    }

    fn test_state() -> UkfState<f64, STATE_DIM> {
        UkfState::new(
            StateVector::from_array([2.0, 1.0, 3.0, 0.5, 0.2]),
            StateCovariance::from_diagonal(&nalgebra::vector![0.1, 0.1, 0.2, 0.05, 0.02]),
        )
    }

    #[test]
    fn test_state_accessors() {
        let state = UkfState::with_identity_covariance(StateVector::from_array([
            1.0,
            2.0,
            2.0,
            3.0 * PI / 2.0,
            0.1,
        ]));

        assert_eq!(state.position(), [1.0, 2.0]);
        assert_eq!(state.speed(), 2.0);
        assert!((state.heading() + PI / 2.0).abs() < 1e-12);
        assert_eq!(state.yaw_rate(), 0.1);

        let [vx, vy] = state.velocity();
        assert!(vx.abs() < 1e-12);
        assert!((vy + 2.0).abs() < 1e-12);
        assert!((state.uncertainty() - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_predict_does_not_shrink_uncertainty() {
        let ukf = test_ukf();
        let state = test_state();

        for &dt in &[0.0, 0.01, 0.1, 0.5, 1.0, 2.0] {
            let prediction = ukf.predict(&state, dt).unwrap();
            assert!(
                prediction.state.uncertainty() >= state.uncertainty() - 1e-9,
                "trace shrank at dt={}: {} < {}",
                dt,
                prediction.state.uncertainty(),
                state.uncertainty()
            );
        }
    }

    #[test]
    fn test_predict_zero_dt_preserves_state() {
        let ukf = test_ukf();
        let state = test_state();

        let prediction = ukf.predict(&state, 0.0).unwrap();

        for i in 0..STATE_DIM {
            assert!((prediction.state.mean.index(i) - state.mean.index(i)).abs() < 1e-9);
            for j in 0..STATE_DIM {
                assert!(
                    (prediction.state.covariance.as_matrix()[(i, j)]
                        - state.covariance.as_matrix()[(i, j)])
                        .abs()
                        < 1e-9,
                    "covariance ({}, {}) changed",
                    i,
                    j
                );
            }
        }
    }

    #[test]
    fn test_predict_moves_along_heading() {
        let ukf = test_ukf();
        let state = UkfState::new(
            StateVector::from_array([0.0, 0.0, 5.0, 0.0, 0.0]),
            StateCovariance::from_diagonal(&nalgebra::vector![0.01, 0.01, 0.01, 0.001, 0.001]),
        );

        let prediction = ukf.predict(&state, 1.0).unwrap();

        assert!((prediction.state.mean.index(0) - 5.0).abs() < 0.05);
        assert!(prediction.state.mean.index(1).abs() < 1e-9);
        assert!((prediction.dt - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_cartesian_update_pulls_towards_measurement() {
        let ukf = test_ukf();
        let sensor = CartesianSensor::new(0.15, 0.15);
        let state = test_state();

        let prediction = ukf.predict(&state, 0.1).unwrap();
        let [px, py] = prediction.state.position();
        let measurement = Measurement::from_array([px + 0.3, py - 0.2]);

        let correction = ukf.update(&prediction, &sensor, &measurement).unwrap();
        let [ux, uy] = correction.state.position();

        assert!(ux > px && ux < px + 0.3);
        assert!(uy < py && uy > py - 0.2);
        assert!(correction.state.uncertainty() < prediction.state.uncertainty());
        assert!(correction.nis > 0.0);
        assert!((correction.innovation.index(0) - 0.3).abs() < 1e-9);

        // Posterior covariance stays symmetric
        let p = correction.state.covariance.as_matrix();
        for i in 0..STATE_DIM {
            for j in 0..STATE_DIM {
                assert_eq!(p[(i, j)], p[(j, i)]);
            }
        }
    }

    #[test]
    fn test_polar_update_straight_ahead() {
        // Scenario: target at (4, 3) moving along +x
        let ukf = test_ukf();
        let sensor = PolarSensor::new(0.3, 0.03, 0.3);
        let state = UkfState::new(
            StateVector::from_array([4.0, 3.0, 1.0, 0.0, 0.0]),
            StateCovariance::from_diagonal(&nalgebra::vector![0.5, 0.5, 0.5, 0.1, 0.1]),
        );

        let prediction = ukf.predict(&state, 0.1).unwrap();
        let measurement = Measurement::from_array([5.2, (3.0_f64).atan2(4.2), 0.8]);

        let correction = ukf.update(&prediction, &sensor, &measurement).unwrap();

        assert!(correction.state.is_finite());
        assert!(correction.state.uncertainty() < prediction.state.uncertainty());
        assert!(correction.nis.is_finite() && correction.nis >= 0.0);
    }

    #[test]
    fn test_polar_update_across_bearing_wrap() {
        // Target just below the negative x axis; predicted bearings straddle ±π
        let ukf = test_ukf();
        let sensor = PolarSensor::new(0.3, 0.03, 0.3);
        let state = UkfState::new(
            StateVector::from_array([-10.0, 0.0, 0.0, 0.0, 0.0]),
            StateCovariance::from_diagonal(&nalgebra::vector![0.1, 0.1, 0.5, 0.5, 0.1]),
        );

        let prediction = ukf.predict(&state, 0.1).unwrap();
        let measurement =
            Measurement::from_array([10.0, (-0.05_f64).atan2(-10.0), 0.0]);
        assert!(*measurement.index(1) < -3.0);

        let correction = ukf.update(&prediction, &sensor, &measurement).unwrap();
        let [x, y] = correction.state.position();

        assert!((x + 10.0).abs() < 0.5, "x: {}", x);
        assert!(y.abs() < 0.3, "y: {}", y);
        assert!(correction.innovation.index(1).abs() < 0.1);
        assert!(correction.state.uncertainty() < prediction.state.uncertainty());
    }

    struct ConstantSensor;

    impl MeasurementModel<f64, 2> for ConstantSensor {
        fn observe(&self, _state: &StateVector<f64, STATE_DIM>) -> Measurement<f64, 2> {
            Measurement::from_array([1.0, 1.0])
        }

        fn measurement_noise(&self) -> MeasurementCovariance<f64, 2> {
            MeasurementCovariance::zeros()
        }
    }

    #[test]
    fn test_singular_innovation_is_reported() {
        let ukf = test_ukf();
        let prediction = ukf.predict(&test_state(), 0.1).unwrap();

        let result = ukf.update(
            &prediction,
            &ConstantSensor,
            &Measurement::from_array([1.0, 1.0]),
        );

        assert_eq!(result.unwrap_err(), FusionError::SingularInnovation);
    }
}
