//! Sensor (measurement) models
//!
//! Describes how the CTRV state maps into each sensor's measurement space.

use nalgebra::{RealField, SMatrix};
use num_traits::Float;

use super::transition::STATE_DIM;
use crate::config::{CartesianNoise, PolarNoise};
use crate::types::angle::AngularMask;
use crate::types::spaces::{Measurement, MeasurementCovariance, StateVector};
use crate::types::transforms::ObservationMatrix;

/// Trait for sensor models usable by the unscented update.
///
/// A model supplies the (possibly nonlinear) state-to-measurement map, the
/// additive measurement noise, and which measurement components are angles
/// that must be wrapped whenever they are differenced.
pub trait MeasurementModel<T: RealField, const M: usize> {
    /// Maps a CTRV state into measurement space.
    fn observe(&self, state: &StateVector<T, STATE_DIM>) -> Measurement<T, M>;

    /// Returns the measurement noise covariance R.
    fn measurement_noise(&self) -> MeasurementCovariance<T, M>;

    /// Flags the angular measurement components.
    fn angular_components(&self) -> AngularMask<M> {
        [false; M]
    }
}

// ============================================================================
// Cartesian Position Sensor
// ============================================================================

/// Position sensor (lidar-like) measuring `[px, py]` directly.
///
/// The measurement is a fixed linear projection of the state.
#[derive(Debug, Clone)]
pub struct CartesianSensor<T: RealField> {
    /// Measurement noise standard deviation in x
    pub sigma_x: T,
    /// Measurement noise standard deviation in y
    pub sigma_y: T,
}

impl<T: RealField + Float + Copy> CartesianSensor<T> {
    /// Creates a new Cartesian sensor.
    ///
    /// # Panics
    /// Panics if either noise parameter is non-positive.
    pub fn new(sigma_x: T, sigma_y: T) -> Self {
        assert!(sigma_x > T::zero(), "Measurement noise sigma_x must be positive");
        assert!(sigma_y > T::zero(), "Measurement noise sigma_y must be positive");
        Self { sigma_x, sigma_y }
    }

    /// Creates a sensor from a validated noise configuration.
    pub fn from_noise(noise: &CartesianNoise<T>) -> Self {
        Self::new(noise.std_px, noise.std_py)
    }

    /// Returns the observation matrix H selecting the position components.
    pub fn observation_matrix(&self) -> ObservationMatrix<T, 2, STATE_DIM> {
        let one = T::one();
        let zero = T::zero();
        ObservationMatrix::from_matrix(nalgebra::matrix![
            one, zero, zero, zero, zero;
            zero, one, zero, zero, zero
        ])
    }
}

impl<T: RealField + Float + Copy> MeasurementModel<T, 2> for CartesianSensor<T> {
    fn observe(&self, state: &StateVector<T, STATE_DIM>) -> Measurement<T, 2> {
        self.observation_matrix().observe(state)
    }

    fn measurement_noise(&self) -> MeasurementCovariance<T, 2> {
        let zero = T::zero();
        MeasurementCovariance::from_matrix(nalgebra::matrix![
            self.sigma_x * self.sigma_x, zero;
            zero, self.sigma_y * self.sigma_y
        ])
    }
}

// ============================================================================
// Polar Sensor
// ============================================================================

/// Range/bearing/range-rate sensor (radar-like) located at the origin.
///
/// Measurement: `[range, bearing, range_rate]`, with the bearing measured
/// from the x axis and wrapped into (-π, π].
#[derive(Debug, Clone)]
pub struct PolarSensor<T: RealField> {
    /// Range measurement noise standard deviation
    pub sigma_range: T,
    /// Bearing measurement noise standard deviation (radians)
    pub sigma_bearing: T,
    /// Range-rate measurement noise standard deviation
    pub sigma_range_rate: T,
}

impl<T: RealField + Float + Copy> PolarSensor<T> {
    /// Creates a new polar sensor.
    ///
    /// # Panics
    /// Panics if any noise parameter is non-positive.
    pub fn new(sigma_range: T, sigma_bearing: T, sigma_range_rate: T) -> Self {
        assert!(sigma_range > T::zero(), "Range noise sigma_range must be positive");
        assert!(sigma_bearing > T::zero(), "Bearing noise sigma_bearing must be positive");
        assert!(
            sigma_range_rate > T::zero(),
            "Range-rate noise sigma_range_rate must be positive"
        );
        Self {
            sigma_range,
            sigma_bearing,
            sigma_range_rate,
        }
    }

    /// Creates a sensor from a validated noise configuration.
    pub fn from_noise(noise: &PolarNoise<T>) -> Self {
        Self::new(noise.std_range, noise.std_bearing, noise.std_range_rate)
    }

    /// Computes `(range, bearing, range_rate)` for a CTRV state.
    ///
    /// The range rate is the projection of the velocity onto the line of
    /// sight. At the sensor origin the line of sight is undefined and the
    /// range rate is reported as zero.
    pub fn observe_nonlinear(&self, state: &StateVector<T, STATE_DIM>) -> (T, T, T) {
        let px = *state.index(0);
        let py = *state.index(1);
        let v = *state.index(2);
        let yaw = *state.index(3);

        let vx = Float::cos(yaw) * v;
        let vy = Float::sin(yaw) * v;

        let range = Float::hypot(px, py);
        let bearing = Float::atan2(py, px);
        let range_rate = if range > T::zero() {
            (px * vx + py * vy) / range
        } else {
            T::zero()
        };

        (range, bearing, range_rate)
    }

    /// Converts a range/bearing pair to a Cartesian position.
    pub fn to_cartesian(&self, range: T, bearing: T) -> [T; 2] {
        [range * Float::cos(bearing), range * Float::sin(bearing)]
    }

    /// Maps the range/bearing noise into a Cartesian position covariance.
    ///
    /// First-order propagation `J · diag(σ_r², σ_φ²) · Jᵀ` through the
    /// Jacobian of `(r cos φ, r sin φ)`. The cross-range variance shrinks
    /// with the range and vanishes at the origin.
    pub fn position_covariance(&self, range: T, bearing: T) -> SMatrix<T, 2, 2> {
        let zero = T::zero();
        let cos_b = Float::cos(bearing);
        let sin_b = Float::sin(bearing);

        let jacobian: SMatrix<T, 2, 2> = nalgebra::matrix![
            cos_b, -range * sin_b;
            sin_b, range * cos_b
        ];
        let noise: SMatrix<T, 2, 2> = nalgebra::matrix![
            self.sigma_range * self.sigma_range, zero;
            zero, self.sigma_bearing * self.sigma_bearing
        ];

        jacobian * noise * jacobian.transpose()
    }
}

impl<T: RealField + Float + Copy> MeasurementModel<T, 3> for PolarSensor<T> {
    fn observe(&self, state: &StateVector<T, STATE_DIM>) -> Measurement<T, 3> {
        let (range, bearing, range_rate) = self.observe_nonlinear(state);
        Measurement::from_array([range, bearing, range_rate])
    }

    fn measurement_noise(&self) -> MeasurementCovariance<T, 3> {
        let zero = T::zero();
        MeasurementCovariance::from_matrix(nalgebra::matrix![
            self.sigma_range * self.sigma_range, zero, zero;
            zero, self.sigma_bearing * self.sigma_bearing, zero;
            zero, zero, self.sigma_range_rate * self.sigma_range_rate
        ])
    }

    fn angular_components(&self) -> AngularMask<3> {
        [false, true, false]
    }
}
