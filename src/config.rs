//! Filter configuration
//!
//! Everything here is fixed when the filter is constructed. The process
//! noise is the only tuning knob; the measurement noise values come from the
//! sensor manufacturer and are not meant to be changed.

use nalgebra::RealField;
use num_traits::Float;

use crate::{FusionError, Result};

/// Upper bound on `max_regularization_attempts`.
///
/// The jitter grows ×10 per attempt from 1e-9, so the last allowed attempt
/// adds 1e10 to the diagonal; it stays finite for `f32` as well.
pub const MAX_REGULARIZATION_ATTEMPTS: u32 = 20;

/// Process noise of the CTRV model.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProcessNoise<T> {
    /// Longitudinal acceleration noise standard deviation (m/s²)
    pub std_a: T,
    /// Yaw acceleration noise standard deviation (rad/s²)
    pub std_yawdd: T,
}

/// Measurement noise of the Cartesian position sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CartesianNoise<T> {
    /// Position x standard deviation (m)
    pub std_px: T,
    /// Position y standard deviation (m)
    pub std_py: T,
}

/// Measurement noise of the polar range/bearing/range-rate sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PolarNoise<T> {
    /// Range standard deviation (m)
    pub std_range: T,
    /// Bearing standard deviation (rad)
    pub std_bearing: T,
    /// Range-rate standard deviation (m/s)
    pub std_range_rate: T,
}

/// How the covariance is seeded when the first measurement is polar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PolarInitialization {
    /// Identity covariance scaled uniformly by the range variance.
    RangeVarianceScaled,
    /// Identity covariance whose position block is the range/bearing noise
    /// mapped into Cartesian coordinates through the conversion Jacobian.
    #[default]
    Linearized,
}

impl<T: RealField + Copy> Default for ProcessNoise<T> {
    fn default() -> Self {
        Self {
            std_a: nalgebra::convert(0.5),
            std_yawdd: nalgebra::convert(1.0),
        }
    }
}

impl<T: RealField + Copy> Default for CartesianNoise<T> {
    fn default() -> Self {
        Self {
            std_px: nalgebra::convert(0.15),
            std_py: nalgebra::convert(0.15),
        }
    }
}

impl<T: RealField + Copy> Default for PolarNoise<T> {
    fn default() -> Self {
        Self {
            std_range: nalgebra::convert(0.3),
            std_bearing: nalgebra::convert(0.03),
            std_range_rate: nalgebra::convert(0.3),
        }
    }
}

/// Complete configuration of a [`FusionFilter`](crate::filters::fusion::FusionFilter).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FusionConfig<T> {
    /// Process noise (tunable)
    pub process_noise: ProcessNoise<T>,
    /// Cartesian sensor noise (hardware constant)
    pub cartesian_noise: CartesianNoise<T>,
    /// Polar sensor noise (hardware constant)
    pub polar_noise: PolarNoise<T>,
    /// When false, Cartesian measurements are only used for initialization
    pub use_cartesian: bool,
    /// When false, polar measurements are only used for initialization
    pub use_polar: bool,
    /// Covariance seeding for a polar first measurement
    pub polar_initialization: PolarInitialization,
    /// Diagonal-jitter retries before a failed Cholesky factorization is an error
    pub max_regularization_attempts: u32,
}

impl<T: RealField + Copy> Default for FusionConfig<T> {
    fn default() -> Self {
        Self {
            process_noise: ProcessNoise::default(),
            cartesian_noise: CartesianNoise::default(),
            polar_noise: PolarNoise::default(),
            use_cartesian: true,
            use_polar: true,
            polar_initialization: PolarInitialization::default(),
            max_regularization_attempts: 6,
        }
    }
}

impl<T: RealField + Float + Copy> FusionConfig<T> {
    /// Sets the process noise standard deviations.
    pub fn with_process_noise(mut self, std_a: T, std_yawdd: T) -> Self {
        self.process_noise = ProcessNoise { std_a, std_yawdd };
        self
    }

    /// Enables or disables the Cartesian update branch.
    pub fn with_cartesian(mut self, enabled: bool) -> Self {
        self.use_cartesian = enabled;
        self
    }

    /// Enables or disables the polar update branch.
    pub fn with_polar(mut self, enabled: bool) -> Self {
        self.use_polar = enabled;
        self
    }

    /// Selects the covariance seeding for a polar first measurement.
    pub fn with_polar_initialization(mut self, init: PolarInitialization) -> Self {
        self.polar_initialization = init;
        self
    }

    /// Sets how many regularization retries the sigma-point factorization may use.
    pub fn with_max_regularization_attempts(mut self, attempts: u32) -> Self {
        self.max_regularization_attempts = attempts;
        self
    }

    /// Checks that every standard deviation is finite and in range.
    ///
    /// Process noise may be zero; measurement noise must be strictly positive,
    /// otherwise the innovation covariance can become singular.
    pub fn validate(&self) -> Result<()> {
        let zero = T::zero();
        let finite_non_negative = |v: T| Float::is_finite(v) && v >= zero;
        let finite_positive = |v: T| Float::is_finite(v) && v > zero;

        if !finite_non_negative(self.process_noise.std_a)
            || !finite_non_negative(self.process_noise.std_yawdd)
        {
            return Err(FusionError::InvalidConfig(
                "process noise must be finite and non-negative",
            ));
        }
        if !finite_positive(self.cartesian_noise.std_px)
            || !finite_positive(self.cartesian_noise.std_py)
        {
            return Err(FusionError::InvalidConfig(
                "cartesian noise must be finite and positive",
            ));
        }
        if !finite_positive(self.polar_noise.std_range)
            || !finite_positive(self.polar_noise.std_bearing)
            || !finite_positive(self.polar_noise.std_range_rate)
        {
            return Err(FusionError::InvalidConfig(
                "polar noise must be finite and positive",
            ));
        }
        if self.max_regularization_attempts > MAX_REGULARIZATION_ATTEMPTS {
            return Err(FusionError::InvalidConfig(
                "too many regularization attempts",
            ));
        }
        Ok(())
    }
}
