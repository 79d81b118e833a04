//! ctrv-fusion: Unscented Kalman Filter for Cartesian/Polar Sensor Fusion
//!
//! Fuses two asynchronous sensor streams, a Cartesian position sensor and a
//! polar range/bearing/range-rate sensor, into a single CTRV
//! (constant turn rate and velocity) state estimate.
//!
//! # Features
//!
//! - **Type Safety**: State, measurement, innovation and augmented vectors live in distinct types
//! - **Fixed Size**: Every matrix is a stack-allocated `nalgebra` fixed-size matrix
//! - **Deterministic**: No randomness and no clock; identical inputs give identical outputs
//! - **no_std Support**: Works without the standard library (disable the `std` feature)
//!
//! # Example
//!
//! ```
//! use ctrv_fusion::prelude::*;
//!
//! let mut filter = FusionFilter::<f64>::with_default_config();
//!
//! filter.process(&SensorMeasurement::cartesian(0, 1.0, 0.8)).unwrap();
//! let outcome = filter
//!     .process(&SensorMeasurement::polar(100_000, 1.3, 0.67, 0.1))
//!     .unwrap();
//!
//! assert!(matches!(outcome, ProcessOutcome::Updated(_)));
//! let estimate = filter.state().unwrap();
//! let [x, y] = estimate.position();
//! assert!(x.is_finite() && y.is_finite());
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

pub mod config;
pub mod filters;
pub mod models;
pub mod types;

pub mod prelude {
    pub use crate::config::*;
    pub use crate::filters::fusion::*;
    pub use crate::filters::sigma::*;
    pub use crate::filters::ukf::*;
    pub use crate::models::*;
    pub use crate::types::angle::*;
    pub use crate::types::spaces::*;
    pub use crate::{FusionError, Result};
}

/// Error types for the library
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FusionError {
    /// Augmented covariance has no Cholesky factor, even after regularization
    NotPositiveDefinite,
    /// Innovation covariance is singular and cannot be inverted
    SingularInnovation,
    /// A prediction or update produced a non-finite mean or covariance
    NumericalInstability,
    /// Raw measurement has the wrong number of components for its sensor
    InvalidMeasurementArity {
        /// Number of components the sensor produces
        expected: usize,
        /// Number of components supplied
        found: usize,
    },
    /// Raw measurement contains NaN or infinite values
    NonFiniteMeasurement,
    /// Measurement timestamp is older than the last processed one
    NonMonotonicTimestamp {
        /// Timestamp of the last processed measurement (microseconds)
        previous: i64,
        /// Timestamp of the rejected measurement (microseconds)
        current: i64,
    },
    /// Configuration failed validation
    InvalidConfig(&'static str),
}

#[cfg(feature = "std")]
impl std::error::Error for FusionError {}

impl ::core::fmt::Display for FusionError {
    fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
        match self {
            FusionError::NotPositiveDefinite => {
                write!(f, "Augmented covariance is not positive definite")
            }
            FusionError::SingularInnovation => write!(f, "Innovation covariance is singular"),
            FusionError::NumericalInstability => write!(f, "Numerical instability detected"),
            FusionError::InvalidMeasurementArity { expected, found } => write!(
                f,
                "Measurement has {} components, expected {}",
                found, expected
            ),
            FusionError::NonFiniteMeasurement => write!(f, "Measurement contains non-finite values"),
            FusionError::NonMonotonicTimestamp { previous, current } => write!(
                f,
                "Measurement timestamp {} precedes last timestamp {}",
                current, previous
            ),
            FusionError::InvalidConfig(reason) => write!(f, "Invalid configuration: {}", reason),
        }
    }
}

pub type Result<T> = ::core::result::Result<T, FusionError>;
