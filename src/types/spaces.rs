//! Vector space markers and typed vectors
//!
//! This module provides type-safe vectors that cannot be accidentally mixed
//! across different mathematical spaces (state, augmented state, measurement,
//! innovation).

use ::core::marker::PhantomData;
use ::core::ops::{Add, Sub};
use nalgebra::{RealField, SMatrix, SVector, Scalar};
use num_traits::Float;

use super::angle::{wrap_components, AngularMask};

// ============================================================================
// Vector Space Markers
// ============================================================================

/// Marker type for state space vectors (position, speed, heading, turn rate)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateSpace;

/// Marker type for the state augmented with process-noise variables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AugmentedSpace;

/// Marker type for measurement space vectors (e.g., sensor observations)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeasurementSpace;

/// Marker type for innovation vectors (measurement - predicted measurement)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InnovationSpace;

// ============================================================================
// Typed Vector
// ============================================================================

/// A vector parameterized by scalar type, dimension, and mathematical space.
///
/// The `Space` parameter ensures that vectors from different spaces cannot
/// be accidentally mixed in operations.
///
/// # Type Parameters
///
/// - `T`: The scalar type (typically `f32` or `f64`)
/// - `N`: The dimension of the vector (const generic)
/// - `Space`: A marker type indicating which mathematical space this vector belongs to
#[repr(transparent)]
#[derive(Debug, Clone, PartialEq)]
pub struct Vector<T: Scalar, const N: usize, Space> {
    inner: SVector<T, N>,
    _marker: PhantomData<Space>,
}

impl<T: Scalar, const N: usize, Space> Vector<T, N, Space> {
    /// Creates a new vector from raw components.
    #[inline]
    pub fn from_array(data: [T; N]) -> Self {
        Self {
            inner: SVector::from(data),
            _marker: PhantomData,
        }
    }

    /// Creates a new vector from an nalgebra SVector.
    #[inline]
    pub fn from_svector(inner: SVector<T, N>) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }

    /// Returns a reference to the underlying nalgebra vector.
    #[inline]
    pub fn as_svector(&self) -> &SVector<T, N> {
        &self.inner
    }

    /// Returns a reference to the raw data.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        self.inner.as_slice()
    }

    /// Access element at index (unchecked).
    ///
    /// # Panics
    /// Panics if index is out of bounds.
    #[inline]
    #[allow(clippy::should_implement_trait)]
    pub fn index(&self, index: usize) -> &T {
        &self.inner[index]
    }
}

impl<T: Scalar + Copy, const N: usize, Space: Clone> Copy for Vector<T, N, Space> {}

impl<T: RealField + Float + Copy, const N: usize, Space> Vector<T, N, Space> {
    /// Returns true if no component is NaN or infinite.
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.inner.iter().all(|v| Float::is_finite(*v))
    }
}

// ============================================================================
// Type Aliases
// ============================================================================

/// A state vector in state space.
pub type StateVector<T, const N: usize> = Vector<T, N, StateSpace>;

/// A state vector augmented with process-noise components.
pub type AugmentedVector<T, const N: usize> = Vector<T, N, AugmentedSpace>;

/// A measurement vector in measurement space.
pub type Measurement<T, const M: usize> = Vector<T, M, MeasurementSpace>;

/// An innovation vector (measurement residual) in innovation space.
pub type Innovation<T, const M: usize> = Vector<T, M, InnovationSpace>;

// ============================================================================
// Operations: Same-Space Addition/Subtraction
// ============================================================================

impl<T: RealField + Copy, const N: usize, Space> Add for Vector<T, N, Space> {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self::Output {
        Self {
            inner: self.inner + rhs.inner,
            _marker: PhantomData,
        }
    }
}

impl<T: RealField + Copy, const N: usize, Space> Sub for Vector<T, N, Space> {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            inner: self.inner - rhs.inner,
            _marker: PhantomData,
        }
    }
}

// ============================================================================
// Special Operation: Measurement - Measurement = Innovation
// ============================================================================

/// Trait for computing innovation (residual) from measurements.
///
/// This is a separate trait because subtracting two measurements
/// produces an innovation vector, not another measurement. Angular
/// components named by the mask are wrapped into (-π, π].
pub trait ComputeInnovation<T: RealField, const M: usize> {
    /// Computes the wrapped residual between this measurement and a predicted measurement.
    fn innovation(self, predicted: &Measurement<T, M>, mask: &AngularMask<M>)
        -> Innovation<T, M>;
}

impl<T: RealField + Float + Copy, const M: usize> ComputeInnovation<T, M> for Measurement<T, M> {
    #[inline]
    fn innovation(self, predicted: &Measurement<T, M>, mask: &AngularMask<M>) -> Innovation<T, M> {
        Innovation {
            inner: wrap_components(self.inner - predicted.inner, mask),
            _marker: PhantomData,
        }
    }
}

// ============================================================================
// Covariance Matrix
// ============================================================================

/// A covariance matrix bound to a specific vector space.
///
/// Covariance matrices are symmetric positive semi-definite matrices
/// that describe the uncertainty in a vector estimate.
#[repr(transparent)]
#[derive(Debug, Clone, PartialEq)]
pub struct Covariance<T: Scalar, const N: usize, Space> {
    inner: SMatrix<T, N, N>,
    _marker: PhantomData<Space>,
}

impl<T: Scalar, const N: usize, Space> Covariance<T, N, Space> {
    /// Creates a covariance matrix from a raw matrix.
    ///
    /// # Safety (logical)
    /// The caller should ensure the matrix is symmetric and positive semi-definite.
    #[inline]
    pub fn from_matrix(inner: SMatrix<T, N, N>) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }

    /// Returns a reference to the underlying matrix.
    #[inline]
    pub fn as_matrix(&self) -> &SMatrix<T, N, N> {
        &self.inner
    }

    /// Consumes self and returns the underlying matrix.
    #[inline]
    pub fn into_matrix(self) -> SMatrix<T, N, N> {
        self.inner
    }
}

impl<T: Scalar + Copy, const N: usize, Space: Clone> Copy for Covariance<T, N, Space> where
    SMatrix<T, N, N>: Copy
{
}

impl<T: RealField + Copy, const N: usize, Space> Covariance<T, N, Space> {
    /// Creates a zero covariance matrix.
    #[inline]
    pub fn zeros() -> Self {
        Self {
            inner: SMatrix::zeros(),
            _marker: PhantomData,
        }
    }

    /// Creates an identity covariance matrix.
    #[inline]
    pub fn identity() -> Self {
        Self {
            inner: SMatrix::identity(),
            _marker: PhantomData,
        }
    }

    /// Creates a diagonal covariance matrix.
    #[inline]
    pub fn from_diagonal(diag: &SVector<T, N>) -> Self {
        Self {
            inner: SMatrix::from_diagonal(diag),
            _marker: PhantomData,
        }
    }

    /// Scales the covariance matrix.
    #[inline]
    pub fn scale(&self, s: T) -> Self {
        Self {
            inner: self.inner.scale(s),
            _marker: PhantomData,
        }
    }

    /// Computes the trace of the covariance matrix.
    #[inline]
    pub fn trace(&self) -> T {
        self.inner.trace()
    }

    /// Returns `(P + Pᵀ) / 2`, removing asymmetry left by floating-point round-off.
    #[inline]
    pub fn symmetrize(&self) -> Self {
        let half: T = nalgebra::convert(0.5);
        Self {
            inner: (self.inner + self.inner.transpose()).scale(half),
            _marker: PhantomData,
        }
    }

    /// Attempts to compute the inverse of the covariance matrix.
    #[inline]
    pub fn try_inverse(&self) -> Option<Self> {
        self.inner.try_inverse().map(|inner| Self {
            inner,
            _marker: PhantomData,
        })
    }

    /// Computes the Cholesky decomposition (lower triangular).
    #[inline]
    pub fn cholesky(&self) -> Option<SMatrix<T, N, N>> {
        nalgebra::Cholesky::new(self.inner).map(|c| c.l())
    }
}

impl<T: RealField + Float + Copy, const N: usize, Space> Covariance<T, N, Space> {
    /// Returns true if no entry is NaN or infinite.
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.inner.iter().all(|v| Float::is_finite(*v))
    }
}

impl<T: RealField + Copy, const N: usize, Space> Add for Covariance<T, N, Space> {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self::Output {
        Self {
            inner: self.inner + rhs.inner,
            _marker: PhantomData,
        }
    }
}

// ============================================================================
// Type Aliases for Covariance
// ============================================================================

/// Covariance matrix in state space.
pub type StateCovariance<T, const N: usize> = Covariance<T, N, StateSpace>;

/// Covariance matrix of the augmented state.
pub type AugmentedCovariance<T, const N: usize> = Covariance<T, N, AugmentedSpace>;

/// Covariance matrix in measurement space.
///
/// The innovation covariance S is also expressed in measurement space, in
/// line with the Kalman filter literature.
pub type MeasurementCovariance<T, const M: usize> = Covariance<T, M, MeasurementSpace>;
