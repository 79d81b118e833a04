//! Typed transformation matrices
//!
//! Matrices that transform vectors between spaces, with type-level
//! encoding of source and target spaces.

use ::core::marker::PhantomData;
use nalgebra::{RealField, SMatrix, Scalar};

use super::spaces::{
    Innovation, InnovationSpace, Measurement, MeasurementCovariance, MeasurementSpace,
    StateCovariance, StateSpace, StateVector,
};

// ============================================================================
// Transform Matrix
// ============================================================================

/// A transformation matrix that maps vectors from one space to another.
///
/// # Type Parameters
///
/// - `T`: Scalar type
/// - `ROWS`: Number of rows (dimension of target space)
/// - `COLS`: Number of columns (dimension of source space)
/// - `To`: Target space marker
/// - `From`: Source space marker
#[repr(transparent)]
#[derive(Debug, Clone, PartialEq)]
pub struct Transform<T: Scalar, const ROWS: usize, const COLS: usize, To, From> {
    inner: SMatrix<T, ROWS, COLS>,
    _marker: PhantomData<(To, From)>,
}

impl<T: Scalar, const ROWS: usize, const COLS: usize, To, From> Transform<T, ROWS, COLS, To, From> {
    /// Creates a transform from a raw matrix.
    #[inline]
    pub fn from_matrix(inner: SMatrix<T, ROWS, COLS>) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }

    /// Returns a reference to the underlying matrix.
    #[inline]
    pub fn as_matrix(&self) -> &SMatrix<T, ROWS, COLS> {
        &self.inner
    }
}

impl<T: Scalar + Copy, const ROWS: usize, const COLS: usize, To: Clone, From: Clone> Copy
    for Transform<T, ROWS, COLS, To, From>
where
    SMatrix<T, ROWS, COLS>: Copy,
{
}

// ============================================================================
// Type Aliases
// ============================================================================

/// Observation matrix: StateSpace -> MeasurementSpace
pub type ObservationMatrix<T, const M: usize, const N: usize> =
    Transform<T, M, N, MeasurementSpace, StateSpace>;

/// Kalman gain: InnovationSpace -> StateSpace
pub type KalmanGain<T, const N: usize, const M: usize> =
    Transform<T, N, M, StateSpace, InnovationSpace>;

// ============================================================================
// Specific Transform Applications
// ============================================================================

impl<T: RealField + Copy, const M: usize, const N: usize> ObservationMatrix<T, M, N> {
    /// Applies the observation model to a state vector.
    #[inline]
    pub fn observe(&self, state: &StateVector<T, N>) -> Measurement<T, M> {
        Measurement::from_svector(self.inner * state.as_svector())
    }
}

impl<T: RealField + Copy, const N: usize, const M: usize> KalmanGain<T, N, M> {
    /// Applies the Kalman gain to an innovation vector.
    #[inline]
    pub fn correct(&self, innovation: &Innovation<T, M>) -> StateVector<T, N> {
        StateVector::from_svector(self.inner * innovation.as_svector())
    }

    /// Covariance removed by the correction: K * S * K^T
    #[inline]
    pub fn covariance_reduction(
        &self,
        innovation_cov: &MeasurementCovariance<T, M>,
    ) -> StateCovariance<T, N> {
        StateCovariance::from_matrix(
            self.inner * innovation_cov.as_matrix() * self.inner.transpose(),
        )
    }
}
