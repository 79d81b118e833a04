//! Augmented sigma points and unscented weights
//!
//! The state is augmented with the two process-noise variables and a
//! symmetric set of 2·7 + 1 sigma points is drawn from the augmented
//! distribution:
//! - χ₀ = μ
//! - χᵢ = μ + √(λ + n)·Lᵢ for i = 1...n
//! - χᵢ₊ₙ = μ - √(λ + n)·Lᵢ for i = 1...n
//!
//! where L is the lower Cholesky factor of the augmented covariance and the
//! spread parameter is λ = 3 - n. For n = 7 this λ is negative, which gives
//! the central point a negative weight; the weights still sum to one.

use nalgebra::{RealField, SMatrix, SVector};
use num_traits::Float;
use tracing::warn;

use super::ukf::UkfState;
use crate::models::{CtrvModel, AUGMENTED_DIM, SIGMA_POINT_COUNT, STATE_DIM};
use crate::types::angle::{wrap_components, AngularMask};
use crate::types::spaces::{AugmentedCovariance, AugmentedVector};
use crate::{FusionError, Result};

/// Diagonal jitter tried first when the augmented covariance fails to factor.
const INITIAL_JITTER: f64 = 1e-9;

// ============================================================================
// Weights
// ============================================================================

/// The fixed unscented weights for the augmented CTRV sigma points.
///
/// Computed once from λ = 3 - n_aug and shared by the mean and covariance
/// reconstructions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SigmaWeights<T: RealField> {
    lambda: T,
    scale: T,
    weight_0: T,
    weight_i: T,
}

impl<T: RealField + Float + Copy> Default for SigmaWeights<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: RealField + Float + Copy> SigmaWeights<T> {
    /// Derives the weights for the 7-dimensional augmented state.
    pub fn new() -> Self {
        let n: T = nalgebra::convert(AUGMENTED_DIM as f64);
        let lambda = nalgebra::convert::<f64, T>(3.0) - n;
        let spread = lambda + n;
        let half: T = nalgebra::convert(0.5);

        Self {
            lambda,
            scale: Float::sqrt(spread),
            weight_0: lambda / spread,
            weight_i: half / spread,
        }
    }

    /// The spread parameter λ.
    #[inline]
    pub fn lambda(&self) -> T {
        self.lambda
    }

    /// The sigma-point offset scale √(λ + n).
    #[inline]
    pub fn scale(&self) -> T {
        self.scale
    }

    /// Weight of sigma point `i`.
    #[inline]
    pub fn weight(&self, i: usize) -> T {
        if i == 0 {
            self.weight_0
        } else {
            self.weight_i
        }
    }

    /// All weights as a vector.
    pub fn to_vector(&self) -> SVector<T, SIGMA_POINT_COUNT> {
        SVector::from_fn(|i, _| self.weight(i))
    }

    /// Sum of all weights (one, up to round-off).
    pub fn sum(&self) -> T {
        self.weight_0 + self.weight_i * nalgebra::convert((SIGMA_POINT_COUNT - 1) as f64)
    }

    /// Weighted mean of a sigma-point set, one point per column.
    ///
    /// Angular components are averaged as residuals about the central point,
    /// so a set straddling ±π does not average to a spurious value. This is
    /// deliberately not the literal weighted sum Σ wᵢ·χᵢ, although the two
    /// agree away from the wrap.
    pub fn recover_mean<const D: usize>(
        &self,
        points: &SMatrix<T, D, SIGMA_POINT_COUNT>,
        mask: &AngularMask<D>,
    ) -> SVector<T, D> {
        if !mask.iter().any(|angular| *angular) {
            return points * self.to_vector();
        }

        let anchor: SVector<T, D> = points.column(0).into_owned();
        let mut offset = SVector::<T, D>::zeros();
        for i in 1..SIGMA_POINT_COUNT {
            let residual = wrap_components(points.column(i).into_owned() - anchor, mask);
            offset += residual.scale(self.weight_i);
        }
        anchor + offset
    }

    /// Weighted covariance of a sigma-point set about `mean`.
    ///
    /// Angular components of every residual are wrapped before use.
    pub fn recover_covariance<const D: usize>(
        &self,
        points: &SMatrix<T, D, SIGMA_POINT_COUNT>,
        mean: &SVector<T, D>,
        mask: &AngularMask<D>,
    ) -> SMatrix<T, D, D> {
        let mut cov = SMatrix::<T, D, D>::zeros();
        for i in 0..SIGMA_POINT_COUNT {
            let diff = wrap_components(points.column(i).into_owned() - mean, mask);
            cov += (diff * diff.transpose()).scale(self.weight(i));
        }
        cov
    }

    /// Weighted cross-covariance between two sigma-point sets.
    pub fn cross_covariance<const A: usize, const B: usize>(
        &self,
        a_points: &SMatrix<T, A, SIGMA_POINT_COUNT>,
        a_mean: &SVector<T, A>,
        a_mask: &AngularMask<A>,
        b_points: &SMatrix<T, B, SIGMA_POINT_COUNT>,
        b_mean: &SVector<T, B>,
        b_mask: &AngularMask<B>,
    ) -> SMatrix<T, A, B> {
        let mut cross = SMatrix::<T, A, B>::zeros();
        for i in 0..SIGMA_POINT_COUNT {
            let a_diff = wrap_components(a_points.column(i).into_owned() - a_mean, a_mask);
            let b_diff = wrap_components(b_points.column(i).into_owned() - b_mean, b_mask);
            cross += (a_diff * b_diff.transpose()).scale(self.weight(i));
        }
        cross
    }
}

// ============================================================================
// Sigma Points
// ============================================================================

/// Sigma points of the augmented state, one point per column.
#[derive(Debug, Clone)]
pub struct AugmentedSigmaPoints<T: RealField> {
    /// The 7×15 point matrix
    pub points: SMatrix<T, AUGMENTED_DIM, SIGMA_POINT_COUNT>,
    /// Augmented mean the points were drawn around
    pub mean: AugmentedVector<T, AUGMENTED_DIM>,
    /// Augmented covariance actually factored (including any jitter)
    pub covariance: AugmentedCovariance<T, AUGMENTED_DIM>,
    /// Diagonal jitter added to make the covariance factorable (zero if none)
    pub regularization: T,
}

impl<T: RealField + Float + Copy> AugmentedSigmaPoints<T> {
    /// Generates the augmented sigma points for a state estimate.
    ///
    /// If the augmented covariance has no Cholesky factor, a growing
    /// diagonal jitter is tried up to `max_regularization_attempts` times.
    ///
    /// # Errors
    /// [`FusionError::NotPositiveDefinite`] if no attempt succeeds.
    pub fn generate(
        state: &UkfState<T, STATE_DIM>,
        model: &CtrvModel<T>,
        weights: &SigmaWeights<T>,
        max_regularization_attempts: u32,
    ) -> Result<Self> {
        let (mean, covariance) = augment(state, model);
        let (sqrt_cov, regularization) =
            regularized_cholesky(&covariance, max_regularization_attempts)?;

        let covariance = if regularization > T::zero() {
            AugmentedCovariance::from_matrix(sqrt_cov * sqrt_cov.transpose())
        } else {
            covariance
        };

        let scaled_sqrt = sqrt_cov.scale(weights.scale());
        let center = *mean.as_svector();

        let mut points = SMatrix::<T, AUGMENTED_DIM, SIGMA_POINT_COUNT>::zeros();
        points.set_column(0, &center);
        for i in 0..AUGMENTED_DIM {
            let offset: SVector<T, AUGMENTED_DIM> = scaled_sqrt.column(i).into_owned();
            points.set_column(i + 1, &(center + offset));
            points.set_column(i + 1 + AUGMENTED_DIM, &(center - offset));
        }

        Ok(Self {
            points,
            mean,
            covariance,
            regularization,
        })
    }

    /// Returns sigma point `i` as an augmented vector.
    ///
    /// # Panics
    /// Panics if `i >= SIGMA_POINT_COUNT`.
    #[inline]
    pub fn point(&self, i: usize) -> AugmentedVector<T, AUGMENTED_DIM> {
        AugmentedVector::from_svector(self.points.column(i).into_owned())
    }
}

/// Builds the augmented mean `[x, 0, 0]` and the block-diagonal augmented
/// covariance `diag(P, σ_a², σ_ψ̈²)`.
pub fn augment<T: RealField + Float + Copy>(
    state: &UkfState<T, STATE_DIM>,
    model: &CtrvModel<T>,
) -> (
    AugmentedVector<T, AUGMENTED_DIM>,
    AugmentedCovariance<T, AUGMENTED_DIM>,
) {
    let mut mean = SVector::<T, AUGMENTED_DIM>::zeros();
    let mut cov = SMatrix::<T, AUGMENTED_DIM, AUGMENTED_DIM>::zeros();

    let state_mean = state.mean.as_svector();
    let state_cov = state.covariance.as_matrix();
    for i in 0..STATE_DIM {
        mean[i] = state_mean[i];
        for j in 0..STATE_DIM {
            cov[(i, j)] = state_cov[(i, j)];
        }
    }

    let noise = model.noise_covariance();
    for i in 0..2 {
        for j in 0..2 {
            cov[(STATE_DIM + i, STATE_DIM + j)] = noise[(i, j)];
        }
    }

    (
        AugmentedVector::from_svector(mean),
        AugmentedCovariance::from_matrix(cov),
    )
}

/// Lower Cholesky factor of `cov`, retrying with diagonal jitter.
///
/// Returns the factor and the jitter that was needed.
fn regularized_cholesky<T: RealField + Float + Copy>(
    cov: &AugmentedCovariance<T, AUGMENTED_DIM>,
    max_attempts: u32,
) -> Result<(SMatrix<T, AUGMENTED_DIM, AUGMENTED_DIM>, T)> {
    if let Some(l) = cov.cholesky() {
        return Ok((l, T::zero()));
    }

    let ten: T = nalgebra::convert(10.0);
    let mut jitter: T = nalgebra::convert(INITIAL_JITTER);
    for attempt in 1..=max_attempts {
        if !Float::is_finite(jitter) {
            break;
        }
        let mut regularized = *cov.as_matrix();
        for i in 0..AUGMENTED_DIM {
            regularized[(i, i)] += jitter;
        }
        if let Some(chol) = nalgebra::Cholesky::new(regularized) {
            warn!(
                attempt,
                jitter = ?jitter,
                "augmented covariance not positive definite, regularized"
            );
            return Ok((chol.l(), jitter));
        }
        jitter *= ten;
    }

    warn!(
        attempts = max_attempts,
        "augmented covariance not positive definite"
    );
    Err(FusionError::NotPositiveDefinite)
}
