//! Cartesian/polar sensor fusion
//!
//! [`FusionFilter`] owns the single CTRV estimate and drives it from a stream
//! of timestamped measurements. The first accepted measurement initializes
//! the estimate directly; every later one runs a prediction over the elapsed
//! time followed by the update of the sensor that produced it.
//!
//! # Example
//!
//! ```
//! use ctrv_fusion::config::FusionConfig;
//! use ctrv_fusion::filters::fusion::{FusionFilter, ProcessOutcome, SensorKind, SensorMeasurement};
//!
//! let config = FusionConfig::default().with_polar(false);
//! let mut filter = FusionFilter::<f64>::new(config).unwrap();
//!
//! // Timestamps are in microseconds
//! filter.process(&SensorMeasurement::cartesian(0, 1.0, 0.8)).unwrap();
//! let outcome = filter
//!     .process(&SensorMeasurement::polar(50_000, 1.3, 0.67, 0.1))
//!     .unwrap();
//!
//! assert_eq!(outcome, ProcessOutcome::Skipped(SensorKind::Polar));
//! assert_eq!(filter.last_timestamp(), Some(50_000));
//! ```

use nalgebra::RealField;
use num_traits::Float;
use tracing::{debug, warn};

use super::ukf::{CtrvUkf, UkfState};
use crate::config::{FusionConfig, PolarInitialization};
use crate::models::{CartesianSensor, CtrvModel, PolarSensor, STATE_DIM};
use crate::types::spaces::{Measurement, StateCovariance, StateVector};
use crate::{FusionError, Result};

/// Microseconds per second.
const MICROS_PER_SECOND: f64 = 1_000_000.0;

// ============================================================================
// Measurements
// ============================================================================

/// The two supported sensor types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SensorKind {
    /// Position sensor reporting `[x, y]`
    Cartesian,
    /// Radar-like sensor reporting `[range, bearing, range_rate]`
    Polar,
}

impl SensorKind {
    /// Number of raw values one reading of this sensor carries.
    #[inline]
    pub const fn arity(self) -> usize {
        match self {
            SensorKind::Cartesian => 2,
            SensorKind::Polar => 3,
        }
    }
}

/// Raw values of one sensor reading.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SensorReading<T> {
    /// Cartesian position (m)
    Cartesian { x: T, y: T },
    /// Range (m), bearing (rad) and range rate (m/s)
    Polar { range: T, bearing: T, range_rate: T },
}

impl<T: RealField + Float + Copy> SensorReading<T> {
    /// Builds a reading from a sensor tag and its raw values.
    ///
    /// # Errors
    /// - [`FusionError::InvalidMeasurementArity`] if `values` has the wrong length
    /// - [`FusionError::NonFiniteMeasurement`] if any value is NaN or infinite
    pub fn from_raw(kind: SensorKind, values: &[T]) -> Result<Self> {
        if values.len() != kind.arity() {
            return Err(FusionError::InvalidMeasurementArity {
                expected: kind.arity(),
                found: values.len(),
            });
        }

        let reading = match kind {
            SensorKind::Cartesian => SensorReading::Cartesian {
                x: values[0],
                y: values[1],
            },
            SensorKind::Polar => SensorReading::Polar {
                range: values[0],
                bearing: values[1],
                range_rate: values[2],
            },
        };

        if !reading.is_finite() {
            return Err(FusionError::NonFiniteMeasurement);
        }
        Ok(reading)
    }

    /// The sensor that produced this reading.
    #[inline]
    pub fn kind(&self) -> SensorKind {
        match self {
            SensorReading::Cartesian { .. } => SensorKind::Cartesian,
            SensorReading::Polar { .. } => SensorKind::Polar,
        }
    }

    /// Returns true if every value is finite.
    pub fn is_finite(&self) -> bool {
        match *self {
            SensorReading::Cartesian { x, y } => Float::is_finite(x) && Float::is_finite(y),
            SensorReading::Polar {
                range,
                bearing,
                range_rate,
            } => {
                Float::is_finite(range) && Float::is_finite(bearing) && Float::is_finite(range_rate)
            }
        }
    }
}

/// A timestamped sensor reading.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SensorMeasurement<T> {
    /// Acquisition time in microseconds
    pub timestamp_us: i64,
    /// Raw sensor values
    pub reading: SensorReading<T>,
}

impl<T: RealField + Float + Copy> SensorMeasurement<T> {
    /// Creates a measurement.
    #[inline]
    pub fn new(timestamp_us: i64, reading: SensorReading<T>) -> Self {
        Self {
            timestamp_us,
            reading,
        }
    }

    /// Creates a Cartesian position measurement.
    #[inline]
    pub fn cartesian(timestamp_us: i64, x: T, y: T) -> Self {
        Self::new(timestamp_us, SensorReading::Cartesian { x, y })
    }

    /// Creates a polar measurement.
    #[inline]
    pub fn polar(timestamp_us: i64, range: T, bearing: T, range_rate: T) -> Self {
        Self::new(
            timestamp_us,
            SensorReading::Polar {
                range,
                bearing,
                range_rate,
            },
        )
    }

    /// Creates a measurement from a sensor tag and raw values.
    ///
    /// See [`SensorReading::from_raw`].
    pub fn from_raw(timestamp_us: i64, kind: SensorKind, values: &[T]) -> Result<Self> {
        SensorReading::from_raw(kind, values).map(|reading| Self::new(timestamp_us, reading))
    }

    /// The sensor that produced this measurement.
    #[inline]
    pub fn kind(&self) -> SensorKind {
        self.reading.kind()
    }
}

// ============================================================================
// Filter Phase and Outcomes
// ============================================================================

/// The committed estimate together with the time it refers to.
#[derive(Debug, Clone, PartialEq)]
pub struct Track<T: RealField> {
    /// Mean and covariance of the CTRV state
    pub estimate: UkfState<T, STATE_DIM>,
    /// Timestamp of the last processed measurement (microseconds)
    pub timestamp_us: i64,
}

/// Lifecycle of the filter.
///
/// The only transition is `Uninitialized -> Tracking`, taken on the first
/// accepted measurement.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterPhase<T: RealField> {
    /// No measurement processed yet
    Uninitialized,
    /// An estimate exists
    Tracking(Track<T>),
}

/// Summary of one predict/update cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpdateReport<T> {
    /// Sensor whose update was applied
    pub sensor: SensorKind,
    /// Prediction interval (seconds)
    pub dt: T,
    /// Normalized innovation squared of the update
    pub nis: T,
    /// Trace of the posterior covariance
    pub uncertainty: T,
}

/// What [`FusionFilter::process`] did with a measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProcessOutcome<T> {
    /// The measurement initialized the estimate
    Initialized(SensorKind),
    /// The sensor is disabled; only the timestamp advanced
    Skipped(SensorKind),
    /// Prediction and update were applied
    Updated(UpdateReport<T>),
}

// ============================================================================
// Fusion Filter
// ============================================================================

/// Single-object CTRV tracker fusing a Cartesian and a polar sensor.
///
/// The filter commits a new estimate only after prediction and update have
/// both succeeded; on any error it is left exactly as it was.
#[derive(Debug, Clone)]
pub struct FusionFilter<T: RealField> {
    config: FusionConfig<T>,
    ukf: CtrvUkf<T>,
    cartesian: CartesianSensor<T>,
    polar: PolarSensor<T>,
    phase: FilterPhase<T>,
}

impl<T: RealField + Float + Copy> Default for FusionFilter<T> {
    fn default() -> Self {
        Self::with_default_config()
    }
}

impl<T: RealField + Float + Copy> FusionFilter<T> {
    /// Creates a filter from a configuration.
    ///
    /// # Errors
    /// [`FusionError::InvalidConfig`] if the configuration fails validation.
    pub fn new(config: FusionConfig<T>) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_validated(config))
    }

    /// Creates a filter with the default noise parameters and both sensors enabled.
    pub fn with_default_config() -> Self {
        Self::from_validated(FusionConfig::default())
    }

    fn from_validated(config: FusionConfig<T>) -> Self {
        Self {
            ukf: CtrvUkf::new(
                CtrvModel::from_noise(&config.process_noise),
                config.max_regularization_attempts,
            ),
            cartesian: CartesianSensor::from_noise(&config.cartesian_noise),
            polar: PolarSensor::from_noise(&config.polar_noise),
            phase: FilterPhase::Uninitialized,
            config,
        }
    }

    /// The configuration the filter was built with.
    #[inline]
    pub fn config(&self) -> &FusionConfig<T> {
        &self.config
    }

    /// The current lifecycle phase.
    #[inline]
    pub fn phase(&self) -> &FilterPhase<T> {
        &self.phase
    }

    /// Returns true once the first measurement has been accepted.
    #[inline]
    pub fn is_initialized(&self) -> bool {
        matches!(self.phase, FilterPhase::Tracking(_))
    }

    /// The committed track, if any.
    #[inline]
    pub fn track(&self) -> Option<&Track<T>> {
        match &self.phase {
            FilterPhase::Uninitialized => None,
            FilterPhase::Tracking(track) => Some(track),
        }
    }

    /// The current estimate, if any.
    #[inline]
    pub fn state(&self) -> Option<&UkfState<T, STATE_DIM>> {
        self.track().map(|track| &track.estimate)
    }

    /// The current state mean `[px, py, v, yaw, yaw_rate]`, if any.
    #[inline]
    pub fn mean(&self) -> Option<&StateVector<T, STATE_DIM>> {
        self.state().map(|state| &state.mean)
    }

    /// The current state covariance, if any.
    #[inline]
    pub fn covariance(&self) -> Option<&StateCovariance<T, STATE_DIM>> {
        self.state().map(|state| &state.covariance)
    }

    /// Timestamp of the last processed measurement (microseconds), if any.
    #[inline]
    pub fn last_timestamp(&self) -> Option<i64> {
        self.track().map(|track| track.timestamp_us)
    }

    /// Returns true if updates from `kind` are applied.
    #[inline]
    pub fn is_enabled(&self, kind: SensorKind) -> bool {
        match kind {
            SensorKind::Cartesian => self.config.use_cartesian,
            SensorKind::Polar => self.config.use_polar,
        }
    }

    /// Processes one measurement.
    ///
    /// # Errors
    /// - [`FusionError::NonFiniteMeasurement`] for NaN or infinite values
    /// - [`FusionError::NonMonotonicTimestamp`] if the measurement is older
    ///   than the last processed one
    /// - any error of the prediction or update step
    ///
    /// The filter is unchanged whenever an error is returned.
    pub fn process(&mut self, measurement: &SensorMeasurement<T>) -> Result<ProcessOutcome<T>> {
        if !measurement.reading.is_finite() {
            warn!(
                timestamp_us = measurement.timestamp_us,
                sensor = ?measurement.kind(),
                "rejected non-finite measurement"
            );
            return Err(FusionError::NonFiniteMeasurement);
        }

        let track = match &self.phase {
            FilterPhase::Uninitialized => return Ok(self.initialize(measurement)),
            FilterPhase::Tracking(track) => track,
        };

        if measurement.timestamp_us < track.timestamp_us {
            warn!(
                previous = track.timestamp_us,
                current = measurement.timestamp_us,
                "rejected out-of-order measurement"
            );
            return Err(FusionError::NonMonotonicTimestamp {
                previous: track.timestamp_us,
                current: measurement.timestamp_us,
            });
        }

        let kind = measurement.kind();
        if !self.is_enabled(kind) {
            debug!(
                sensor = ?kind,
                timestamp_us = measurement.timestamp_us,
                "sensor disabled, skipping update"
            );
            if let FilterPhase::Tracking(track) = &mut self.phase {
                track.timestamp_us = measurement.timestamp_us;
            }
            return Ok(ProcessOutcome::Skipped(kind));
        }

        match self.advance(track, measurement) {
            Ok((estimate, report)) => {
                debug!(
                    sensor = ?report.sensor,
                    dt = ?report.dt,
                    nis = ?report.nis,
                    "updated track"
                );
                self.phase = FilterPhase::Tracking(Track {
                    estimate,
                    timestamp_us: measurement.timestamp_us,
                });
                Ok(ProcessOutcome::Updated(report))
            }
            Err(err) => {
                warn!(
                    error = %err,
                    sensor = ?kind,
                    timestamp_us = measurement.timestamp_us,
                    "measurement update failed, track unchanged"
                );
                Err(err)
            }
        }
    }

    /// Runs predict and update on a copy of the track.
    fn advance(
        &self,
        track: &Track<T>,
        measurement: &SensorMeasurement<T>,
    ) -> Result<(UkfState<T, STATE_DIM>, UpdateReport<T>)> {
        let dt = elapsed_seconds::<T>(track.timestamp_us, measurement.timestamp_us);
        let prediction = self.ukf.predict(&track.estimate, dt)?;

        let (estimate, nis) = match measurement.reading {
            SensorReading::Cartesian { x, y } => {
                let correction = self.ukf.update(
                    &prediction,
                    &self.cartesian,
                    &Measurement::from_array([x, y]),
                )?;
                (correction.state, correction.nis)
            }
            SensorReading::Polar {
                range,
                bearing,
                range_rate,
            } => {
                let correction = self.ukf.update(
                    &prediction,
                    &self.polar,
                    &Measurement::from_array([range, bearing, range_rate]),
                )?;
                (correction.state, correction.nis)
            }
        };

        let report = UpdateReport {
            sensor: measurement.kind(),
            dt: prediction.dt,
            nis,
            uncertainty: estimate.uncertainty(),
        };
        Ok((estimate, report))
    }

    fn initialize(&mut self, measurement: &SensorMeasurement<T>) -> ProcessOutcome<T> {
        let kind = measurement.kind();
        let estimate = self.initial_estimate(&measurement.reading);

        debug!(
            sensor = ?kind,
            timestamp_us = measurement.timestamp_us,
            "initialized track"
        );

        self.phase = FilterPhase::Tracking(Track {
            estimate,
            timestamp_us: measurement.timestamp_us,
        });
        ProcessOutcome::Initialized(kind)
    }

    /// Builds the initial estimate from a first reading.
    ///
    /// Speed, heading and turn rate start at zero with unit variance. The
    /// position variance comes from the sensor that produced the reading.
    pub fn initial_estimate(&self, reading: &SensorReading<T>) -> UkfState<T, STATE_DIM> {
        let zero = T::zero();
        let mut covariance = StateCovariance::<T, STATE_DIM>::identity().into_matrix();

        let mean = match *reading {
            SensorReading::Cartesian { x, y } => {
                covariance[(0, 0)] = self.cartesian.sigma_x * self.cartesian.sigma_x;
                covariance[(1, 1)] = self.cartesian.sigma_y * self.cartesian.sigma_y;
                StateVector::from_array([x, y, zero, zero, zero])
            }
            SensorReading::Polar { range, bearing, .. } => {
                let [x, y] = self.polar.to_cartesian(range, bearing);
                match self.config.polar_initialization {
                    PolarInitialization::RangeVarianceScaled => {
                        let range_var = self.polar.sigma_range * self.polar.sigma_range;
                        covariance = covariance.scale(range_var);
                    }
                    PolarInitialization::Linearized => {
                        let position = self.polar.position_covariance(range, bearing);
                        for i in 0..2 {
                            for j in 0..2 {
                                covariance[(i, j)] = position[(i, j)];
                            }
                        }
                    }
                }
                StateVector::from_array([x, y, zero, zero, zero])
            }
        };

        UkfState::new(mean, StateCovariance::from_matrix(covariance))
    }
}

/// Elapsed time between two microsecond timestamps, in seconds.
///
/// The difference is taken in `i128`, so any pair of `i64` timestamps is valid.
#[inline]
fn elapsed_seconds<T: RealField + Copy>(previous_us: i64, current_us: i64) -> T {
    let elapsed_us = i128::from(current_us) - i128::from(previous_us);
    nalgebra::convert(elapsed_us as f64 / MICROS_PER_SECOND)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn polar_of(x: f64, y: f64) -> (f64, f64) {
        ((x * x + y * y).sqrt(), y.atan2(x))
    }

    #[test]
    fn test_first_cartesian_initializes() {
        let mut filter = FusionFilter::<f64>::with_default_config();
        assert!(!filter.is_initialized());
        assert!(filter.state().is_none());
        assert_eq!(filter.last_timestamp(), None);

        let outcome = filter
            .process(&SensorMeasurement::cartesian(0, 1.0, 0.8))
            .unwrap();

        assert_eq!(outcome, ProcessOutcome::Initialized(SensorKind::Cartesian));
        assert!(filter.is_initialized());
        assert_eq!(filter.last_timestamp(), Some(0));

        let mean = filter.mean().unwrap();
        assert_eq!(mean.as_slice(), &[1.0, 0.8, 0.0, 0.0, 0.0]);

        let p = filter.covariance().unwrap().as_matrix();
        assert!((p[(0, 0)] - 0.0225).abs() < 1e-12);
        assert!((p[(1, 1)] - 0.0225).abs() < 1e-12);
        assert_eq!(p[(2, 2)], 1.0);
        assert_eq!(p[(4, 4)], 1.0);
        assert_eq!(p[(0, 1)], 0.0);
    }

    #[test]
    fn test_polar_update_after_cartesian_init() {
        let mut filter = FusionFilter::<f64>::with_default_config();
        filter
            .process(&SensorMeasurement::cartesian(0, 1.0, 0.8))
            .unwrap();

        // With zero prior speed the prediction alone leaves the position in place
        let prediction = filter.ukf.predict(filter.state().unwrap(), 1.0).unwrap();
        let [px, py] = prediction.state.position();
        assert!((px - 1.0).abs() < 1e-9, "px: {}", px);
        assert!((py - 0.8).abs() < 1e-9, "py: {}", py);

        let (range, bearing) = polar_of(2.0, 1.0);
        let outcome = filter
            .process(&SensorMeasurement::polar(1_000_000, range, bearing, 0.0))
            .unwrap();

        let report = match outcome {
            ProcessOutcome::Updated(report) => report,
            other => panic!("expected update, got {:?}", other),
        };
        assert_eq!(report.sensor, SensorKind::Polar);
        assert!((report.dt - 1.0).abs() < 1e-12);
        assert!(report.nis.is_finite() && report.nis > 0.0);

        let [x, y] = filter.state().unwrap().position();
        let before = ((1.0_f64 - 2.0).powi(2) + (0.8_f64 - 1.0).powi(2)).sqrt();
        let after = ((x - 2.0).powi(2) + (y - 1.0).powi(2)).sqrt();
        assert!(after < before, "distance {} not below {}", after, before);
        assert_eq!(filter.last_timestamp(), Some(1_000_000));
    }

    #[test]
    fn test_disabled_sensor_only_advances_timestamp() {
        let config = FusionConfig::default().with_polar(false);
        let mut filter = FusionFilter::<f64>::new(config).unwrap();
        filter
            .process(&SensorMeasurement::cartesian(0, 1.0, 0.8))
            .unwrap();
        let before = filter.state().unwrap().clone();

        let outcome = filter
            .process(&SensorMeasurement::polar(1_000_000, 1.3, 0.67, 0.1))
            .unwrap();

        assert_eq!(outcome, ProcessOutcome::Skipped(SensorKind::Polar));
        assert_eq!(filter.state().unwrap(), &before);
        assert_eq!(filter.last_timestamp(), Some(1_000_000));

        // The enabled sensor still updates
        let outcome = filter
            .process(&SensorMeasurement::cartesian(1_100_000, 1.1, 0.8))
            .unwrap();
        assert!(matches!(outcome, ProcessOutcome::Updated(_)));
    }

    #[test]
    fn test_disabled_sensor_still_initializes() {
        let config = FusionConfig::default().with_polar(false);
        let mut filter = FusionFilter::<f64>::new(config).unwrap();

        let outcome = filter
            .process(&SensorMeasurement::polar(10, 5.0, 0.0, 0.0))
            .unwrap();

        assert_eq!(outcome, ProcessOutcome::Initialized(SensorKind::Polar));
        let [x, y] = filter.state().unwrap().position();
        assert!((x - 5.0).abs() < 1e-12);
        assert!(y.abs() < 1e-12);
    }

    #[test]
    fn test_out_of_order_measurement_is_rejected() {
        let mut filter = FusionFilter::<f64>::with_default_config();
        filter
            .process(&SensorMeasurement::cartesian(1_000, 1.0, 0.8))
            .unwrap();
        let before = filter.track().unwrap().clone();

        let result = filter.process(&SensorMeasurement::cartesian(500, 1.1, 0.9));

        assert_eq!(
            result,
            Err(FusionError::NonMonotonicTimestamp {
                previous: 1_000,
                current: 500,
            })
        );
        assert_eq!(filter.track().unwrap(), &before);
    }

    #[test]
    fn test_equal_timestamp_updates_without_motion() {
        let mut filter = FusionFilter::<f64>::with_default_config();
        filter
            .process(&SensorMeasurement::cartesian(1_000, 1.0, 0.8))
            .unwrap();

        let outcome = filter
            .process(&SensorMeasurement::cartesian(1_000, 1.0, 0.8))
            .unwrap();

        match outcome {
            ProcessOutcome::Updated(report) => {
                assert_eq!(report.dt, 0.0);
                assert!(report.uncertainty < 5.0);
            }
            other => panic!("expected update, got {:?}", other),
        }
    }

    #[test]
    fn test_elapsed_seconds_spans_full_timestamp_range() {
        assert_eq!(elapsed_seconds::<f64>(0, 1_500_000), 1.5);
        assert_eq!(elapsed_seconds::<f64>(-250_000, 250_000), 0.5);

        let span = elapsed_seconds::<f64>(i64::MIN, i64::MAX);
        assert!((span - 18_446_744_073_709.55).abs() < 1.0, "span: {}", span);
    }

    #[test]
    fn test_extreme_timestamp_gap_does_not_panic() {
        let mut filter = FusionFilter::<f64>::with_default_config();
        filter
            .process(&SensorMeasurement::cartesian(i64::MIN, 1.0, 0.8))
            .unwrap();
        let before = filter.track().unwrap().clone();

        match filter.process(&SensorMeasurement::cartesian(i64::MAX, 1.0, 0.8)) {
            Ok(ProcessOutcome::Updated(report)) => {
                assert!(report.dt > 1.8e13, "dt: {}", report.dt);
                assert_eq!(filter.last_timestamp(), Some(i64::MAX));
            }
            Ok(other) => panic!("expected update, got {:?}", other),
            Err(_) => assert_eq!(filter.track().unwrap(), &before),
        }
    }

    #[test]
    fn test_non_finite_measurement_is_rejected() {
        let mut filter = FusionFilter::<f64>::with_default_config();

        let result = filter.process(&SensorMeasurement::cartesian(0, f64::NAN, 0.8));

        assert_eq!(result, Err(FusionError::NonFiniteMeasurement));
        assert_eq!(filter.phase(), &FilterPhase::Uninitialized);
    }

    #[test]
    fn test_reading_from_raw() {
        let reading = SensorReading::from_raw(SensorKind::Polar, &[1.0, 0.5, -0.2]).unwrap();
        assert_eq!(
            reading,
            SensorReading::Polar {
                range: 1.0,
                bearing: 0.5,
                range_rate: -0.2
            }
        );
        assert_eq!(reading.kind(), SensorKind::Polar);

        assert_eq!(
            SensorReading::from_raw(SensorKind::Polar, &[1.0, 0.5]),
            Err(FusionError::InvalidMeasurementArity {
                expected: 3,
                found: 2
            })
        );
        assert_eq!(
            SensorReading::<f64>::from_raw(SensorKind::Cartesian, &[1.0, 0.5, 0.1]),
            Err(FusionError::InvalidMeasurementArity {
                expected: 2,
                found: 3
            })
        );
        assert_eq!(
            SensorReading::from_raw(SensorKind::Cartesian, &[1.0, f64::INFINITY]),
            Err(FusionError::NonFiniteMeasurement)
        );

        let measurement =
            SensorMeasurement::from_raw(42, SensorKind::Cartesian, &[3.0, 4.0]).unwrap();
        assert_eq!(measurement.timestamp_us, 42);
        assert_eq!(measurement.kind(), SensorKind::Cartesian);
    }

    #[test]
    fn test_polar_initial_covariance_modes() {
        let reading = SensorReading::Polar {
            range: 10.0,
            bearing: 0.0,
            range_rate: 0.0,
        };

        let scaled = FusionFilter::<f64>::new(
            FusionConfig::default()
                .with_polar_initialization(PolarInitialization::RangeVarianceScaled),
        )
        .unwrap()
        .initial_estimate(&reading);
        let p = scaled.covariance.as_matrix();
        for i in 0..STATE_DIM {
            assert!((p[(i, i)] - 0.09).abs() < 1e-12);
        }

        let linearized = FusionFilter::<f64>::with_default_config().initial_estimate(&reading);
        let p = linearized.covariance.as_matrix();
        // Along-range σ_r², cross-range (r·σ_φ)², the rest untouched
        assert!((p[(0, 0)] - 0.09).abs() < 1e-12);
        assert!((p[(1, 1)] - 0.09).abs() < 1e-12);
        assert!(p[(0, 1)].abs() < 1e-12);
        assert_eq!(p[(2, 2)], 1.0);
        assert_eq!(p[(3, 3)], 1.0);
        assert_eq!(linearized.mean.as_slice(), &[10.0, 0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_polar_init_at_origin_can_be_tracked() {
        let mut filter = FusionFilter::<f64>::with_default_config();
        filter
            .process(&SensorMeasurement::polar(0, 0.0, 0.0, 0.0))
            .unwrap();

        // Singular position block; sigma-point generation regularizes it
        let outcome = filter
            .process(&SensorMeasurement::cartesian(100_000, 0.1, 0.0))
            .unwrap();
        assert!(matches!(outcome, ProcessOutcome::Updated(_)));
        assert!(filter.state().unwrap().is_finite());
    }

    #[test]
    fn test_failed_update_leaves_filter_unchanged() {
        let mut filter = FusionFilter::<f64>::with_default_config();
        // The cross-range variance of this reading overflows to infinity
        filter
            .process(&SensorMeasurement::polar(0, 1e300, 0.0, 0.0))
            .unwrap();
        let before = filter.track().unwrap().clone();

        let result = filter.process(&SensorMeasurement::cartesian(100_000, 0.0, 0.0));

        assert!(result.is_err());
        assert_eq!(filter.track().unwrap(), &before);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = FusionConfig::default().with_process_noise(-1.0, 1.0);
        assert!(matches!(
            FusionFilter::<f64>::new(config),
            Err(FusionError::InvalidConfig(_))
        ));
    }
}
