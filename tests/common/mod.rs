//! Common test helpers for fusion integration tests

#![allow(dead_code)]

use ctrv_fusion::config::FusionConfig;
use ctrv_fusion::filters::fusion::{FusionFilter, ProcessOutcome, SensorMeasurement};
use ctrv_fusion::filters::ukf::UkfState;
use ctrv_fusion::models::CtrvModel;
use ctrv_fusion::types::angle::normalize_angle;
use ctrv_fusion::types::spaces::AugmentedVector;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

/// Sensor period used by the simulated streams (microseconds)
pub const STEP_US: i64 = 50_000;

/// Sensor period used by the simulated streams (seconds)
pub const STEP_S: f64 = 0.05;

/// Noise-free CTRV trajectory, one state per sensor period
pub fn simulate_truth(initial: [f64; 5], steps: usize) -> Vec<[f64; 5]> {
    let model = CtrvModel::new(0.0, 0.0);
    let mut truth = Vec::with_capacity(steps);
    let mut current = initial;

    for _ in 0..steps {
        truth.push(current);
        let point = AugmentedVector::from_array([
            current[0], current[1], current[2], current[3], current[4], 0.0, 0.0,
        ]);
        let next = model.propagate(&point, STEP_S);
        current = [
            *next.index(0),
            *next.index(1),
            *next.index(2),
            *next.index(3),
            *next.index(4),
        ];
    }

    truth
}

/// Exact polar measurement of a ground-truth state
pub fn polar_of(state: &[f64; 5]) -> (f64, f64, f64) {
    let [px, py, v, yaw, _] = *state;
    let range = (px * px + py * py).sqrt();
    let bearing = py.atan2(px);
    let range_rate = (px * yaw.cos() * v + py * yaw.sin() * v) / range;
    (range, bearing, range_rate)
}

/// Noisy measurements of a trajectory, alternating Cartesian and polar
///
/// Noise levels match the default sensor configuration; the first
/// measurement is always Cartesian.
pub fn noisy_measurements(truth: &[[f64; 5]], seed: u64) -> Vec<SensorMeasurement<f64>> {
    let config = FusionConfig::<f64>::default();
    let mut rng = StdRng::seed_from_u64(seed);

    let px_noise = Normal::new(0.0, config.cartesian_noise.std_px).unwrap();
    let py_noise = Normal::new(0.0, config.cartesian_noise.std_py).unwrap();
    let range_noise = Normal::new(0.0, config.polar_noise.std_range).unwrap();
    let bearing_noise = Normal::new(0.0, config.polar_noise.std_bearing).unwrap();
    let range_rate_noise = Normal::new(0.0, config.polar_noise.std_range_rate).unwrap();

    truth
        .iter()
        .enumerate()
        .map(|(k, state)| {
            let timestamp = k as i64 * STEP_US;
            if k % 2 == 0 {
                SensorMeasurement::cartesian(
                    timestamp,
                    state[0] + px_noise.sample(&mut rng),
                    state[1] + py_noise.sample(&mut rng),
                )
            } else {
                let (range, bearing, range_rate) = polar_of(state);
                SensorMeasurement::polar(
                    timestamp,
                    range + range_noise.sample(&mut rng),
                    bearing + bearing_noise.sample(&mut rng),
                    range_rate + range_rate_noise.sample(&mut rng),
                )
            }
        })
        .collect()
}

/// Feeds every measurement to the filter, recording the estimate after each
pub fn run_filter(
    filter: &mut FusionFilter<f64>,
    measurements: &[SensorMeasurement<f64>],
) -> (Vec<ProcessOutcome<f64>>, Vec<UkfState<f64, 5>>) {
    let mut outcomes = Vec::with_capacity(measurements.len());
    let mut estimates = Vec::with_capacity(measurements.len());

    for measurement in measurements {
        let outcome = filter
            .process(measurement)
            .unwrap_or_else(|err| panic!("measurement at {} failed: {}", measurement.timestamp_us, err));
        outcomes.push(outcome);
        estimates.push(filter.state().unwrap().clone());
    }

    (outcomes, estimates)
}

/// Euclidean position error of an estimate
pub fn position_error(estimate: &UkfState<f64, 5>, truth: &[f64; 5]) -> f64 {
    let [x, y] = estimate.position();
    ((x - truth[0]).powi(2) + (y - truth[1]).powi(2)).sqrt()
}

/// Root-mean-square position error over `estimates[from..]`
pub fn position_rmse(estimates: &[UkfState<f64, 5>], truth: &[[f64; 5]], from: usize) -> f64 {
    let squared: f64 = estimates[from..]
        .iter()
        .zip(&truth[from..])
        .map(|(estimate, state)| position_error(estimate, state).powi(2))
        .sum();
    (squared / (estimates.len() - from) as f64).sqrt()
}

/// Absolute heading error, wrapped
pub fn heading_error(estimate: &UkfState<f64, 5>, truth: &[f64; 5]) -> f64 {
    normalize_angle(estimate.heading() - truth[3]).abs()
}
