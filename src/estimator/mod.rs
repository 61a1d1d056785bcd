//! Motion-state estimators for tracked objects.
//!
//! This module provides:
//! - `KalmanBoxEstimator` - Constant-velocity Kalman filter over box channels
//! - `LastMeasurementEstimator` - Baseline without extrapolation

mod kalman;
mod last_measurement;
mod traits;

pub use kalman::{KalmanBoxEstimator, KalmanBoxEstimatorFactory};
pub use last_measurement::{LastMeasurementEstimator, LastMeasurementEstimatorFactory};
pub use traits::{elapsed_seconds, Estimator, EstimatorFactory, Measurement};
