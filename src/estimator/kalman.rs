//! Kalman estimator for bounding boxes.
//!
//! Wraps the constant-velocity filter from `internal::kalman` behind the
//! `Estimator` trait and converts millisecond offsets into filter time steps.

use super::traits::{elapsed_seconds, Estimator, EstimatorFactory, Measurement};
use crate::config::KalmanParams;
use crate::internal::kalman::ConstantVelocityKalman;
use crate::{Error, Result};

/// Constant-velocity Kalman estimator over `[x, y, w, h]`.
#[derive(Clone, Debug)]
pub struct KalmanBoxEstimator {
    params: KalmanParams,
    filter: Option<ConstantVelocityKalman>,
}

impl KalmanBoxEstimator {
    pub fn new(params: KalmanParams) -> Self {
        Self {
            params,
            filter: None,
        }
    }

    /// Estimated rates (units per second), or `None` before `init`.
    pub fn velocity(&self) -> Option<Measurement> {
        self.filter.as_ref().map(|f| f.velocity())
    }
}

impl Estimator for KalmanBoxEstimator {
    fn init(&mut self, measurement: &Measurement) -> Result<()> {
        if self.filter.is_some() {
            return Err(Error::EstimatorAlreadyInitialized);
        }
        self.filter = Some(ConstantVelocityKalman::new(
            measurement,
            self.params.measurement_noise,
            self.params.process_noise,
            self.params.initial_position_variance,
            self.params.initial_velocity_variance,
        ));
        Ok(())
    }

    fn update(&mut self, measurement: &Measurement, elapsed_ms: i64) -> Result<()> {
        let filter = self.filter.as_mut().ok_or(Error::EstimatorNotInitialized)?;
        filter.predict(elapsed_seconds(elapsed_ms));
        filter.update(measurement)
    }

    fn predict(&self, elapsed_ms: i64) -> Result<Measurement> {
        let filter = self.filter.as_ref().ok_or(Error::EstimatorNotInitialized)?;
        let projected = filter.project(elapsed_seconds(elapsed_ms));
        Ok(projected.fixed_rows::<4>(0).into_owned())
    }

    fn state(&self) -> Option<Measurement> {
        self.filter.as_ref().map(|f| f.position())
    }
}

/// Factory for creating KalmanBoxEstimator instances.
#[derive(Clone, Debug, Default)]
pub struct KalmanBoxEstimatorFactory {
    params: KalmanParams,
}

impl KalmanBoxEstimatorFactory {
    pub fn new(params: KalmanParams) -> Self {
        Self { params }
    }
}

impl EstimatorFactory for KalmanBoxEstimatorFactory {
    fn create_estimator(&self) -> Box<dyn Estimator> {
        Box::new(KalmanBoxEstimator::new(self.params.clone()))
    }
}
