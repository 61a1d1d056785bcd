//! Estimator that simply stores the last measurement.
//!
//! This provides a baseline without extrapolation: predictions always return
//! the last committed box.

use super::traits::{Estimator, EstimatorFactory, Measurement};
use crate::{Error, Result};

/// Estimator that stores the last measurement.
#[derive(Clone, Debug, Default)]
pub struct LastMeasurementEstimator {
    last: Option<Measurement>,
}

impl LastMeasurementEstimator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Estimator for LastMeasurementEstimator {
    fn init(&mut self, measurement: &Measurement) -> Result<()> {
        if self.last.is_some() {
            return Err(Error::EstimatorAlreadyInitialized);
        }
        self.last = Some(*measurement);
        Ok(())
    }

    fn update(&mut self, measurement: &Measurement, _elapsed_ms: i64) -> Result<()> {
        let last = self.last.as_mut().ok_or(Error::EstimatorNotInitialized)?;
        *last = *measurement;
        Ok(())
    }

    fn predict(&self, _elapsed_ms: i64) -> Result<Measurement> {
        self.last.ok_or(Error::EstimatorNotInitialized)
    }

    fn state(&self) -> Option<Measurement> {
        self.last
    }
}

/// Factory for creating LastMeasurementEstimator instances.
#[derive(Clone, Debug, Default)]
pub struct LastMeasurementEstimatorFactory;

impl LastMeasurementEstimatorFactory {
    pub fn new() -> Self {
        Self
    }
}

impl EstimatorFactory for LastMeasurementEstimatorFactory {
    fn create_estimator(&self) -> Box<dyn Estimator> {
        Box::new(LastMeasurementEstimator::new())
    }
}
