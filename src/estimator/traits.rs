//! Estimator traits for the tracking registry.

use nalgebra::Vector4;

use crate::Result;

/// A 4-channel box measurement `[x, y, width, height]`.
pub type Measurement = Vector4<f64>;

/// Per-track motion-state estimator.
///
/// Every estimator is created un-initialized and must receive exactly one
/// `init` before `update` or `predict`. Elapsed times are milliseconds since
/// the last committed measurement; negative values mean "no time passed".
pub trait Estimator: Send + Sync {
    /// Establish the initial state from the first measurement.
    ///
    /// Fails with `EstimatorAlreadyInitialized` on a second call.
    fn init(&mut self, measurement: &Measurement) -> Result<()>;

    /// Incorporate a measurement taken `elapsed_ms` after the previous one.
    ///
    /// Fails with `EstimatorNotInitialized` before `init`.
    fn update(&mut self, measurement: &Measurement, elapsed_ms: i64) -> Result<()>;

    /// Extrapolate the state `elapsed_ms` after the last update.
    ///
    /// Does not change the committed state and may be called any number of
    /// times. Zero or negative elapsed returns the committed state.
    fn predict(&self, elapsed_ms: i64) -> Result<Measurement>;

    /// Committed state, or `None` before `init`.
    fn state(&self) -> Option<Measurement>;

    fn is_initialized(&self) -> bool {
        self.state().is_some()
    }
}

/// Factory for creating estimator instances.
///
/// The registry asks for one fresh estimator per new track, so it never
/// needs to know the concrete estimator type.
pub trait EstimatorFactory: Send + Sync {
    /// Create a new, un-initialized estimator.
    fn create_estimator(&self) -> Box<dyn Estimator>;
}

/// Convert an elapsed time in milliseconds to seconds, treating negative
/// (out-of-order) intervals as zero.
#[inline]
pub fn elapsed_seconds(elapsed_ms: i64) -> f64 {
    elapsed_ms.max(0) as f64 / 1000.0
}
