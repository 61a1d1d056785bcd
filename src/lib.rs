//! # objtrack - Tracked Object Registry
//!
//! Keeps a live registry of objects reported by an upstream detector and
//! answers "where is object X now" queries between detection arrivals.
//!
//! Each detection carries a class label, a detector-assigned object id and a
//! bounding box. Detections are associated to tracks purely by the
//! `(class, id)` pair. Every track owns one motion estimator which is updated
//! on each re-detection and extrapolated forward on query. Tracks that stop
//! being re-detected are forgotten after a bounded number of batches or an
//! idle timeout, whichever comes first.
//!
//! ## Features
//!
//! - Constant-velocity Kalman estimator over (x, y, width, height)
//! - TTL and idle-time eviction, with selectable TTL-on-hit policy
//! - Ingestion and query entry points over one `RwLock`-guarded registry
//! - Post-batch observers for overlays/visualization
//!
//! ## Example
//!
//! ```rust,ignore
//! use objtrack_rs::{
//!     BoundingBox, Detection, DetectionBatch, QueryRequest, RegistryConfig, Selector, Tracker,
//! };
//!
//! let tracker = Tracker::new(RegistryConfig::default()).unwrap();
//!
//! let det = Detection::new(1, 7, BoundingBox::new(10.0, 10.0, 5.0, 5.0), 0);
//! tracker.ingest(&DetectionBatch::new(0, vec![det]));
//!
//! let predictions = tracker.predict(&QueryRequest::new(Selector::exact(1, 7), 200));
//! ```

// Internal modules
pub(crate) mod internal;

// Public modules
pub mod config;
pub mod detection;
pub mod estimator;
pub mod observer;
pub mod query;
pub mod registry;
pub mod track;
pub mod tracker;
pub mod utils;

// Re-exports for convenience
pub use config::{KalmanParams, RegistryConfig, TtlPolicy};
pub use detection::{group_into_batches, BoundingBox, Detection, DetectionBatch};
pub use estimator::{Estimator, EstimatorFactory, Measurement};
pub use observer::{BatchObserver, FrameView};
pub use query::{QueryRequest, Selector, TrackedBox};
pub use registry::{Registry, UpsertOutcome};
pub use track::{TrackKey, TrackRecord};
pub use tracker::{BatchReport, Tracker};

// Error types
pub use crate::error::{Error, Result};

mod error {
    use thiserror::Error;

    /// Errors that can occur while maintaining or querying the registry
    #[derive(Error, Debug)]
    pub enum Error {
        #[error("Invalid configuration: {0}")]
        InvalidConfig(String),

        #[error("Invalid detection: {0}")]
        InvalidDetection(String),

        #[error("Estimator used before init")]
        EstimatorNotInitialized,

        #[error("Estimator initialized twice")]
        EstimatorAlreadyInitialized,

        #[error("Estimator error: {0}")]
        EstimatorError(String),

        #[error("Config parse error: {0}")]
        ConfigParse(#[from] serde_json::Error),

        #[error("IO error: {0}")]
        IoError(#[from] std::io::Error),
    }

    impl Error {
        /// True for errors that indicate a broken registry invariant rather
        /// than bad input.
        pub fn is_precondition_violation(&self) -> bool {
            matches!(
                self,
                Error::EstimatorNotInitialized | Error::EstimatorAlreadyInitialized
            )
        }
    }

    /// Result type for registry operations
    pub type Result<T> = std::result::Result<T, Error>;
}
