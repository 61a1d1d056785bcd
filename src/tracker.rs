//! Shared tracker: one registry behind a lock, two entry points.
//!
//! `Tracker::ingest` is the write side, fed one detection batch at a time.
//! `Tracker::predict` and `Tracker::snapshot` are the read side. A `Tracker`
//! is `Send + Sync` and is meant to be shared through an `Arc` between the
//! ingestion thread and any number of query workers.

use log::{debug, error, warn};
use parking_lot::{RwLock, RwLockWriteGuard};

use crate::config::RegistryConfig;
use crate::detection::DetectionBatch;
use crate::estimator::EstimatorFactory;
use crate::observer::{BatchObserver, FrameView};
use crate::query::{predict_tracks, snapshot_tracks, QueryRequest, Selector, TrackedBox};
use crate::registry::{Registry, UpsertOutcome};
use crate::track::TrackKey;
use crate::utils::now_ms;
use crate::{Error, Result};

/// Summary of one ingested batch.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Batch timestamp.
    pub timestamp_ms: i64,
    /// Tracks created by this batch.
    pub created: Vec<TrackKey>,
    /// Tracks updated by this batch.
    pub updated: Vec<TrackKey>,
    /// Detections that were not applied, by position in the batch.
    pub rejected: Vec<(usize, Error)>,
    /// Tracks evicted by the sweep that closed the batch.
    pub evicted: Vec<TrackKey>,
}

impl BatchReport {
    /// Number of detections applied to the registry.
    pub fn accepted(&self) -> usize {
        self.created.len() + self.updated.len()
    }
}

/// Object tracker.
///
/// Owns the registry and serializes access to it: ingestion takes the write
/// lock for the whole batch (upserts and sweep), queries take the read lock.
pub struct Tracker {
    registry: RwLock<Registry>,
    observers: Vec<Box<dyn BatchObserver>>,
}

impl Tracker {
    /// Create a tracker with Kalman estimators.
    pub fn new(config: RegistryConfig) -> Result<Self> {
        Ok(Self::from_registry(Registry::new(config)?))
    }

    /// Create a tracker with a custom estimator factory.
    pub fn with_estimator_factory(
        config: RegistryConfig,
        factory: Box<dyn EstimatorFactory>,
    ) -> Result<Self> {
        Ok(Self::from_registry(Registry::with_estimator_factory(
            config, factory,
        )?))
    }

    pub fn from_registry(registry: Registry) -> Self {
        Self {
            registry: RwLock::new(registry),
            observers: Vec::new(),
        }
    }

    /// Register an observer notified after every batch.
    ///
    /// Observers are registered before the tracker is shared.
    pub fn add_observer(&mut self, observer: Box<dyn BatchObserver>) {
        self.observers.push(observer);
    }

    pub fn config(&self) -> RegistryConfig {
        self.registry.read().config().clone()
    }

    /// Apply one batch: upsert every detection at the batch time, then age
    /// and evict once.
    ///
    /// Bad detections are rejected individually; the rest of the batch is
    /// still applied.
    ///
    /// With observers registered, the call also captures a `FrameView`
    /// before returning: one estimator `predict` per live track, under the
    /// read guard downgraded from the batch's write lock. Queries proceed
    /// concurrently during the capture; the next `ingest` waits for it.
    /// Observer callbacks themselves run with no lock held. Without
    /// observers nothing is captured and no estimator is queried.
    pub fn ingest(&self, batch: &DetectionBatch) -> BatchReport {
        let now = batch.timestamp_ms;
        let mut report = BatchReport {
            timestamp_ms: now,
            ..Default::default()
        };

        let mut registry = self.registry.write();
        for (index, detection) in batch.detections.iter().enumerate() {
            match registry.upsert(detection, now) {
                Ok(UpsertOutcome::Created) => report.created.push(detection.key()),
                Ok(UpsertOutcome::Updated) => report.updated.push(detection.key()),
                Err(e) => {
                    if e.is_precondition_violation() {
                        error!("detection {} of batch {} ms aborted: {}", index, now, e);
                    } else {
                        warn!("detection {} of batch {} ms rejected: {}", index, now, e);
                    }
                    report.rejected.push((index, e));
                }
            }
        }
        report.evicted = registry.age_and_evict(now);

        debug!(
            "batch {} ms: {} created, {} updated, {} rejected, {} evicted, {} tracked",
            now,
            report.created.len(),
            report.updated.len(),
            report.rejected.len(),
            report.evicted.len(),
            registry.len()
        );

        if !self.observers.is_empty() {
            let view = {
                let registry = RwLockWriteGuard::downgrade(registry);
                FrameView::capture(&registry, now)
            };
            for observer in &self.observers {
                observer.on_batch(&view);
            }
        }

        report
    }

    /// Predicted boxes for the selected tracks at `request.stamp_ms`.
    pub fn predict(&self, request: &QueryRequest) -> Vec<TrackedBox> {
        predict_tracks(&self.registry.read(), request)
    }

    /// Raw last detections of the selected tracks.
    pub fn snapshot(&self, request: &QueryRequest) -> Vec<TrackedBox> {
        snapshot_tracks(&self.registry.read(), request)
    }

    /// `predict` at the current wall-clock time.
    pub fn predict_now(&self, selector: Selector) -> Vec<TrackedBox> {
        self.predict(&QueryRequest::new(selector, now_ms()))
    }

    /// `snapshot` at the current wall-clock time.
    pub fn snapshot_now(&self, selector: Selector) -> Vec<TrackedBox> {
        self.snapshot(&QueryRequest::new(selector, now_ms()))
    }

    /// Run `f` with shared access to the registry.
    pub fn with_registry<R>(&self, f: impl FnOnce(&Registry) -> R) -> R {
        f(&self.registry.read())
    }

    /// Number of stored tracks, including not yet swept stale ones.
    pub fn len(&self) -> usize {
        self.registry.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Release every track and its estimator. Returns how many were released.
    pub fn shutdown(&self) -> usize {
        let released = self.registry.write().clear();
        debug!("tracker shut down, {} tracks released", released);
        released
    }
}
