//! Keyed storage of track records and their lifecycle.

use std::collections::HashMap;

use log::{debug, trace};

use crate::config::{RegistryConfig, TtlPolicy};
use crate::detection::Detection;
use crate::estimator::{EstimatorFactory, KalmanBoxEstimatorFactory};
use crate::query::Selector;
use crate::track::{TrackKey, TrackRecord};
use crate::Result;

/// Result of a successful upsert.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// First observation of this key; a new track was created.
    Created,
    /// Existing track updated with the detection.
    Updated,
}

/// Two-level registry of tracks: class label, then object id.
///
/// Not synchronized by itself; `Tracker` wraps it in a lock.
pub struct Registry {
    config: RegistryConfig,
    factory: Box<dyn EstimatorFactory>,
    tracks: HashMap<i32, HashMap<i32, TrackRecord>>,
}

impl Registry {
    /// Create a registry using Kalman estimators built from `config.kalman`.
    pub fn new(config: RegistryConfig) -> Result<Self> {
        let factory = KalmanBoxEstimatorFactory::new(config.kalman.clone());
        Self::with_estimator_factory(config, Box::new(factory))
    }

    /// Create a registry with a custom estimator factory.
    pub fn with_estimator_factory(
        config: RegistryConfig,
        factory: Box<dyn EstimatorFactory>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            factory,
            tracks: HashMap::new(),
        })
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Insert or update the track for `detection` at batch time `now_ms`.
    ///
    /// On a new key the estimator is initialized from the box and the TTL is
    /// set to `default_ttl`. On a known key the detection is replaced, the TTL
    /// is adjusted per `ttl_policy` and the estimator is updated with the time
    /// elapsed since the previous update. Errors leave the registry unchanged.
    pub fn upsert(&mut self, detection: &Detection, now_ms: i64) -> Result<UpsertOutcome> {
        detection.validate()?;
        let key = detection.key();
        let default_ttl = self.config.default_ttl;

        let by_id = self.tracks.entry(key.class_id).or_default();
        if let Some(record) = by_id.get_mut(&key.object_id) {
            let elapsed = record.idle_ms(now_ms);
            record.absorb(detection, now_ms)?;
            record.ttl = match self.config.ttl_policy {
                TtlPolicy::Increment => record.ttl.saturating_add(1),
                TtlPolicy::Reset => default_ttl,
            };
            trace!("track {} updated: elapsed {} ms, ttl {}", key, elapsed, record.ttl);
            return Ok(UpsertOutcome::Updated);
        }

        let created = TrackRecord::new(
            detection,
            self.factory.create_estimator(),
            default_ttl,
            now_ms,
        );
        match created {
            Ok(record) => {
                by_id.insert(key.object_id, record);
                debug!("track {} created at {} ms", key, now_ms);
                Ok(UpsertOutcome::Created)
            }
            Err(e) => {
                if by_id.is_empty() {
                    self.tracks.remove(&key.class_id);
                }
                Err(e)
            }
        }
    }

    /// Age every track by one batch and drop the expired ones.
    ///
    /// A track expires when its TTL reaches zero or it has been idle for more
    /// than `max_idle_ms`. Removal happens after the full scan, so every track
    /// is aged exactly once per call. Returns the evicted keys.
    pub fn age_and_evict(&mut self, now_ms: i64) -> Vec<TrackKey> {
        let max_idle_ms = self.config.max_idle_ms;
        let mut to_remove = Vec::new();

        for record in self.tracks.values_mut().flat_map(|by_id| by_id.values_mut()) {
            record.ttl = record.ttl.saturating_sub(1);
            if record.is_expired(now_ms, max_idle_ms) {
                to_remove.push(record.key);
            }
        }

        for key in &to_remove {
            if let Some(by_id) = self.tracks.get_mut(&key.class_id) {
                if let Some(record) = by_id.remove(&key.object_id) {
                    debug!(
                        "track {} evicted: ttl {}, idle {} ms",
                        key,
                        record.ttl,
                        record.idle_ms(now_ms)
                    );
                }
                if by_id.is_empty() {
                    self.tracks.remove(&key.class_id);
                }
            }
        }

        to_remove
    }

    /// All records matching `selector`, in unspecified order.
    ///
    /// No match yields an empty vector.
    pub fn lookup(&self, selector: &Selector) -> Vec<&TrackRecord> {
        match (selector.class_id, selector.object_id) {
            (Some(class_id), Some(object_id)) => self
                .tracks
                .get(&class_id)
                .and_then(|by_id| by_id.get(&object_id))
                .into_iter()
                .collect(),
            (Some(class_id), None) => self
                .tracks
                .get(&class_id)
                .map(|by_id| by_id.values().collect())
                .unwrap_or_default(),
            (None, Some(_)) => self.iter().filter(|r| selector.matches(&r.key)).collect(),
            (None, None) => self.iter().collect(),
        }
    }

    /// Like `lookup`, minus records that are already expired at `now_ms`
    /// but have not been swept yet.
    pub fn lookup_live(&self, selector: &Selector, now_ms: i64) -> Vec<&TrackRecord> {
        let max_idle_ms = self.config.max_idle_ms;
        self.lookup(selector)
            .into_iter()
            .filter(|record| {
                let expired = record.is_expired(now_ms, max_idle_ms);
                if expired {
                    trace!(
                        "track {} hidden from query: ttl {}, idle {} ms",
                        record.key,
                        record.ttl,
                        record.idle_ms(now_ms)
                    );
                }
                !expired
            })
            .collect()
    }

    pub fn get(&self, key: &TrackKey) -> Option<&TrackRecord> {
        self.tracks
            .get(&key.class_id)
            .and_then(|by_id| by_id.get(&key.object_id))
    }

    pub fn contains(&self, key: &TrackKey) -> bool {
        self.get(key).is_some()
    }

    /// Iterate over all records in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = &TrackRecord> {
        self.tracks.values().flat_map(|by_id| by_id.values())
    }

    /// Number of tracks.
    pub fn len(&self) -> usize {
        self.tracks.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of classes with at least one track.
    pub fn class_count(&self) -> usize {
        self.tracks.len()
    }

    /// Drop every track and its estimator. Returns how many were released.
    pub fn clear(&mut self) -> usize {
        let released = self.len();
        self.tracks.clear();
        released
    }
}
