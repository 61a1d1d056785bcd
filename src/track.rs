//! Track records held by the registry.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::detection::{BoundingBox, Detection};
use crate::estimator::Estimator;
use crate::Result;

/// Registry key: `(class, object id)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TrackKey {
    pub class_id: i32,
    pub object_id: i32,
}

impl TrackKey {
    pub fn new(class_id: i32, object_id: i32) -> Self {
        Self {
            class_id,
            object_id,
        }
    }
}

impl fmt::Display for TrackKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.class_id, self.object_id)
    }
}

/// One tracked object.
///
/// The record exclusively owns its estimator; dropping the record (eviction
/// or registry shutdown) is the only way the estimator is released.
pub struct TrackRecord {
    /// Identity of this track.
    pub key: TrackKey,

    /// Most recent detection absorbed by this track.
    pub last_detection: Detection,

    /// Remaining batches before eviction.
    pub ttl: i32,

    /// Batch time of the last detection that touched this record.
    pub last_update_time_ms: i64,

    /// Batch time at which the track was created.
    pub created_at_ms: i64,

    /// Number of detections absorbed, including the first.
    pub hits: u32,

    /// Motion-state estimator for this track.
    pub(crate) estimator: Box<dyn Estimator>,
}

impl fmt::Debug for TrackRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackRecord")
            .field("key", &self.key)
            .field("last_detection", &self.last_detection)
            .field("ttl", &self.ttl)
            .field("last_update_time_ms", &self.last_update_time_ms)
            .field("created_at_ms", &self.created_at_ms)
            .field("hits", &self.hits)
            .field("estimator", &"<Estimator>")
            .finish()
    }
}

impl TrackRecord {
    /// Create a record from its first detection, initializing `estimator`.
    pub(crate) fn new(
        detection: &Detection,
        mut estimator: Box<dyn Estimator>,
        ttl: i32,
        now_ms: i64,
    ) -> Result<Self> {
        estimator.init(&detection.bbox.to_measurement())?;
        Ok(Self {
            key: detection.key(),
            last_detection: detection.clone(),
            ttl,
            last_update_time_ms: now_ms,
            created_at_ms: now_ms,
            hits: 1,
            estimator,
        })
    }

    /// Absorb a re-detection. On estimator failure nothing is changed.
    ///
    /// The TTL is left to the caller, which owns the TTL policy.
    pub(crate) fn absorb(&mut self, detection: &Detection, now_ms: i64) -> Result<()> {
        let elapsed = self.idle_ms(now_ms);
        self.estimator
            .update(&detection.bbox.to_measurement(), elapsed)?;
        self.last_detection = detection.clone();
        self.last_update_time_ms = now_ms;
        self.hits = self.hits.saturating_add(1);
        Ok(())
    }

    /// Milliseconds since the last update (negative if `now_ms` is earlier).
    ///
    /// Saturates at the `i64` bounds for far-off timestamps.
    pub fn idle_ms(&self, now_ms: i64) -> i64 {
        now_ms.saturating_sub(self.last_update_time_ms)
    }

    /// True when the record must be neither served nor kept.
    pub fn is_expired(&self, now_ms: i64, max_idle_ms: i64) -> bool {
        self.ttl <= 0 || self.idle_ms(now_ms) > max_idle_ms
    }

    /// Estimator state extrapolated to `now_ms`.
    ///
    /// With `clamp_size`, negative extrapolated width/height become zero.
    pub fn predict_box(&self, now_ms: i64, clamp_size: bool) -> Result<BoundingBox> {
        let predicted = self.estimator.predict(self.idle_ms(now_ms))?;
        let bbox = BoundingBox::from_measurement(&predicted);
        Ok(if clamp_size { bbox.clamp_size() } else { bbox })
    }

    /// Committed estimator state, if any.
    pub fn estimate(&self) -> Option<BoundingBox> {
        self.estimator
            .state()
            .map(|m| BoundingBox::from_measurement(&m))
    }

    pub fn estimator(&self) -> &dyn Estimator {
        self.estimator.as_ref()
    }
}
