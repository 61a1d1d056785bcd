//! Point-in-time queries against the registry.
//!
//! Two read-only views are offered: `predict_tracks` extrapolates every
//! selected track to the request time, `snapshot_tracks` returns the raw last
//! detections. Neither touches persisted track state.

use log::error;
use serde::{Deserialize, Serialize};

use crate::detection::BoundingBox;
use crate::registry::Registry;
use crate::track::{TrackKey, TrackRecord};

/// Wire value meaning "not specified" for class or object id.
pub const UNSPECIFIED: i32 = -1;

/// Which tracks a query targets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selector {
    pub class_id: Option<i32>,
    pub object_id: Option<i32>,
}

impl Selector {
    /// Every track.
    pub fn all() -> Self {
        Self::default()
    }

    /// Every track of one class.
    pub fn class(class_id: i32) -> Self {
        Self {
            class_id: Some(class_id),
            object_id: None,
        }
    }

    /// The single track `(class_id, object_id)`.
    pub fn exact(class_id: i32, object_id: i32) -> Self {
        Self {
            class_id: Some(class_id),
            object_id: Some(object_id),
        }
    }

    /// Tracks with this object id in any class.
    pub fn object(object_id: i32) -> Self {
        Self {
            class_id: None,
            object_id: Some(object_id),
        }
    }

    /// Build from wire values where `-1` means unspecified.
    ///
    /// Any other negative value can never match a stored track and is kept
    /// as is, so it selects nothing.
    pub fn from_sentinels(class_id: i32, object_id: i32) -> Self {
        let specified = |v: i32| (v != UNSPECIFIED).then_some(v);
        Self {
            class_id: specified(class_id),
            object_id: specified(object_id),
        }
    }

    pub fn matches(&self, key: &TrackKey) -> bool {
        self.class_id.map_or(true, |c| c == key.class_id)
            && self.object_id.map_or(true, |i| i == key.object_id)
    }
}

/// A query with its request timestamp.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub selector: Selector,
    pub stamp_ms: i64,
}

impl QueryRequest {
    pub fn new(selector: Selector, stamp_ms: i64) -> Self {
        Self { selector, stamp_ms }
    }

    /// Build from the wire triple `(class, id, stamp)` with `-1` sentinels.
    pub fn from_sentinels(class_id: i32, object_id: i32, stamp_ms: i64) -> Self {
        Self::new(Selector::from_sentinels(class_id, object_id), stamp_ms)
    }
}

/// A box tagged with the track it belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackedBox {
    pub key: TrackKey,
    pub bbox: BoundingBox,
    /// Time of the detection the box is based on.
    pub last_update_ms: i64,
}

impl TrackedBox {
    fn raw(record: &TrackRecord) -> Self {
        Self {
            key: record.key,
            bbox: record.last_detection.bbox,
            last_update_ms: record.last_update_time_ms,
        }
    }
}

/// Extrapolate every live selected track to `request.stamp_ms`.
///
/// Tracks whose estimator fails are left out of the result and logged.
pub fn predict_tracks(registry: &Registry, request: &QueryRequest) -> Vec<TrackedBox> {
    let clamp = registry.config().clamp_predicted_size;
    registry
        .lookup_live(&request.selector, request.stamp_ms)
        .into_iter()
        .filter_map(|record| match record.predict_box(request.stamp_ms, clamp) {
            Ok(bbox) => Some(TrackedBox { bbox, ..TrackedBox::raw(record) }),
            Err(e) => {
                error!("prediction for track {} failed: {}", record.key, e);
                None
            }
        })
        .collect()
}

/// Last raw detection of every live selected track, without extrapolation.
pub fn snapshot_tracks(registry: &Registry, request: &QueryRequest) -> Vec<TrackedBox> {
    registry
        .lookup_live(&request.selector, request.stamp_ms)
        .into_iter()
        .map(TrackedBox::raw)
        .collect()
}
