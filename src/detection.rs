//! Detection types consumed by the registry.

use serde::{Deserialize, Serialize};

use crate::estimator::Measurement;
use crate::track::TrackKey;
use crate::{Error, Result};

/// Axis-aligned box given by its top-left corner and size.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Box as the 4-channel estimator measurement `[x, y, w, h]`.
    pub fn to_measurement(&self) -> Measurement {
        Measurement::new(self.x, self.y, self.width, self.height)
    }

    pub fn from_measurement(m: &Measurement) -> Self {
        Self::new(m[0], m[1], m[2], m[3])
    }

    /// Copy of this box with negative width/height raised to zero.
    pub fn clamp_size(self) -> Self {
        Self {
            width: self.width.max(0.0),
            height: self.height.max(0.0),
            ..self
        }
    }

    /// Top-left and bottom-right corners.
    pub fn corners(&self) -> ((f64, f64), (f64, f64)) {
        (
            (self.x, self.y),
            (self.x + self.width, self.y + self.height),
        )
    }

    pub fn validate(&self) -> Result<()> {
        if ![self.x, self.y, self.width, self.height]
            .iter()
            .all(|v| v.is_finite())
        {
            return Err(Error::InvalidDetection(format!(
                "non-finite box coordinates {:?}",
                self
            )));
        }
        if self.width < 0.0 || self.height < 0.0 {
            return Err(Error::InvalidDetection(format!(
                "negative box size {}x{}",
                self.width, self.height
            )));
        }
        Ok(())
    }
}

/// A single detector output.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Class label assigned by the detector.
    pub class_id: i32,
    /// Object identifier, unique within its class.
    pub object_id: i32,
    pub bbox: BoundingBox,
    /// Arrival timestamp in milliseconds.
    pub timestamp_ms: i64,
}

impl Detection {
    pub fn new(class_id: i32, object_id: i32, bbox: BoundingBox, timestamp_ms: i64) -> Self {
        Self {
            class_id,
            object_id,
            bbox,
            timestamp_ms,
        }
    }

    /// Registry key of the track this detection belongs to.
    pub fn key(&self) -> TrackKey {
        TrackKey::new(self.class_id, self.object_id)
    }

    /// Reject detections the registry cannot store.
    ///
    /// Negative ids are reserved for the "unspecified" query sentinel.
    pub fn validate(&self) -> Result<()> {
        if self.class_id < 0 || self.object_id < 0 {
            return Err(Error::InvalidDetection(format!(
                "negative identifiers (class {}, id {})",
                self.class_id, self.object_id
            )));
        }
        self.bbox.validate()
    }
}

/// All detections sharing one arrival timestamp.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionBatch {
    pub timestamp_ms: i64,
    pub detections: Vec<Detection>,
}

impl DetectionBatch {
    pub fn new(timestamp_ms: i64, detections: Vec<Detection>) -> Self {
        Self {
            timestamp_ms,
            detections,
        }
    }

    /// A batch with no detections; ingesting it only ages the registry.
    pub fn empty(timestamp_ms: i64) -> Self {
        Self::new(timestamp_ms, Vec::new())
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }
}

/// Split a timestamp-ordered detection stream into batches.
///
/// Consecutive detections with equal timestamps form one batch. Order is
/// preserved both across and within batches; a timestamp that reappears
/// after a different one starts a new batch.
pub fn group_into_batches<I>(detections: I) -> Vec<DetectionBatch>
where
    I: IntoIterator<Item = Detection>,
{
    let mut batches: Vec<DetectionBatch> = Vec::new();
    for det in detections {
        match batches.last_mut() {
            Some(batch) if batch.timestamp_ms == det.timestamp_ms => batch.detections.push(det),
            _ => batches.push(DetectionBatch::new(det.timestamp_ms, vec![det])),
        }
    }
    batches
}
