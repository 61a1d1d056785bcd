//! Post-batch observers.
//!
//! Observers receive a read-only `FrameView` after each ingested batch, once
//! the registry write lock has been given up. They never see or hold the
//! registry itself.

use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};

use log::{error, trace};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::detection::BoundingBox;
use crate::query::Selector;
use crate::registry::Registry;
use crate::track::TrackKey;

/// One track as seen by observers.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObservedTrack {
    pub key: TrackKey,
    /// Last raw detection box.
    pub detection: BoundingBox,
    /// Estimator prediction at the view time, if the estimator produced one.
    pub prediction: Option<BoundingBox>,
}

/// Registry contents captured right after a batch.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameView {
    pub timestamp_ms: i64,
    pub tracks: Vec<ObservedTrack>,
}

impl FrameView {
    /// Capture every live track with its prediction at `timestamp_ms`.
    ///
    /// Tracks are sorted by key so consecutive views line up. Costs one
    /// estimator `predict` per live track.
    pub fn capture(registry: &Registry, timestamp_ms: i64) -> Self {
        let clamp = registry.config().clamp_predicted_size;
        let mut tracks: Vec<ObservedTrack> = registry
            .lookup_live(&Selector::all(), timestamp_ms)
            .into_iter()
            .map(|record| ObservedTrack {
                key: record.key,
                detection: record.last_detection.bbox,
                prediction: match record.predict_box(timestamp_ms, clamp) {
                    Ok(bbox) => Some(bbox),
                    Err(e) => {
                        error!("prediction for track {} failed: {}", record.key, e);
                        None
                    }
                },
            })
            .collect();
        tracks.sort_by_key(|t| t.key);
        Self {
            timestamp_ms,
            tracks,
        }
    }
}

/// Receives a view of the registry after every batch.
pub trait BatchObserver: Send + Sync {
    fn on_batch(&self, view: &FrameView);
}

/// What an overlay rectangle represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverlayKind {
    Detection,
    Prediction,
}

/// Rectangle to draw, as top-left / bottom-right corners.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct OverlayRect {
    pub key: TrackKey,
    pub kind: OverlayKind,
    pub top_left: (f64, f64),
    pub bottom_right: (f64, f64),
}

/// Overlay rectangles for one batch.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OverlayFrame {
    pub timestamp_ms: i64,
    pub rects: Vec<OverlayRect>,
}

impl OverlayFrame {
    /// Detection rectangle followed by prediction rectangle for each track.
    pub fn from_view(view: &FrameView) -> Self {
        let rect = |key, kind, bbox: &BoundingBox| {
            let (top_left, bottom_right) = bbox.corners();
            OverlayRect {
                key,
                kind,
                top_left,
                bottom_right,
            }
        };

        let mut rects = Vec::with_capacity(view.tracks.len() * 2);
        for track in &view.tracks {
            rects.push(rect(track.key, OverlayKind::Detection, &track.detection));
            if let Some(prediction) = &track.prediction {
                rects.push(rect(track.key, OverlayKind::Prediction, prediction));
            }
        }
        Self {
            timestamp_ms: view.timestamp_ms,
            rects,
        }
    }
}

/// Keeps the overlay of the most recent batch for a renderer to pick up.
#[derive(Debug, Default)]
pub struct OverlayRecorder {
    latest: Mutex<Option<OverlayFrame>>,
}

impl OverlayRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overlay of the last observed batch.
    pub fn latest(&self) -> Option<OverlayFrame> {
        self.latest.lock().clone()
    }
}

impl BatchObserver for OverlayRecorder {
    fn on_batch(&self, view: &FrameView) {
        *self.latest.lock() = Some(OverlayFrame::from_view(view));
    }
}

/// Forwards views to another thread through a bounded channel.
///
/// Sending never blocks: when the consumer falls behind, views are dropped.
#[derive(Debug)]
pub struct ChannelObserver {
    sender: SyncSender<FrameView>,
}

impl ChannelObserver {
    /// Create the observer and the receiving end of its channel.
    pub fn new(capacity: usize) -> (Self, Receiver<FrameView>) {
        let (sender, receiver) = mpsc::sync_channel(capacity);
        (Self { sender }, receiver)
    }
}

impl BatchObserver for ChannelObserver {
    fn on_batch(&self, view: &FrameView) {
        match self.sender.try_send(view.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                trace!("observer channel full, dropping view at {} ms", view.timestamp_ms)
            }
            Err(TrySendError::Disconnected(_)) => {
                trace!("observer channel closed, dropping view at {} ms", view.timestamp_ms)
            }
        }
    }
}
