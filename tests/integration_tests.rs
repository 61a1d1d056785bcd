//! Integration tests for the tracked-object registry.
//!
//! These tests drive complete ingestion/query workflows through the public API.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use approx::assert_relative_eq;

use objtrack_rs::estimator::LastMeasurementEstimatorFactory;
use objtrack_rs::observer::{ChannelObserver, OverlayKind, OverlayRecorder};
use objtrack_rs::{
    group_into_batches, BatchObserver, BoundingBox, Detection, DetectionBatch, FrameView,
    QueryRequest, RegistryConfig, Selector, TrackKey, Tracker, TtlPolicy,
};

fn det(class_id: i32, object_id: i32, bbox: (f64, f64, f64, f64), t: i64) -> Detection {
    Detection::new(
        class_id,
        object_id,
        BoundingBox::new(bbox.0, bbox.1, bbox.2, bbox.3),
        t,
    )
}

fn keys(boxes: &[objtrack_rs::TrackedBox]) -> HashSet<TrackKey> {
    boxes.iter().map(|b| b.key).collect()
}

// =============================================================================
// Test 1: Two-point extrapolation scenario
// =============================================================================

#[test]
fn test_integration_two_point_extrapolation() {
    let tracker = Tracker::new(RegistryConfig::default()).expect("Failed to create tracker");

    tracker.ingest(&DetectionBatch::new(0, vec![det(1, 7, (10.0, 10.0, 5.0, 5.0), 0)]));
    tracker.ingest(&DetectionBatch::new(100, vec![det(1, 7, (12.0, 10.0, 5.0, 5.0), 100)]));

    let committed = tracker.predict(&QueryRequest::new(Selector::exact(1, 7), 100));
    let ahead = tracker.predict(&QueryRequest::new(Selector::exact(1, 7), 200));

    assert_eq!(committed.len(), 1);
    assert_eq!(ahead.len(), 1);
    assert!(committed[0].bbox.x > 10.0 && committed[0].bbox.x < 12.0);
    assert!(ahead[0].bbox.x > committed[0].bbox.x);
    assert_relative_eq!(ahead[0].bbox.y, 10.0, epsilon = 1e-9);
    assert_eq!(ahead[0].key, TrackKey::new(1, 7));
    assert_eq!(ahead[0].last_update_ms, 100);

    // Snapshot is never extrapolated
    let snap = tracker.snapshot(&QueryRequest::new(Selector::exact(1, 7), 200));
    assert_eq!(snap[0].bbox, BoundingBox::new(12.0, 10.0, 5.0, 5.0));
}

// =============================================================================
// Test 2: TTL lifecycle
// =============================================================================

#[test]
fn test_integration_ttl_expiry_over_empty_batches() {
    let config = RegistryConfig::default();
    let default_ttl = config.default_ttl as i64;
    let tracker = Tracker::new(config).unwrap();

    tracker.ingest(&DetectionBatch::new(0, vec![det(0, 3, (0.0, 0.0, 1.0, 1.0), 0)]));

    // The creating batch ages the track once; default_ttl - 2 more keep it
    for t in 1..default_ttl - 1 {
        tracker.ingest(&DetectionBatch::empty(t));
        assert_eq!(tracker.snapshot(&QueryRequest::new(Selector::all(), t)).len(), 1);
    }

    tracker.ingest(&DetectionBatch::empty(default_ttl));
    assert!(tracker.snapshot(&QueryRequest::new(Selector::all(), default_ttl)).is_empty());
    assert!(tracker.is_empty());
}

#[test]
fn test_integration_regular_detections_keep_track_alive() {
    for policy in [TtlPolicy::Increment, TtlPolicy::Reset] {
        let config = RegistryConfig::new(2, 5000).with_ttl_policy(policy);
        let tracker = Tracker::new(config).unwrap();

        for frame in 0..30 {
            let t = frame * 33;
            let x = frame as f64 * 2.0;
            let report = tracker.ingest(&DetectionBatch::new(t, vec![det(1, 1, (x, 0.0, 8.0, 8.0), t)]));
            assert!(report.evicted.is_empty(), "{:?}: frame {} evicted", policy, frame);
        }

        let ttl = tracker.with_registry(|r| r.get(&TrackKey::new(1, 1)).unwrap().ttl);
        assert_eq!(ttl, 1, "{:?}", policy);
    }
}

#[test]
fn test_integration_increment_policy_accumulates_credit() {
    let increment = Tracker::new(RegistryConfig::new(2, 60_000)).unwrap();
    let reset =
        Tracker::new(RegistryConfig::new(2, 60_000).with_ttl_policy(TtlPolicy::Reset)).unwrap();

    // Three detections of the same object in one batch
    let burst = DetectionBatch::new(
        0,
        vec![
            det(1, 1, (0.0, 0.0, 1.0, 1.0), 0),
            det(1, 1, (0.0, 0.0, 1.0, 1.0), 0),
            det(1, 1, (0.0, 0.0, 1.0, 1.0), 0),
        ],
    );
    increment.ingest(&burst);
    reset.ingest(&burst);

    // increment: 2 + 1 + 1 - 1 = 3, reset: 2 - 1 = 1
    assert_eq!(increment.with_registry(|r| r.get(&TrackKey::new(1, 1)).unwrap().ttl), 3);
    assert_eq!(reset.with_registry(|r| r.get(&TrackKey::new(1, 1)).unwrap().ttl), 1);

    let evicted = reset.ingest(&DetectionBatch::empty(10)).evicted;
    assert_eq!(evicted, vec![TrackKey::new(1, 1)]);
    assert!(increment.ingest(&DetectionBatch::empty(10)).evicted.is_empty());
}

// =============================================================================
// Test 3: Idle timeout
// =============================================================================

#[test]
fn test_integration_idle_track_hidden_before_sweep() {
    let tracker = Tracker::new(RegistryConfig::new(1000, 500)).unwrap();
    tracker.ingest(&DetectionBatch::new(0, vec![det(1, 1, (0.0, 0.0, 1.0, 1.0), 0)]));
    tracker.ingest(&DetectionBatch::new(400, vec![det(1, 2, (0.0, 0.0, 1.0, 1.0), 400)]));

    let request = QueryRequest::new(Selector::all(), 600);
    assert_eq!(keys(&tracker.predict(&request)), HashSet::from([TrackKey::new(1, 2)]));
    assert_eq!(keys(&tracker.snapshot(&request)), HashSet::from([TrackKey::new(1, 2)]));
    assert_eq!(tracker.len(), 2);

    let report = tracker.ingest(&DetectionBatch::empty(600));
    assert_eq!(report.evicted, vec![TrackKey::new(1, 1)]);
    assert_eq!(tracker.len(), 1);
}

// =============================================================================
// Test 4: Query modes and sentinels
// =============================================================================

#[test]
fn test_integration_query_modes() {
    let tracker = Tracker::new(RegistryConfig::default()).unwrap();
    tracker.ingest(&DetectionBatch::new(
        0,
        vec![
            det(1, 1, (0.0, 0.0, 1.0, 1.0), 0),
            det(1, 2, (5.0, 0.0, 1.0, 1.0), 0),
            det(2, 1, (9.0, 0.0, 1.0, 1.0), 0),
        ],
    ));

    let all = tracker.predict(&QueryRequest::from_sentinels(-1, -1, 0));
    assert_eq!(all.len(), 3);

    let class_one = tracker.predict(&QueryRequest::from_sentinels(1, -1, 0));
    assert_eq!(
        keys(&class_one),
        HashSet::from([TrackKey::new(1, 1), TrackKey::new(1, 2)])
    );

    let exact = tracker.predict(&QueryRequest::from_sentinels(2, 1, 0));
    assert_eq!(exact.len(), 1);
    assert_eq!(exact[0].bbox.x, 9.0);

    let by_id = tracker.snapshot(&QueryRequest::from_sentinels(-1, 1, 0));
    assert_eq!(
        keys(&by_id),
        HashSet::from([TrackKey::new(1, 1), TrackKey::new(2, 1)])
    );

    assert!(tracker.predict(&QueryRequest::from_sentinels(7, 7, 0)).is_empty());
}

// =============================================================================
// Test 5: Size clamping
// =============================================================================

#[test]
fn test_integration_predicted_size_clamping() {
    let shrinking = |config: RegistryConfig| {
        let tracker = Tracker::new(config).unwrap();
        for (t, w) in [(0, 10.0), (100, 5.0), (200, 0.0)] {
            tracker.ingest(&DetectionBatch::new(t, vec![det(1, 1, (0.0, 0.0, w, w), t)]));
        }
        tracker.predict(&QueryRequest::new(Selector::exact(1, 1), 2200))[0].bbox
    };

    let clamped = shrinking(RegistryConfig::default());
    assert_eq!(clamped.width, 0.0);
    assert_eq!(clamped.height, 0.0);

    let mut legacy = RegistryConfig::default();
    legacy.clamp_predicted_size = false;
    let raw = shrinking(legacy);
    assert!(raw.width < 0.0, "width {}", raw.width);
    assert!(raw.height < 0.0, "height {}", raw.height);
}

// =============================================================================
// Test 6: Stream batching and malformed input
// =============================================================================

#[test]
fn test_integration_stream_with_malformed_detections() {
    let tracker = Tracker::with_estimator_factory(
        RegistryConfig::default(),
        Box::new(LastMeasurementEstimatorFactory::new()),
    )
    .unwrap();

    let stream = vec![
        det(1, 1, (0.0, 0.0, 2.0, 2.0), 0),
        det(1, 2, (0.0, 0.0, -2.0, 2.0), 0),
        det(-3, 2, (0.0, 0.0, 2.0, 2.0), 0),
        det(1, 1, (1.0, 0.0, 2.0, 2.0), 40),
        det(1, 3, (f64::NAN, 0.0, 2.0, 2.0), 40),
        det(1, 3, (4.0, 0.0, 2.0, 2.0), 80),
    ];

    let reports: Vec<_> = group_into_batches(stream)
        .iter()
        .map(|batch| tracker.ingest(batch))
        .collect();

    assert_eq!(reports.len(), 3);
    assert_eq!(reports[0].accepted(), 1);
    assert_eq!(reports[0].rejected.len(), 2);
    assert_eq!(reports[1].updated, vec![TrackKey::new(1, 1)]);
    assert_eq!(reports[1].rejected.len(), 1);
    assert_eq!(reports[2].created, vec![TrackKey::new(1, 3)]);

    let snap = tracker.snapshot(&QueryRequest::new(Selector::class(1), 80));
    assert_eq!(
        keys(&snap),
        HashSet::from([TrackKey::new(1, 1), TrackKey::new(1, 3)])
    );
}

// =============================================================================
// Test 7: Concurrent ingestion and queries
// =============================================================================

#[test]
fn test_integration_concurrent_ingest_and_query() {
    let tracker = Arc::new(Tracker::new(RegistryConfig::new(3, 60_000)).unwrap());

    let writer = {
        let tracker = Arc::clone(&tracker);
        thread::spawn(move || {
            for frame in 0..200i64 {
                let t = frame * 10;
                let detections = (0..10)
                    .map(|id| det(id % 2, id, (frame as f64, id as f64, 4.0, 4.0), t))
                    .collect();
                tracker.ingest(&DetectionBatch::new(t, detections));
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|worker| {
            let tracker = Arc::clone(&tracker);
            thread::spawn(move || {
                for i in 0..200i64 {
                    let request = QueryRequest::new(Selector::class(worker % 2), i * 10);
                    for tracked in tracker.predict(&request) {
                        assert_eq!(tracked.key.class_id, worker % 2);
                        assert!(tracked.bbox.width >= 0.0);
                    }
                }
            })
        })
        .collect();

    writer.join().expect("writer panicked");
    for reader in readers {
        reader.join().expect("reader panicked");
    }

    assert_eq!(tracker.len(), 10);
    let all = tracker.snapshot(&QueryRequest::new(Selector::all(), 1990));
    assert!(all.iter().all(|b| b.bbox.x == 199.0));
}

// =============================================================================
// Test 8: Observers
// =============================================================================

#[test]
fn test_integration_observers() {
    struct Shared(Arc<OverlayRecorder>);
    impl BatchObserver for Shared {
        fn on_batch(&self, view: &FrameView) {
            self.0.on_batch(view)
        }
    }

    let recorder = Arc::new(OverlayRecorder::new());
    let (channel, frames) = ChannelObserver::new(16);

    let mut tracker = Tracker::new(RegistryConfig::default()).unwrap();
    tracker.add_observer(Box::new(Shared(Arc::clone(&recorder))));
    tracker.add_observer(Box::new(channel));

    tracker.ingest(&DetectionBatch::new(0, vec![det(1, 1, (0.0, 0.0, 10.0, 10.0), 0)]));
    tracker.ingest(&DetectionBatch::new(100, vec![det(1, 1, (2.0, 0.0, 10.0, 10.0), 100)]));

    let overlay = recorder.latest().unwrap();
    assert_eq!(overlay.timestamp_ms, 100);
    assert_eq!(overlay.rects.len(), 2);
    assert_eq!(overlay.rects[0].kind, OverlayKind::Detection);
    assert_eq!(overlay.rects[0].top_left, (2.0, 0.0));
    assert_eq!(overlay.rects[1].kind, OverlayKind::Prediction);

    let received: Vec<FrameView> = frames.try_iter().collect();
    assert_eq!(received.len(), 2);
    assert_eq!(received[0].tracks[0].detection.x, 0.0);
    assert_eq!(received[1].tracks[0].detection.x, 2.0);

    // Observers do not change what queries see
    let snap = tracker.snapshot(&QueryRequest::new(Selector::all(), 100));
    assert_eq!(snap[0].bbox.x, 2.0);
}

// =============================================================================
// Test 9: Configuration file
// =============================================================================

#[test]
fn test_integration_config_from_json() {
    let config = RegistryConfig::from_json_str(
        r#"{
            "default_ttl": 2,
            "max_idle_ms": 250,
            "ttl_policy": "reset",
            "clamp_predicted_size": false
        }"#,
    )
    .unwrap();

    let tracker = Tracker::new(config).unwrap();
    assert_eq!(tracker.config().ttl_policy, TtlPolicy::Reset);
    assert!(!tracker.config().clamp_predicted_size);

    tracker.ingest(&DetectionBatch::new(0, vec![det(1, 1, (0.0, 0.0, 1.0, 1.0), 0)]));
    let report = tracker.ingest(&DetectionBatch::empty(300));
    assert_eq!(report.evicted, vec![TrackKey::new(1, 1)]);
}

// =============================================================================
// Test 10: Timestamps at the i64 bounds
// =============================================================================

#[test]
fn test_integration_extreme_timestamps() {
    let tracker = Tracker::new(RegistryConfig::default()).unwrap();
    tracker.ingest(&DetectionBatch::new(1000, vec![det(1, 1, (4.0, 6.0, 2.0, 2.0), 1000)]));

    // A query far in the past extrapolates by zero
    let past = tracker.predict(&QueryRequest::new(Selector::all(), i64::MIN));
    assert_eq!(past.len(), 1);
    assert_relative_eq!(past[0].bbox.x, 4.0, epsilon = 1e-9);
    assert_relative_eq!(past[0].bbox.y, 6.0, epsilon = 1e-9);

    // A query far in the future sees the track as idle
    assert!(tracker
        .snapshot(&QueryRequest::new(Selector::all(), i64::MAX))
        .is_empty());

    let tracker = Tracker::new(RegistryConfig::new(100, 5000)).unwrap();
    tracker.ingest(&DetectionBatch::new(-10, vec![det(1, 1, (0.0, 0.0, 2.0, 2.0), -10)]));
    tracker.ingest(&DetectionBatch::new(-10, vec![det(1, 2, (0.0, 0.0, 2.0, 2.0), -10)]));

    let report = tracker.ingest(&DetectionBatch::empty(i64::MAX));
    assert_eq!(report.evicted.len(), 2);
    assert!(tracker.is_empty());
}
