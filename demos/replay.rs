//! Replay a recorded detection stream through the tracker.
//!
//! Usage:
//!     cargo run --release --example replay <scenario.json> [config.json]
//!
//! The scenario lists timestamped detections and the queries to answer. The
//! output is one JSON document with the answers and run statistics.

use std::env;
use std::fs;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use objtrack_rs::observer::ChannelObserver;
use objtrack_rs::{
    group_into_batches, Detection, QueryRequest, RegistryConfig, TrackedBox, Tracker,
};

#[derive(Debug, Deserialize)]
struct QueryData {
    #[serde(default = "unspecified")]
    class_id: i32,
    #[serde(default = "unspecified")]
    object_id: i32,
    stamp_ms: i64,
    #[serde(default)]
    raw: bool,
}

fn unspecified() -> i32 {
    objtrack_rs::query::UNSPECIFIED
}

#[derive(Debug, Deserialize)]
struct Scenario {
    detections: Vec<Detection>,
    #[serde(default)]
    queries: Vec<QueryData>,
}

#[derive(Debug, Serialize)]
struct Answer {
    stamp_ms: i64,
    raw: bool,
    boxes: Vec<TrackedBox>,
}

#[derive(Debug, Serialize)]
struct Results {
    num_batches: usize,
    total_detections: usize,
    rejected_detections: usize,
    evicted_tracks: usize,
    observed_frames: usize,
    remaining_tracks: usize,
    elapsed_seconds: f64,
    answers: Vec<Answer>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().collect();
    let scenario_path = args.get(1).ok_or("usage: replay <scenario.json> [config.json]")?;
    let config = match args.get(2) {
        Some(path) => RegistryConfig::from_json_file(path)?,
        None => RegistryConfig::default(),
    };

    let scenario: Scenario = serde_json::from_str(&fs::read_to_string(scenario_path)?)?;
    let total_detections = scenario.detections.len();
    let batches = group_into_batches(scenario.detections);

    let (observer, frames) = ChannelObserver::new(batches.len().max(1));
    let mut tracker = Tracker::new(config)?;
    tracker.add_observer(Box::new(observer));

    let start_time = Instant::now();
    let mut rejected_detections = 0;
    let mut evicted_tracks = 0;
    let mut queries = scenario.queries.iter().peekable();
    let mut answers = Vec::new();

    let mut answer = |tracker: &Tracker, q: &QueryData| {
        let request = QueryRequest::from_sentinels(q.class_id, q.object_id, q.stamp_ms);
        let boxes = if q.raw {
            tracker.snapshot(&request)
        } else {
            tracker.predict(&request)
        };
        answers.push(Answer {
            stamp_ms: q.stamp_ms,
            raw: q.raw,
            boxes,
        });
    };

    for batch in &batches {
        // Queries stamped before this batch see the registry as it was
        while let Some(q) = queries.next_if(|q| q.stamp_ms < batch.timestamp_ms) {
            answer(&tracker, q);
        }
        let report = tracker.ingest(batch);
        rejected_detections += report.rejected.len();
        evicted_tracks += report.evicted.len();
    }
    for q in queries {
        answer(&tracker, q);
    }

    let results = Results {
        num_batches: batches.len(),
        total_detections,
        rejected_detections,
        evicted_tracks,
        observed_frames: frames.try_iter().count(),
        remaining_tracks: tracker.len(),
        elapsed_seconds: start_time.elapsed().as_secs_f64(),
        answers,
    };

    println!("{}", serde_json::to_string_pretty(&results)?);

    tracker.shutdown();
    Ok(())
}
