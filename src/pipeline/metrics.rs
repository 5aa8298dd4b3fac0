// src/pipeline/metrics.rs
//
// Production observability. Tracks timing, counts, and rates
// for both the batch and live pipelines. Export via logs.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct PipelineMetrics {
    pub total_frames: Arc<AtomicU64>,
    pub people_observed: Arc<AtomicU64>,
    pub frames_annotated: Arc<AtomicU64>,
    pub snapshots_emitted: Arc<AtomicU64>,
    pub api_successes: Arc<AtomicU64>,
    pub api_failures: Arc<AtomicU64>,
    pub detect_time_us: Arc<AtomicU64>,
    pub started_at: Instant,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            total_frames: Arc::new(AtomicU64::new(0)),
            people_observed: Arc::new(AtomicU64::new(0)),
            frames_annotated: Arc::new(AtomicU64::new(0)),
            snapshots_emitted: Arc::new(AtomicU64::new(0)),
            api_successes: Arc::new(AtomicU64::new(0)),
            api_failures: Arc::new(AtomicU64::new(0)),
            detect_time_us: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }

    pub fn inc(&self, counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn set_timing(&self, counter: &AtomicU64, duration_us: u64) {
        counter.store(duration_us, Ordering::Relaxed);
    }

    /// Measured throughput since construction, not the container fps.
    pub fn fps(&self) -> f64 {
        let frames = self.total_frames.load(Ordering::Relaxed);
        let elapsed = self.started_at.elapsed().as_secs_f64();
        if elapsed > 0.01 {
            frames as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_frames: self.total_frames.load(Ordering::Relaxed),
            fps: self.fps(),
            people_observed: self.people_observed.load(Ordering::Relaxed),
            frames_annotated: self.frames_annotated.load(Ordering::Relaxed),
            snapshots_emitted: self.snapshots_emitted.load(Ordering::Relaxed),
            api_successes: self.api_successes.load(Ordering::Relaxed),
            api_failures: self.api_failures.load(Ordering::Relaxed),
            avg_detect_us: self.detect_time_us.load(Ordering::Relaxed),
            elapsed_secs: self.started_at.elapsed().as_secs_f64(),
        }
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSummary {
    pub total_frames: u64,
    pub fps: f64,
    pub people_observed: u64,
    pub frames_annotated: u64,
    pub snapshots_emitted: u64,
    pub api_successes: u64,
    pub api_failures: u64,
    pub avg_detect_us: u64,
    pub elapsed_secs: f64,
}
