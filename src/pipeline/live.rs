// src/pipeline/live.rs
//
// Live streaming over a looping source: wall-clock timing, throttled to
// `target_fps`, each frame emitted as a snapshot payload. The caller drives
// the loop (`next_snapshot`) so it can interleave delivery with shutdown
// signals; `stop_handle` flips the loop off from another task.

use crate::annotate::{self, ZoneOverlay};
use crate::occupancy::ZoneOccupancyTracker;
use crate::pipeline::metrics::PipelineMetrics;
use crate::source::TrackedFrameSource;
use crate::stats::{self, AnalysisReport};
use crate::types::{StreamConfig, WaitPolicy};
use crate::zones::Zone;
use anyhow::Result;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

#[derive(Debug, Clone, Serialize)]
pub struct ZoneSnapshot {
    pub name: String,
    pub current_count: usize,
    /// Mean wait of the people currently inside, per the configured wait
    /// policy. `None` when the zone is empty.
    pub avg_wait: Option<f64>,
    pub max_queue_len: u32,
    pub people_ids: Vec<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StreamFrame {
    pub frame_id: u64,
    pub timestamp_sec: f64,
    /// JPEG data URL of the annotated frame; absent for pixel-less sources.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotated_jpeg: Option<String>,
    pub zones: Vec<ZoneSnapshot>,
    pub measured_fps: f64,
}

pub struct LiveStream<S: TrackedFrameSource> {
    source: S,
    tracker: ZoneOccupancyTracker,
    wait_policy: WaitPolicy,
    min_wait_sec_filter: f64,
    target_interval: Duration,
    annotate: bool,
    started: Instant,
    last_frame_at: Option<Instant>,
    stop: Arc<AtomicBool>,
    released: bool,
    metrics: PipelineMetrics,
}

impl<S: TrackedFrameSource> LiveStream<S> {
    pub fn new(
        source: S,
        zones: Vec<Zone>,
        stream: &StreamConfig,
        min_wait_sec_filter: f64,
        annotate: bool,
    ) -> Self {
        let target_fps = if stream.target_fps > 0.0 {
            stream.target_fps
        } else {
            10.0
        };
        Self {
            source,
            tracker: ZoneOccupancyTracker::new(zones, false),
            wait_policy: stream.wait_policy,
            min_wait_sec_filter,
            target_interval: Duration::from_secs_f64(1.0 / target_fps),
            annotate,
            started: Instant::now(),
            last_frame_at: None,
            stop: Arc::new(AtomicBool::new(false)),
            released: false,
            metrics: PipelineMetrics::new(),
        }
    }

    /// Cloneable handle that stops the stream from another task.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    /// Produce the next throttled snapshot, or `None` once stopped or the
    /// source is exhausted. Dwell advances by observed wall-clock time, so
    /// a stalled consumer does not distort wait figures.
    pub async fn next_snapshot(&mut self) -> Result<Option<StreamFrame>> {
        if self.stop.load(Ordering::Relaxed) {
            return Ok(None);
        }

        tokio::time::sleep(self.target_interval).await;

        if self.stop.load(Ordering::Relaxed) {
            return Ok(None);
        }

        let Some(tracked) = self.source.next_tracked()? else {
            return Ok(None);
        };

        let now = Instant::now();
        let dt = match self.last_frame_at {
            Some(prev) => (now - prev).as_secs_f64(),
            None => self.target_interval.as_secs_f64(),
        };
        self.last_frame_at = Some(now);
        let timestamp_sec = self.started.elapsed().as_secs_f64();

        let occupancy = self
            .tracker
            .observe_frame(timestamp_sec, dt, &tracked.agents);

        self.metrics.inc(&self.metrics.total_frames);
        self.metrics
            .add(&self.metrics.people_observed, tracked.agents.len() as u64);

        let zones: Vec<ZoneSnapshot> = self
            .tracker
            .zones()
            .iter()
            .map(|zone| {
                let mut people_ids: Vec<i64> =
                    occupancy.inside_per_zone[zone.index].iter().copied().collect();
                people_ids.sort_unstable();

                let avg_wait = if people_ids.is_empty() {
                    None
                } else {
                    let total: f64 = people_ids
                        .iter()
                        .map(|&tid| match self.wait_policy {
                            WaitPolicy::Lifetime => {
                                self.tracker.dwell().lifetime_seconds(zone.index, tid)
                            }
                            WaitPolicy::CurrentVisit => {
                                self.tracker.dwell().visit_seconds(zone.index, tid)
                            }
                        })
                        .sum();
                    Some(total / people_ids.len() as f64)
                };

                ZoneSnapshot {
                    name: zone.name.clone(),
                    current_count: people_ids.len(),
                    avg_wait,
                    max_queue_len: self
                        .tracker
                        .queue_lengths(zone.index)
                        .iter()
                        .copied()
                        .max()
                        .unwrap_or(0),
                    people_ids,
                }
            })
            .collect();

        let annotated_jpeg = if self.annotate && !tracked.frame.data.is_empty() {
            let overlays: Vec<ZoneOverlay> = zones
                .iter()
                .map(|z| ZoneOverlay {
                    current_count: z.current_count,
                    avg_wait: z.avg_wait,
                })
                .collect();
            let mat = annotate::draw_frame(
                &tracked.frame.data,
                tracked.frame.height as i32,
                self.tracker.zones(),
                &overlays,
                &tracked.agents,
            )?;
            let jpeg = annotate::encode_jpeg(&mat)?;
            Some(annotate::jpeg_data_url(&jpeg))
        } else {
            None
        };

        self.metrics.inc(&self.metrics.snapshots_emitted);

        Ok(Some(StreamFrame {
            frame_id: tracked.frame_id,
            timestamp_sec,
            annotated_jpeg,
            zones,
            measured_fps: self.metrics.fps(),
        }))
    }

    /// Aggregate everything observed so far into a report, using the same
    /// aggregation as batch mode.
    pub fn summary(&self) -> AnalysisReport {
        stats::build_report(
            &self.tracker,
            self.min_wait_sec_filter,
            self.source.fps(),
            None,
        )
    }

    /// Stop the stream and release the source. Invoking this twice releases
    /// the capture exactly once.
    pub fn cleanup(&mut self) -> Result<()> {
        self.stop();
        if !self.released {
            self.source.release()?;
            self.released = true;
            info!("Live stream cleaned up");
        }
        Ok(())
    }
}

impl<S: TrackedFrameSource> Drop for LiveStream<S> {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;
    use crate::source::TrackedFrame;
    use crate::types::{AgentObservation, Frame};
    use std::collections::VecDeque;

    struct ScriptedSource {
        frames: VecDeque<Vec<AgentObservation>>,
        next_id: u64,
        releases: usize,
    }

    impl ScriptedSource {
        fn new(frames: Vec<Vec<AgentObservation>>) -> Self {
            Self {
                frames: frames.into(),
                next_id: 0,
                releases: 0,
            }
        }
    }

    impl TrackedFrameSource for ScriptedSource {
        fn next_tracked(&mut self) -> Result<Option<TrackedFrame>> {
            let Some(agents) = self.frames.pop_front() else {
                return Ok(None);
            };
            self.next_id += 1;
            Ok(Some(TrackedFrame {
                frame_id: self.next_id,
                frame: Frame {
                    data: Vec::new(),
                    width: 100,
                    height: 100,
                    timestamp_ms: 0.0,
                },
                agents,
            }))
        }

        fn fps(&self) -> f64 {
            25.0
        }

        fn dimensions(&self) -> (usize, usize) {
            (100, 100)
        }

        fn release(&mut self) -> Result<()> {
            self.releases += 1;
            Ok(())
        }
    }

    fn zone() -> Zone {
        Zone::new(
            "Entrance",
            0,
            vec![
                Point::new(0.0, 0.0),
                Point::new(50.0, 0.0),
                Point::new(50.0, 50.0),
                Point::new(0.0, 50.0),
            ],
        )
        .unwrap()
    }

    fn agent(tid: i64) -> AgentObservation {
        AgentObservation {
            track_id: Some(tid),
            bbox: [20.0, 20.0, 30.0, 30.0],
        }
    }

    fn stream_config(target_fps: f64, policy: WaitPolicy) -> StreamConfig {
        StreamConfig {
            enabled: true,
            target_fps,
            wait_policy: policy,
            camera: None,
        }
    }

    #[tokio::test]
    async fn test_snapshot_reports_current_occupants() {
        let source = ScriptedSource::new(vec![vec![agent(1), agent(2)], vec![agent(1)]]);
        let mut stream = LiveStream::new(
            source,
            vec![zone()],
            &stream_config(100.0, WaitPolicy::Lifetime),
            0.0,
            false,
        );

        let first = stream.next_snapshot().await.unwrap().unwrap();
        assert_eq!(first.zones[0].current_count, 2);
        assert_eq!(first.zones[0].people_ids, vec![1, 2]);
        assert!(first.zones[0].avg_wait.is_some());

        let second = stream.next_snapshot().await.unwrap().unwrap();
        assert_eq!(second.zones[0].current_count, 1);
        assert_eq!(second.zones[0].max_queue_len, 2);
    }

    #[tokio::test]
    async fn test_empty_zone_has_no_wait_figure() {
        let source = ScriptedSource::new(vec![Vec::new()]);
        let mut stream = LiveStream::new(
            source,
            vec![zone()],
            &stream_config(100.0, WaitPolicy::Lifetime),
            0.0,
            false,
        );
        let frame = stream.next_snapshot().await.unwrap().unwrap();
        assert_eq!(frame.zones[0].current_count, 0);
        assert_eq!(frame.zones[0].avg_wait, None);
    }

    #[tokio::test]
    async fn test_throttle_spaces_snapshots() {
        let source = ScriptedSource::new(vec![vec![agent(1)], vec![agent(1)]]);
        let mut stream = LiveStream::new(
            source,
            vec![zone()],
            &stream_config(50.0, WaitPolicy::Lifetime),
            0.0,
            false,
        );

        let start = Instant::now();
        stream.next_snapshot().await.unwrap().unwrap();
        stream.next_snapshot().await.unwrap().unwrap();
        // Two frames at 50 fps cannot arrive in under 2 * 20ms
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[tokio::test]
    async fn test_stop_ends_stream() {
        let source = ScriptedSource::new(vec![vec![agent(1)]; 100]);
        let mut stream = LiveStream::new(
            source,
            vec![zone()],
            &stream_config(100.0, WaitPolicy::Lifetime),
            0.0,
            false,
        );

        stream.next_snapshot().await.unwrap().unwrap();
        stream.stop_handle().store(true, Ordering::Relaxed);
        assert!(stream.next_snapshot().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cleanup_releases_exactly_once() {
        let source = ScriptedSource::new(vec![vec![agent(1)]]);
        let mut stream = LiveStream::new(
            source,
            vec![zone()],
            &stream_config(100.0, WaitPolicy::Lifetime),
            0.0,
            false,
        );
        stream.next_snapshot().await.unwrap();

        stream.cleanup().unwrap();
        stream.cleanup().unwrap();
        assert_eq!(stream.source.releases, 1);
        // Drop must not release again either
    }

    #[tokio::test]
    async fn test_current_visit_policy_resets_on_exit() {
        // Present, absent, present again: the current-visit figure at the
        // final frame covers only the return, while the summary's lifetime
        // total for the same run also includes the first visit.
        let script = vec![vec![agent(1)], vec![agent(1)], Vec::new(), vec![agent(1)]];
        let source = ScriptedSource::new(script);
        let mut stream = LiveStream::new(
            source,
            vec![zone()],
            &stream_config(200.0, WaitPolicy::CurrentVisit),
            0.0,
            false,
        );
        let mut last_visit = None;
        while let Some(frame) = stream.next_snapshot().await.unwrap() {
            last_visit = frame.zones[0].avg_wait.or(last_visit);
        }

        let lifetime_total = stream.summary().zones[0].wait_times[0];
        assert!(last_visit.unwrap() < lifetime_total);
    }

    #[tokio::test]
    async fn test_summary_matches_batch_aggregation() {
        let source = ScriptedSource::new(vec![vec![agent(1)]; 5]);
        let mut stream = LiveStream::new(
            source,
            vec![zone()],
            &stream_config(200.0, WaitPolicy::Lifetime),
            0.0,
            false,
        );
        while stream.next_snapshot().await.unwrap().is_some() {}

        let report = stream.summary();
        assert_eq!(report.frame_count, 5);
        assert_eq!(report.zones[0].metrics.total_people_tracked, 1);
        assert!(report.zones[0].metrics.avg_wait.unwrap() > 0.0);
    }
}
