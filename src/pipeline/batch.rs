// src/pipeline/batch.rs
//
// Offline analysis of one recorded video: drain the frame source at a
// fixed timeline (frame_index / fps), accumulate zone state, and aggregate
// into a report. Resources are released whether the loop finishes or fails.

use crate::annotate::{self, ZoneOverlay};
use crate::occupancy::ZoneOccupancyTracker;
use crate::pipeline::metrics::PipelineMetrics;
use crate::source::TrackedFrameSource;
use crate::stats::{self, AnalysisReport};
use crate::types::AnalysisConfig;
use crate::video::AnnotatedWriter;
use crate::zones::Zone;
use anyhow::Result;
use tracing::{debug, info};

pub fn run_batch<S: TrackedFrameSource>(
    source: &mut S,
    zones: Vec<Zone>,
    analysis: &AnalysisConfig,
    mut writer: Option<AnnotatedWriter>,
    metrics: &PipelineMetrics,
) -> Result<AnalysisReport> {
    let fps = effective_fps(source.fps());
    let mut tracker = ZoneOccupancyTracker::new(zones, analysis.track_union);

    let loop_result = process_all(source, &mut tracker, analysis, writer.as_mut(), metrics);

    // Release on both paths before surfacing any error
    source.release()?;
    let output_video_path = match writer.as_mut() {
        Some(w) => {
            w.release()?;
            Some(w.path.display().to_string())
        }
        None => None,
    };
    loop_result?;

    let report = stats::build_report(
        &tracker,
        analysis.min_wait_sec_filter,
        fps,
        output_video_path,
    );
    info!(
        "Batch analysis complete: {} frames, {:.1}s of footage",
        report.frame_count, report.duration_sec
    );
    Ok(report)
}

fn effective_fps(fps: f64) -> f64 {
    if fps > 0.0 {
        fps
    } else {
        crate::video::DEFAULT_FPS
    }
}

fn process_all<S: TrackedFrameSource>(
    source: &mut S,
    tracker: &mut ZoneOccupancyTracker,
    analysis: &AnalysisConfig,
    mut writer: Option<&mut AnnotatedWriter>,
    metrics: &PipelineMetrics,
) -> Result<()> {
    let fps = effective_fps(source.fps());
    let dt = 1.0 / fps;
    let stride = analysis.sample_stride.max(1);

    while let Some(tracked) = source.next_tracked()? {
        let timestamp_sec = tracked.frame_id as f64 / fps;
        let occupancy = tracker.observe_frame(timestamp_sec, dt, &tracked.agents);

        metrics.inc(&metrics.total_frames);
        metrics.add(&metrics.people_observed, tracked.agents.len() as u64);

        if let Some(w) = writer.as_mut() {
            if tracked.frame_id % stride == 0 && !tracked.frame.data.is_empty() {
                let overlays: Vec<ZoneOverlay> = tracker
                    .zones()
                    .iter()
                    .map(|zone| {
                        let (m, _) = stats::summarize_zone(
                            tracker.dwell().zone_map(zone.index),
                            tracker.queue_lengths(zone.index),
                            analysis.min_wait_sec_filter,
                        );
                        ZoneOverlay::from_metrics(&m, occupancy.count(zone.index))
                    })
                    .collect();

                let mat = annotate::draw_frame(
                    &tracked.frame.data,
                    tracked.frame.height as i32,
                    tracker.zones(),
                    &overlays,
                    &tracked.agents,
                )?;
                w.write(&mat)?;
                metrics.inc(&metrics.frames_annotated);
            }
        }

        if tracked.frame_id % 300 == 0 {
            debug!(
                "Processed {} frames ({} people this frame)",
                tracked.frame_id,
                tracked.agents.len()
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;
    use crate::source::TrackedFrame;
    use crate::types::{AgentObservation, Frame};
    use anyhow::bail;
    use std::collections::VecDeque;

    /// Scripted source: a fixed sequence of per-frame observations with no
    /// pixel data, plus a release counter.
    struct ScriptedSource {
        frames: VecDeque<Vec<AgentObservation>>,
        fps: f64,
        next_id: u64,
        releases: usize,
        fail_at: Option<u64>,
    }

    impl ScriptedSource {
        fn new(frames: Vec<Vec<AgentObservation>>, fps: f64) -> Self {
            Self {
                frames: frames.into(),
                fps,
                next_id: 0,
                releases: 0,
                fail_at: None,
            }
        }
    }

    impl TrackedFrameSource for ScriptedSource {
        fn next_tracked(&mut self) -> Result<Option<TrackedFrame>> {
            let Some(agents) = self.frames.pop_front() else {
                return Ok(None);
            };
            self.next_id += 1;
            if self.fail_at == Some(self.next_id) {
                bail!("decode error at frame {}", self.next_id);
            }
            Ok(Some(TrackedFrame {
                frame_id: self.next_id,
                frame: Frame {
                    data: Vec::new(),
                    width: 100,
                    height: 100,
                    timestamp_ms: self.next_id as f64 / self.fps * 1000.0,
                },
                agents,
            }))
        }

        fn fps(&self) -> f64 {
            self.fps
        }

        fn dimensions(&self) -> (usize, usize) {
            (100, 100)
        }

        fn release(&mut self) -> Result<()> {
            self.releases += 1;
            Ok(())
        }
    }

    fn unit_zone() -> Zone {
        Zone::new(
            "Checkout",
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

    fn analysis(min_wait: f64) -> AnalysisConfig {
        AnalysisConfig {
            min_wait_sec_filter: min_wait,
            sample_stride: 1,
            track_union: false,
        }
    }

    #[test]
    fn test_batch_report_from_scripted_footage() {
        // 10 fps: agent 1 waits 20 frames (2.0s), frames 21..=25 are empty
        let mut script: Vec<Vec<AgentObservation>> = (0..20).map(|_| vec![agent(1)]).collect();
        script.extend((0..5).map(|_| Vec::new()));
        let mut source = ScriptedSource::new(script, 10.0);

        let metrics = PipelineMetrics::new();
        let report = run_batch(
            &mut source,
            vec![unit_zone()],
            &analysis(0.5),
            None,
            &metrics,
        )
        .unwrap();

        assert_eq!(report.frame_count, 25);
        assert!((report.duration_sec - 2.5).abs() < 1e-9);
        let zone = &report.zones[0];
        assert!((zone.metrics.avg_wait.unwrap() - 2.0).abs() < 1e-9);
        assert_eq!(zone.metrics.max_queue_len, 1);
        assert_eq!(zone.queue_lengths.len(), 25);
        assert_eq!(&zone.queue_lengths[20..], &[0, 0, 0, 0, 0]);
        assert_eq!(source.releases, 1);
    }

    #[test]
    fn test_source_released_when_loop_fails() {
        let script: Vec<Vec<AgentObservation>> = (0..10).map(|_| vec![agent(1)]).collect();
        let mut source = ScriptedSource::new(script, 10.0);
        source.fail_at = Some(3);

        let metrics = PipelineMetrics::new();
        let result = run_batch(
            &mut source,
            vec![unit_zone()],
            &analysis(0.5),
            None,
            &metrics,
        );

        assert!(result.is_err());
        assert_eq!(source.releases, 1);
    }

    #[test]
    fn test_zero_fps_falls_back_to_default() {
        let script: Vec<Vec<AgentObservation>> = (0..50).map(|_| vec![agent(1)]).collect();
        let mut source = ScriptedSource::new(script, 0.0);

        let metrics = PipelineMetrics::new();
        let report = run_batch(
            &mut source,
            vec![unit_zone()],
            &analysis(0.5),
            None,
            &metrics,
        )
        .unwrap();

        assert_eq!(report.fps, 25.0);
        assert!((report.duration_sec - 2.0).abs() < 1e-9);
        assert!((report.zones[0].metrics.avg_wait.unwrap() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_union_report_present_when_enabled() {
        let script: Vec<Vec<AgentObservation>> = (0..10).map(|_| vec![agent(1)]).collect();
        let mut source = ScriptedSource::new(script, 10.0);

        let mut cfg = analysis(0.5);
        cfg.track_union = true;
        let metrics = PipelineMetrics::new();
        let report = run_batch(&mut source, vec![unit_zone()], &cfg, None, &metrics).unwrap();

        let global = report.global.unwrap();
        assert_eq!(global.zone_name, "ALL_ZONES");
        assert_eq!(global.metrics.max_queue_len, 1);
    }
}
