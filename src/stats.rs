// src/stats.rs
//
// Pure aggregation of accumulated dwell and queue-length state into the
// summary payload consumers chart and act on. Callable repeatedly against a
// growing tracker (live summaries) with the same result as a single
// end-of-run call over the same inputs.

use crate::occupancy::ZoneOccupancyTracker;
use serde::Serialize;
use std::collections::HashMap;

/// Summary statistics for one zone. Wait fields are `None` when no agent
/// passed the significance filter, never zero, so "no data" stays
/// distinguishable from "zero wait".
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneMetrics {
    pub avg_wait: Option<f64>,
    pub min_wait: Option<f64>,
    pub max_wait: Option<f64>,
    pub avg_queue_len: Option<f64>,
    pub max_queue_len: u32,
    pub num_people_measured: usize,
    pub total_people_tracked: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ZoneReport {
    pub zone_name: String,
    pub polygon_id: usize,
    pub metrics: ZoneMetrics,
    pub queue_timestamps: Vec<f64>,
    pub queue_lengths: Vec<u32>,
    pub wait_times: Vec<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub zones: Vec<ZoneReport>,
    /// Legacy unioned "inside ANY zone" figures, present only when
    /// `analysis.track_union` is enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global: Option<ZoneReport>,
    pub fps: f64,
    pub frame_count: u64,
    pub duration_sec: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_video_path: Option<String>,
}

/// Aggregate one zone's dwell map and queue series.
///
/// The filter boundary is inclusive: a dwell exactly at
/// `min_wait_sec_filter` is measured, strictly below is treated as
/// pass-through noise.
pub fn summarize_zone(
    time_in_zone: &HashMap<i64, f64>,
    queue_lengths: &[u32],
    min_wait_sec_filter: f64,
) -> (ZoneMetrics, Vec<f64>) {
    let mut wait_times: Vec<f64> = time_in_zone
        .values()
        .copied()
        .filter(|&t| t >= min_wait_sec_filter)
        .collect();
    wait_times.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let (avg_wait, min_wait, max_wait) = if wait_times.is_empty() {
        (None, None, None)
    } else {
        let sum: f64 = wait_times.iter().sum();
        (
            Some(sum / wait_times.len() as f64),
            Some(wait_times[0]),
            Some(wait_times[wait_times.len() - 1]),
        )
    };

    let avg_queue_len = if queue_lengths.is_empty() {
        None
    } else {
        let sum: u64 = queue_lengths.iter().map(|&q| q as u64).sum();
        Some(sum as f64 / queue_lengths.len() as f64)
    };
    let max_queue_len = queue_lengths.iter().copied().max().unwrap_or(0);

    let metrics = ZoneMetrics {
        avg_wait,
        min_wait,
        max_wait,
        avg_queue_len,
        max_queue_len,
        num_people_measured: wait_times.len(),
        total_people_tracked: time_in_zone.len(),
    };
    (metrics, wait_times)
}

/// Build the full per-zone report from a tracker's accumulated state.
pub fn build_report(
    tracker: &ZoneOccupancyTracker,
    min_wait_sec_filter: f64,
    fps: f64,
    output_video_path: Option<String>,
) -> AnalysisReport {
    let timestamps = tracker.timestamps().to_vec();

    let zones = tracker
        .zones()
        .iter()
        .map(|zone| {
            let (metrics, wait_times) = summarize_zone(
                tracker.dwell().zone_map(zone.index),
                tracker.queue_lengths(zone.index),
                min_wait_sec_filter,
            );
            ZoneReport {
                zone_name: zone.name.clone(),
                polygon_id: zone.index,
                metrics,
                queue_timestamps: timestamps.clone(),
                queue_lengths: tracker.queue_lengths(zone.index).to_vec(),
                wait_times,
            }
        })
        .collect();

    let global = tracker.union_state().map(|(times, lengths)| {
        let (metrics, wait_times) = summarize_zone(times, lengths, min_wait_sec_filter);
        ZoneReport {
            zone_name: "ALL_ZONES".to_string(),
            polygon_id: 0,
            metrics,
            queue_timestamps: timestamps.clone(),
            queue_lengths: lengths.to_vec(),
            wait_times,
        }
    });

    let frame_count = tracker.frames_processed();
    AnalysisReport {
        zones,
        global,
        fps,
        frame_count,
        duration_sec: if fps > 0.0 {
            frame_count as f64 / fps
        } else {
            0.0
        },
        output_video_path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;
    use crate::occupancy::ZoneOccupancyTracker;
    use crate::types::AgentObservation;
    use crate::zones::Zone;

    fn map(entries: &[(i64, f64)]) -> HashMap<i64, f64> {
        entries.iter().copied().collect()
    }

    #[test]
    fn test_filter_boundary_is_inclusive() {
        let times = map(&[(1, 1.0), (2, 0.999)]);
        let (metrics, waits) = summarize_zone(&times, &[], 1.0);
        assert_eq!(waits, vec![1.0]);
        assert_eq!(metrics.num_people_measured, 1);
        assert_eq!(metrics.total_people_tracked, 2);
    }

    #[test]
    fn test_empty_waits_are_unavailable_not_zero() {
        let times = map(&[(1, 0.3)]);
        let (metrics, _) = summarize_zone(&times, &[0, 0], 1.0);
        assert_eq!(metrics.avg_wait, None);
        assert_eq!(metrics.min_wait, None);
        assert_eq!(metrics.max_wait, None);
        assert_eq!(metrics.num_people_measured, 0);
        assert_eq!(metrics.total_people_tracked, 1);
    }

    #[test]
    fn test_queue_stats_include_zero_frames_and_empty_default() {
        let (metrics, _) = summarize_zone(&map(&[]), &[2, 0, 4, 0], 1.0);
        assert_eq!(metrics.avg_queue_len, Some(1.5));
        assert_eq!(metrics.max_queue_len, 4);

        let (empty, _) = summarize_zone(&map(&[]), &[], 1.0);
        assert_eq!(empty.avg_queue_len, None);
        assert_eq!(empty.max_queue_len, 0);
    }

    #[test]
    fn test_aggregation_is_idempotent() {
        let times = map(&[(1, 2.5), (2, 1.0), (3, 0.2)]);
        let series = [1u32, 2, 2, 1];
        let first = summarize_zone(&times, &series, 1.0);
        let second = summarize_zone(&times, &series, 1.0);
        assert_eq!(first.0, second.0);
        assert_eq!(first.1, second.1);
    }

    fn unit_square_zone() -> Zone {
        Zone::new(
            "A",
            0,
            vec![
                Point::new(0.0, 0.0),
                Point::new(10.0, 0.0),
                Point::new(10.0, 10.0),
                Point::new(0.0, 10.0),
            ],
        )
        .unwrap()
    }

    fn center_agent() -> AgentObservation {
        AgentObservation {
            track_id: Some(1),
            bbox: [4.0, 4.0, 6.0, 6.0],
        }
    }

    #[test]
    fn test_scenario_thirty_frames_at_thirty_fps() {
        // Agent at (5,5) for frames 1..=30 at fps=30, filter 0.5s
        let mut tracker = ZoneOccupancyTracker::new(vec![unit_square_zone()], false);
        let fps = 30.0;
        for i in 1..=30 {
            tracker.observe_frame(i as f64 / fps, 1.0 / fps, &[center_agent()]);
        }
        let report = build_report(&tracker, 0.5, fps, None);
        let zone = &report.zones[0];
        assert!((zone.metrics.avg_wait.unwrap() - 1.0).abs() < 1e-9);
        assert_eq!(zone.metrics.num_people_measured, 1);
        assert_eq!(zone.queue_lengths, vec![1u32; 30]);
        assert_eq!(report.frame_count, 30);
    }

    #[test]
    fn test_scenario_short_dwell_filtered_out() {
        // 10 frames at fps=30 -> 0.333s dwell, below the 1.0s filter
        let mut tracker = ZoneOccupancyTracker::new(vec![unit_square_zone()], false);
        let fps = 30.0;
        for i in 1..=10 {
            tracker.observe_frame(i as f64 / fps, 1.0 / fps, &[center_agent()]);
        }
        let report = build_report(&tracker, 1.0, fps, None);
        let zone = &report.zones[0];
        assert!(zone.wait_times.is_empty());
        assert_eq!(zone.metrics.avg_wait, None);
        assert_eq!(zone.metrics.total_people_tracked, 1);
        assert_eq!(zone.metrics.num_people_measured, 0);
    }
}
