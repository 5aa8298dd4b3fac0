// src/tracker.rs
//
// Greedy IoU tracker that turns per-frame person detections into stable
// agent identities. Ids persist for as long as a detection keeps matching;
// a track not seen for `retention_frames` is retired and its id is never
// reused within a session.

use crate::detector::{calculate_iou, Detection};
use crate::types::AgentObservation;
use std::collections::HashMap;
use tracing::debug;

const MATCH_IOU_THRESHOLD: f32 = 0.3;

#[derive(Debug, Clone)]
struct Track {
    bbox: [f32; 4],
    last_seen_frame: u64,
}

pub struct IouTracker {
    next_id: i64,
    tracks: HashMap<i64, Track>,
    retention_frames: u64,
}

impl IouTracker {
    pub fn new(retention_frames: u64) -> Self {
        Self {
            next_id: 1,
            tracks: HashMap::new(),
            retention_frames,
        }
    }

    /// Associate this frame's detections with existing tracks and return
    /// the observations zone logic consumes. Every returned observation
    /// carries an id; detections that spawn a new track get a fresh one.
    pub fn update(&mut self, detections: &[Detection], frame_id: u64) -> Vec<AgentObservation> {
        let mut observations = Vec::with_capacity(detections.len());
        let mut claimed: Vec<i64> = Vec::new();

        for det in detections {
            let mut best: Option<(i64, f32)> = None;
            for (&tid, track) in &self.tracks {
                if claimed.contains(&tid) {
                    continue;
                }
                let iou = calculate_iou(&track.bbox, &det.bbox);
                if iou > MATCH_IOU_THRESHOLD && best.map_or(true, |(_, b)| iou > b) {
                    best = Some((tid, iou));
                }
            }

            let tid = match best {
                Some((tid, _)) => {
                    if let Some(track) = self.tracks.get_mut(&tid) {
                        track.bbox = det.bbox;
                        track.last_seen_frame = frame_id;
                    }
                    tid
                }
                None => {
                    let tid = self.next_id;
                    self.next_id += 1;
                    self.tracks.insert(
                        tid,
                        Track {
                            bbox: det.bbox,
                            last_seen_frame: frame_id,
                        },
                    );
                    debug!("New track #{} at frame {}", tid, frame_id);
                    tid
                }
            };
            claimed.push(tid);

            observations.push(AgentObservation {
                track_id: Some(tid),
                bbox: det.bbox,
            });
        }

        let retention = self.retention_frames;
        self.tracks
            .retain(|_, track| frame_id.saturating_sub(track.last_seen_frame) < retention);

        observations
    }

    pub fn active_tracks(&self) -> usize {
        self.tracks.len()
    }

    pub fn total_unique_tracks(&self) -> i64 {
        self.next_id - 1
    }
}
