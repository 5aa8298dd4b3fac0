// src/occupancy.rs
//
// Per-frame classification of tracked agents into zones. Owns the dwell
// timers and the per-zone queue-length series for one analysis or stream
// session; never shared across sessions.

use crate::dwell::DwellTimer;
use crate::geometry::Point;
use crate::types::AgentObservation;
use crate::zones::Zone;
use std::collections::{HashMap, HashSet};

/// Zone membership computed for a single frame. An agent may appear in
/// several zones at once when polygons overlap; membership is independent
/// per zone, never mutually exclusive.
#[derive(Debug)]
pub struct FrameOccupancy {
    pub inside_per_zone: Vec<HashSet<i64>>,
}

impl FrameOccupancy {
    pub fn count(&self, zone_index: usize) -> usize {
        self.inside_per_zone[zone_index].len()
    }
}

/// Legacy "inside ANY zone" accumulation, kept behind config because the
/// multi-zone path deliberately does not union membership.
#[derive(Debug, Default)]
struct UnionState {
    time_in_zone: HashMap<i64, f64>,
    queue_lengths: Vec<u32>,
}

pub struct ZoneOccupancyTracker {
    zones: Vec<Zone>,
    dwell: DwellTimer,
    queue_lengths: Vec<Vec<u32>>,
    timestamps: Vec<f64>,
    union: Option<UnionState>,
    frames_processed: u64,
}

impl ZoneOccupancyTracker {
    pub fn new(zones: Vec<Zone>, track_union: bool) -> Self {
        let n = zones.len();
        Self {
            zones,
            dwell: DwellTimer::new(n),
            queue_lengths: vec![Vec::new(); n],
            timestamps: Vec::new(),
            union: track_union.then(UnionState::default),
            frames_processed: 0,
        }
    }

    /// Classify one frame's observations and advance all per-zone state.
    ///
    /// `timestamp_sec` is frame_index/fps in batch mode and wall-clock
    /// elapsed time in live mode; `dt` is the matching frame interval.
    /// Observations without a tracker id are skipped. A frame with no usable
    /// observations records 0 for every zone and accrues no dwell.
    pub fn observe_frame(
        &mut self,
        timestamp_sec: f64,
        dt: f64,
        agents: &[AgentObservation],
    ) -> FrameOccupancy {
        self.frames_processed += 1;
        self.timestamps.push(timestamp_sec);

        let mut inside_per_zone: Vec<HashSet<i64>> =
            vec![HashSet::new(); self.zones.len()];
        let mut inside_any: HashSet<i64> = HashSet::new();

        for agent in agents {
            let Some(tid) = agent.track_id else {
                continue;
            };
            let (cx, cy) = agent.centroid();
            let center = Point::new(cx, cy);
            for zone in &self.zones {
                if zone.contains(center) {
                    inside_per_zone[zone.index].insert(tid);
                    inside_any.insert(tid);
                }
            }
        }

        for zone_index in 0..self.zones.len() {
            self.dwell.tick(dt, zone_index, &inside_per_zone[zone_index]);
            self.queue_lengths[zone_index].push(inside_per_zone[zone_index].len() as u32);
        }

        if let Some(union) = self.union.as_mut() {
            for &tid in &inside_any {
                *union.time_in_zone.entry(tid).or_insert(0.0) += dt;
            }
            union.queue_lengths.push(inside_any.len() as u32);
        }

        FrameOccupancy { inside_per_zone }
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    pub fn dwell(&self) -> &DwellTimer {
        &self.dwell
    }

    pub fn queue_lengths(&self, zone_index: usize) -> &[u32] {
        &self.queue_lengths[zone_index]
    }

    pub fn timestamps(&self) -> &[f64] {
        &self.timestamps
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    /// Union dwell map and series, if `track_union` was enabled.
    pub fn union_state(&self) -> Option<(&HashMap<i64, f64>, &[u32])> {
        self.union
            .as_ref()
            .map(|u| (&u.time_in_zone, u.queue_lengths.as_slice()))
    }
}
