// src/dwell.rs
//
// Per-agent, per-zone elapsed-time accumulators driven by the pipeline's
// frame clock. One map per zone ordinal, keyed by tracker id. Lifetime
// counters are never reset: an agent that exits and re-enters keeps
// accumulating, so dwell time is total time-in-zone across visits. A
// parallel set of per-visit counters backs the current-visit wait policy.

use std::collections::{HashMap, HashSet};

#[derive(Debug)]
pub struct DwellTimer {
    lifetime: Vec<HashMap<i64, f64>>,
    visit: Vec<HashMap<i64, f64>>,
}

impl DwellTimer {
    pub fn new(num_zones: usize) -> Self {
        Self {
            lifetime: vec![HashMap::new(); num_zones],
            visit: vec![HashMap::new(); num_zones],
        }
    }

    /// Advance one zone's timers by `dt` seconds for every present agent.
    /// Agents absent this tick keep their lifetime total but lose their
    /// current-visit counter.
    pub fn tick(&mut self, dt: f64, zone_index: usize, present: &HashSet<i64>) {
        for &tid in present {
            *self.lifetime[zone_index].entry(tid).or_insert(0.0) += dt;
            *self.visit[zone_index].entry(tid).or_insert(0.0) += dt;
        }
        self.visit[zone_index].retain(|tid, _| present.contains(tid));
    }

    /// Total accumulated seconds for one agent in one zone, across visits.
    pub fn lifetime_seconds(&self, zone_index: usize, track_id: i64) -> f64 {
        self.lifetime[zone_index]
            .get(&track_id)
            .copied()
            .unwrap_or(0.0)
    }

    /// Seconds of the agent's current uninterrupted visit, 0 if absent.
    pub fn visit_seconds(&self, zone_index: usize, track_id: i64) -> f64 {
        self.visit[zone_index].get(&track_id).copied().unwrap_or(0.0)
    }

    /// The full lifetime map for one zone, for aggregation.
    pub fn zone_map(&self, zone_index: usize) -> &HashMap<i64, f64> {
        &self.lifetime[zone_index]
    }

    pub fn num_zones(&self) -> usize {
        self.lifetime.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ids: &[i64]) -> HashSet<i64> {
        ids.iter().copied().collect()
    }

    #[test]
    fn test_contiguous_run_accumulates_k_over_f() {
        // 30 frames at 30 fps -> exactly 1.0s
        let mut timer = DwellTimer::new(1);
        let dt = 1.0 / 30.0;
        for _ in 0..30 {
            timer.tick(dt, 0, &set(&[7]));
        }
        assert!((timer.lifetime_seconds(0, 7) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_absent_agent_not_advanced_and_not_reset() {
        let mut timer = DwellTimer::new(1);
        timer.tick(0.5, 0, &set(&[1]));
        timer.tick(0.5, 0, &set(&[])); // agent left
        assert_eq!(timer.lifetime_seconds(0, 1), 0.5);
        timer.tick(0.5, 0, &set(&[1])); // re-entered
        assert_eq!(timer.lifetime_seconds(0, 1), 1.0);
    }

    #[test]
    fn test_visit_counter_resets_on_exit() {
        let mut timer = DwellTimer::new(1);
        timer.tick(0.5, 0, &set(&[1]));
        timer.tick(0.5, 0, &set(&[1]));
        assert_eq!(timer.visit_seconds(0, 1), 1.0);
        timer.tick(0.5, 0, &set(&[]));
        assert_eq!(timer.visit_seconds(0, 1), 0.0);
        timer.tick(0.5, 0, &set(&[1]));
        assert_eq!(timer.visit_seconds(0, 1), 0.5);
        // Lifetime keeps the full total
        assert_eq!(timer.lifetime_seconds(0, 1), 1.5);
    }

    #[test]
    fn test_zones_are_independent() {
        let mut timer = DwellTimer::new(2);
        let dt = 0.2;
        for _ in 0..5 {
            timer.tick(dt, 0, &set(&[1]));
            timer.tick(dt, 1, &set(&[1]));
        }
        assert!((timer.lifetime_seconds(0, 1) - 1.0).abs() < 1e-9);
        assert!((timer.lifetime_seconds(1, 1) - 1.0).abs() < 1e-9);
    }
}
