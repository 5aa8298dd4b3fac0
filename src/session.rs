// src/session.rs
//
// Registry for everything with a lifetime longer than one request: stored
// videos, finished analysis reports, and running live streams. One manager
// instance owns all session state; nothing here is process-global.

use crate::stats::AnalysisReport;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone)]
pub struct VideoEntry {
    pub id: String,
    pub path: PathBuf,
    pub original_name: String,
}

/// Control handle kept for each running live stream. The stream itself is
/// owned by its driving task; the manager only holds the stop flag.
#[derive(Debug, Clone)]
pub struct StreamHandle {
    pub id: String,
    stop: Arc<AtomicBool>,
}

impl StreamHandle {
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }
}

#[derive(Default)]
pub struct SessionManager {
    videos: HashMap<String, VideoEntry>,
    reports: HashMap<String, AnalysisReport>,
    streams: HashMap<String, StreamHandle>,
    next_id: u64,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn fresh_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    pub fn register_video(&mut self, path: PathBuf, original_name: &str) -> String {
        let id = self.fresh_id("video");
        info!("Registered video {} as {}", original_name, id);
        self.videos.insert(
            id.clone(),
            VideoEntry {
                id: id.clone(),
                path,
                original_name: original_name.to_string(),
            },
        );
        id
    }

    pub fn video(&self, id: &str) -> Option<&VideoEntry> {
        self.videos.get(id)
    }

    /// Remove a video entry. Removing an unknown or already-removed id is a
    /// no-op, reported through the return value.
    pub fn remove_video(&mut self, id: &str) -> bool {
        self.videos.remove(id).is_some()
    }

    pub fn store_report(&mut self, video_id: &str, report: AnalysisReport) {
        self.reports.insert(video_id.to_string(), report);
    }

    pub fn report(&self, video_id: &str) -> Option<&AnalysisReport> {
        self.reports.get(video_id)
    }

    /// Register a live stream and hand out its id. The returned handle's
    /// stop flag is shared with the stream's driving loop.
    pub fn register_stream(&mut self, stop: Arc<AtomicBool>) -> StreamHandle {
        let id = self.fresh_id("stream");
        let handle = StreamHandle {
            id: id.clone(),
            stop,
        };
        self.streams.insert(id, handle.clone());
        handle
    }

    pub fn stream(&self, id: &str) -> Option<&StreamHandle> {
        self.streams.get(id)
    }

    /// Stop and deregister a stream. Idempotent: a second call for the same
    /// id returns false and changes nothing.
    pub fn stop_stream(&mut self, id: &str) -> bool {
        match self.streams.remove(id) {
            Some(handle) => {
                handle.stop();
                info!("Stopped stream {}", id);
                true
            }
            None => false,
        }
    }

    pub fn active_streams(&self) -> usize {
        self.streams.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_ids_are_unique() {
        let mut mgr = SessionManager::new();
        let a = mgr.register_video(PathBuf::from("/tmp/a.mp4"), "a.mp4");
        let b = mgr.register_video(PathBuf::from("/tmp/b.mp4"), "b.mp4");
        assert_ne!(a, b);
        assert_eq!(mgr.video(&a).unwrap().original_name, "a.mp4");
    }

    #[test]
    fn test_remove_video_is_idempotent() {
        let mut mgr = SessionManager::new();
        let id = mgr.register_video(PathBuf::from("/tmp/a.mp4"), "a.mp4");
        assert!(mgr.remove_video(&id));
        assert!(!mgr.remove_video(&id));
        assert!(mgr.video(&id).is_none());
    }

    #[test]
    fn test_stop_stream_flips_shared_flag_once() {
        let mut mgr = SessionManager::new();
        let flag = Arc::new(AtomicBool::new(false));
        let handle = mgr.register_stream(Arc::clone(&flag));
        assert_eq!(mgr.active_streams(), 1);

        assert!(mgr.stop_stream(&handle.id));
        assert!(flag.load(Ordering::Relaxed));
        assert_eq!(mgr.active_streams(), 0);
        // Second stop for the same id is a harmless no-op
        assert!(!mgr.stop_stream(&handle.id));
    }

    #[test]
    fn test_sessions_do_not_share_state() {
        let mut a = SessionManager::new();
        let mut b = SessionManager::new();
        let id = a.register_video(PathBuf::from("/tmp/a.mp4"), "a.mp4");
        assert!(b.video(&id).is_none());
        b.register_video(PathBuf::from("/tmp/b.mp4"), "b.mp4");
        assert_eq!(a.videos.len(), 1);
        assert_eq!(b.videos.len(), 1);
    }
}
