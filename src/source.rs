// src/source.rs

use crate::detector::PersonDetector;
use crate::tracker::IouTracker;
use crate::types::{AgentObservation, Frame};
use crate::video::VideoReader;
use anyhow::Result;
use tracing::info;

/// One decoded frame with its tracked people, ready for zone logic.
#[derive(Debug)]
pub struct TrackedFrame {
    pub frame_id: u64,
    pub frame: Frame,
    pub agents: Vec<AgentObservation>,
}

/// Pull-based supply of tracked frames. The batch and live pipelines both
/// consume this, differing only in pacing and termination; tests substitute
/// synthetic sources so zone and timing logic runs without video or a model.
pub trait TrackedFrameSource {
    /// Next frame, or `None` when the source is exhausted.
    fn next_tracked(&mut self) -> Result<Option<TrackedFrame>>;

    fn fps(&self) -> f64;

    fn dimensions(&self) -> (usize, usize);

    /// Release underlying resources. Must be safe to call more than once.
    fn release(&mut self) -> Result<()>;
}

/// Production source: video decode + ONNX person detection + IoU tracking.
/// With `looping` set, end-of-file rewinds to frame 0 so a finite file acts
/// as an endless camera feed.
pub struct DetectorSource {
    reader: VideoReader,
    detector: PersonDetector,
    tracker: IouTracker,
    confidence_threshold: f32,
    looping: bool,
    frame_id: u64,
}

impl DetectorSource {
    pub fn new(
        reader: VideoReader,
        detector: PersonDetector,
        tracker: IouTracker,
        confidence_threshold: f32,
        looping: bool,
    ) -> Self {
        Self {
            reader,
            detector,
            tracker,
            confidence_threshold,
            looping,
            frame_id: 0,
        }
    }

    pub fn total_frames(&self) -> i32 {
        self.reader.total_frames
    }

    pub fn progress(&self) -> f32 {
        self.reader.progress()
    }

    pub fn total_unique_tracks(&self) -> i64 {
        self.tracker.total_unique_tracks()
    }

    fn read_next(&mut self) -> Result<Option<Frame>> {
        if let Some(frame) = self.reader.read_frame()? {
            return Ok(Some(frame));
        }
        if !self.looping {
            return Ok(None);
        }
        info!("End of file reached, looping back to start");
        self.reader.seek_to_start()?;
        self.reader.read_frame()
    }
}

impl TrackedFrameSource for DetectorSource {
    fn next_tracked(&mut self) -> Result<Option<TrackedFrame>> {
        let Some(frame) = self.read_next()? else {
            return Ok(None);
        };

        self.frame_id += 1;
        let detections = self.detector.detect(
            &frame.data,
            frame.width,
            frame.height,
            self.confidence_threshold,
        )?;
        let agents = self.tracker.update(&detections, self.frame_id);

        Ok(Some(TrackedFrame {
            frame_id: self.frame_id,
            frame,
            agents,
        }))
    }

    fn fps(&self) -> f64 {
        self.reader.fps
    }

    fn dimensions(&self) -> (usize, usize) {
        (self.reader.width as usize, self.reader.height as usize)
    }

    fn release(&mut self) -> Result<()> {
        self.reader.release()
    }
}
