// src/video.rs

use crate::types::{Config, Frame};
use anyhow::{bail, Result};
use opencv::{
    core::{self, Mat},
    imgproc,
    prelude::*,
    videoio::{self, VideoCapture, VideoCaptureTrait, VideoCaptureTraitConst, VideoWriter},
};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

/// Fallback used whenever a container reports a zero or negative frame
/// rate, to keep all timing computations well-defined.
pub const DEFAULT_FPS: f64 = 25.0;

pub struct VideoProcessor {
    config: Config,
}

impl VideoProcessor {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn find_video_files(&self) -> Result<Vec<PathBuf>> {
        let mut videos = Vec::new();

        let video_extensions = vec!["mp4", "avi", "mov", "mkv", "MP4", "AVI", "MOV", "MKV"];

        for entry in WalkDir::new(&self.config.video.input_dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if let Some(ext) = path.extension() {
                if video_extensions.contains(&ext.to_str().unwrap_or("")) {
                    videos.push(path.to_path_buf());
                }
            }
        }

        info!("Found {} video files", videos.len());
        Ok(videos)
    }

    pub fn open_video(&self, path: &Path) -> Result<VideoReader> {
        info!("Opening video: {}", path.display());
        VideoReader::open(path)
    }

    pub fn create_writer(
        &self,
        input_path: &Path,
        width: i32,
        height: i32,
        fps: f64,
    ) -> Result<Option<AnnotatedWriter>> {
        if !self.config.video.save_annotated {
            return Ok(None);
        }

        std::fs::create_dir_all(&self.config.video.output_dir)?;

        let input_name = input_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("video");
        let output_path = PathBuf::from(&self.config.video.output_dir)
            .join(format!("annotated_{}.mp4", input_name));

        info!("Output video: {}", output_path.display());

        let fourcc = VideoWriter::fourcc('m', 'p', '4', 'v')?;
        let writer = VideoWriter::new(
            output_path
                .to_str()
                .ok_or_else(|| anyhow::anyhow!("non-utf8 output path"))?,
            fourcc,
            fps,
            core::Size::new(width, height),
            true,
        )?;

        Ok(Some(AnnotatedWriter {
            writer,
            path: output_path,
            released: false,
        }))
    }
}

pub struct AnnotatedWriter {
    writer: VideoWriter,
    pub path: PathBuf,
    released: bool,
}

impl AnnotatedWriter {
    pub fn write(&mut self, frame: &Mat) -> Result<()> {
        use opencv::videoio::VideoWriterTrait;
        self.writer.write(frame)?;
        Ok(())
    }

    pub fn release(&mut self) -> Result<()> {
        use opencv::videoio::VideoWriterTrait;
        if !self.released {
            self.writer.release()?;
            self.released = true;
        }
        Ok(())
    }
}

pub struct VideoReader {
    cap: VideoCapture,
    pub fps: f64,
    pub total_frames: i32,
    pub current_frame: i32,
    pub width: i32,
    pub height: i32,
    released: bool,
}

impl VideoReader {
    pub fn open(path: &Path) -> Result<Self> {
        let path_str = path
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("non-utf8 video path"))?;
        let cap = VideoCapture::from_file(path_str, videoio::CAP_ANY)?;

        if !cap.is_opened()? {
            bail!("Failed to open video file: {}", path.display());
        }

        let mut fps = VideoCaptureTraitConst::get(&cap, videoio::CAP_PROP_FPS)?;
        if fps <= 0.0 {
            warn!("Container reports fps={:.2}, assuming {}", fps, DEFAULT_FPS);
            fps = DEFAULT_FPS;
        }
        let total_frames = VideoCaptureTraitConst::get(&cap, videoio::CAP_PROP_FRAME_COUNT)? as i32;
        let width = VideoCaptureTraitConst::get(&cap, videoio::CAP_PROP_FRAME_WIDTH)? as i32;
        let height = VideoCaptureTraitConst::get(&cap, videoio::CAP_PROP_FRAME_HEIGHT)? as i32;

        info!(
            "Video properties: {}x{} @ {:.1} FPS, {} frames",
            width, height, fps, total_frames
        );

        Ok(Self {
            cap,
            fps,
            total_frames,
            current_frame: 0,
            width,
            height,
            released: false,
        })
    }

    pub fn read_frame(&mut self) -> Result<Option<Frame>> {
        let mut mat = Mat::default();

        if !VideoCaptureTrait::read(&mut self.cap, &mut mat)? || mat.empty() {
            return Ok(None);
        }

        self.current_frame += 1;
        let timestamp_ms = (self.current_frame as f64 / self.fps) * 1000.0;

        let mut rgb_mat = Mat::default();
        imgproc::cvt_color(&mat, &mut rgb_mat, imgproc::COLOR_BGR2RGB, 0)?;

        let data = rgb_mat.data_bytes()?.to_vec();

        Ok(Some(Frame {
            data,
            width: self.width as usize,
            height: self.height as usize,
            timestamp_ms,
        }))
    }

    /// Rewind to frame 0. Used by the live pipeline to simulate an
    /// unbounded camera feed from a finite file.
    pub fn seek_to_start(&mut self) -> Result<()> {
        self.cap.set(videoio::CAP_PROP_POS_FRAMES, 0.0)?;
        self.current_frame = 0;
        Ok(())
    }

    /// Release the underlying capture. Safe to call more than once.
    pub fn release(&mut self) -> Result<()> {
        if !self.released {
            self.cap.release()?;
            self.released = true;
            info!("Video capture released");
        }
        Ok(())
    }

    pub fn progress(&self) -> f32 {
        if self.total_frames == 0 {
            return 0.0;
        }
        (self.current_frame as f32 / self.total_frames as f32) * 100.0
    }
}

impl Drop for VideoReader {
    fn drop(&mut self) {
        let _ = self.release();
    }
}
