use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub video: VideoConfig,
    pub detection: DetectionConfig,
    pub analysis: AnalysisConfig,
    pub stream: StreamConfig,
    #[serde(default)]
    pub zones: Vec<ZoneConfig>,
    #[serde(default)]
    pub cameras: Vec<CameraConfig>,
    #[serde(default)]
    pub recommendations: RecommendationsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoConfig {
    pub input_dir: String,
    pub output_dir: String,
    pub save_annotated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    pub model_path: String,
    pub confidence_threshold: f32,
    pub nms_iou_threshold: f32,
    /// Frames a track survives without a matching detection before retirement.
    pub track_retention_frames: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub min_wait_sec_filter: f64,
    pub sample_stride: u64,
    /// Also track the legacy "inside ANY zone" union figure.
    #[serde(default)]
    pub track_union: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    pub enabled: bool,
    pub target_fps: f64,
    #[serde(default)]
    pub wait_policy: WaitPolicy,
    /// Optional camera preset id; when set the live demo streams that camera.
    #[serde(default)]
    pub camera: Option<String>,
}

/// How the live "current avg wait" treats time from earlier, non-contiguous
/// visits to the same zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitPolicy {
    /// Total time-in-zone across all visits (legacy behavior).
    Lifetime,
    /// Only the current uninterrupted visit; resets when the agent leaves.
    CurrentVisit,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        WaitPolicy::Lifetime
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneConfig {
    pub name: String,
    pub polygon: Vec<[i32; 2]>,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    pub id: String,
    pub name: String,
    pub location: String,
    pub area: String,
    pub video_file: String,
    pub zones: Vec<ZoneConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationsConfig {
    pub enabled: bool,
    pub api_url: String,
    pub model: String,
}

impl Default for RecommendationsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_url: "https://openrouter.ai/api/v1/chat/completions".to_string(),
            model: "openai/gpt-4o-mini".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

/// One decoded video frame, RGB bytes in row-major HWC order.
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: usize,
    pub height: usize,
    pub timestamp_ms: f64,
}

/// One detection as handed over by the tracker collaborator. A missing
/// track id means the detection could not be re-associated this frame and
/// is excluded from all zone logic.
#[derive(Debug, Clone)]
pub struct AgentObservation {
    pub track_id: Option<i64>,
    pub bbox: [f32; 4],
}

impl AgentObservation {
    pub fn centroid(&self) -> (f64, f64) {
        let [x1, y1, x2, y2] = self.bbox;
        (((x1 + x2) / 2.0) as f64, ((y1 + y2) / 2.0) as f64)
    }
}
