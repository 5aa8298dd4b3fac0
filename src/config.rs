use crate::types::Config;
use anyhow::{bail, Result};
use std::fs;

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject degenerate zone polygons before any processing state exists.
    pub fn validate(&self) -> Result<()> {
        for zone in &self.zones {
            if zone.polygon.len() < 3 {
                bail!(
                    "zone '{}' has {} vertices, need at least 3",
                    zone.name,
                    zone.polygon.len()
                );
            }
        }
        for camera in &self.cameras {
            for zone in &camera.zones {
                if zone.polygon.len() < 3 {
                    bail!(
                        "camera '{}' zone '{}' has {} vertices, need at least 3",
                        camera.id,
                        zone.name,
                        zone.polygon.len()
                    );
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::types::*;

    fn minimal_config(polygon: Vec<[i32; 2]>) -> Config {
        Config {
            video: VideoConfig {
                input_dir: "videos".to_string(),
                output_dir: "output".to_string(),
                save_annotated: false,
            },
            detection: DetectionConfig {
                model_path: "models/yolo11n.onnx".to_string(),
                confidence_threshold: 0.4,
                nms_iou_threshold: 0.45,
                track_retention_frames: 90,
            },
            analysis: AnalysisConfig {
                min_wait_sec_filter: 1.0,
                sample_stride: 1,
                track_union: false,
            },
            stream: StreamConfig {
                enabled: false,
                target_fps: 15.0,
                wait_policy: WaitPolicy::Lifetime,
                camera: None,
            },
            zones: vec![ZoneConfig {
                name: "Queue".to_string(),
                polygon,
                color: None,
            }],
            cameras: vec![],
            recommendations: RecommendationsConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }

    #[test]
    fn test_valid_polygon_accepted() {
        let config = minimal_config(vec![[0, 0], [10, 0], [10, 10]]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_degenerate_polygon_rejected() {
        let config = minimal_config(vec![[0, 0], [10, 0]]);
        assert!(config.validate().is_err());
    }
}
