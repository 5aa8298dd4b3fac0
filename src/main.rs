// src/main.rs

mod annotate;
mod config;
mod detector;
mod dwell;
mod geometry;
mod occupancy;
mod pipeline;
mod recommendations;
mod session;
mod source;
mod stats;
mod tracker;
mod types;
mod video;
mod zones;

use anyhow::Result;
use detector::PersonDetector;
use pipeline::{run_batch, LiveStream, PipelineMetrics};
use recommendations::RecommendationClient;
use session::SessionManager;
use source::DetectorSource;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::Ordering;
use tracing::{error, info, warn};
use tracker::IouTracker;
use video::VideoProcessor;
use zones::zones_from_configs;

#[tokio::main]
async fn main() -> Result<()> {
    let config = types::Config::load("config.yaml")?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "queue_analyzer={},ort=warn",
            config.logging.level
        ))
        .init();

    info!("🛒 Queue Analytics System Starting");
    info!("✓ Configuration loaded");
    info!(
        "Analysis settings: min_wait_filter={:.1}s, confidence={:.2}, {} zone(s)",
        config.analysis.min_wait_sec_filter,
        config.detection.confidence_threshold,
        config.zones.len()
    );

    let mut sessions = SessionManager::new();

    let video_processor = VideoProcessor::new(config.clone());
    let video_files = video_processor.find_video_files()?;

    if video_files.is_empty() {
        error!("No video files found in {}", config.video.input_dir);
        return Ok(());
    }

    info!("Found {} video file(s) to analyze", video_files.len());

    let recommender = if config.recommendations.enabled {
        Some(RecommendationClient::new(config.recommendations.clone())?)
    } else {
        None
    };

    for (idx, video_path) in video_files.iter().enumerate() {
        info!("\n========================================");
        info!(
            "Analyzing video {}/{}: {}",
            idx + 1,
            video_files.len(),
            video_path.display()
        );
        info!("========================================\n");

        let video_id = sessions.register_video(
            video_path.clone(),
            &video_path.file_name().unwrap_or_default().to_string_lossy(),
        );

        match analyze_video(video_path, &video_processor, &config).await {
            Ok(report) => {
                info!("\n✓ Video analyzed successfully!");
                info!("  Frames: {}", report.frame_count);
                info!("  Footage duration: {:.1}s", report.duration_sec);
                for zone in &report.zones {
                    match zone.metrics.avg_wait {
                        Some(avg) => info!(
                            "  📍 {}: avg wait {:.1}s, max queue {}, {} measured / {} tracked",
                            zone.zone_name,
                            avg,
                            zone.metrics.max_queue_len,
                            zone.metrics.num_people_measured,
                            zone.metrics.total_people_tracked
                        ),
                        None => info!(
                            "  📍 {}: no significant waits ({} tracked)",
                            zone.zone_name, zone.metrics.total_people_tracked
                        ),
                    }
                }

                if let Some(client) = &recommender {
                    let advice = client.recommend(&report).await;
                    info!("💡 Recommendations ({}):\n{}", advice.source, advice.text);
                    save_recommendations(video_path, &config.video.output_dir, &advice)?;
                }

                sessions.store_report(&video_id, report);
            }
            Err(e) => {
                error!("Failed to analyze video: {}", e);
            }
        }
    }

    if config.stream.enabled {
        run_live_demo(&config, &video_files, &mut sessions).await?;
    }

    Ok(())
}

async fn analyze_video(
    video_path: &Path,
    video_processor: &VideoProcessor,
    config: &types::Config,
) -> Result<stats::AnalysisReport> {
    let reader = video_processor.open_video(video_path)?;
    let writer =
        video_processor.create_writer(video_path, reader.width, reader.height, reader.fps)?;

    let detector = PersonDetector::new(
        &config.detection.model_path,
        config.detection.nms_iou_threshold,
    )?;
    info!("✓ Person detector ready");

    let tracker = IouTracker::new(config.detection.track_retention_frames);
    let mut source = DetectorSource::new(
        reader,
        detector,
        tracker,
        config.detection.confidence_threshold,
        false,
    );

    let zones = zones_from_configs(&config.zones)?;
    let metrics = PipelineMetrics::new();
    let report = run_batch(&mut source, zones, &config.analysis, writer, &metrics)?;

    info!(
        "  🔢 Unique people tracked: {}",
        source.total_unique_tracks()
    );
    info!("  Processing speed: {:.1} FPS", metrics.fps());

    save_report(video_path, &config.video.output_dir, &report)?;
    Ok(report)
}

fn save_report(
    video_path: &Path,
    output_dir: &str,
    report: &stats::AnalysisReport,
) -> Result<()> {
    std::fs::create_dir_all(output_dir)?;
    let video_name = video_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("video");
    let report_path = Path::new(output_dir).join(format!("{}_report.json", video_name));
    std::fs::write(&report_path, serde_json::to_string_pretty(report)?)?;
    info!("💾 Report written to: {}", report_path.display());
    Ok(())
}

fn save_recommendations(
    video_path: &Path,
    output_dir: &str,
    advice: &recommendations::Recommendations,
) -> Result<()> {
    std::fs::create_dir_all(output_dir)?;
    let video_name = video_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("video");
    let path = Path::new(output_dir).join(format!("{}_recommendations.json", video_name));
    std::fs::write(&path, serde_json::to_string_pretty(advice)?)?;
    info!("💾 Recommendations written to: {}", path.display());
    Ok(())
}

/// Stream one video as an endless camera feed, writing each snapshot as a
/// JSONL line until ctrl-c.
async fn run_live_demo(
    config: &types::Config,
    video_files: &[std::path::PathBuf],
    sessions: &mut SessionManager,
) -> Result<()> {
    // Camera presets take precedence over discovered files
    let (live_path, zone_configs) = match &config.stream.camera {
        Some(camera_id) => {
            let Some(camera) = config.cameras.iter().find(|c| &c.id == camera_id) else {
                anyhow::bail!("Unknown camera preset: {}", camera_id);
            };
            info!(
                "🎥 Live demo: camera '{}' ({}, {})",
                camera.name, camera.location, camera.area
            );
            (std::path::PathBuf::from(&camera.video_file), &camera.zones)
        }
        None => {
            let Some(first) = video_files.first() else {
                warn!("No video available for the live demo");
                return Ok(());
            };
            (first.clone(), &config.zones)
        }
    };

    let reader = video::VideoReader::open(&live_path)?;
    let detector = PersonDetector::new(
        &config.detection.model_path,
        config.detection.nms_iou_threshold,
    )?;
    let tracker = IouTracker::new(config.detection.track_retention_frames);
    let source = DetectorSource::new(
        reader,
        detector,
        tracker,
        config.detection.confidence_threshold,
        true,
    );

    let zones = zones_from_configs(zone_configs)?;
    let mut stream = LiveStream::new(
        source,
        zones,
        &config.stream,
        config.analysis.min_wait_sec_filter,
        true,
    );

    let handle = sessions.register_stream(stream.stop_handle());
    info!(
        "🔴 Live stream '{}' at {:.0} fps target (ctrl-c to stop)",
        handle.id, config.stream.target_fps
    );

    let stop = stream.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Stop requested");
            stop.store(true, Ordering::Relaxed);
        }
    });

    std::fs::create_dir_all(&config.video.output_dir)?;
    let jsonl_path = Path::new(&config.video.output_dir).join("live_snapshots.jsonl");
    let mut snapshots_file = std::fs::File::create(&jsonl_path)?;
    info!("💾 Snapshots will be written to: {}", jsonl_path.display());

    while let Some(snapshot) = stream.next_snapshot().await? {
        writeln!(snapshots_file, "{}", serde_json::to_string(&snapshot)?)?;

        if snapshot.frame_id % 100 == 0 {
            let occupied: usize = snapshot.zones.iter().map(|z| z.current_count).sum();
            info!(
                "Live frame {}: {} people in zones | {:.1} fps measured",
                snapshot.frame_id, occupied, snapshot.measured_fps
            );
        }
    }
    snapshots_file.flush()?;

    let summary = stream.summary();
    info!("\n📊 Live Session Summary:");
    info!("  Frames streamed: {}", summary.frame_count);
    for zone in &summary.zones {
        match zone.metrics.avg_wait {
            Some(avg) => info!(
                "  📍 {}: avg wait {:.1}s, max queue {}",
                zone.zone_name, avg, zone.metrics.max_queue_len
            ),
            None => info!("  📍 {}: no significant waits", zone.zone_name),
        }
    }

    sessions.stop_stream(&handle.id);
    stream.cleanup()?;
    Ok(())
}
