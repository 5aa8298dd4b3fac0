// src/annotate.rs
//
// Frame annotation: zone polygons, per-zone labels with live wait figures,
// and tracked person boxes. All drawing happens on a BGR Mat rebuilt from
// the pipeline's RGB frame bytes.

use crate::stats::ZoneMetrics;
use crate::types::AgentObservation;
use crate::zones::Zone;
use anyhow::Result;
use base64::Engine;
use opencv::{
    core::{self, Mat, Vector},
    imgcodecs, imgproc,
    prelude::*,
};

// BGR palette cycled when a zone config carries no explicit color
const ZONE_COLORS: [(f64, f64, f64); 4] = [
    (0.0, 0.0, 255.0),   // Red
    (0.0, 255.0, 0.0),   // Green
    (255.0, 0.0, 0.0),   // Blue
    (0.0, 255.0, 255.0), // Yellow
];

/// Per-zone figures shown on the overlay. Built from either a finished
/// report or a live snapshot.
#[derive(Debug, Clone)]
pub struct ZoneOverlay {
    pub current_count: usize,
    pub avg_wait: Option<f64>,
}

impl ZoneOverlay {
    pub fn from_metrics(metrics: &ZoneMetrics, current_count: usize) -> Self {
        Self {
            current_count,
            avg_wait: metrics.avg_wait,
        }
    }
}

pub fn zone_color(zone: &Zone) -> core::Scalar {
    if let Some(hex) = zone.color.as_deref() {
        if let Some((b, g, r)) = parse_hex_color(hex) {
            return core::Scalar::new(b, g, r, 0.0);
        }
    }
    let (b, g, r) = ZONE_COLORS[zone.index % ZONE_COLORS.len()];
    core::Scalar::new(b, g, r, 0.0)
}

// "#RRGGBB" -> BGR components
fn parse_hex_color(hex: &str) -> Option<(f64, f64, f64)> {
    let hex = hex.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some((b as f64, g as f64, r as f64))
}

/// Draw zones and tracked people onto a frame, returning a BGR Mat ready
/// for the video writer or JPEG encoding.
pub fn draw_frame(
    frame: &[u8],
    height: i32,
    zones: &[Zone],
    overlays: &[ZoneOverlay],
    agents: &[AgentObservation],
) -> Result<Mat> {
    let mat = Mat::from_slice(frame)?;
    let mat = mat.reshape(3, height)?;

    let mut output = Mat::default();
    imgproc::cvt_color(&mat, &mut output, imgproc::COLOR_RGB2BGR, 0)?;

    for zone in zones {
        let color = zone_color(zone);

        let mut points: Vector<core::Point> = Vector::new();
        for p in &zone.polygon {
            points.push(core::Point::new(p.x as i32, p.y as i32));
        }
        imgproc::polylines(&mut output, &points, true, color, 2, imgproc::LINE_AA, 0)?;

        let anchor = zone.label_anchor();
        let label = match overlays.get(zone.index) {
            Some(ov) => match ov.avg_wait {
                Some(avg) => format!(
                    "{}: {} | avg {:.1}s",
                    zone.name, ov.current_count, avg
                ),
                None => format!("{}: {}", zone.name, ov.current_count),
            },
            None => zone.name.clone(),
        };
        imgproc::put_text(
            &mut output,
            &label,
            core::Point::new(anchor.x as i32, (anchor.y as i32).max(20)),
            imgproc::FONT_HERSHEY_SIMPLEX,
            0.6,
            color,
            2,
            imgproc::LINE_8,
            false,
        )?;
    }

    for agent in agents {
        let [x1, y1, x2, y2] = agent.bbox;
        let rect = core::Rect::new(
            x1 as i32,
            y1 as i32,
            (x2 - x1).max(0.0) as i32,
            (y2 - y1).max(0.0) as i32,
        );
        let box_color = core::Scalar::new(255.0, 255.0, 255.0, 0.0);
        imgproc::rectangle(&mut output, rect, box_color, 2, imgproc::LINE_8, 0)?;

        if let Some(tid) = agent.track_id {
            imgproc::put_text(
                &mut output,
                &format!("ID: {}", tid),
                core::Point::new(x1 as i32, (y1 as i32 - 6).max(12)),
                imgproc::FONT_HERSHEY_SIMPLEX,
                0.5,
                box_color,
                1,
                imgproc::LINE_8,
                false,
            )?;
        }
    }

    Ok(output)
}

/// Encode a drawn frame as JPEG. Empty input frames (synthetic sources in
/// tests) encode to an empty buffer rather than an error.
pub fn encode_jpeg(mat: &Mat) -> Result<Vec<u8>> {
    if mat.empty() {
        return Ok(Vec::new());
    }
    let mut buf: Vector<u8> = Vector::new();
    imgcodecs::imencode(".jpg", mat, &mut buf, &Vector::new())?;
    Ok(buf.to_vec())
}

/// Base64 data URL for embedding a JPEG snapshot in JSON payloads.
pub fn jpeg_data_url(jpeg: &[u8]) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(jpeg);
    format!("data:image/jpeg;base64,{}", encoded)
}
