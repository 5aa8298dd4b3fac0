// src/zones.rs
//
// Zone abstraction. A zone is always a polygon; a rectangular ROI is just a
// 4-point polygon built through `from_rect`, there is no separate rectangle
// code path.

use crate::geometry::{point_in_polygon, polygon_center, Point};
use crate::types::ZoneConfig;
use anyhow::{bail, Result};

#[derive(Debug, Clone)]
pub struct Zone {
    pub name: String,
    /// Ordinal index, also used as `polygon_id` in reports.
    pub index: usize,
    pub polygon: Vec<Point>,
    /// Display color as "#RRGGBB". Cosmetic only.
    pub color: Option<String>,
}

impl Zone {
    pub fn new(name: impl Into<String>, index: usize, polygon: Vec<Point>) -> Result<Self> {
        let name = name.into();
        if polygon.len() < 3 {
            bail!(
                "zone '{}' needs at least 3 polygon vertices, got {}",
                name,
                polygon.len()
            );
        }
        Ok(Self {
            name,
            index,
            polygon,
            color: None,
        })
    }

    /// Legacy rectangular ROI, expressed as a 4-point polygon.
    pub fn from_rect(name: impl Into<String>, index: usize, rect: [f64; 4]) -> Result<Self> {
        let [x1, y1, x2, y2] = rect;
        Self::new(
            name,
            index,
            vec![
                Point::new(x1, y1),
                Point::new(x2, y1),
                Point::new(x2, y2),
                Point::new(x1, y2),
            ],
        )
    }

    pub fn from_config(config: &ZoneConfig, index: usize) -> Result<Self> {
        let polygon = config
            .polygon
            .iter()
            .map(|[x, y]| Point::new(*x as f64, *y as f64))
            .collect();
        let mut zone = Self::new(config.name.clone(), index, polygon)?;
        zone.color = config.color.clone();
        Ok(zone)
    }

    pub fn contains(&self, point: Point) -> bool {
        point_in_polygon(&self.polygon, point)
    }

    pub fn label_anchor(&self) -> Point {
        polygon_center(&self.polygon)
    }
}

/// Build the zone list for one analysis run from config entries.
pub fn zones_from_configs(configs: &[ZoneConfig]) -> Result<Vec<Zone>> {
    configs
        .iter()
        .enumerate()
        .map(|(i, c)| Zone::from_config(c, i))
        .collect()
}
