// Offline region domain models
use serde::{Deserialize, Serialize};
use std::fmt;

/// Geographic bounding box in degrees.
///
/// Edges are normalised on construction so `south <= north` and
/// `west <= east` always hold. Deserialization goes through the same path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawBounds")]
pub struct BoundingBox {
    south: f64,
    west: f64,
    north: f64,
    east: f64,
}

#[derive(Deserialize)]
struct RawBounds {
    south: f64,
    west: f64,
    north: f64,
    east: f64,
}

impl From<RawBounds> for BoundingBox {
    fn from(raw: RawBounds) -> Self {
        Self::new(raw.south, raw.west, raw.north, raw.east)
    }
}

impl BoundingBox {
    pub fn new(south: f64, west: f64, north: f64, east: f64) -> Self {
        Self {
            south: south.min(north),
            west: west.min(east),
            north: south.max(north),
            east: west.max(east),
        }
    }

    pub fn south(&self) -> f64 {
        self.south
    }

    pub fn west(&self) -> f64 {
        self.west
    }

    pub fn north(&self) -> f64 {
        self.north
    }

    pub fn east(&self) -> f64 {
        self.east
    }
}

/// Named bounding box targeted for offline download.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub name: String,
    pub bounds: BoundingBox,
}

impl Region {
    pub fn new(name: impl Into<String>, bounds: BoundingBox) -> Self {
        Self {
            name: name.into(),
            bounds,
        }
    }

    pub fn key(&self, layer_name: &str) -> RegionKey {
        RegionKey::new(&self.name, layer_name)
    }
}

/// Storage unit identifier: one region downloaded for one layer.
///
/// Formatted as `{region}_{layer}`. Backslashes and underscores in the region
/// name are escaped, so the first bare `_` always separates the two parts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegionKey(String);

impl RegionKey {
    pub fn new(region_name: &str, layer_name: &str) -> Self {
        let escaped = region_name.replace('\\', "\\\\").replace('_', "\\_");
        Self(format!("{}_{}", escaped, layer_name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RegionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why the supervisor last returned to idle.
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadOutcome {
    Completed,
    Failed(String),
    Stopped,
}

/// Observable progress of the supervisor's single active download.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DownloadState {
    pub region: Option<Region>,
    pub layer_name: Option<String>,
    /// Percent complete, 0 to 100.
    pub progress: f64,
    pub is_downloading: bool,
    pub last_outcome: Option<DownloadOutcome>,
}

impl DownloadState {
    pub fn downloading(region: Region, layer_name: &str) -> Self {
        Self {
            region: Some(region),
            layer_name: Some(layer_name.to_string()),
            progress: 0.0,
            is_downloading: true,
            last_outcome: None,
        }
    }

    pub fn idle(outcome: Option<DownloadOutcome>) -> Self {
        Self {
            last_outcome: outcome,
            ..Self::default()
        }
    }
}

/// Snapshot of how much of a region is stored on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegionTileInfo {
    pub total_tiles: u64,
    pub downloaded_tiles: u64,
    pub downloaded_size: u64,
    pub is_fully_downloaded: bool,
}

impl RegionTileInfo {
    pub fn not_downloaded(total_tiles: u64) -> Self {
        Self {
            total_tiles,
            ..Self::default()
        }
    }
}

/// Aggregate storage used by every downloaded region of one layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LayerStats {
    pub total_size: u64,
    pub total_tiles: u64,
}
