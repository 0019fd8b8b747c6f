//! Slippy-map tile math.
//!
//! Converts geographic bounding boxes into Web Mercator tile index ranges
//! and estimates how many tiles an offline region download will fetch.

use super::region::BoundingBox;
use std::f64::consts::PI;

/// Web Mercator latitude limit in degrees.
pub const MAX_LAT: f64 = 85.051_128_78;
pub const MIN_LAT: f64 = -MAX_LAT;

/// Highest zoom level the estimator will expand.
pub const MAX_ZOOM: u8 = 22;

/// Inclusive tile index rectangle covering a bounding box at one zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRange {
    pub zoom: u8,
    pub min_x: u32,
    pub max_x: u32,
    pub min_y: u32,
    pub max_y: u32,
}

impl TileRange {
    /// Tiles in the rectangle. Swapped bounds count the same as ordered ones.
    pub fn count(&self) -> u64 {
        let cols = u64::from(self.max_x.abs_diff(self.min_x)) + 1;
        let rows = u64::from(self.max_y.abs_diff(self.min_y)) + 1;
        cols * rows
    }
}

fn tiles_per_axis(zoom: u8) -> f64 {
    2.0_f64.powi(i32::from(zoom))
}

fn clamp_index(value: f64, zoom: u8) -> u32 {
    let last = tiles_per_axis(zoom) - 1.0;
    value.floor().clamp(0.0, last) as u32
}

/// Tile column containing `lon` at `zoom`.
pub fn lon_to_tile_x(lon: f64, zoom: u8) -> u32 {
    let lon = lon.clamp(-180.0, 180.0);
    clamp_index(tiles_per_axis(zoom) * (lon + 180.0) / 360.0, zoom)
}

/// Tile row containing `lat` at `zoom`. Rows grow southwards.
pub fn lat_to_tile_y(lat: f64, zoom: u8) -> u32 {
    let lat_rad = lat.clamp(MIN_LAT, MAX_LAT).to_radians();
    let mercator = (lat_rad.tan() + 1.0 / lat_rad.cos()).ln();
    clamp_index(tiles_per_axis(zoom) * (1.0 - mercator / PI) / 2.0, zoom)
}

/// Tile rectangle covering `bounds` at `zoom`.
pub fn tile_range(bounds: &BoundingBox, zoom: u8) -> TileRange {
    let zoom = zoom.min(MAX_ZOOM);
    TileRange {
        zoom,
        min_x: lon_to_tile_x(bounds.west(), zoom),
        max_x: lon_to_tile_x(bounds.east(), zoom),
        // north edge maps to the smaller row index
        min_y: lat_to_tile_y(bounds.north(), zoom),
        max_y: lat_to_tile_y(bounds.south(), zoom),
    }
}

/// Estimated number of tiles for `bounds` across `[min_zoom, max_zoom]`.
///
/// Always at least one: a degenerate box still covers one tile, and an
/// inverted zoom range is treated as the single level `min_zoom`.
pub fn estimate_tile_count(bounds: &BoundingBox, min_zoom: u8, max_zoom: u8) -> u64 {
    let min_zoom = min_zoom.min(MAX_ZOOM);
    let max_zoom = max_zoom.min(MAX_ZOOM).max(min_zoom);

    (min_zoom..=max_zoom)
        .map(|zoom| tile_range(bounds, zoom).count())
        .sum::<u64>()
        .max(1)
}
