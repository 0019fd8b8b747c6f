// Decoders for the platform's comma-separated status strings
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum StatusDecodeError {
    #[error("expected {expected} fields, got {actual} in {raw:?}")]
    FieldCount {
        expected: usize,
        actual: usize,
        raw: String,
    },
    #[error("invalid {field} value {value:?}")]
    InvalidField { field: &'static str, value: String },
}

/// Progress of one region as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegionStatus {
    pub downloaded_tiles: u64,
    pub total_tiles: u64,
    pub downloaded_size: u64,
    pub is_complete: bool,
}

impl RegionStatus {
    /// Percent complete, or `None` while the total is still unknown.
    pub fn percent(&self) -> Option<f64> {
        if self.total_tiles == 0 {
            return None;
        }
        let ratio = self.downloaded_tiles as f64 / self.total_tiles as f64;
        Some((ratio * 100.0).clamp(0.0, 100.0))
    }
}

fn fields(raw: &str, expected: usize) -> Result<Vec<&str>, StatusDecodeError> {
    let parts: Vec<&str> = raw.trim().split(',').map(str::trim).collect();
    if parts.len() != expected {
        return Err(StatusDecodeError::FieldCount {
            expected,
            actual: parts.len(),
            raw: raw.to_string(),
        });
    }
    Ok(parts)
}

fn parse_count(field: &'static str, value: &str) -> Result<u64, StatusDecodeError> {
    value.parse().map_err(|_| StatusDecodeError::InvalidField {
        field,
        value: value.to_string(),
    })
}

fn parse_flag(field: &'static str, value: &str) -> Result<bool, StatusDecodeError> {
    match value {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(StatusDecodeError::InvalidField {
            field,
            value: value.to_string(),
        }),
    }
}

/// Decodes `"downloaded,total,size,isComplete"`.
///
/// An empty string means the platform has no record of the region and
/// decodes to `None`.
pub fn decode_region_status(raw: &str) -> Result<Option<RegionStatus>, StatusDecodeError> {
    if raw.trim().is_empty() {
        return Ok(None);
    }

    let parts = fields(raw, 4)?;
    Ok(Some(RegionStatus {
        downloaded_tiles: parse_count("downloaded", parts[0])?,
        total_tiles: parse_count("total", parts[1])?,
        downloaded_size: parse_count("size", parts[2])?,
        is_complete: parse_flag("isComplete", parts[3])?,
    }))
}

/// Decodes `"totalSize,totalTiles"`.
///
/// The empty string and the `-1,-1` sentinel both mean the platform's
/// offline database is not ready yet and decode to `None`.
pub fn decode_layer_stats(raw: &str) -> Result<Option<(u64, u64)>, StatusDecodeError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let parts = fields(trimmed, 2)?;
    if parts.iter().all(|p| *p == "-1") {
        return Ok(None);
    }

    Ok(Some((
        parse_count("totalSize", parts[0])?,
        parse_count("totalTiles", parts[1])?,
    )))
}
