// Track domain models and live relay events
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackPoint {
    pub lat: f64,
    pub lon: f64,
    /// Epoch milliseconds.
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub points: Vec<TrackPoint>,
    /// Epoch milliseconds.
    pub start_time: i64,
    #[serde(default)]
    pub end_time: Option<i64>,
    pub is_active: bool,
    /// Assigned by the store; any value on input is replaced.
    #[serde(default)]
    pub color: String,
}

impl Track {
    pub fn new(id: String, user_id: String, name: String, start_time: i64) -> Self {
        Self {
            id,
            user_id,
            name,
            points: Vec::new(),
            start_time,
            end_time: None,
            is_active: true,
            color: String::new(),
        }
    }
}

/// Partial update merged into a stored track. Color is never updatable.
#[derive(Debug, Clone, Default)]
pub struct TrackUpdate {
    pub name: Option<String>,
    pub points: Option<Vec<TrackPoint>>,
    pub is_active: Option<bool>,
    pub end_time: Option<i64>,
}

/// Delta pushed to every connected browser.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum TrackEvent {
    TrackStarted {
        track_id: String,
        user_id: String,
        name: String,
        color: String,
    },
    TrackUpdate {
        track_id: String,
        user_id: String,
        point: TrackPoint,
        color: String,
    },
    TrackStopped {
        track_id: String,
        user_id: String,
    },
}

impl TrackEvent {
    pub fn started(track: &Track) -> Self {
        Self::TrackStarted {
            track_id: track.id.clone(),
            user_id: track.user_id.clone(),
            name: track.name.clone(),
            color: track.color.clone(),
        }
    }

    pub fn point_added(track: &Track, point: TrackPoint) -> Self {
        Self::TrackUpdate {
            track_id: track.id.clone(),
            user_id: track.user_id.clone(),
            point,
            color: track.color.clone(),
        }
    }

    pub fn stopped(track: &Track) -> Self {
        Self::TrackStopped {
            track_id: track.id.clone(),
            user_id: track.user_id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_track_serializes_camel_case() {
        let track = Track::new("t1".into(), "abc123".into(), "Track 1".into(), 1_000);
        let value = serde_json::to_value(&track).unwrap();
        assert_eq!(value["userId"], "abc123");
        assert_eq!(value["isActive"], true);
        assert_eq!(value["startTime"], 1_000);
        assert!(value["endTime"].is_null());
    }

    #[test]
    fn test_event_wire_format() {
        let mut track = Track::new("t1".into(), "abc123".into(), "Track 1".into(), 0);
        track.color = "#e6194b".into();
        let point = TrackPoint {
            lat: 59.9139,
            lon: 10.7522,
            timestamp: 42,
            altitude: None,
            accuracy: Some(5.0),
        };

        let value = serde_json::to_value(TrackEvent::point_added(&track, point)).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "track_update",
                "trackId": "t1",
                "userId": "abc123",
                "point": { "lat": 59.9139, "lon": 10.7522, "timestamp": 42, "accuracy": 5.0 },
                "color": "#e6194b"
            })
        );

        let value = serde_json::to_value(TrackEvent::stopped(&track)).unwrap();
        assert_eq!(value["type"], "track_stopped");
        assert_eq!(value["trackId"], "t1");
    }
}
