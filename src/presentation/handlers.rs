// HTTP request handlers
use crate::application::track_service::{TrackQuery, now_millis};
use crate::domain::track::{Track, TrackPoint};
use crate::presentation::app_state::AppState;
use crate::presentation::error::ApiError;
use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

pub const ADMIN_KEY_HEADER: &str = "x-admin-key";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTrackRequest {
    pub user_id: Option<String>,
    pub name: Option<String>,
}

#[derive(Deserialize)]
pub struct AddPointRequest {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub timestamp: Option<i64>,
    pub altitude: Option<f64>,
    pub accuracy: Option<f64>,
}

#[derive(Deserialize)]
pub struct ListQuery {
    /// Comma-separated user ids.
    pub clients: Option<String>,
    pub historical: Option<bool>,
}

#[derive(Serialize)]
pub struct AdminTrackList {
    pub admin: bool,
    pub tracks: Vec<Track>,
}

fn required(value: Option<String>, field: &str) -> Result<String, ApiError> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ApiError::BadRequest(format!("{} is required", field))),
    }
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

fn query_params<T>(params: Result<Query<T>, QueryRejection>) -> Result<T, ApiError> {
    params
        .map(|Query(value)| value)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

/// Compares without short-circuiting on the first differing byte.
fn keys_match(presented: &[u8], expected: &[u8]) -> bool {
    if presented.len() != expected.len() {
        return false;
    }
    presented
        .iter()
        .zip(expected)
        .fold(0u8, |diff, (a, b)| diff | (a ^ b))
        == 0
}

/// `Ok(false)` without the header, `Ok(true)` with a matching key.
/// Any other presented key fails the request.
fn is_admin(headers: &HeaderMap, admin_key: Option<&str>) -> Result<bool, ApiError> {
    let Some(presented) = headers.get(ADMIN_KEY_HEADER) else {
        return Ok(false);
    };
    match admin_key {
        Some(expected) if keys_match(presented.as_bytes(), expected.as_bytes()) => Ok(true),
        _ => {
            warn!("Rejected request with invalid admin key");
            Err(ApiError::Unauthorized)
        }
    }
}

fn parse_clients(raw: Option<&str>) -> Vec<String> {
    raw.map(|csv| {
        csv.split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

pub async fn create_track(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateTrackRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Track>), ApiError> {
    let request = body(payload)?;
    let user_id = required(request.user_id, "userId")?;
    let name = required(request.name, "name")?;

    let track = state.track_service.create_track(user_id, name);
    Ok((StatusCode::CREATED, Json(track)))
}

/// List tracks; admins get `{ admin, tracks }`, everyone else a bare array.
pub async fn list_tracks(
    headers: HeaderMap,
    params: Result<Query<ListQuery>, QueryRejection>,
    State(state): State<Arc<AppState>>,
) -> Result<Response, ApiError> {
    let query = query_params(params)?;
    let admin = is_admin(&headers, state.admin_key.as_deref())?;
    let track_query = TrackQuery {
        client_ids: parse_clients(query.clients.as_deref()),
        historical: query.historical.unwrap_or(false),
        admin,
    };

    let tracks = state.track_service.list_tracks(&track_query);
    if admin {
        return Ok(Json(AdminTrackList {
            admin: true,
            tracks,
        })
        .into_response());
    }
    Ok(Json(tracks).into_response())
}

pub async fn get_track(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Track>, ApiError> {
    state
        .track_service
        .get_track(&id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("track {} not found", id)))
}

pub async fn add_point(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AddPointRequest>, JsonRejection>,
) -> Result<Json<Track>, ApiError> {
    let request = body(payload)?;
    let (lat, lon) = match (request.lat, request.lon) {
        (Some(lat), Some(lon)) => (lat, lon),
        _ => return Err(ApiError::BadRequest("lat and lon are required".to_string())),
    };
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return Err(ApiError::BadRequest(format!(
            "coordinates out of range: {}, {}",
            lat, lon
        )));
    }

    let point = TrackPoint {
        lat,
        lon,
        timestamp: request.timestamp.unwrap_or_else(now_millis),
        altitude: request.altitude,
        accuracy: request.accuracy,
    };
    Ok(Json(state.track_service.add_point(&id, point)?))
}

pub async fn stop_track(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Track>, ApiError> {
    Ok(Json(state.track_service.stop_track(&id)?))
}

pub async fn delete_track(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<StatusCode, ApiError> {
    if state.track_service.delete_track(&id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("track {} not found", id)))
    }
}
