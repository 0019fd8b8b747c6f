// Application state for HTTP handlers
use crate::application::live_relay::LiveRelay;
use crate::application::track_service::TrackService;

#[derive(Clone)]
pub struct AppState {
    pub track_service: TrackService,
    pub relay: LiveRelay,
    pub admin_key: Option<String>,
}
