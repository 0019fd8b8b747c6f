// Track service - Use cases behind the REST surface
use crate::application::live_relay::LiveRelay;
use crate::application::track_store::{StoreError, TrackStore};
use crate::domain::track::{Track, TrackEvent, TrackPoint};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;

/// Which tracks a listing request may see.
#[derive(Debug, Clone, Default)]
pub struct TrackQuery {
    pub client_ids: Vec<String>,
    pub historical: bool,
    pub admin: bool,
}

#[derive(Clone)]
pub struct TrackService {
    store: Arc<TrackStore>,
    relay: LiveRelay,
    default_clients: Vec<String>,
    next_seq: Arc<AtomicU64>,
    /// Held across each mutation and its publish so subscribers see
    /// events in the order the store applied them.
    publish_order: Arc<Mutex<()>>,
}

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl TrackService {
    pub fn new(store: Arc<TrackStore>, relay: LiveRelay, default_clients: Vec<String>) -> Self {
        Self {
            store,
            relay,
            default_clients,
            next_seq: Arc::new(AtomicU64::new(1)),
            publish_order: Arc::new(Mutex::new(())),
        }
    }

    fn ordered(&self) -> MutexGuard<'_, ()> {
        self.publish_order
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn next_id(&self, user_id: &str, start_time: i64) -> String {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        format!("{}-{}-{}", user_id, start_time, seq)
    }

    pub fn create_track(&self, user_id: String, name: String) -> Track {
        let start_time = now_millis();
        let id = self.next_id(&user_id, start_time);
        let _order = self.ordered();
        let track = self
            .store
            .save_track(Track::new(id, user_id, name, start_time));

        info!(track_id = %track.id, user_id = %track.user_id, "Track started");
        self.relay.publish(TrackEvent::started(&track));
        track
    }

    pub fn get_track(&self, id: &str) -> Option<Track> {
        self.store.get_track(id)
    }

    pub fn add_point(&self, id: &str, point: TrackPoint) -> Result<Track, StoreError> {
        let _order = self.ordered();
        let track = self.store.append_point(id, point.clone())?;
        self.relay.publish(TrackEvent::point_added(&track, point));
        Ok(track)
    }

    pub fn stop_track(&self, id: &str) -> Result<Track, StoreError> {
        let _order = self.ordered();
        let (track, stopped_now) = self.store.stop_track(id, now_millis())?;
        if stopped_now {
            info!(track_id = %track.id, points = track.points.len(), "Track stopped");
            self.relay.publish(TrackEvent::stopped(&track));
        }
        Ok(track)
    }

    pub fn delete_track(&self, id: &str) -> bool {
        self.store.delete_track(id)
    }

    /// Anonymous callers see active tracks of the requested (or default) clients.
    /// Admins bypass the default allowlist and may include stopped tracks.
    pub fn list_tracks(&self, query: &TrackQuery) -> Vec<Track> {
        if query.admin {
            let tracks = if query.historical {
                self.store.all_tracks()
            } else {
                self.store.all_active_tracks()
            };
            if query.client_ids.is_empty() {
                return tracks;
            }
            return tracks
                .into_iter()
                .filter(|t| query.client_ids.contains(&t.user_id))
                .collect();
        }

        let clients = if query.client_ids.is_empty() {
            &self.default_clients
        } else {
            &query.client_ids
        };
        self.store.tracks_by_client_ids(clients)
    }
}
