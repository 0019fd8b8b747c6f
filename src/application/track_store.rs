// Track store - In-memory registry of live and finished tracks
use crate::domain::track::{Track, TrackPoint, TrackUpdate};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;

/// Colors handed out to users in order of first appearance.
pub const TRACK_COLORS: [&str; 16] = [
    "#e6194b", "#3cb44b", "#4363d8", "#f58231", "#911eb4", "#42d4f4", "#f032e6", "#bfef45",
    "#fabed4", "#469990", "#dcbeff", "#9a6324", "#800000", "#aaffc3", "#808000", "#000075",
];

#[derive(Debug, Error, PartialEq)]
pub enum StoreError {
    #[error("track {0} not found")]
    NotFound(String),
    #[error("track {0} is stopped and its points are frozen")]
    Frozen(String),
}

#[derive(Default)]
struct StoreState {
    tracks: HashMap<String, Track>,
    colors: HashMap<String, String>,
}

impl StoreState {
    /// Color for `user_id`, assigning the next palette entry on first sight.
    fn color_for(&mut self, user_id: &str) -> String {
        if let Some(color) = self.colors.get(user_id) {
            return color.clone();
        }
        let color = TRACK_COLORS[self.colors.len() % TRACK_COLORS.len()].to_string();
        self.colors.insert(user_id.to_string(), color.clone());
        color
    }
}

/// Shared, lock-protected track registry. Lives as long as the process.
#[derive(Default)]
pub struct TrackStore {
    state: RwLock<StoreState>,
}

impl TrackStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Inserts or replaces by id. The stored color always comes from the user's palette slot.
    pub fn save_track(&self, mut track: Track) -> Track {
        let mut state = self.write();
        track.color = state.color_for(&track.user_id);
        state.tracks.insert(track.id.clone(), track.clone());
        track
    }

    pub fn get_track(&self, id: &str) -> Option<Track> {
        self.read().tracks.get(id).cloned()
    }

    pub fn all_active_tracks(&self) -> Vec<Track> {
        self.collect_sorted(|track| track.is_active)
    }

    /// Every track, including stopped ones.
    pub fn all_tracks(&self) -> Vec<Track> {
        self.collect_sorted(|_| true)
    }

    /// Active tracks for the given users; an empty list means all users.
    pub fn tracks_by_client_ids(&self, client_ids: &[String]) -> Vec<Track> {
        if client_ids.is_empty() {
            return self.all_active_tracks();
        }
        self.collect_sorted(|track| {
            track.is_active && client_ids.iter().any(|id| *id == track.user_id)
        })
    }

    /// Merges `update` into the stored track. Never creates a track.
    pub fn update_track(&self, id: &str, update: TrackUpdate) -> Result<Track, StoreError> {
        let mut state = self.write();
        let track = state
            .tracks
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        if update.points.is_some() && !track.is_active {
            return Err(StoreError::Frozen(id.to_string()));
        }

        if let Some(name) = update.name {
            track.name = name;
        }
        if let Some(points) = update.points {
            track.points = points;
        }
        if let Some(is_active) = update.is_active {
            track.is_active = is_active;
        }
        if let Some(end_time) = update.end_time {
            track.end_time = Some(end_time);
        }
        Ok(track.clone())
    }

    /// Appends one point to an active track.
    pub fn append_point(&self, id: &str, point: TrackPoint) -> Result<Track, StoreError> {
        let mut state = self.write();
        let track = state
            .tracks
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        if !track.is_active {
            return Err(StoreError::Frozen(id.to_string()));
        }
        track.points.push(point);
        Ok(track.clone())
    }

    /// Marks a track stopped. Stopping twice keeps the first end time.
    ///
    /// The flag is `true` only for the call that actually stopped it.
    pub fn stop_track(&self, id: &str, end_time: i64) -> Result<(Track, bool), StoreError> {
        let mut state = self.write();
        let track = state
            .tracks
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        let was_active = track.is_active;
        if was_active {
            track.is_active = false;
            track.end_time = Some(end_time);
        }
        Ok((track.clone(), was_active))
    }

    pub fn delete_track(&self, id: &str) -> bool {
        self.write().tracks.remove(id).is_some()
    }

    fn collect_sorted(&self, keep: impl Fn(&Track) -> bool) -> Vec<Track> {
        let mut tracks: Vec<Track> = self
            .read()
            .tracks
            .values()
            .filter(|track| keep(track))
            .cloned()
            .collect();
        tracks.sort_by(|a, b| a.start_time.cmp(&b.start_time).then_with(|| a.id.cmp(&b.id)));
        tracks
    }
}
