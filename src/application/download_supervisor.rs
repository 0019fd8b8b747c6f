//! Offline region download supervisor.
//!
//! Drives one platform region download at a time and publishes its progress
//! through a `watch` channel. Two independent sources keep that state alive:
//!
//! - the push observer handed to the platform (progress/complete/error), and
//! - a poll loop reading the encoded region status once per interval.
//!
//! The poll loop is the source of truth. Push callbacks can go missing
//! across the native boundary, and only polling can notice a download that
//! silently stopped moving. See [`StallDetector`] for the resume backoff.
//!
//! Every run gets a generation number. State writes carry the generation of
//! the run that produced them and are dropped once that run is no longer
//! current, so a superseded task can never clobber a newer download.

use crate::application::download_platform::{
    DownloadEvent, DownloadObserver, RegionDownloadPlatform, RegionDownloadRequest,
};
use crate::application::stall_detector::{StallDetector, StallVerdict};
use crate::domain::region::{
    DownloadOutcome, DownloadState, LayerStats, Region, RegionKey, RegionTileInfo,
};
use crate::domain::tiles::estimate_tile_count;
use crate::infrastructure::status_codec::{RegionStatus, decode_layer_stats, decode_region_status};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Wait before the first poll so the platform can register the download.
    pub grace_delay: Duration,
    pub poll_interval: Duration,
    /// Unchanged polls before the first auto-resume.
    pub initial_stall_threshold: u32,
    pub max_stall_threshold: u32,
    /// Extra wait after an auto-resume before polling again.
    pub resume_cooldown: Duration,
    pub layer_stats_retry_delay: Duration,
    /// Style definition per layer. Unlisted layers pass the layer name as style.
    pub layer_styles: HashMap<String, String>,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            grace_delay: Duration::from_secs(2),
            poll_interval: Duration::from_secs(1),
            initial_stall_threshold: 15,
            max_stall_threshold: 120,
            resume_cooldown: Duration::from_secs(5),
            layer_stats_retry_delay: Duration::from_millis(500),
            layer_styles: HashMap::new(),
        }
    }
}

impl SupervisorConfig {
    pub fn style_for(&self, layer_name: &str) -> String {
        self.layer_styles
            .get(layer_name)
            .cloned()
            .unwrap_or_else(|| layer_name.to_string())
    }
}

struct Shared {
    platform: Arc<dyn RegionDownloadPlatform>,
    config: SupervisorConfig,
    state: watch::Sender<DownloadState>,
    generation: Mutex<u64>,
}

impl Shared {
    fn lock_generation(&self) -> MutexGuard<'_, u64> {
        self.generation
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn is_current(&self, generation: u64) -> bool {
        *self.lock_generation() == generation
    }

    /// Starts a new run, invalidating every earlier one.
    fn begin_run(&self, state: DownloadState) -> u64 {
        let mut current = self.lock_generation();
        *current += 1;
        self.state.send_replace(state);
        *current
    }

    /// Applies `update` only while `generation` is the current run.
    fn publish(&self, generation: u64, update: impl FnOnce(&mut DownloadState)) -> bool {
        let current = self.lock_generation();
        if *current != generation {
            return false;
        }
        self.state.send_modify(update);
        true
    }

    /// Ends `generation` with `outcome`. No-op if the run was already superseded.
    fn finish_run(&self, generation: u64, outcome: DownloadOutcome) -> bool {
        let mut current = self.lock_generation();
        if *current != generation {
            return false;
        }
        *current += 1;
        self.state.send_replace(DownloadState::idle(Some(outcome)));
        true
    }

    /// Returns to idle regardless of which run is current.
    fn reset(&self, outcome: Option<DownloadOutcome>) {
        let mut current = self.lock_generation();
        *current += 1;
        self.state.send_replace(DownloadState::idle(outcome));
    }

    async fn query_status(&self, key: &RegionKey) -> anyhow::Result<Option<RegionStatus>> {
        let raw = self.platform.region_status_encoded(key).await?;
        Ok(decode_region_status(&raw)?)
    }
}

struct ActiveDownload {
    key: RegionKey,
    cancel: CancellationToken,
}

impl ActiveDownload {
    /// Both loops cancel the token themselves when the run ends on its own.
    fn is_running(&self) -> bool {
        !self.cancel.is_cancelled()
    }
}

pub struct RegionDownloadSupervisor {
    shared: Arc<Shared>,
    active: tokio::sync::Mutex<Option<ActiveDownload>>,
}

impl RegionDownloadSupervisor {
    pub fn new(platform: Arc<dyn RegionDownloadPlatform>, config: SupervisorConfig) -> Self {
        let (state, _) = watch::channel(DownloadState::default());
        Self {
            shared: Arc::new(Shared {
                platform,
                config,
                state,
                generation: Mutex::new(0),
            }),
            active: tokio::sync::Mutex::new(None),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<DownloadState> {
        self.shared.state.subscribe()
    }

    pub fn state(&self) -> DownloadState {
        self.shared.state.borrow().clone()
    }

    /// Starts downloading `region` for `layer_name`, superseding any active download.
    ///
    /// The state reads `is_downloading` with progress 0 before this returns.
    /// If the platform refuses the request the state goes back to idle with a
    /// [`DownloadOutcome::Failed`].
    pub async fn start_download(
        &self,
        region: Region,
        layer_name: &str,
        min_zoom: u8,
        max_zoom: u8,
    ) {
        let mut active = self.active.lock().await;
        if let Some(previous) = active.take() {
            self.cancel_platform_download(previous).await;
        }

        let key = region.key(layer_name);
        let request = RegionDownloadRequest {
            key: key.clone(),
            style: self.shared.config.style_for(layer_name),
            bounds: region.bounds,
            min_zoom,
            max_zoom,
        };

        let generation = self
            .shared
            .begin_run(DownloadState::downloading(region, layer_name));
        let cancel = CancellationToken::new();
        let (observer, events) = DownloadObserver::channel();

        tokio::spawn(pump_events(
            self.shared.clone(),
            generation,
            events,
            cancel.clone(),
        ));
        tokio::spawn(poll_until_done(
            self.shared.clone(),
            key.clone(),
            generation,
            cancel.clone(),
        ));

        info!(key = %key, min_zoom, max_zoom, generation, "Starting region download");
        *active = Some(ActiveDownload {
            key: key.clone(),
            cancel: cancel.clone(),
        });

        if let Err(e) = self.shared.platform.download_region(request, observer).await {
            warn!(key = %key, error = %e, "Platform rejected region download");
            cancel.cancel();
            self.shared
                .finish_run(generation, DownloadOutcome::Failed(e.to_string()));
        }
    }

    /// Stops the active download, if any. Safe to call at any time.
    pub async fn stop_download(&self) {
        let mut active = self.active.lock().await;
        match active.take() {
            Some(download) if download.is_running() => {
                info!(key = %download.key, "Stopping region download");
                self.cancel_platform_download(download).await;
                self.shared.reset(Some(DownloadOutcome::Stopped));
            }
            _ => debug!("stop_download called with nothing downloading"),
        }
    }

    async fn cancel_platform_download(&self, download: ActiveDownload) {
        if !download.is_running() {
            return;
        }
        download.cancel.cancel();
        if let Err(e) = self.shared.platform.stop_download(&download.key).await {
            warn!(key = %download.key, error = %e, "Platform stop failed, resetting local state anyway");
        }
    }

    /// Current stored/total tiles for a region. Never fails.
    ///
    /// Falls back to the estimated tile count with nothing downloaded when
    /// the platform has no record or the query fails.
    pub async fn region_tile_info(
        &self,
        region: &Region,
        layer_name: &str,
        min_zoom: u8,
        max_zoom: u8,
    ) -> RegionTileInfo {
        let key = region.key(layer_name);
        let fallback =
            || RegionTileInfo::not_downloaded(estimate_tile_count(&region.bounds, min_zoom, max_zoom));

        match self.shared.query_status(&key).await {
            Ok(Some(status)) if status.total_tiles > 0 || status.is_complete => RegionTileInfo {
                total_tiles: status.total_tiles,
                downloaded_tiles: status.downloaded_tiles,
                downloaded_size: status.downloaded_size,
                is_fully_downloaded: status.is_complete
                    || status.downloaded_tiles >= status.total_tiles,
            },
            Ok(_) => fallback(),
            Err(e) => {
                warn!(key = %key, error = %e, "Region status query failed");
                fallback()
            }
        }
    }

    pub async fn delete_region_tiles(&self, region: &Region, layer_name: &str) -> bool {
        let key = region.key(layer_name);
        match self.shared.platform.delete_region(&key).await {
            Ok(deleted) => {
                debug!(key = %key, deleted, "Deleted region tiles");
                deleted
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to delete region tiles");
                false
            }
        }
    }

    /// Storage used by every downloaded region of `layer_name`.
    ///
    /// Retries once after a short wait if the platform is not ready, then
    /// gives up with zeroes.
    pub async fn layer_stats(&self, layer_name: &str) -> LayerStats {
        for attempt in 0..2 {
            if attempt > 0 {
                tokio::time::sleep(self.shared.config.layer_stats_retry_delay).await;
            }

            let decoded = match self.shared.platform.layer_stats_encoded(layer_name).await {
                Ok(raw) => decode_layer_stats(&raw),
                Err(e) => {
                    warn!(layer = layer_name, error = %e, "Layer stats query failed");
                    return LayerStats::default();
                }
            };

            match decoded {
                Ok(Some((total_size, total_tiles))) => {
                    return LayerStats {
                        total_size,
                        total_tiles,
                    };
                }
                Ok(None) => debug!(layer = layer_name, attempt, "Layer stats not ready"),
                Err(e) => {
                    warn!(layer = layer_name, error = %e, "Undecodable layer stats");
                    return LayerStats::default();
                }
            }
        }

        LayerStats::default()
    }
}

/// Sleeps for `duration`. Returns `false` if cancelled first.
async fn sleep_unless_cancelled(cancel: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

async fn pump_events(
    shared: Arc<Shared>,
    generation: u64,
    mut events: mpsc::UnboundedReceiver<DownloadEvent>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            event = events.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        let outcome = match event {
            DownloadEvent::Progress(percent) => {
                shared.publish(generation, |state| {
                    state.progress = percent.clamp(0.0, 100.0);
                });
                continue;
            }
            DownloadEvent::Completed { success: true } => DownloadOutcome::Completed,
            DownloadEvent::Completed { success: false } => {
                DownloadOutcome::Failed("download finished incomplete".to_string())
            }
            DownloadEvent::Failed(message) => DownloadOutcome::Failed(message),
        };

        debug!(generation, ?outcome, "Platform reported end of download");
        cancel.cancel();
        shared.finish_run(generation, outcome);
        break;
    }
}

async fn poll_until_done(
    shared: Arc<Shared>,
    key: RegionKey,
    generation: u64,
    cancel: CancellationToken,
) {
    let config = shared.config.clone();
    if !sleep_unless_cancelled(&cancel, config.grace_delay).await {
        return;
    }

    let mut detector =
        StallDetector::new(config.initial_stall_threshold, config.max_stall_threshold);

    while shared.is_current(generation) {
        match shared.query_status(&key).await {
            Ok(Some(status)) if status.is_complete => {
                info!(key = %key, tiles = status.downloaded_tiles, "Region download complete");
                cancel.cancel();
                shared.finish_run(generation, DownloadOutcome::Completed);
                return;
            }
            Ok(Some(status)) => {
                if let Some(percent) = status.percent() {
                    shared.publish(generation, |state| state.progress = percent);
                }

                match detector.observe(status.downloaded_tiles) {
                    StallVerdict::Resume => {
                        warn!(
                            key = %key,
                            downloaded = status.downloaded_tiles,
                            next_threshold = detector.threshold(),
                            "Download stalled, requesting resume"
                        );
                        if let Err(e) = shared.platform.resume_download(&key).await {
                            warn!(key = %key, error = %e, "Resume request failed");
                        }
                        if !sleep_unless_cancelled(&cancel, config.resume_cooldown).await {
                            return;
                        }
                    }
                    StallVerdict::Stalled(polls) => {
                        debug!(key = %key, polls, threshold = detector.threshold(), "No new tiles");
                    }
                    StallVerdict::Progressing | StallVerdict::Idle => {}
                }
            }
            Ok(None) => debug!(key = %key, "Platform has no status for region yet"),
            Err(e) => warn!(key = %key, error = %e, "Region status poll failed"),
        }

        if !sleep_unless_cancelled(&cancel, config.poll_interval).await {
            return;
        }
    }
}
