// Port for the platform's offline region download primitive
use crate::domain::region::{BoundingBox, RegionKey};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Everything the platform needs to begin downloading one region.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionDownloadRequest {
    pub key: RegionKey,
    pub style: String,
    pub bounds: BoundingBox,
    pub min_zoom: u8,
    pub max_zoom: u8,
}

/// Push notifications from the platform download.
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadEvent {
    /// Percent complete, 0 to 100.
    Progress(f64),
    Completed { success: bool },
    Failed(String),
}

/// Channel-backed observer handed to the platform.
///
/// Callbacks after the supervisor has moved on are silently dropped.
#[derive(Debug, Clone)]
pub struct DownloadObserver {
    tx: mpsc::UnboundedSender<DownloadEvent>,
}

impl DownloadObserver {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<DownloadEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn on_progress(&self, percent: f64) {
        let _ = self.tx.send(DownloadEvent::Progress(percent));
    }

    pub fn on_complete(&self, success: bool) {
        let _ = self.tx.send(DownloadEvent::Completed { success });
    }

    pub fn on_error(&self, message: impl Into<String>) {
        let _ = self.tx.send(DownloadEvent::Failed(message.into()));
    }
}

#[async_trait]
pub trait RegionDownloadPlatform: Send + Sync {
    /// Begin downloading a region. Returns once the download is registered.
    async fn download_region(
        &self,
        request: RegionDownloadRequest,
        observer: DownloadObserver,
    ) -> anyhow::Result<()>;

    async fn stop_download(&self, key: &RegionKey) -> anyhow::Result<()>;

    async fn resume_download(&self, key: &RegionKey) -> anyhow::Result<()>;

    /// `"downloaded,total,size,isComplete"`, or empty when unknown.
    async fn region_status_encoded(&self, key: &RegionKey) -> anyhow::Result<String>;

    /// `"totalSize,totalTiles"`; empty or `"-1,-1"` while not ready.
    async fn layer_stats_encoded(&self, layer_name: &str) -> anyhow::Result<String>;

    /// Synchronously delete stored tiles for a region. `Ok(false)` if nothing was deleted.
    async fn delete_region(&self, key: &RegionKey) -> anyhow::Result<bool>;
}
