// Live relay - Fan-out of track deltas to connected browsers
use crate::domain::track::TrackEvent;
use tokio::sync::broadcast;
use tracing::trace;

#[derive(Clone)]
pub struct LiveRelay {
    tx: broadcast::Sender<TrackEvent>,
}

impl LiveRelay {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Sends `event` to every subscriber. Returns how many received it.
    pub fn publish(&self, event: TrackEvent) -> usize {
        // no subscribers is fine: the relay carries deltas, not history
        let delivered = self.tx.send(event).unwrap_or(0);
        trace!(delivered, "Published track event");
        delivered
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TrackEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
