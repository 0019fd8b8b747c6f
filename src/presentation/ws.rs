// WebSocket push channel for live track deltas
use crate::domain::track::TrackEvent;
use crate::presentation::app_state::AppState;
use axum::{
    extract::{
        State,
        ws::{Message, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures::{Sink, SinkExt, Stream, StreamExt};
use std::pin::pin;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

/// Upgrade to a WebSocket that streams every track event from now on.
pub async fn live_updates(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    // subscribe before the handshake so nothing published in between is lost
    let events = state.relay.subscribe();
    debug!(
        subscribers = state.relay.subscriber_count(),
        "WebSocket client subscribed"
    );
    ws.on_upgrade(move |socket| {
        let (sender, receiver) = socket.split();
        forward_events(sender, receiver, events)
    })
}

/// Pushes relay events to `sender` until the client closes or goes away.
///
/// A lagging client skips the events it missed. Frames sent by the client
/// other than close are ignored.
async fn forward_events<S, R, E>(
    mut sender: S,
    mut receiver: R,
    mut events: broadcast::Receiver<TrackEvent>,
) where
    S: Sink<Message> + Unpin,
    R: Stream<Item = Result<Message, E>> + Unpin,
{
    debug!("WebSocket client connected");

    let outgoing = async_stream::stream! {
        loop {
            match events.recv().await {
                Ok(event) => yield event,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "WebSocket client lagging, dropped track events");
                }
                Err(RecvError::Closed) => break,
            }
        }
    };
    let mut outgoing = pin!(outgoing);

    loop {
        tokio::select! {
            event = outgoing.next() => {
                let Some(event) = event else { break };
                let text = match serde_json::to_string(&event) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(error = %e, "Failed to encode track event");
                        continue;
                    }
                };
                if sender.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                // the channel is server-to-client only
                Some(Ok(_)) => {}
            },
        }
    }

    debug!("WebSocket client disconnected");
}
