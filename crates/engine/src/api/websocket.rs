//! WebSocket feed of lifecycle events for stream overlays.
//!
//! Each connection watches one campaign. The feed is one-way: client text
//! frames are ignored, pings are answered.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::Response,
};
use critcast_domain::CampaignId;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use crate::app::App;
use crate::infrastructure::broadcast::CampaignEvent;

/// Buffer for control frames queued by the receive loop.
const CONTROL_CHANNEL_BUFFER: usize = 16;

/// WebSocket upgrade handler - entry point for overlay connections.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app): State<Arc<App>>,
    Path(id): Path<Uuid>,
) -> Response {
    let campaign_id = CampaignId::from_uuid(id);
    // Subscribe before the upgrade so nothing published in between is missed
    let events = app.broadcaster.subscribe();
    ws.on_upgrade(move |socket| handle_socket(socket, campaign_id, events))
}

async fn handle_socket(
    socket: WebSocket,
    campaign_id: CampaignId,
    mut events: broadcast::Receiver<CampaignEvent>,
) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (control_tx, mut control_rx) = mpsc::channel::<Message>(CONTROL_CHANNEL_BUFFER);

    tracing::info!(campaign_id = %campaign_id, "Overlay connected");

    let send_task = tokio::spawn(async move {
        loop {
            let outgoing = tokio::select! {
                control = control_rx.recv() => match control {
                    Some(msg) => msg,
                    None => break,
                },
                received = events.recv() => match received {
                    Ok(published) if published.campaign_id == campaign_id => {
                        match serde_json::to_string(&published.event) {
                            Ok(json) => Message::Text(json.into()),
                            Err(e) => {
                                tracing::error!(error = %e, "Failed to serialize lifecycle event");
                                continue;
                            }
                        }
                    }
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(
                            campaign_id = %campaign_id,
                            skipped,
                            "Overlay lagged; events dropped"
                        );
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            };
            if ws_sender.send(outgoing).await.is_err() {
                break;
            }
        }
    });

    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(Message::Ping(payload)) => {
                let _ = control_tx.try_send(Message::Pong(payload));
            }
            Ok(Message::Close(_)) => {
                tracing::info!(campaign_id = %campaign_id, "WebSocket closed by client");
                break;
            }
            Err(e) => {
                tracing::error!(campaign_id = %campaign_id, error = %e, "WebSocket error");
                break;
            }
            _ => {}
        }
    }

    send_task.abort();
    tracing::info!(campaign_id = %campaign_id, "Overlay disconnected");
}
