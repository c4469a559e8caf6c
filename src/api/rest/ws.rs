use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::SinkExt;
use futures::StreamExt;
use serde::Deserialize;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{info, warn};
use uuid::Uuid;

use crate::geo::GeoPoint;
use crate::state::AppState;

/// Inbound frame: a live position report from a driver's device.
#[derive(Deserialize)]
struct LocationUpdate {
    driver_id: Uuid,
    location: GeoPoint,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = BroadcastStream::new(state.dispatch_events_tx.subscribe());

    info!("websocket client connected");

    let send_task = tokio::spawn(async move {
        while let Some(event) = events.next().await {
            // A lagged receiver just skips ahead to live events.
            let Ok(dispatch) = event else { continue };

            let json = match serde_json::to_string(&dispatch) {
                Ok(json) => json,
                Err(err) => {
                    warn!(error = %err, "failed to serialize dispatch for ws");
                    continue;
                }
            };

            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    let recv_state = state.clone();
    let recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            let Message::Text(text) = message else { continue };

            let update = match serde_json::from_str::<LocationUpdate>(&text) {
                Ok(update) => update,
                Err(err) => {
                    warn!(error = %err, "malformed location update frame");
                    continue;
                }
            };

            if update.location.validate().is_err() {
                warn!(driver_id = %update.driver_id, "ignoring out-of-range location update");
                continue;
            }

            if recv_state
                .drivers
                .update_location(update.driver_id, update.location)
                .is_none()
            {
                warn!(driver_id = %update.driver_id, "location update for unknown driver");
            }
        }
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    info!("websocket client disconnected");
}
