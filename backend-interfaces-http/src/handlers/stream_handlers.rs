use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use backend_application::AppState;
use backend_domain::{AttendanceEvent, SchoolId};

use crate::error::HttpError;
use crate::middleware::authorize;

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    pub school_id: Option<i64>,
    /// Browsers cannot set headers on a websocket handshake.
    pub token: Option<String>,
}

/// Live feed of committed records for one school, one JSON text frame per record.
pub async fn attendance_stream(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<StreamQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, HttpError> {
    let token_ok = match (&state.config.api_token, &query.token) {
        (Some(expected), Some(given)) => expected == given,
        _ => false,
    };
    if !token_ok && !authorize(&state.config, &headers) {
        return Err(HttpError::Unauthorized);
    }
    let school_id = match query.school_id {
        Some(id) if id > 0 => SchoolId(id),
        _ => return Err(HttpError::BadRequest("school_id is required".to_string())),
    };

    let receiver = state.stream_hub.subscribe(school_id).await;
    debug!(school_id = %school_id, "stream subscriber connected");
    Ok(ws.on_upgrade(move |socket| forward_events(socket, receiver, school_id)))
}

async fn forward_events(
    socket: WebSocket,
    mut receiver: broadcast::Receiver<AttendanceEvent>,
    school_id: SchoolId,
) {
    let (mut sink, mut incoming) = socket.split();
    loop {
        tokio::select! {
            received = receiver.recv() => match received {
                Ok(event) => {
                    let payload = match serde_json::to_string(&event) {
                        Ok(payload) => payload,
                        Err(err) => {
                            warn!("failed to encode attendance event {}: {}", event.id, err);
                            continue;
                        }
                    };
                    if sink.send(Message::Text(payload)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    warn!(school_id = %school_id, missed, "stream subscriber lagging, events dropped");
                }
                Err(RecvError::Closed) => break,
            },
            message = incoming.next() => match message {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
    debug!(school_id = %school_id, "stream subscriber disconnected");
}
