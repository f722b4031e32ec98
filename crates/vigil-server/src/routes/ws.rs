//! WebSocket surface: per-camera frame+event stream, and the
//! aggregated all-rooms presence feed.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use vigil_hub::{Payload, SubscriptionKind};
use vigil_types::{CameraId, PresenceDelta};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/ws/cameras/{id}/stream", get(camera_stream_handler))
        .route("/ws/rooms/all/presence", get(rooms_all_presence_handler))
}

async fn camera_stream_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Response {
    let camera_id = CameraId::new(id);
    ws.on_upgrade(move |socket| handle_camera_stream(socket, state, camera_id))
}

async fn handle_camera_stream(socket: WebSocket, state: AppState, camera_id: CameraId) {
    let (mut sender, mut receiver) = socket.split();
    let topic = vigil_hub::camera_topic(camera_id);
    let sub = state.hub.subscribe(topic, SubscriptionKind::Both);

    loop {
        tokio::select! {
            msg = sub.recv() => {
                let Some(msg) = msg else { break };
                let outgoing = match msg.payload {
                    Payload::Frame(bytes) => Message::Binary(bytes.into()),
                    Payload::Event(json) => Message::Text(json.to_string().into()),
                };
                if sender.send(outgoing).await.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    // Clients don't send meaningful frames on this socket;
                    // anything else is read and discarded.
                    Some(Ok(_)) => {}
                }
            }
        }
    }
}

async fn rooms_all_presence_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_rooms_all_presence(socket, state))
}

async fn handle_rooms_all_presence(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let sub = state
        .hub
        .subscribe(vigil_hub::ROOMS_ALL_TOPIC, SubscriptionKind::Events);

    let (initial_rooms, total_people) = state.presence.snapshot_all(Utc::now());
    let initial = serde_json::json!({
        "type": "initial_all_presence",
        "rooms": initial_rooms,
        "total_people": total_people,
    });
    if sender.send(Message::Text(initial.to_string().into())).await.is_err() {
        return;
    }

    let mut refresh = tokio::time::interval(state.config.presence.refresh_period());

    loop {
        tokio::select! {
            msg = sub.recv() => {
                let Some(msg) = msg else { break };
                if let Payload::Event(json) = msg.payload {
                    let Ok(delta) = serde_json::from_value::<PresenceDelta>(json) else { continue };
                    let room_name = state.store.get_room(delta.room_id).map(|r| r.name).unwrap_or_default();
                    let occupants = state.presence.snapshot(delta.room_id, delta.timestamp);
                    let envelope = serde_json::json!({
                        "type": "presence_update",
                        "room_id": delta.room_id,
                        "room_name": room_name,
                        "total_count": occupants.len(),
                        "occupants": occupants,
                    });
                    if sender.send(Message::Text(envelope.to_string().into())).await.is_err() {
                        break;
                    }
                }
            }
            _ = refresh.tick() => {
                let (rooms, total_people) = state.presence.snapshot_all(Utc::now());
                let envelope = serde_json::json!({
                    "type": "all_presence_refresh",
                    "rooms": rooms,
                    "total_people": total_people,
                });
                if sender.send(Message::Text(envelope.to_string().into())).await.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }
}
