//! `rooms:all` aggregator: republishes every `room:<id>` delta
//! onto one topic so `/ws/rooms/all/presence` has a single subscription
//! to make regardless of how many rooms exist.

use std::collections::HashSet;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use vigil_hub::{Hub, Payload, SubscriptionKind};
use vigil_store::Store;
use vigil_types::RoomId;

/// Poll the store for rooms and keep one forwarding task per room alive,
/// forwarding `room:<id>` events onto `rooms:all`. Rooms are rarely
/// created/deleted relative to presence churn, so polling the store
/// (rather than threading a room-creation event through the hub) is
/// simple and cheap enough here.
pub fn spawn(hub: Arc<Hub>, store: Arc<Store>, poll_period: std::time::Duration, cancel: CancellationToken) {
    tokio::spawn(async move {
        let mut known: HashSet<RoomId> = HashSet::new();
        let mut interval = tokio::time::interval(poll_period);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = interval.tick() => {}
            }
            let rooms = match store.list_rooms() {
                Ok(rooms) => rooms,
                Err(e) => {
                    tracing::error!(error = %e, "aggregator failed to list rooms");
                    continue;
                }
            };
            for room in rooms {
                if known.insert(room.id) {
                    spawn_forwarder(hub.clone(), room.id, cancel.clone());
                }
            }
        }
    });
}

fn spawn_forwarder(hub: Arc<Hub>, room_id: RoomId, cancel: CancellationToken) {
    tokio::spawn(async move {
        let sub = hub.subscribe(vigil_hub::room_topic(room_id), SubscriptionKind::Events);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                msg = sub.recv() => {
                    match msg {
                        Some(msg) => {
                            if let Payload::Event(json) = msg.payload {
                                hub.publish(vigil_hub::ROOMS_ALL_TOPIC, Payload::Event(json));
                            }
                        }
                        None => return,
                    }
                }
            }
        }
    });
}
