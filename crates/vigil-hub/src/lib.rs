//! Subscription hub (C9): topic broadcast with bounded per-subscriber
//! queues and drop-oldest backpressure.

mod error;
mod hub;
mod queue;

pub use error::{HubError, Result};
pub use hub::{Hub, HubMessage, Payload, Subscription, SubscriptionKind};

/// Topic name for a camera's frame + event stream.
pub fn camera_topic(camera_id: vigil_types::CameraId) -> String {
    format!("camera:{}", camera_id.get())
}

/// Topic name for one room's presence deltas.
pub fn room_topic(room_id: vigil_types::RoomId) -> String {
    format!("room:{}", room_id.get())
}

/// Topic name for the aggregated all-rooms presence feed.
pub const ROOMS_ALL_TOPIC: &str = "rooms:all";
