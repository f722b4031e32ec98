//! Cross-camera room presence tracker.

mod error;
mod tracker;

pub use error::{PresenceError, Result};
pub use tracker::PresenceTracker;

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use vigil_types::PresenceDelta;

/// Spawn the periodic eviction sweep. Every
/// tick, expired entries are removed and each resulting delta is handed
/// to `on_delta` — typically a closure that republishes onto the
/// subscription hub. The task exits as soon as `cancel` fires.
pub fn spawn_eviction_loop(
    tracker: Arc<PresenceTracker>,
    period: Duration,
    cancel: CancellationToken,
    on_delta: impl Fn(PresenceDelta) + Send + Sync + 'static,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    let now = chrono::Utc::now();
                    for delta in tracker.sweep_expired(now) {
                        on_delta(delta);
                    }
                }
            }
        }
    })
}
