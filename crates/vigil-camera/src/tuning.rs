//! Timing knobs a worker needs, decoupled from `vigil-config` so this
//! crate stays testable without pulling in the TOML loader.

use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct WorkerTuning {
    pub recognition_period: Duration,
    pub stream_period: Duration,
    pub event_cooldown: Duration,
    pub connect_timeout: Duration,
    pub shutdown_grace: Duration,
    pub backoff_initial: Duration,
    pub backoff_factor: u32,
    pub backoff_cap: Duration,
    pub persistence_fail_window: Duration,
}

impl Default for WorkerTuning {
    fn default() -> Self {
        Self {
            recognition_period: Duration::from_millis(500),
            stream_period: Duration::from_millis(100),
            event_cooldown: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(10),
            shutdown_grace: Duration::from_secs(5),
            backoff_initial: Duration::from_secs(1),
            backoff_factor: 2,
            backoff_cap: Duration::from_secs(30),
            persistence_fail_window: Duration::from_secs(30),
        }
    }
}
