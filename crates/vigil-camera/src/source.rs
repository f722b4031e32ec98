//! Frame source abstraction — the external boundary a camera worker
//! pulls from. A real implementation might wrap an RTSP grabber or a
//! browser's single-shot upload queue; that's out of scope beyond this
//! trait's contract.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::Result;

/// One captured frame.
#[derive(Debug, Clone)]
pub struct Frame {
    pub jpeg_bytes: Vec<u8>,
    pub captured_at: DateTime<Utc>,
}

/// A connectable source of frames. `connect` may be retried by the
/// worker's state machine; `next_frame` is called repeatedly while
/// streaming and should return the most recent frame available,
/// discarding any backlog so the worker favors freshness over
/// completeness.
#[async_trait]
pub trait FrameSource: Send {
    async fn connect(&mut self) -> Result<()>;
    async fn next_frame(&mut self) -> Result<Frame>;
    async fn disconnect(&mut self);
}

pub type BoxedFrameSource = Box<dyn FrameSource>;

/// A scripted frame source for tests: connects after `fail_connects`
/// failures, then yields frames from a fixed list before reporting
/// disconnection.
pub struct MockFrameSource {
    frames: Vec<Vec<u8>>,
    cursor: usize,
    connect_attempts: u32,
    fail_connects: u32,
    connected: bool,
}

impl MockFrameSource {
    pub fn new(frames: Vec<Vec<u8>>) -> Self {
        Self {
            frames,
            cursor: 0,
            connect_attempts: 0,
            fail_connects: 0,
            connected: false,
        }
    }

    /// Fail the first `n` connect attempts before succeeding.
    pub fn failing_connects(mut self, n: u32) -> Self {
        self.fail_connects = n;
        self
    }
}

#[async_trait]
impl FrameSource for MockFrameSource {
    async fn connect(&mut self) -> Result<()> {
        self.connect_attempts += 1;
        if self.connect_attempts <= self.fail_connects {
            return Err(crate::error::CameraError::ConnectFailed(format!(
                "attempt {}",
                self.connect_attempts
            )));
        }
        self.connected = true;
        Ok(())
    }

    async fn next_frame(&mut self) -> Result<Frame> {
        if !self.connected {
            return Err(crate::error::CameraError::SourceDisconnected(
                "not connected".into(),
            ));
        }
        if self.cursor >= self.frames.len() {
            return Err(crate::error::CameraError::SourceDisconnected(
                "no more frames".into(),
            ));
        }
        let bytes = self.frames[self.cursor].clone();
        self.cursor += 1;
        Ok(Frame {
            jpeg_bytes: bytes,
            captured_at: Utc::now(),
        })
    }

    async fn disconnect(&mut self) {
        self.connected = false;
    }
}
