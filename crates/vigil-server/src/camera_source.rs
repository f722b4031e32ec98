//! Stand-in frame source for the pluggable boundary C7 pulls from.
//!
//! The RTSP grabber itself is out of scope for this service; a real
//! deployment plugs a concrete `FrameSource` in here keyed by a camera's
//! `source_address`. Until that exists, every camera is backed by a
//! synthetic source that never disconnects, so `start`/`stop` and the
//! worker state machine are fully exercisable end to end.

use async_trait::async_trait;
use chrono::Utc;
use vigil_camera::{CameraError, Frame, FrameSource, Result};

pub struct SyntheticFrameSource {
    address: String,
    connected: bool,
}

impl SyntheticFrameSource {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            connected: false,
        }
    }

    fn frame_bytes(&self) -> Vec<u8> {
        use image::{ImageEncoder, codecs::png::PngEncoder};
        let img = image::RgbImage::from_pixel(16, 16, image::Rgb([128, 128, 128]));
        let mut out = Vec::new();
        let _ = PngEncoder::new(&mut out).write_image(
            img.as_raw(),
            16,
            16,
            image::ExtendedColorType::Rgb8,
        );
        out
    }
}

#[async_trait]
impl FrameSource for SyntheticFrameSource {
    async fn connect(&mut self) -> Result<()> {
        if self.address.is_empty() {
            return Err(CameraError::ConnectFailed("empty source address".into()));
        }
        self.connected = true;
        Ok(())
    }

    async fn next_frame(&mut self) -> Result<Frame> {
        if !self.connected {
            return Err(CameraError::SourceDisconnected(self.address.clone()));
        }
        tokio::time::sleep(std::time::Duration::from_millis(30)).await;
        Ok(Frame {
            jpeg_bytes: self.frame_bytes(),
            captured_at: Utc::now(),
        })
    }

    async fn disconnect(&mut self) {
        self.connected = false;
    }
}
