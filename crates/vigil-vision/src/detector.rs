//! Face detection / embedding trait: the external boundary to whatever
//! model actually produces face embeddings.
//!
//! The embedding model itself lives outside this crate; it only defines
//! the seam and ships a deterministic mock so enrollment and recognition
//! can be built and tested against it.

use async_trait::async_trait;
use vigil_types::{BoundingBox, EMBEDDING_DIMENSION};

/// One detected face plus its quality score and embedding, as returned
/// by a single `detect` call.
#[derive(Debug, Clone)]
pub struct DetectedFace {
    pub bbox: BoundingBox,
    /// Detector-reported quality in `[0, 1]`; gated against `Q_MIN` /
    /// `Q_MIN_RECOGNIZE` by the caller, not by the detector itself.
    pub quality: f32,
    /// Unit-norm embedding of length [`EMBEDDING_DIMENSION`].
    pub embedding: Vec<f32>,
}

/// Trait for face detection + embedding providers (C1).
///
/// Implementations detect zero or more faces in a decoded image and
/// return a bounding box, quality score, and unit-norm embedding for
/// each. Detecting zero faces is not an error; it is communicated as an
/// empty `Vec`.
#[async_trait]
pub trait FaceDetector: Send + Sync {
    async fn detect(&self, image: &image::DynamicImage) -> crate::Result<Vec<DetectedFace>>;

    fn dimension(&self) -> usize {
        EMBEDDING_DIMENSION
    }

    fn name(&self) -> &str;
}

pub type SharedFaceDetector = std::sync::Arc<dyn FaceDetector>;

/// A deterministic mock detector for tests and for running the service
/// without a real model wired in. Always reports exactly one face
/// covering the whole frame, with a quality and embedding derived from a
/// hash of the pixel bytes so the same input always produces the same
/// output.
#[derive(Debug, Clone)]
pub struct MockFaceDetector {
    dimension: usize,
}

impl MockFaceDetector {
    pub fn new() -> Self {
        Self {
            dimension: EMBEDDING_DIMENSION,
        }
    }
}

impl Default for MockFaceDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FaceDetector for MockFaceDetector {
    async fn detect(&self, image: &image::DynamicImage) -> crate::Result<Vec<DetectedFace>> {
        let rgb = image.to_rgb8();
        let hash = simple_hash(rgb.as_raw());

        let mut embedding = vec![0.0f32; self.dimension];
        let mut state = hash;
        for slot in embedding.iter_mut() {
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            *slot = ((state >> 16) as f32 / 32_768.0) - 1.0;
        }
        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut embedding {
                *x /= norm;
            }
        }

        let quality = 0.5 + ((hash % 1000) as f32 / 2000.0);

        Ok(vec![DetectedFace {
            bbox: BoundingBox {
                x: 0,
                y: 0,
                width: image.width(),
                height: image.height(),
            },
            quality,
            embedding,
        }])
    }

    fn name(&self) -> &str {
        "mock"
    }
}

fn simple_hash(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 5381;
    for byte in bytes {
        hash = hash.wrapping_mul(33).wrapping_add(*byte as u64);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_image_produces_same_embedding() {
        let img = image::DynamicImage::new_rgb8(8, 8);
        let detector = MockFaceDetector::new();
        let a = detector.detect(&img).await.unwrap();
        let b = detector.detect(&img).await.unwrap();
        assert_eq!(a[0].embedding, b[0].embedding);
    }

    #[tokio::test]
    async fn embedding_is_unit_norm() {
        let mut img = image::RgbImage::new(4, 4);
        for (i, px) in img.pixels_mut().enumerate() {
            *px = image::Rgb([i as u8, (i * 2) as u8, (i * 3) as u8]);
        }
        let detector = MockFaceDetector::new();
        let faces = detector
            .detect(&image::DynamicImage::ImageRgb8(img))
            .await
            .unwrap();
        let norm: f32 = faces[0].embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }
}
