//! Enrollment coordinator (C4): raw images → C1 → quality gate → C2+C3.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex as AsyncMutex;
use vigil_index::SimilarityIndex;
use vigil_store::Store;
use vigil_types::{EnrollSkipReason, EnrollSummary, PersonId};

use crate::detector::SharedFaceDetector;
use crate::error::VisionError;
use crate::Result;

/// C4. Holds a per-person lock map so two `enroll` calls for the same
/// person serialize while different people proceed concurrently.
pub struct EnrollmentCoordinator {
    store: Arc<Store>,
    index: Arc<SimilarityIndex>,
    detector: SharedFaceDetector,
    image_root: PathBuf,
    q_min: f32,
    a_min: u64,
    max_images_per_person: usize,
    image_processing_timeout: Duration,
    person_locks: parking_lot::Mutex<HashMap<PersonId, Arc<AsyncMutex<()>>>>,
}

impl EnrollmentCoordinator {
    pub fn new(
        store: Arc<Store>,
        index: Arc<SimilarityIndex>,
        detector: SharedFaceDetector,
        image_root: impl Into<PathBuf>,
        q_min: f32,
        a_min: u64,
        max_images_per_person: usize,
        image_processing_timeout: Duration,
    ) -> Self {
        Self {
            store,
            index,
            detector,
            image_root: image_root.into(),
            q_min,
            a_min,
            max_images_per_person,
            image_processing_timeout,
            person_locks: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    fn lock_for(&self, person_id: PersonId) -> Arc<AsyncMutex<()>> {
        self.person_locks
            .lock()
            .entry(person_id)
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Enroll a batch of raw images for an already-existing person. Bad
    /// images are skipped and counted by reason; the call only fails
    /// wholesale if the person doesn't exist or the batch exceeds
    /// `max_images_per_person`.
    pub async fn enroll(&self, person_id: PersonId, raw_images: Vec<Vec<u8>>) -> Result<EnrollSummary> {
        if raw_images.len() > self.max_images_per_person {
            return Err(VisionError::TooManyImages {
                count: raw_images.len(),
                limit: self.max_images_per_person,
            });
        }

        let person = self
            .store
            .get_person(person_id)
            .map_err(|_| VisionError::PersonNotFound(person_id.get()))?;

        let lock = self.lock_for(person_id);
        let _guard = lock.lock().await;

        let mut summary = EnrollSummary::default();

        for bytes in raw_images {
            match self.enroll_one(person_id, &person.external_id, &bytes).await {
                Ok(reference_id) => {
                    summary.successful += 1;
                    summary.new_reference_ids.push(reference_id);
                }
                Err(reason) => summary.skipped.push(reason),
            }
        }

        Ok(summary)
    }

    async fn enroll_one(
        &self,
        person_id: PersonId,
        external_id: &str,
        bytes: &[u8],
    ) -> std::result::Result<vigil_types::ReferenceId, EnrollSkipReason> {
        let image = image::load_from_memory(bytes).map_err(|_| EnrollSkipReason::Decode)?;

        let faces = tokio::time::timeout(self.image_processing_timeout, self.detector.detect(&image))
            .await
            .map_err(|_| EnrollSkipReason::Timeout)?
            .map_err(|_| EnrollSkipReason::Decode)?;

        if faces.is_empty() {
            return Err(EnrollSkipReason::NoFace);
        }
        if faces.len() > 1 {
            return Err(EnrollSkipReason::MultiFace);
        }
        let face = &faces[0];
        if face.quality < self.q_min || face.bbox.area() < self.a_min {
            return Err(EnrollSkipReason::LowQuality);
        }

        let image_path = self
            .write_image(external_id, bytes)
            .map_err(|_| EnrollSkipReason::Decode)?;

        let record = self
            .store
            .insert_reference_embedding(person_id, &image_path, &face.embedding)
            .map_err(|_| EnrollSkipReason::Decode)?;

        // Compensating rollback: the mock detector always emits vectors
        // of the right length, so this path is a defensive invariant
        // check, not a normal skip reason.
        if let Err(e) = self.index.add(person_id, &face.embedding) {
            let _ = self.store.delete_reference_embedding(record.id);
            tracing::error!(error = %e, "index add failed after store insert; rolled back");
            return Err(EnrollSkipReason::Decode);
        }

        Ok(record.id)
    }

    fn write_image(&self, external_id: &str, bytes: &[u8]) -> std::io::Result<String> {
        let dir: PathBuf = self.image_root.join(external_id);
        std::fs::create_dir_all(&dir)?;
        let filename = format!("{}.jpg", uuid::Uuid::new_v4());
        let path = dir.join(filename);
        std::fs::write(&path, bytes)?;
        Ok(path_to_string(&path))
    }
}

fn path_to_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::MockFaceDetector;
    use image::{ImageEncoder, codecs::png::PngEncoder};

    fn make_store_and_person() -> (Arc<Store>, PersonId) {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let person = store
            .create_person(vigil_store::NewPerson {
                external_id: "p1",
                first_name: "A",
                last_name: "B",
                group: None,
            })
            .unwrap();
        (store, person.id)
    }

    fn png_bytes(w: u32, h: u32) -> Vec<u8> {
        let img = image::RgbImage::new(w, h);
        let mut out = Vec::new();
        PngEncoder::new(&mut out)
            .write_image(img.as_raw(), w, h, image::ExtendedColorType::Rgb8)
            .unwrap();
        out
    }

    fn coordinator(store: Arc<Store>, dir: &tempfile::TempDir) -> (EnrollmentCoordinator, Arc<SimilarityIndex>) {
        let index = Arc::new(SimilarityIndex::new(dir.path().join("v"), dir.path().join("s")));
        let coordinator = EnrollmentCoordinator::new(
            store,
            index.clone(),
            Arc::new(MockFaceDetector::new()),
            dir.path().join("images"),
            0.0,
            0,
            10,
            Duration::from_secs(5),
        );
        (coordinator, index)
    }

    #[tokio::test]
    async fn valid_image_is_enrolled_into_store_and_index() {
        let (store, person_id) = make_store_and_person();
        let dir = tempfile::tempdir().unwrap();
        let (coordinator, index) = coordinator(store.clone(), &dir);

        let summary = coordinator
            .enroll(person_id, vec![png_bytes(64, 64)])
            .await
            .unwrap();

        assert_eq!(summary.successful, 1);
        assert_eq!(summary.new_reference_ids.len(), 1);
        assert_eq!(index.size(), 1);
        assert_eq!(store.count_reference_embeddings(person_id).unwrap(), 1);
    }

    #[tokio::test]
    async fn undecodable_bytes_are_skipped_as_decode_error() {
        let (store, person_id) = make_store_and_person();
        let dir = tempfile::tempdir().unwrap();
        let (coordinator, _index) = coordinator(store, &dir);

        let summary = coordinator
            .enroll(person_id, vec![b"not an image".to_vec()])
            .await
            .unwrap();

        assert_eq!(summary.successful, 0);
        assert_eq!(summary.skip_count(EnrollSkipReason::Decode), 1);
    }

    #[tokio::test]
    async fn too_many_images_fails_the_whole_call() {
        let (store, person_id) = make_store_and_person();
        let dir = tempfile::tempdir().unwrap();
        let (coordinator, _index) = coordinator(store, &dir);

        let err = coordinator
            .enroll(person_id, vec![png_bytes(8, 8); 11])
            .await
            .unwrap_err();
        assert!(matches!(err, VisionError::TooManyImages { .. }));
    }

    #[tokio::test]
    async fn low_quality_area_is_skipped() {
        let (store, person_id) = make_store_and_person();
        let dir = tempfile::tempdir().unwrap();
        let index = Arc::new(SimilarityIndex::new(dir.path().join("v"), dir.path().join("s")));
        let coordinator = EnrollmentCoordinator::new(
            store.clone(),
            index,
            Arc::new(MockFaceDetector::new()),
            dir.path().join("images"),
            0.0,
            10_000, // a_min higher than any bbox area produced below
            10,
            Duration::from_secs(5),
        );

        let summary = coordinator
            .enroll(person_id, vec![png_bytes(8, 8)])
            .await
            .unwrap();
        assert_eq!(summary.skip_count(EnrollSkipReason::LowQuality), 1);
    }

    #[tokio::test]
    async fn unknown_person_fails_wholesale() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let dir = tempfile::tempdir().unwrap();
        let (coordinator, _index) = coordinator(store, &dir);

        let err = coordinator
            .enroll(PersonId::new(999), vec![png_bytes(8, 8)])
            .await
            .unwrap_err();
        assert!(matches!(err, VisionError::PersonNotFound(999)));
    }
}
