//! Recognition engine (C5): one frame in, zero or more matches out.

use std::collections::HashMap;
use std::sync::Arc;

use vigil_index::SimilarityIndex;
use vigil_types::{Match, PersonId};

use crate::detector::SharedFaceDetector;
use crate::Result;

/// Stateless; safe to call concurrently from many camera workers sharing
/// the same index and detector.
pub struct RecognitionEngine {
    detector: SharedFaceDetector,
    index: Arc<SimilarityIndex>,
    q_min_recognize: f32,
    confidence_threshold: f32,
}

impl RecognitionEngine {
    pub fn new(
        detector: SharedFaceDetector,
        index: Arc<SimilarityIndex>,
        q_min_recognize: f32,
        confidence_threshold: f32,
    ) -> Self {
        Self {
            detector,
            index,
            q_min_recognize,
            confidence_threshold,
        }
    }

    /// Detect faces, drop low-quality ones, and search the index for
    /// each survivor. If the same person wins more than one face in a
    /// single frame, only the higher-scoring match is kept and the
    /// collision is logged — two faces resolving to one identity almost
    /// always means a detector artifact, not two enrolled people.
    pub async fn recognize(&self, image: &image::DynamicImage) -> Result<Vec<Match>> {
        let faces = self.detector.detect(image).await?;

        let mut best: HashMap<PersonId, Match> = HashMap::new();
        for face in faces {
            if face.quality < self.q_min_recognize {
                continue;
            }
            let hits = self
                .index
                .search(&face.embedding, 1, self.confidence_threshold)?;
            let Some(hit) = hits.into_iter().next() else {
                continue;
            };
            let candidate = Match {
                person_id: hit.person_id,
                confidence: hit.score,
                bbox: face.bbox,
            };
            match best.get(&hit.person_id) {
                Some(existing) if existing.confidence >= candidate.confidence => {
                    tracing::warn!(
                        person_id = hit.person_id.get(),
                        kept = existing.confidence,
                        dropped = candidate.confidence,
                        "two faces in one frame matched the same person; keeping the higher score"
                    );
                }
                Some(existing) => {
                    tracing::warn!(
                        person_id = hit.person_id.get(),
                        kept = candidate.confidence,
                        dropped = existing.confidence,
                        "two faces in one frame matched the same person; keeping the higher score"
                    );
                    best.insert(hit.person_id, candidate);
                }
                None => {
                    best.insert(hit.person_id, candidate);
                }
            }
        }

        Ok(best.into_values().collect())
    }

    /// Match a single still image against the index, distinguishing "no
    /// face in the image" from "face present but nothing matched" — a
    /// distinction the multi-face [`Self::recognize`] doesn't need to
    /// make since its callers only ever care about the matches that did
    /// land.
    pub async fn recognize_one(&self, image: &image::DynamicImage) -> Result<SingleRecognition> {
        let faces = self.detector.detect(image).await?;
        if faces.is_empty() {
            return Ok(SingleRecognition::NoFace);
        }

        let mut best: Option<Match> = None;
        for face in faces {
            if face.quality < self.q_min_recognize {
                continue;
            }
            let hits = self
                .index
                .search(&face.embedding, 1, self.confidence_threshold)?;
            let Some(hit) = hits.into_iter().next() else {
                continue;
            };
            let candidate = Match {
                person_id: hit.person_id,
                confidence: hit.score,
                bbox: face.bbox,
            };
            if best.as_ref().map_or(true, |b| candidate.confidence > b.confidence) {
                best = Some(candidate);
            }
        }

        Ok(match best {
            Some(m) => SingleRecognition::Matched(m),
            None => SingleRecognition::NoMatch,
        })
    }
}

/// Outcome of [`RecognitionEngine::recognize_one`].
#[derive(Debug, Clone, Copy)]
pub enum SingleRecognition {
    NoFace,
    NoMatch,
    Matched(Match),
}
