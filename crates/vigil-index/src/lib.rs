//! In-memory similarity index over face embeddings.
//!
//! At N·K ≤ 10⁵ rows of D=512 `f32`, a full linear scan costs tens of
//! millions of FMAs per query — comfortably under 10ms on commodity
//! hardware, and trivially correct. There is no approximate structure to
//! keep consistent with persistence, and tie-breaks stay deterministic,
//! which matters more here than shaving a scan that is already cheap.

pub mod error;
mod snapshot;

pub use error::{IndexError, Result};

use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use vigil_types::{PersonId, SlotId, EMBEDDING_DIMENSION};

/// One scored search hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchHit {
    pub person_id: PersonId,
    pub score: f32,
}

struct Slot {
    id: SlotId,
    person_id: PersonId,
    vector: Vec<f32>,
}

struct IndexInner {
    slots: Vec<Slot>,
    next_slot_id: i64,
}

impl IndexInner {
    fn new() -> Self {
        Self {
            slots: Vec::new(),
            next_slot_id: 1,
        }
    }
}

/// The similarity index. Guarded by a single reader-writer lock: searches
/// take the read side, `add`/`remove_by_person`/`load` take the write
/// side. No two writers run concurrently.
pub struct SimilarityIndex {
    inner: RwLock<IndexInner>,
    dim: usize,
    vector_path: PathBuf,
    slot_map_path: PathBuf,
}

fn l2_normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 1e-12 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

impl SimilarityIndex {
    /// Create an empty index with the given artifact paths. Dimension is
    /// fixed at [`EMBEDDING_DIMENSION`] throughout the workspace.
    pub fn new(vector_path: impl Into<PathBuf>, slot_map_path: impl Into<PathBuf>) -> Self {
        Self {
            inner: RwLock::new(IndexInner::new()),
            dim: EMBEDDING_DIMENSION,
            vector_path: vector_path.into(),
            slot_map_path: slot_map_path.into(),
        }
    }

    #[cfg(test)]
    fn with_dim(dim: usize, vector_path: impl Into<PathBuf>, slot_map_path: impl Into<PathBuf>) -> Self {
        Self {
            inner: RwLock::new(IndexInner::new()),
            dim,
            vector_path: vector_path.into(),
            slot_map_path: slot_map_path.into(),
        }
    }

    /// Number of live slots.
    pub fn size(&self) -> usize {
        self.inner.read().slots.len()
    }

    /// Insert one embedding, L2-normalizing it first (a no-op within
    /// tolerance `1e-6` if it is already unit norm). Returns the new slot
    /// id, which is never reused for a different person for the lifetime
    /// of this index.
    pub fn add(&self, person_id: PersonId, vector: &[f32]) -> Result<SlotId> {
        if vector.len() != self.dim {
            return Err(IndexError::InvalidDimension {
                expected: self.dim,
                actual: vector.len(),
            });
        }
        let mut normalized = vector.to_vec();
        let norm_sq: f32 = vector.iter().map(|x| x * x).sum();
        if (norm_sq - 1.0).abs() > 1e-6 {
            l2_normalize(&mut normalized);
        }

        let mut inner = self.inner.write();
        let id = SlotId::new(inner.next_slot_id);
        inner.next_slot_id += 1;
        inner.slots.push(Slot {
            id,
            person_id,
            vector: normalized,
        });
        Ok(id)
    }

    /// Remove every slot owned by `person_id`. Remaining slots are
    /// compacted so the dense scan stays contiguous; their ids are
    /// unchanged. Never fails — removing a person with no slots is a
    /// no-op that returns `0`.
    pub fn remove_by_person(&self, person_id: PersonId) -> usize {
        let mut inner = self.inner.write();
        let before = inner.slots.len();
        inner.slots.retain(|s| s.person_id != person_id);
        before - inner.slots.len()
    }

    /// Top-k search by inner product (cosine similarity, since both sides
    /// are unit-norm). At most one row per person — if the same person
    /// owns multiple slots within the top-k, only their best-scoring slot
    /// is returned. Ties break by smaller `person_id`, then smaller
    /// `slot_id`.
    pub fn search(&self, query: &[f32], k: usize, min_score: f32) -> Result<Vec<SearchHit>> {
        if query.len() != self.dim {
            return Err(IndexError::InvalidDimension {
                expected: self.dim,
                actual: query.len(),
            });
        }
        let mut normalized = query.to_vec();
        let norm_sq: f32 = query.iter().map(|x| x * x).sum();
        if (norm_sq - 1.0).abs() > 1e-6 {
            l2_normalize(&mut normalized);
        }

        let inner = self.inner.read();

        // Best (score, slot_id) per person.
        let mut best_per_person: std::collections::HashMap<PersonId, (f32, SlotId)> =
            std::collections::HashMap::new();

        for slot in &inner.slots {
            let score: f32 = slot
                .vector
                .iter()
                .zip(normalized.iter())
                .map(|(a, b)| a * b)
                .sum();
            if score < min_score {
                continue;
            }
            best_per_person
                .entry(slot.person_id)
                .and_modify(|(best_score, best_id)| {
                    if score > *best_score || (score == *best_score && slot.id < *best_id) {
                        *best_score = score;
                        *best_id = slot.id;
                    }
                })
                .or_insert((score, slot.id));
        }

        let mut results: Vec<SearchHit> = best_per_person
            .into_iter()
            .map(|(person_id, (score, _slot_id))| SearchHit { person_id, score })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.person_id.cmp(&b.person_id))
        });
        results.truncate(k);
        Ok(results)
    }

    /// Snapshot the index to its two on-disk artifacts, each written to a
    /// temp path and atomically renamed into place.
    pub fn persist(&self) -> Result<()> {
        let inner = self.inner.read();
        snapshot::write_atomic(&self.vector_path, &self.slot_map_path, &inner.slots, self.dim)
    }

    /// Load the index from its two on-disk artifacts, replacing any
    /// in-memory state. If either artifact is absent, the index is left
    /// empty (first-start case). On corruption, the index is left empty
    /// and the error is returned to the caller.
    pub fn load(&self) -> Result<()> {
        if !self.vector_path.exists() && !self.slot_map_path.exists() {
            let mut inner = self.inner.write();
            *inner = IndexInner::new();
            return Ok(());
        }
        match snapshot::read(&self.vector_path, &self.slot_map_path, self.dim) {
            Ok(slots) => {
                let mut inner = self.inner.write();
                let next_slot_id = slots.iter().map(|s| s.id.get()).max().unwrap_or(0) + 1;
                inner.slots = slots;
                inner.next_slot_id = next_slot_id;
                Ok(())
            }
            Err(e) => {
                let mut inner = self.inner.write();
                *inner = IndexInner::new();
                Err(e)
            }
        }
    }
}
