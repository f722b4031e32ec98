//! On-disk layout for the two index artifacts.
//!
//! * The vector store is the raw `f32` embeddings, little-endian,
//!   concatenated in slot order.
//! * The slot map is a parallel sequence of `(slot_id: i64, person_id:
//!   i64)` pairs, little-endian, in the same order.
//!
//! Both are rewritten atomically (temp file + rename) on every
//! `persist()` call so a reader never observes a half-written snapshot.

use crate::error::{IndexError, Result};
use crate::Slot;
use std::path::Path;
use vigil_types::{PersonId, SlotId};

const SLOT_MAP_ENTRY_LEN: usize = 16;

pub(crate) fn write_atomic(
    vector_path: &Path,
    slot_map_path: &Path,
    slots: &[Slot],
    dim: usize,
) -> Result<()> {
    let mut vector_bytes = Vec::with_capacity(slots.len() * dim * 4);
    let mut slot_map_bytes = Vec::with_capacity(slots.len() * SLOT_MAP_ENTRY_LEN);

    for slot in slots {
        debug_assert_eq!(slot.vector.len(), dim);
        for component in &slot.vector {
            vector_bytes.extend_from_slice(&component.to_le_bytes());
        }
        slot_map_bytes.extend_from_slice(&slot.id.get().to_le_bytes());
        slot_map_bytes.extend_from_slice(&slot.person_id.get().to_le_bytes());
    }

    write_atomic_file(vector_path, &vector_bytes)?;
    write_atomic_file(slot_map_path, &slot_map_bytes)?;
    Ok(())
}

fn write_atomic_file(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, bytes)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

pub(crate) fn read(vector_path: &Path, slot_map_path: &Path, dim: usize) -> Result<Vec<Slot>> {
    let vector_bytes = std::fs::read(vector_path)?;
    let slot_map_bytes = std::fs::read(slot_map_path)?;

    if slot_map_bytes.len() % SLOT_MAP_ENTRY_LEN != 0 {
        return Err(IndexError::CorruptIndex(
            "slot map length is not a multiple of the entry size".to_string(),
        ));
    }
    let slot_count = slot_map_bytes.len() / SLOT_MAP_ENTRY_LEN;

    let expected_vector_len = slot_count * dim * 4;
    if vector_bytes.len() != expected_vector_len {
        return Err(IndexError::CorruptIndex(format!(
            "vector store has {} bytes, expected {} for {} slots of dimension {}",
            vector_bytes.len(),
            expected_vector_len,
            slot_count,
            dim
        )));
    }

    let mut slots = Vec::with_capacity(slot_count);
    for i in 0..slot_count {
        let entry = &slot_map_bytes[i * SLOT_MAP_ENTRY_LEN..(i + 1) * SLOT_MAP_ENTRY_LEN];
        let slot_id = i64::from_le_bytes(entry[0..8].try_into().unwrap());
        let person_id = i64::from_le_bytes(entry[8..16].try_into().unwrap());

        let vector_start = i * dim * 4;
        let mut vector = Vec::with_capacity(dim);
        for j in 0..dim {
            let start = vector_start + j * 4;
            let component = f32::from_le_bytes(
                vector_bytes[start..start + 4].try_into().unwrap(),
            );
            vector.push(component);
        }

        slots.push(Slot {
            id: SlotId::new(slot_id),
            person_id: PersonId::new(person_id),
            vector,
        });
    }

    Ok(slots)
}
