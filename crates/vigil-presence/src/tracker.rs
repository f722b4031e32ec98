//! Presence tracker (C8): `(room, person) -> last-seen` with TTL.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use vigil_types::{CameraId, PersonId, PresenceChangeKind, PresenceDelta, PresenceEntry, RoomId};

#[derive(Debug, Clone)]
struct Entry {
    camera_id: CameraId,
    last_seen: DateTime<Utc>,
    confidence: f32,
}

/// Presence tracker. A single lock covers the whole map; `touch` is
/// O(1), `snapshot` is O(|room|) and never mutates, and eviction is the
/// only mutator besides `touch`.
pub struct PresenceTracker {
    ttl: Duration,
    map: Mutex<HashMap<(RoomId, PersonId), Entry>>,
}

impl PresenceTracker {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            map: Mutex::new(HashMap::new()),
        }
    }

    /// Upsert a sighting. Returns a delta describing whether this person
    /// was newly added to the room or just refreshed, with the room's
    /// occupant count immediately after the update.
    pub fn touch(
        &self,
        room_id: RoomId,
        person_id: PersonId,
        camera_id: CameraId,
        now: DateTime<Utc>,
        confidence: f32,
    ) -> PresenceDelta {
        let mut map = self.map.lock();
        let key = (room_id, person_id);
        let kind = if map.contains_key(&key) {
            PresenceChangeKind::Refreshed
        } else {
            PresenceChangeKind::Added
        };
        map.insert(
            key,
            Entry {
                camera_id,
                last_seen: now,
                confidence,
            },
        );
        let occupant_count = count_unexpired_in_room(&map, room_id, now, self.ttl);
        drop(map);

        PresenceDelta {
            room_id,
            person_id,
            kind,
            occupant_count,
            timestamp: now,
        }
    }

    /// Unexpired entries in one room, sorted by `last_seen` descending.
    /// Never mutates the map.
    pub fn snapshot(&self, room_id: RoomId, now: DateTime<Utc>) -> Vec<PresenceEntry> {
        let map = self.map.lock();
        let mut entries: Vec<PresenceEntry> = map
            .iter()
            .filter(|((r, _), e)| *r == room_id && !is_expired(e, now, self.ttl))
            .map(|((_, p), e)| PresenceEntry {
                room_id,
                person_id: *p,
                camera_id: e.camera_id,
                last_seen: e.last_seen,
                confidence: e.confidence,
            })
            .collect();
        entries.sort_by(|a, b| b.last_seen.cmp(&a.last_seen));
        entries
    }

    /// Per-room snapshots for every room with at least one live entry,
    /// plus the number of distinct people present anywhere.
    pub fn snapshot_all(&self, now: DateTime<Utc>) -> (HashMap<RoomId, Vec<PresenceEntry>>, usize) {
        let map = self.map.lock();
        let mut by_room: HashMap<RoomId, Vec<PresenceEntry>> = HashMap::new();
        let mut distinct_people = std::collections::HashSet::new();

        for ((room_id, person_id), entry) in map.iter() {
            if is_expired(entry, now, self.ttl) {
                continue;
            }
            distinct_people.insert(*person_id);
            by_room.entry(*room_id).or_default().push(PresenceEntry {
                room_id: *room_id,
                person_id: *person_id,
                camera_id: entry.camera_id,
                last_seen: entry.last_seen,
                confidence: entry.confidence,
            });
        }
        drop(map);

        for entries in by_room.values_mut() {
            entries.sort_by(|a, b| b.last_seen.cmp(&a.last_seen));
        }
        (by_room, distinct_people.len())
    }

    /// The most-recently-seen room a person is present in, if any entry
    /// for them hasn't expired.
    pub fn locate(&self, person_id: PersonId, now: DateTime<Utc>) -> Option<RoomId> {
        let map = self.map.lock();
        map.iter()
            .filter(|((_, p), e)| *p == person_id && !is_expired(e, now, self.ttl))
            .max_by_key(|(_, e)| e.last_seen)
            .map(|((room_id, _), _)| *room_id)
    }

    /// Remove every entry older than the TTL and return one
    /// [`PresenceDelta`] per evicted `(room, person)`, with each room's
    /// occupant count recomputed after its removals. The only mutator
    /// besides `touch`.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> Vec<PresenceDelta> {
        let mut map = self.map.lock();
        let expired_keys: Vec<(RoomId, PersonId)> = map
            .iter()
            .filter(|(_, e)| is_expired(e, now, self.ttl))
            .map(|(k, _)| *k)
            .collect();

        for key in &expired_keys {
            map.remove(key);
        }

        let deltas = expired_keys
            .into_iter()
            .map(|(room_id, person_id)| {
                let occupant_count = count_unexpired_in_room(&map, room_id, now, self.ttl);
                PresenceDelta {
                    room_id,
                    person_id,
                    kind: PresenceChangeKind::Expired,
                    occupant_count,
                    timestamp: now,
                }
            })
            .collect();
        drop(map);
        deltas
    }

    /// Drop every entry for `person_id`, across all rooms. Used when a
    /// person is deleted upstream so their presence doesn't linger until
    /// it expires on its own.
    pub fn remove_person(&self, person_id: PersonId) {
        let mut map = self.map.lock();
        map.retain(|(_, p), _| *p != person_id);
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

fn is_expired(entry: &Entry, now: DateTime<Utc>, ttl: Duration) -> bool {
    match chrono::Duration::from_std(ttl) {
        Ok(ttl) => now.signed_duration_since(entry.last_seen) > ttl,
        Err(_) => false,
    }
}

fn count_unexpired_in_room(
    map: &HashMap<(RoomId, PersonId), Entry>,
    room_id: RoomId,
    now: DateTime<Utc>,
    ttl: Duration,
) -> usize {
    map.iter()
        .filter(|((r, _), e)| *r == room_id && !is_expired(e, now, ttl))
        .count()
}
