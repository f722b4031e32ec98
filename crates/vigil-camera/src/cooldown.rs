//! Per-camera cooldown map. Not persisted, not locked —
//! owned exclusively by the worker task that reads and writes it.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use vigil_types::PersonId;

pub struct CooldownMap {
    last_emitted: HashMap<PersonId, DateTime<Utc>>,
    cooldown: Duration,
}

impl CooldownMap {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            last_emitted: HashMap::new(),
            cooldown,
        }
    }

    /// True if `person_id` emitted an event within the cooldown window as
    /// of `now` — the caller should update presence only, skipping the
    /// attendance gate call. Does not mutate the map; call [`stamp`] after
    /// a non-suppressed match is processed.
    pub fn is_within_cooldown(&self, person_id: PersonId, now: DateTime<Utc>) -> bool {
        match self.last_emitted.get(&person_id) {
            Some(last) => match chrono::Duration::from_std(self.cooldown) {
                Ok(cooldown) => now.signed_duration_since(*last) < cooldown,
                Err(_) => false,
            },
            None => false,
        }
    }

    pub fn stamp(&mut self, person_id: PersonId, now: DateTime<Utc>) {
        self.last_emitted.insert(person_id, now);
    }
}
