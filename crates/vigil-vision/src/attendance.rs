//! Attendance gate (C6): at most one attendance row per `(person, day)`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use vigil_store::{Store, StoreError};
use vigil_types::{AttendanceId, AttendanceOutcome, PersonId};

use crate::Result;

/// Outcome plus the row id when one was created, so a caller can later
/// attach a snapshot path without a second lookup.
#[derive(Debug, Clone, Copy)]
pub struct AttendanceResult {
    pub outcome: AttendanceOutcome,
    pub record_id: Option<AttendanceId>,
}

/// C6. Takes no in-process lock — correctness comes from the database's
/// `(person_id, day)` unique constraint, so two concurrent callers racing
/// on the same person/day are resolved by SQLite, not by this struct, and
/// the result is correct across a crash/restart in between.
pub struct AttendanceGate {
    store: Arc<Store>,
    timezone: Tz,
    attendance_min: f32,
}

impl AttendanceGate {
    pub fn new(store: Arc<Store>, timezone: Tz, attendance_min: f32) -> Self {
        Self {
            store,
            timezone,
            attendance_min,
        }
    }

    /// Record one recognition as an attendance event, or report why it
    /// wasn't recorded. `now` is evaluated against the configured time
    /// zone's *civil* calendar date, so a day with a repeated or skipped
    /// wall-clock hour around a DST transition still maps to exactly one
    /// `NaiveDate`.
    pub fn record(&self, person_id: PersonId, confidence: f32, now: DateTime<Utc>) -> Result<AttendanceResult> {
        if confidence < self.attendance_min {
            return Ok(AttendanceResult {
                outcome: AttendanceOutcome::Suppressed,
                record_id: None,
            });
        }

        let day = now.with_timezone(&self.timezone).date_naive();
        let time_of_day = now.with_timezone(&self.timezone).time();

        match self
            .store
            .insert_attendance(person_id, day, time_of_day, confidence, None)
        {
            Ok(record) => Ok(AttendanceResult {
                outcome: AttendanceOutcome::Created,
                record_id: Some(record.id),
            }),
            Err(StoreError::DuplicateAttendance { .. }) => Ok(AttendanceResult {
                outcome: AttendanceOutcome::Already,
                record_id: None,
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Attach a snapshot path to a row this gate just created. Called
    /// only after the caller has written the snapshot file to disk, per
    /// the write-after-insert ordering the service relies on.
    pub fn attach_snapshot(&self, record_id: AttendanceId, path: &str) -> Result<()> {
        self.store.set_attendance_snapshot(record_id, path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn gate() -> (AttendanceGate, Arc<Store>) {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let gate = AttendanceGate::new(store.clone(), chrono_tz::UTC, 0.6);
        (gate, store)
    }

    fn person(store: &Store) -> PersonId {
        store
            .create_person(vigil_store::NewPerson {
                external_id: "p1",
                first_name: "A",
                last_name: "B",
                group: None,
            })
            .unwrap()
            .id
    }

    #[test]
    fn low_confidence_is_suppressed_without_touching_the_store() {
        let (gate, store) = gate();
        let pid = person(&store);
        let now = Utc::now();
        let result = gate.record(pid, 0.3, now).unwrap();
        assert_eq!(result.outcome, AttendanceOutcome::Suppressed);
        assert!(result.record_id.is_none());
        assert!(store.attendance_for_person(pid, None, None).unwrap().is_empty());
    }

    #[test]
    fn second_call_same_day_reports_already() {
        let (gate, store) = gate();
        let pid = person(&store);
        let now = Utc::now();
        let first = gate.record(pid, 0.9, now).unwrap();
        assert_eq!(first.outcome, AttendanceOutcome::Created);

        let second = gate.record(pid, 0.95, now).unwrap();
        assert_eq!(second.outcome, AttendanceOutcome::Already);
        assert_eq!(store.attendance_for_person(pid, None, None).unwrap().len(), 1);
    }

    #[test]
    fn different_days_both_create() {
        let (gate, store) = gate();
        let pid = person(&store);
        let day1 = chrono_tz::UTC.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap();
        let day2 = chrono_tz::UTC.with_ymd_and_hms(2026, 1, 2, 9, 0, 0).unwrap();
        gate.record(pid, 0.9, day1.with_timezone(&Utc)).unwrap();
        gate.record(pid, 0.9, day2.with_timezone(&Utc)).unwrap();
        assert_eq!(store.attendance_for_person(pid, None, None).unwrap().len(), 2);
    }

    #[test]
    fn attach_snapshot_updates_the_row_after_creation() {
        let (gate, store) = gate();
        let pid = person(&store);
        let result = gate.record(pid, 0.9, Utc::now()).unwrap();
        let id = result.record_id.unwrap();
        gate.attach_snapshot(id, "/data/snapshots/p1-123.jpg").unwrap();

        let records = store.attendance_for_person(pid, None, None).unwrap();
        assert_eq!(records[0].snapshot_path.as_deref(), Some("/data/snapshots/p1-123.jpg"));
    }
}
