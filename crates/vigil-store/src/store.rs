//! SQLite-backed repository for persons, reference embeddings, attendance,
//! rooms, and cameras.

use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use vigil_types::{
    AttendanceId, AttendanceRecord, Camera, CameraId, CameraStatus, Person, PersonId,
    ReferenceEmbedding, ReferenceId, Room, RoomId,
};

use crate::error::{Result, StoreError};

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Fields needed to register a new person.
pub struct NewPerson<'a> {
    pub external_id: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub group: Option<&'a str>,
}

/// Fields needed to create a new room.
pub struct NewRoom<'a> {
    pub name: &'a str,
}

/// Fields needed to register a new camera.
pub struct NewCamera<'a> {
    pub room_id: RoomId,
    pub name: &'a str,
    pub source_address: &'a str,
}

/// Thread-safe repository over SQLite. Internal locking mirrors a single
/// writer connection; SQLite itself serializes writers, so this only
/// needs to keep Rust's borrow checker and `Send`/`Sync` happy.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open (or create) the database at `path`, enable WAL + foreign
    /// keys, and run any pending migrations.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    /// Open an in-memory database, primarily for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<()> {
        let mut conn = self.conn.lock();
        embedded::migrations::runner()
            .run(&mut *conn)
            .map_err(|e| StoreError::Migration(e.to_string()))?;
        Ok(())
    }

    fn conn(&self) -> parking_lot::MutexGuard<'_, Connection> {
        self.conn.lock()
    }

    // ── Persons ─────────────────────────────────────────────────────

    pub fn create_person(&self, new: NewPerson<'_>) -> Result<Person> {
        let now = Utc::now();
        let conn = self.conn();
        let result = conn.execute(
            "INSERT INTO persons (external_id, first_name, last_name, group_label, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                new.external_id,
                new.first_name,
                new.last_name,
                new.group,
                now.to_rfc3339()
            ],
        );
        match result {
            Ok(_) => Ok(Person {
                id: PersonId::new(conn.last_insert_rowid()),
                external_id: new.external_id.to_string(),
                first_name: new.first_name.to_string(),
                last_name: new.last_name.to_string(),
                group: new.group.map(str::to_string),
                created_at: now,
            }),
            Err(e) if is_unique_violation(&e) => {
                Err(StoreError::DuplicateExternalId(new.external_id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn get_person(&self, id: PersonId) -> Result<Person> {
        self.conn()
            .query_row(
                "SELECT id, external_id, first_name, last_name, group_label, created_at
                 FROM persons WHERE id = ?1",
                params![id.get()],
                row_to_person,
            )
            .optional()?
            .ok_or_else(|| StoreError::PersonNotFound(id.to_string()))
    }

    pub fn get_person_by_external_id(&self, external_id: &str) -> Result<Person> {
        self.conn()
            .query_row(
                "SELECT id, external_id, first_name, last_name, group_label, created_at
                 FROM persons WHERE external_id = ?1",
                params![external_id],
                row_to_person,
            )
            .optional()?
            .ok_or_else(|| StoreError::PersonNotFound(external_id.to_string()))
    }

    pub fn list_persons(&self, skip: i64, limit: i64) -> Result<Vec<Person>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, external_id, first_name, last_name, group_label, created_at
             FROM persons ORDER BY id LIMIT ?1 OFFSET ?2",
        )?;
        let rows = stmt
            .query_map(params![limit, skip], row_to_person)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Delete a person. Cascades to reference embeddings and attendance
    /// rows via `ON DELETE CASCADE`; the caller is still responsible for
    /// clearing the similarity index and presence tracker, which live
    /// outside this store.
    pub fn delete_person(&self, id: PersonId) -> Result<bool> {
        let deleted = self
            .conn()
            .execute("DELETE FROM persons WHERE id = ?1", params![id.get()])?;
        Ok(deleted > 0)
    }

    // ── Reference embeddings ───────────────────────────────────────

    pub fn insert_reference_embedding(
        &self,
        person_id: PersonId,
        image_path: &str,
        embedding: &[f32],
    ) -> Result<ReferenceEmbedding> {
        let now = Utc::now();
        let bytes = encode_embedding(embedding);
        let conn = self.conn();
        conn.execute(
            "INSERT INTO reference_embeddings (person_id, image_path, embedding, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![person_id.get(), image_path, bytes, now.to_rfc3339()],
        )?;
        Ok(ReferenceEmbedding {
            id: ReferenceId::new(conn.last_insert_rowid()),
            person_id,
            image_path: image_path.to_string(),
            created_at: now,
        })
    }

    pub fn delete_reference_embedding(&self, id: ReferenceId) -> Result<bool> {
        let deleted = self.conn().execute(
            "DELETE FROM reference_embeddings WHERE id = ?1",
            params![id.get()],
        )?;
        Ok(deleted > 0)
    }

    pub fn count_reference_embeddings(&self, person_id: PersonId) -> Result<usize> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM reference_embeddings WHERE person_id = ?1",
            params![person_id.get()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// All reference embeddings with their decoded vectors, in id order —
    /// used to rebuild the similarity index on startup.
    pub fn all_reference_embeddings(&self) -> Result<Vec<(ReferenceEmbedding, Vec<f32>)>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, person_id, image_path, embedding, created_at
             FROM reference_embeddings ORDER BY id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                let bytes: Vec<u8> = row.get(3)?;
                Ok((
                    ReferenceEmbedding {
                        id: ReferenceId::new(row.get(0)?),
                        person_id: PersonId::new(row.get(1)?),
                        image_path: row.get(2)?,
                        created_at: parse_dt(&row.get::<_, String>(4)?),
                    },
                    decode_embedding(&bytes),
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ── Attendance ──────────────────────────────────────────────────

    /// Insert an attendance row guarded by the `(person_id, day)` unique
    /// constraint. A unique violation surfaces as
    /// `StoreError::DuplicateAttendance`, not an `already` value — the
    /// caller (the attendance gate in `vigil-vision`) classifies outcomes;
    /// this layer only enforces the invariant.
    pub fn insert_attendance(
        &self,
        person_id: PersonId,
        day: NaiveDate,
        time_of_day: NaiveTime,
        confidence: f32,
        snapshot_path: Option<&str>,
    ) -> Result<AttendanceRecord> {
        let conn = self.conn();
        let result = conn.execute(
            "INSERT INTO attendance_records (person_id, day, time_of_day, confidence, snapshot_path)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                person_id.get(),
                day.to_string(),
                time_of_day.to_string(),
                confidence,
                snapshot_path
            ],
        );
        match result {
            Ok(_) => Ok(AttendanceRecord {
                id: AttendanceId::new(conn.last_insert_rowid()),
                person_id,
                day,
                time_of_day,
                confidence,
                snapshot_path: snapshot_path.map(str::to_string),
            }),
            Err(e) if is_unique_violation(&e) => Err(StoreError::DuplicateAttendance {
                person_id: person_id.get(),
                day: day.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    pub fn attendance_for_day(&self, day: NaiveDate) -> Result<Vec<AttendanceRecord>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, person_id, day, time_of_day, confidence, snapshot_path
             FROM attendance_records WHERE day = ?1 ORDER BY time_of_day",
        )?;
        let rows = stmt
            .query_map(params![day.to_string()], row_to_attendance)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn attendance_for_person(
        &self,
        person_id: PersonId,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<AttendanceRecord>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, person_id, day, time_of_day, confidence, snapshot_path
             FROM attendance_records
             WHERE person_id = ?1
               AND (?2 IS NULL OR day >= ?2)
               AND (?3 IS NULL OR day <= ?3)
             ORDER BY day",
        )?;
        let rows = stmt
            .query_map(
                params![
                    person_id.get(),
                    from.map(|d| d.to_string()),
                    to.map(|d| d.to_string())
                ],
                row_to_attendance,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Attach a snapshot path to an already-inserted attendance row. The
    /// attendance gate calls this only after `insert_attendance` returns
    /// `created` and the snapshot file has been written to disk — never
    /// before, so a row never references a file that doesn't exist yet.
    pub fn set_attendance_snapshot(&self, id: AttendanceId, path: &str) -> Result<()> {
        let updated = self.conn().execute(
            "UPDATE attendance_records SET snapshot_path = ?1 WHERE id = ?2",
            params![path, id.get()],
        )?;
        if updated == 0 {
            return Err(StoreError::PersonNotFound(format!("attendance row {}", id.get())));
        }
        Ok(())
    }

    /// `(total_enrolled_persons, checked_in_today)` for the given day.
    pub fn attendance_statistics(&self, day: NaiveDate) -> Result<(i64, i64)> {
        let conn = self.conn();
        let total: i64 = conn.query_row("SELECT COUNT(*) FROM persons", [], |r| r.get(0))?;
        let checked_in: i64 = conn.query_row(
            "SELECT COUNT(*) FROM attendance_records WHERE day = ?1",
            params![day.to_string()],
            |r| r.get(0),
        )?;
        Ok((total, checked_in))
    }

    // ── Rooms ───────────────────────────────────────────────────────

    pub fn create_room(&self, new: NewRoom<'_>) -> Result<Room> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO rooms (name, active) VALUES (?1, 1)",
            params![new.name],
        )?;
        Ok(Room {
            id: RoomId::new(conn.last_insert_rowid()),
            name: new.name.to_string(),
            active: true,
        })
    }

    pub fn get_room(&self, id: RoomId) -> Result<Room> {
        self.conn()
            .query_row(
                "SELECT id, name, active FROM rooms WHERE id = ?1",
                params![id.get()],
                row_to_room,
            )
            .optional()?
            .ok_or(StoreError::RoomNotFound(id.get()))
    }

    pub fn list_rooms(&self) -> Result<Vec<Room>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT id, name, active FROM rooms ORDER BY id")?;
        let rows = stmt
            .query_map([], row_to_room)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Delete a room. Cascades to its cameras via `ON DELETE CASCADE`.
    pub fn delete_room(&self, id: RoomId) -> Result<bool> {
        let deleted = self
            .conn()
            .execute("DELETE FROM rooms WHERE id = ?1", params![id.get()])?;
        Ok(deleted > 0)
    }

    // ── Cameras ─────────────────────────────────────────────────────

    pub fn create_camera(&self, new: NewCamera<'_>) -> Result<Camera> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO cameras (room_id, name, source_address, active) VALUES (?1, ?2, ?3, 1)",
            params![new.room_id.get(), new.name, new.source_address],
        )?;
        Ok(Camera {
            id: CameraId::new(conn.last_insert_rowid()),
            room_id: new.room_id,
            name: new.name.to_string(),
            source_address: new.source_address.to_string(),
            active: true,
            status: CameraStatus::Offline,
        })
    }

    pub fn get_camera(&self, id: CameraId) -> Result<Camera> {
        self.conn()
            .query_row(
                "SELECT id, room_id, name, source_address, active FROM cameras WHERE id = ?1",
                params![id.get()],
                row_to_camera,
            )
            .optional()?
            .ok_or(StoreError::CameraNotFound(id.get()))
    }

    pub fn list_cameras_for_room(&self, room_id: RoomId) -> Result<Vec<Camera>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, room_id, name, source_address, active FROM cameras
             WHERE room_id = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![room_id.get()], row_to_camera)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn list_active_cameras(&self) -> Result<Vec<Camera>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, room_id, name, source_address, active FROM cameras
             WHERE active = 1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map([], row_to_camera)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn set_camera_active(&self, id: CameraId, active: bool) -> Result<()> {
        let updated = self.conn().execute(
            "UPDATE cameras SET active = ?1 WHERE id = ?2",
            params![active as i32, id.get()],
        )?;
        if updated == 0 {
            return Err(StoreError::CameraNotFound(id.get()));
        }
        Ok(())
    }

    pub fn delete_camera(&self, id: CameraId) -> Result<bool> {
        let deleted = self
            .conn()
            .execute("DELETE FROM cameras WHERE id = ?1", params![id.get()])?;
        Ok(deleted > 0)
    }
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation
    )
}

fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for component in embedding {
        bytes.extend_from_slice(&component.to_le_bytes());
    }
    bytes
}

fn decode_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes(chunk.try_into().unwrap()))
        .collect()
}

fn parse_dt(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn row_to_person(row: &rusqlite::Row<'_>) -> rusqlite::Result<Person> {
    Ok(Person {
        id: PersonId::new(row.get(0)?),
        external_id: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        group: row.get(4)?,
        created_at: parse_dt(&row.get::<_, String>(5)?),
    })
}

fn row_to_attendance(row: &rusqlite::Row<'_>) -> rusqlite::Result<AttendanceRecord> {
    let day: String = row.get(2)?;
    let time_of_day: String = row.get(3)?;
    Ok(AttendanceRecord {
        id: AttendanceId::new(row.get(0)?),
        person_id: PersonId::new(row.get(1)?),
        day: NaiveDate::parse_from_str(&day, "%Y-%m-%d").unwrap_or_default(),
        time_of_day: NaiveTime::parse_from_str(&time_of_day, "%H:%M:%S%.f").unwrap_or_default(),
        confidence: row.get(4)?,
        snapshot_path: row.get(5)?,
    })
}

fn row_to_room(row: &rusqlite::Row<'_>) -> rusqlite::Result<Room> {
    Ok(Room {
        id: RoomId::new(row.get(0)?),
        name: row.get(1)?,
        active: row.get::<_, i64>(2)? != 0,
    })
}

fn row_to_camera(row: &rusqlite::Row<'_>) -> rusqlite::Result<Camera> {
    Ok(Camera {
        id: CameraId::new(row.get(0)?),
        room_id: RoomId::new(row.get(1)?),
        name: row.get(2)?,
        source_address: row.get(3)?,
        active: row.get::<_, i64>(4)? != 0,
        status: CameraStatus::Offline,
    })
}
