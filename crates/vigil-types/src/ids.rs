//! Newtype identifiers.
//!
//! Persisted entities get `i64` ids (assigned by SQLite's `AUTOINCREMENT`);
//! `SlotId` is a dense index assigned by the in-memory similarity index and
//! deliberately kept distinct from any persisted id so the two allocation
//! schemes can never be confused at a call site.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! int_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            /// Wrap a raw id value.
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// The raw id value.
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }
    };
}

int_id!(PersonId, "Stable identity of an enrolled person.");
int_id!(ReferenceId, "A single enrolled reference embedding row.");
int_id!(AttendanceId, "A single attendance record row.");
int_id!(RoomId, "A logical grouping of cameras.");
int_id!(CameraId, "A single camera within a room.");
int_id!(SlotId, "A dense slot handle inside the similarity index.");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip_through_json() {
        let id = PersonId::new(42);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "42");
        let back: PersonId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn distinct_id_types_do_not_mix() {
        let person = PersonId::new(1);
        let slot = SlotId::new(1);
        assert_eq!(person.get(), slot.get());
        // The point of the newtypes: this would not compile if uncommented.
        // let _: PersonId = slot;
    }
}
