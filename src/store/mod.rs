//! Policy-guarded table access.
//!
//! Every public function takes the session identity, opens its own gate and,
//! for writes, its own transaction. The identity lookup happens inside that
//! transaction so the policy decision and the write see the same snapshot.

pub mod accounts;
pub mod attendance;
pub mod grades;
pub mod marks;
pub mod students;
pub mod teachers;

use crate::error::{StoreError, StoreResult};
use rusqlite::{Connection, OptionalExtension};
use sha2::{Digest, Sha256};

pub(crate) fn required_text(field: &str, value: &str) -> StoreResult<String> {
    let t = value.trim();
    if t.is_empty() {
        return Err(StoreError::validation(format!("{field} must not be empty")));
    }
    Ok(t.to_string())
}

pub(crate) fn student_exists(conn: &Connection, student_id: i64) -> StoreResult<bool> {
    Ok(conn
        .query_row("SELECT 1 FROM students WHERE id = ?", [student_id], |r| {
            r.get::<_, i64>(0)
        })
        .optional()?
        .is_some())
}

/// Writes that name a student must name one that exists.
pub(crate) fn ensure_student(conn: &Connection, student_id: i64) -> StoreResult<()> {
    if !student_exists(conn, student_id)? {
        return Err(StoreError::Referential(format!(
            "student {student_id} does not exist"
        )));
    }
    Ok(())
}

/// Hex SHA-256 of an opaque face capture, so listings never ship the blob.
pub(crate) fn face_digest(data: Option<&[u8]>) -> Option<String> {
    data.map(|d| format!("{:x}", Sha256::digest(d)))
}

pub(crate) fn check_face_data(data: &Option<Vec<u8>>) -> StoreResult<()> {
    if matches!(data, Some(d) if d.is_empty()) {
        return Err(StoreError::validation(
            "faceData must not be empty; send null to clear it",
        ));
    }
    Ok(())
}
