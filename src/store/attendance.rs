use super::{check_face_data, ensure_student, face_digest, student_exists};
use crate::error::{StoreError, StoreResult};
use crate::policy::{gate, Gate, Operation, Table};
use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRow {
    pub id: i64,
    pub student_id: i64,
    pub date: String,
    pub has_face_data: bool,
    pub face_sha256: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Marked {
    pub record: AttendanceRow,
    /// False when an existing record for that day was updated instead.
    pub created: bool,
}

const COLUMNS: &str = "id, student_id, date, face_data, created_at, updated_at";

fn map_row(r: &Row<'_>) -> rusqlite::Result<AttendanceRow> {
    let face: Option<Vec<u8>> = r.get(3)?;
    Ok(AttendanceRow {
        id: r.get(0)?,
        student_id: r.get(1)?,
        date: r.get(2)?,
        has_face_data: face.is_some(),
        face_sha256: face_digest(face.as_deref()),
        created_at: r.get(4)?,
        updated_at: r.get(5)?,
    })
}

fn fetch(conn: &Connection, id: i64) -> StoreResult<Option<AttendanceRow>> {
    Ok(conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM attendance WHERE id = ?"),
            [id],
            map_row,
        )
        .optional()?)
}

pub(crate) fn for_student(conn: &Connection, student_id: i64) -> StoreResult<Vec<AttendanceRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM attendance WHERE student_id = ? ORDER BY date DESC"
    ))?;
    let rows = stmt
        .query_map([student_id], map_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn parse_date(s: &str) -> StoreResult<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| StoreError::validation(format!("date must be YYYY-MM-DD, got {s:?}")))
}

fn write(
    g: &Gate,
    conn: &Connection,
    student_id: i64,
    date: NaiveDate,
    face_data: Option<Vec<u8>>,
) -> StoreResult<Marked> {
    g.admit(Some(student_id))?;
    g.with_op(Operation::Update).admit(Some(student_id))?;
    check_face_data(&face_data)?;
    ensure_student(conn, student_id)?;

    let day = date.format("%Y-%m-%d").to_string();
    let existing: Option<i64> = conn
        .query_row(
            "SELECT id FROM attendance WHERE student_id = ? AND date = ?",
            (student_id, &day),
            |r| r.get(0),
        )
        .optional()?;

    let id: i64 = conn.query_row(
        "INSERT INTO attendance(student_id, date, face_data) VALUES(?, ?, ?)
         ON CONFLICT(student_id, date) DO UPDATE SET face_data = excluded.face_data
         RETURNING id",
        (student_id, &day, face_data.as_deref()),
        |r| r.get(0),
    )?;
    let record = fetch(conn, id)?.ok_or(StoreError::NotFound("attendance record"))?;
    Ok(Marked {
        record,
        created: existing.is_none(),
    })
}

/// Records attendance for one student on one day. At most one row exists per
/// (student, day); marking again refreshes the stored capture.
pub fn mark(
    conn: &Connection,
    caller: &str,
    student_id: i64,
    date: NaiveDate,
    face_data: Option<Vec<u8>>,
) -> StoreResult<Marked> {
    let tx = conn.unchecked_transaction()?;
    let g = gate(&tx, caller, Table::Attendance, Operation::Insert)?;
    let marked = write(&g, &tx, student_id, date, face_data)?;
    tx.commit()?;
    tracing::debug!(student_id, date = %date, created = marked.created, "attendance marked");
    Ok(marked)
}

/// A signed-in student marking themselves present on `today`.
pub fn check_in(
    conn: &Connection,
    caller: &str,
    today: NaiveDate,
    face_data: Option<Vec<u8>>,
) -> StoreResult<Marked> {
    let tx = conn.unchecked_transaction()?;
    let g = gate(&tx, caller, Table::Attendance, Operation::Insert)?;
    let Some(student_id) = g.principal.student_id else {
        return Err(StoreError::Forbidden);
    };
    let marked = write(&g, &tx, student_id, today, face_data)?;
    tx.commit()?;
    tracing::info!(student_id, date = %today, created = marked.created, "student checked in");
    Ok(marked)
}

pub fn get(conn: &Connection, caller: &str, id: i64) -> StoreResult<AttendanceRow> {
    let g = gate(conn, caller, Table::Attendance, Operation::Select)?;
    let row = fetch(conn, id)?.ok_or_else(|| g.missing())?;
    g.admit(Some(row.student_id))?;
    Ok(row)
}

pub fn list_for_student(
    conn: &Connection,
    caller: &str,
    student_id: i64,
) -> StoreResult<Vec<AttendanceRow>> {
    let g = gate(conn, caller, Table::Attendance, Operation::Select)?;
    g.admit(Some(student_id))?;
    if !student_exists(conn, student_id)? {
        return Err(StoreError::NotFound("student"));
    }
    for_student(conn, student_id)
}

pub fn list_by_date(conn: &Connection, caller: &str, date: NaiveDate) -> StoreResult<Vec<AttendanceRow>> {
    let g = gate(conn, caller, Table::Attendance, Operation::Select)?;
    if g.is_denied() {
        return Ok(Vec::new());
    }
    let mut sql = format!("SELECT {COLUMNS} FROM attendance WHERE date = ?");
    let mut bind = vec![Value::Text(date.format("%Y-%m-%d").to_string())];
    if let Some(sid) = g.owner_filter() {
        sql.push_str(" AND student_id = ?");
        bind.push(Value::Integer(sid));
    }
    sql.push_str(" ORDER BY student_id");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(bind), map_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn delete(conn: &Connection, caller: &str, id: i64) -> StoreResult<AttendanceRow> {
    let tx = conn.unchecked_transaction()?;
    let g = gate(&tx, caller, Table::Attendance, Operation::Delete)?;
    g.require()?;
    let row = fetch(&tx, id)?.ok_or_else(|| g.missing())?;
    g.admit(Some(row.student_id))?;
    tx.execute("DELETE FROM attendance WHERE id = ?", [id])?;
    tx.commit()?;
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dates_must_be_iso_days() {
        assert_eq!(
            parse_date(" 2024-01-10 ").expect("date"),
            NaiveDate::from_ymd_opt(2024, 1, 10).expect("ymd")
        );
        assert!(parse_date("2024-02-30").is_err());
        assert!(parse_date("10/01/2024").is_err());
        assert!(parse_date("").is_err());
    }
}
