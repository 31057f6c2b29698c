use super::{ensure_student, required_text, student_exists};
use crate::error::{StoreError, StoreResult};
use crate::grading::{GradeScale, Letter};
use crate::policy::{gate, Gate, Operation, Table};
use crate::store::marks;
use rusqlite::{Connection, OptionalExtension, Row};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeRow {
    pub id: i64,
    pub student_id: i64,
    pub subject: String,
    pub grade: String,
    pub created_at: String,
    pub updated_at: String,
}

const COLUMNS: &str = "id, student_id, subject, grade, created_at, updated_at";

fn map_row(r: &Row<'_>) -> rusqlite::Result<GradeRow> {
    Ok(GradeRow {
        id: r.get(0)?,
        student_id: r.get(1)?,
        subject: r.get(2)?,
        grade: r.get(3)?,
        created_at: r.get(4)?,
        updated_at: r.get(5)?,
    })
}

fn fetch(conn: &Connection, id: i64) -> StoreResult<Option<GradeRow>> {
    Ok(conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM grades WHERE id = ?"),
            [id],
            map_row,
        )
        .optional()?)
}

pub(crate) fn for_student(conn: &Connection, student_id: i64) -> StoreResult<Vec<GradeRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM grades WHERE student_id = ? ORDER BY subject"
    ))?;
    let rows = stmt
        .query_map([student_id], map_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub(crate) fn write(
    g: &Gate,
    conn: &Connection,
    student_id: i64,
    subject: &str,
    letter: Letter,
) -> StoreResult<GradeRow> {
    g.admit(Some(student_id))?;
    g.with_op(Operation::Update).admit(Some(student_id))?;
    let subject = required_text("subject", subject)?;
    ensure_student(conn, student_id)?;

    let id: i64 = conn.query_row(
        "INSERT INTO grades(student_id, subject, grade) VALUES(?, ?, ?)
         ON CONFLICT(student_id, subject) DO UPDATE SET grade = excluded.grade
         RETURNING id",
        (student_id, &subject, letter.as_str()),
        |r| r.get(0),
    )?;
    fetch(conn, id)?.ok_or(StoreError::NotFound("grade"))
}

pub fn upsert(
    conn: &Connection,
    caller: &str,
    student_id: i64,
    subject: &str,
    letter: Letter,
) -> StoreResult<GradeRow> {
    let tx = conn.unchecked_transaction()?;
    let g = gate(&tx, caller, Table::Grades, Operation::Insert)?;
    let row = write(&g, &tx, student_id, subject, letter)?;
    tx.commit()?;
    Ok(row)
}

pub fn get(conn: &Connection, caller: &str, id: i64) -> StoreResult<GradeRow> {
    let g = gate(conn, caller, Table::Grades, Operation::Select)?;
    let row = fetch(conn, id)?.ok_or_else(|| g.missing())?;
    g.admit(Some(row.student_id))?;
    Ok(row)
}

pub fn list_for_student(conn: &Connection, caller: &str, student_id: i64) -> StoreResult<Vec<GradeRow>> {
    let g = gate(conn, caller, Table::Grades, Operation::Select)?;
    g.admit(Some(student_id))?;
    if !student_exists(conn, student_id)? {
        return Err(StoreError::NotFound("student"));
    }
    for_student(conn, student_id)
}

pub fn delete(conn: &Connection, caller: &str, id: i64) -> StoreResult<GradeRow> {
    let tx = conn.unchecked_transaction()?;
    let g = gate(&tx, caller, Table::Grades, Operation::Delete)?;
    g.require()?;
    let row = fetch(&tx, id)?.ok_or_else(|| g.missing())?;
    g.admit(Some(row.student_id))?;
    tx.execute("DELETE FROM grades WHERE id = ?", [id])?;
    tx.commit()?;
    Ok(row)
}

/// Regrades every subject the student has a mark in.
pub fn derive(
    conn: &Connection,
    caller: &str,
    student_id: i64,
    scale: &GradeScale,
) -> StoreResult<Vec<GradeRow>> {
    let tx = conn.unchecked_transaction()?;
    let g = gate(&tx, caller, Table::Grades, Operation::Insert)?;
    g.admit(Some(student_id))?;
    g.on(Table::Marks, Operation::Select).admit(Some(student_id))?;
    if !student_exists(&tx, student_id)? {
        return Err(StoreError::NotFound("student"));
    }

    let mut out = Vec::new();
    for mark in marks::for_student(&tx, student_id)? {
        out.push(write(
            &g,
            &tx,
            student_id,
            &mark.subject,
            scale.letter_for(mark.score),
        )?);
    }
    tx.commit()?;
    Ok(out)
}
