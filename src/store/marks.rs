use super::{ensure_student, required_text, student_exists};
use crate::error::{StoreError, StoreResult};
use crate::grading::{check_score, GradeScale};
use crate::policy::{gate, Gate, Operation, Table};
use crate::store::grades;
use rusqlite::{Connection, OptionalExtension, Row};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkRow {
    pub id: i64,
    pub student_id: i64,
    pub subject: String,
    pub score: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct MarkEntry {
    pub student_id: i64,
    pub subject: String,
    pub score: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassEntrySummary {
    pub class_name: String,
    pub section: String,
    pub marks_saved: usize,
    pub grades_saved: usize,
    pub students_touched: usize,
}

const COLUMNS: &str = "id, student_id, subject, score, created_at, updated_at";

fn map_row(r: &Row<'_>) -> rusqlite::Result<MarkRow> {
    Ok(MarkRow {
        id: r.get(0)?,
        student_id: r.get(1)?,
        subject: r.get(2)?,
        score: r.get(3)?,
        created_at: r.get(4)?,
        updated_at: r.get(5)?,
    })
}

fn fetch(conn: &Connection, id: i64) -> StoreResult<Option<MarkRow>> {
    Ok(conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM marks WHERE id = ?"),
            [id],
            map_row,
        )
        .optional()?)
}

pub(crate) fn for_student(conn: &Connection, student_id: i64) -> StoreResult<Vec<MarkRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM marks WHERE student_id = ? ORDER BY subject"
    ))?;
    let rows = stmt
        .query_map([student_id], map_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Insert-or-replace on (student, subject) once the gate has admitted the
/// student for both insert and update.
fn write(g: &Gate, conn: &Connection, entry: &MarkEntry) -> StoreResult<MarkRow> {
    g.admit(Some(entry.student_id))?;
    g.with_op(Operation::Update).admit(Some(entry.student_id))?;
    let subject = required_text("subject", &entry.subject)?;
    let score = check_score(entry.score)?;
    ensure_student(conn, entry.student_id)?;

    let id: i64 = conn.query_row(
        "INSERT INTO marks(student_id, subject, score) VALUES(?, ?, ?)
         ON CONFLICT(student_id, subject) DO UPDATE SET score = excluded.score
         RETURNING id",
        (entry.student_id, &subject, score),
        |r| r.get(0),
    )?;
    fetch(conn, id)?.ok_or(StoreError::NotFound("mark"))
}

/// Saves a mark. A second mark for the same student and subject replaces
/// the first.
pub fn upsert(conn: &Connection, caller: &str, entry: MarkEntry) -> StoreResult<MarkRow> {
    let tx = conn.unchecked_transaction()?;
    let g = gate(&tx, caller, Table::Marks, Operation::Insert)?;
    let row = write(&g, &tx, &entry)?;
    tx.commit()?;
    Ok(row)
}

pub fn get(conn: &Connection, caller: &str, id: i64) -> StoreResult<MarkRow> {
    let g = gate(conn, caller, Table::Marks, Operation::Select)?;
    let row = fetch(conn, id)?.ok_or_else(|| g.missing())?;
    g.admit(Some(row.student_id))?;
    Ok(row)
}

pub fn list_for_student(conn: &Connection, caller: &str, student_id: i64) -> StoreResult<Vec<MarkRow>> {
    let g = gate(conn, caller, Table::Marks, Operation::Select)?;
    g.admit(Some(student_id))?;
    if !student_exists(conn, student_id)? {
        return Err(StoreError::NotFound("student"));
    }
    for_student(conn, student_id)
}

pub fn delete(conn: &Connection, caller: &str, id: i64) -> StoreResult<MarkRow> {
    let tx = conn.unchecked_transaction()?;
    let g = gate(&tx, caller, Table::Marks, Operation::Delete)?;
    g.require()?;
    let row = fetch(&tx, id)?.ok_or_else(|| g.missing())?;
    g.admit(Some(row.student_id))?;
    tx.execute("DELETE FROM marks WHERE id = ?", [id])?;
    tx.commit()?;
    Ok(row)
}

/// Records a batch of marks for one class section and regrades each touched
/// subject with `scale`. All entries land or none do.
pub fn enter_for_class(
    conn: &Connection,
    caller: &str,
    class_name: &str,
    section: &str,
    entries: &[MarkEntry],
    scale: &GradeScale,
) -> StoreResult<ClassEntrySummary> {
    let class_name = required_text("className", class_name)?;
    let section = required_text("section", section)?;
    if entries.is_empty() {
        return Err(StoreError::validation("entries must not be empty"));
    }

    let tx = conn.unchecked_transaction()?;
    let marks_gate = gate(&tx, caller, Table::Marks, Operation::Insert)?;
    let grades_gate = marks_gate.on(Table::Grades, Operation::Insert);
    marks_gate.on(Table::Students, Operation::Select).require_all()?;

    // Repeated (student, subject) keys overwrite one row; count rows, not entries.
    let mut saved = std::collections::BTreeSet::new();
    let mut touched = std::collections::BTreeSet::new();
    for entry in entries {
        let in_section: Option<i64> = tx
            .query_row(
                "SELECT 1 FROM students WHERE id = ? AND class_name = ? AND section = ?",
                (entry.student_id, &class_name, &section),
                |r| r.get(0),
            )
            .optional()?;
        if in_section.is_none() {
            return Err(StoreError::validation(format!(
                "student {} is not in class {} section {}",
                entry.student_id, class_name, section
            )));
        }

        let mark = write(&marks_gate, &tx, entry)?;
        let letter = scale.letter_for(mark.score);
        grades::write(&grades_gate, &tx, mark.student_id, &mark.subject, letter)?;
        touched.insert(mark.student_id);
        saved.insert((mark.student_id, mark.subject));
    }
    tx.commit()?;

    tracing::info!(
        class = %class_name,
        section = %section,
        entries = entries.len(),
        by = caller,
        "class marks entered"
    );
    Ok(ClassEntrySummary {
        class_name,
        section,
        marks_saved: saved.len(),
        grades_saved: saved.len(),
        students_touched: touched.len(),
    })
}
