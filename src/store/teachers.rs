use super::required_text;
use crate::error::{StoreError, StoreResult};
use crate::policy::{gate, Operation, Table};
use rusqlite::{Connection, OptionalExtension, Row};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherRow {
    pub id: i64,
    pub name: String,
    pub subject: String,
    pub created_at: String,
    pub updated_at: String,
}

const COLUMNS: &str = "id, name, subject, created_at, updated_at";

fn map_row(r: &Row<'_>) -> rusqlite::Result<TeacherRow> {
    Ok(TeacherRow {
        id: r.get(0)?,
        name: r.get(1)?,
        subject: r.get(2)?,
        created_at: r.get(3)?,
        updated_at: r.get(4)?,
    })
}

fn fetch(conn: &Connection, id: i64) -> StoreResult<Option<TeacherRow>> {
    Ok(conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM teachers WHERE id = ?"),
            [id],
            map_row,
        )
        .optional()?)
}

pub fn create(conn: &Connection, caller: &str, name: &str, subject: &str) -> StoreResult<TeacherRow> {
    let name = required_text("name", name)?;
    let subject = required_text("subject", subject)?;

    let tx = conn.unchecked_transaction()?;
    gate(&tx, caller, Table::Teachers, Operation::Insert)?.admit(None)?;
    tx.execute(
        "INSERT INTO teachers(name, subject) VALUES(?, ?)",
        (&name, &subject),
    )?;
    let row = fetch(&tx, tx.last_insert_rowid())?.ok_or(StoreError::NotFound("teacher"))?;
    tx.commit()?;
    Ok(row)
}

pub fn get(conn: &Connection, caller: &str, id: i64) -> StoreResult<TeacherRow> {
    let g = gate(conn, caller, Table::Teachers, Operation::Select)?;
    g.admit(None)?;
    fetch(conn, id)?.ok_or_else(|| g.missing())
}

pub fn list(conn: &Connection, caller: &str) -> StoreResult<Vec<TeacherRow>> {
    if gate(conn, caller, Table::Teachers, Operation::Select)?.is_denied() {
        return Ok(Vec::new());
    }
    let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM teachers ORDER BY name, id"))?;
    let rows = stmt
        .query_map([], map_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn update(
    conn: &Connection,
    caller: &str,
    id: i64,
    name: Option<&str>,
    subject: Option<&str>,
) -> StoreResult<TeacherRow> {
    if name.is_none() && subject.is_none() {
        return Err(StoreError::validation("patch must change at least one field"));
    }
    let name = name.map(|v| required_text("name", v)).transpose()?;
    let subject = subject.map(|v| required_text("subject", v)).transpose()?;

    let tx = conn.unchecked_transaction()?;
    let g = gate(&tx, caller, Table::Teachers, Operation::Update)?;
    g.admit(None)?;
    let changed = tx.execute(
        "UPDATE teachers SET name = COALESCE(?, name), subject = COALESCE(?, subject) WHERE id = ?",
        (name, subject, id),
    )?;
    if changed == 0 {
        return Err(g.missing());
    }
    let row = fetch(&tx, id)?.ok_or_else(|| g.missing())?;
    tx.commit()?;
    Ok(row)
}

pub fn delete(conn: &Connection, caller: &str, id: i64) -> StoreResult<TeacherRow> {
    let tx = conn.unchecked_transaction()?;
    let g = gate(&tx, caller, Table::Teachers, Operation::Delete)?;
    g.admit(None)?;
    let row = fetch(&tx, id)?.ok_or_else(|| g.missing())?;
    tx.execute("DELETE FROM teachers WHERE id = ?", [id])?;
    tx.commit()?;
    Ok(row)
}
