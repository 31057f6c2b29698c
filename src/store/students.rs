use super::{check_face_data, face_digest, required_text};
use crate::error::{StoreError, StoreResult};
use crate::policy::{gate, Operation, Table};
use crate::store::{attendance, grades, marks};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRow {
    pub id: i64,
    pub name: String,
    pub age: i64,
    pub class_name: String,
    pub section: String,
    pub has_face_data: bool,
    pub face_sha256: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct NewStudent {
    pub name: String,
    pub age: i64,
    pub class_name: String,
    pub section: String,
    pub face_data: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Default)]
pub struct StudentPatch {
    pub name: Option<String>,
    pub age: Option<i64>,
    pub class_name: Option<String>,
    pub section: Option<String>,
}

impl StudentPatch {
    fn is_empty(&self) -> bool {
        self.name.is_none() && self.age.is_none() && self.class_name.is_none() && self.section.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct StudentFilter {
    pub class_name: Option<String>,
    pub section: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedStudent {
    pub student_id: i64,
    pub marks_removed: i64,
    pub grades_removed: i64,
    pub attendance_removed: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassList {
    pub classes: Vec<String>,
    pub sections: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub student: StudentRow,
    pub marks: Vec<marks::MarkRow>,
    pub grades: Vec<grades::GradeRow>,
    pub attendance: Vec<String>,
}

const COLUMNS: &str = "id, name, age, class_name, section, face_data, created_at, updated_at";

fn map_row(r: &Row<'_>) -> rusqlite::Result<StudentRow> {
    let face: Option<Vec<u8>> = r.get(5)?;
    Ok(StudentRow {
        id: r.get(0)?,
        name: r.get(1)?,
        age: r.get(2)?,
        class_name: r.get(3)?,
        section: r.get(4)?,
        has_face_data: face.is_some(),
        face_sha256: face_digest(face.as_deref()),
        created_at: r.get(6)?,
        updated_at: r.get(7)?,
    })
}

pub(crate) fn fetch(conn: &Connection, id: i64) -> StoreResult<Option<StudentRow>> {
    Ok(conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM students WHERE id = ?"),
            [id],
            map_row,
        )
        .optional()?)
}

/// Unguarded listing for callers that already hold a table-wide gate.
pub(crate) fn query(
    conn: &Connection,
    filter: &StudentFilter,
    owner: Option<i64>,
) -> StoreResult<Vec<StudentRow>> {
    let mut sql = format!("SELECT {COLUMNS} FROM students WHERE 1 = 1");
    let mut bind: Vec<Value> = Vec::new();
    if let Some(c) = filter.class_name.as_deref() {
        sql.push_str(" AND class_name = ?");
        bind.push(Value::Text(c.trim().to_string()));
    }
    if let Some(s) = filter.section.as_deref() {
        sql.push_str(" AND section = ?");
        bind.push(Value::Text(s.trim().to_string()));
    }
    if let Some(sid) = owner {
        sql.push_str(" AND id = ?");
        bind.push(Value::Integer(sid));
    }
    sql.push_str(" ORDER BY name, id");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(bind), map_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn check_age(age: i64) -> StoreResult<i64> {
    if !(0..=150).contains(&age) {
        return Err(StoreError::validation(format!(
            "age must be between 0 and 150, got {age}"
        )));
    }
    Ok(age)
}

pub fn create(conn: &Connection, caller: &str, new: NewStudent) -> StoreResult<StudentRow> {
    let name = required_text("name", &new.name)?;
    let class_name = required_text("className", &new.class_name)?;
    let section = required_text("section", &new.section)?;
    let age = check_age(new.age)?;
    check_face_data(&new.face_data)?;

    let tx = conn.unchecked_transaction()?;
    gate(&tx, caller, Table::Students, Operation::Insert)?.require()?;

    tx.execute(
        "INSERT INTO students(name, age, class_name, section, face_data) VALUES(?, ?, ?, ?, ?)",
        (&name, age, &class_name, &section, new.face_data.as_deref()),
    )?;
    let id = tx.last_insert_rowid();
    let row = fetch(&tx, id)?.ok_or(StoreError::NotFound("student"))?;
    tx.commit()?;

    tracing::info!(student_id = id, by = caller, "student created");
    Ok(row)
}

pub fn get(conn: &Connection, caller: &str, id: i64) -> StoreResult<StudentRow> {
    let g = gate(conn, caller, Table::Students, Operation::Select)?;
    g.admit(Some(id))?;
    fetch(conn, id)?.ok_or_else(|| g.missing())
}

pub fn list(conn: &Connection, caller: &str, filter: &StudentFilter) -> StoreResult<Vec<StudentRow>> {
    let g = gate(conn, caller, Table::Students, Operation::Select)?;
    if g.is_denied() {
        return Ok(Vec::new());
    }
    query(conn, filter, g.owner_filter())
}

pub fn update(
    conn: &Connection,
    caller: &str,
    id: i64,
    patch: StudentPatch,
) -> StoreResult<StudentRow> {
    if patch.is_empty() {
        return Err(StoreError::validation("patch must change at least one field"));
    }
    let name = patch.name.as_deref().map(|v| required_text("name", v)).transpose()?;
    let class_name = patch
        .class_name
        .as_deref()
        .map(|v| required_text("className", v))
        .transpose()?;
    let section = patch
        .section
        .as_deref()
        .map(|v| required_text("section", v))
        .transpose()?;
    let age = patch.age.map(check_age).transpose()?;

    let tx = conn.unchecked_transaction()?;
    let g = gate(&tx, caller, Table::Students, Operation::Update)?;
    g.admit(Some(id))?;
    if fetch(&tx, id)?.is_none() {
        return Err(g.missing());
    }

    tx.execute(
        "UPDATE students SET
           name = COALESCE(?, name),
           age = COALESCE(?, age),
           class_name = COALESCE(?, class_name),
           section = COALESCE(?, section)
         WHERE id = ?",
        (name, age, class_name, section, id),
    )?;
    let row = fetch(&tx, id)?.ok_or_else(|| g.missing())?;
    tx.commit()?;
    Ok(row)
}

/// Deletes a student and, through the foreign keys, every mark, grade and
/// attendance row it owns. A student that still has a login is refused.
pub fn delete(conn: &Connection, caller: &str, id: i64) -> StoreResult<DeletedStudent> {
    let tx = conn.unchecked_transaction()?;
    let g = gate(&tx, caller, Table::Students, Operation::Delete)?;
    g.admit(Some(id))?;
    if fetch(&tx, id)?.is_none() {
        return Err(g.missing());
    }

    let linked: i64 = tx.query_row(
        "SELECT COUNT(*) FROM accounts WHERE student_id = ?",
        [id],
        |r| r.get(0),
    )?;
    if linked > 0 {
        return Err(StoreError::Referential(format!(
            "student {id} still has a login account; remove the account first"
        )));
    }

    let count = |table: &str| -> StoreResult<i64> {
        Ok(tx.query_row(
            &format!("SELECT COUNT(*) FROM {table} WHERE student_id = ?"),
            [id],
            |r| r.get(0),
        )?)
    };
    let summary = DeletedStudent {
        student_id: id,
        marks_removed: count("marks")?,
        grades_removed: count("grades")?,
        attendance_removed: count("attendance")?,
    };

    tx.execute("DELETE FROM students WHERE id = ?", [id])?;
    tx.commit()?;

    tracing::info!(
        student_id = id,
        by = caller,
        marks = summary.marks_removed,
        grades = summary.grades_removed,
        attendance = summary.attendance_removed,
        "student deleted"
    );
    Ok(summary)
}

/// Replaces (or with `None`, clears) the stored face capture.
pub fn set_face(
    conn: &Connection,
    caller: &str,
    id: i64,
    data: Option<Vec<u8>>,
) -> StoreResult<StudentRow> {
    check_face_data(&data)?;

    let tx = conn.unchecked_transaction()?;
    let g = gate(&tx, caller, Table::Students, Operation::Update)?;
    g.admit(Some(id))?;
    if fetch(&tx, id)?.is_none() {
        return Err(g.missing());
    }
    tx.execute(
        "UPDATE students SET face_data = ? WHERE id = ?",
        (data.as_deref(), id),
    )?;
    let row = fetch(&tx, id)?.ok_or_else(|| g.missing())?;
    tx.commit()?;
    Ok(row)
}

pub fn face(conn: &Connection, caller: &str, id: i64) -> StoreResult<Option<Vec<u8>>> {
    let g = gate(conn, caller, Table::Students, Operation::Select)?;
    g.admit(Some(id))?;
    let face: Option<Option<Vec<u8>>> = conn
        .query_row("SELECT face_data FROM students WHERE id = ?", [id], |r| {
            r.get(0)
        })
        .optional()?;
    face.ok_or_else(|| g.missing())
}

pub fn classes(conn: &Connection, caller: &str) -> StoreResult<ClassList> {
    let rows = list(conn, caller, &StudentFilter::default())?;
    let mut classes: Vec<String> = rows.iter().map(|s| s.class_name.clone()).collect();
    let mut sections: Vec<String> = rows.iter().map(|s| s.section.clone()).collect();
    classes.sort();
    classes.dedup();
    sections.sort();
    sections.dedup();
    Ok(ClassList { classes, sections })
}

/// Everything a signed-in student sees about themselves.
pub fn dashboard(conn: &Connection, caller: &str) -> StoreResult<Dashboard> {
    let g = gate(conn, caller, Table::Students, Operation::Select)?;
    let Some(sid) = g.principal.student_id else {
        return Err(StoreError::NotFound("student"));
    };
    let student = get(conn, caller, sid)?;
    let marks = marks::list_for_student(conn, caller, sid)?;
    let grades = grades::list_for_student(conn, caller, sid)?;
    let attendance = attendance::list_for_student(conn, caller, sid)?
        .into_iter()
        .map(|a| a.date)
        .collect();
    Ok(Dashboard {
        student,
        marks,
        grades,
        attendance,
    })
}
