use super::{ensure_student, required_text};
use crate::auth::hash_password;
use crate::error::{StoreError, StoreResult};
use crate::policy::{gate, Operation, Role, Table};
use rusqlite::{Connection, OptionalExtension, Row};
use serde::Serialize;

/// An account as exposed to callers. The password hash never leaves the store.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRow {
    pub id: i64,
    pub username: String,
    pub role: String,
    pub student_id: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub password: String,
    pub role: Role,
    pub student_id: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct AccountPatch {
    pub password: Option<String>,
    pub role: Option<Role>,
    /// `Some(None)` unlinks, `None` leaves the link alone.
    pub student_id: Option<Option<i64>>,
}

const COLUMNS: &str = "id, username, role, student_id, created_at, updated_at";

fn map_row(r: &Row<'_>) -> rusqlite::Result<AccountRow> {
    Ok(AccountRow {
        id: r.get(0)?,
        username: r.get(1)?,
        role: r.get(2)?,
        student_id: r.get(3)?,
        created_at: r.get(4)?,
        updated_at: r.get(5)?,
    })
}

fn fetch(conn: &Connection, id: i64) -> StoreResult<Option<AccountRow>> {
    Ok(conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM accounts WHERE id = ?"),
            [id],
            map_row,
        )
        .optional()?)
}

/// A student login needs exactly one linked student; other roles none.
fn check_link(conn: &Connection, role: Role, student_id: Option<i64>) -> StoreResult<()> {
    match (role, student_id) {
        (Role::Student, Some(sid)) => ensure_student(conn, sid),
        (Role::Student, None) => Err(StoreError::validation(
            "student accounts must be linked to a student",
        )),
        (_, Some(_)) => Err(StoreError::validation(
            "only student accounts may be linked to a student",
        )),
        (_, None) => Ok(()),
    }
}

fn username_taken(conn: &Connection, username: &str) -> StoreResult<bool> {
    Ok(conn
        .query_row(
            "SELECT 1 FROM accounts WHERE username = ?",
            [username],
            |r| r.get::<_, i64>(0),
        )
        .optional()?
        .is_some())
}

pub(crate) fn insert(conn: &Connection, new: &NewAccount) -> StoreResult<AccountRow> {
    let username = required_text("username", &new.username)?;
    check_link(conn, new.role, new.student_id)?;
    if username_taken(conn, &username)? {
        return Err(StoreError::Conflict(format!(
            "username {username:?} is already taken"
        )));
    }
    let hash = hash_password(&new.password)?;
    conn.execute(
        "INSERT INTO accounts(username, password_hash, role, student_id) VALUES(?, ?, ?, ?)",
        (&username, &hash, new.role.as_str(), new.student_id),
    )?;
    fetch(conn, conn.last_insert_rowid())?.ok_or(StoreError::NotFound("account"))
}

pub fn create(conn: &Connection, caller: &str, new: NewAccount) -> StoreResult<AccountRow> {
    let tx = conn.unchecked_transaction()?;
    gate(&tx, caller, Table::Accounts, Operation::Insert)?.admit(None)?;
    let row = insert(&tx, &new)?;
    tx.commit()?;
    tracing::info!(account = %row.username, role = %row.role, by = caller, "account created");
    Ok(row)
}

pub fn get(conn: &Connection, caller: &str, id: i64) -> StoreResult<AccountRow> {
    let g = gate(conn, caller, Table::Accounts, Operation::Select)?;
    g.admit(None)?;
    fetch(conn, id)?.ok_or_else(|| g.missing())
}

pub fn list(conn: &Connection, caller: &str) -> StoreResult<Vec<AccountRow>> {
    if gate(conn, caller, Table::Accounts, Operation::Select)?.is_denied() {
        return Ok(Vec::new());
    }
    let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM accounts ORDER BY username"))?;
    let rows = stmt
        .query_map([], map_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn update(
    conn: &Connection,
    caller: &str,
    id: i64,
    patch: AccountPatch,
) -> StoreResult<AccountRow> {
    if patch.password.is_none() && patch.role.is_none() && patch.student_id.is_none() {
        return Err(StoreError::validation("patch must change at least one field"));
    }

    let tx = conn.unchecked_transaction()?;
    let g = gate(&tx, caller, Table::Accounts, Operation::Update)?;
    g.admit(None)?;
    let current = fetch(&tx, id)?.ok_or_else(|| g.missing())?;

    let current_role = Role::parse(&current.role).ok_or_else(|| {
        StoreError::validation(format!("account {id} has unknown role {:?}", current.role))
    })?;
    let role = patch.role.unwrap_or(current_role);
    let student_id = match patch.student_id {
        Some(link) => link,
        None if role == Role::Student => current.student_id,
        None => None,
    };
    check_link(&tx, role, student_id)?;

    let hash = patch.password.as_deref().map(hash_password).transpose()?;
    tx.execute(
        "UPDATE accounts SET
           password_hash = COALESCE(?, password_hash),
           role = ?,
           student_id = ?
         WHERE id = ?",
        (hash, role.as_str(), student_id, id),
    )?;
    let row = fetch(&tx, id)?.ok_or_else(|| g.missing())?;
    tx.commit()?;

    if row.role != current.role {
        tracing::info!(account = %row.username, from = %current.role, to = %row.role, by = caller, "account role changed");
    }
    Ok(row)
}

pub fn delete(conn: &Connection, caller: &str, id: i64) -> StoreResult<AccountRow> {
    let tx = conn.unchecked_transaction()?;
    let g = gate(&tx, caller, Table::Accounts, Operation::Delete)?;
    g.admit(None)?;
    let row = fetch(&tx, id)?.ok_or_else(|| g.missing())?;
    tx.execute("DELETE FROM accounts WHERE id = ?", [id])?;
    tx.commit()?;
    tracing::info!(account = %row.username, by = caller, "account deleted");
    Ok(row)
}
