use crate::error::{StoreError, StoreResult};
use crate::policy::Role;
use crate::store::accounts::{self, AccountRow, NewAccount};
use rusqlite::Connection;
use serde::Serialize;

pub const PRINCIPAL_USERNAME: &str = "principal";
pub const TEACHER_USERNAME: &str = "teacher";
pub const STUDENT_USERNAME: &str = "student";

/// Passwords for the three seed logins. Only consulted when seeding happens.
#[derive(Debug, Clone, Default)]
pub struct SeedPasswords {
    pub principal: Option<String>,
    pub teacher: Option<String>,
    pub student: Option<String>,
}

fn required<'a>(who: &str, pw: &'a Option<String>) -> StoreResult<&'a str> {
    match pw.as_deref() {
        Some(p) if !p.is_empty() => Ok(p),
        _ => Err(StoreError::validation(format!("missing {who} password"))),
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedOutcome {
    pub seeded: bool,
    pub student_id: Option<i64>,
    pub accounts: Vec<AccountRow>,
}

/// Provisions the first three logins on an empty workspace: a principal, a
/// teacher and a student linked to a sample student row. Runs outside the
/// policy since no principal exists yet; a workspace with any account is left
/// untouched.
pub fn bootstrap(conn: &Connection, passwords: &SeedPasswords) -> StoreResult<SeedOutcome> {
    let tx = conn.unchecked_transaction()?;
    let existing: i64 = tx.query_row("SELECT COUNT(*) FROM accounts", [], |r| r.get(0))?;
    if existing > 0 {
        tracing::info!(accounts = existing, "bootstrap skipped: workspace already has accounts");
        return Ok(SeedOutcome {
            seeded: false,
            student_id: None,
            accounts: Vec::new(),
        });
    }

    let principal_pw = required("principal", &passwords.principal)?;
    let teacher_pw = required("teacher", &passwords.teacher)?;
    let student_pw = required("student", &passwords.student)?;

    tx.execute(
        "INSERT INTO students(name, age, class_name, section) VALUES(?, ?, ?, ?)",
        ("Sample Student", 15, "10", "A"),
    )?;
    let student_id = tx.last_insert_rowid();

    let plan = [
        (PRINCIPAL_USERNAME, principal_pw, Role::Principal, None),
        (TEACHER_USERNAME, teacher_pw, Role::Teacher, None),
        (STUDENT_USERNAME, student_pw, Role::Student, Some(student_id)),
    ];
    let mut created = Vec::with_capacity(plan.len());
    for (username, password, role, link) in plan {
        created.push(accounts::insert(
            &tx,
            &NewAccount {
                username: username.to_string(),
                password: password.to_string(),
                role,
                student_id: link,
            },
        )?);
    }
    tx.commit()?;

    tracing::info!(student_id, "workspace bootstrapped with seed accounts");
    Ok(SeedOutcome {
        seeded: true,
        student_id: Some(student_id),
        accounts: created,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth;

    fn passwords() -> SeedPasswords {
        SeedPasswords {
            principal: Some("p-pass".into()),
            teacher: Some("t-pass".into()),
            student: Some("s-pass".into()),
        }
    }

    #[test]
    fn seeds_once_with_hashed_credentials() {
        let conn = Connection::open_in_memory().expect("memory db");
        crate::db::init_schema(&conn).expect("schema");

        let out = bootstrap(&conn, &passwords()).expect("bootstrap");
        assert!(out.seeded);
        assert_eq!(out.accounts.len(), 3);
        let sid = out.student_id.expect("seed student");
        let student = out
            .accounts
            .iter()
            .find(|a| a.role == "student")
            .expect("student account");
        assert_eq!(student.student_id, Some(sid));

        let hashes: Vec<String> = conn
            .prepare("SELECT password_hash FROM accounts")
            .expect("prepare")
            .query_map([], |r| r.get(0))
            .expect("query")
            .collect::<Result<_, _>>()
            .expect("rows");
        for h in &hashes {
            assert!(h.starts_with("$argon2"), "not a PHC hash: {h}");
            assert!(!h.contains("pass"));
        }

        assert!(auth::login(&conn, "teacher", "t-pass").expect("login").is_some());

        let again = bootstrap(&conn, &SeedPasswords::default()).expect("second bootstrap");
        assert!(!again.seeded);
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM accounts", [], |r| r.get(0))
            .expect("count");
        assert_eq!(count, 3);
    }

    #[test]
    fn empty_password_aborts_without_side_effects() {
        let conn = Connection::open_in_memory().expect("memory db");
        crate::db::init_schema(&conn).expect("schema");
        let mut pw = passwords();
        pw.student = Some(String::new());
        assert!(matches!(bootstrap(&conn, &pw), Err(StoreError::Validation(_))));
        pw.student = None;
        assert!(matches!(bootstrap(&conn, &pw), Err(StoreError::Validation(_))));
        let students: i64 = conn
            .query_row("SELECT COUNT(*) FROM students", [], |r| r.get(0))
            .expect("count");
        assert_eq!(students, 0);
    }
}
