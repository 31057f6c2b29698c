use rusqlite::ffi;
use thiserror::Error;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Failure of a single store operation. Nothing is committed when one of these
/// is returned.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    Validation(String),

    #[error("permission denied")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("no account matches the session identity")]
    Unauthenticated,

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Referential(String),

    #[error("credential error: {0}")]
    Credential(String),

    #[error("database error: {0}")]
    Db(rusqlite::Error),
}

impl StoreError {
    pub fn validation(message: impl Into<String>) -> Self {
        StoreError::Validation(message.into())
    }

    /// Wire code used in the IPC error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::Validation(_) => "bad_params",
            StoreError::Forbidden => "forbidden",
            StoreError::NotFound(_) => "not_found",
            StoreError::Unauthenticated => "unauthenticated",
            StoreError::Conflict(_) => "conflict",
            StoreError::Referential(_) => "referential",
            StoreError::Credential(_) => "credential_failed",
            StoreError::Db(_) => "db_failed",
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(ref failure, ref message) = e {
            let detail = message.clone().unwrap_or_else(|| failure.to_string());
            match failure.extended_code {
                ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                    return StoreError::Conflict(detail)
                }
                ffi::SQLITE_CONSTRAINT_CHECK | ffi::SQLITE_CONSTRAINT_NOTNULL => {
                    return StoreError::Validation(detail)
                }
                ffi::SQLITE_CONSTRAINT_FOREIGNKEY => return StoreError::Referential(detail),
                _ => {}
            }
        }
        StoreError::Db(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn scratch() -> Connection {
        let conn = Connection::open_in_memory().expect("open memory db");
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             CREATE TABLE parent(id INTEGER PRIMARY KEY);
             CREATE TABLE child(
               id INTEGER PRIMARY KEY,
               parent_id INTEGER NOT NULL REFERENCES parent(id),
               code TEXT NOT NULL UNIQUE,
               n INTEGER NOT NULL CHECK (n BETWEEN 0 AND 100)
             );
             INSERT INTO parent(id) VALUES (1);",
        )
        .expect("create scratch schema");
        conn
    }

    fn insert(conn: &Connection, parent: i64, code: &str, n: i64) -> StoreError {
        conn.execute(
            "INSERT INTO child(parent_id, code, n) VALUES(?, ?, ?)",
            (parent, code, n),
        )
        .map(|_| ())
        .map_err(StoreError::from)
        .expect_err("insert should fail")
    }

    #[test]
    fn constraint_failures_map_to_taxonomy() {
        let conn = scratch();
        conn.execute("INSERT INTO child(parent_id, code, n) VALUES(1, 'x', 5)", [])
            .expect("seed child");

        assert_eq!(insert(&conn, 1, "x", 5).code(), "conflict");
        assert_eq!(insert(&conn, 1, "y", 101).code(), "bad_params");
        assert_eq!(insert(&conn, 9, "z", 5).code(), "referential");
    }

    #[test]
    fn other_sqlite_errors_stay_db_failures() {
        let conn = scratch();
        let e = StoreError::from(
            conn.execute("SELECT * FROM missing_table", [])
                .expect_err("unknown table"),
        );
        assert_eq!(e.code(), "db_failed");
    }
}
