use rusqlite::Connection;
use std::path::Path;

pub const DB_FILE: &str = "rollbook.sqlite3";

/// Tables whose `updated_at` is maintained by the touch trigger.
pub const TOUCHED_TABLES: [&str; 6] = [
    "accounts",
    "students",
    "teachers",
    "marks",
    "grades",
    "attendance",
];

const NOW: &str = "strftime('%Y-%m-%dT%H:%M:%fZ','now')";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let conn = Connection::open(workspace.join(DB_FILE))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        &format!(
            "CREATE TABLE IF NOT EXISTS students(
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL CHECK (length(trim(name)) > 0),
                age INTEGER NOT NULL CHECK (age >= 0),
                class_name TEXT NOT NULL CHECK (length(trim(class_name)) > 0),
                section TEXT NOT NULL CHECK (length(trim(section)) > 0),
                face_data BLOB,
                created_at TEXT NOT NULL DEFAULT ({NOW}),
                updated_at TEXT NOT NULL DEFAULT ({NOW})
            )"
        ),
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_class_section ON students(class_name, section)",
        [],
    )?;

    // A student login must point at an existing student; other roles must not
    // carry a link. Deleting a linked student is refused.
    conn.execute(
        &format!(
            "CREATE TABLE IF NOT EXISTS accounts(
                id INTEGER PRIMARY KEY,
                username TEXT NOT NULL UNIQUE CHECK (length(trim(username)) > 0),
                password_hash TEXT NOT NULL,
                role TEXT NOT NULL CHECK (role IN ('principal', 'teacher', 'student')),
                student_id INTEGER,
                created_at TEXT NOT NULL DEFAULT ({NOW}),
                updated_at TEXT NOT NULL DEFAULT ({NOW}),
                CHECK ((role = 'student') = (student_id IS NOT NULL)),
                FOREIGN KEY(student_id) REFERENCES students(id) ON DELETE RESTRICT
            )"
        ),
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_accounts_student ON accounts(student_id)",
        [],
    )?;

    conn.execute(
        &format!(
            "CREATE TABLE IF NOT EXISTS teachers(
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL CHECK (length(trim(name)) > 0),
                subject TEXT NOT NULL CHECK (length(trim(subject)) > 0),
                created_at TEXT NOT NULL DEFAULT ({NOW}),
                updated_at TEXT NOT NULL DEFAULT ({NOW})
            )"
        ),
        [],
    )?;

    conn.execute(
        &format!(
            "CREATE TABLE IF NOT EXISTS marks(
                id INTEGER PRIMARY KEY,
                student_id INTEGER NOT NULL,
                subject TEXT NOT NULL CHECK (length(trim(subject)) > 0),
                score INTEGER NOT NULL CHECK (score BETWEEN 0 AND 100),
                created_at TEXT NOT NULL DEFAULT ({NOW}),
                updated_at TEXT NOT NULL DEFAULT ({NOW}),
                FOREIGN KEY(student_id) REFERENCES students(id) ON DELETE CASCADE,
                UNIQUE(student_id, subject)
            )"
        ),
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_marks_student ON marks(student_id)",
        [],
    )?;

    conn.execute(
        &format!(
            "CREATE TABLE IF NOT EXISTS grades(
                id INTEGER PRIMARY KEY,
                student_id INTEGER NOT NULL,
                subject TEXT NOT NULL CHECK (length(trim(subject)) > 0),
                grade TEXT NOT NULL CHECK (grade IN ('A', 'B', 'C', 'D', 'E', 'F')),
                created_at TEXT NOT NULL DEFAULT ({NOW}),
                updated_at TEXT NOT NULL DEFAULT ({NOW}),
                FOREIGN KEY(student_id) REFERENCES students(id) ON DELETE CASCADE,
                UNIQUE(student_id, subject)
            )"
        ),
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_grades_student ON grades(student_id)",
        [],
    )?;

    conn.execute(
        &format!(
            "CREATE TABLE IF NOT EXISTS attendance(
                id INTEGER PRIMARY KEY,
                student_id INTEGER NOT NULL,
                date TEXT NOT NULL CHECK (date GLOB '[0-9][0-9][0-9][0-9]-[0-9][0-9]-[0-9][0-9]'),
                face_data BLOB,
                created_at TEXT NOT NULL DEFAULT ({NOW}),
                updated_at TEXT NOT NULL DEFAULT ({NOW}),
                FOREIGN KEY(student_id) REFERENCES students(id) ON DELETE CASCADE,
                UNIQUE(student_id, date)
            )"
        ),
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_student ON attendance(student_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_date ON attendance(date)",
        [],
    )?;

    for table in TOUCHED_TABLES {
        ensure_touch_trigger(conn, table)?;
    }

    Ok(())
}

/// Stamps `updated_at` after any update that did not set it explicitly.
/// Recursive triggers are off, so the inner UPDATE does not re-fire.
fn ensure_touch_trigger(conn: &Connection, table: &str) -> anyhow::Result<()> {
    conn.execute(
        &format!(
            "CREATE TRIGGER IF NOT EXISTS trg_{table}_touch
             AFTER UPDATE ON {table}
             FOR EACH ROW WHEN NEW.updated_at IS OLD.updated_at
             BEGIN
               UPDATE {table} SET updated_at = {NOW} WHERE id = NEW.id;
             END"
        ),
        [],
    )?;
    Ok(())
}
