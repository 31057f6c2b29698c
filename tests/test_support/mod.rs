#![allow(dead_code)]

use serde_json::{json, Value};
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use tempfile::TempDir;

pub const PRINCIPAL_PW: &str = "principal-secret";
pub const TEACHER_PW: &str = "teacher-secret";
pub const STUDENT_PW: &str = "student-secret";

pub fn temp_dir(prefix: &str) -> TempDir {
    tempfile::Builder::new()
        .prefix(prefix)
        .tempdir()
        .expect("create temp dir")
}

/// One running `rollbookd` with its pipes. Request ids are generated.
pub struct Sidecar {
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
    next_id: u64,
}

const CONFIG_VARS: [&str; 6] = [
    "ROLLBOOK_WORKSPACE",
    "ROLLBOOK_GRADE_SCALE",
    "ROLLBOOK_SCHOOL_DAYS",
    "ROLLBOOK_SEED_PRINCIPAL_PASSWORD",
    "ROLLBOOK_SEED_TEACHER_PASSWORD",
    "ROLLBOOK_SEED_STUDENT_PASSWORD",
];

pub fn spawn_sidecar() -> Sidecar {
    spawn_sidecar_with_env(&[])
}

/// Spawns with a clean configuration plus `vars`.
pub fn spawn_sidecar_with_env(vars: &[(&str, &str)]) -> Sidecar {
    let exe = env!("CARGO_BIN_EXE_rollbookd");
    let mut cmd = Command::new(exe);
    for key in CONFIG_VARS {
        cmd.env_remove(key);
    }
    cmd.envs(vars.iter().copied());
    let mut child = cmd
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn rollbookd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    Sidecar {
        child,
        stdin,
        reader: BufReader::new(stdout),
        next_id: 1,
    }
}

impl Sidecar {
    pub fn send_raw(&mut self, line: &str) -> Value {
        writeln!(self.stdin, "{}", line).expect("write request");
        self.stdin.flush().expect("flush request");
        let mut out = String::new();
        self.reader.read_line(&mut out).expect("read response line");
        assert!(!out.trim().is_empty(), "empty response for {}", line);
        serde_json::from_str(out.trim()).expect("parse response json")
    }

    pub fn request(&mut self, method: &str, params: Value) -> Value {
        let id = self.next_id.to_string();
        self.next_id += 1;
        let payload = json!({
            "id": id,
            "method": method,
            "params": params,
        });
        let value = self.send_raw(&payload.to_string());
        assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id.as_str()));
        value
    }

    pub fn ok(&mut self, method: &str, params: Value) -> Value {
        let value = self.request(method, params);
        assert_eq!(
            value.get("ok").and_then(|v| v.as_bool()),
            Some(true),
            "{} failed: {}",
            method,
            value
        );
        value.get("result").cloned().unwrap_or(Value::Null)
    }

    /// Sends a request that must fail and returns its error code.
    pub fn fail(&mut self, method: &str, params: Value) -> String {
        let value = self.request(method, params);
        assert_eq!(
            value.get("ok").and_then(|v| v.as_bool()),
            Some(false),
            "{} unexpectedly succeeded: {}",
            method,
            value
        );
        value
            .pointer("/error/code")
            .and_then(|v| v.as_str())
            .expect("error code")
            .to_string()
    }

    pub fn login(&mut self, username: &str, password: &str) -> Value {
        self.ok(
            "session.login",
            json!({ "username": username, "password": password }),
        )
    }

    pub fn as_principal(&mut self) {
        self.login("principal", PRINCIPAL_PW);
    }

    pub fn as_teacher(&mut self) {
        self.login("teacher", TEACHER_PW);
    }

    pub fn as_student(&mut self) {
        self.login("student", STUDENT_PW);
    }

    pub fn create_student(&mut self, name: &str, class_name: &str, section: &str) -> i64 {
        let row = self.ok(
            "students.create",
            json!({ "name": name, "age": 15, "className": class_name, "section": section }),
        );
        id_of(&row)
    }
}

impl Drop for Sidecar {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

pub fn id_of(row: &Value) -> i64 {
    row.get("id").and_then(|v| v.as_i64()).expect("row id")
}

/// A sidecar on a fresh, bootstrapped workspace. Returns the seed student's id.
pub fn seeded(prefix: &str) -> (TempDir, Sidecar, i64) {
    let workspace = temp_dir(prefix);
    let mut sc = spawn_sidecar();
    sc.ok(
        "workspace.select",
        json!({ "path": workspace.path().to_string_lossy() }),
    );
    let seeded = sc.ok(
        "workspace.bootstrap",
        json!({
            "principalPassword": PRINCIPAL_PW,
            "teacherPassword": TEACHER_PW,
            "studentPassword": STUDENT_PW,
        }),
    );
    assert_eq!(seeded.get("seeded").and_then(|v| v.as_bool()), Some(true));
    let sid = seeded
        .get("studentId")
        .and_then(|v| v.as_i64())
        .expect("seed studentId");
    (workspace, sc, sid)
}
