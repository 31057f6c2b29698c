mod test_support;

use serde_json::json;
use std::process::{Command, Stdio};
use test_support::{spawn_sidecar_with_env, temp_dir};

#[test]
fn environment_drives_startup_seed_and_grade_scale() {
    let workspace = temp_dir("rollbook-config-env");
    let path = workspace.path().to_string_lossy().to_string();
    let mut sc = spawn_sidecar_with_env(&[
        ("ROLLBOOK_WORKSPACE", path.as_str()),
        ("ROLLBOOK_SEED_PRINCIPAL_PASSWORD", "env-principal"),
        ("ROLLBOOK_SEED_TEACHER_PASSWORD", "env-teacher"),
        ("ROLLBOOK_SEED_STUDENT_PASSWORD", "env-student"),
        ("ROLLBOOK_GRADE_SCALE", "A:85,B:75,C:65,D:55,E:35"),
    ]);

    let health = sc.ok("health", json!({}));
    assert_eq!(
        health.get("workspacePath").and_then(|v| v.as_str()),
        Some(path.as_str())
    );

    let seeded = sc.ok("workspace.bootstrap", json!({}));
    assert_eq!(seeded.get("seeded").and_then(|v| v.as_bool()), Some(true));
    let sid = seeded
        .get("studentId")
        .and_then(|v| v.as_i64())
        .expect("studentId");

    sc.login("teacher", "env-teacher");
    let scale = sc.ok("grades.scale", json!({}));
    assert_eq!(
        scale.pointer("/cutoffs/0"),
        Some(&json!({ "letter": "A", "minScore": 85 }))
    );

    sc.ok(
        "marks.enterForClass",
        json!({
            "className": "10",
            "section": "A",
            "entries": [{ "studentId": sid, "subject": "Math", "score": 86 }]
        }),
    );
    let grades = sc.ok("grades.list", json!({ "studentId": sid }));
    assert_eq!(grades.pointer("/grades/0/grade").and_then(|v| v.as_str()), Some("A"));
}

#[test]
fn params_override_seed_passwords_from_the_environment() {
    let workspace = temp_dir("rollbook-config-override");
    let mut sc = spawn_sidecar_with_env(&[("ROLLBOOK_SEED_PRINCIPAL_PASSWORD", "from-env")]);
    sc.ok(
        "workspace.select",
        json!({ "path": workspace.path().to_string_lossy() }),
    );
    sc.ok(
        "workspace.bootstrap",
        json!({
            "principalPassword": "from-params",
            "teacherPassword": "t",
            "studentPassword": "s",
        }),
    );
    assert_eq!(
        sc.fail(
            "session.login",
            json!({ "username": "principal", "password": "from-env" })
        ),
        "unauthenticated"
    );
    sc.login("principal", "from-params");
}

#[test]
fn invalid_configuration_stops_the_process() {
    let exe = env!("CARGO_BIN_EXE_rollbookd");

    let bad_scale = Command::new(exe)
        .env("ROLLBOOK_GRADE_SCALE", "A:80,B:90")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .expect("run rollbookd");
    assert!(!bad_scale.success());

    let bad_days = Command::new(exe)
        .env("ROLLBOOK_SCHOOL_DAYS", "0")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .expect("run rollbookd");
    assert!(!bad_days.success());

    let bad_arg = Command::new(exe)
        .arg("--bogus")
        .env_remove("ROLLBOOK_GRADE_SCALE")
        .env_remove("ROLLBOOK_SCHOOL_DAYS")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .expect("run rollbookd");
    assert!(!bad_arg.success());

    let workspace = temp_dir("rollbook-config-flag");
    let ok = Command::new(exe)
        .arg(format!("--workspace={}", workspace.path().display()))
        .env_remove("ROLLBOOK_GRADE_SCALE")
        .env_remove("ROLLBOOK_SCHOOL_DAYS")
        .env_remove("ROLLBOOK_WORKSPACE")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .expect("run rollbookd");
    assert!(ok.success());
    assert!(workspace.path().join("rollbook.sqlite3").is_file());
}
