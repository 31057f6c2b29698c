mod test_support;

use serde_json::{json, Value};
use test_support::{id_of, seeded, spawn_sidecar};

fn rows<'a>(v: &'a Value, key: &str) -> &'a Vec<Value> {
    v.get(key).and_then(|v| v.as_array()).expect("row array")
}

#[test]
fn student_sees_only_their_own_rows() {
    let (_ws, mut sc, sid) = seeded("rollbook-isolation");
    sc.as_principal();
    let other = sc.create_student("Bob Jones", "10", "A");
    let own_mark = id_of(&sc.ok(
        "marks.upsert",
        json!({ "studentId": sid, "subject": "Math", "score": 77 }),
    ));
    let other_mark = id_of(&sc.ok(
        "marks.upsert",
        json!({ "studentId": other, "subject": "Math", "score": 64 }),
    ));
    sc.ok(
        "grades.upsert",
        json!({ "studentId": other, "subject": "Math", "grade": "D" }),
    );
    let other_day = id_of(
        sc.ok(
            "attendance.mark",
            json!({ "studentId": other, "date": "2024-01-10" }),
        )
        .get("record")
        .expect("record"),
    );

    sc.as_student();
    let me = sc.ok("session.whoami", json!({}));
    assert_eq!(me.get("role").and_then(|v| v.as_str()), Some("student"));
    assert_eq!(me.get("studentId").and_then(|v| v.as_i64()), Some(sid));

    assert_eq!(id_of(&sc.ok("students.get", json!({ "studentId": sid }))), sid);
    assert_eq!(sc.fail("students.get", json!({ "studentId": other })), "not_found");
    // Same answer as for an id that does not exist at all.
    assert_eq!(sc.fail("students.get", json!({ "studentId": 999_999 })), "not_found");

    let listed = sc.ok("students.list", json!({}));
    let listed = rows(&listed, "students");
    assert_eq!(listed.len(), 1);
    assert_eq!(id_of(&listed[0]), sid);

    assert_eq!(sc.fail("marks.list", json!({ "studentId": other })), "not_found");
    assert_eq!(sc.fail("grades.list", json!({ "studentId": other })), "not_found");
    assert_eq!(sc.fail("attendance.list", json!({ "studentId": other })), "not_found");
    assert_eq!(sc.fail("marks.get", json!({ "markId": other_mark })), "not_found");
    assert_eq!(
        sc.fail("attendance.delete", json!({ "attendanceId": other_day })),
        "forbidden"
    );
    let mine = sc.ok("marks.list", json!({ "studentId": sid }));
    assert_eq!(rows(&mine, "marks").len(), 1);
    assert_eq!(id_of(&sc.ok("marks.get", json!({ "markId": own_mark }))), own_mark);

    // Tables with no student rows for them read as empty.
    let teachers = sc.ok("teachers.list", json!({}));
    assert!(rows(&teachers, "teachers").is_empty());
    let accounts = sc.ok("accounts.list", json!({}));
    assert!(rows(&accounts, "accounts").is_empty());
}

#[test]
fn attendance_read_by_id_follows_student_scope() {
    let (_ws, mut sc, sid) = seeded("rollbook-attendance-get");
    sc.as_principal();
    let other = sc.create_student("Dana Wells", "10", "A");
    let mark = |sc: &mut test_support::Sidecar, student: i64| {
        id_of(
            sc.ok(
                "attendance.mark",
                json!({ "studentId": student, "date": "2024-02-01" }),
            )
            .get("record")
            .expect("record"),
        )
    };
    let own_day = mark(&mut sc, sid);
    let other_day = mark(&mut sc, other);

    sc.as_student();
    let row = sc.ok("attendance.get", json!({ "attendanceId": own_day }));
    assert_eq!(id_of(&row), own_day);
    assert_eq!(row.get("studentId").and_then(|v| v.as_i64()), Some(sid));
    assert_eq!(row.get("date").and_then(|v| v.as_str()), Some("2024-02-01"));
    assert_eq!(
        sc.fail("attendance.get", json!({ "attendanceId": other_day })),
        "not_found"
    );
    assert_eq!(
        sc.fail("attendance.get", json!({ "attendanceId": 999_999 })),
        "not_found"
    );

    sc.as_teacher();
    let row = sc.ok("attendance.get", json!({ "attendanceId": other_day }));
    assert_eq!(row.get("studentId").and_then(|v| v.as_i64()), Some(other));
}

#[test]
fn student_writes_are_limited_to_own_attendance() {
    let (_ws, mut sc, sid) = seeded("rollbook-student-writes");
    sc.as_principal();
    let other = sc.create_student("Carla Diaz", "10", "B");

    sc.as_student();
    assert_eq!(
        sc.fail(
            "marks.upsert",
            json!({ "studentId": sid, "subject": "Math", "score": 100 })
        ),
        "forbidden"
    );
    assert_eq!(
        sc.fail(
            "grades.upsert",
            json!({ "studentId": sid, "subject": "Math", "grade": "A" })
        ),
        "forbidden"
    );
    assert_eq!(
        sc.fail(
            "students.create",
            json!({ "name": "Mallory", "age": 15, "className": "10", "section": "A" })
        ),
        "forbidden"
    );
    assert_eq!(
        sc.fail("students.update", json!({ "studentId": sid, "name": "Renamed" })),
        "forbidden"
    );
    assert_eq!(sc.fail("students.delete", json!({ "studentId": sid })), "forbidden");
    assert_eq!(
        sc.fail("teachers.create", json!({ "name": "T", "subject": "S" })),
        "forbidden"
    );
    assert_eq!(
        sc.fail(
            "attendance.mark",
            json!({ "studentId": other, "date": "2024-01-10" })
        ),
        "forbidden"
    );

    let marked = sc.ok(
        "attendance.mark",
        json!({ "studentId": sid, "date": "2024-01-10" }),
    );
    let day = id_of(marked.get("record").expect("record"));
    assert_eq!(
        sc.fail("attendance.delete", json!({ "attendanceId": day })),
        "forbidden"
    );

    sc.as_teacher();
    sc.ok("attendance.delete", json!({ "attendanceId": day }));
    assert_eq!(
        sc.fail("attendance.delete", json!({ "attendanceId": day })),
        "not_found"
    );
}

#[test]
fn teachers_cannot_touch_accounts() {
    let (_ws, mut sc, sid) = seeded("rollbook-teacher-accounts");
    sc.as_teacher();

    let accounts = sc.ok("accounts.list", json!({}));
    assert!(rows(&accounts, "accounts").is_empty());
    assert_eq!(sc.fail("accounts.get", json!({ "accountId": 1 })), "not_found");
    assert_eq!(
        sc.fail(
            "accounts.create",
            json!({ "username": "sneaky", "password": "pw", "role": "principal" })
        ),
        "forbidden"
    );
    assert_eq!(
        sc.fail("accounts.update", json!({ "accountId": 2, "role": "principal" })),
        "forbidden"
    );
    assert_eq!(sc.fail("accounts.delete", json!({ "accountId": 1 })), "forbidden");

    // Everything else is open to them.
    sc.create_student("Dana Lee", "11", "C");
    sc.ok("teachers.create", json!({ "name": "Mr. Khan", "subject": "Physics" }));
    sc.ok(
        "marks.upsert",
        json!({ "studentId": sid, "subject": "Physics", "score": 81 }),
    );
}

#[test]
fn account_changes_apply_to_the_next_request() {
    let (ws, mut admin, sid) = seeded("rollbook-role-change");
    admin.as_principal();
    let created = admin.ok(
        "accounts.create",
        json!({ "username": "ms-lee", "password": "lee-pw", "role": "teacher" }),
    );
    let lee = id_of(&created);
    assert!(created.get("passwordHash").is_none());

    let mut lee_session = spawn_sidecar();
    lee_session.ok(
        "workspace.select",
        json!({ "path": ws.path().to_string_lossy() }),
    );
    lee_session.login("ms-lee", "lee-pw");
    assert!(rows(&lee_session.ok("accounts.list", json!({})), "accounts").is_empty());

    admin.ok("accounts.update", json!({ "accountId": lee, "role": "principal" }));
    let promoted = lee_session.ok("accounts.list", json!({}));
    assert_eq!(rows(&promoted, "accounts").len(), 4);
    let me = lee_session.ok("session.whoami", json!({}));
    assert_eq!(me.get("role").and_then(|v| v.as_str()), Some("principal"));

    admin.ok(
        "accounts.update",
        json!({ "accountId": lee, "role": "student", "studentId": sid }),
    );
    let narrowed = lee_session.ok("students.list", json!({}));
    assert_eq!(rows(&narrowed, "students").len(), 1);
    assert!(rows(&lee_session.ok("accounts.list", json!({})), "accounts").is_empty());

    admin.ok("accounts.delete", json!({ "accountId": lee }));
    assert_eq!(lee_session.fail("session.whoami", json!({})), "unauthenticated");
    assert_eq!(lee_session.fail("students.list", json!({})), "unauthenticated");
}

#[test]
fn account_rules_are_enforced() {
    let (_ws, mut sc, sid) = seeded("rollbook-account-rules");
    sc.as_principal();

    assert_eq!(
        sc.fail(
            "accounts.create",
            json!({ "username": "kid", "password": "pw", "role": "student" })
        ),
        "bad_params"
    );
    assert_eq!(
        sc.fail(
            "accounts.create",
            json!({ "username": "t2", "password": "pw", "role": "teacher", "studentId": sid })
        ),
        "bad_params"
    );
    assert_eq!(
        sc.fail(
            "accounts.create",
            json!({ "username": "x", "password": "pw", "role": "janitor" })
        ),
        "bad_params"
    );
    assert_eq!(
        sc.fail(
            "accounts.create",
            json!({ "username": "teacher", "password": "pw", "role": "teacher" })
        ),
        "conflict"
    );
    assert_eq!(
        sc.fail(
            "accounts.create",
            json!({ "username": "ghost", "password": "pw", "role": "student", "studentId": 424_242 })
        ),
        "referential"
    );
    assert_eq!(
        sc.fail(
            "accounts.create",
            json!({ "username": "nopw", "password": "", "role": "teacher" })
        ),
        "bad_params"
    );

    // The seed student still has a login, so it cannot be deleted.
    assert_eq!(sc.fail("students.delete", json!({ "studentId": sid })), "referential");

    let listed = sc.ok("accounts.list", json!({}));
    let names: Vec<&str> = rows(&listed, "accounts")
        .iter()
        .filter_map(|a| a.get("username").and_then(|v| v.as_str()))
        .collect();
    assert_eq!(names, vec!["principal", "student", "teacher"]);
    assert!(rows(&listed, "accounts")
        .iter()
        .all(|a| a.get("passwordHash").is_none()));

    let student_account = rows(&listed, "accounts")
        .iter()
        .find(|a| a.get("username").and_then(|v| v.as_str()) == Some("student"))
        .map(id_of)
        .expect("student account");
    sc.ok(
        "accounts.update",
        json!({ "accountId": student_account, "password": "rotated" }),
    );
    sc.login("student", "rotated");
    assert_eq!(
        sc.fail(
            "session.login",
            json!({ "username": "student", "password": test_support::STUDENT_PW })
        ),
        "unauthenticated"
    );
    // The failed attempt signed the session out.
    assert_eq!(sc.fail("students.list", json!({})), "unauthenticated");
}
