mod test_support;

use serde_json::json;
use test_support::{id_of, seeded};

#[test]
fn one_record_per_student_per_day() {
    let (_ws, mut sc, sid) = seeded("rollbook-attendance-day");
    sc.as_teacher();

    let first = sc.ok(
        "attendance.mark",
        json!({ "studentId": sid, "date": "2024-01-10" }),
    );
    assert_eq!(first.get("created").and_then(|v| v.as_bool()), Some(true));
    let second = sc.ok(
        "attendance.mark",
        json!({ "studentId": sid, "date": "2024-01-10", "faceData": "aGVsbG8=" }),
    );
    assert_eq!(second.get("created").and_then(|v| v.as_bool()), Some(false));
    let first_id = id_of(first.get("record").expect("record"));
    assert_eq!(id_of(second.get("record").expect("record")), first_id);
    assert_eq!(
        second.pointer("/record/hasFaceData").and_then(|v| v.as_bool()),
        Some(true)
    );

    let listed = sc.ok("attendance.list", json!({ "studentId": sid }));
    let rows = listed
        .get("attendance")
        .and_then(|v| v.as_array())
        .expect("attendance");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("date").and_then(|v| v.as_str()), Some("2024-01-10"));

    let by_date = sc.ok("attendance.byDate", json!({ "date": "2024-01-10" }));
    assert_eq!(
        by_date
            .get("attendance")
            .and_then(|v| v.as_array())
            .map(|a| a.len()),
        Some(1)
    );
    let quiet = sc.ok("attendance.byDate", json!({ "date": "2024-01-11" }));
    assert_eq!(quiet.get("attendance"), Some(&json!([])));
}

#[test]
fn dates_and_students_are_checked() {
    let (_ws, mut sc, sid) = seeded("rollbook-attendance-checks");
    sc.as_teacher();

    for bad in ["2024-13-01", "2024-02-30", "10/01/2024", ""] {
        assert_eq!(
            sc.fail("attendance.mark", json!({ "studentId": sid, "date": bad })),
            "bad_params",
            "date {:?}",
            bad
        );
    }
    assert_eq!(
        sc.fail(
            "attendance.mark",
            json!({ "studentId": 777_777, "date": "2024-01-10" })
        ),
        "referential"
    );
    assert_eq!(
        sc.fail("attendance.byDate", json!({ "date": "yesterday" })),
        "bad_params"
    );
}

#[test]
fn students_check_in_for_themselves() {
    let (_ws, mut sc, sid) = seeded("rollbook-check-in");
    sc.as_principal();
    let other = sc.create_student("Omar", "10", "A");

    sc.as_teacher();
    assert_eq!(sc.fail("attendance.checkIn", json!({})), "forbidden");

    sc.as_student();
    let first = sc.ok("attendance.checkIn", json!({ "faceData": "aGVsbG8=" }));
    assert_eq!(first.get("created").and_then(|v| v.as_bool()), Some(true));
    assert_eq!(
        first.pointer("/record/studentId").and_then(|v| v.as_i64()),
        Some(sid)
    );
    let today = first
        .pointer("/record/date")
        .and_then(|v| v.as_str())
        .expect("date")
        .to_string();
    let again = sc.ok("attendance.checkIn", json!({}));
    assert_eq!(again.get("created").and_then(|v| v.as_bool()), Some(false));

    sc.as_teacher();
    sc.ok("attendance.mark", json!({ "studentId": other, "date": today }));
    let everyone = sc.ok("attendance.byDate", json!({ "date": today }));
    assert_eq!(
        everyone.get("attendance").and_then(|v| v.as_array()).map(|a| a.len()),
        Some(2)
    );

    sc.as_student();
    let mine = sc.ok("attendance.byDate", json!({ "date": today }));
    let rows = mine
        .get("attendance")
        .and_then(|v| v.as_array())
        .expect("attendance");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("studentId").and_then(|v| v.as_i64()), Some(sid));
}
