use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{
    encode_blob, optional_blob, optional_i64, optional_str, required_i64, required_str,
    student_filter, to_json, with_session, Session, SessionFn,
};
use crate::ipc::types::{AppState, Request};
use crate::store::students::{self, NewStudent, StudentPatch};
use serde_json::{json, Value};

fn students_list(s: &Session<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let filter = student_filter(params)?;
    let rows = students::list(s.conn, s.caller, &filter)?;
    Ok(json!({ "students": to_json(&rows)? }))
}

fn students_get(s: &Session<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let id = required_i64(params, "studentId")?;
    to_json(&students::get(s.conn, s.caller, id)?)
}

fn students_create(s: &Session<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let new = NewStudent {
        name: required_str(params, "name")?,
        age: required_i64(params, "age")?,
        class_name: required_str(params, "className")?,
        section: required_str(params, "section")?,
        face_data: optional_blob(params, "faceData")?,
    };
    to_json(&students::create(s.conn, s.caller, new)?)
}

fn students_update(s: &Session<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let id = required_i64(params, "studentId")?;
    let patch = StudentPatch {
        name: optional_str(params, "name")?,
        age: optional_i64(params, "age")?,
        class_name: optional_str(params, "className")?,
        section: optional_str(params, "section")?,
    };
    to_json(&students::update(s.conn, s.caller, id, patch)?)
}

fn students_delete(s: &Session<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let id = required_i64(params, "studentId")?;
    to_json(&students::delete(s.conn, s.caller, id)?)
}

fn students_classes(s: &Session<'_>, _params: &Value) -> Result<Value, HandlerErr> {
    to_json(&students::classes(s.conn, s.caller)?)
}

fn students_me(s: &Session<'_>, _params: &Value) -> Result<Value, HandlerErr> {
    to_json(&students::dashboard(s.conn, s.caller)?)
}

fn face_get(s: &Session<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let id = required_i64(params, "studentId")?;
    let face = students::face(s.conn, s.caller, id)?;
    Ok(json!({
        "studentId": id,
        "faceData": face.as_deref().map(encode_blob),
    }))
}

fn face_set(s: &Session<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let id = required_i64(params, "studentId")?;
    let Some(data) = optional_blob(params, "faceData")? else {
        return Err(HandlerErr::bad_params(
            "missing faceData; use students.face.clear to remove it",
        ));
    };
    to_json(&students::set_face(s.conn, s.caller, id, Some(data))?)
}

fn face_clear(s: &Session<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let id = required_i64(params, "studentId")?;
    to_json(&students::set_face(s.conn, s.caller, id, None)?)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let f: SessionFn = match req.method.as_str() {
        "students.list" => students_list,
        "students.get" => students_get,
        "students.create" => students_create,
        "students.update" => students_update,
        "students.delete" => students_delete,
        "students.classes" => students_classes,
        "students.me" => students_me,
        "students.face.get" => face_get,
        "students.face.set" => face_set,
        "students.face.clear" => face_clear,
        _ => return None,
    };
    Some(with_session(state, req, f))
}
