use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{
    optional_blob, required_date, required_i64, to_json, with_session, Session, SessionFn,
};
use crate::ipc::types::{AppState, Request};
use crate::store::attendance;
use serde_json::{json, Value};

fn attendance_list(s: &Session<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let student_id = required_i64(params, "studentId")?;
    let rows = attendance::list_for_student(s.conn, s.caller, student_id)?;
    Ok(json!({ "attendance": to_json(&rows)? }))
}

fn attendance_get(s: &Session<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let id = required_i64(params, "attendanceId")?;
    to_json(&attendance::get(s.conn, s.caller, id)?)
}

fn attendance_by_date(s: &Session<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let date = required_date(params, "date")?;
    let rows = attendance::list_by_date(s.conn, s.caller, date)?;
    Ok(json!({
        "date": date.format("%Y-%m-%d").to_string(),
        "attendance": to_json(&rows)?,
    }))
}

fn attendance_mark(s: &Session<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let student_id = required_i64(params, "studentId")?;
    let date = required_date(params, "date")?;
    let face = optional_blob(params, "faceData")?;
    to_json(&attendance::mark(s.conn, s.caller, student_id, date, face)?)
}

fn attendance_check_in(s: &Session<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let face = optional_blob(params, "faceData")?;
    let today = chrono::Local::now().date_naive();
    to_json(&attendance::check_in(s.conn, s.caller, today, face)?)
}

fn attendance_delete(s: &Session<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let id = required_i64(params, "attendanceId")?;
    let row = attendance::delete(s.conn, s.caller, id)?;
    Ok(json!({ "deleted": to_json(&row)? }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let f: SessionFn = match req.method.as_str() {
        "attendance.list" => attendance_list,
        "attendance.get" => attendance_get,
        "attendance.byDate" => attendance_by_date,
        "attendance.mark" => attendance_mark,
        "attendance.checkIn" => attendance_check_in,
        "attendance.delete" => attendance_delete,
        _ => return None,
    };
    Some(with_session(state, req, f))
}
