use crate::grading::parse_letter;
use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{required_i64, required_str, to_json, with_session, Session, SessionFn};
use crate::ipc::types::{AppState, Request};
use crate::store::grades;
use crate::store::marks::{self, MarkEntry};
use serde_json::{json, Value};

fn mark_entry(v: &Value) -> Result<MarkEntry, HandlerErr> {
    Ok(MarkEntry {
        student_id: required_i64(v, "studentId")?,
        subject: required_str(v, "subject")?,
        score: required_i64(v, "score")?,
    })
}

fn marks_list(s: &Session<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let student_id = required_i64(params, "studentId")?;
    let rows = marks::list_for_student(s.conn, s.caller, student_id)?;
    Ok(json!({ "marks": to_json(&rows)? }))
}

fn marks_get(s: &Session<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let id = required_i64(params, "markId")?;
    to_json(&marks::get(s.conn, s.caller, id)?)
}

fn marks_upsert(s: &Session<'_>, params: &Value) -> Result<Value, HandlerErr> {
    to_json(&marks::upsert(s.conn, s.caller, mark_entry(params)?)?)
}

fn marks_delete(s: &Session<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let id = required_i64(params, "markId")?;
    let row = marks::delete(s.conn, s.caller, id)?;
    Ok(json!({ "deleted": to_json(&row)? }))
}

fn marks_enter_for_class(s: &Session<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let class_name = required_str(params, "className")?;
    let section = required_str(params, "section")?;
    let Some(raw) = params.get("entries").and_then(|v| v.as_array()) else {
        return Err(HandlerErr::bad_params("missing entries"));
    };
    let entries = raw
        .iter()
        .enumerate()
        .map(|(i, v)| {
            mark_entry(v).map_err(|mut e| {
                e.details = Some(json!({ "entryIndex": i }));
                e
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    to_json(&marks::enter_for_class(
        s.conn,
        s.caller,
        &class_name,
        &section,
        &entries,
        &s.config.grade_scale,
    )?)
}

fn grades_list(s: &Session<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let student_id = required_i64(params, "studentId")?;
    let rows = grades::list_for_student(s.conn, s.caller, student_id)?;
    Ok(json!({ "grades": to_json(&rows)? }))
}

fn grades_get(s: &Session<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let id = required_i64(params, "gradeId")?;
    to_json(&grades::get(s.conn, s.caller, id)?)
}

fn grades_upsert(s: &Session<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let student_id = required_i64(params, "studentId")?;
    let subject = required_str(params, "subject")?;
    let letter = parse_letter(&required_str(params, "grade")?)?;
    to_json(&grades::upsert(s.conn, s.caller, student_id, &subject, letter)?)
}

fn grades_delete(s: &Session<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let id = required_i64(params, "gradeId")?;
    let row = grades::delete(s.conn, s.caller, id)?;
    Ok(json!({ "deleted": to_json(&row)? }))
}

fn grades_derive(s: &Session<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let student_id = required_i64(params, "studentId")?;
    let rows = grades::derive(s.conn, s.caller, student_id, &s.config.grade_scale)?;
    Ok(json!({ "grades": to_json(&rows)? }))
}

fn grades_scale(s: &Session<'_>, _params: &Value) -> Result<Value, HandlerErr> {
    Ok(json!({
        "cutoffs": to_json(&s.config.grade_scale.cutoffs())?,
        "floor": "F",
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let f: SessionFn = match req.method.as_str() {
        "marks.list" => marks_list,
        "marks.get" => marks_get,
        "marks.upsert" => marks_upsert,
        "marks.delete" => marks_delete,
        "marks.enterForClass" => marks_enter_for_class,
        "grades.list" => grades_list,
        "grades.get" => grades_get,
        "grades.upsert" => grades_upsert,
        "grades.delete" => grades_delete,
        "grades.derive" => grades_derive,
        "grades.scale" => grades_scale,
        _ => return None,
    };
    Some(with_session(state, req, f))
}
