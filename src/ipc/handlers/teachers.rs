use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{
    optional_str, required_i64, required_str, to_json, with_session, Session, SessionFn,
};
use crate::ipc::types::{AppState, Request};
use crate::store::teachers;
use serde_json::{json, Value};

fn teachers_list(s: &Session<'_>, _params: &Value) -> Result<Value, HandlerErr> {
    let rows = teachers::list(s.conn, s.caller)?;
    Ok(json!({ "teachers": to_json(&rows)? }))
}

fn teachers_get(s: &Session<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let id = required_i64(params, "teacherId")?;
    to_json(&teachers::get(s.conn, s.caller, id)?)
}

fn teachers_create(s: &Session<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let name = required_str(params, "name")?;
    let subject = required_str(params, "subject")?;
    to_json(&teachers::create(s.conn, s.caller, &name, &subject)?)
}

fn teachers_update(s: &Session<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let id = required_i64(params, "teacherId")?;
    let name = optional_str(params, "name")?;
    let subject = optional_str(params, "subject")?;
    to_json(&teachers::update(
        s.conn,
        s.caller,
        id,
        name.as_deref(),
        subject.as_deref(),
    )?)
}

fn teachers_delete(s: &Session<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let id = required_i64(params, "teacherId")?;
    let row = teachers::delete(s.conn, s.caller, id)?;
    Ok(json!({ "deleted": to_json(&row)? }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let f: SessionFn = match req.method.as_str() {
        "teachers.list" => teachers_list,
        "teachers.get" => teachers_get,
        "teachers.create" => teachers_create,
        "teachers.update" => teachers_update,
        "teachers.delete" => teachers_delete,
        _ => return None,
    };
    Some(with_session(state, req, f))
}
