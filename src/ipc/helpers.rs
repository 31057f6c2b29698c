use crate::config::Config;
use crate::ipc::error::{err, ok, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::store::attendance::parse_date;
use crate::store::students::StudentFilter;
use base64::Engine;
use chrono::NaiveDate;
use rusqlite::Connection;
use serde::Serialize;
use serde_json::Value;

/// What a signed-in handler gets to work with.
pub struct Session<'a> {
    pub conn: &'a Connection,
    pub caller: &'a str,
    pub config: &'a Config,
}

pub type SessionFn = fn(&Session<'_>, &Value) -> Result<Value, HandlerErr>;

pub fn with_session(
    state: &AppState,
    req: &Request,
    f: impl FnOnce(&Session<'_>, &Value) -> Result<Value, HandlerErr>,
) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(caller) = state.identity.as_deref() else {
        return err(&req.id, "unauthenticated", "sign in first", None);
    };
    let session = Session {
        conn,
        caller,
        config: &state.config,
    };
    match f(&session, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn to_json<T: Serialize>(value: &T) -> Result<Value, HandlerErr> {
    serde_json::to_value(value).map_err(|e| HandlerErr {
        code: "serialize_failed",
        message: e.to_string(),
        details: None,
    })
}

pub fn required_str(params: &Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {key}")))
}

/// Absent and `null` both read as `None`; any other non-string is rejected.
pub fn optional_str(params: &Value, key: &str) -> Result<Option<String>, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(HandlerErr::bad_params(format!("{key} must be a string"))),
    }
}

pub fn required_i64(params: &Value, key: &str) -> Result<i64, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Err(HandlerErr::bad_params(format!("missing {key}"))),
        Some(v) => v
            .as_i64()
            .ok_or_else(|| HandlerErr::bad_params(format!("{key} must be an integer"))),
    }
}

pub fn optional_i64(params: &Value, key: &str) -> Result<Option<i64>, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_i64()
            .map(Some)
            .ok_or_else(|| HandlerErr::bad_params(format!("{key} must be an integer"))),
    }
}

/// Distinguishes an absent key (`None`) from an explicit `null` (`Some(None)`).
pub fn nullable_i64(params: &Value, key: &str) -> Result<Option<Option<i64>>, HandlerErr> {
    match params.get(key) {
        None => Ok(None),
        Some(Value::Null) => Ok(Some(None)),
        Some(v) => v
            .as_i64()
            .map(|n| Some(Some(n)))
            .ok_or_else(|| HandlerErr::bad_params(format!("{key} must be an integer or null"))),
    }
}

/// Standard base64 blob; absent or `null` reads as `None`.
pub fn optional_blob(params: &Value, key: &str) -> Result<Option<Vec<u8>>, HandlerErr> {
    let Some(text) = optional_str(params, key)? else {
        return Ok(None);
    };
    base64::engine::general_purpose::STANDARD
        .decode(text.trim())
        .map(Some)
        .map_err(|e| HandlerErr::bad_params(format!("{key} is not valid base64: {e}")))
}

pub fn encode_blob(data: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(data)
}

pub fn required_date(params: &Value, key: &str) -> Result<NaiveDate, HandlerErr> {
    Ok(parse_date(&required_str(params, key)?)?)
}

pub fn student_filter(params: &Value) -> Result<StudentFilter, HandlerErr> {
    Ok(StudentFilter {
        class_name: optional_str(params, "className")?.filter(|s| !s.trim().is_empty()),
        section: optional_str(params, "section")?.filter(|s| !s.trim().is_empty()),
    })
}
