use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{
    nullable_i64, optional_i64, optional_str, required_i64, required_str, to_json, with_session,
    Session, SessionFn,
};
use crate::ipc::types::{AppState, Request};
use crate::policy::Role;
use crate::store::accounts::{self, AccountPatch, NewAccount};
use serde_json::{json, Value};

fn parse_role(raw: &str) -> Result<Role, HandlerErr> {
    Role::parse(raw).ok_or_else(|| {
        HandlerErr::bad_params(format!(
            "role must be principal, teacher or student, got {raw:?}"
        ))
    })
}

fn accounts_list(s: &Session<'_>, _params: &Value) -> Result<Value, HandlerErr> {
    let rows = accounts::list(s.conn, s.caller)?;
    Ok(json!({ "accounts": to_json(&rows)? }))
}

fn accounts_get(s: &Session<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let id = required_i64(params, "accountId")?;
    to_json(&accounts::get(s.conn, s.caller, id)?)
}

fn accounts_create(s: &Session<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let new = NewAccount {
        username: required_str(params, "username")?,
        password: required_str(params, "password")?,
        role: parse_role(&required_str(params, "role")?)?,
        student_id: optional_i64(params, "studentId")?,
    };
    to_json(&accounts::create(s.conn, s.caller, new)?)
}

fn accounts_update(s: &Session<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let id = required_i64(params, "accountId")?;
    let patch = AccountPatch {
        password: optional_str(params, "password")?,
        role: optional_str(params, "role")?
            .map(|r| parse_role(&r))
            .transpose()?,
        student_id: nullable_i64(params, "studentId")?,
    };
    to_json(&accounts::update(s.conn, s.caller, id, patch)?)
}

fn accounts_delete(s: &Session<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let id = required_i64(params, "accountId")?;
    let row = accounts::delete(s.conn, s.caller, id)?;
    Ok(json!({ "deleted": to_json(&row)? }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let f: SessionFn = match req.method.as_str() {
        "accounts.list" => accounts_list,
        "accounts.get" => accounts_get,
        "accounts.create" => accounts_create,
        "accounts.update" => accounts_update,
        "accounts.delete" => accounts_delete,
        _ => return None,
    };
    Some(with_session(state, req, f))
}
