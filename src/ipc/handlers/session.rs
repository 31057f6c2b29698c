use crate::auth;
use crate::error::StoreError;
use crate::ipc::error::{err, ok, HandlerErr};
use crate::ipc::helpers::{required_str, to_json, with_session};
use crate::ipc::types::{AppState, Request};
use crate::policy::resolve_principal;
use serde_json::json;

fn handle_login(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let attempt = || -> Result<_, HandlerErr> {
        let username = required_str(&req.params, "username")?;
        let password = required_str(&req.params, "password")?;
        Ok(auth::login(conn, username.trim(), &password)?)
    };
    match attempt() {
        Ok(Some(principal)) => {
            tracing::info!(user = %principal.username, role = principal.role.as_str(), "signed in");
            state.identity = Some(principal.username.clone());
            match to_json(&principal) {
                Ok(v) => ok(&req.id, v),
                Err(e) => e.response(&req.id),
            }
        }
        Ok(None) => {
            // A failed attempt also ends any previous session.
            state.identity = None;
            err(&req.id, "unauthenticated", "invalid username or password", None)
        }
        Err(e) => e.response(&req.id),
    }
}

fn handle_logout(state: &mut AppState, req: &Request) -> serde_json::Value {
    let was = state.identity.take();
    if let Some(user) = &was {
        tracing::info!(user = %user, "signed out");
    }
    ok(&req.id, json!({ "signedOut": was.is_some() }))
}

fn handle_whoami(state: &mut AppState, req: &Request) -> serde_json::Value {
    with_session(state, req, |s, _| {
        let principal = resolve_principal(s.conn, s.caller)?.ok_or(StoreError::Unauthenticated)?;
        to_json(&principal)
    })
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "session.login" => Some(handle_login(state, req)),
        "session.logout" => Some(handle_logout(state, req)),
        "session.whoami" => Some(handle_whoami(state, req)),
        _ => None,
    }
}
